pub mod name;
pub mod username;

pub use name::validate_team_name;
pub use username::{validate_join_message, validate_username};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationError {
    TeamNameEmpty,
    TeamNameTooLong,
    UsernameEmpty,
    UsernameTooLong,
    UsernameWhitespace,
    MessageTooLong,
    UnknownDecision(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TeamNameEmpty => write!(f, "Team name cannot be empty"),
            Self::TeamNameTooLong => write!(f, "Team name is too long (max 255 characters)"),
            Self::UsernameEmpty => write!(f, "Username cannot be empty"),
            Self::UsernameTooLong => write!(f, "Username is too long (max 255 characters)"),
            Self::UsernameWhitespace => write!(f, "Username cannot contain whitespace"),
            Self::MessageTooLong => write!(f, "Message is too long (max 1000 characters)"),
            Self::UnknownDecision(value) => {
                write!(f, "Status must be \"accepted\" or \"rejected\", got \"{value}\"")
            }
        }
    }
}

impl std::error::Error for ValidationError {}
