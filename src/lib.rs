//! Team membership and invitation authorization.
//!
//! Callers are identified by a bearer token minted by a separate issuer and
//! verified here with a shared secret ([`jwt::JwtService`]). Every mutation of
//! a team, its members, its invitations and its join requests goes through
//! [`teams::TeamEngine`], which checks the caller's role and then performs the
//! state transition against a [`teams::MembershipStore`] and a
//! [`teams::InvitationLedger`].

pub mod actor;
pub mod config;
pub mod jwt;
pub mod teams;
pub mod validators;

#[cfg(feature = "axum_api")]
pub mod api;
#[cfg(feature = "sqlx_sqlite")]
pub mod sqlite;

pub use actor::Actor;
pub use config::{EngineConfig, ServiceConfig};

use std::fmt;

/// Log target shared by every module of this crate.
pub(crate) const LOG_TARGET: &str = "team_service";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header was sent.
    MissingToken,
    /// Malformed header, wrong algorithm, bad signature or expired token.
    InvalidToken,
    /// The named resource does not exist.
    NotFound(&'static str),
    /// The caller is authenticated but not permitted to do this.
    Forbidden(&'static str),
    /// The requested state transition is not valid from the current state.
    Conflict(&'static str),
    /// Malformed input.
    Validation(String),
    /// A store call exceeded its time budget.
    Timeout,
    /// The store failed or could not be reached.
    Unavailable(String),
    ConfigurationError(String),
}

impl std::error::Error for AuthError {}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "authorization header is required"),
            AuthError::InvalidToken => write!(f, "invalid token"),
            AuthError::NotFound(what) => write!(f, "{what} not found"),
            AuthError::Forbidden(reason) | AuthError::Conflict(reason) => write!(f, "{reason}"),
            AuthError::Validation(msg) => write!(f, "{msg}"),
            AuthError::Timeout => write!(f, "store operation timed out"),
            AuthError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            AuthError::ConfigurationError(msg) => write!(f, "configuration error: {msg}"),
        }
    }
}

impl AuthError {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::NotFound(_) => "NOT_FOUND",
            AuthError::Forbidden(_) => "FORBIDDEN",
            AuthError::Conflict(_) => "CONFLICT",
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::Timeout => "TIMEOUT",
            AuthError::Unavailable(_) => "UNAVAILABLE",
            AuthError::ConfigurationError(_) => "CONFIGURATION_ERROR",
        }
    }
}

impl From<validators::ValidationError> for AuthError {
    fn from(err: validators::ValidationError) -> Self {
        AuthError::Validation(err.to_string())
    }
}
