use std::fmt;

use serde::Serialize;

/// The verified identity a request executes on behalf of.
///
/// Only [`crate::jwt::JwtService`] produces actors from inbound requests;
/// tests and trusted callers may build one with [`Actor::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Actor {
    username: String,
}

impl Actor {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn into_username(self) -> String {
        self.username
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}
