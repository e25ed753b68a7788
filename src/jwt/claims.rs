use serde::{Deserialize, Serialize};

use crate::{Actor, AuthError};

/// Claims carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The authenticated username.
    pub username: String,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Issued at time (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl JwtClaims {
    /// Returns the actor named by the claims.
    pub fn actor(&self) -> Result<Actor, AuthError> {
        if self.username.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }
        Ok(Actor::new(self.username.clone()))
    }
}
