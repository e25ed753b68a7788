use chrono::Duration;
use std::fmt;

use crate::AuthError;

/// Minimum required length for the shared secret in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Configuration for token signing and validation.
#[derive(Clone)]
pub struct JwtConfig {
    /// Shared secret used for HS256.
    pub(crate) secret: String,
    /// Lifetime of issued tokens. Default: 72 hours.
    pub(crate) expiry: Duration,
    /// Clock skew tolerated on `exp`, in seconds. Default: 0.
    pub(crate) leeway: u64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("expiry", &self.expiry)
            .field("leeway", &self.leeway)
            .finish()
    }
}

impl JwtConfig {
    /// Creates a new configuration with the given secret.
    ///
    /// # Errors
    /// Returns `AuthError::ConfigurationError` if the secret is shorter than
    /// [`MIN_SECRET_LENGTH`] bytes.
    pub fn new(secret: impl Into<String>) -> Result<Self, AuthError> {
        let secret = secret.into();

        if secret.len() < MIN_SECRET_LENGTH {
            return Err(AuthError::ConfigurationError(format!(
                "JWT secret must be at least {MIN_SECRET_LENGTH} bytes, got {}",
                secret.len()
            )));
        }

        Ok(Self {
            secret,
            expiry: Duration::hours(72),
            leeway: 0,
        })
    }

    /// Sets the lifetime of issued tokens.
    #[must_use]
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    /// Sets the tolerated clock skew for expiry checks.
    #[must_use]
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway = seconds;
        self
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }
}
