use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::{JwtClaims, JwtConfig};
use crate::{Actor, AuthError, LOG_TARGET};

/// Signs and verifies bearer tokens with a shared HS256 secret.
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        // the accepted algorithm list is fixed here, never taken from the token
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            config,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// Mints a token for `username` with the configured lifetime.
    ///
    /// This mirrors what the external issuer produces.
    pub fn issue(&self, username: &str) -> Result<String, AuthError> {
        self.issue_with_expiry(username, self.config.expiry())
    }

    /// Mints a token valid for `expiry` from now.
    ///
    /// A negative `expiry` mints an already expired token.
    pub fn issue_with_expiry(&self, username: &str, expiry: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(expiry).ok_or_else(|| {
            AuthError::ConfigurationError("token expiry is out of range".to_owned())
        })?;
        let claims = JwtClaims {
            username: username.to_owned(),
            exp: expires_at.timestamp(),
            iat: Some(now.timestamp()),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::ConfigurationError(format!("failed to sign token: {e}")))
    }

    /// Decodes and validates a token, returning its claims.
    pub fn decode(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let token_data =
            jsonwebtoken::decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
                .map_err(|e| {
                    log::debug!(
                        target: LOG_TARGET,
                        "msg=\"token rejected\", reason=\"{:?}\"",
                        e.kind()
                    );
                    AuthError::InvalidToken
                })?;

        Ok(token_data.claims)
    }

    /// Validates a raw token and returns the actor it names.
    pub fn verify(&self, token: &str) -> Result<Actor, AuthError> {
        self.decode(token)?.actor()
    }

    /// Validates the value of an `Authorization` header.
    ///
    /// - `None` → `AuthError::MissingToken`
    /// - anything but `Bearer <token>` → `AuthError::InvalidToken`
    pub fn verify_header(&self, header: Option<&str>) -> Result<Actor, AuthError> {
        let header = header.ok_or(AuthError::MissingToken)?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.contains(' '))
            .ok_or(AuthError::InvalidToken)?;

        self.verify(token)
    }

    pub fn expiry(&self) -> Duration {
        self.config.expiry()
    }
}
