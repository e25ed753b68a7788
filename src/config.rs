//! Configuration for the team service.
//!
//! [`ServiceConfig`] holds everything the binary needs to start; the engine
//! only sees the [`EngineConfig`] subset.
//!
//! # Example
//!
//! ```rust
//! use team_service::config::{EngineConfig, ServiceConfig};
//! use chrono::{Duration, Utc};
//!
//! let engine = EngineConfig {
//!     invitation_expiry: Duration::days(14),
//!     ..Default::default()
//! };
//!
//! let config = ServiceConfig::new("a-shared-secret-of-at-least-32-bytes")
//!     .with_database_url("sqlite:teams.db")
//!     .with_engine(engine);
//! assert_eq!(config.engine.invitation_expiry, Duration::days(14));
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};

use crate::AuthError;
use crate::jwt::JwtConfig;

/// Default HTTP port of the team service.
pub const DEFAULT_PORT: u16 = 8084;

/// Settings the authorization engine applies to every operation.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a new invitation stays acceptable.
    ///
    /// Default: 7 days
    pub invitation_expiry: Duration,

    /// Upper bound for every single store call made by the engine.
    ///
    /// Default: 5 seconds
    pub store_timeout: StdDuration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            invitation_expiry: Duration::days(7),
            store_timeout: StdDuration::from_secs(5),
        }
    }
}

/// Process-level configuration.
#[derive(Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    /// Shared HS256 secret; must match the issuer's.
    pub jwt_secret: String,
    /// Lifetime of tokens minted by [`crate::jwt::JwtService::issue`].
    ///
    /// Default: 72 hours
    pub token_expiry: Duration,
    pub engine: EngineConfig,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("max_connections", &self.max_connections)
            .field("jwt_secret", &"[REDACTED]")
            .field("token_expiry", &self.token_expiry)
            .field("engine", &self.engine)
            .finish()
    }
}

impl ServiceConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: "sqlite:team_service.db".to_owned(),
            max_connections: 5,
            jwt_secret: jwt_secret.into(),
            token_expiry: Duration::hours(72),
            engine: EngineConfig::default(),
        }
    }

    /// Reads the configuration from process environment variables.
    ///
    /// `JWT_SECRET` is required. Optional: `PORT`, `DATABASE_URL`,
    /// `DB_MAX_CONNECTIONS`, `TOKEN_EXPIRY_HOURS`, `INVITATION_EXPIRY_DAYS`,
    /// `STORE_TIMEOUT_MS`. Counts and lifetimes must be positive, and a
    /// lifetime must fit on the calendar when added to the current time.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServiceConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::ConfigurationError("JWT_SECRET is not set".to_owned()))?;

        let mut config = Self::new(secret);

        if let Some(port) = parse_var(&lookup, "PORT")? {
            config.port = port;
        }
        if let Some(url) = lookup("DATABASE_URL").filter(|s| !s.is_empty()) {
            config.database_url = url;
        }
        if let Some(max) = positive_var(&lookup, "DB_MAX_CONNECTIONS")? {
            config.max_connections = max;
        }
        if let Some(hours) = positive_var(&lookup, "TOKEN_EXPIRY_HOURS")? {
            config.token_expiry = lifetime("TOKEN_EXPIRY_HOURS", hours, Duration::try_hours)?;
        }
        if let Some(days) = positive_var(&lookup, "INVITATION_EXPIRY_DAYS")? {
            config.engine.invitation_expiry =
                lifetime("INVITATION_EXPIRY_DAYS", days, Duration::try_days)?;
        }
        if let Some(ms) = positive_var(&lookup, "STORE_TIMEOUT_MS")? {
            config.engine.store_timeout = StdDuration::from_millis(ms);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Address the HTTP listener binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    /// Builds the token configuration, validating the secret length.
    pub fn jwt(&self) -> Result<JwtConfig, AuthError> {
        Ok(JwtConfig::new(self.jwt_secret.clone())?.with_expiry(self.token_expiry))
    }
}

fn invalid_value(key: &str, raw: impl fmt::Display) -> AuthError {
    AuthError::ConfigurationError(format!("{key} has an invalid value: {raw}"))
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, AuthError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| invalid_value(key, raw)),
    }
}

fn positive_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, AuthError>
where
    T: std::str::FromStr + PartialOrd + Default + fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match parse_var::<T, F>(lookup, key)? {
        Some(value) if value <= T::default() => Err(invalid_value(key, value)),
        parsed => Ok(parsed),
    }
}

/// Builds a lifetime that can be added to the current time without overflow.
fn lifetime(
    key: &str,
    amount: i64,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration, AuthError> {
    unit(amount)
        .filter(|d| Utc::now().checked_add_signed(*d).is_some())
        .ok_or_else(|| invalid_value(key, amount))
}
