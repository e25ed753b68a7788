//! `SQLite` implementations of the team stores.
//!
//! Enable the `sqlx_sqlite` feature to use these implementations.

pub mod migrations;
mod teams;

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub use teams::{SqliteInvitationLedger, SqliteMembershipStore};

use crate::{AuthError, LOG_TARGET, ServiceConfig};

/// Opens a connection pool for `config.database_url`.
///
/// An in-memory database lives inside a single connection, so the pool is
/// pinned to one connection that is never recycled.
pub async fn connect(config: &ServiceConfig) -> Result<SqlitePool, AuthError> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| AuthError::ConfigurationError(format!("invalid DATABASE_URL: {e}")))?
        .create_if_missing(true)
        .foreign_keys(true);

    let mut pool = SqlitePoolOptions::new().acquire_timeout(config.engine.store_timeout);

    pool = if config.database_url.contains(":memory:") {
        pool.max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        pool.max_connections(config.max_connections.max(1))
    };

    pool.connect_with(options)
        .await
        .map_err(|e| store_error("connect", e))
}

/// Creates both stores over one pool.
pub fn create_repositories(pool: SqlitePool) -> (SqliteMembershipStore, SqliteInvitationLedger) {
    (
        SqliteMembershipStore::new(pool.clone()),
        SqliteInvitationLedger::new(pool),
    )
}

/// Maps a driver error to the engine's error kinds.
pub(crate) fn store_error(operation: &'static str, e: sqlx::Error) -> AuthError {
    if let sqlx::Error::PoolTimedOut = e {
        log::warn!(
            target: LOG_TARGET,
            "msg=\"database pool timed out\", operation=\"{operation}\""
        );
        return AuthError::Timeout;
    }

    log::error!(
        target: LOG_TARGET,
        "msg=\"database error\", operation=\"{operation}\", error=\"{e}\""
    );
    AuthError::Unavailable(e.to_string())
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

pub(crate) fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation())
}
