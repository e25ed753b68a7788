//! Embedded database migrations for `SQLite`.
//!
//! Migrations are embedded at compile time, run in order and tracked in the
//! `_team_service_migrations` table, so running them again is a no-op.
//!
//! # Example
//!
//! ```rust,ignore
//! use team_service::sqlite::migrations;
//! use sqlx::SqlitePool;
//!
//! async fn setup_database(pool: &SqlitePool) -> Result<(), sqlx::Error> {
//!     migrations::run(pool).await?;
//!     Ok(())
//! }
//! ```

use sqlx::{Executor, SqlitePool};

use crate::LOG_TARGET;

const TEAMS_MIGRATIONS: &[(&str, &str)] = &[
    (
        "20250301000001_create_teams_table",
        include_str!("../../migrations_sqlite/teams/20250301000001_create_teams_table.sql"),
    ),
    (
        "20250301000002_create_team_members_table",
        include_str!("../../migrations_sqlite/teams/20250301000002_create_team_members_table.sql"),
    ),
    (
        "20250301000003_create_team_invitations_table",
        include_str!(
            "../../migrations_sqlite/teams/20250301000003_create_team_invitations_table.sql"
        ),
    ),
    (
        "20250301000004_create_team_join_requests_table",
        include_str!(
            "../../migrations_sqlite/teams/20250301000004_create_team_join_requests_table.sql"
        ),
    ),
    (
        "20250301000005_create_pending_unique_indexes",
        include_str!(
            "../../migrations_sqlite/teams/20250301000005_create_pending_unique_indexes.sql"
        ),
    ),
];

/// Runs every migration that has not been applied yet.
pub async fn run(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    pool.execute(
        r"
        CREATE TABLE IF NOT EXISTS _team_service_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        ",
    )
    .await?;

    run_migrations(pool, TEAMS_MIGRATIONS).await
}

/// Applies each migration and its tracking row in one transaction.
///
/// # Limitations
///
/// Statements are split on `;`, so migrations must not contain semicolons
/// inside string literals.
async fn run_migrations(
    pool: &SqlitePool,
    migrations: &[(&str, &str)],
) -> Result<(), sqlx::Error> {
    for (name, sql) in migrations {
        let applied: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM _team_service_migrations WHERE name = ?)",
        )
        .bind(*name)
        .fetch_one(pool)
        .await?;

        if applied {
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                (&mut *tx).execute(trimmed).await?;
            }
        }
        sqlx::query("INSERT INTO _team_service_migrations (name) VALUES (?)")
            .bind(*name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        log::info!(target: LOG_TARGET, "msg=\"migration applied\", name=\"{name}\"");
    }
    Ok(())
}
