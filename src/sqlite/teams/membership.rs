//! `SQLite` implementation of [`MembershipStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::AuthError;
use crate::sqlite::{is_foreign_key_violation, is_unique_violation, store_error};
use crate::teams::{
    MembershipStore, NewTeam, Role, TEAM_NAME_TAKEN, Team, TeamChanges, TeamDetails, TeamMember,
};

const TEAM_COLUMNS: &str = "id, name, description, created_at, updated_at";
const MEMBER_COLUMNS: &str = "team_id, username, role, joined_at";

/// `SQLite`-backed team and member store.
#[derive(Clone)]
pub struct SqliteMembershipStore {
    pool: SqlitePool,
}

impl SqliteMembershipStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct TeamRecord {
    id: i64,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TeamRecord> for Team {
    fn from(row: TeamRecord) -> Self {
        Team {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct MemberRecord {
    team_id: i64,
    username: String,
    role: String,
    joined_at: DateTime<Utc>,
}

impl TryFrom<MemberRecord> for TeamMember {
    type Error = AuthError;

    fn try_from(row: MemberRecord) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role).ok_or_else(|| {
            AuthError::Unavailable(format!("unknown role in storage: {}", row.role))
        })?;

        Ok(TeamMember {
            team_id: row.team_id,
            username: row.username,
            role,
            joined_at: row.joined_at,
        })
    }
}

fn name_taken_or(operation: &'static str, e: sqlx::Error) -> AuthError {
    if is_unique_violation(&e) {
        AuthError::Validation(TEAM_NAME_TAKEN.to_owned())
    } else {
        store_error(operation, e)
    }
}

#[async_trait]
impl MembershipStore for SqliteMembershipStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn create_team(&self, data: NewTeam) -> Result<TeamDetails, AuthError> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("create_team", e))?;

        let team: TeamRecord = sqlx::query_as(&format!(
            "INSERT INTO teams (name, description, created_at, updated_at) \
             VALUES (?, ?, ?, ?) RETURNING {TEAM_COLUMNS}"
        ))
        .bind(&data.name)
        .bind(&data.description)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| name_taken_or("create_team", e))?;

        let founder: MemberRecord = sqlx::query_as(&format!(
            "INSERT INTO team_members (team_id, username, role, joined_at) \
             VALUES (?, ?, ?, ?) RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(team.id)
        .bind(&data.founder)
        .bind(Role::Admin.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| store_error("create_team_founder", e))?;

        tx.commit()
            .await
            .map_err(|e| store_error("create_team", e))?;

        Ok(TeamDetails {
            team: team.into(),
            members: vec![founder.try_into()?],
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_team(&self, team_id: i64) -> Result<Option<Team>, AuthError> {
        let row: Option<TeamRecord> =
            sqlx::query_as(&format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = ?"))
                .bind(team_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| store_error("find_team", e))?;

        Ok(row.map(Into::into))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_team_by_name(&self, name: &str) -> Result<Option<Team>, AuthError> {
        let row: Option<TeamRecord> =
            sqlx::query_as(&format!("SELECT {TEAM_COLUMNS} FROM teams WHERE name = ?"))
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| store_error("find_team_by_name", e))?;

        Ok(row.map(Into::into))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn search_teams(&self, search: Option<&str>) -> Result<Vec<Team>, AuthError> {
        let rows: Vec<TeamRecord> = match search {
            Some(needle) => sqlx::query_as(&format!(
                "SELECT {TEAM_COLUMNS} FROM teams \
                 WHERE instr(lower(name), lower(?)) > 0 ORDER BY id"
            ))
            .bind(needle)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query_as(&format!("SELECT {TEAM_COLUMNS} FROM teams ORDER BY id"))
                .fetch_all(&self.pool)
                .await,
        }
        .map_err(|e| store_error("search_teams", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_teams_by_member(&self, username: &str) -> Result<Vec<Team>, AuthError> {
        let rows: Vec<TeamRecord> = sqlx::query_as(
            r"
            SELECT t.id, t.name, t.description, t.created_at, t.updated_at
            FROM teams t
            JOIN team_members m ON m.team_id = t.id
            WHERE m.username = ?
            ORDER BY t.id
            ",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("find_teams_by_member", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn update_team(
        &self,
        team_id: i64,
        changes: TeamChanges,
    ) -> Result<Option<Team>, AuthError> {
        let row: Option<TeamRecord> = sqlx::query_as(&format!(
            r"
            UPDATE teams
            SET name = COALESCE(?, name), description = COALESCE(?, description), updated_at = ?
            WHERE id = ?
            RETURNING {TEAM_COLUMNS}
            "
        ))
        .bind(changes.name)
        .bind(changes.description)
        .bind(Utc::now())
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| name_taken_or("update_team", e))?;

        Ok(row.map(Into::into))
    }

    /// Members go with the team through `ON DELETE CASCADE`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn delete_team(&self, team_id: i64) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM teams WHERE id = ?")
            .bind(team_id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("delete_team", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_member(
        &self,
        team_id: i64,
        username: &str,
    ) -> Result<Option<TeamMember>, AuthError> {
        let row: Option<MemberRecord> = sqlx::query_as(&format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members WHERE team_id = ? AND username = ?"
        ))
        .bind(team_id)
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("find_member", e))?;

        row.map(TryInto::try_into).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_members(&self, team_id: i64) -> Result<Vec<TeamMember>, AuthError> {
        let rows: Vec<MemberRecord> = sqlx::query_as(&format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members WHERE team_id = ? ORDER BY id ASC"
        ))
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("find_members", e))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Upserts on (team, username); an existing row is returned unchanged.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn add_member(
        &self,
        team_id: i64,
        username: &str,
        role: Role,
    ) -> Result<TeamMember, AuthError> {
        let row: MemberRecord = sqlx::query_as(&format!(
            r"
            INSERT INTO team_members (team_id, username, role, joined_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (team_id, username) DO UPDATE SET username = excluded.username
            RETURNING {MEMBER_COLUMNS}
            "
        ))
        .bind(team_id)
        .bind(username)
        .bind(role.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AuthError::NotFound("team")
            } else {
                store_error("add_member", e)
            }
        })?;

        row.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn remove_member(&self, team_id: i64, username: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM team_members WHERE team_id = ? AND username = ?")
            .bind(team_id)
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("remove_member", e))?;

        Ok(result.rows_affected() > 0)
    }
}
