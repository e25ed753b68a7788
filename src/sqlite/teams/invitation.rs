//! `SQLite` implementation of [`InvitationLedger`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::AuthError;
use crate::sqlite::{is_unique_violation, store_error};
use crate::teams::{
    INVITATION_PENDING, Invitation, InvitationLedger, JOIN_REQUEST_PENDING, JoinRequest,
    NewInvitation, NewJoinRequest, Status,
};

const INVITATION_COLUMNS: &str =
    "id, team_id, inviter, invitee, status, created_at, updated_at, expires_at";
const JOIN_REQUEST_COLUMNS: &str = "id, team_id, username, message, status, created_at, updated_at";

/// `SQLite`-backed invitation and join request ledger.
#[derive(Clone)]
pub struct SqliteInvitationLedger {
    pool: SqlitePool,
}

impl SqliteInvitationLedger {
    /// Create a new ledger with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn parse_status(raw: &str) -> Result<Status, AuthError> {
    Status::parse(raw)
        .ok_or_else(|| AuthError::Unavailable(format!("unknown status in storage: {raw}")))
}

/// The pending-record unique indexes turn a racing duplicate into `Conflict`.
fn pending_exists_or(operation: &'static str, reason: &'static str, e: sqlx::Error) -> AuthError {
    if is_unique_violation(&e) {
        AuthError::Conflict(reason)
    } else {
        store_error(operation, e)
    }
}

#[derive(FromRow)]
struct InvitationRecord {
    id: i64,
    team_id: i64,
    inviter: String,
    invitee: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<InvitationRecord> for Invitation {
    type Error = AuthError;

    fn try_from(row: InvitationRecord) -> Result<Self, Self::Error> {
        Ok(Invitation {
            id: row.id,
            team_id: row.team_id,
            inviter: row.inviter,
            invitee: row.invitee,
            status: parse_status(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            expires_at: row.expires_at,
        })
    }
}

#[derive(FromRow)]
struct JoinRequestRecord {
    id: i64,
    team_id: i64,
    username: String,
    message: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JoinRequestRecord> for JoinRequest {
    type Error = AuthError;

    fn try_from(row: JoinRequestRecord) -> Result<Self, Self::Error> {
        Ok(JoinRequest {
            id: row.id,
            team_id: row.team_id,
            username: row.username,
            message: row.message,
            status: parse_status(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl InvitationLedger for SqliteInvitationLedger {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn create_invitation(&self, data: NewInvitation) -> Result<Invitation, AuthError> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("create_invitation", e))?;

        // an expired pending row would otherwise hold the pending unique index
        sqlx::query(
            r"
            DELETE FROM team_invitations
            WHERE team_id = ? AND invitee = ? AND status = ? AND expires_at < ?
            ",
        )
        .bind(data.team_id)
        .bind(&data.invitee)
        .bind(Status::Pending.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| store_error("create_invitation", e))?;

        let row: InvitationRecord = sqlx::query_as(&format!(
            r"
            INSERT INTO team_invitations
                (team_id, inviter, invitee, status, created_at, updated_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {INVITATION_COLUMNS}
            "
        ))
        .bind(data.team_id)
        .bind(&data.inviter)
        .bind(&data.invitee)
        .bind(Status::Pending.as_str())
        .bind(now)
        .bind(now)
        .bind(data.expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| pending_exists_or("create_invitation", INVITATION_PENDING, e))?;

        tx.commit()
            .await
            .map_err(|e| store_error("create_invitation", e))?;

        row.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_invitation(&self, id: i64) -> Result<Option<Invitation>, AuthError> {
        let row: Option<InvitationRecord> = sqlx::query_as(&format!(
            "SELECT {INVITATION_COLUMNS} FROM team_invitations WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("find_invitation", e))?;

        row.map(TryInto::try_into).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_pending_invitations_by_invitee(
        &self,
        invitee: &str,
    ) -> Result<Vec<Invitation>, AuthError> {
        let rows: Vec<InvitationRecord> = sqlx::query_as(&format!(
            r"
            SELECT {INVITATION_COLUMNS} FROM team_invitations
            WHERE invitee = ? AND status = ?
            ORDER BY id
            "
        ))
        .bind(invitee)
        .bind(Status::Pending.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("find_pending_invitations_by_invitee", e))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_pending_invitations_by_team(
        &self,
        team_id: i64,
    ) -> Result<Vec<Invitation>, AuthError> {
        let rows: Vec<InvitationRecord> = sqlx::query_as(&format!(
            r"
            SELECT {INVITATION_COLUMNS} FROM team_invitations
            WHERE team_id = ? AND status = ?
            ORDER BY id
            "
        ))
        .bind(team_id)
        .bind(Status::Pending.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("find_pending_invitations_by_team", e))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Compare-and-set on `status`; `None` if the row is gone or no longer `from`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn transition_invitation(
        &self,
        id: i64,
        from: Status,
        to: Status,
    ) -> Result<Option<Invitation>, AuthError> {
        let row: Option<InvitationRecord> = sqlx::query_as(&format!(
            r"
            UPDATE team_invitations SET status = ?, updated_at = ?
            WHERE id = ? AND status = ?
            RETURNING {INVITATION_COLUMNS}
            "
        ))
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(from.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("transition_invitation", e))?;

        row.map(TryInto::try_into).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn delete_expired_invitations(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM team_invitations WHERE status = ? AND expires_at < ?")
            .bind(Status::Pending.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("delete_expired_invitations", e))?;

        Ok(result.rows_affected())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn delete_team_records(&self, team_id: i64) -> Result<u64, AuthError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("delete_team_records", e))?;

        let invitations = sqlx::query("DELETE FROM team_invitations WHERE team_id = ?")
            .bind(team_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("delete_team_invitations", e))?;

        let requests = sqlx::query("DELETE FROM team_join_requests WHERE team_id = ?")
            .bind(team_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("delete_team_join_requests", e))?;

        tx.commit()
            .await
            .map_err(|e| store_error("delete_team_records", e))?;

        Ok(invitations.rows_affected() + requests.rows_affected())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn create_join_request(&self, data: NewJoinRequest) -> Result<JoinRequest, AuthError> {
        let now = Utc::now();
        let row: JoinRequestRecord = sqlx::query_as(&format!(
            r"
            INSERT INTO team_join_requests
                (team_id, username, message, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {JOIN_REQUEST_COLUMNS}
            "
        ))
        .bind(data.team_id)
        .bind(&data.username)
        .bind(&data.message)
        .bind(Status::Pending.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| pending_exists_or("create_join_request", JOIN_REQUEST_PENDING, e))?;

        row.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_join_request(&self, id: i64) -> Result<Option<JoinRequest>, AuthError> {
        let row: Option<JoinRequestRecord> = sqlx::query_as(&format!(
            "SELECT {JOIN_REQUEST_COLUMNS} FROM team_join_requests WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("find_join_request", e))?;

        row.map(TryInto::try_into).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_pending_join_requests_by_team(
        &self,
        team_id: i64,
    ) -> Result<Vec<JoinRequest>, AuthError> {
        let rows: Vec<JoinRequestRecord> = sqlx::query_as(&format!(
            r"
            SELECT {JOIN_REQUEST_COLUMNS} FROM team_join_requests
            WHERE team_id = ? AND status = ?
            ORDER BY id
            "
        ))
        .bind(team_id)
        .bind(Status::Pending.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("find_pending_join_requests_by_team", e))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn transition_join_request(
        &self,
        id: i64,
        from: Status,
        to: Status,
    ) -> Result<Option<JoinRequest>, AuthError> {
        let row: Option<JoinRequestRecord> = sqlx::query_as(&format!(
            r"
            UPDATE team_join_requests SET status = ?, updated_at = ?
            WHERE id = ? AND status = ?
            RETURNING {JOIN_REQUEST_COLUMNS}
            "
        ))
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(from.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("transition_join_request", e))?;

        row.map(TryInto::try_into).transpose()
    }
}
