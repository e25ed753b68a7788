use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::types::{Invitation, JoinRequest, Role, Status, Team, TeamDetails, TeamMember};
use crate::AuthError;

/// Message of the `Validation` error returned for a duplicate team name.
pub const TEAM_NAME_TAKEN: &str = "team name already taken";

/// Message of the `Conflict` error returned for a second live invitation.
pub const INVITATION_PENDING: &str = "a pending invitation already exists for this user";

/// Message of the `Conflict` error returned for a second pending join request.
pub const JOIN_REQUEST_PENDING: &str = "a pending join request already exists";

#[derive(Debug, Clone)]
pub struct NewTeam {
    pub name: String,
    pub description: String,
    /// Recorded as the team's first admin in the same write.
    pub founder: String,
}

/// Fields to change on a team; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct TeamChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub team_id: i64,
    pub inviter: String,
    pub invitee: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewJoinRequest {
    pub team_id: i64,
    pub username: String,
    pub message: String,
}

/// Durable teams and their members.
///
/// Implementations enforce the unique team name and the unique
/// (team, username) member key and nothing else; every business rule lives
/// in [`super::TeamEngine`].
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Inserts the team and its founder as admin atomically.
    ///
    /// A taken name is `AuthError::Validation`.
    async fn create_team(&self, data: NewTeam) -> Result<TeamDetails, AuthError>;
    async fn find_team(&self, team_id: i64) -> Result<Option<Team>, AuthError>;
    async fn find_team_by_name(&self, name: &str) -> Result<Option<Team>, AuthError>;
    /// Teams whose name contains `search` (case-insensitive), ordered by id.
    async fn search_teams(&self, search: Option<&str>) -> Result<Vec<Team>, AuthError>;
    async fn find_teams_by_member(&self, username: &str) -> Result<Vec<Team>, AuthError>;
    /// Returns `None` if the team does not exist.
    async fn update_team(
        &self,
        team_id: i64,
        changes: TeamChanges,
    ) -> Result<Option<Team>, AuthError>;
    /// Deletes the team and all of its members. Returns `false` if it did not exist.
    async fn delete_team(&self, team_id: i64) -> Result<bool, AuthError>;

    async fn find_member(
        &self,
        team_id: i64,
        username: &str,
    ) -> Result<Option<TeamMember>, AuthError>;
    /// Members of a team in join order.
    async fn find_members(&self, team_id: i64) -> Result<Vec<TeamMember>, AuthError>;
    /// Inserts a member, or returns the existing row for (team, username) unchanged.
    async fn add_member(
        &self,
        team_id: i64,
        username: &str,
        role: Role,
    ) -> Result<TeamMember, AuthError>;
    /// Returns `false` if there was nothing to remove.
    async fn remove_member(&self, team_id: i64, username: &str) -> Result<bool, AuthError>;
}

/// Durable invitations and join requests.
///
/// Status changes only through the compare-and-set `transition_*` methods:
/// they apply `to` only if the stored status is still `from` and return
/// `None` otherwise.
#[async_trait]
pub trait InvitationLedger: Send + Sync {
    /// Inserts a pending invitation.
    ///
    /// At most one live invitation exists per (team, invitee): an unexpired
    /// pending one makes this `Conflict(INVITATION_PENDING)`, expired pending
    /// ones for the same pair are dropped in the same write.
    async fn create_invitation(&self, data: NewInvitation) -> Result<Invitation, AuthError>;
    async fn find_invitation(&self, id: i64) -> Result<Option<Invitation>, AuthError>;
    /// Pending invitations addressed to `invitee`, expired ones included.
    async fn find_pending_invitations_by_invitee(
        &self,
        invitee: &str,
    ) -> Result<Vec<Invitation>, AuthError>;
    /// Pending invitations of a team, expired ones included.
    async fn find_pending_invitations_by_team(
        &self,
        team_id: i64,
    ) -> Result<Vec<Invitation>, AuthError>;
    async fn transition_invitation(
        &self,
        id: i64,
        from: Status,
        to: Status,
    ) -> Result<Option<Invitation>, AuthError>;
    /// Deletes pending invitations that expired strictly before `now`.
    async fn delete_expired_invitations(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
    /// Deletes every invitation and join request of a team.
    async fn delete_team_records(&self, team_id: i64) -> Result<u64, AuthError>;

    /// Inserts a pending join request; a pending one for the same
    /// (team, username) makes this `Conflict(JOIN_REQUEST_PENDING)`.
    async fn create_join_request(&self, data: NewJoinRequest) -> Result<JoinRequest, AuthError>;
    async fn find_join_request(&self, id: i64) -> Result<Option<JoinRequest>, AuthError>;
    async fn find_pending_join_requests_by_team(
        &self,
        team_id: i64,
    ) -> Result<Vec<JoinRequest>, AuthError>;
    async fn transition_join_request(
        &self,
        id: i64,
        from: Status,
        to: Status,
    ) -> Result<Option<JoinRequest>, AuthError>;
}
