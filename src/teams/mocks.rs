#![allow(clippy::significant_drop_tightening)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::store::{
    INVITATION_PENDING, InvitationLedger, JOIN_REQUEST_PENDING, MembershipStore, NewInvitation,
    NewJoinRequest, NewTeam, TEAM_NAME_TAKEN, TeamChanges,
};
use super::types::{Invitation, JoinRequest, Role, Status, Team, TeamDetails, TeamMember};
use crate::AuthError;

fn poisoned<T>(_: T) -> AuthError {
    AuthError::Unavailable("lock poisoned".into())
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

async fn sleep_ms(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[derive(Default)]
struct MembershipState {
    teams: BTreeMap<i64, Team>,
    /// Kept in insertion order, which is join order.
    members: Vec<TeamMember>,
    next_id: i64,
}

/// In-memory [`MembershipStore`].
///
/// Clones share state. Supports fault injection for tests: failing member
/// writes, a fixed delay before every call, and a delay after a member write
/// has landed.
#[derive(Clone, Default)]
pub struct MockMembershipStore {
    state: Arc<RwLock<MembershipState>>,
    fail_member_writes: Arc<AtomicBool>,
    latency_ms: Arc<AtomicU64>,
    member_ack_ms: Arc<AtomicU64>,
}

impl MockMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `add_member`, `remove_member` and the founder insert of
    /// `create_team` fail with `Unavailable`.
    pub fn fail_member_writes(&self, fail: bool) {
        self.fail_member_writes.store(fail, Ordering::SeqCst);
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(millis(latency), Ordering::SeqCst);
    }

    /// Delays the answer of `add_member` by `delay` after the row is written.
    pub fn delay_member_acks(&self, delay: Duration) {
        self.member_ack_ms.store(millis(delay), Ordering::SeqCst);
    }

    async fn delay(&self) {
        sleep_ms(self.latency_ms.load(Ordering::SeqCst)).await;
    }

    fn check_member_writes(&self) -> Result<(), AuthError> {
        if self.fail_member_writes.load(Ordering::SeqCst) {
            return Err(AuthError::Unavailable("membership write failed".into()));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MembershipState>, AuthError> {
        self.state.read().map_err(poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MembershipState>, AuthError> {
        self.state.write().map_err(poisoned)
    }

    fn insert_member(
        &self,
        team_id: i64,
        username: &str,
        role: Role,
    ) -> Result<TeamMember, AuthError> {
        let mut state = self.write()?;

        if !state.teams.contains_key(&team_id) {
            return Err(AuthError::NotFound("team"));
        }
        if let Some(existing) = state
            .members
            .iter()
            .find(|m| m.team_id == team_id && m.username == username)
        {
            return Ok(existing.clone());
        }

        let member = TeamMember {
            team_id,
            username: username.to_owned(),
            role,
            joined_at: Utc::now(),
        };
        state.members.push(member.clone());
        Ok(member)
    }
}

#[async_trait]
impl MembershipStore for MockMembershipStore {
    async fn create_team(&self, data: NewTeam) -> Result<TeamDetails, AuthError> {
        self.delay().await;
        let mut state = self.write()?;

        if state.teams.values().any(|t| t.name == data.name) {
            return Err(AuthError::Validation(TEAM_NAME_TAKEN.to_owned()));
        }
        // a failed founder insert keeps nothing
        self.check_member_writes()?;

        state.next_id += 1;
        let now = Utc::now();
        let team = Team {
            id: state.next_id,
            name: data.name,
            description: data.description,
            created_at: now,
            updated_at: now,
        };
        let founder = TeamMember {
            team_id: team.id,
            username: data.founder,
            role: Role::Admin,
            joined_at: now,
        };

        state.teams.insert(team.id, team.clone());
        state.members.push(founder.clone());

        Ok(TeamDetails {
            team,
            members: vec![founder],
        })
    }

    async fn find_team(&self, team_id: i64) -> Result<Option<Team>, AuthError> {
        self.delay().await;
        Ok(self.read()?.teams.get(&team_id).cloned())
    }

    async fn find_team_by_name(&self, name: &str) -> Result<Option<Team>, AuthError> {
        self.delay().await;
        Ok(self.read()?.teams.values().find(|t| t.name == name).cloned())
    }

    async fn search_teams(&self, search: Option<&str>) -> Result<Vec<Team>, AuthError> {
        self.delay().await;
        let needle = search.map(str::to_lowercase);
        let state = self.read()?;
        Ok(state
            .teams
            .values()
            .filter(|t| {
                needle
                    .as_deref()
                    .map_or(true, |n| t.name.to_lowercase().contains(n))
            })
            .cloned()
            .collect())
    }

    async fn find_teams_by_member(&self, username: &str) -> Result<Vec<Team>, AuthError> {
        self.delay().await;
        let state = self.read()?;
        Ok(state
            .teams
            .values()
            .filter(|t| {
                state
                    .members
                    .iter()
                    .any(|m| m.team_id == t.id && m.username == username)
            })
            .cloned()
            .collect())
    }

    async fn update_team(
        &self,
        team_id: i64,
        changes: TeamChanges,
    ) -> Result<Option<Team>, AuthError> {
        self.delay().await;
        let mut state = self.write()?;

        if let Some(name) = &changes.name {
            if state.teams.values().any(|t| t.id != team_id && &t.name == name) {
                return Err(AuthError::Validation(TEAM_NAME_TAKEN.to_owned()));
            }
        }

        let Some(team) = state.teams.get_mut(&team_id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            team.name = name;
        }
        if let Some(description) = changes.description {
            team.description = description;
        }
        team.updated_at = Utc::now();

        Ok(Some(team.clone()))
    }

    async fn delete_team(&self, team_id: i64) -> Result<bool, AuthError> {
        self.delay().await;
        let mut state = self.write()?;
        let existed = state.teams.remove(&team_id).is_some();
        state.members.retain(|m| m.team_id != team_id);
        Ok(existed)
    }

    async fn find_member(
        &self,
        team_id: i64,
        username: &str,
    ) -> Result<Option<TeamMember>, AuthError> {
        self.delay().await;
        Ok(self
            .read()?
            .members
            .iter()
            .find(|m| m.team_id == team_id && m.username == username)
            .cloned())
    }

    async fn find_members(&self, team_id: i64) -> Result<Vec<TeamMember>, AuthError> {
        self.delay().await;
        Ok(self
            .read()?
            .members
            .iter()
            .filter(|m| m.team_id == team_id)
            .cloned()
            .collect())
    }

    async fn add_member(
        &self,
        team_id: i64,
        username: &str,
        role: Role,
    ) -> Result<TeamMember, AuthError> {
        self.delay().await;
        self.check_member_writes()?;
        let member = self.insert_member(team_id, username, role)?;
        sleep_ms(self.member_ack_ms.load(Ordering::SeqCst)).await;
        Ok(member)
    }

    async fn remove_member(&self, team_id: i64, username: &str) -> Result<bool, AuthError> {
        self.delay().await;
        self.check_member_writes()?;
        let mut state = self.write()?;
        let before = state.members.len();
        state
            .members
            .retain(|m| !(m.team_id == team_id && m.username == username));
        Ok(state.members.len() < before)
    }
}

#[derive(Default)]
struct LedgerState {
    invitations: BTreeMap<i64, Invitation>,
    join_requests: BTreeMap<i64, JoinRequest>,
    next_invitation_id: i64,
    next_request_id: i64,
}

/// In-memory [`InvitationLedger`]. Clones share state.
#[derive(Clone, Default)]
pub struct MockInvitationLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl MockInvitationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>, AuthError> {
        self.state.read().map_err(poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, AuthError> {
        self.state.write().map_err(poisoned)
    }
}

#[async_trait]
impl InvitationLedger for MockInvitationLedger {
    async fn create_invitation(&self, data: NewInvitation) -> Result<Invitation, AuthError> {
        let now = Utc::now();
        let mut state = self.write()?;

        let same_pair = |i: &Invitation| i.team_id == data.team_id && i.invitee == data.invitee;
        if state.invitations.values().any(|i| same_pair(i) && i.is_live_at(now)) {
            return Err(AuthError::Conflict(INVITATION_PENDING));
        }
        state
            .invitations
            .retain(|_, i| !(same_pair(&*i) && i.is_pending()));

        state.next_invitation_id += 1;
        let invitation = Invitation {
            id: state.next_invitation_id,
            team_id: data.team_id,
            inviter: data.inviter,
            invitee: data.invitee,
            status: Status::Pending,
            created_at: now,
            updated_at: now,
            expires_at: data.expires_at,
        };
        state.invitations.insert(invitation.id, invitation.clone());
        Ok(invitation)
    }

    async fn find_invitation(&self, id: i64) -> Result<Option<Invitation>, AuthError> {
        Ok(self.read()?.invitations.get(&id).cloned())
    }

    async fn find_pending_invitations_by_invitee(
        &self,
        invitee: &str,
    ) -> Result<Vec<Invitation>, AuthError> {
        Ok(self
            .read()?
            .invitations
            .values()
            .filter(|i| i.invitee == invitee && i.is_pending())
            .cloned()
            .collect())
    }

    async fn find_pending_invitations_by_team(
        &self,
        team_id: i64,
    ) -> Result<Vec<Invitation>, AuthError> {
        Ok(self
            .read()?
            .invitations
            .values()
            .filter(|i| i.team_id == team_id && i.is_pending())
            .cloned()
            .collect())
    }

    async fn transition_invitation(
        &self,
        id: i64,
        from: Status,
        to: Status,
    ) -> Result<Option<Invitation>, AuthError> {
        let mut state = self.write()?;
        match state.invitations.get_mut(&id) {
            Some(invitation) if invitation.status == from => {
                invitation.status = to;
                invitation.updated_at = Utc::now();
                Ok(Some(invitation.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_expired_invitations(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut state = self.write()?;
        let before = state.invitations.len();
        state
            .invitations
            .retain(|_, i| !(i.is_pending() && i.is_expired_at(now)));
        Ok((before - state.invitations.len()) as u64)
    }

    async fn delete_team_records(&self, team_id: i64) -> Result<u64, AuthError> {
        let mut state = self.write()?;
        let before = state.invitations.len() + state.join_requests.len();
        state.invitations.retain(|_, i| i.team_id != team_id);
        state.join_requests.retain(|_, r| r.team_id != team_id);
        Ok((before - state.invitations.len() - state.join_requests.len()) as u64)
    }

    async fn create_join_request(&self, data: NewJoinRequest) -> Result<JoinRequest, AuthError> {
        let mut state = self.write()?;

        if state.join_requests.values().any(|r| {
            r.team_id == data.team_id && r.username == data.username && r.is_pending()
        }) {
            return Err(AuthError::Conflict(JOIN_REQUEST_PENDING));
        }

        state.next_request_id += 1;
        let now = Utc::now();
        let request = JoinRequest {
            id: state.next_request_id,
            team_id: data.team_id,
            username: data.username,
            message: data.message,
            status: Status::Pending,
            created_at: now,
            updated_at: now,
        };
        state.join_requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn find_join_request(&self, id: i64) -> Result<Option<JoinRequest>, AuthError> {
        Ok(self.read()?.join_requests.get(&id).cloned())
    }

    async fn find_pending_join_requests_by_team(
        &self,
        team_id: i64,
    ) -> Result<Vec<JoinRequest>, AuthError> {
        Ok(self
            .read()?
            .join_requests
            .values()
            .filter(|r| r.team_id == team_id && r.is_pending())
            .cloned()
            .collect())
    }

    async fn transition_join_request(
        &self,
        id: i64,
        from: Status,
        to: Status,
    ) -> Result<Option<JoinRequest>, AuthError> {
        let mut state = self.write()?;
        match state.join_requests.get_mut(&id) {
            Some(request) if request.status == from => {
                request.status = to;
                request.updated_at = Utc::now();
                Ok(Some(request.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn new_team(name: &str) -> NewTeam {
        NewTeam {
            name: name.to_owned(),
            description: String::new(),
            founder: "alice".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_create_team_records_founder() {
        let store = MockMembershipStore::new();
        let details = store.create_team(new_team("Eng")).await.unwrap();

        assert_eq!(details.members.len(), 1);
        let founder = store.find_member(details.team.id, "alice").await.unwrap().unwrap();
        assert_eq!(founder.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_duplicate_team_name() {
        let store = MockMembershipStore::new();
        store.create_team(new_team("Eng")).await.unwrap();

        let result = store.create_team(new_team("Eng")).await;
        assert_eq!(result.unwrap_err(), AuthError::Validation(TEAM_NAME_TAKEN.to_owned()));
    }

    #[tokio::test]
    async fn test_add_member_is_idempotent() {
        let store = MockMembershipStore::new();
        let team = store.create_team(new_team("Eng")).await.unwrap().team;

        let first = store.add_member(team.id, "bob", Role::Member).await.unwrap();
        let second = store.add_member(team.id, "bob", Role::Admin).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.find_members(team.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let ledger = MockInvitationLedger::new();
        let invitation = ledger
            .create_invitation(NewInvitation {
                team_id: 1,
                inviter: "alice".to_owned(),
                invitee: "bob".to_owned(),
                expires_at: Utc::now() + Duration::days(7),
            })
            .await
            .unwrap();

        let won = ledger
            .transition_invitation(invitation.id, Status::Pending, Status::Accepted)
            .await
            .unwrap();
        let lost = ledger
            .transition_invitation(invitation.id, Status::Pending, Status::Rejected)
            .await
            .unwrap();

        assert_eq!(won.unwrap().status, Status::Accepted);
        assert!(lost.is_none());
    }

    #[tokio::test]
    async fn test_delete_expired_keeps_live_and_resolved() {
        let ledger = MockInvitationLedger::new();
        let now = Utc::now();
        let expiries = [("bob", now - Duration::hours(1)), ("carol", now + Duration::hours(1))];
        for (invitee, expires_at) in expiries {
            ledger
                .create_invitation(NewInvitation {
                    team_id: 1,
                    inviter: "alice".to_owned(),
                    invitee: invitee.to_owned(),
                    expires_at,
                })
                .await
                .unwrap();
        }

        assert_eq!(ledger.delete_expired_invitations(now).await.unwrap(), 1);
        assert_eq!(ledger.find_pending_invitations_by_team(1).await.unwrap().len(), 1);
    }

    fn invitation_for(invitee: &str, expires_at: DateTime<Utc>) -> NewInvitation {
        NewInvitation {
            team_id: 1,
            inviter: "alice".to_owned(),
            invitee: invitee.to_owned(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_one_live_invitation_per_invitee() {
        let ledger = MockInvitationLedger::new();
        let now = Utc::now();
        ledger
            .create_invitation(invitation_for("bob", now + Duration::days(1)))
            .await
            .unwrap();

        let second = ledger
            .create_invitation(invitation_for("bob", now + Duration::days(1)))
            .await;
        assert_eq!(second.unwrap_err(), AuthError::Conflict(INVITATION_PENDING));

        // another invitee of the same team is unaffected
        assert!(ledger
            .create_invitation(invitation_for("carol", now + Duration::days(1)))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_expired_invitation_is_replaced() {
        let ledger = MockInvitationLedger::new();
        let stale = ledger
            .create_invitation(invitation_for("bob", Utc::now() - Duration::hours(1)))
            .await
            .unwrap();

        let fresh = ledger
            .create_invitation(invitation_for("bob", Utc::now() + Duration::days(1)))
            .await
            .unwrap();

        assert!(ledger.find_invitation(stale.id).await.unwrap().is_none());
        let pending = ledger.find_pending_invitations_by_invitee("bob").await.unwrap();
        assert_eq!(pending, vec![fresh]);
    }

    #[tokio::test]
    async fn test_one_pending_join_request_per_user() {
        let ledger = MockInvitationLedger::new();
        let request = NewJoinRequest {
            team_id: 1,
            username: "carol".to_owned(),
            message: String::new(),
        };

        let first = ledger.create_join_request(request.clone()).await.unwrap();
        let second = ledger.create_join_request(request.clone()).await;
        assert_eq!(second.unwrap_err(), AuthError::Conflict(JOIN_REQUEST_PENDING));

        ledger
            .transition_join_request(first.id, Status::Pending, Status::Rejected)
            .await
            .unwrap();
        assert!(ledger.create_join_request(request).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_founder_insert_keeps_nothing() {
        let store = MockMembershipStore::new();
        store.fail_member_writes(true);

        let result = store.create_team(new_team("Eng")).await;
        assert!(matches!(result, Err(AuthError::Unavailable(_))));
        assert!(store.find_team_by_name("Eng").await.unwrap().is_none());
        assert!(store.search_teams(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prune_keeps_invitation_at_expiry_instant() {
        let ledger = MockInvitationLedger::new();
        let now = Utc::now();
        ledger.create_invitation(invitation_for("bob", now)).await.unwrap();

        assert_eq!(ledger.delete_expired_invitations(now).await.unwrap(), 0);
        let later = now + Duration::milliseconds(1);
        assert_eq!(ledger.delete_expired_invitations(later).await.unwrap(), 1);
    }
}
