use std::future::Future;

use super::policy::{self, Access, TeamAction};
use super::store::{InvitationLedger, MembershipStore};
use super::types::Role;
use crate::{Actor, AuthError, EngineConfig, LOG_TARGET};

/// Authorization engine for teams, invitations and join requests.
///
/// Holds the injected stores; every operation checks the caller's role
/// before touching state and bounds each store call by
/// [`EngineConfig::store_timeout`]. Operations live in `teams::actions`.
///
/// # Example
///
/// ```rust,ignore
/// let engine = TeamEngine::new(membership_store, invitation_ledger);
/// let team = engine.create_team(&alice, "Eng", "").await?;
/// engine.invite_member(&alice, team.team.id, "bob").await?;
/// ```
pub struct TeamEngine<S, L>
where
    S: MembershipStore,
    L: InvitationLedger,
{
    pub(crate) store: S,
    pub(crate) ledger: L,
    pub(crate) config: EngineConfig,
}

impl<S, L> TeamEngine<S, L>
where
    S: MembershipStore,
    L: InvitationLedger,
{
    pub fn new(store: S, ledger: L) -> Self {
        Self::with_config(store, ledger, EngineConfig::default())
    }

    pub fn with_config(store: S, ledger: L, config: EngineConfig) -> Self {
        Self {
            store,
            ledger,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs one store call under the configured time budget.
    pub(crate) async fn bounded<T, F>(&self, op: &'static str, call: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, AuthError>>,
    {
        if let Ok(result) = tokio::time::timeout(self.config.store_timeout, call).await {
            result
        } else {
            log::warn!(
                target: LOG_TARGET,
                "msg=\"store call timed out\", op=\"{op}\", timeout_ms={}",
                self.config.store_timeout.as_millis()
            );
            Err(AuthError::Timeout)
        }
    }

    /// The role `username` holds in the team, if any.
    pub async fn role_of(&self, team_id: i64, username: &str) -> Result<Option<Role>, AuthError> {
        let member = self
            .bounded("find_member", self.store.find_member(team_id, username))
            .await?;
        Ok(member.map(|m| m.role))
    }

    /// Decides whether `actor` may perform `action` on the team.
    pub async fn authorize(
        &self,
        actor: &Actor,
        team_id: i64,
        action: TeamAction,
    ) -> Result<Access, AuthError> {
        let role = self.role_of(team_id, actor.username()).await?;
        Ok(policy::evaluate(role, action))
    }

    /// Whether a membership write that failed with `err` landed anyway.
    ///
    /// Only a timeout leaves the outcome unknown: the store may still commit
    /// after the call was abandoned, so the member row is read back.
    pub(crate) async fn write_landed(
        &self,
        err: &AuthError,
        team_id: i64,
        username: &str,
    ) -> bool {
        if *err != AuthError::Timeout {
            return false;
        }
        matches!(self.role_of(team_id, username).await, Ok(Some(_)))
    }

    /// Like [`TeamEngine::authorize`], with a denial turned into `Forbidden`.
    pub(crate) async fn require(
        &self,
        actor: &Actor,
        team_id: i64,
        action: TeamAction,
    ) -> Result<(), AuthError> {
        match self.authorize(actor, team_id, action).await? {
            Access::Allowed => Ok(()),
            Access::Denied(reason) => {
                log::info!(
                    target: LOG_TARGET,
                    "msg=\"action denied\", action=\"{action}\", team_id={team_id}, username=\"{actor}\""
                );
                Err(AuthError::Forbidden(reason))
            }
        }
    }
}
