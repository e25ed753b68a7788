use chrono::Utc;

use crate::teams::store::{InvitationLedger, MembershipStore, NewInvitation, INVITATION_PENDING};
use crate::teams::{Decision, Invitation, Role, Status, TeamAction, TeamEngine};
use crate::validators::validate_username;
use crate::{Actor, AuthError, LOG_TARGET};

const ALREADY_MEMBER: &str = "user is already a member of this team";
const NOT_INVITEE: &str = "this invitation is not addressed to you";
const ALREADY_PROCESSED: &str = "invitation has already been processed";
const EXPIRED: &str = "invitation has expired";

impl<S, L> TeamEngine<S, L>
where
    S: MembershipStore,
    L: InvitationLedger,
{
    /// Invites `invitee` to the team.
    ///
    /// # Returns
    ///
    /// - `Ok(invitation)` - pending, expiring after the configured lifetime
    /// - `Err(AuthError::Forbidden)` - the actor is not an admin of the team
    /// - `Err(AuthError::Validation)` - the invitee name is malformed
    /// - `Err(AuthError::Conflict)` - already a member, or already has a live invitation
    /// - `Err(AuthError::ConfigurationError)` - the invitation lifetime is not a positive
    ///   duration the calendar can hold
    #[cfg_attr(feature = "tracing", tracing::instrument(name = "invite_member", skip_all, err))]
    pub async fn invite_member(
        &self,
        actor: &Actor,
        team_id: i64,
        invitee: &str,
    ) -> Result<Invitation, AuthError> {
        self.require(actor, team_id, TeamAction::InviteMember).await?;

        let invitee = invitee.trim();
        validate_username(invitee)?;

        if self.role_of(team_id, invitee).await?.is_some() {
            return Err(AuthError::Conflict(ALREADY_MEMBER));
        }

        let now = Utc::now();
        let pending = self
            .bounded(
                "find_pending_invitations_by_invitee",
                self.ledger.find_pending_invitations_by_invitee(invitee),
            )
            .await?;
        if pending
            .iter()
            .any(|i| i.team_id == team_id && i.is_live_at(now))
        {
            return Err(AuthError::Conflict(INVITATION_PENDING));
        }

        let expires_at = now
            .checked_add_signed(self.config.invitation_expiry)
            .filter(|at| *at > now)
            .ok_or_else(|| {
                AuthError::ConfigurationError("invitation expiry is out of range".to_owned())
            })?;

        let invitation = self
            .bounded(
                "create_invitation",
                self.ledger.create_invitation(NewInvitation {
                    team_id,
                    inviter: actor.username().to_owned(),
                    invitee: invitee.to_owned(),
                    expires_at,
                }),
            )
            .await?;

        log::info!(
            target: LOG_TARGET,
            "msg=\"invitation created\", invitation_id={}, team_id={team_id}, inviter=\"{actor}\", invitee=\"{invitee}\"",
            invitation.id
        );

        Ok(invitation)
    }

    /// Accepts or rejects an invitation addressed to `actor`.
    ///
    /// The pending status is swapped with a compare-and-set, so of several
    /// concurrent responses exactly one succeeds. On acceptance the actor is
    /// added as a member; if that write fails the invitation goes back to
    /// pending and the write error is returned. A timed-out write that did
    /// land keeps the invitation accepted.
    #[cfg_attr(feature = "tracing", tracing::instrument(name = "respond_to_invite", skip_all, err))]
    pub async fn respond_to_invite(
        &self,
        actor: &Actor,
        invite_id: i64,
        decision: Decision,
    ) -> Result<Invitation, AuthError> {
        let invitation = self
            .bounded("find_invitation", self.ledger.find_invitation(invite_id))
            .await?
            .ok_or(AuthError::NotFound("invitation"))?;

        if invitation.invitee != actor.username() {
            return Err(AuthError::Forbidden(NOT_INVITEE));
        }
        if !invitation.is_pending() {
            return Err(AuthError::Conflict(ALREADY_PROCESSED));
        }
        // checked at transition time, stored status alone is not enough
        if invitation.is_expired_at(Utc::now()) {
            return Err(AuthError::Conflict(EXPIRED));
        }
        if self
            .bounded("find_team", self.store.find_team(invitation.team_id))
            .await?
            .is_none()
        {
            return Err(AuthError::NotFound("team"));
        }

        let updated = self
            .bounded(
                "transition_invitation",
                self.ledger
                    .transition_invitation(invite_id, Status::Pending, decision.status()),
            )
            .await?
            .ok_or(AuthError::Conflict(ALREADY_PROCESSED))?;

        if decision == Decision::Accepted {
            let admitted = self
                .bounded(
                    "add_member",
                    self.store
                        .add_member(invitation.team_id, actor.username(), Role::Member),
                )
                .await;

            if let Err(err) = admitted {
                if !self
                    .write_landed(&err, invitation.team_id, actor.username())
                    .await
                {
                    self.reopen_invitation(invite_id, decision.status()).await;
                    return Err(err);
                }
                log::warn!(
                    target: LOG_TARGET,
                    "msg=\"membership write timed out but landed, invitation stays accepted\", invitation_id={invite_id}"
                );
            }
        }

        log::info!(
            target: LOG_TARGET,
            "msg=\"invitation {}\", invitation_id={invite_id}, team_id={}, invitee=\"{actor}\"",
            updated.status,
            updated.team_id
        );

        Ok(updated)
    }

    /// Live invitations of a team. Admin only.
    pub async fn list_team_invitations(
        &self,
        actor: &Actor,
        team_id: i64,
    ) -> Result<Vec<Invitation>, AuthError> {
        self.require(actor, team_id, TeamAction::ListInvitations).await?;

        let now = Utc::now();
        let pending = self
            .bounded(
                "find_pending_invitations_by_team",
                self.ledger.find_pending_invitations_by_team(team_id),
            )
            .await?;

        Ok(pending.into_iter().filter(|i| i.is_live_at(now)).collect())
    }

    /// The actor's pending, unexpired invitations.
    pub async fn get_user_invites(&self, actor: &Actor) -> Result<Vec<Invitation>, AuthError> {
        let now = Utc::now();
        let pending = self
            .bounded(
                "find_pending_invitations_by_invitee",
                self.ledger
                    .find_pending_invitations_by_invitee(actor.username()),
            )
            .await?;

        Ok(pending.into_iter().filter(|i| i.is_live_at(now)).collect())
    }

    /// Deletes pending invitations whose expiry has passed.
    ///
    /// Returns the number of deleted invitations.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "prune_expired_invitations", skip_all, err)
    )]
    pub async fn prune_expired_invitations(&self) -> Result<u64, AuthError> {
        let count = self
            .bounded(
                "delete_expired_invitations",
                self.ledger.delete_expired_invitations(Utc::now()),
            )
            .await?;

        log::info!(
            target: LOG_TARGET,
            "msg=\"pruned expired invitations\", count={count}"
        );

        Ok(count)
    }

    async fn reopen_invitation(&self, invite_id: i64, from: Status) {
        let reverted = self
            .bounded(
                "transition_invitation",
                self.ledger
                    .transition_invitation(invite_id, from, Status::Pending),
            )
            .await;

        match reverted {
            Ok(Some(_)) => log::warn!(
                target: LOG_TARGET,
                "msg=\"membership write failed, invitation reopened\", invitation_id={invite_id}"
            ),
            Ok(None) => log::error!(
                target: LOG_TARGET,
                "msg=\"failed to reopen invitation, status changed concurrently\", invitation_id={invite_id}"
            ),
            Err(e) => log::error!(
                target: LOG_TARGET,
                "msg=\"failed to reopen invitation\", invitation_id={invite_id}, error=\"{e}\""
            ),
        }
    }
}
