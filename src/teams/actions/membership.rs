use crate::teams::store::{InvitationLedger, MembershipStore};
use crate::teams::{Removal, TeamAction, TeamEngine};
use crate::{Actor, AuthError, LOG_TARGET};

impl<S, L> TeamEngine<S, L>
where
    S: MembershipStore,
    L: InvitationLedger,
{
    /// Removes a non-admin member from the team.
    ///
    /// Removing someone who is not a member is a no-op success, so repeated
    /// or concurrent removals all end with the target absent.
    ///
    /// # Returns
    ///
    /// - `Ok(Removal::Removed)` - the member was deleted by this call
    /// - `Ok(Removal::AlreadyAbsent)` - the target was not a member
    /// - `Err(AuthError::Forbidden)` - the actor is not an admin, or the target is one
    #[cfg_attr(feature = "tracing", tracing::instrument(name = "remove_member", skip_all, err))]
    pub async fn remove_member(
        &self,
        actor: &Actor,
        team_id: i64,
        target: &str,
    ) -> Result<Removal, AuthError> {
        self.require(actor, team_id, TeamAction::RemoveMember).await?;

        let Some(member) = self
            .bounded("find_member", self.store.find_member(team_id, target))
            .await?
        else {
            return Ok(Removal::AlreadyAbsent);
        };

        // admins are never removed through this path, so a team keeps its admin
        if member.role.is_admin() {
            return Err(AuthError::Forbidden("cannot remove an admin"));
        }

        let removed = self
            .bounded("remove_member", self.store.remove_member(team_id, target))
            .await?;

        if !removed {
            return Ok(Removal::AlreadyAbsent);
        }

        log::info!(
            target: LOG_TARGET,
            "msg=\"member removed\", team_id={team_id}, username=\"{target}\", removed_by=\"{actor}\""
        );

        Ok(Removal::Removed)
    }
}
