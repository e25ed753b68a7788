use crate::teams::store::{InvitationLedger, MembershipStore, NewTeam, TeamChanges, TEAM_NAME_TAKEN};
use crate::teams::{Team, TeamAction, TeamDetails, TeamEngine};
use crate::validators::validate_team_name;
use crate::{Actor, AuthError, LOG_TARGET};

impl<S, L> TeamEngine<S, L>
where
    S: MembershipStore,
    L: InvitationLedger,
{
    /// Creates a team with `actor` as its only admin.
    ///
    /// # Returns
    ///
    /// - `Ok(details)` - the team and its single admin member
    /// - `Err(AuthError::Validation)` - empty, too long or taken name
    #[cfg_attr(feature = "tracing", tracing::instrument(name = "create_team", skip_all, err))]
    pub async fn create_team(
        &self,
        actor: &Actor,
        name: &str,
        description: &str,
    ) -> Result<TeamDetails, AuthError> {
        let name = validate_team_name(name)?;
        self.ensure_name_free(name, None).await?;

        let details = self
            .bounded(
                "create_team",
                self.store.create_team(NewTeam {
                    name: name.to_owned(),
                    description: description.trim().to_owned(),
                    founder: actor.username().to_owned(),
                }),
            )
            .await?;

        log::info!(
            target: LOG_TARGET,
            "msg=\"team created\", team_id={}, admin=\"{actor}\"",
            details.team.id
        );

        Ok(details)
    }

    /// Returns a team with its members in join order. Needs no caller.
    #[cfg_attr(feature = "tracing", tracing::instrument(name = "get_team", skip(self), err))]
    pub async fn get_team(&self, team_id: i64) -> Result<TeamDetails, AuthError> {
        let team = self
            .bounded("find_team", self.store.find_team(team_id))
            .await?
            .ok_or(AuthError::NotFound("team"))?;
        let members = self
            .bounded("find_members", self.store.find_members(team_id))
            .await?;

        Ok(TeamDetails { team, members })
    }

    /// Lists teams, optionally filtered by a case-insensitive name fragment.
    pub async fn list_teams(&self, search: Option<&str>) -> Result<Vec<Team>, AuthError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        self.bounded("search_teams", self.store.search_teams(search))
            .await
    }

    /// Teams the actor is a member of, in any role.
    pub async fn get_user_teams(&self, actor: &Actor) -> Result<Vec<Team>, AuthError> {
        self.bounded(
            "find_teams_by_member",
            self.store.find_teams_by_member(actor.username()),
        )
        .await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(name = "update_team", skip_all, err))]
    pub async fn update_team(
        &self,
        actor: &Actor,
        team_id: i64,
        changes: TeamChanges,
    ) -> Result<Team, AuthError> {
        self.require(actor, team_id, TeamAction::UpdateTeam).await?;

        let name = match changes.name.as_deref() {
            Some(raw) => {
                let name = validate_team_name(raw)?;
                self.ensure_name_free(name, Some(team_id)).await?;
                Some(name.to_owned())
            }
            None => None,
        };
        let changes = TeamChanges {
            name,
            description: changes.description.map(|d| d.trim().to_owned()),
        };

        let team = self
            .bounded("update_team", self.store.update_team(team_id, changes))
            .await?
            .ok_or(AuthError::NotFound("team"))?;

        log::info!(
            target: LOG_TARGET,
            "msg=\"team updated\", team_id={team_id}, username=\"{actor}\""
        );

        Ok(team)
    }

    /// Deletes a team, its members, and then its invitations and join requests.
    #[cfg_attr(feature = "tracing", tracing::instrument(name = "delete_team", skip_all, err))]
    pub async fn delete_team(&self, actor: &Actor, team_id: i64) -> Result<(), AuthError> {
        self.require(actor, team_id, TeamAction::DeleteTeam).await?;

        if !self
            .bounded("delete_team", self.store.delete_team(team_id))
            .await?
        {
            return Err(AuthError::NotFound("team"));
        }

        let records = self
            .bounded("delete_team_records", self.ledger.delete_team_records(team_id))
            .await?;

        log::info!(
            target: LOG_TARGET,
            "msg=\"team deleted\", team_id={team_id}, username=\"{actor}\", ledger_records={records}"
        );

        Ok(())
    }

    async fn ensure_name_free(&self, name: &str, except: Option<i64>) -> Result<(), AuthError> {
        let existing = self
            .bounded("find_team_by_name", self.store.find_team_by_name(name))
            .await?;

        match existing {
            Some(team) if Some(team.id) != except => {
                Err(AuthError::Validation(TEAM_NAME_TAKEN.to_owned()))
            }
            _ => Ok(()),
        }
    }
}
