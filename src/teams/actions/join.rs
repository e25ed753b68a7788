use crate::teams::store::{InvitationLedger, MembershipStore, NewJoinRequest, JOIN_REQUEST_PENDING};
use crate::teams::{Decision, JoinRequest, Role, Status, TeamAction, TeamEngine};
use crate::validators::validate_join_message;
use crate::{Actor, AuthError, LOG_TARGET};

const ALREADY_PROCESSED: &str = "join request has already been processed";

impl<S, L> TeamEngine<S, L>
where
    S: MembershipStore,
    L: InvitationLedger,
{
    /// Asks to be admitted to a team. Join requests do not expire.
    #[cfg_attr(feature = "tracing", tracing::instrument(name = "request_to_join", skip_all, err))]
    pub async fn request_to_join(
        &self,
        actor: &Actor,
        team_id: i64,
        message: &str,
    ) -> Result<JoinRequest, AuthError> {
        let message = message.trim();
        validate_join_message(message)?;

        if self
            .bounded("find_team", self.store.find_team(team_id))
            .await?
            .is_none()
        {
            return Err(AuthError::NotFound("team"));
        }
        if self.role_of(team_id, actor.username()).await?.is_some() {
            return Err(AuthError::Conflict("you are already a member of this team"));
        }

        let pending = self
            .bounded(
                "find_pending_join_requests_by_team",
                self.ledger.find_pending_join_requests_by_team(team_id),
            )
            .await?;
        if pending.iter().any(|r| r.username == actor.username()) {
            return Err(AuthError::Conflict(JOIN_REQUEST_PENDING));
        }

        let request = self
            .bounded(
                "create_join_request",
                self.ledger.create_join_request(NewJoinRequest {
                    team_id,
                    username: actor.username().to_owned(),
                    message: message.to_owned(),
                }),
            )
            .await?;

        log::info!(
            target: LOG_TARGET,
            "msg=\"join request created\", request_id={}, team_id={team_id}, username=\"{actor}\"",
            request.id
        );

        Ok(request)
    }

    /// Resolves a join request. Admin of the request's team only.
    ///
    /// Same compare-and-set and rollback rules as
    /// [`TeamEngine::respond_to_invite`].
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "respond_to_join_request", skip_all, err)
    )]
    pub async fn respond_to_join_request(
        &self,
        actor: &Actor,
        request_id: i64,
        decision: Decision,
    ) -> Result<JoinRequest, AuthError> {
        let request = self
            .bounded("find_join_request", self.ledger.find_join_request(request_id))
            .await?
            .ok_or(AuthError::NotFound("join request"))?;

        self.require(actor, request.team_id, TeamAction::ReviewJoinRequests)
            .await?;

        if !request.is_pending() {
            return Err(AuthError::Conflict(ALREADY_PROCESSED));
        }

        let updated = self
            .bounded(
                "transition_join_request",
                self.ledger
                    .transition_join_request(request_id, Status::Pending, decision.status()),
            )
            .await?
            .ok_or(AuthError::Conflict(ALREADY_PROCESSED))?;

        if decision == Decision::Accepted {
            let admitted = self
                .bounded(
                    "add_member",
                    self.store
                        .add_member(request.team_id, &request.username, Role::Member),
                )
                .await;

            if let Err(err) = admitted {
                if !self
                    .write_landed(&err, request.team_id, &request.username)
                    .await
                {
                    self.reopen_join_request(request_id, decision.status()).await;
                    return Err(err);
                }
                log::warn!(
                    target: LOG_TARGET,
                    "msg=\"membership write timed out but landed, join request stays accepted\", request_id={request_id}"
                );
            }
        }

        log::info!(
            target: LOG_TARGET,
            "msg=\"join request {}\", request_id={request_id}, team_id={}, username=\"{}\", reviewer=\"{actor}\"",
            updated.status,
            updated.team_id,
            updated.username
        );

        Ok(updated)
    }

    /// Pending join requests of a team. Admin only.
    pub async fn list_join_requests(
        &self,
        actor: &Actor,
        team_id: i64,
    ) -> Result<Vec<JoinRequest>, AuthError> {
        self.require(actor, team_id, TeamAction::ReviewJoinRequests)
            .await?;

        self.bounded(
            "find_pending_join_requests_by_team",
            self.ledger.find_pending_join_requests_by_team(team_id),
        )
        .await
    }

    async fn reopen_join_request(&self, request_id: i64, from: Status) {
        let reverted = self
            .bounded(
                "transition_join_request",
                self.ledger
                    .transition_join_request(request_id, from, Status::Pending),
            )
            .await;

        match reverted {
            Ok(Some(_)) => log::warn!(
                target: LOG_TARGET,
                "msg=\"membership write failed, join request reopened\", request_id={request_id}"
            ),
            Ok(None) => log::error!(
                target: LOG_TARGET,
                "msg=\"failed to reopen join request, status changed concurrently\", request_id={request_id}"
            ),
            Err(e) => log::error!(
                target: LOG_TARGET,
                "msg=\"failed to reopen join request\", request_id={request_id}, error=\"{e}\""
            ),
        }
    }
}
