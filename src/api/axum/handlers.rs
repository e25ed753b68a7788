use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::error::AppError;
use super::middleware::AuthenticatedActor;
use super::routes::TeamsState;
use crate::api::{
    CreateTeamRequest, HealthResponse, InviteMemberRequest, JoinTeamRequest, ListTeamsQuery,
    RespondToInviteRequest, RespondToJoinRequest, UpdateTeamRequest,
};
use crate::teams::{Decision, InvitationLedger, MembershipStore, TeamChanges};

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

pub async fn create_team<S, L>(
    State(state): State<TeamsState<S, L>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(body): Json<CreateTeamRequest>,
) -> Result<impl IntoResponse, AppError>
where
    S: MembershipStore + 'static,
    L: InvitationLedger + 'static,
{
    let details = state
        .engine
        .create_team(&actor, &body.name, &body.description)
        .await?;

    Ok((StatusCode::CREATED, Json(details)))
}

pub async fn list_teams<S, L>(
    State(state): State<TeamsState<S, L>>,
    Query(query): Query<ListTeamsQuery>,
) -> Result<impl IntoResponse, AppError>
where
    S: MembershipStore + 'static,
    L: InvitationLedger + 'static,
{
    let teams = state.engine.list_teams(query.search.as_deref()).await?;
    Ok(Json(teams))
}

pub async fn get_user_teams<S, L>(
    State(state): State<TeamsState<S, L>>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<impl IntoResponse, AppError>
where
    S: MembershipStore + 'static,
    L: InvitationLedger + 'static,
{
    let teams = state.engine.get_user_teams(&actor).await?;
    Ok(Json(teams))
}

pub async fn get_team<S, L>(
    State(state): State<TeamsState<S, L>>,
    Path(team_id): Path<i64>,
) -> Result<impl IntoResponse, AppError>
where
    S: MembershipStore + 'static,
    L: InvitationLedger + 'static,
{
    let details = state.engine.get_team(team_id).await?;
    Ok(Json(details))
}

pub async fn update_team<S, L>(
    State(state): State<TeamsState<S, L>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(team_id): Path<i64>,
    Json(body): Json<UpdateTeamRequest>,
) -> Result<impl IntoResponse, AppError>
where
    S: MembershipStore + 'static,
    L: InvitationLedger + 'static,
{
    let changes = TeamChanges {
        name: body.name,
        description: body.description,
    };
    let team = state.engine.update_team(&actor, team_id, changes).await?;
    Ok(Json(team))
}

pub async fn delete_team<S, L>(
    State(state): State<TeamsState<S, L>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(team_id): Path<i64>,
) -> Result<impl IntoResponse, AppError>
where
    S: MembershipStore + 'static,
    L: InvitationLedger + 'static,
{
    state.engine.delete_team(&actor, team_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn invite_member<S, L>(
    State(state): State<TeamsState<S, L>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(body): Json<InviteMemberRequest>,
) -> Result<impl IntoResponse, AppError>
where
    S: MembershipStore + 'static,
    L: InvitationLedger + 'static,
{
    let invitation = state
        .engine
        .invite_member(&actor, body.team_id, &body.invitee_username)
        .await?;

    Ok((StatusCode::CREATED, Json(invitation)))
}

pub async fn respond_to_invite<S, L>(
    State(state): State<TeamsState<S, L>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(body): Json<RespondToInviteRequest>,
) -> Result<impl IntoResponse, AppError>
where
    S: MembershipStore + 'static,
    L: InvitationLedger + 'static,
{
    let decision: Decision = body.status.parse()?;
    let invitation = state
        .engine
        .respond_to_invite(&actor, body.invite_id, decision)
        .await?;

    Ok(Json(invitation))
}

pub async fn get_user_invites<S, L>(
    State(state): State<TeamsState<S, L>>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<impl IntoResponse, AppError>
where
    S: MembershipStore + 'static,
    L: InvitationLedger + 'static,
{
    let invitations = state.engine.get_user_invites(&actor).await?;
    Ok(Json(invitations))
}

pub async fn list_team_invitations<S, L>(
    State(state): State<TeamsState<S, L>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(team_id): Path<i64>,
) -> Result<impl IntoResponse, AppError>
where
    S: MembershipStore + 'static,
    L: InvitationLedger + 'static,
{
    let invitations = state.engine.list_team_invitations(&actor, team_id).await?;
    Ok(Json(invitations))
}

pub async fn request_to_join<S, L>(
    State(state): State<TeamsState<S, L>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(team_id): Path<i64>,
    body: Option<Json<JoinTeamRequest>>,
) -> Result<impl IntoResponse, AppError>
where
    S: MembershipStore + 'static,
    L: InvitationLedger + 'static,
{
    let message = body.map(|Json(b)| b.message).unwrap_or_default();
    let request = state
        .engine
        .request_to_join(&actor, team_id, &message)
        .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_join_requests<S, L>(
    State(state): State<TeamsState<S, L>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(team_id): Path<i64>,
) -> Result<impl IntoResponse, AppError>
where
    S: MembershipStore + 'static,
    L: InvitationLedger + 'static,
{
    let requests = state.engine.list_join_requests(&actor, team_id).await?;
    Ok(Json(requests))
}

pub async fn respond_to_join_request<S, L>(
    State(state): State<TeamsState<S, L>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(body): Json<RespondToJoinRequest>,
) -> Result<impl IntoResponse, AppError>
where
    S: MembershipStore + 'static,
    L: InvitationLedger + 'static,
{
    let decision: Decision = body.status.parse()?;
    let request = state
        .engine
        .respond_to_join_request(&actor, body.request_id, decision)
        .await?;

    Ok(Json(request))
}

/// Answers 204 both when the member was removed and when they were already gone.
pub async fn remove_member<S, L>(
    State(state): State<TeamsState<S, L>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path((team_id, username)): Path<(i64, String)>,
) -> Result<impl IntoResponse, AppError>
where
    S: MembershipStore + 'static,
    L: InvitationLedger + 'static,
{
    state.engine.remove_member(&actor, team_id, &username).await?;
    Ok(StatusCode::NO_CONTENT)
}
