//! Route configuration for the Axum API.

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};

use super::handlers;
use crate::jwt::JwtService;
use crate::teams::{InvitationLedger, MembershipStore, TeamEngine};

/// Application state shared by every handler.
pub struct TeamsState<S, L>
where
    S: MembershipStore,
    L: InvitationLedger,
{
    pub engine: Arc<TeamEngine<S, L>>,
    pub verifier: Arc<JwtService>,
}

impl<S, L> TeamsState<S, L>
where
    S: MembershipStore,
    L: InvitationLedger,
{
    pub fn new(engine: TeamEngine<S, L>, verifier: JwtService) -> Self {
        Self {
            engine: Arc::new(engine),
            verifier: Arc::new(verifier),
        }
    }
}

impl<S, L> Clone for TeamsState<S, L>
where
    S: MembershipStore,
    L: InvitationLedger,
{
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            verifier: Arc::clone(&self.verifier),
        }
    }
}

/// Creates all team routes, to be nested under `/teams`.
///
/// # Routes
///
/// ## Teams
/// - `POST /` - Create a team (caller becomes admin)
/// - `GET /` - List teams, `?search=` filters by name (public)
/// - `GET /user` - Teams of the caller
/// - `GET /{id}` - Team with members (public)
/// - `PUT /{id}` - Update team (admin)
/// - `DELETE /{id}` - Delete team (admin)
///
/// ## Invitations
/// - `POST /invite` - Invite a user (admin)
/// - `POST /invite/respond` - Accept or reject an invitation (invitee)
/// - `GET /invites` - Pending invitations of the caller
/// - `GET /{id}/invitations` - Pending invitations of a team (admin)
///
/// ## Join requests
/// - `POST /{id}/join-requests` - Ask to join
/// - `GET /{id}/join-requests` - Pending requests (admin)
/// - `POST /join-requests/respond` - Accept or reject a request (admin)
///
/// ## Members
/// - `DELETE /members/{team_id}/{username}` - Remove a member (admin)
pub fn teams_routes<S, L>() -> Router<TeamsState<S, L>>
where
    S: MembershipStore + 'static,
    L: InvitationLedger + 'static,
{
    Router::new()
        .route(
            "/",
            post(handlers::create_team::<S, L>).get(handlers::list_teams::<S, L>),
        )
        .route("/user", get(handlers::get_user_teams::<S, L>))
        .route("/invites", get(handlers::get_user_invites::<S, L>))
        .route("/invite", post(handlers::invite_member::<S, L>))
        .route("/invite/respond", post(handlers::respond_to_invite::<S, L>))
        .route(
            "/join-requests/respond",
            post(handlers::respond_to_join_request::<S, L>),
        )
        .route(
            "/members/{team_id}/{username}",
            delete(handlers::remove_member::<S, L>),
        )
        .route(
            "/{id}",
            get(handlers::get_team::<S, L>)
                .put(handlers::update_team::<S, L>)
                .delete(handlers::delete_team::<S, L>),
        )
        .route(
            "/{id}/invitations",
            get(handlers::list_team_invitations::<S, L>),
        )
        .route(
            "/{id}/join-requests",
            post(handlers::request_to_join::<S, L>).get(handlers::list_join_requests::<S, L>),
        )
}

/// The complete application: `/teams/...` plus `GET /health`.
pub fn router<S, L>(state: TeamsState<S, L>) -> Router
where
    S: MembershipStore + 'static,
    L: InvitationLedger + 'static,
{
    Router::new()
        .route("/health", get(handlers::health))
        .nest("/teams", teams_routes::<S, L>())
        .with_state(state)
}
