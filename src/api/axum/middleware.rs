use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use super::error::AppError;
use super::routes::TeamsState;
use crate::teams::{InvitationLedger, MembershipStore};
use crate::{Actor, AuthError};

/// Verifies the bearer token in the `Authorization` header and yields the
/// caller's identity.
#[derive(Debug, Clone)]
pub struct AuthenticatedActor(pub Actor);

impl AuthenticatedActor {
    pub fn into_inner(self) -> Actor {
        self.0
    }

    pub fn actor(&self) -> &Actor {
        &self.0
    }
}

impl<S, L> FromRequestParts<TeamsState<S, L>> for AuthenticatedActor
where
    S: MembershipStore + 'static,
    L: InvitationLedger + 'static,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &TeamsState<S, L>,
    ) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(AUTHORIZATION) {
            None => None,
            Some(value) => Some(value.to_str().map_err(|_| AppError(AuthError::InvalidToken))?),
        };

        let actor = state.verifier.verify_header(header)?;
        Ok(Self(actor))
    }
}
