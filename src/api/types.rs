use serde::{Deserialize, Serialize};

use crate::AuthError;

// Request DTOs

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTeamRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InviteMemberRequest {
    pub team_id: i64,
    pub invitee_username: String,
}

/// `status` is `"accepted"` or `"rejected"`.
#[derive(Debug, Deserialize)]
pub struct RespondToInviteRequest {
    pub invite_id: i64,
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinTeamRequest {
    #[serde(default)]
    pub message: String,
}

/// `status` is `"accepted"` or `"rejected"`.
#[derive(Debug, Deserialize)]
pub struct RespondToJoinRequest {
    pub request_id: i64,
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTeamsQuery {
    pub search: Option<String>,
}

// Response DTOs

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<AuthError> for ErrorResponse {
    fn from(err: AuthError) -> Self {
        ErrorResponse {
            code: err.code().to_owned(),
            error: err.to_string(),
        }
    }
}
