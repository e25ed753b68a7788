//! Role-based access rules for team actions.
//!
//! Admins may perform every [`TeamAction`]; members and non-members may
//! perform none of them. Actions available to any authenticated user
//! (creating a team, responding to one's own invitation, asking to join)
//! are not listed here.

use std::fmt;

use super::types::Role;

/// An operation on a team that requires a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeamAction {
    UpdateTeam,
    DeleteTeam,
    InviteMember,
    RemoveMember,
    ListInvitations,
    ReviewJoinRequests,
}

impl TeamAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UpdateTeam => "update_team",
            Self::DeleteTeam => "delete_team",
            Self::InviteMember => "invite_member",
            Self::RemoveMember => "remove_member",
            Self::ListInvitations => "list_invitations",
            Self::ReviewJoinRequests => "review_join_requests",
        }
    }

    fn denial(self) -> &'static str {
        match self {
            Self::UpdateTeam => "only team admins can update the team",
            Self::DeleteTeam => "only team admins can delete the team",
            Self::InviteMember => "only team admins can invite members",
            Self::RemoveMember => "only team admins can remove members",
            Self::ListInvitations => "only team admins can view invitations",
            Self::ReviewJoinRequests => "only team admins can review join requests",
        }
    }
}

impl fmt::Display for TeamAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Denied(&'static str),
}

impl Access {
    pub fn is_allowed(self) -> bool {
        self == Self::Allowed
    }
}

/// Decides whether a holder of `role` (or a non-member, for `None`) may
/// perform `action`.
pub fn evaluate(role: Option<Role>, action: TeamAction) -> Access {
    match role {
        Some(Role::Admin) => Access::Allowed,
        Some(Role::Member) | None => Access::Denied(action.denial()),
    }
}
