mod actions;
mod engine;
mod policy;
mod store;
mod types;

pub use engine::TeamEngine;
pub use policy::{Access, TeamAction, evaluate};
pub use store::{
    INVITATION_PENDING, InvitationLedger, JOIN_REQUEST_PENDING, MembershipStore, NewInvitation,
    NewJoinRequest, NewTeam, TEAM_NAME_TAKEN, TeamChanges,
};
pub use types::{
    Decision, Invitation, JoinRequest, Removal, Role, Status, Team, TeamDetails, TeamMember,
};

#[cfg(any(test, feature = "mocks"))]
mod mocks;

#[cfg(any(test, feature = "mocks"))]
pub use mocks::{MockInvitationLedger, MockMembershipStore};
