mod invitation;
mod membership;

pub use invitation::SqliteInvitationLedger;
pub use membership::SqliteMembershipStore;
