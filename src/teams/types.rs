//! Core types for team management.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validators::ValidationError;

/// A named group of users administered by its admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Unique identifier.
    pub id: i64,
    /// Unique, human-readable team name.
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A member's role within one team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    /// Convert to string for database storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    /// Parse from database string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            _ => None,
        }
    }

    pub fn is_admin(self) -> bool {
        self == Self::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Links a username to a team with a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub team_id: i64,
    pub username: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

/// A team together with its members in join order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDetails {
    #[serde(flatten)]
    pub team: Team,
    pub members: Vec<TeamMember>,
}

/// Lifecycle state shared by invitations and join requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Accepted,
    Rejected,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The answer to an invitation or join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Rejected,
}

impl Decision {
    /// The terminal status this decision moves a pending record to.
    pub fn status(self) -> Status {
        match self {
            Self::Accepted => Status::Accepted,
            Self::Rejected => Status::Rejected,
        }
    }
}

impl FromStr for Decision {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(ValidationError::UnknownDecision(other.to_owned())),
        }
    }
}

/// An admin's offer of membership to a named user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: i64,
    pub team_id: i64,
    /// Username of the admin who sent the invitation.
    pub inviter: String,
    /// Username of the only user allowed to respond.
    pub invitee: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Invitation {
    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }

    /// Check if the invitation has expired at `now`.
    ///
    /// The expiry instant itself still counts as valid.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Pending and not yet expired.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && !self.is_expired_at(now)
    }
}

/// A user's request to be admitted to a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub id: i64,
    pub team_id: i64,
    pub username: String,
    pub message: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JoinRequest {
    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }
}

/// Outcome of a member removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Removal {
    Removed,
    /// The target was not a member; nothing changed.
    AlreadyAbsent,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn invitation(expires_at: DateTime<Utc>) -> Invitation {
        let now = Utc::now();
        Invitation {
            id: 1,
            team_id: 1,
            inviter: "alice".to_owned(),
            invitee: "bob".to_owned(),
            status: Status::Pending,
            created_at: now,
            updated_at: now,
            expires_at,
        }
    }

    #[test]
    fn test_role_round_trips_through_storage_string() {
        assert_eq!(Role::parse(Role::Admin.as_str()), Some(Role::Admin));
        assert_eq!(Role::parse("owner"), None);
    }

    #[test]
    fn test_decision_from_str() {
        assert_eq!("accepted".parse::<Decision>().unwrap(), Decision::Accepted);
        assert_eq!("rejected".parse::<Decision>().unwrap().status(), Status::Rejected);
        assert!(matches!(
            "pending".parse::<Decision>(),
            Err(ValidationError::UnknownDecision(ref s)) if s == "pending"
        ));
    }

    #[test]
    fn test_invitation_is_expired() {
        let now = Utc::now();

        let expired = invitation(now - Duration::hours(1));
        assert!(expired.is_expired_at(now));
        assert!(!expired.is_live_at(now));

        let valid = invitation(now + Duration::hours(1));
        assert!(!valid.is_expired_at(now));
        assert!(valid.is_live_at(now));
    }

    #[test]
    fn test_invitation_valid_at_expiry_instant() {
        let now = Utc::now();
        let invitation = invitation(now);

        assert!(!invitation.is_expired_at(now));
        assert!(invitation.is_live_at(now));
        assert!(invitation.is_expired_at(now + Duration::nanoseconds(1)));
    }

    #[test]
    fn test_details_serialize_flat() {
        let now = Utc::now();
        let details = TeamDetails {
            team: Team {
                id: 7,
                name: "Eng".to_owned(),
                description: String::new(),
                created_at: now,
                updated_at: now,
            },
            members: vec![TeamMember {
                team_id: 7,
                username: "alice".to_owned(),
                role: Role::Admin,
                joined_at: now,
            }],
        };

        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["name"], "Eng");
        assert_eq!(json["members"][0]["role"], "admin");
    }
}
