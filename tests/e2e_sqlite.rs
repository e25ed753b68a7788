//! End-to-end tests for the `SQLite` stores and the engine on top of them.
//!
//! Every test opens its own in-memory database, so tests run in parallel.
//! Run with: `cargo test --features sqlx_sqlite --test e2e_sqlite`

#![cfg(feature = "sqlx_sqlite")]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use team_service::sqlite::{self, SqliteInvitationLedger, SqliteMembershipStore, migrations};
use sqlx::SqlitePool;
use team_service::teams::{
    Decision, INVITATION_PENDING, InvitationLedger, JOIN_REQUEST_PENDING, MembershipStore,
    NewInvitation, NewJoinRequest, NewTeam, Removal, Role, Status, TeamChanges, TeamEngine,
};
use team_service::{Actor, AuthError, ServiceConfig};

type Engine = TeamEngine<SqliteMembershipStore, SqliteInvitationLedger>;

async fn setup_pool() -> SqlitePool {
    let config = ServiceConfig::new("0123456789abcdef0123456789abcdef")
        .with_database_url("sqlite::memory:");
    let pool = sqlite::connect(&config)
        .await
        .expect("Failed to connect to in-memory SQLite database");

    migrations::run(&pool).await.expect("Failed to run migrations");
    pool
}

async fn setup_db() -> (SqliteMembershipStore, SqliteInvitationLedger) {
    sqlite::create_repositories(setup_pool().await)
}

fn invitation_for(team_id: i64, invitee: &str, expires_at: DateTime<Utc>) -> NewInvitation {
    NewInvitation {
        team_id,
        inviter: "alice".to_owned(),
        invitee: invitee.to_owned(),
        expires_at,
    }
}

async fn setup_engine() -> Engine {
    let (store, ledger) = setup_db().await;
    TeamEngine::new(store, ledger)
}

fn actor(username: &str) -> Actor {
    Actor::new(username)
}

fn new_team(name: &str, founder: &str) -> NewTeam {
    NewTeam {
        name: name.to_owned(),
        description: String::new(),
        founder: founder.to_owned(),
    }
}

// =============================================================================
// Membership store
// =============================================================================

#[tokio::test]
async fn test_store_create_team_with_founder() {
    let (store, _) = setup_db().await;

    let details = store.create_team(new_team("Eng", "alice")).await.unwrap();
    assert_eq!(details.team.name, "Eng");
    assert_eq!(details.members.len(), 1);
    assert_eq!(details.members[0].role, Role::Admin);

    let members = store.find_members(details.team.id).await.unwrap();
    assert_eq!(members, details.members);
}

#[tokio::test]
async fn test_store_unique_team_name() {
    let (store, _) = setup_db().await;
    store.create_team(new_team("Eng", "alice")).await.unwrap();

    let result = store.create_team(new_team("Eng", "carol")).await;
    assert!(matches!(result, Err(AuthError::Validation(ref msg)) if msg.contains("taken")));

    // the failed transaction left no founder row behind
    let teams = store.find_teams_by_member("carol").await.unwrap();
    assert!(teams.is_empty());
}

#[tokio::test]
async fn test_store_create_team_is_all_or_nothing() {
    let pool = setup_pool().await;
    sqlx::query(
        r"
        CREATE TRIGGER reject_founder BEFORE INSERT ON team_members
        WHEN NEW.username = 'mallory'
        BEGIN SELECT RAISE(ABORT, 'founder rejected'); END
        ",
    )
    .execute(&pool)
    .await
    .unwrap();
    let (store, _) = sqlite::create_repositories(pool);

    let result = store.create_team(new_team("Eng", "mallory")).await;
    assert!(matches!(result, Err(AuthError::Unavailable(_))), "got {result:?}");

    // the team row was rolled back with the founder
    assert!(store.find_team_by_name("Eng").await.unwrap().is_none());
    assert!(store.search_teams(None).await.unwrap().is_empty());
    assert!(store.create_team(new_team("Eng", "alice")).await.is_ok());
}

#[tokio::test]
async fn test_store_add_member_idempotent() {
    let (store, _) = setup_db().await;
    let team = store.create_team(new_team("Eng", "alice")).await.unwrap().team;

    let first = store.add_member(team.id, "bob", Role::Member).await.unwrap();
    let second = store.add_member(team.id, "bob", Role::Admin).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.role, Role::Member);
    assert_eq!(store.find_members(team.id).await.unwrap().len(), 2);

    // re-adding the founder keeps the admin role
    let founder = store.add_member(team.id, "alice", Role::Member).await.unwrap();
    assert_eq!(founder.role, Role::Admin);
}

#[tokio::test]
async fn test_store_add_member_to_missing_team() {
    let (store, _) = setup_db().await;

    let result = store.add_member(42, "bob", Role::Member).await;
    assert_eq!(result.unwrap_err(), AuthError::NotFound("team"));
}

#[tokio::test]
async fn test_store_members_in_join_order() {
    let (store, _) = setup_db().await;
    let team = store.create_team(new_team("Eng", "alice")).await.unwrap().team;
    for name in ["zed", "bob", "mia"] {
        store.add_member(team.id, name, Role::Member).await.unwrap();
    }

    let names: Vec<String> = store
        .find_members(team.id)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.username)
        .collect();

    assert_eq!(names, ["alice", "zed", "bob", "mia"]);
}

#[tokio::test]
async fn test_store_search_and_update() {
    let (store, _) = setup_db().await;
    let platform = store.create_team(new_team("Platform", "alice")).await.unwrap().team;
    store.create_team(new_team("Design", "carol")).await.unwrap();

    let found = store.search_teams(Some("form")).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, platform.id);

    let upper = store.search_teams(Some("DESIGN")).await.unwrap();
    assert_eq!(upper.len(), 1);

    assert_eq!(store.search_teams(None).await.unwrap().len(), 2);

    let updated = store
        .update_team(
            platform.id,
            TeamChanges {
                name: None,
                description: Some("infra".to_owned()),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.name, "Platform");
    assert_eq!(updated.description, "infra");

    let clash = store
        .update_team(
            platform.id,
            TeamChanges {
                name: Some("Design".to_owned()),
                description: None,
            },
        )
        .await;
    assert!(matches!(clash, Err(AuthError::Validation(_))));

    let missing = store.update_team(999, TeamChanges::default()).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_store_delete_team_cascades_members() {
    let (store, _) = setup_db().await;
    let team = store.create_team(new_team("Eng", "alice")).await.unwrap().team;
    store.add_member(team.id, "bob", Role::Member).await.unwrap();

    assert!(store.delete_team(team.id).await.unwrap());
    assert!(!store.delete_team(team.id).await.unwrap());

    assert!(store.find_member(team.id, "bob").await.unwrap().is_none());
    assert!(store.find_teams_by_member("alice").await.unwrap().is_empty());
}

// =============================================================================
// Invitation ledger
// =============================================================================

#[tokio::test]
async fn test_ledger_transition_compare_and_set() {
    let (_, ledger) = setup_db().await;
    let invitation = ledger
        .create_invitation(NewInvitation {
            team_id: 1,
            inviter: "alice".to_owned(),
            invitee: "bob".to_owned(),
            expires_at: Utc::now() + Duration::days(7),
        })
        .await
        .unwrap();
    assert_eq!(invitation.status, Status::Pending);

    let won = ledger
        .transition_invitation(invitation.id, Status::Pending, Status::Accepted)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(won.status, Status::Accepted);

    let lost = ledger
        .transition_invitation(invitation.id, Status::Pending, Status::Rejected)
        .await
        .unwrap();
    assert!(lost.is_none());

    let stored = ledger.find_invitation(invitation.id).await.unwrap().unwrap();
    assert_eq!(stored.status, Status::Accepted);
}

#[tokio::test]
async fn test_ledger_timestamps_round_trip() {
    let (_, ledger) = setup_db().await;
    let expires_at = Utc::now() + Duration::days(3);

    let invitation = ledger
        .create_invitation(NewInvitation {
            team_id: 1,
            inviter: "alice".to_owned(),
            invitee: "bob".to_owned(),
            expires_at,
        })
        .await
        .unwrap();

    let stored = ledger.find_invitation(invitation.id).await.unwrap().unwrap();
    assert_eq!(stored.expires_at, expires_at);
    assert_eq!(stored, invitation);
}

#[tokio::test]
async fn test_ledger_delete_expired() {
    let (_, ledger) = setup_db().await;
    let now = Utc::now();

    for (invitee, expires_at) in [
        ("bob", now - Duration::hours(2)),
        ("carol", now - Duration::minutes(1)),
        ("dave", now + Duration::days(1)),
    ] {
        ledger
            .create_invitation(NewInvitation {
                team_id: 1,
                inviter: "alice".to_owned(),
                invitee: invitee.to_owned(),
                expires_at,
            })
            .await
            .unwrap();
    }

    assert_eq!(ledger.delete_expired_invitations(now).await.unwrap(), 2);

    let remaining = ledger.find_pending_invitations_by_team(1).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].invitee, "dave");
}

#[tokio::test]
async fn test_ledger_keeps_invitation_at_expiry_instant() {
    let (_, ledger) = setup_db().await;
    let now = Utc::now();
    ledger.create_invitation(invitation_for(1, "bob", now)).await.unwrap();

    assert_eq!(ledger.delete_expired_invitations(now).await.unwrap(), 0);
    let later = now + Duration::milliseconds(1);
    assert_eq!(ledger.delete_expired_invitations(later).await.unwrap(), 1);
}

#[tokio::test]
async fn test_ledger_one_live_invitation_per_invitee() {
    let (_, ledger) = setup_db().await;
    let stale = ledger
        .create_invitation(invitation_for(1, "bob", Utc::now() - Duration::hours(1)))
        .await
        .unwrap();

    // an expired pending invitation is replaced
    let live = ledger
        .create_invitation(invitation_for(1, "bob", Utc::now() + Duration::days(1)))
        .await
        .unwrap();
    assert!(ledger.find_invitation(stale.id).await.unwrap().is_none());

    // a live one blocks a second
    let duplicate = ledger
        .create_invitation(invitation_for(1, "bob", Utc::now() + Duration::days(1)))
        .await;
    assert_eq!(duplicate.unwrap_err(), AuthError::Conflict(INVITATION_PENDING));

    // a resolved one does not
    ledger
        .transition_invitation(live.id, Status::Pending, Status::Rejected)
        .await
        .unwrap()
        .unwrap();
    assert!(ledger
        .create_invitation(invitation_for(1, "bob", Utc::now() + Duration::days(1)))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_ledger_one_pending_join_request_per_user() {
    let (_, ledger) = setup_db().await;
    let request = NewJoinRequest {
        team_id: 1,
        username: "carol".to_owned(),
        message: String::new(),
    };

    let first = ledger.create_join_request(request.clone()).await.unwrap();
    let duplicate = ledger.create_join_request(request.clone()).await;
    assert_eq!(duplicate.unwrap_err(), AuthError::Conflict(JOIN_REQUEST_PENDING));

    ledger
        .transition_join_request(first.id, Status::Pending, Status::Accepted)
        .await
        .unwrap()
        .unwrap();
    assert!(ledger.create_join_request(request).await.is_ok());
}

#[tokio::test]
async fn test_ledger_join_requests() {
    let (_, ledger) = setup_db().await;
    let request = ledger
        .create_join_request(NewJoinRequest {
            team_id: 3,
            username: "carol".to_owned(),
            message: "hello".to_owned(),
        })
        .await
        .unwrap();

    assert_eq!(ledger.find_pending_join_requests_by_team(3).await.unwrap().len(), 1);

    ledger
        .transition_join_request(request.id, Status::Pending, Status::Rejected)
        .await
        .unwrap()
        .unwrap();

    assert!(ledger.find_pending_join_requests_by_team(3).await.unwrap().is_empty());
    assert_eq!(ledger.delete_team_records(3).await.unwrap(), 1);
    assert!(ledger.find_join_request(request.id).await.unwrap().is_none());
}

// =============================================================================
// Engine on SQLite
// =============================================================================

#[tokio::test]
async fn test_alice_bob_scenario() {
    let engine = setup_engine().await;
    let alice = actor("alice");
    let bob = actor("bob");

    let team = engine.create_team(&alice, "Eng", "").await.unwrap().team;
    let details = engine.get_team(team.id).await.unwrap();
    assert_eq!(details.members.len(), 1);
    assert_eq!(details.members[0].username, "alice");
    assert_eq!(details.members[0].role, Role::Admin);

    let invitation = engine.invite_member(&alice, team.id, "bob").await.unwrap();
    assert_eq!(invitation.status, Status::Pending);

    let accepted = engine
        .respond_to_invite(&bob, invitation.id, Decision::Accepted)
        .await
        .unwrap();
    assert_eq!(accepted.status, Status::Accepted);

    let details = engine.get_team(team.id).await.unwrap();
    assert_eq!(details.members.len(), 2);
    assert!(
        details
            .members
            .iter()
            .any(|m| m.username == "bob" && m.role == Role::Member)
    );

    let self_removal = engine.remove_member(&bob, team.id, "bob").await;
    assert!(matches!(self_removal, Err(AuthError::Forbidden(_))));

    let removed = engine.remove_member(&alice, team.id, "bob").await.unwrap();
    assert_eq!(removed, Removal::Removed);
    assert_eq!(engine.get_team(team.id).await.unwrap().members.len(), 1);

    let again = engine.remove_member(&alice, team.id, "bob").await.unwrap();
    assert_eq!(again, Removal::AlreadyAbsent);
    assert_eq!(engine.get_team(team.id).await.unwrap().members.len(), 1);
}

#[tokio::test]
async fn test_carol_scenario() {
    let engine = setup_engine().await;
    let alice = actor("alice");
    let carol = actor("carol");

    let team = engine.create_team(&alice, "Eng", "").await.unwrap().team;
    let invitation = engine.invite_member(&alice, team.id, "bob").await.unwrap();

    let invite = engine.invite_member(&carol, team.id, "dave").await;
    assert!(matches!(invite, Err(AuthError::Forbidden(_))));

    let respond = engine
        .respond_to_invite(&carol, invitation.id, Decision::Accepted)
        .await;
    assert!(matches!(respond, Err(AuthError::Forbidden(_))));

    let stored = engine.ledger().find_invitation(invitation.id).await.unwrap().unwrap();
    assert_eq!(stored.status, Status::Pending);
}

#[tokio::test]
async fn test_second_response_conflicts() {
    let engine = setup_engine().await;
    let alice = actor("alice");
    let bob = actor("bob");
    let team = engine.create_team(&alice, "Eng", "").await.unwrap().team;
    let invitation = engine.invite_member(&alice, team.id, "bob").await.unwrap();

    engine
        .respond_to_invite(&bob, invitation.id, Decision::Rejected)
        .await
        .unwrap();

    let second = engine
        .respond_to_invite(&bob, invitation.id, Decision::Accepted)
        .await;
    assert!(matches!(second, Err(AuthError::Conflict(_))));
    assert_eq!(engine.role_of(team.id, "bob").await.unwrap(), None);
}

#[tokio::test]
async fn test_expired_invitation_rejected_at_accept() {
    let engine = setup_engine().await;
    let alice = actor("alice");
    let team = engine.create_team(&alice, "Eng", "").await.unwrap().team;

    let invitation = engine
        .ledger()
        .create_invitation(NewInvitation {
            team_id: team.id,
            inviter: "alice".to_owned(),
            invitee: "bob".to_owned(),
            expires_at: Utc::now() - Duration::minutes(5),
        })
        .await
        .unwrap();

    let result = engine
        .respond_to_invite(&actor("bob"), invitation.id, Decision::Accepted)
        .await;
    assert_eq!(result.unwrap_err(), AuthError::Conflict("invitation has expired"));

    // a fresh invitation is allowed once the old one has expired, and replaces it
    assert!(engine.invite_member(&alice, team.id, "bob").await.is_ok());
    assert!(engine.ledger().find_invitation(invitation.id).await.unwrap().is_none());
    assert_eq!(engine.prune_expired_invitations().await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_accepts_single_winner() {
    let engine = Arc::new(setup_engine().await);
    let alice = actor("alice");
    let team = engine.create_team(&alice, "Eng", "").await.unwrap().team;
    let invitation = engine.invite_member(&alice, team.id, "bob").await.unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .respond_to_invite(&Actor::new("bob"), invitation.id, Decision::Accepted)
                    .await
            })
        })
        .collect();

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(err) => assert!(matches!(err, AuthError::Conflict(_)), "unexpected {err:?}"),
        }
    }

    assert_eq!(wins, 1);
    assert_eq!(engine.get_team(team.id).await.unwrap().members.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_invites_leave_one_pending() {
    let engine = Arc::new(setup_engine().await);
    let team_id = engine.create_team(&actor("alice"), "Eng", "").await.unwrap().team.id;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .invite_member(&Actor::new("alice"), team_id, "dave")
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(err) => assert_eq!(err, AuthError::Conflict(INVITATION_PENDING)),
        }
    }

    assert_eq!(created, 1);
    let pending = engine.ledger().find_pending_invitations_by_team(team_id).await.unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_join_requests_leave_one_pending() {
    let engine = Arc::new(setup_engine().await);
    let alice = actor("alice");
    let team_id = engine.create_team(&alice, "Eng", "").await.unwrap().team.id;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .request_to_join(&Actor::new("carol"), team_id, "")
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(err) => assert_eq!(err, AuthError::Conflict(JOIN_REQUEST_PENDING)),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(engine.list_join_requests(&alice, team_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_team_removes_everything() {
    let engine = setup_engine().await;
    let alice = actor("alice");
    let team = engine.create_team(&alice, "Eng", "").await.unwrap().team;
    engine.invite_member(&alice, team.id, "bob").await.unwrap();
    engine
        .request_to_join(&actor("carol"), team.id, "hi")
        .await
        .unwrap();

    engine.delete_team(&alice, team.id).await.unwrap();

    assert_eq!(engine.get_team(team.id).await.unwrap_err(), AuthError::NotFound("team"));
    assert!(engine.get_user_invites(&actor("bob")).await.unwrap().is_empty());
    assert!(
        engine
            .ledger()
            .find_pending_join_requests_by_team(team.id)
            .await
            .unwrap()
            .is_empty()
    );

    // the name is free again
    assert!(engine.create_team(&alice, "Eng", "").await.is_ok());
}

#[tokio::test]
async fn test_join_request_flow() {
    let engine = setup_engine().await;
    let alice = actor("alice");
    let carol = actor("carol");
    let team = engine.create_team(&alice, "Eng", "").await.unwrap().team;

    let request = engine.request_to_join(&carol, team.id, "please").await.unwrap();

    let by_member = engine
        .respond_to_join_request(&carol, request.id, Decision::Accepted)
        .await;
    assert!(matches!(by_member, Err(AuthError::Forbidden(_))));

    engine
        .respond_to_join_request(&alice, request.id, Decision::Accepted)
        .await
        .unwrap();

    assert_eq!(engine.role_of(team.id, "carol").await.unwrap(), Some(Role::Member));
    let teams = engine.get_user_teams(&carol).await.unwrap();
    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0].id, team.id);
}
