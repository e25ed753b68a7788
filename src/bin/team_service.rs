use std::sync::Arc;
use std::time::Duration;

use team_service::api::axum::{TeamsState, router};
use team_service::jwt::JwtService;
use team_service::sqlite::{self, migrations};
use team_service::teams::TeamEngine;
use team_service::ServiceConfig;

const PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServiceConfig::from_env()?;
    log::info!(target: "team_service", "msg=\"starting\", config={config:?}");

    let verifier = JwtService::new(config.jwt()?);

    let pool = sqlite::connect(&config).await?;
    migrations::run(&pool).await?;

    let (store, ledger) = sqlite::create_repositories(pool);
    let engine = TeamEngine::with_config(store, ledger, config.engine.clone());
    let state = TeamsState::new(engine, verifier);

    spawn_pruner(Arc::clone(&state.engine));

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    log::info!(target: "team_service", "msg=\"listening\", addr=\"{}\"", config.bind_addr());

    axum::serve(listener, router(state)).await?;
    Ok(())
}

type Engine = TeamEngine<sqlite::SqliteMembershipStore, sqlite::SqliteInvitationLedger>;

/// Deletes expired invitations once an hour.
fn spawn_pruner(engine: Arc<Engine>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = engine.prune_expired_invitations().await {
                log::warn!(target: "team_service", "msg=\"prune failed\", error=\"{e}\"");
            }
        }
    });
}
