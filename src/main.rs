use anyhow::Result;
use log::{info, warn};
use psim_server::api::rest::{AppState, RestApi};
use psim_server::config;
use psim_server::db::repositories::{AuditRepository, CamerasRepository};
use psim_server::db::{seed, DatabaseService};
use psim_server::playback::{HlsManifestLoader, SessionController};
use psim_server::security::auth::AuthService;
use psim_server::security::SecurityService;
use psim_server::services::{IncidentManager, SensorPoller, UserRoster};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn run_app() -> Result<()> {
    // Optional config file as the first argument
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = config::load_config(config_path.as_deref())?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.api.log_level),
    )
    .init();
    info!("Starting PSIM core server");

    // Connect to the database and run migrations
    let database = Arc::new(DatabaseService::new(&config.database).await?);
    let db_pool = database.pool.clone();

    // Bootstrap accounts on an empty roster
    seed::seed_initial_users(db_pool.clone(), &config.security).await?;

    // Core services
    let security = Arc::new(SecurityService::new(config.security.clone()));
    let auth = Arc::new(AuthService::new(db_pool.clone(), &config.security));
    let incidents = IncidentManager::new(db_pool.clone());
    let roster = UserRoster::new(db_pool.clone(), &config.security);

    // Camera playback controller with the HTTP manifest loader
    let load_timeout = Duration::from_millis(config.playback.load_timeout_ms);
    let playback = Arc::new(SessionController::new(
        Arc::new(HlsManifestLoader::new(load_timeout)?),
        load_timeout,
    ));

    // Sensor snapshot poller
    let shutdown = CancellationToken::new();
    let poller = Arc::new(SensorPoller::new(
        db_pool.clone(),
        config.sensors.poll_interval_secs,
    ));
    let sensor_feed = poller.subscribe();
    let poller_handle = poller.start(shutdown.clone());
    info!(
        "Sensor poller started ({}s interval)",
        config.sensors.poll_interval_secs
    );

    let state = AppState {
        database,
        security,
        auth,
        incidents,
        roster,
        cameras_repo: CamerasRepository::new(db_pool.clone()),
        audit_repo: AuditRepository::new(db_pool),
        playback,
        sensor_feed,
    };

    // Start the REST API and wait for shutdown
    let http_server = RestApi::new(&config.api, state);
    tokio::select! {
        result = http_server.run() => {
            if let Err(e) = result {
                warn!("API server exited with error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    shutdown.cancel();
    let _ = poller_handle.await;
    info!("Sensor poller stopped");

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
