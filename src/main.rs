use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use content_center::auth::session;
use content_center::config::{Cli, Config};
use content_center::db;
use content_center::error::AppError;
use content_center::routes;
use content_center::state::{AppState, DbPool};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState::new(pool.clone(), config)?;
    state.store.init().await?;
    tracing::info!("Media store: {}", state.store.root().display());

    tokio::spawn(sweep_sessions(pool));

    let app = routes::router(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drop expired sessions.
async fn sweep_sessions(pool: DbPool) {
    let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        let result = pool
            .get()
            .map_err(AppError::from)
            .and_then(|conn| session::purge_expired(&conn, Utc::now()));
        match result {
            Ok(0) => {}
            Ok(n) => tracing::info!(removed = n, "Purged expired sessions"),
            Err(e) => tracing::warn!("Session sweep failed: {}", e),
        }
    }
}
