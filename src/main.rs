use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stonetab::{app, clock::SystemClock, config::SandboxConfig, state::AppState, xp::XpTable};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stonetab=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting stonetab sandbox...");

    let config = SandboxConfig::from_env();
    tracing::info!(
        channel = %config.coordinator.channel_name,
        key = %config.coordinator.leader_key,
        policy = ?config.coordinator.claim_policy,
        lease = ?config.coordinator.lease,
        "Coordinator configuration"
    );

    let xp_table = match &config.xp_table_path {
        Some(path) => XpTable::load(path).unwrap_or_else(|e| {
            tracing::warn!("{}. Players will not level up.", e);
            XpTable::default()
        }),
        None => XpTable::default(),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = Arc::new(AppState::with_parts(config, xp_table, Arc::new(SystemClock)));
    let app = app::build_router(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
