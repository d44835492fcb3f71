//! Furball relay server entry point
//!
//! The relay carries no simulation state: it forwards entity traffic between
//! peers, answers clock-synchronization pings, and synthesizes a death
//! message when a peer drops.

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use furball::net::relay::{self, RelayState};
use furball::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    info!("Starting Furball relay");
    info!("Relay address: {}", config.relay_addr);

    let listener = TcpListener::bind(config.relay_addr).await?;
    info!("WebSocket endpoint: ws://{}/ws", config.relay_addr);
    info!("Health check: http://{}/health", config.relay_addr);

    relay::run(listener, RelayState::new()).await?;

    info!("Relay shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
