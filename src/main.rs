//! Ludo Game Server
//!
//! Authoritative server for two-player Ludo over WebSocket.

use tracing::info;
use tracing_subscriber::EnvFilter;

use ludo_server::{
    VERSION,
    game::PITY_LIMIT,
    network::{GameServer, ServerConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;

    info!("Ludo Server v{}", VERSION);
    info!("Pity limit: {} rolls", PITY_LIMIT);
    if let Some(seed) = config.rng_seed {
        info!("Fixed dice seed: {}", seed);
    }

    let server = std::sync::Arc::new(GameServer::new(config));

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received");
            signal_server.shutdown();
        }
    });

    server.run().await?;

    info!("Server stopped");
    Ok(())
}
