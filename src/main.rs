//! Trivia Duel Server
//!
//! Starts the WebSocket matchmaking server with the built-in question
//! set. Honors a `PORT` environment variable; everything else uses the
//! default configuration.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trivia_duel::{GameServer, ServerConfig, SESSION_DURATION_SECS, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = ServerConfig::default();
    if let Ok(port) = std::env::var("PORT") {
        let port: u16 = port.parse().context("PORT must be a port number")?;
        config.bind_addr.set_port(port);
    }

    info!("Trivia Duel Server v{}", VERSION);
    info!("Session duration: {} seconds", SESSION_DURATION_SECS);

    let server = GameServer::new(config);
    server.run().await?;

    Ok(())
}
