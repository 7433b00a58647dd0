//! Development backend for rehab coaching sessions.
//!
//! Run with: cargo run -p agent-backend
//!
//! Reads `STREAM_API_KEY` / `STREAM_API_SECRET` for token signing,
//! `REHAB_BIND` for the listen address and `REHAB_AGENT_COMMAND` for the
//! coaching agent process, from the environment or a `.env` file.

use std::sync::Arc;

use rehab_transport::server::{self, ServerConfig, ServerState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenv::dotenv() {
        eprintln!("no .env loaded: {e}");
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    if config.agent_command.is_none() {
        tracing::warn!("{} not set, agents will not be launched", server::ENV_AGENT_COMMAND);
    }

    let state = Arc::new(ServerState::new(config.launcher()));
    server::serve(&config, state).await?;
    Ok(())
}
