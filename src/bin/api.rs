use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;
use wallet_agent_coordinator::{
    agent::Coordinator, api::start_server, config::Config, session::SessionStore,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load .env and environment variables
    let config = Config::from_env()?;

    if !config.has_llm() {
        eprintln!("⚠️  GEMINI_API_KEY not set - planning runs use offline agents");
    }

    info!("🚀 Wallet Agent Coordinator - API Server");
    info!("📍 Port: {}", config.port);

    let coordinator = Coordinator::from_config(&config)?
        .with_sessions(Arc::new(SessionStore::new()));

    info!("✅ Coordinator initialized");
    info!("📡 Starting API server...");

    start_server(Arc::new(coordinator), config.port, config.session_ttl).await?;

    Ok(())
}
