//! Chat Relay HTTP server.
//!
//! Accepts chat requests, forwards them to a webhook, and holds results
//! until the client polls for them.

use chat_relay_server::config::Config;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Chat Relay");

    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr(),
        redis = config.store.redis_url.is_some(),
        webhook = config.webhook.url.is_some(),
        strict_callbacks = config.relay.strict_callbacks,
        "Configuration loaded"
    );

    chat_relay_server::run(config).await
}
