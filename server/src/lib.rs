//! Chat Relay server.
//!
//! Wires configuration, the record store, the webhook and the HTTP router
//! together. The binary in `main.rs` only initializes logging and calls [`run`].

#![forbid(unsafe_code)]

pub mod config;

use anyhow::Context;
use chat_relay_core::environment::{Clock, SystemClock, TimestampIdGenerator};
use chat_relay_core::relay::{Relay, RelayEnvironment};
use chat_relay_core::store::{InMemoryRecordStore, RecordStore};
use chat_relay_core::webhook::HttpWebhook;
use chat_relay_redis::RedisRecordStore;
use chat_relay_web::metrics::install_recorder;
use chat_relay_web::{AppState, build_router};
use config::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Run the server until a shutdown signal arrives.
///
/// # Errors
///
/// Returns error if the store cannot be reached at startup, the webhook
/// client cannot be built, or the listener cannot bind.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    if let Some(redis_url) = &config.store.redis_url {
        info!("Connecting to Redis record store...");
        let mut store = RedisRecordStore::new(redis_url)
            .await
            .context("Failed to connect to Redis")?;
        if let Some(prefix) = &config.store.redis_key_prefix {
            store = store.with_key_prefix(prefix.clone());
        }
        info!(key_prefix = store.key_prefix(), "Redis record store connected");

        serve(&config, store, clock).await
    } else {
        warn!("REDIS_URL not set; using in-memory record store (records are lost on restart)");
        let store = InMemoryRecordStore::new(Arc::clone(&clock));
        let sweeper = spawn_sweeper(store.clone(), config.sweep_interval());

        let result = serve(&config, store, clock).await;
        sweeper.abort();
        result
    }
}

async fn serve<S>(config: &Config, store: S, clock: Arc<dyn Clock>) -> anyhow::Result<()>
where
    S: RecordStore + 'static,
{
    let webhook = match &config.webhook.url {
        Some(url) => {
            info!(webhook_url = %url, timeout_secs = config.webhook.timeout_secs, "Webhook configured");
            Some(HttpWebhook::new(url.clone(), config.webhook_timeout()).context("Failed to build webhook client")?)
        }
        None => {
            warn!("WEBHOOK_URL not set; chat requests will fail until it is configured");
            None
        }
    };

    if config.relay.callback_secret.is_none() {
        warn!("CALLBACK_SECRET not set; callbacks are accepted without authentication");
    }

    let env = RelayEnvironment::new(store, webhook, clock, Arc::new(TimestampIdGenerator::new()));
    let relay = Relay::new(env, config.relay_config());

    let mut state = AppState::new(relay);
    if let Some(public_url) = &config.server.public_url {
        state = state.with_public_url(public_url.clone());
    }
    if config.server.metrics_enabled {
        match install_recorder() {
            Ok(handle) => state = state.with_metrics(handle),
            Err(e) => warn!(error = %e, "Metrics disabled"),
        }
    }

    let app = build_router(state, &config.router_config());

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "Chat relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// Periodically drop expired records from the in-memory store.
fn spawn_sweeper(store: InMemoryRecordStore, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let purged = store.purge_expired().await;
            if purged > 0 {
                tracing::debug!(purged, "Swept expired records");
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use chat_relay_core::record::{RequestId, RequestRecord};
    use chat_relay_testing::ManualClock;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_expired_records() {
        let clock = ManualClock::default();
        let store = InMemoryRecordStore::new(Arc::new(clock.clone()));
        store
            .set_with_ttl(
                &RequestId::from("req-1"),
                RequestRecord::processing(clock.now()),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let sweeper = spawn_sweeper(store.clone(), Duration::from_secs(10));
        clock.advance(chrono::Duration::minutes(2));
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(store.purge_expired().await, 0, "Sweeper should have removed the record");
        sweeper.abort();
    }
}
