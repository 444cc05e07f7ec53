//! Configuration management for the relay server.
//!
//! Loads configuration from environment variables with sensible defaults.

use chat_relay_core::relay::RelayConfig;
use chat_relay_web::RouterConfig;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Outbound webhook configuration
    pub webhook: WebhookConfig,
    /// Relay behavior
    pub relay: RelaySettings,
    /// Record store configuration
    pub store: StoreConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (default: `0.0.0.0`)
    pub host: String,
    /// Port to bind to (default: 3000)
    pub port: u16,
    /// Externally reachable base URL used in callback URLs
    pub public_url: Option<String>,
    /// CORS origins; empty or `*` allows any
    pub allowed_origins: Vec<String>,
    /// Static asset directory (default: `public`)
    pub static_dir: PathBuf,
    /// Serve Prometheus metrics at `/metrics` (default: true)
    pub metrics_enabled: bool,
}

/// Webhook configuration
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Webhook URL; dispatch fails with a configuration error when unset
    pub url: Option<String>,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

/// Relay behavior settings
#[derive(Clone)]
pub struct RelaySettings {
    /// Record time-to-live in seconds (default: 3600)
    pub record_ttl_secs: u64,
    /// Reject callbacks for unknown ids (default: false)
    pub strict_callbacks: bool,
    /// Shared secret for signed callback URLs
    pub callback_secret: Option<String>,
}

impl std::fmt::Debug for RelaySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelaySettings")
            .field("record_ttl_secs", &self.record_ttl_secs)
            .field("strict_callbacks", &self.strict_callbacks)
            .field(
                "callback_secret",
                &self.callback_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Record store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// `Redis` URL; unset selects the in-memory store
    pub redis_url: Option<String>,
    /// `Redis` key namespace override (default: `chat:request:`)
    pub redis_key_prefix: Option<String>,
    /// In-memory store sweep interval in seconds (default: 60)
    pub sweep_interval_secs: u64,
}

impl Config {
    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps variable names to values.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let vars = Vars(lookup);

        Self {
            server: ServerConfig {
                host: vars.string("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: vars.parse("PORT").unwrap_or(3000),
                public_url: vars.string("PUBLIC_URL"),
                allowed_origins: vars.string("ALLOWED_ORIGINS")
                    .map(|s| {
                        s.split(',')
                            .map(str::trim)
                            .filter(|origin| !origin.is_empty())
                            .map(ToString::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
                static_dir: vars.string("STATIC_DIR").map_or_else(|| PathBuf::from("public"), PathBuf::from),
                metrics_enabled: vars.flag("METRICS_ENABLED", true),
            },
            webhook: WebhookConfig {
                url: vars.string("WEBHOOK_URL"),
                timeout_secs: vars.parse("WEBHOOK_TIMEOUT_SECS").unwrap_or(30),
            },
            relay: RelaySettings {
                record_ttl_secs: vars.parse("RECORD_TTL_SECS").unwrap_or(3600),
                strict_callbacks: vars.flag("STRICT_CALLBACKS", false),
                callback_secret: vars.string("CALLBACK_SECRET"),
            },
            store: StoreConfig {
                redis_url: vars.string("REDIS_URL"),
                redis_key_prefix: vars.string("REDIS_KEY_PREFIX"),
                sweep_interval_secs: vars.parse("SWEEP_INTERVAL_SECS").unwrap_or(60),
            },
        }
    }

    /// Address to bind, e.g. `0.0.0.0:3000`.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Webhook request timeout.
    #[must_use]
    pub const fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook.timeout_secs)
    }

    /// Sweep interval for the in-memory store (at least one second).
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.store.sweep_interval_secs.max(1))
    }

    /// Relay settings as a [`RelayConfig`].
    #[must_use]
    pub fn relay_config(&self) -> RelayConfig {
        let config = RelayConfig::new()
            .with_record_ttl(Duration::from_secs(self.relay.record_ttl_secs.max(1)))
            .with_strict_callbacks(self.relay.strict_callbacks);

        match &self.relay.callback_secret {
            Some(secret) => config.with_callback_secret(secret.clone()),
            None => config,
        }
    }

    /// Router settings as a [`RouterConfig`].
    ///
    /// Static serving is disabled when the directory does not exist.
    #[must_use]
    pub fn router_config(&self) -> RouterConfig {
        let static_dir = self.server.static_dir.is_dir().then(|| self.server.static_dir.clone());
        if static_dir.is_none() {
            tracing::info!(
                static_dir = %self.server.static_dir.display(),
                "Static directory not found; static assets disabled"
            );
        }

        RouterConfig {
            allowed_origins: self.server.allowed_origins.clone(),
            static_dir,
        }
    }
}

/// Environment accessor; blank values count as unset.
struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        self.string(key).and_then(|s| s.trim().parse().ok())
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.string(key).map_or(default, |s| {
            matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
        })
    }
}
