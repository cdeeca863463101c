use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::clients::transport::TransportKind;

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// CORS allowed origins, comma separated
    pub cors_origins: Option<String>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Path of the real-time channel
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Seconds a drawing lock stays valid after it was acquired or refreshed
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    #[serde(default = "default_lock_sweep_interval_secs")]
    pub lock_sweep_interval_secs: u64,

    /// How long a long-poll request is held open waiting for frames
    #[serde(default = "default_poll_wait_secs")]
    pub poll_wait_secs: u64,

    /// Polling sessions not touched for this long are dropped
    #[serde(default = "default_poll_session_idle_secs")]
    pub poll_session_idle_secs: u64,

    /// Per-drawing broadcast buffer
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        load_env_files();
        Ok(envy::from_env::<Config>()?)
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "prod" || self.environment.to_lowercase() == "production"
    }

    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .as_deref()
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Real-time channel path with a leading and no trailing slash
    pub fn ws_route(&self) -> String {
        normalize_path(&self.ws_path)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn lock_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.lock_sweep_interval_secs.max(1))
    }

    pub fn poll_wait(&self) -> Duration {
        Duration::from_secs(self.poll_wait_secs)
    }

    pub fn poll_session_idle(&self) -> Duration {
        Duration::from_secs(self.poll_session_idle_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            cors_origins: None,
            log_level: default_log_level(),
            service_name: default_service_name(),
            ws_path: default_ws_path(),
            lock_timeout_secs: default_lock_timeout_secs(),
            lock_sweep_interval_secs: default_lock_sweep_interval_secs(),
            poll_wait_secs: default_poll_wait_secs(),
            poll_session_idle_secs: default_poll_session_idle_secs(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

/// Client side configuration of the drawing lock notifier.
///
/// Read from `LOCK_NOTIFIER_*` environment variables.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifierConfig {
    /// Base URL of the relay (http or https)
    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default = "default_ws_path")]
    pub path: String,

    #[serde(default = "default_reconnection")]
    pub reconnection: bool,

    #[serde(default = "default_reconnection_delay_ms")]
    pub reconnection_delay_ms: u64,

    #[serde(default = "default_reconnection_attempts")]
    pub reconnection_attempts: u32,

    /// Transports in preference order, comma separated
    #[serde(default = "default_transports")]
    pub transports: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Upper bound for a single long-poll request
    #[serde(default = "default_poll_request_timeout_ms")]
    pub poll_request_timeout_ms: u64,
}

impl NotifierConfig {
    pub fn load() -> Result<Self, ConfigError> {
        load_env_files();
        Ok(envy::prefixed("LOCK_NOTIFIER_").from_env::<NotifierConfig>()?)
    }

    pub fn with_server_url(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    /// `ws://` or `wss://` URL of the WebSocket endpoint
    pub fn websocket_url(&self) -> String {
        let base = self.base_url();
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}{}", base, normalize_path(&self.path))
    }

    /// HTTP URL under which long-polling sessions are opened
    pub fn polling_url(&self) -> String {
        format!("{}{}/poll", self.base_url(), normalize_path(&self.path))
    }

    /// Parsed transport order. Unknown names are skipped; an empty result
    /// falls back to WebSocket then polling.
    pub fn transport_order(&self) -> Vec<TransportKind> {
        let mut order = Vec::new();
        for name in self.transports.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match name.parse::<TransportKind>() {
                Ok(kind) if !order.contains(&kind) => order.push(kind),
                Ok(_) => {}
                Err(e) => warn!("Ignoring transport '{}': {}", name, e),
            }
        }
        if order.is_empty() {
            order = vec![TransportKind::WebSocket, TransportKind::Polling];
        }
        order
    }

    pub fn reconnection_delay(&self) -> Duration {
        Duration::from_millis(self.reconnection_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn poll_request_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_request_timeout_ms)
    }

    fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            path: default_ws_path(),
            reconnection: default_reconnection(),
            reconnection_delay_ms: default_reconnection_delay_ms(),
            reconnection_attempts: default_reconnection_attempts(),
            transports: default_transports(),
            connect_timeout_ms: default_connect_timeout_ms(),
            poll_request_timeout_ms: default_poll_request_timeout_ms(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvError(#[from] envy::Error),
}

fn normalize_path(path: &str) -> String {
    let path = path.trim().trim_matches('/');
    format!("/{}", path)
}

fn load_env_files() {
    // Try to load from app.env file first
    if std::path::Path::new("app.env").exists() {
        dotenvy::from_filename("app.env").ok();
    } else {
        // Fallback to .env file
        dotenvy::dotenv().ok();
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "drawing-lock-relay".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_lock_timeout_secs() -> u64 {
    300
}

fn default_lock_sweep_interval_secs() -> u64 {
    15
}

fn default_poll_wait_secs() -> u64 {
    25
}

fn default_poll_session_idle_secs() -> u64 {
    60
}

fn default_broadcast_capacity() -> usize {
    100
}

fn default_server_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_reconnection() -> bool {
    true
}

fn default_reconnection_delay_ms() -> u64 {
    1000
}

fn default_reconnection_attempts() -> u32 {
    5
}

fn default_transports() -> String {
    "websocket,polling".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    20_000
}

fn default_poll_request_timeout_ms() -> u64 {
    60_000
}
