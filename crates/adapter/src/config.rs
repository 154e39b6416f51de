//! Client configuration read from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Backoff for automatic reconnection after an unexpected drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Retries allowed after a drop before the channel gives up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry `attempt` (1-based): doubles each time, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub reconnect: ReconnectPolicy,
    /// How long to wait for `welcome` after sending `hello`.
    pub handshake_timeout: Duration,
    /// Append every line sent and received to this file.
    pub wire_log_path: Option<PathBuf>,
    /// Local cache file for user, balance, selection and joined games.
    pub cache_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7788,
            reconnect: ReconnectPolicy::default(),
            handshake_timeout: Duration::from_millis(5000),
            wire_log_path: None,
            cache_path: None,
        }
    }
}

impl ClientConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = env::var("BINGO_SERVER_HOST").unwrap_or(defaults.host);
        let port = parse_var("BINGO_SERVER_PORT").unwrap_or(defaults.port);

        let reconnect = ReconnectPolicy {
            initial_delay: parse_var("BINGO_RECONNECT_INITIAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect.initial_delay),
            max_delay: parse_var("BINGO_RECONNECT_MAX_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect.max_delay),
            max_attempts: parse_var("BINGO_MAX_RECONNECT_ATTEMPTS")
                .unwrap_or(defaults.reconnect.max_attempts),
        };

        let handshake_timeout = parse_var("BINGO_HANDSHAKE_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.handshake_timeout);

        Self {
            host,
            port,
            reconnect,
            handshake_timeout,
            wire_log_path: path_var("BINGO_WIRE_LOG_PATH"),
            cache_path: path_var("BINGO_CACHE_PATH"),
        }
    }

    /// Same settings, pointed at another server.
    pub fn with_server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn server_label(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn path_var(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}
