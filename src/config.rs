//! Bridge configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Every key falls back to a sensible
//! default so the bridge can start with an empty environment.

use std::net::SocketAddr;

/// Top-level bridge configuration.
///
/// Loaded once at startup via [`BridgeConfig::from_env`].
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Socket address to bind the HTTP/WebSocket server to
    /// (e.g. `0.0.0.0:8080`).
    pub listen_addr: SocketAddr,

    /// Seconds between heartbeat sweeps. Each sweep pings every live
    /// connection and evicts those that missed the previous ping.
    pub ping_interval_secs: u64,

    /// Seconds a device client should wait for a pong before considering
    /// the link dead. Advertised to clients via `/api/v1/status`.
    pub pong_timeout_secs: u64,

    /// Reconnect attempts advertised to device clients.
    pub reconnect_attempts: u32,

    /// Delay between client reconnect attempts, in milliseconds.
    pub reconnect_delay_ms: u64,

    /// Maximum number of frames a device client should batch per send.
    pub max_batch_size: u32,

    /// Interval at which device clients should flush batched frames,
    /// in milliseconds.
    pub send_interval_ms: u64,

    /// Maximum client-side outbound queue size before frames are dropped.
    pub max_queue_size: u32,

    /// When `true`, VR_DATA frames with an empty session ID are rejected
    /// as malformed instead of being passed through to the store.
    pub strict_validation: bool,

    /// Seconds between automatic sync queue drains.
    pub sync_interval_secs: u64,

    /// Path to the local SQLite database file.
    pub sqlite_path: String,

    /// Base URL of the remote PostgREST-style store.
    pub remote_base_url: String,

    /// API key sent with every remote store request.
    pub remote_api_key: String,

    /// Timeout in seconds for remote store requests.
    pub remote_timeout_secs: u64,

    /// Capacity of the UI event bus broadcast channel.
    pub event_bus_capacity: usize,

    /// Maximum number of scoring tasks allowed in flight at once.
    pub scoring_concurrency: usize,

    /// Seconds to wait for in-flight scoring tasks during shutdown.
    pub shutdown_drain_timeout_secs: u64,
}

impl BridgeConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `BRIDGE_LISTEN_ADDR` is set but cannot be
    /// parsed as a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("BRIDGE_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()?;

        let sqlite_path = std::env::var("BRIDGE_SQLITE_PATH")
            .unwrap_or_else(|_| "data/neuro-bridge.db".to_string());

        let remote_base_url = std::env::var("BRIDGE_REMOTE_URL")
            .unwrap_or_else(|_| "http://localhost:54321/rest/v1".to_string());

        let remote_api_key = std::env::var("BRIDGE_REMOTE_API_KEY").unwrap_or_default();

        Ok(Self {
            listen_addr,
            ping_interval_secs: parse_env("BRIDGE_PING_INTERVAL_SECS", 30),
            pong_timeout_secs: parse_env("BRIDGE_PONG_TIMEOUT_SECS", 5),
            reconnect_attempts: parse_env("BRIDGE_RECONNECT_ATTEMPTS", 5),
            reconnect_delay_ms: parse_env("BRIDGE_RECONNECT_DELAY_MS", 3000),
            max_batch_size: parse_env("BRIDGE_MAX_BATCH_SIZE", 100),
            send_interval_ms: parse_env("BRIDGE_SEND_INTERVAL_MS", 100),
            max_queue_size: parse_env("BRIDGE_MAX_QUEUE_SIZE", 1000),
            strict_validation: parse_env_bool("BRIDGE_STRICT_VALIDATION", false),
            sync_interval_secs: parse_env("BRIDGE_SYNC_INTERVAL_SECS", 60),
            sqlite_path,
            remote_base_url,
            remote_api_key,
            remote_timeout_secs: parse_env("BRIDGE_REMOTE_TIMEOUT_SECS", 10),
            event_bus_capacity: parse_env("BRIDGE_EVENT_BUS_CAPACITY", 10_000),
            scoring_concurrency: parse_env("BRIDGE_SCORING_CONCURRENCY", 32),
            shutdown_drain_timeout_secs: parse_env("BRIDGE_SHUTDOWN_DRAIN_TIMEOUT_SECS", 10),
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("TRUE") | Some("1") => true,
        Some("false") | Some("FALSE") | Some("0") => false,
        _ => default,
    }
}
