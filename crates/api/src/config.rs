use courtside_core::reservation::{
    DEFAULT_DISCONNECT_GRACE_SECS, DEFAULT_HOLD_TTL_SECS, HEARTBEAT_INTERVAL_SECS,
    HEARTBEAT_TIMEOUT_SECS, HOLD_SWEEP_INTERVAL_SECS,
};

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Hold lifecycle tuning.
    pub hold: HoldConfig,
}

/// Tuning knobs for the slot-hold lifecycle.
#[derive(Debug, Clone)]
pub struct HoldConfig {
    /// TTL applied when an acquire request omits `ttl_secs`.
    pub default_ttl_secs: i64,
    /// How often the expired-hold sweep runs.
    pub sweep_interval_secs: u64,
    /// Interval between WebSocket heartbeat pings.
    pub heartbeat_interval_secs: u64,
    /// Sessions silent for longer than this are treated as disconnected.
    pub heartbeat_timeout_secs: i64,
    /// Grace period before a disconnected session's holds are released.
    /// Reconnecting with the same session id within the window restores
    /// ownership.
    pub disconnect_grace_secs: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                    |
    /// |---------------------------|----------------------------|
    /// | `HOST`                    | `0.0.0.0`                  |
    /// | `PORT`                    | `3000`                     |
    /// | `CORS_ORIGINS`            | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                       |
    /// | `DEFAULT_HOLD_TTL_SECS`   | `120`                      |
    /// | `HOLD_SWEEP_INTERVAL_SECS`| `5`                        |
    /// | `HEARTBEAT_INTERVAL_SECS` | `30`                       |
    /// | `HEARTBEAT_TIMEOUT_SECS`  | `90`                       |
    /// | `DISCONNECT_GRACE_SECS`   | `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            hold: HoldConfig::from_env(),
        }
    }
}

impl HoldConfig {
    fn from_env() -> Self {
        Self {
            default_ttl_secs: env_or("DEFAULT_HOLD_TTL_SECS", DEFAULT_HOLD_TTL_SECS),
            sweep_interval_secs: env_or("HOLD_SWEEP_INTERVAL_SECS", HOLD_SWEEP_INTERVAL_SECS),
            heartbeat_interval_secs: env_or("HEARTBEAT_INTERVAL_SECS", HEARTBEAT_INTERVAL_SECS),
            heartbeat_timeout_secs: env_or("HEARTBEAT_TIMEOUT_SECS", HEARTBEAT_TIMEOUT_SECS),
            disconnect_grace_secs: env_or("DISCONNECT_GRACE_SECS", DEFAULT_DISCONNECT_GRACE_SECS),
        }
    }
}

/// Parse an env var, falling back to `default` when unset or invalid.
fn env_or<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
