//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use banca_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_VERIFICATION_CODE_TTL_SECS};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API and WebSocket endpoint.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:5000`
    pub http_addr: SocketAddr,

    /// SQLite database file. `:memory:` keeps everything in RAM.
    /// Env: `DATABASE_PATH`
    /// Default: `./banca.db`
    pub database_path: PathBuf,

    /// How long a verification code stays valid.
    /// Env: `VERIFICATION_CODE_TTL_SECS`
    /// Default: 600
    pub verification_code_ttl: Duration,

    /// Return freshly issued verification codes in the HTTP response.
    /// There is no mail delivery, so development setups need this.
    /// Env: `EXPOSE_VERIFICATION_CODES` (true/false)
    /// Default: `false`
    pub expose_verification_codes: bool,

    /// Insert the demo users into an empty database at startup.
    /// Env: `SEED_DEMO_USERS` (true/false)
    /// Default: `false`
    pub seed_demo_users: bool,

    /// Sustained HTTP requests per second allowed per client IP.
    /// Env: `RATE_LIMIT_PER_SEC`
    /// Default: 10
    pub rate_limit_per_sec: f64,

    /// HTTP burst size per client IP.
    /// Env: `RATE_LIMIT_BURST`
    /// Default: 30
    pub rate_limit_burst: f64,

    /// Sustained WebSocket frames per second allowed per channel.
    /// Env: `FRAME_RATE_PER_SEC`
    /// Default: 20
    pub frame_rate_per_sec: f64,

    /// WebSocket frame burst size per channel.
    /// Env: `FRAME_RATE_BURST`
    /// Default: 60
    pub frame_rate_burst: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./banca.db"),
            verification_code_ttl: Duration::from_secs(DEFAULT_VERIFICATION_CODE_TTL_SECS),
            expose_verification_codes: false,
            seed_demo_users: false,
            rate_limit_per_sec: 10.0,
            rate_limit_burst: 30.0,
            frame_rate_per_sec: 20.0,
            frame_rate_burst: 60.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            if !path.is_empty() {
                config.database_path = PathBuf::from(path);
            }
        }

        if let Some(val) = lookup("VERIFICATION_CODE_TTL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.verification_code_ttl = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid VERIFICATION_CODE_TTL_SECS, using default"),
            }
        }

        if let Some(val) = lookup("EXPOSE_VERIFICATION_CODES") {
            config.expose_verification_codes = parse_flag(&val);
        }

        if let Some(val) = lookup("SEED_DEMO_USERS") {
            config.seed_demo_users = parse_flag(&val);
        }

        if let Some(rate) = parse_rate(&lookup, "RATE_LIMIT_PER_SEC") {
            config.rate_limit_per_sec = rate;
        }
        if let Some(burst) = parse_rate(&lookup, "RATE_LIMIT_BURST") {
            config.rate_limit_burst = burst;
        }
        if let Some(rate) = parse_rate(&lookup, "FRAME_RATE_PER_SEC") {
            config.frame_rate_per_sec = rate;
        }
        if let Some(burst) = parse_rate(&lookup, "FRAME_RATE_BURST") {
            config.frame_rate_burst = burst;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    /// `true` when the database should live in memory only.
    pub fn in_memory_database(&self) -> bool {
        self.database_path.as_os_str() == ":memory:"
    }
}

fn parse_flag(val: &str) -> bool {
    matches!(val.trim(), "1" | "true" | "TRUE" | "yes")
}

fn parse_rate(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<f64> {
    let val = lookup(key)?;
    match val.parse::<f64>() {
        Ok(n) if n > 0.0 && n.is_finite() => Some(n),
        _ => {
            tracing::warn!(key, value = %val, "Invalid rate setting, using default");
            None
        }
    }
}
