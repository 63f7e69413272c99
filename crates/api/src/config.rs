use std::path::PathBuf;
use std::time::Duration;

/// Caps for the public review-page rate limiter.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Max read requests per window per client IP (default: `30`).
    pub read_cap: u32,
    /// Max write requests per window per client IP (default: `10`).
    pub write_cap: u32,
    /// Sliding window length (default: 5 minutes).
    pub window: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            read_cap: 30,
            write_cap: 10,
            window: Duration::from_secs(300),
        }
    }
}

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
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Path of the JSON state snapshot (default: `cadence-state.json`).
    pub snapshot_path: PathBuf,
    /// Seconds between periodic snapshot flushes (default: `30`).
    pub snapshot_interval_secs: u64,
    /// Review-page rate limiter caps.
    pub guard: GuardConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                    |
    /// |--------------------------|----------------------------|
    /// | `HOST`                   | `0.0.0.0`                  |
    /// | `PORT`                   | `3000`                     |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `30`                       |
    /// | `SNAPSHOT_PATH`          | `cadence-state.json`       |
    /// | `SNAPSHOT_INTERVAL_SECS` | `30`                       |
    /// | `GUARD_READ_CAP`         | `30`                       |
    /// | `GUARD_WRITE_CAP`        | `10`                       |
    /// | `GUARD_WINDOW_SECS`      | `300`                      |
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

        let request_timeout_secs = env_u64("REQUEST_TIMEOUT_SECS", 30);
        let shutdown_timeout_secs = env_u64("SHUTDOWN_TIMEOUT_SECS", 30);

        let snapshot_path = PathBuf::from(
            std::env::var("SNAPSHOT_PATH").unwrap_or_else(|_| "cadence-state.json".into()),
        );
        let snapshot_interval_secs = env_u64("SNAPSHOT_INTERVAL_SECS", 30);

        let guard = GuardConfig {
            read_cap: env_u64("GUARD_READ_CAP", 30) as u32,
            write_cap: env_u64("GUARD_WRITE_CAP", 10) as u32,
            window: Duration::from_secs(env_u64("GUARD_WINDOW_SECS", 300)),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            snapshot_path,
            snapshot_interval_secs,
            guard,
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a valid u64"))
}
