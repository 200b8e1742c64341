use std::path::PathBuf;
use std::time::Duration;

use crate::auth::jwt::JwtConfig;

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
    /// Directory holding the JSON snapshots (default: `./data`).
    pub data_dir: PathBuf,
    /// Deadline for reading snapshots at startup (default: `150` ms).
    pub storage_load_timeout_ms: u64,
    /// Retries after a failed snapshot write (default: `3`).
    pub flush_max_retries: u32,
    /// Gap between reminder checks in seconds (default: `300`).
    pub reminder_interval_secs: u64,
    /// How far ahead of a confirmed appointment the reminder goes out,
    /// in minutes (default: `1440`).
    pub reminder_lead_mins: u64,
    /// JWT token configuration.
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `HOST`                     | `0.0.0.0`               |
    /// | `PORT`                     | `3000`                  |
    /// | `CORS_ORIGINS`             | `http://localhost:8081` |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                    |
    /// | `DATA_DIR`                 | `./data`                |
    /// | `STORAGE_LOAD_TIMEOUT_MS`  | `150`                   |
    /// | `FLUSH_MAX_RETRIES`        | `3`                     |
    /// | `REMINDER_INTERVAL_SECS`   | `300`                   |
    /// | `REMINDER_LEAD_MINS`       | `1440`                  |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:8081".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let storage_load_timeout_ms: u64 = std::env::var("STORAGE_LOAD_TIMEOUT_MS")
            .unwrap_or_else(|_| "150".into())
            .parse()
            .expect("STORAGE_LOAD_TIMEOUT_MS must be a valid u64");

        let flush_max_retries: u32 = std::env::var("FLUSH_MAX_RETRIES")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .expect("FLUSH_MAX_RETRIES must be a valid u32");

        let reminder_interval_secs: u64 = std::env::var("REMINDER_INTERVAL_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("REMINDER_INTERVAL_SECS must be a valid u64");

        let reminder_lead_mins: u64 = std::env::var("REMINDER_LEAD_MINS")
            .unwrap_or_else(|_| "1440".into())
            .parse()
            .expect("REMINDER_LEAD_MINS must be a valid u64");

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            data_dir,
            storage_load_timeout_ms,
            flush_max_retries,
            reminder_interval_secs,
            reminder_lead_mins,
            jwt,
        }
    }

    pub fn storage_load_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_load_timeout_ms)
    }

    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_interval_secs)
    }

    pub fn reminder_lead(&self) -> Duration {
        Duration::from_secs(self.reminder_lead_mins * 60)
    }
}
