//! Configuration module for the sync service.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::remote::RemoteConfig;

/// Which local store implementation to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalBackend {
    Sqlite,
    Memory,
}

/// Invalid configuration value.
#[derive(Debug, thiserror::Error)]
#[error("invalid value {value:?} for {var}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite file backing the local store
    pub db_path: PathBuf,
    /// Local store implementation
    pub local_backend: LocalBackend,
    /// Capacity of the local store in bytes
    pub local_quota_bytes: u64,
    /// Base URL of the remote entity store; unset runs offline
    pub remote_url: Option<String>,
    /// API key sent to the remote store
    pub remote_api_key: Option<String>,
    /// Request timeout for remote calls
    pub remote_timeout: Duration,
    /// Whether reports use the remote store at all
    pub reports_remote: bool,
    /// Interval of the background promotion sweep; zero disables it
    pub sweep_interval: Duration,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let db_path = env::var("DIRSYNC_DB_PATH")
            .unwrap_or_else(|_| "./data/cache.sqlite".to_string())
            .into();

        let local_backend = match env::var("DIRSYNC_LOCAL_BACKEND").as_deref() {
            Err(_) | Ok("sqlite") => LocalBackend::Sqlite,
            Ok("memory") => LocalBackend::Memory,
            Ok(other) => {
                return Err(ConfigError {
                    var: "DIRSYNC_LOCAL_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let local_quota_bytes = parse_var("DIRSYNC_LOCAL_QUOTA_BYTES", 5 * 1024 * 1024)?;

        let remote_url = env::var("DIRSYNC_REMOTE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let remote_api_key = env::var("DIRSYNC_REMOTE_API_KEY").ok();
        let remote_timeout = Duration::from_secs(parse_var("DIRSYNC_REMOTE_TIMEOUT_SECS", 30)?);
        let reports_remote = parse_var("DIRSYNC_REPORTS_REMOTE", true)?;
        let sweep_interval = Duration::from_secs(parse_var("DIRSYNC_SWEEP_INTERVAL_SECS", 300)?);

        let bind_addr = parse_var(
            "DIRSYNC_BIND_ADDR",
            SocketAddr::from(([127, 0, 0, 1], 8080)),
        )?;

        let log_level = env::var("DIRSYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            db_path,
            local_backend,
            local_quota_bytes,
            remote_url,
            remote_api_key,
            remote_timeout,
            reports_remote,
            sweep_interval,
            bind_addr,
            log_level,
        })
    }

    /// Remote connection settings, if a remote is configured.
    pub fn remote(&self) -> Option<RemoteConfig> {
        self.remote_url.as_ref().map(|base_url| RemoteConfig {
            base_url: base_url.clone(),
            api_key: self.remote_api_key.clone(),
            timeout: self.remote_timeout,
        })
    }
}

fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError { var, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::Mutex;

    /// Environment variables are process-global.
    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const VARS: [&str; 10] = [
        "DIRSYNC_DB_PATH",
        "DIRSYNC_LOCAL_BACKEND",
        "DIRSYNC_LOCAL_QUOTA_BYTES",
        "DIRSYNC_REMOTE_URL",
        "DIRSYNC_REMOTE_API_KEY",
        "DIRSYNC_REMOTE_TIMEOUT_SECS",
        "DIRSYNC_REPORTS_REMOTE",
        "DIRSYNC_SWEEP_INTERVAL_SECS",
        "DIRSYNC_BIND_ADDR",
        "DIRSYNC_LOG_LEVEL",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let config = Config::from_env().unwrap();

        assert_eq!(config.db_path, PathBuf::from("./data/cache.sqlite"));
        assert_eq!(config.local_backend, LocalBackend::Sqlite);
        assert_eq!(config.local_quota_bytes, 5 * 1024 * 1024);
        assert!(config.remote_url.is_none());
        assert!(config.remote().is_none());
        assert!(config.reports_remote);
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_remote_and_overrides() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("DIRSYNC_REMOTE_URL", "https://api.example.com/rest/v1");
        env::set_var("DIRSYNC_REMOTE_API_KEY", "anon");
        env::set_var("DIRSYNC_LOCAL_BACKEND", "memory");
        env::set_var("DIRSYNC_SWEEP_INTERVAL_SECS", "0");

        let config = Config::from_env().unwrap();
        clear_env();

        let remote = config.remote().unwrap();
        assert_eq!(remote.base_url, "https://api.example.com/rest/v1");
        assert_eq!(remote.api_key.as_deref(), Some("anon"));
        assert_eq!(remote.timeout, Duration::from_secs(30));
        assert_eq!(config.local_backend, LocalBackend::Memory);
        assert!(config.sweep_interval.is_zero());
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("DIRSYNC_LOCAL_QUOTA_BYTES", "lots");

        let err = Config::from_env().unwrap_err();
        clear_env();

        assert_eq!(err.var, "DIRSYNC_LOCAL_QUOTA_BYTES");
        assert_eq!(err.value, "lots");
    }
}
