//! Store configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:80";
pub const DEFAULT_CACHE_PATH: &str = "clinic-records-cache.db";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Where the record service lives and where the durable cache is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Base URL of the record service, without trailing slash
    pub service_url: String,
    /// SQLite file holding the persisted mirror
    pub cache_path: PathBuf,
    /// Per-request timeout; `None` waits on the transport indefinitely
    pub request_timeout: Option<Duration>,
}

impl StoreConfig {
    pub fn new(service_url: impl Into<String>, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            service_url: normalize_url(service_url.into()),
            cache_path: cache_path.into(),
            request_timeout: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Read `CLINIC_SERVICE_URL`, `CLINIC_CACHE_PATH` and
    /// `CLINIC_REQUEST_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let service_url =
            lookup("CLINIC_SERVICE_URL").unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string());
        let cache_path =
            lookup("CLINIC_CACHE_PATH").unwrap_or_else(|| DEFAULT_CACHE_PATH.to_string());

        let mut config = Self::new(service_url, cache_path);

        if let Some(raw) = lookup("CLINIC_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "CLINIC_REQUEST_TIMEOUT_SECS",
                value: raw.clone(),
            })?;
            config = config.with_request_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_URL, DEFAULT_CACHE_PATH)
    }
}

fn normalize_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
