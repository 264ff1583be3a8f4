use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// RPC client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL
    pub endpoint: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Client-side request budget; 0 disables throttling
    pub max_requests_per_second: u32,
}

/// Ledger file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Delimited text file receiving one row per discovered contract
    pub path: String,
}

/// Subscription and backoff timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Delay between two polls of the block filter
    pub poll_interval_ms: u64,
    /// Sleep after a transient network failure
    pub retry_delay_seconds: u64,
    /// Sleep after the provider rate-limits us
    pub rate_limit_cooldown_seconds: u64,
    /// Consecutive short retries tolerated before the filter is recreated
    pub max_consecutive_retries: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8545".to_string(),
            timeout_seconds: 30,
            max_requests_per_second: 5,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: "./contracts.csv".to_string(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            retry_delay_seconds: 5,
            rate_limit_cooldown_seconds: 600,
            max_consecutive_retries: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_seconds)
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables.
    /// Environment variables take precedence over file values.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(config_path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a TOML file. An explicit path must exist; the
    /// `CONFIG_FILE`/`monitor.toml` fallback is optional.
    pub fn load_from_file(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let (path, required) = match config_path {
            Some(path) => (path.to_string(), true),
            None => (
                env::var("CONFIG_FILE").unwrap_or_else(|_| "monitor.toml".to_string()),
                false,
            ),
        };

        if !Path::new(&path).exists() {
            if required {
                return Err(ConfigError::FileNotFound(path));
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .map_err(|_| ConfigError::FileNotFound(path.clone()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parsing(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(endpoint) = env::var("RPC_ENDPOINT") {
            self.rpc.endpoint = endpoint;
        }
        if let Some(timeout) = parse_env("RPC_TIMEOUT_SECONDS")? {
            self.rpc.timeout_seconds = timeout;
        }
        if let Some(rate) = parse_env("RPC_MAX_REQUESTS_PER_SECOND")? {
            self.rpc.max_requests_per_second = rate;
        }

        if let Ok(path) = env::var("LEDGER_PATH") {
            self.ledger.path = path;
        }

        if let Some(interval) = parse_env("POLL_INTERVAL_MS")? {
            self.monitor.poll_interval_ms = interval;
        }
        if let Some(delay) = parse_env("RETRY_DELAY_SECONDS")? {
            self.monitor.retry_delay_seconds = delay;
        }
        if let Some(cooldown) = parse_env("RATE_LIMIT_COOLDOWN_SECONDS")? {
            self.monitor.rate_limit_cooldown_seconds = cooldown;
        }

        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rpc.endpoint.starts_with("http://") && !self.rpc.endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(self.rpc.endpoint.clone()));
        }

        if self.rpc.timeout_seconds == 0 || self.rpc.timeout_seconds > 300 {
            return Err(invalid("rpc.timeout_seconds", self.rpc.timeout_seconds));
        }

        if self.ledger.path.trim().is_empty() {
            return Err(invalid("ledger.path", &self.ledger.path));
        }

        if self.monitor.poll_interval_ms == 0 {
            return Err(invalid("monitor.poll_interval_ms", self.monitor.poll_interval_ms));
        }

        if self.monitor.retry_delay_seconds == 0 {
            return Err(invalid("monitor.retry_delay_seconds", self.monitor.retry_delay_seconds));
        }

        if self.monitor.rate_limit_cooldown_seconds < self.monitor.retry_delay_seconds {
            return Err(invalid(
                "monitor.rate_limit_cooldown_seconds",
                self.monitor.rate_limit_cooldown_seconds,
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(invalid("logging.level", &self.logging.level));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(invalid("logging.format", &self.logging.format));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parsing(e.to_string()))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
