//! Configuration management for Ironclick

use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Timing and diagnostics configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Delay between poll attempts, in milliseconds
    pub poll_interval_ms: u64,

    /// Hard deadline for any single wait, in milliseconds.
    /// If an operation takes more than 30 seconds, that's a bug.
    pub hard_timeout_ms: u64,

    /// A still-pending wait logs a warning after this long, in milliseconds
    pub soft_warning_ms: u64,

    /// How many recent log entries the diagnostic buffer retains
    pub diagnostic_capacity: usize,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: 150,
            hard_timeout_ms: 30_000,
            soft_warning_ms: 5_000,
            diagnostic_capacity: 20,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(interval) = env::var("IRONCLICK_POLL_INTERVAL_MS") {
            config.poll_interval_ms = interval
                .parse()
                .map_err(|_| Error::configuration("Invalid IRONCLICK_POLL_INTERVAL_MS"))?;
        }

        if let Ok(timeout) = env::var("IRONCLICK_HARD_TIMEOUT_MS") {
            config.hard_timeout_ms = timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid IRONCLICK_HARD_TIMEOUT_MS"))?;
        }

        if let Ok(warning) = env::var("IRONCLICK_SOFT_WARNING_MS") {
            config.soft_warning_ms = warning
                .parse()
                .map_err(|_| Error::configuration("Invalid IRONCLICK_SOFT_WARNING_MS"))?;
        }

        if let Ok(capacity) = env::var("IRONCLICK_DIAGNOSTIC_CAPACITY") {
            config.diagnostic_capacity = capacity
                .parse()
                .map_err(|_| Error::configuration("Invalid IRONCLICK_DIAGNOSTIC_CAPACITY"))?;
        }

        if let Ok(log_level) = env::var("IRONCLICK_LOG_LEVEL") {
            config.log_level = log_level;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn hard_timeout(&self) -> Duration {
        Duration::from_millis(self.hard_timeout_ms)
    }

    pub fn soft_warning(&self) -> Duration {
        Duration::from_millis(self.soft_warning_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(150));
        assert_eq!(config.hard_timeout(), Duration::from_secs(30));
        assert_eq!(config.soft_warning(), Duration::from_secs(5));
        assert_eq!(config.diagnostic_capacity, 20);
    }

    #[test]
    fn test_from_toml() {
        let config: Config = toml::from_str(
            r#"
            poll_interval_ms = 50
            hard_timeout_ms = 10000
            soft_warning_ms = 2000
            diagnostic_capacity = 5
            log_level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.diagnostic_capacity, 5);
        assert_eq!(config.log_level, "debug");
    }
}
