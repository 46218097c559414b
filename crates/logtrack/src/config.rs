// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::ConfigError;
use std::env;

const DEFAULT_BUS_SOCKET: &str = "/var/run/supervisor/events.sock";
const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:9200";

/// Configuration for the log forwarder.
#[derive(Debug, Clone)]
pub struct Config {
    /// Comma-separated process name patterns to forward, or `"*"` for all
    pub include: Option<String>,
    /// Comma-separated process name patterns to skip, or `"*"` for all
    pub exclude: Option<String>,
    /// Search backend base URL, e.g. `http://127.0.0.1:9200`
    pub endpoint: String,
    /// Whether to log a statistics record after each successful bulk send
    pub show_send_stat: bool,
    /// Path of the supervisor's event bus socket
    pub bus_socket: String,
    /// Log level (e.g. trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include: None,
            exclude: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            show_send_stat: false,
            bus_socket: DEFAULT_BUS_SOCKET.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let include = env::var("LOGTRACK_INCLUDE").ok();
        let exclude = env::var("LOGTRACK_EXCLUDE").ok();
        let endpoint = env::var("LOGTRACK_ENDPOINT").map_err(|_| {
            ConfigError::InvalidValue("LOGTRACK_ENDPOINT must be set".to_string())
        })?;
        let show_send_stat = env::var("LOGTRACK_SHOW_SEND_STAT")
            .map(|val| val.to_lowercase() == "true")
            .unwrap_or(false);
        let bus_socket =
            env::var("LOGTRACK_BUS_SOCKET").unwrap_or_else(|_| DEFAULT_BUS_SOCKET.to_string());
        let log_level = env::var("LOGTRACK_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| "info".to_string());

        let config = Self {
            include,
            exclude,
            endpoint,
            show_send_stat,
            bus_socket,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "backend endpoint cannot be empty".to_string(),
            ));
        }

        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidValue(format!(
                "backend endpoint '{}' must be an http(s) URL",
                self.endpoint
            )));
        }

        if self.bus_socket.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "bus socket path cannot be empty".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidValue(format!(
                "invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}
