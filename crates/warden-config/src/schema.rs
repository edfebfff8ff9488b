// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for Warden.
//!
//! # Schema Structure
//!
//! ```text
//! WardenConfig
//! ├── bot: BotConfig
//! ├── gateway: GatewayConfig
//! ├── runtime: RuntimeConfig
//! ├── shutdown: ShutdownConfig
//! └── logging: LoggingConfig
//! ```
//!
//! Every section has defaults, so an empty file is a valid configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_core::gateway::{ConnectionSettings, DEFAULT_EVENT_CAPACITY};
use warden_core::retry::{RetryConfig, RetryMode};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Constants
// =============================================================================

/// Default gateway endpoint.
pub const DEFAULT_GATEWAY_URL: &str = "ws://127.0.0.1:8765/gateway";

/// Default login attempt budget in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

/// Default wait for the ready event in milliseconds.
pub const DEFAULT_READY_TIMEOUT_MS: u64 = 60_000;

/// Default per-step shutdown budget in milliseconds.
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 10_000;

/// Upper bound for `runtime.worker_threads`.
pub const MAX_WORKER_THREADS: usize = 256;

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure for Warden.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WardenConfig {
    /// Bot identity and on-disk locations.
    #[serde(default)]
    pub bot: BotConfig,

    /// Gateway connection settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Async runtime settings.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Shutdown settings.
    #[serde(default)]
    pub shutdown: ShutdownConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WardenConfig {
    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.bot.validate()?;
        self.gateway.validate()?;
        self.runtime.validate()?;
        self.shutdown.validate()?;
        Ok(())
    }
}

// =============================================================================
// Bot Configuration
// =============================================================================

/// Bot identity and on-disk locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Display name used in logs.
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// File holding the gateway token.
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,

    /// Directory for persisted state and the audit trail.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_bot_name() -> String {
    "warden".to_string()
}

fn default_token_path() -> PathBuf {
    PathBuf::from("token.txt")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl BotConfig {
    /// Validates the bot section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::validation("bot.name", "cannot be empty"));
        }
        if self.token_path.as_os_str().is_empty() {
            return Err(ConfigError::validation("bot.token_path", "cannot be empty"));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::validation("bot.data_dir", "cannot be empty"));
        }
        Ok(())
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            token_path: default_token_path(),
            data_dir: default_data_dir(),
        }
    }
}

// =============================================================================
// Gateway Configuration
// =============================================================================

/// Gateway connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// WebSocket endpoint.
    #[serde(default = "default_gateway_url")]
    pub url: String,

    /// Budget for one login attempt.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// How long to wait for the ready event after login.
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,

    /// Which login errors are retried.
    #[serde(default)]
    pub retry_mode: RetryMode,

    /// Maximum retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for retry delays.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Gateway event buffer per subscriber.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_ready_timeout_ms() -> u64 {
    DEFAULT_READY_TIMEOUT_MS
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

impl GatewayConfig {
    /// Validates the gateway section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::validation("gateway.url", "cannot be empty"));
        }
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ConfigError::validation(
                "gateway.url",
                "must use the ws:// or wss:// scheme",
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::validation("gateway.connect_timeout_ms", "must be positive"));
        }
        if self.ready_timeout_ms == 0 {
            return Err(ConfigError::validation("gateway.ready_timeout_ms", "must be positive"));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::validation(
                "gateway.initial_backoff_ms",
                "cannot exceed max_backoff_ms",
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::validation("gateway.event_capacity", "must be positive"));
        }
        Ok(())
    }

    /// Returns the login attempt budget.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the ready wait budget.
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Returns the retry policy for login attempts.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default()
            .with_mode(self.retry_mode)
            .with_max_retries(self.max_retries)
            .with_initial_delay(Duration::from_millis(self.initial_backoff_ms))
            .with_max_delay(Duration::from_millis(self.max_backoff_ms))
    }

    /// Returns the connection tunables.
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            connect_timeout: self.connect_timeout(),
            retry: self.retry_config(),
            event_capacity: self.event_capacity,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            ready_timeout_ms: DEFAULT_READY_TIMEOUT_MS,
            retry_mode: RetryMode::default(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Async runtime settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Worker threads. `None` uses one per CPU core.
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl RuntimeConfig {
    /// Validates the runtime section.
    pub fn validate(&self) -> ConfigResult<()> {
        match self.worker_threads {
            Some(n) if n == 0 || n > MAX_WORKER_THREADS => Err(ConfigError::validation(
                "runtime.worker_threads",
                format!("must be between 1 and {}", MAX_WORKER_THREADS),
            )),
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Shutdown Configuration
// =============================================================================

/// Shutdown settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShutdownConfig {
    /// Budget for each shutdown step.
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,
}

fn default_step_timeout_ms() -> u64 {
    DEFAULT_STEP_TIMEOUT_MS
}

impl ShutdownConfig {
    /// Validates the shutdown section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.step_timeout_ms == 0 {
            return Err(ConfigError::validation("shutdown.step_timeout_ms", "must be positive"));
        }
        Ok(())
    }

    /// Returns the per-step budget.
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: DEFAULT_STEP_TIMEOUT_MS,
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses a level name, accepting `warning` as an alias.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-field lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
    /// Abbreviated single-line output.
    Compact,
}

impl LogFormat {
    /// Parses a format name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "text" | "pretty" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            "compact" => Some(LogFormat::Compact),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WardenConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bot.token_path, PathBuf::from("token.txt"));
        assert_eq!(config.bot.data_dir, PathBuf::from("data"));
        assert_eq!(config.gateway.retry_mode, RetryMode::RateLimit);
        assert_eq!(config.shutdown.step_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_gateway_validation() {
        let mut gateway = GatewayConfig {
            url: "http://example".into(),
            ..Default::default()
        };
        assert!(gateway.validate().is_err());

        gateway.url = "wss://example/ws".into();
        assert!(gateway.validate().is_ok());

        gateway.initial_backoff_ms = 60_000;
        assert!(gateway.validate().is_err());
    }

    #[test]
    fn test_worker_thread_bounds() {
        let mut runtime = RuntimeConfig::default();
        assert!(runtime.validate().is_ok());
        runtime.worker_threads = Some(0);
        assert!(runtime.validate().is_err());
        runtime.worker_threads = Some(4);
        assert!(runtime.validate().is_ok());
    }

    #[test]
    fn test_connection_settings_follow_gateway_section() {
        let gateway = GatewayConfig {
            retry_mode: RetryMode::Transient,
            max_retries: 2,
            connect_timeout_ms: 1500,
            ..Default::default()
        };
        let settings = gateway.connection_settings();
        assert_eq!(settings.connect_timeout, Duration::from_millis(1500));
        assert_eq!(settings.retry.mode, RetryMode::Transient);
        assert_eq!(settings.retry.max_retries, 2);
    }

    #[test]
    fn test_log_level_and_format_parsing() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
        assert_eq!(LogLevel::Debug.as_str(), "debug");
        assert_eq!(LogFormat::parse("compact"), Some(LogFormat::Compact));
        assert_eq!(LogFormat::parse("xml"), None);
    }
}
