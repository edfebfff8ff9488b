// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing for Warden.
//!
//! # Loading Pipeline
//!
//! 1. Read the file; the format follows the extension
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw text
//! 3. Parse YAML, TOML or JSON into [`WardenConfig`]
//! 4. Apply `WARDEN_*` environment overrides
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! WARDEN_BOT_NAME=warden-staging
//! WARDEN_TOKEN_PATH=/run/secrets/token
//! WARDEN_DATA_DIR=/var/lib/warden
//! WARDEN_GATEWAY_URL=wss://gateway.example/ws
//! WARDEN_RETRY_MODE=transient
//! WARDEN_MAX_RETRIES=3
//! WARDEN_WORKER_THREADS=4
//! WARDEN_LOG_LEVEL=debug
//! WARDEN_LOG_FORMAT=json
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use warden_core::retry::RetryMode;

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{LogFormat, LogLevel, WardenConfig};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "warden.toml";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for Warden.
///
/// # Examples
///
/// ```no_run
/// use warden_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("warden.toml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve placeholders and apply overrides.
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a loader with the `WARDEN` prefix and environment resolution on.
    pub fn new() -> Self {
        Self {
            env_prefix: "WARDEN".to_string(),
            resolve_env_vars: true,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The file format is determined by the file extension:
    /// - `.yaml` or `.yml` - YAML format
    /// - `.toml` - TOML format
    /// - `.json` - JSON format
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<WardenConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let format = ConfigFormat::from_path(path)?;
        let content = read_file(path)?;

        let config = self
            .load_from_str(&content, format)
            .map_err(|e| match e {
                ConfigError::Serialization { message } => ConfigError::parse(path, message),
                other => other,
            })?;

        debug!(
            bot = %config.bot.name,
            gateway = %config.gateway.url,
            retry_mode = %config.gateway.retry_mode,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise returns validated defaults.
    pub fn load_or_default(&self, path: impl AsRef<Path>) -> ConfigResult<WardenConfig> {
        let path = path.as_ref();
        if path.exists() {
            return self.load(path);
        }

        info!("No configuration file at {}, using defaults", path.display());
        let mut config = WardenConfig::default();
        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config, env_lookup)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<WardenConfig> {
        self.load_with(content, format, env_lookup)
    }

    fn load_with(
        &self,
        content: &str,
        format: ConfigFormat,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<WardenConfig> {
        let mut config: WardenConfig = if self.resolve_env_vars {
            parse_str(&resolve_env_placeholders(content, &lookup), format)?
        } else {
            parse_str(content, format)?
        };

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config, &lookup)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Applies `<PREFIX>_*` overrides.
    fn apply_env_overrides(
        &self,
        config: &mut WardenConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<()> {
        let var = |suffix: &str| {
            let name = format!("{}_{}", self.env_prefix, suffix);
            lookup(&name).map(|value| (name, value))
        };

        if let Some((_, value)) = var("BOT_NAME") {
            config.bot.name = value;
        }
        if let Some((_, value)) = var("TOKEN_PATH") {
            config.bot.token_path = PathBuf::from(value);
        }
        if let Some((_, value)) = var("DATA_DIR") {
            config.bot.data_dir = PathBuf::from(value);
        }
        if let Some((_, value)) = var("GATEWAY_URL") {
            config.gateway.url = value;
        }
        if let Some((name, value)) = var("RETRY_MODE") {
            config.gateway.retry_mode = parse_retry_mode(&value)
                .ok_or_else(|| ConfigError::invalid_env_var(name, "expected never, rate_limit or transient"))?;
        }
        if let Some((name, value)) = var("MAX_RETRIES") {
            config.gateway.max_retries = value
                .parse()
                .map_err(|_| ConfigError::invalid_env_var(name, "expected valid number"))?;
        }
        if let Some((name, value)) = var("WORKER_THREADS") {
            config.runtime.worker_threads = Some(
                value
                    .parse()
                    .map_err(|_| ConfigError::invalid_env_var(name, "expected valid number"))?,
            );
        }
        if let Some((name, value)) = var("LOG_LEVEL") {
            match LogLevel::parse(&value) {
                Some(level) => config.logging.level = level,
                None => warn!("Ignoring unknown log level in {}: {}", name, value),
            }
        }
        if let Some((name, value)) = var("LOG_FORMAT") {
            match LogFormat::parse(&value) {
                Some(format) => config.logging.format = format,
                None => warn!("Ignoring unknown log format in {}: {}", name, value),
            }
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn env_lookup(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn read_file(path: &Path) -> ConfigResult<String> {
    if !path.exists() {
        return Err(ConfigError::file_not_found(path));
    }
    fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
}

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => parse_yaml(content),
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string())),
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

/// YAML parsing goes through the `config` crate.
fn parse_yaml<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

/// Resolves `${VAR_NAME}` and `${VAR_NAME:default}` placeholders.
///
/// Unknown variables without a default are left in place.
fn resolve_env_placeholders(content: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let body = &after[..end];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };

        match (lookup(name), default) {
            (Some(value), _) => result.push_str(&value),
            (None, Some(default)) => result.push_str(default),
            (None, None) => {
                warn!("Environment variable '{}' not found", name);
                result.push_str(&rest[start..start + 2 + end + 1]);
            }
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

fn parse_retry_mode(value: &str) -> Option<RetryMode> {
    match value.to_lowercase().replace('-', "_").as_str() {
        "never" => Some(RetryMode::Never),
        "rate_limit" => Some(RetryMode::RateLimit),
        "transient" => Some(RetryMode::Transient),
        _ => None,
    }
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<WardenConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<WardenConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================
