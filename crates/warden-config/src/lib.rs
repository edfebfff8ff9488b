// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # warden-config
//!
//! Configuration management for the Warden moderation bot.
//!
//! ## Features
//!
//! - **Schema Definition**: `WardenConfig` grouped by concern, all sections defaulted
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Environment Overrides**: `WARDEN_*` variables and `${VAR:default}` placeholders
//! - **Credentials**: gateway token loading and validation
//!
//! ## Quick Start
//!
//! ```no_run
//! use warden_config::loader::load_config;
//!
//! let config = load_config("warden.toml").unwrap();
//! println!("Gateway: {}", config.gateway.url);
//! ```
//!
//! ## Example File
//!
//! ```toml
//! [bot]
//! name = "warden"
//! token_path = "token.txt"
//! data_dir = "data"
//!
//! [gateway]
//! url = "${WARDEN_GATEWAY:wss://gateway.example/ws}"
//! retry_mode = "rate_limit"
//!
//! [runtime]
//! worker_threads = 4
//!
//! [shutdown]
//! step_timeout_ms = 10000
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod credentials;
pub mod error;
pub mod loader;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use credentials::{load_token, validate_token};
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigFormat, ConfigLoader, DEFAULT_CONFIG_FILE, load_config, load_config_str};
pub use schema::{
    BotConfig, GatewayConfig, LogFormat, LogLevel, LoggingConfig, RuntimeConfig, ShutdownConfig,
    WardenConfig,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
