// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Configuration Integration Tests
//!
//! - `test_load_*`: each file format through the loader
//! - `test_token_*`: credential files
//! - `test_validate_*`: the `validate` command checks

use std::path::PathBuf;

use warden_bin::commands::check;
use warden_config::{ConfigError, ConfigLoader, LogFormat, LogLevel, WardenConfig, load_token};
use warden_core::retry::RetryMode;
use warden_tests::prelude::*;

/// Loader whose environment overrides cannot collide with the host.
fn loader() -> ConfigLoader {
    ConfigLoader::new().with_env_prefix("WARDEN_IT_UNSET")
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_load_toml_file() {
    let dir = TestDir::new();
    let path = dir.write_file("warden.toml", ConfigFixtures::toml());

    let config = loader().load(&path).unwrap();
    assert_eq!(config.bot.name, "warden-toml");
    assert_eq!(config.bot.token_path, PathBuf::from("secrets/token.txt"));
    assert_eq!(config.gateway.retry_mode, RetryMode::Transient);
    assert_eq!(config.gateway.max_retries, 3);
    assert_eq!(config.runtime.worker_threads, Some(2));
    assert_eq!(config.shutdown.step_timeout_ms, 5_000);
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_load_yaml_file_with_placeholder_default() {
    let dir = TestDir::new();
    let path = dir.write_file("warden.yaml", ConfigFixtures::yaml());

    let config = loader().load(&path).unwrap();
    assert_eq!(config.bot.name, "warden-yaml");
    assert_eq!(config.gateway.url, "wss://fallback.example/ws");
    assert_eq!(config.gateway.retry_mode, RetryMode::Never);
    assert_eq!(config.logging.level, LogLevel::Warn);
}

#[test]
fn test_load_json_file_keeps_defaults() {
    let dir = TestDir::new();
    let path = dir.write_file("warden.json", ConfigFixtures::json());

    let config = loader().load(&path).unwrap();
    let defaults = WardenConfig::default();
    assert_eq!(config.bot.name, "warden-json");
    assert_eq!(config.bot.data_dir, PathBuf::from("json-data"));
    assert_eq!(config.bot.token_path, defaults.bot.token_path);
    assert_eq!(config.gateway, defaults.gateway);
    assert_eq!(config.runtime.worker_threads, Some(8));
}

#[test]
fn test_load_or_default_without_file() {
    let dir = TestDir::new();
    let config = loader().load_or_default(dir.path().join("warden.toml")).unwrap();
    assert_eq!(config, WardenConfig::default());
}

#[test]
fn test_load_rejects_unknown_extension_and_fields() {
    let dir = TestDir::new();
    let ini = dir.write_file("warden.ini", "[bot]\n");
    assert!(matches!(
        loader().load(&ini),
        Err(ConfigError::UnsupportedFormat { .. })
    ));

    let typo = dir.write_file("typo.toml", "[bot]\nnmae = \"x\"\n");
    assert!(matches!(loader().load(&typo), Err(ConfigError::Parse { .. })));
}

#[test]
fn test_load_rejects_invalid_values() {
    let dir = TestDir::new();
    let path = dir.write_file("warden.toml", "[runtime]\nworker_threads = 0\n");
    let err = loader().load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "runtime.worker_threads"));

    let path = dir.write_file("http.toml", "[gateway]\nurl = \"http://gateway.example\"\n");
    assert!(loader().load(&path).is_err());
}

// =============================================================================
// Tokens
// =============================================================================

#[test]
fn test_token_round_trip() {
    let dir = TestDir::with_token();
    let token = load_token(dir.token_path()).unwrap();
    assert_eq!(token.expose(), TEST_TOKEN);
}

#[test]
fn test_token_missing_and_empty() {
    let dir = TestDir::new();
    assert!(load_token(dir.token_path()).unwrap_err().is_io_error());

    dir.write_token("");
    assert!(load_token(dir.token_path()).unwrap_err().is_credential_error());
}

// =============================================================================
// Validate Command
// =============================================================================

#[test]
fn test_validate_reports_missing_token() {
    let dir = TestDir::new();
    let path = dir.write_file(
        "warden.toml",
        &format!(
            "[bot]\ntoken_path = {:?}\n",
            dir.token_path().display().to_string()
        ),
    );

    let report = check(&path).unwrap();
    assert_eq!(report.warnings.len(), 1);

    dir.write_token("abc");
    assert!(check(&path).unwrap().warnings.is_empty());
}

#[test]
fn test_validate_requires_existing_file() {
    let dir = TestDir::new();
    let err = check(&dir.path().join("warden.toml")).unwrap_err();
    assert_eq!(err.exit_code(), 1);
}
