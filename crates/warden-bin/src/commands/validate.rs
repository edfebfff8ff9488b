// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use std::path::Path;

use warden_config::WardenConfig;
use warden_core::retry::RetryMode;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Result of checking a configuration file.
#[derive(Debug)]
pub struct ValidationReport {
    /// The parsed configuration.
    pub config: WardenConfig,
    /// Non-fatal findings.
    pub warnings: Vec<String>,
}

/// Loads `path` and collects warnings. The file must exist.
pub fn check(path: &Path) -> BinResult<ValidationReport> {
    if !path.exists() {
        return Err(BinError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let config = warden_config::load_config(path).map_err(|e| {
        BinError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    let mut warnings = Vec::new();

    if !config.bot.token_path.exists() {
        warnings.push(format!(
            "Token file does not exist: {}",
            config.bot.token_path.display()
        ));
    } else if let Err(e) = warden_config::load_token(&config.bot.token_path) {
        warnings.push(format!("Token file is not usable: {}", e));
    }

    if config.bot.data_dir.exists() && !config.bot.data_dir.is_dir() {
        warnings.push(format!(
            "Data directory path is not a directory: {}",
            config.bot.data_dir.display()
        ));
    }

    if config.gateway.url.starts_with("ws://") && !is_loopback_url(&config.gateway.url) {
        warnings.push("Gateway URL is not encrypted (ws://)".to_string());
    }

    if config.gateway.retry_mode == RetryMode::Never {
        warnings.push("Login errors will not be retried (retry_mode = never)".to_string());
    }

    Ok(ValidationReport { config, warnings })
}

fn is_loopback_url(url: &str) -> bool {
    let host = url
        .trim_start_matches("ws://")
        .split(['/', ':'])
        .next()
        .unwrap_or_default();
    matches!(host, "localhost" | "127.0.0.1")
}

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;
    let ValidationReport { config, warnings } = check(config_path)?;

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Bot Name: {}", config.bot.name);
            println!("  Token File: {}", config.bot.token_path.display());
            println!("  Data Directory: {}", config.bot.data_dir.display());
            println!("  Gateway: {}", config.gateway.url);
            println!("  Retry Mode: {}", config.gateway.retry_mode);
            match config.runtime.worker_threads {
                Some(threads) => println!("  Worker Threads: {}", threads),
                None => println!("  Worker Threads: auto"),
            }

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config)
                        .unwrap_or_else(|_| "(serialization error)".to_string())
                );
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "bot_name": config.bot.name,
                    "token_path": config.bot.token_path.display().to_string(),
                    "data_dir": config.bot.data_dir.display().to_string(),
                    "gateway_url": config.gateway.url,
                    "retry_mode": config.gateway.retry_mode.to_string(),
                    "worker_threads": config.runtime.worker_threads,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            let rendered = serde_json::to_string_pretty(&output)
                .map_err(|e| BinError::runtime(format!("Failed to render report: {}", e)))?;
            println!("{}", rendered);
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::Configuration(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("warden.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = check(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_missing_token_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let token = dir.path().join("token.txt");
        let path = write_config(
            &dir,
            &format!("[bot]\ntoken_path = {:?}\n", token.display().to_string()),
        );

        let report = check(&path).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("Token file does not exist"));

        std::fs::write(&token, "abc\n").unwrap();
        assert!(check(&path).unwrap().warnings.is_empty());
    }

    #[test]
    fn test_insecure_remote_gateway_warns() {
        let dir = TempDir::new().unwrap();
        let token = dir.path().join("token.txt");
        std::fs::write(&token, "abc").unwrap();
        let path = write_config(
            &dir,
            &format!(
                "[bot]\ntoken_path = {:?}\n\n[gateway]\nurl = \"ws://gateway.example/ws\"\nretry_mode = \"never\"\n",
                token.display().to_string()
            ),
        );

        let report = check(&path).unwrap();
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn test_strict_mode_fails_on_warnings() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            &format!(
                "[bot]\ntoken_path = {:?}\n",
                dir.path().join("absent").display().to_string()
            ),
        );

        let cli = Cli::parse_from(["warden", "-c", path.to_str().unwrap(), "validate", "--strict"]);
        let args = match cli.effective_command() {
            crate::cli::Commands::Validate(args) => args,
            other => panic!("unexpected command {:?}", other),
        };
        let err = validate(&cli, args).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_loopback_detection() {
        assert!(is_loopback_url("ws://127.0.0.1:8765/gateway"));
        assert!(is_loopback_url("ws://localhost/gateway"));
        assert!(!is_loopback_url("ws://gateway.example/ws"));
    }
}
