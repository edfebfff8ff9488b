// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging and tracing initialization.
//!
//! `RUST_LOG` takes precedence over the level passed in.

use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::LogFormat;

/// Noisy dependencies capped regardless of the requested level.
const QUIET_TARGETS: &[&str] = &["tungstenite=warn", "tokio_tungstenite=warn", "rustls=warn"];

// =============================================================================
// Logging Initialization
// =============================================================================

/// Initializes the global subscriber.
///
/// Returns `false` when a subscriber was already installed.
///
/// ```ignore
/// use warden_bin::cli::LogFormat;
/// use warden_bin::logging::init_logging;
///
/// init_logging("info", LogFormat::Text);
/// ```
pub fn init_logging(level: &str, format: LogFormat) -> bool {
    let filter = build_filter(level);

    let installed = match format {
        LogFormat::Text => init_text_logging(filter),
        LogFormat::Json => init_json_logging(filter),
        LogFormat::Compact => init_compact_logging(filter),
    };
    installed.is_ok()
}

/// Builds the filter from `RUST_LOG` or `level`.
pub fn build_filter(level: &str) -> EnvFilter {
    let base = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(parse_level(level).as_str().to_lowercase()));

    QUIET_TARGETS
        .iter()
        .filter_map(|directive| directive.parse::<Directive>().ok())
        .fold(base, EnvFilter::add_directive)
}

fn init_text_logging(filter: EnvFilter) -> Result<(), tracing_subscriber::util::TryInitError> {
    let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(is_terminal),
        )
        .try_init()
}

fn init_json_logging(filter: EnvFilter) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .try_init()
}

fn init_compact_logging(filter: EnvFilter) -> Result<(), tracing_subscriber::util::TryInitError> {
    let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(is_terminal),
        )
        .try_init()
}

// =============================================================================
// Log Level Parsing
// =============================================================================

/// Parses a log level string into a `Level`, defaulting to `INFO`.
pub fn parse_level(level: &str) -> Level {
    match warden_config::LogLevel::parse(level) {
        Some(warden_config::LogLevel::Trace) => Level::TRACE,
        Some(warden_config::LogLevel::Debug) => Level::DEBUG,
        Some(warden_config::LogLevel::Warn) => Level::WARN,
        Some(warden_config::LogLevel::Error) => Level::ERROR,
        Some(warden_config::LogLevel::Info) | None => Level::INFO,
    }
}

// =============================================================================
// Tests
// =============================================================================
