// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # warden-bin
//!
//! CLI binary for the Warden moderation bot.
//!
//! - CLI argument parsing with clap
//! - Process orchestration (startup, console, shutdown)
//! - Termination signal handling
//! - Logging initialization
//!
//! ## Architecture
//!
//! ```text
//!                 main.rs
//!                    │
//!                 cli.rs
//!                    │
//!        ┌───────────┼───────────┐
//!        ▼           ▼           ▼
//!    commands     runtime     logging
//!                    │
//!            ┌───────┴───────┐
//!            ▼               ▼
//!         console         shutdown
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the bot (default command)
//! warden
//!
//! # Start with a custom config, no operator console
//! warden -c /etc/warden/warden.toml run --no-console
//!
//! # Validate configuration
//! warden validate --strict
//!
//! # Show version
//! warden version
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod console;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use console::{CommandLoop, LoopExit};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{Orchestrator, RuntimeBuilder, ShutdownReport, StopReason};
pub use shutdown::{ShutdownGuard, TerminationLatch};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
