// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Common Test Utilities
//!
//! - `fixtures`: Pre-built files and events
//! - `mocks`: Mock implementations for testing
//! - `harness`: A ready gateway and service context per test

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;

use std::sync::Once;
use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialize test logging once per test binary.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("warn,warden=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Polls `condition` every few milliseconds until it holds or `timeout`
/// elapses. Returns the final result.
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
