// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Warden Integration Tests
//!
//! Test utilities and integration suites for the Warden moderation bot.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: temp directories, token and config files, gateway events
//!   - `mocks`: scriptable gateway transport and a recording subsystem
//!   - `harness`: a connected, ready gateway with a service context
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p warden-tests
//! cargo test -p warden-tests --test integration_lifecycle
//! cargo test -p warden-tests --test integration_state
//! cargo test -p warden-tests --test integration_config
//! ```
//!
//! ## Using the Harness
//!
//! ```rust,ignore
//! use warden_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let harness = TestHarness::ready(10).await;
//!     let registry = ServiceRegistry::standard(harness.context());
//!     registry.initialize_all().await.unwrap();
//!     harness.transport.push(EventFixtures::join(42, "ana")).await;
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
    pub use crate::common::{eventually, init_test_logging};
}
