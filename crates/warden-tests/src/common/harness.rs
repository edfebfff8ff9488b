// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! A connected and ready gateway over a [`MockTransport`], a temporary data
//! directory, and the [`ServiceContext`] built from them.

use std::sync::Arc;
use std::time::Duration;

use warden_bin::runtime::{Orchestrator, RuntimeBuilder};
use warden_core::gateway::{ConnectionSettings, GatewayConnection};
use warden_core::registry::ServiceContext;
use warden_core::state::SharedState;
use warden_core::types::GatewayToken;

use super::fixtures::{TEST_TOKEN, TestDir};
use super::mocks::MockTransport;

/// Ready gateway plus a service context rooted in a temp directory.
pub struct TestHarness {
    /// Backing directory.
    pub dir: TestDir,
    /// Mock transport behind the gateway.
    pub transport: Arc<MockTransport>,
    /// The connected gateway.
    pub gateway: Arc<GatewayConnection>,
    /// Shared state handed to the context.
    pub state: Arc<SharedState>,
    context: ServiceContext,
}

impl TestHarness {
    /// Connects to a mock gateway reporting `members` and waits for ready.
    pub async fn ready(members: u64) -> Self {
        super::init_test_logging();

        let dir = TestDir::with_token();
        std::fs::create_dir_all(dir.data_dir()).expect("Failed to create data dir");

        let transport = MockTransport::with_members(members);
        let gateway = Arc::new(GatewayConnection::new(
            transport.clone(),
            GatewayToken::new(TEST_TOKEN),
            ConnectionSettings::default(),
        ));
        gateway.connect().await.expect("mock login failed");
        gateway
            .wait_until_ready(Duration::from_secs(1))
            .await
            .expect("mock gateway never became ready");

        let state = Arc::new(SharedState::default());
        let context = ServiceContext::new(gateway.clone(), state.clone(), dir.data_dir());

        Self {
            dir,
            transport,
            gateway,
            state,
            context,
        }
    }

    /// Returns a clone of the service context.
    pub fn context(&self) -> ServiceContext {
        self.context.clone()
    }
}

/// Orchestrator builder wired to `dir` and `transport`. The token is read
/// from `dir`, so call [`TestDir::with_token`] first for a successful run.
pub fn orchestrator(dir: &TestDir, transport: Arc<MockTransport>) -> RuntimeBuilder {
    super::init_test_logging();
    Orchestrator::builder().config(dir.config()).transport(transport)
}
