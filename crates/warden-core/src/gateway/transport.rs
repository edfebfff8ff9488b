// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The transport seam between [`GatewayConnection`](super::GatewayConnection)
//! and the wire.
//!
//! A transport performs the login handshake, streams events and delivers
//! outgoing messages. It knows nothing about connection state; the
//! connection drives it.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::event::GatewayEvent;
use crate::error::GatewayError;
use crate::types::{ChannelId, GatewayToken};

/// Default capacity of the event channel returned by [`GatewayTransport::open`].
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A wire-level gateway client.
///
/// # Contract
///
/// - `open` returns once the gateway has answered the login. Rejected
///   credentials yield [`GatewayError::Authentication`]; throttling yields
///   [`GatewayError::RateLimited`]. The returned channel ends when the
///   session ends.
/// - `close` is idempotent.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    /// Returns the transport name for logging.
    fn name(&self) -> &str;

    /// Logs in and starts streaming events.
    async fn open(&self, token: &GatewayToken) -> Result<mpsc::Receiver<GatewayEvent>, GatewayError>;

    /// Posts `content` to `channel`.
    async fn send_message(&self, channel: ChannelId, content: &str) -> Result<(), GatewayError>;

    /// Ends the session.
    async fn close(&self) -> Result<(), GatewayError>;
}
