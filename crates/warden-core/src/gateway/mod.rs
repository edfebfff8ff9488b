// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway connectivity.
//!
//! # Components
//!
//! - [`GatewayConnection`]: the process-wide session and its state machine
//! - [`GatewayTransport`]: the wire seam the connection drives
//! - [`WebSocketTransport`]: the shipped JSON-over-WebSocket transport
//! - [`GatewayEvent`]: events fanned out to subsystems
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_core::gateway::{ConnectionSettings, GatewayConnection, WebSocketTransport};
//!
//! let transport = Arc::new(WebSocketTransport::new("wss://gateway.example/ws"));
//! let connection = GatewayConnection::new(transport, token, ConnectionSettings::default());
//!
//! connection.connect().await?;
//! let ready = connection.wait_until_ready(Duration::from_secs(30)).await?;
//! ```

mod connection;
mod event;
mod transport;
mod websocket;

pub use connection::{ConnectionSettings, ConnectionState, GatewayConnection};
pub use event::{
    DeletedMessage, GatewayEvent, LogRecord, LogSeverity, MemberInfo, MessageInfo, ReadyInfo,
};
pub use transport::{DEFAULT_EVENT_CAPACITY, GatewayTransport};
pub use websocket::WebSocketTransport;
