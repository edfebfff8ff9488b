// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # warden-core
//!
//! Core lifecycle, gateway and shared-state abstractions for the Warden
//! moderation bot.
//!
//! This crate provides the building blocks the orchestrator wires together:
//!
//! - **Types**: snowflake identifiers, tags, reaction-role bindings, tokens
//! - **Error**: unified error hierarchy
//! - **State**: `SharedState`, the concurrently mutated moderation state
//! - **Store**: JSON persistence of the state snapshot
//! - **Gateway**: the single gateway connection and its transports
//! - **Retry**: rate-limit aware retry policies
//! - **Subsystem / Registry**: initialize-once subsystems and their owner
//! - **Audit**: append-only audit trail
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warden_core::gateway::{ConnectionSettings, GatewayConnection, WebSocketTransport};
//! use warden_core::registry::{ServiceContext, ServiceRegistry};
//! use warden_core::store::StateStore;
//!
//! let gateway = Arc::new(GatewayConnection::new(
//!     Arc::new(WebSocketTransport::new("wss://gateway.example/ws")),
//!     token,
//!     ConnectionSettings::default(),
//! ));
//! gateway.connect().await?;
//! gateway.wait_until_ready(Duration::from_secs(30)).await?;
//!
//! let state = Arc::new(StateStore::new("data").load_state()?);
//! let registry = ServiceRegistry::standard(ServiceContext::new(gateway, state, "data"));
//! registry.initialize_all().await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Core Modules
// =============================================================================

pub mod error;
pub mod types;
pub mod uptime;

// =============================================================================
// State Modules
// =============================================================================

pub mod cache;
pub mod state;
pub mod store;

// =============================================================================
// Gateway Modules
// =============================================================================

pub mod gateway;
pub mod retry;

// =============================================================================
// Lifecycle Modules
// =============================================================================

pub mod registry;
pub mod subsystem;
pub mod subsystems;

// =============================================================================
// Audit Modules
// =============================================================================

pub mod audit;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use error::*;
pub use types::*;

pub use cache::SharedCache;
pub use state::{Feature, SharedState, StateSnapshot};
pub use store::StateStore;
pub use uptime::Uptime;

pub use gateway::{ConnectionSettings, ConnectionState, GatewayConnection, GatewayEvent, GatewayTransport};
pub use retry::{RetryConfig, RetryMode, RetryStrategy};

pub use registry::{ServiceContext, ServiceRegistry};
pub use subsystem::Subsystem;
pub use subsystems::{AuditLogger, CommandHandler, EventLogger, MembershipTracker};

pub use audit::{AuditAction, AuditEntry, AuditFeed, AuditFilter, AuditSink};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
