// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The fixed set of subsystems brought up once the gateway is ready.
//!
//! | Subsystem | Consumes | Produces |
//! |---|---|---|
//! | [`CommandHandler`] | message events | audit entries, invocation counts |
//! | [`EventLogger`] | member and message events | notices in the user-logging channel |
//! | [`MembershipTracker`] | ready, join and leave events | current member count |
//! | [`AuditLogger`] | the audit feed | `audit.jsonl` under the data directory |
//!
//! Each one subscribes to its source during `initialize` and stops its
//! consumer task during `dispose`.

mod audit_logger;
mod command_handler;
mod event_logger;
mod membership;

pub use audit_logger::AuditLogger;
pub use command_handler::{CommandHandler, DEFAULT_COOLDOWN, MessageOutcome};
pub use event_logger::{EventLogger, render_notice};
pub use membership::MembershipTracker;
