// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Events delivered by the gateway.
//!
//! The serialized form matches the wire framing used by the WebSocket
//! transport: `{"op": "<event>", "d": { ... }}`.

use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, MessageId, UserId};

// =============================================================================
// GatewayEvent
// =============================================================================

/// An event received from the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// The session is ready for use.
    Ready(ReadyInfo),
    /// A member joined the guild.
    MemberJoined(MemberInfo),
    /// A member left the guild.
    MemberLeft(MemberInfo),
    /// A member's profile changed.
    MemberUpdated(MemberInfo),
    /// A message was posted.
    MessageCreated(MessageInfo),
    /// A message was edited.
    MessageUpdated(MessageInfo),
    /// A message was deleted.
    MessageDeleted(DeletedMessage),
    /// A diagnostic record from the gateway client.
    Log(LogRecord),
}

impl GatewayEvent {
    /// Returns the wire name of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayEvent::Ready(_) => "ready",
            GatewayEvent::MemberJoined(_) => "member_joined",
            GatewayEvent::MemberLeft(_) => "member_left",
            GatewayEvent::MemberUpdated(_) => "member_updated",
            GatewayEvent::MessageCreated(_) => "message_created",
            GatewayEvent::MessageUpdated(_) => "message_updated",
            GatewayEvent::MessageDeleted(_) => "message_deleted",
            GatewayEvent::Log(_) => "log",
        }
    }
}

/// Payload of the ready event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyInfo {
    /// Session identifier assigned by the gateway.
    #[serde(default)]
    pub session_id: String,
    /// The bot's own user id.
    #[serde(default)]
    pub user_id: UserId,
    /// Number of guild members at the time of the ready event.
    #[serde(default)]
    pub member_count: u64,
}

/// A guild member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    /// Member's user id.
    pub user_id: UserId,
    /// Display name.
    pub username: String,
    /// Whether the member is a bot account.
    #[serde(default)]
    pub bot: bool,
}

/// A posted or edited message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInfo {
    /// Message id.
    pub message_id: MessageId,
    /// Channel the message lives in.
    pub channel_id: ChannelId,
    /// Author's user id.
    pub author_id: UserId,
    /// Whether the author is a bot account.
    #[serde(default)]
    pub author_is_bot: bool,
    /// Message text.
    pub content: String,
}

/// A deleted message reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct DeletedMessage {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
}

// =============================================================================
// Log Records
// =============================================================================

/// Severity of a gateway log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum LogSeverity {
    Critical,
    Error,
    Warning,
    Info,
    Verbose,
    Debug,
}

/// A diagnostic record emitted by the gateway client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Severity.
    pub severity: LogSeverity,
    /// Component that produced the record.
    pub source: String,
    /// Text.
    pub message: String,
}

impl LogRecord {
    /// Creates a log record.
    pub fn new(severity: LogSeverity, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            source: source.into(),
            message: message.into(),
        }
    }

    /// Forwards this record to the structured log.
    pub fn emit(&self) {
        let source = self.source.as_str();
        let message = self.message.as_str();
        match self.severity {
            LogSeverity::Critical | LogSeverity::Error => {
                tracing::error!(source = %source, "{}", message)
            }
            LogSeverity::Warning => tracing::warn!(source = %source, "{}", message),
            LogSeverity::Info => tracing::info!(source = %source, "{}", message),
            LogSeverity::Verbose => tracing::debug!(source = %source, "{}", message),
            LogSeverity::Debug => tracing::trace!(source = %source, "{}", message),
        }
    }
}
