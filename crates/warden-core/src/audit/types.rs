// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Audit entry types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ChannelId, UserId};

// =============================================================================
// AuditAction
// =============================================================================

/// What an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// The bot finished starting up.
    Startup,
    /// The bot is shutting down.
    Shutdown,
    /// A message contained a banned word.
    BannedWord,
    /// A member was muted.
    Mute,
    /// A member was unmuted.
    Unmute,
    /// A member was kicked.
    Kick,
    /// A member was banned.
    Ban,
    /// A prefixed command was invoked.
    Command,
}

impl AuditAction {
    /// Returns `true` for moderation actions taken against a member.
    pub fn is_moderation(self) -> bool {
        matches!(
            self,
            AuditAction::BannedWord
                | AuditAction::Mute
                | AuditAction::Unmute
                | AuditAction::Kick
                | AuditAction::Ban
        )
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuditAction::Startup => "startup",
            AuditAction::Shutdown => "shutdown",
            AuditAction::BannedWord => "banned_word",
            AuditAction::Mute => "mute",
            AuditAction::Unmute => "unmute",
            AuditAction::Kick => "kick",
            AuditAction::Ban => "ban",
            AuditAction::Command => "command",
        };
        f.write_str(name)
    }
}

// =============================================================================
// AuditEntry
// =============================================================================

/// A single audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry id.
    pub id: Uuid,
    /// When the entry was created.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub action: AuditAction,
    /// The member the action concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
    /// The channel the action happened in, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelId>,
    /// Free-form detail.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

impl AuditEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(action: AuditAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            user: None,
            channel: None,
            detail: String::new(),
        }
    }

    /// Creates a moderation entry against `user` in `channel`.
    pub fn moderation(action: AuditAction, user: UserId, channel: ChannelId, detail: impl Into<String>) -> Self {
        Self::new(action)
            .with_user(user)
            .with_channel(channel)
            .with_detail(detail)
    }

    /// Sets the user.
    pub fn with_user(mut self, user: UserId) -> Self {
        self.user = Some(user);
        self
    }

    /// Sets the channel.
    pub fn with_channel(mut self, channel: ChannelId) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Sets the detail text.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

// =============================================================================
// AuditFilter
// =============================================================================

/// Criteria for querying audit entries. Empty criteria match everything.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    action: Option<AuditAction>,
    user: Option<UserId>,
    since: Option<DateTime<Utc>>,
    limit: Option<usize>,
}

impl AuditFilter {
    /// Creates a filter that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one action.
    pub fn action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Restricts to one user.
    pub fn user(mut self, user: UserId) -> Self {
        self.user = Some(user);
        self
    }

    /// Restricts to entries at or after `since`.
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Caps the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns the result cap.
    pub fn max_results(&self) -> usize {
        self.limit.unwrap_or(usize::MAX)
    }

    /// Returns `true` if `entry` satisfies every criterion.
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.action.is_none_or(|a| a == entry.action)
            && self.user.is_none_or(|u| entry.user == Some(u))
            && self.since.is_none_or(|s| entry.timestamp >= s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moderation_entry() {
        let entry = AuditEntry::moderation(AuditAction::BannedWord, UserId::new(1), ChannelId::new(2), "spam");
        assert!(entry.action.is_moderation());
        assert_eq!(entry.user, Some(UserId::new(1)));
        assert_eq!(entry.detail, "spam");
    }

    #[test]
    fn test_filter_matching() {
        let entry = AuditEntry::new(AuditAction::Mute).with_user(UserId::new(5));
        assert!(AuditFilter::new().matches(&entry));
        assert!(AuditFilter::new().action(AuditAction::Mute).user(UserId::new(5)).matches(&entry));
        assert!(!AuditFilter::new().user(UserId::new(6)).matches(&entry));
        assert!(!AuditFilter::new().action(AuditAction::Ban).matches(&entry));
    }

    #[test]
    fn test_entry_json_omits_empty_fields() {
        let json = serde_json::to_string(&AuditEntry::new(AuditAction::Startup)).unwrap();
        assert!(json.contains("\"action\":\"startup\""));
        assert!(!json.contains("user"));
        assert!(!json.contains("detail"));
    }
}
