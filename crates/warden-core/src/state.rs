// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Process-wide moderation state shared by every subsystem.
//!
//! [`SharedState`] is loaded once at startup and handed to subsystems by
//! reference. It is never rebuilt while the process runs; subsystems mutate it
//! in place. Each collection does its own fine-grained locking, so concurrent
//! writers to the same field serialize on that entry rather than on a global
//! lock.
//!
//! # Example
//!
//! ```
//! use warden_core::state::SharedState;
//! use warden_core::types::UserId;
//! use chrono::{Duration, Utc};
//!
//! let state = SharedState::default();
//! let until = Utc::now() + Duration::minutes(10);
//! assert!(state.mute(UserId::new(1), until));
//! assert!(!state.mute(UserId::new(1), until));
//! assert!(state.is_muted(UserId::new(1)));
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::types::{ChannelId, MessageId, ReactionRoleBinding, RoleId, Tag, UserId};

/// Command prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "!";

// =============================================================================
// Bindings
// =============================================================================

/// Channels the bot posts notices to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelBindings {
    /// Channel for member and message activity notices.
    pub user_logging: ChannelId,
    /// Channel for moderation action notices.
    pub moderation_logging: ChannelId,
}

/// Roles the bot assigns or checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleBindings {
    /// Role applied to muted members.
    pub muted: RoleId,
    /// Role applied to softbanned members.
    pub softbanned: RoleId,
    /// Role allowed to manage the bot.
    pub bot_manager: RoleId,
}

// =============================================================================
// Feature Toggles
// =============================================================================

/// Independently switchable logging features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Announce members leaving.
    LogUserLeft,
    /// Announce member profile changes.
    LogUserUpdated,
    /// Announce members joining.
    LogUserJoined,
    /// Announce message edits.
    LogMessageUpdated,
    /// Announce message deletions.
    LogMessageDeleted,
    /// Record bans in the moderation log.
    ModLogUserBanned,
    /// Record kicks in the moderation log.
    ModLogUserKicked,
    /// Record mutes in the moderation log.
    ModLogUserMuted,
}

impl Feature {
    /// Number of features.
    pub const COUNT: usize = 8;

    /// Every feature, in declaration order.
    pub const ALL: [Feature; Feature::COUNT] = [
        Feature::LogUserLeft,
        Feature::LogUserUpdated,
        Feature::LogUserJoined,
        Feature::LogMessageUpdated,
        Feature::LogMessageDeleted,
        Feature::ModLogUserBanned,
        Feature::ModLogUserKicked,
        Feature::ModLogUserMuted,
    ];

    /// Returns the persisted name of this feature.
    pub fn as_str(self) -> &'static str {
        match self {
            Feature::LogUserLeft => "log_user_left",
            Feature::LogUserUpdated => "log_user_updated",
            Feature::LogUserJoined => "log_user_joined",
            Feature::LogMessageUpdated => "log_message_updated",
            Feature::LogMessageDeleted => "log_message_deleted",
            Feature::ModLogUserBanned => "mod_log_user_banned",
            Feature::ModLogUserKicked => "mod_log_user_kicked",
            Feature::ModLogUserMuted => "mod_log_user_muted",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Lock-free feature flags, one atomic per [`Feature`].
#[derive(Debug, Default)]
pub struct FeatureToggles {
    flags: [AtomicBool; Feature::COUNT],
}

impl FeatureToggles {
    /// Returns whether `feature` is enabled.
    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.flags[feature.index()].load(Ordering::Acquire)
    }

    /// Enables or disables `feature`, returning the previous value.
    pub fn set(&self, feature: Feature, enabled: bool) -> bool {
        self.flags[feature.index()].swap(enabled, Ordering::AcqRel)
    }

    fn to_map(&self) -> BTreeMap<String, bool> {
        Feature::ALL
            .iter()
            .map(|f| (f.as_str().to_string(), self.is_enabled(*f)))
            .collect()
    }
}

// =============================================================================
// SharedState
// =============================================================================

/// The shared configuration and moderation state.
#[derive(Debug)]
pub struct SharedState {
    prefix: RwLock<String>,
    channels: RwLock<ChannelBindings>,
    roles: RwLock<RoleBindings>,
    features: FeatureToggles,
    tags: DashMap<String, Tag>,
    muted_users: DashMap<UserId, DateTime<Utc>>,
    stickied_users: DashMap<UserId, Vec<RoleId>>,
    reaction_roles: DashSet<ReactionRoleBinding>,
    stickied_roles: DashSet<RoleId>,
    banned_words: DashSet<String>,
    exempt_channels: DashSet<ChannelId>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            prefix: RwLock::new(DEFAULT_PREFIX.to_string()),
            channels: RwLock::default(),
            roles: RwLock::default(),
            features: FeatureToggles::default(),
            tags: DashMap::new(),
            muted_users: DashMap::new(),
            stickied_users: DashMap::new(),
            reaction_roles: DashSet::new(),
            stickied_roles: DashSet::new(),
            banned_words: DashSet::new(),
            exempt_channels: DashSet::new(),
        }
    }
}

impl SharedState {
    /// Builds the state from a persisted snapshot.
    ///
    /// Fails if the snapshot violates an invariant, such as an empty prefix.
    pub fn from_snapshot(snapshot: StateSnapshot) -> Result<Self, StateError> {
        validate_prefix(&snapshot.identity.command_prefix)?;

        let state = Self {
            prefix: RwLock::new(snapshot.identity.command_prefix),
            channels: RwLock::new(snapshot.channels),
            roles: RwLock::new(snapshot.roles),
            ..Self::default()
        };

        for feature in Feature::ALL {
            let enabled = snapshot
                .features
                .get(feature.as_str())
                .copied()
                .unwrap_or(false);
            state.features.set(feature, enabled);
        }

        let moderation = snapshot.moderation;
        for tag in moderation.tags {
            state.tags.insert(tag.name.clone(), tag);
        }
        for (user, until) in moderation.muted_users {
            state.muted_users.insert(user, until);
        }
        for (user, roles) in moderation.stickied_users {
            state.stickied_users.insert(user, roles);
        }
        for binding in moderation.reaction_roles {
            state.reaction_roles.insert(binding);
        }
        for role in moderation.stickied_roles {
            state.stickied_roles.insert(role);
        }
        for word in moderation.banned_words {
            state.banned_words.insert(word.to_lowercase());
        }
        for channel in moderation.banned_words_exempt_channels {
            state.exempt_channels.insert(channel);
        }

        Ok(state)
    }

    /// Captures the current state for persistence.
    pub fn snapshot(&self) -> StateSnapshot {
        let mut tags: Vec<Tag> = self.tags.iter().map(|e| e.value().clone()).collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));

        let mut reaction_roles: Vec<ReactionRoleBinding> =
            self.reaction_roles.iter().map(|b| b.key().clone()).collect();
        reaction_roles.sort_by(|a, b| {
            (a.message_id, &a.emoji, a.role).cmp(&(b.message_id, &b.emoji, b.role))
        });

        let mut stickied_roles: Vec<RoleId> = self.stickied_roles.iter().map(|r| *r).collect();
        stickied_roles.sort();
        let mut banned_words: Vec<String> = self.banned_words.iter().map(|w| w.clone()).collect();
        banned_words.sort();
        let mut exempt: Vec<ChannelId> = self.exempt_channels.iter().map(|c| *c).collect();
        exempt.sort();

        StateSnapshot {
            identity: IdentitySnapshot {
                command_prefix: self.prefix(),
            },
            channels: self.channels(),
            roles: self.roles(),
            features: self.features.to_map(),
            moderation: ModerationSnapshot {
                tags,
                muted_users: self.muted_users.iter().map(|e| (*e.key(), *e.value())).collect(),
                stickied_users: self
                    .stickied_users
                    .iter()
                    .map(|e| (*e.key(), e.value().clone()))
                    .collect(),
                reaction_roles,
                stickied_roles,
                banned_words,
                banned_words_exempt_channels: exempt,
            },
        }
    }

    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------

    /// Returns the command prefix.
    pub fn prefix(&self) -> String {
        self.prefix.read().clone()
    }

    /// Replaces the command prefix. Empty or whitespace-bearing prefixes are rejected.
    pub fn set_prefix(&self, prefix: impl Into<String>) -> Result<(), StateError> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        *self.prefix.write() = prefix;
        Ok(())
    }

    /// Returns the invocation if `content` starts with the command prefix.
    pub fn strip_prefix<'a>(&self, content: &'a str) -> Option<&'a str> {
        let prefix = self.prefix.read();
        content.strip_prefix(prefix.as_str())
    }

    // -------------------------------------------------------------------------
    // Bindings and features
    // -------------------------------------------------------------------------

    /// Returns the channel bindings.
    pub fn channels(&self) -> ChannelBindings {
        *self.channels.read()
    }

    /// Applies `update` to the channel bindings.
    pub fn update_channels(&self, update: impl FnOnce(&mut ChannelBindings)) {
        update(&mut self.channels.write());
    }

    /// Returns the role bindings.
    pub fn roles(&self) -> RoleBindings {
        *self.roles.read()
    }

    /// Applies `update` to the role bindings.
    pub fn update_roles(&self, update: impl FnOnce(&mut RoleBindings)) {
        update(&mut self.roles.write());
    }

    /// Returns the feature toggles.
    pub fn features(&self) -> &FeatureToggles {
        &self.features
    }

    // -------------------------------------------------------------------------
    // Tags
    // -------------------------------------------------------------------------

    /// Adds `tag` unless a tag with the same name exists. Returns `true` if added.
    pub fn add_tag(&self, tag: Tag) -> bool {
        match self.tags.entry(tag.name.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(tag);
                true
            }
        }
    }

    /// Looks up a tag by name.
    pub fn tag(&self, name: &str) -> Option<Tag> {
        self.tags.get(name).map(|t| t.value().clone())
    }

    /// Removes a tag by name.
    pub fn remove_tag(&self, name: &str) -> Option<Tag> {
        self.tags.remove(name).map(|(_, tag)| tag)
    }

    /// Returns the number of tags.
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    // -------------------------------------------------------------------------
    // Mutes
    // -------------------------------------------------------------------------

    /// Mutes `user` until `until`.
    ///
    /// Insert-if-absent: returns `false` and leaves the existing expiry alone if
    /// the user is already muted.
    pub fn mute(&self, user: UserId, until: DateTime<Utc>) -> bool {
        match self.muted_users.entry(user) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(until);
                true
            }
        }
    }

    /// Lifts a mute, returning the expiry it had.
    pub fn unmute(&self, user: UserId) -> Option<DateTime<Utc>> {
        self.muted_users.remove(&user).map(|(_, until)| until)
    }

    /// Returns whether `user` is currently muted.
    pub fn is_muted(&self, user: UserId) -> bool {
        self.muted_users.contains_key(&user)
    }

    /// Returns the mute expiry for `user`.
    pub fn mute_expiry(&self, user: UserId) -> Option<DateTime<Utc>> {
        self.muted_users.get(&user).map(|e| *e.value())
    }

    /// Returns users whose mute expired at or before `now`.
    pub fn expired_mutes(&self, now: DateTime<Utc>) -> Vec<UserId> {
        self.muted_users
            .iter()
            .filter(|e| *e.value() <= now)
            .map(|e| *e.key())
            .collect()
    }

    /// Returns the number of muted users.
    pub fn muted_count(&self) -> usize {
        self.muted_users.len()
    }

    // -------------------------------------------------------------------------
    // Sticky roles
    // -------------------------------------------------------------------------

    /// Records that `role` sticks to `user`, preserving application order.
    ///
    /// Returns `false` if the role was already recorded for the user.
    pub fn stick_role(&self, user: UserId, role: RoleId) -> bool {
        let mut roles = self.stickied_users.entry(user).or_default();
        if roles.contains(&role) {
            false
        } else {
            roles.push(role);
            true
        }
    }

    /// Returns the roles stuck to `user`, in application order.
    pub fn stickied_roles_of(&self, user: UserId) -> Vec<RoleId> {
        self.stickied_users
            .get(&user)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Forgets every role stuck to `user`.
    pub fn unstick_user(&self, user: UserId) -> Option<Vec<RoleId>> {
        self.stickied_users.remove(&user).map(|(_, roles)| roles)
    }

    /// Marks `role` as sticky for everyone.
    pub fn add_stickied_role(&self, role: RoleId) -> bool {
        self.stickied_roles.insert(role)
    }

    /// Unmarks `role` as sticky.
    pub fn remove_stickied_role(&self, role: RoleId) -> bool {
        self.stickied_roles.remove(&role).is_some()
    }

    /// Returns whether `role` is sticky.
    pub fn is_stickied_role(&self, role: RoleId) -> bool {
        self.stickied_roles.contains(&role)
    }

    // -------------------------------------------------------------------------
    // Reaction roles
    // -------------------------------------------------------------------------

    /// Adds a reaction-role binding. Returns `false` if it already exists.
    pub fn add_reaction_role(&self, binding: ReactionRoleBinding) -> bool {
        self.reaction_roles.insert(binding)
    }

    /// Removes a reaction-role binding.
    pub fn remove_reaction_role(&self, binding: &ReactionRoleBinding) -> bool {
        self.reaction_roles.remove(binding).is_some()
    }

    /// Returns the roles granted by reacting to `message` with `emoji`.
    pub fn reaction_roles_for(&self, message: MessageId, emoji: &str) -> Vec<RoleId> {
        self.reaction_roles
            .iter()
            .filter(|b| b.message_id == message && b.emoji == emoji)
            .map(|b| b.role)
            .collect()
    }

    // -------------------------------------------------------------------------
    // Banned words
    // -------------------------------------------------------------------------

    /// Bans `word` (case-insensitive).
    pub fn add_banned_word(&self, word: &str) -> bool {
        self.banned_words.insert(word.to_lowercase())
    }

    /// Unbans `word`.
    pub fn remove_banned_word(&self, word: &str) -> bool {
        self.banned_words.remove(&word.to_lowercase()).is_some()
    }

    /// Returns whether `word` is banned.
    pub fn is_banned_word(&self, word: &str) -> bool {
        self.banned_words.contains(&word.to_lowercase())
    }

    /// Returns the first banned word appearing as a whole word in `text`.
    pub fn find_banned_word(&self, text: &str) -> Option<String> {
        if self.banned_words.is_empty() {
            return None;
        }
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .find(|w| self.banned_words.contains(w))
    }

    /// Exempts `channel` from banned-word filtering.
    pub fn add_exempt_channel(&self, channel: ChannelId) -> bool {
        self.exempt_channels.insert(channel)
    }

    /// Removes a banned-word exemption.
    pub fn remove_exempt_channel(&self, channel: ChannelId) -> bool {
        self.exempt_channels.remove(&channel).is_some()
    }

    /// Returns whether `channel` is exempt from banned-word filtering.
    pub fn is_exempt_channel(&self, channel: ChannelId) -> bool {
        self.exempt_channels.contains(&channel)
    }
}

fn validate_prefix(prefix: &str) -> Result<(), StateError> {
    if prefix.is_empty() {
        return Err(StateError::EmptyPrefix);
    }
    if prefix.chars().any(char::is_whitespace) {
        return Err(StateError::InvalidPrefix {
            prefix: prefix.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Snapshot
// =============================================================================

/// Serializable form of [`SharedState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSnapshot {
    /// Bot identity settings.
    pub identity: IdentitySnapshot,
    /// Channel bindings.
    pub channels: ChannelBindings,
    /// Role bindings.
    pub roles: RoleBindings,
    /// Feature flags keyed by name.
    pub features: BTreeMap<String, bool>,
    /// Moderation collections.
    pub moderation: ModerationSnapshot,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        SharedState::default().snapshot()
    }
}

/// Identity section of a [`StateSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    /// Command prefix.
    #[serde(default = "default_prefix")]
    pub command_prefix: String,
}

impl Default for IdentitySnapshot {
    fn default() -> Self {
        Self {
            command_prefix: default_prefix(),
        }
    }
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

/// Moderation section of a [`StateSnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct ModerationSnapshot {
    pub tags: Vec<Tag>,
    pub muted_users: BTreeMap<UserId, DateTime<Utc>>,
    pub stickied_users: BTreeMap<UserId, Vec<RoleId>>,
    pub reaction_roles: Vec<ReactionRoleBinding>,
    pub stickied_roles: Vec<RoleId>,
    pub banned_words: Vec<String>,
    pub banned_words_exempt_channels: Vec<ChannelId>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    #[test]
    fn test_prefix_never_empty() {
        let state = SharedState::default();
        assert_eq!(state.prefix(), "!");
        assert!(matches!(state.set_prefix(""), Err(StateError::EmptyPrefix)));
        assert!(matches!(
            state.set_prefix("! "),
            Err(StateError::InvalidPrefix { .. })
        ));
        state.set_prefix("?").unwrap();
        assert_eq!(state.strip_prefix("?ping"), Some("ping"));
        assert_eq!(state.strip_prefix("!ping"), None);
    }

    #[test]
    fn test_mute_is_insert_if_absent() {
        let state = SharedState::default();
        let user = UserId::new(9);
        let first = Utc::now() + Duration::minutes(5);
        let second = first + Duration::minutes(5);

        assert!(state.mute(user, first));
        assert!(!state.mute(user, second));
        assert_eq!(state.mute_expiry(user), Some(first));
        assert_eq!(state.unmute(user), Some(first));
        assert!(!state.is_muted(user));
    }

    #[test]
    fn test_concurrent_mute_single_entry() {
        let state = Arc::new(SharedState::default());
        let until = Utc::now() + Duration::hours(1);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                std::thread::spawn(move || state.mute(UserId::new(77), until))
            })
            .collect();

        let inserted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|added| *added)
            .count();

        assert_eq!(inserted, 1);
        assert_eq!(state.muted_count(), 1);
    }

    #[test]
    fn test_expired_mutes() {
        let state = SharedState::default();
        let now = Utc::now();
        state.mute(UserId::new(1), now - Duration::minutes(1));
        state.mute(UserId::new(2), now + Duration::minutes(1));
        assert_eq!(state.expired_mutes(now), vec![UserId::new(1)]);
    }

    #[test]
    fn test_sticky_roles_keep_order() {
        let state = SharedState::default();
        let user = UserId::new(3);
        assert!(state.stick_role(user, RoleId::new(30)));
        assert!(state.stick_role(user, RoleId::new(10)));
        assert!(!state.stick_role(user, RoleId::new(30)));
        assert_eq!(
            state.stickied_roles_of(user),
            vec![RoleId::new(30), RoleId::new(10)]
        );
    }

    #[test]
    fn test_banned_words_case_insensitive() {
        let state = SharedState::default();
        state.add_banned_word("Spam");
        assert!(state.is_banned_word("SPAM"));
        assert_eq!(state.find_banned_word("buy cheap spam now"), Some("spam".to_string()));
        assert_eq!(state.find_banned_word("spammer"), None);
    }

    #[test]
    fn test_feature_toggles_independent() {
        let state = SharedState::default();
        assert!(!state.features().set(Feature::LogUserJoined, true));
        assert!(state.features().is_enabled(Feature::LogUserJoined));
        assert!(!state.features().is_enabled(Feature::LogUserLeft));
    }

    #[test]
    fn test_reaction_roles_lookup() {
        let state = SharedState::default();
        let msg = MessageId::new(5);
        assert!(state.add_reaction_role(ReactionRoleBinding::new(msg, "a", RoleId::new(1))));
        assert!(state.add_reaction_role(ReactionRoleBinding::new(msg, "a", RoleId::new(2))));
        assert!(!state.add_reaction_role(ReactionRoleBinding::new(msg, "a", RoleId::new(2))));
        let mut roles = state.reaction_roles_for(msg, "a");
        roles.sort();
        assert_eq!(roles, vec![RoleId::new(1), RoleId::new(2)]);
    }

    #[test]
    fn test_snapshot_restores_state() {
        let state = SharedState::default();
        state.set_prefix("$").unwrap();
        state.update_channels(|c| c.user_logging = ChannelId::new(100));
        state.features().set(Feature::ModLogUserMuted, true);
        state.add_tag(Tag::new("faq", "see pins", UserId::new(1)));
        state.mute(UserId::new(2), Utc::now() + Duration::days(1));
        state.add_exempt_channel(ChannelId::new(55));

        let json = serde_json::to_string(&state.snapshot()).unwrap();
        let restored =
            SharedState::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(restored.prefix(), "$");
        assert_eq!(restored.channels().user_logging, ChannelId::new(100));
        assert!(restored.features().is_enabled(Feature::ModLogUserMuted));
        assert_eq!(restored.tag("faq").unwrap().content, "see pins");
        assert!(restored.is_muted(UserId::new(2)));
        assert!(restored.is_exempt_channel(ChannelId::new(55)));
    }

    #[test]
    fn test_snapshot_with_empty_prefix_rejected() {
        let mut snapshot = StateSnapshot::default();
        snapshot.identity.command_prefix.clear();
        assert!(matches!(
            SharedState::from_snapshot(snapshot),
            Err(StateError::EmptyPrefix)
        ));
    }

    #[test]
    fn test_partial_snapshot_uses_defaults() {
        let snapshot: StateSnapshot = serde_json::from_str("{}").unwrap();
        let state = SharedState::from_snapshot(snapshot).unwrap();
        assert_eq!(state.prefix(), DEFAULT_PREFIX);
        assert!(!state.channels().user_logging.is_set());
    }
}
