// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core data types for Warden.
//!
//! Gateway entities are addressed by 64-bit snowflake identifiers. Each kind of
//! entity gets its own newtype so a role id can never be passed where a channel
//! id is expected. The zero value is reserved and means "unconfigured".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// The reserved "unconfigured" value.
            pub const UNSET: Self = Self(0);

            /// Creates a new identifier.
            #[inline]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the raw snowflake value.
            #[inline]
            pub const fn get(self) -> u64 {
                self.0
            }

            /// Returns `true` if this identifier has been configured.
            #[inline]
            pub const fn is_set(self) -> bool {
                self.0 != 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

snowflake_id!(
    /// Identifier of a gateway user.
    UserId
);

snowflake_id!(
    /// Identifier of a guild role.
    RoleId
);

snowflake_id!(
    /// Identifier of a text channel.
    ChannelId
);

snowflake_id!(
    /// Identifier of a message.
    MessageId
);

// =============================================================================
// Tags
// =============================================================================

/// A named snippet of text that members can recall by name.
///
/// Tags are identified by their name alone; two tags with the same name are
/// the same tag regardless of content or owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    /// Unique tag name.
    pub name: String,
    /// Text returned when the tag is recalled.
    pub content: String,
    /// User that created the tag.
    pub owner: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Tag {
    /// Creates a tag owned by `owner`, stamped with the current time.
    pub fn new(name: impl Into<String>, content: impl Into<String>, owner: UserId) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            owner,
            created_at: Utc::now(),
        }
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

// =============================================================================
// Reaction Roles
// =============================================================================

/// A reaction-role binding: reacting to `message_id` with `emoji` grants `role`.
///
/// The full triple identifies one binding; the same message may carry several
/// bindings for different emoji or roles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReactionRoleBinding {
    /// Message the reaction must be placed on.
    pub message_id: MessageId,
    /// Emoji identifier (unicode glyph or custom emoji id).
    pub emoji: String,
    /// Role granted by the reaction.
    pub role: RoleId,
}

impl ReactionRoleBinding {
    /// Creates a new binding.
    pub fn new(message_id: MessageId, emoji: impl Into<String>, role: RoleId) -> Self {
        Self {
            message_id,
            emoji: emoji.into(),
            role,
        }
    }
}

// =============================================================================
// Gateway Token
// =============================================================================

/// The opaque credential used to authenticate against the gateway.
///
/// The `Debug` representation never reveals the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayToken(String);

impl GatewayToken {
    /// Wraps a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for transmission to the gateway.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for GatewayToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GatewayToken(***)")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_unset_identifiers() {
        assert!(!ChannelId::UNSET.is_set());
        assert!(!RoleId::default().is_set());
        assert!(UserId::new(42).is_set());
        assert_eq!(UserId::from(42).get(), 42);
    }

    #[test]
    fn test_tag_identity_is_name() {
        let mut tags = HashSet::new();
        assert!(tags.insert(Tag::new("rules", "be nice", UserId::new(1))));
        assert!(!tags.insert(Tag::new("rules", "different text", UserId::new(2))));
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn test_reaction_binding_triple_identity() {
        let a = ReactionRoleBinding::new(MessageId::new(1), "👍", RoleId::new(7));
        let b = ReactionRoleBinding::new(MessageId::new(1), "👍", RoleId::new(8));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = GatewayToken::new("super-secret");
        assert_eq!(format!("{:?}", token), "GatewayToken(***)");
        assert_eq!(token.expose(), "super-secret");
    }
}
