// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Short-lived keyed cache shared between subsystems.
//!
//! Entries expire after a per-entry time-to-live. Expired entries are treated
//! as absent on read and are dropped lazily or by [`SharedCache::purge_expired`].

use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// A concurrent string cache with per-entry expiry.
#[derive(Debug, Default)]
pub struct SharedCache {
    entries: DashMap<String, CacheEntry>,
}

impl SharedCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key` for `ttl`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value: value.into(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Stores `value` only if `key` is absent or expired.
    ///
    /// Returns `true` if the value was stored.
    pub fn set_if_absent(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) -> bool {
        let now = Instant::now();
        let entry = CacheEntry {
            value: value.into(),
            expires_at: now + ttl,
        };

        match self.entries.entry(key.into()) {
            Entry::Occupied(mut slot) => {
                if slot.get().is_live(now) {
                    false
                } else {
                    slot.insert(entry);
                    true
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// Returns the live value under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let value = self
            .entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone());

        if value.is_none() {
            self.entries.remove_if(key, |_, e| !e.is_live(now));
        }
        value
    }

    /// Returns the remaining lifetime of `key`.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.expires_at - now)
    }

    /// Removes `key`.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries.remove(key).map(|(_, e)| e.value)
    }

    /// Drops every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Returns the number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let cache = SharedCache::new();
        cache.set("greeting", "hello", Duration::from_secs(60));
        assert_eq!(cache.get("greeting").as_deref(), Some("hello"));
        assert!(cache.ttl("greeting").unwrap() <= Duration::from_secs(60));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn test_expired_entries_are_absent() {
        let cache = SharedCache::new();
        cache.set("k", "v", Duration::ZERO);
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_if_absent() {
        let cache = SharedCache::new();
        assert!(cache.set_if_absent("cooldown:1", "x", Duration::from_secs(5)));
        assert!(!cache.set_if_absent("cooldown:1", "y", Duration::from_secs(5)));
        assert_eq!(cache.get("cooldown:1").as_deref(), Some("x"));

        cache.set("cooldown:2", "x", Duration::ZERO);
        assert!(cache.set_if_absent("cooldown:2", "y", Duration::from_secs(5)));
    }

    #[test]
    fn test_purge_expired() {
        let cache = SharedCache::new();
        cache.set("a", "1", Duration::ZERO);
        cache.set("b", "2", Duration::ZERO);
        cache.set("c", "3", Duration::from_secs(60));
        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.remove("c").as_deref(), Some("3"));
    }
}
