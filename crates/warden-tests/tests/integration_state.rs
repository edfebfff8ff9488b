// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # State Integration Tests
//!
//! - `test_state_*`: concurrent mutation of the shared state
//! - `test_store_*`: persistence through the data directory
//! - `test_moderation_*`: banned words and cooldowns through the command handler

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};

use warden_core::audit::{AuditAction, AuditFilter, InMemoryAuditSink};
use warden_core::cache::SharedCache;
use warden_core::registry::ServiceRegistry;
use warden_core::state::{Feature, SharedState};
use warden_core::store::StateStore;
use warden_core::subsystems::{AuditLogger, CommandHandler, MessageOutcome};
use warden_core::types::{ChannelId, RoleId, Tag, UserId};
use warden_tests::prelude::*;

// =============================================================================
// Shared State
// =============================================================================

#[tokio::test]
async fn test_state_concurrent_mute_keeps_one_entry() {
    let state = Arc::new(SharedState::default());
    let user = UserId::new(77);
    let until = Utc::now() + ChronoDuration::minutes(10);

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let state = state.clone();
            tokio::spawn(async move { state.mute(user, until) })
        })
        .collect();

    let mut inserted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            inserted += 1;
        }
    }

    assert_eq!(inserted, 1);
    assert_eq!(state.muted_count(), 1);
    assert_eq!(state.mute_expiry(user), Some(until));
}

#[tokio::test]
async fn test_state_parallel_writers_on_distinct_keys() {
    let state = Arc::new(SharedState::default());

    let handles: Vec<_> = (0..32u64)
        .map(|i| {
            let state = state.clone();
            tokio::spawn(async move {
                state.add_tag(Tag::new(format!("tag-{}", i % 8), "body", UserId::new(i)));
                state.stick_role(UserId::new(i), RoleId::new(1));
                state.add_banned_word(&format!("Word{}", i % 4));
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(state.tag_count(), 8);
    assert_eq!(state.stickied_roles_of(UserId::new(31)), vec![RoleId::new(1)]);
    assert!(state.is_banned_word("word3"));
    assert_eq!(state.snapshot().moderation.banned_words.len(), 4);
}

#[tokio::test]
async fn test_state_cooldown_claimed_once() {
    let cache = Arc::new(SharedCache::new());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache.set_if_absent("cooldown:1", format!("cmd-{}", i), Duration::from_secs(5))
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    assert!(cache.get("cooldown:1").is_some());
}

// =============================================================================
// Store
// =============================================================================

#[tokio::test]
async fn test_store_round_trip_through_data_dir() {
    let dir = TestDir::new();
    std::fs::create_dir_all(dir.data_dir()).unwrap();
    let store = StateStore::new(dir.data_dir());

    let state = store.load_state().unwrap();
    assert_eq!(state.prefix(), "!");

    state.set_prefix("?").unwrap();
    state.features().set(Feature::ModLogUserMuted, true);
    state.mute(UserId::new(5), Utc::now() + ChronoDuration::hours(1));
    state.add_exempt_channel(ChannelId::new(12));
    store.save_state(&state).unwrap();

    let restored = store.load_state().unwrap();
    assert_eq!(restored.prefix(), "?");
    assert!(restored.features().is_enabled(Feature::ModLogUserMuted));
    assert!(!restored.features().is_enabled(Feature::LogUserJoined));
    assert!(restored.is_muted(UserId::new(5)));
    assert!(restored.is_exempt_channel(ChannelId::new(12)));
}

#[tokio::test]
async fn test_store_rejects_corrupt_state() {
    let dir = TestDir::new();
    std::fs::create_dir_all(dir.data_dir()).unwrap();
    std::fs::write(dir.data_dir().join("state.json"), "{ not json").unwrap();

    assert!(StateStore::new(dir.data_dir()).load_state().is_err());
}

#[tokio::test]
async fn test_store_written_by_registry_disposal() {
    let harness = TestHarness::ready(0).await;
    harness.state.add_banned_word("spam");

    let registry = ServiceRegistry::standard(harness.context());
    registry.initialize_all().await.unwrap();
    registry.dispose().await.unwrap();

    let restored = StateStore::new(harness.dir.data_dir()).load_state().unwrap();
    assert!(restored.is_banned_word("spam"));
}

// =============================================================================
// Moderation
// =============================================================================

#[tokio::test]
async fn test_moderation_flags_banned_word_outside_exempt_channels() {
    let harness = TestHarness::ready(0).await;
    harness.state.add_banned_word("spam");
    harness.state.add_exempt_channel(ChannelId::new(2));

    let sink = Arc::new(InMemoryAuditSink::new());
    let registry = ServiceRegistry::builder(harness.context())
        .register(Arc::new(CommandHandler::new(harness.context())))
        .register(Arc::new(AuditLogger::with_sink(harness.context(), sink.clone())))
        .build();
    registry.initialize_all().await.unwrap();

    let handler = registry.get::<CommandHandler>().unwrap();
    let flagged = handler.handle_message(&EventFixtures::message_info(1, 9, "buy SPAM now"));
    assert_eq!(flagged, MessageOutcome::Flagged("spam".to_string()));

    let exempt = handler.handle_message(&EventFixtures::message_info(2, 9, "spam is fine here"));
    assert_eq!(exempt, MessageOutcome::Ignored);
    assert_eq!(handler.flagged_messages(), 1);

    assert!(eventually(Duration::from_secs(1), || sink.count(AuditAction::BannedWord) == 1).await);

    let logger = registry.get::<AuditLogger>().unwrap();
    let entries = logger
        .query(AuditFilter::new().action(AuditAction::BannedWord))
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    registry.dispose().await.unwrap();
}

#[tokio::test]
async fn test_moderation_command_cooldown() {
    let harness = TestHarness::ready(0).await;
    let handler = CommandHandler::with_cooldown(harness.context(), Duration::from_millis(100));

    let ping = EventFixtures::message_info(1, 3, "!ping");
    assert_eq!(handler.handle_message(&ping), MessageOutcome::Invoked("ping".into()));
    assert_eq!(handler.handle_message(&ping), MessageOutcome::CoolingDown("ping".into()));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(handler.handle_message(&ping), MessageOutcome::Invoked("ping".into()));
    assert_eq!(handler.invocations("ping"), 2);
}
