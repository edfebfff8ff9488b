// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Audit trail for moderation and lifecycle events.
//!
//! # Components
//!
//! - [`AuditSink`]: storage trait for audit entries
//! - [`FileAuditSink`]: append-only JSON-lines file
//! - [`InMemoryAuditSink`]: queryable in-memory store for tests
//! - [`AuditFeed`]: broadcast channel subsystems publish entries on
//!
//! Producers never write to a sink directly. They publish on the
//! [`AuditFeed`] carried by the service context, and the audit logger
//! subsystem drains the feed into its sink.
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_core::audit::{AuditAction, AuditEntry, AuditSink, FileAuditSink};
//!
//! let sink = FileAuditSink::open("data/audit.jsonl")?;
//! sink.record(AuditEntry::new(AuditAction::Startup)).await?;
//! sink.flush().await?;
//! ```

mod file_sink;
mod memory_sink;
mod types;

pub use file_sink::{AUDIT_FILE, FileAuditSink};
pub use memory_sink::InMemoryAuditSink;
pub use types::{AuditAction, AuditEntry, AuditFilter};

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::AuditResult;

// =============================================================================
// Core Trait
// =============================================================================

/// Storage for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Stores one entry.
    async fn record(&self, entry: AuditEntry) -> AuditResult<()>;

    /// Returns stored entries matching `filter`, oldest first.
    async fn query(&self, filter: AuditFilter) -> AuditResult<Vec<AuditEntry>>;

    /// Persists buffered entries.
    async fn flush(&self) -> AuditResult<()>;

    /// Returns the sink name for identification.
    fn name(&self) -> &str {
        "audit_sink"
    }
}

// =============================================================================
// No-Op Sink
// =============================================================================

/// A sink that discards all entries.
#[derive(Debug, Default, Clone)]
pub struct NoOpAuditSink;

#[async_trait]
impl AuditSink for NoOpAuditSink {
    async fn record(&self, _entry: AuditEntry) -> AuditResult<()> {
        Ok(())
    }

    async fn query(&self, _filter: AuditFilter) -> AuditResult<Vec<AuditEntry>> {
        Ok(Vec::new())
    }

    async fn flush(&self) -> AuditResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

// =============================================================================
// Audit Feed
// =============================================================================

/// Capacity of the audit broadcast channel.
pub const AUDIT_FEED_CAPACITY: usize = 128;

/// Fan-out channel for audit entries.
///
/// Entries published while nobody is subscribed are held in a bounded
/// backlog (oldest dropped first) until a listener takes them with
/// [`AuditFeed::subscribe_with_backlog`] or [`AuditFeed::take_backlog`].
#[derive(Debug, Clone)]
pub struct AuditFeed {
    sender: broadcast::Sender<AuditEntry>,
    backlog: Arc<Mutex<VecDeque<AuditEntry>>>,
    capacity: usize,
}

impl Default for AuditFeed {
    fn default() -> Self {
        Self::new(AUDIT_FEED_CAPACITY)
    }
}

impl AuditFeed {
    /// Creates a feed buffering up to `capacity` entries per subscriber and
    /// in the backlog.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            backlog: Arc::new(Mutex::new(VecDeque::new())),
            capacity,
        }
    }

    /// Publishes `entry`. Returns `false` if nobody is listening, in which
    /// case the entry is kept in the backlog.
    pub fn publish(&self, entry: AuditEntry) -> bool {
        let mut backlog = self.backlog.lock();
        let entry = if self.sender.receiver_count() > 0 {
            match self.sender.send(entry) {
                Ok(_) => return true,
                Err(broadcast::error::SendError(entry)) => entry,
            }
        } else {
            entry
        };

        if backlog.len() >= self.capacity {
            if let Some(dropped) = backlog.pop_front() {
                tracing::warn!(action = %dropped.action, "Audit backlog full, oldest entry dropped");
            }
        }
        tracing::debug!(action = %entry.action, "No audit listener, entry held in backlog");
        backlog.push_back(entry);
        false
    }

    /// Subscribes to entries published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEntry> {
        self.sender.subscribe()
    }

    /// Subscribes and takes the backlog in one step, so no entry falls
    /// between the two.
    pub fn subscribe_with_backlog(&self) -> (Vec<AuditEntry>, broadcast::Receiver<AuditEntry>) {
        let mut backlog = self.backlog.lock();
        let receiver = self.sender.subscribe();
        (backlog.drain(..).collect(), receiver)
    }

    /// Takes every entry held in the backlog.
    pub fn take_backlog(&self) -> Vec<AuditEntry> {
        self.backlog.lock().drain(..).collect()
    }

    /// Number of entries waiting for a listener.
    pub fn backlog_len(&self) -> usize {
        self.backlog.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = NoOpAuditSink;
        sink.record(AuditEntry::new(AuditAction::Startup)).await.unwrap();
        assert!(sink.query(AuditFilter::new()).await.unwrap().is_empty());
        assert_eq!(sink.name(), "noop");
    }

    #[tokio::test]
    async fn test_feed_delivers_to_subscribers() {
        let feed = AuditFeed::default();
        assert!(!feed.publish(AuditEntry::new(AuditAction::Startup)));

        let mut rx = feed.subscribe();
        assert!(feed.publish(AuditEntry::new(AuditAction::Ban)));
        assert_eq!(rx.recv().await.unwrap().action, AuditAction::Ban);
    }

    #[tokio::test]
    async fn test_feed_holds_entries_until_subscribed() {
        let feed = AuditFeed::new(2);
        assert!(!feed.publish(AuditEntry::new(AuditAction::Kick)));
        assert!(!feed.publish(AuditEntry::new(AuditAction::Mute)));
        assert!(!feed.publish(AuditEntry::new(AuditAction::Ban)));
        assert_eq!(feed.backlog_len(), 2);

        let (backlog, mut rx) = feed.subscribe_with_backlog();
        let actions: Vec<_> = backlog.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::Mute, AuditAction::Ban]);
        assert_eq!(feed.backlog_len(), 0);

        assert!(feed.publish(AuditEntry::new(AuditAction::Unmute)));
        assert_eq!(rx.recv().await.unwrap().action, AuditAction::Unmute);

        drop(rx);
        assert!(!feed.publish(AuditEntry::new(AuditAction::Kick)));
        assert_eq!(feed.take_backlog().len(), 1);
    }
}
