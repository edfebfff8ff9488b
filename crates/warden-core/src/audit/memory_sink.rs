// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory audit sink for testing and development.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::AuditSink;
use super::types::{AuditAction, AuditEntry, AuditFilter};
use crate::error::AuditResult;

/// Keeps audit entries in memory.
///
/// Clones share the same storage, so a test can keep one handle while the
/// audit logger owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditSink {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
    max_entries: usize,
}

impl InMemoryAuditSink {
    /// Creates a sink with unlimited capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that keeps only the newest `max_entries` entries.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::with_capacity(max_entries.min(1024)))),
            max_entries,
        }
    }

    /// Returns all stored entries.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().clone()
    }

    /// Returns how many entries record `action`.
    pub fn count(&self, action: AuditAction) -> usize {
        self.entries.read().iter().filter(|e| e.action == action).count()
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, entry: AuditEntry) -> AuditResult<()> {
        let mut entries = self.entries.write();
        if self.max_entries > 0 && entries.len() >= self.max_entries {
            let excess = entries.len() + 1 - self.max_entries;
            entries.drain(..excess);
        }
        entries.push(entry);
        Ok(())
    }

    async fn query(&self, filter: AuditFilter) -> AuditResult<Vec<AuditEntry>> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|e| filter.matches(e))
            .take(filter.max_results())
            .cloned()
            .collect())
    }

    async fn flush(&self) -> AuditResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;

    #[tokio::test]
    async fn test_record_and_query() {
        let sink = InMemoryAuditSink::new();
        sink.record(AuditEntry::new(AuditAction::Startup)).await.unwrap();
        sink.record(AuditEntry::new(AuditAction::Mute).with_user(UserId::new(1))).await.unwrap();
        sink.record(AuditEntry::new(AuditAction::Mute).with_user(UserId::new(2))).await.unwrap();

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.count(AuditAction::Mute), 2);

        let hits = sink
            .query(AuditFilter::new().action(AuditAction::Mute).limit(1))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].user, Some(UserId::new(1)));
    }

    #[tokio::test]
    async fn test_capacity_drops_oldest() {
        let sink = InMemoryAuditSink::with_capacity(2);
        for action in [AuditAction::Startup, AuditAction::Kick, AuditAction::Ban] {
            sink.record(AuditEntry::new(action)).await.unwrap();
        }
        let actions: Vec<_> = sink.entries().iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::Kick, AuditAction::Ban]);
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let sink = InMemoryAuditSink::new();
        let handle = sink.clone();
        sink.record(AuditEntry::new(AuditAction::Shutdown)).await.unwrap();
        assert_eq!(handle.len(), 1);
    }
}
