// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Drains the audit feed into a persistent sink.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::audit::{AUDIT_FILE, AuditAction, AuditEntry, AuditFilter, AuditSink, FileAuditSink};
use crate::error::{SubsystemError, WardenError};
use crate::registry::ServiceContext;
use crate::subsystem::{EventTask, Lifecycle, Subsystem};

const NAME: &str = "audit_logger";

/// Records lifecycle and moderation entries in the audit trail.
///
/// By default the trail is `audit.jsonl` under the data directory, opened
/// during [`Subsystem::initialize`].
pub struct AuditLogger {
    context: ServiceContext,
    sink: RwLock<Option<Arc<dyn AuditSink>>>,
    lifecycle: Lifecycle,
    task: EventTask,
}

impl AuditLogger {
    /// Creates a logger that writes to the data directory.
    pub fn new(context: ServiceContext) -> Self {
        Self {
            context,
            sink: RwLock::new(None),
            lifecycle: Lifecycle::new(),
            task: EventTask::new(),
        }
    }

    /// Creates a logger that writes to `sink`.
    pub fn with_sink(context: ServiceContext, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink: RwLock::new(Some(sink)),
            ..Self::new(context)
        }
    }

    /// Records `entry` directly, bypassing the feed.
    pub async fn record(&self, entry: AuditEntry) -> Result<(), WardenError> {
        self.lifecycle.require(NAME)?;
        let sink = self.sink()?;
        sink.record(entry).await?;
        Ok(())
    }

    /// Queries the underlying sink.
    pub async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEntry>, WardenError> {
        self.lifecycle.require(NAME)?;
        let sink = self.sink()?;
        Ok(sink.query(filter).await?)
    }

    fn sink(&self) -> Result<Arc<dyn AuditSink>, SubsystemError> {
        self.sink
            .read()
            .clone()
            .ok_or_else(|| SubsystemError::NotInitialized {
                subsystem: NAME.to_string(),
            })
    }

    fn open_sink(&self) -> Result<Arc<dyn AuditSink>, SubsystemError> {
        if let Some(sink) = self.sink.read().clone() {
            return Ok(sink);
        }
        let path = self.context.data_dir().join(AUDIT_FILE);
        let sink: Arc<dyn AuditSink> =
            Arc::new(FileAuditSink::open(&path).map_err(|e| SubsystemError::init(NAME, e.to_string()))?);
        *self.sink.write() = Some(Arc::clone(&sink));
        Ok(sink)
    }
}

#[async_trait]
impl Subsystem for AuditLogger {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn initialize(&self) -> Result<(), SubsystemError> {
        self.lifecycle.begin(NAME)?;

        let sink = match self.open_sink() {
            Ok(sink) => sink,
            Err(e) => {
                self.lifecycle.abort();
                return Err(e);
            }
        };

        if let Err(e) = sink.record(AuditEntry::new(AuditAction::Startup)).await {
            self.lifecycle.abort();
            return Err(SubsystemError::init(NAME, e.to_string()));
        }

        let (backlog, feed) = self.context.audit().subscribe_with_backlog();
        record_backlog(sink.as_ref(), backlog).await;
        let writer = Arc::clone(&sink);
        self.task.start(NAME, feed, move |entry: AuditEntry| {
            let writer = Arc::clone(&writer);
            async move {
                let action = entry.action;
                if let Err(e) = writer.record(entry).await {
                    warn!(action = %action, error = %e, "Failed to record audit entry");
                }
            }
        });

        debug!(sink = sink.name(), "Audit trail open");
        self.lifecycle.complete();
        Ok(())
    }

    async fn dispose(&self) -> Result<(), SubsystemError> {
        let was_initialized = self.lifecycle.end();
        self.task
            .stop()
            .await
            .map_err(|e| SubsystemError::dispose(NAME, e.to_string()))?;

        if !was_initialized {
            return Ok(());
        }
        let Some(sink) = self.sink.read().clone() else {
            return Ok(());
        };

        record_backlog(sink.as_ref(), self.context.audit().take_backlog()).await;
        sink.record(AuditEntry::new(AuditAction::Shutdown))
            .await
            .map_err(|e| SubsystemError::dispose(NAME, e.to_string()))?;
        sink.flush()
            .await
            .map_err(|e| SubsystemError::dispose(NAME, e.to_string()))
    }

    fn is_initialized(&self) -> bool {
        self.lifecycle.is_initialized()
    }
}

/// Writes entries published while no logger was listening.
async fn record_backlog(sink: &dyn AuditSink, backlog: Vec<AuditEntry>) {
    if backlog.is_empty() {
        return;
    }
    debug!(entries = backlog.len(), "Recording audit backlog");
    for entry in backlog {
        let action = entry.action;
        if let Err(e) = sink.record(entry).await {
            warn!(action = %action, error = %e, "Failed to record audit entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditSink;
    use crate::subsystems::testing::{eventually, ready_context};
    use crate::types::{ChannelId, UserId};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_records_startup_feed_and_shutdown() {
        let dir = TempDir::new().unwrap();
        let (context, _transport) = ready_context(dir.path(), 0).await;
        let sink = InMemoryAuditSink::new();
        let logger = AuditLogger::with_sink(context.clone(), Arc::new(sink.clone()));

        logger.initialize().await.unwrap();
        assert_eq!(sink.count(AuditAction::Startup), 1);

        context.audit().publish(AuditEntry::moderation(
            AuditAction::Mute,
            UserId::new(1),
            ChannelId::new(2),
            "10m",
        ));
        eventually(|| sink.count(AuditAction::Mute) == 1).await;

        logger.dispose().await.unwrap();
        assert_eq!(sink.count(AuditAction::Shutdown), 1);
    }

    #[tokio::test]
    async fn test_entries_published_without_listener_are_kept() {
        let dir = TempDir::new().unwrap();
        let (context, _transport) = ready_context(dir.path(), 0).await;
        let sink = InMemoryAuditSink::new();
        let logger = AuditLogger::with_sink(context.clone(), Arc::new(sink.clone()));

        context.audit().publish(AuditEntry::moderation(
            AuditAction::BannedWord,
            UserId::new(1),
            ChannelId::new(2),
            "before init",
        ));
        logger.initialize().await.unwrap();
        assert_eq!(sink.count(AuditAction::BannedWord), 1);

        logger.dispose().await.unwrap();
        let late = sink.len();
        context.audit().publish(AuditEntry::new(AuditAction::Kick));
        assert_eq!(sink.len(), late);
        assert_eq!(context.audit().backlog_len(), 1);
    }

    #[tokio::test]
    async fn test_record_before_initialize_fails() {
        let dir = TempDir::new().unwrap();
        let (context, _transport) = ready_context(dir.path(), 0).await;
        let logger = AuditLogger::with_sink(context, Arc::new(InMemoryAuditSink::new()));

        let err = logger
            .record(AuditEntry::new(AuditAction::Kick))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WardenError::Subsystem(SubsystemError::NotInitialized { .. })
        ));
    }

    #[tokio::test]
    async fn test_default_sink_writes_data_dir() {
        let dir = TempDir::new().unwrap();
        let (context, _transport) = ready_context(dir.path(), 0).await;
        let logger = AuditLogger::new(context);

        logger.initialize().await.unwrap();
        logger
            .record(AuditEntry::new(AuditAction::Ban).with_user(UserId::new(9)))
            .await
            .unwrap();
        let bans = logger
            .query(AuditFilter::new().user(UserId::new(9)))
            .await
            .unwrap();
        assert_eq!(bans.len(), 1);

        logger.dispose().await.unwrap();
        let written = std::fs::read_to_string(dir.path().join(AUDIT_FILE)).unwrap();
        assert_eq!(written.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_dispose_without_initialize_is_quiet() {
        let dir = TempDir::new().unwrap();
        let (context, _transport) = ready_context(dir.path(), 0).await;
        let sink = InMemoryAuditSink::new();
        let logger = AuditLogger::with_sink(context, Arc::new(sink.clone()));
        logger.dispose().await.unwrap();
        assert!(sink.is_empty());
    }
}
