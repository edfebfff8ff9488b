// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Guild member count tracking.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::SubsystemError;
use crate::gateway::GatewayEvent;
use crate::registry::ServiceContext;
use crate::subsystem::{EventTask, Lifecycle, Subsystem};

const NAME: &str = "membership_tracker";

#[derive(Default)]
struct Counter {
    total: AtomicU64,
    joins: AtomicU64,
    leaves: AtomicU64,
}

impl Counter {
    fn apply(&self, event: &GatewayEvent) {
        match event {
            GatewayEvent::Ready(info) => self.total.store(info.member_count, Ordering::Release),
            GatewayEvent::MemberJoined(_) => {
                self.joins.fetch_add(1, Ordering::Relaxed);
                self.total.fetch_add(1, Ordering::AcqRel);
            }
            GatewayEvent::MemberLeft(_) => {
                self.leaves.fetch_add(1, Ordering::Relaxed);
                let _ = self
                    .total
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)));
            }
            _ => {}
        }
    }
}

/// Tracks how many members the guild has.
pub struct MembershipTracker {
    context: ServiceContext,
    counter: Arc<Counter>,
    lifecycle: Lifecycle,
    task: EventTask,
}

impl MembershipTracker {
    /// Creates an uninitialized tracker.
    pub fn new(context: ServiceContext) -> Self {
        Self {
            context,
            counter: Arc::new(Counter::default()),
            lifecycle: Lifecycle::new(),
            task: EventTask::new(),
        }
    }

    /// Current member count.
    pub fn member_count(&self) -> u64 {
        self.counter.total.load(Ordering::Acquire)
    }

    /// Joins observed since initialization.
    pub fn joins(&self) -> u64 {
        self.counter.joins.load(Ordering::Relaxed)
    }

    /// Leaves observed since initialization.
    pub fn leaves(&self) -> u64 {
        self.counter.leaves.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Subsystem for MembershipTracker {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn initialize(&self) -> Result<(), SubsystemError> {
        self.lifecycle.begin(NAME)?;

        // Subscribe before seeding so no join slips between the two.
        let events = self.context.gateway().subscribe();
        let seed = self
            .context
            .gateway()
            .ready_info()
            .map(|info| info.member_count)
            .unwrap_or(0);
        self.counter.total.store(seed, Ordering::Release);

        let counter = Arc::clone(&self.counter);
        self.task.start(NAME, events, move |event| {
            counter.apply(&event);
            std::future::ready(())
        });

        tracing::info!(members = seed, "Membership tracker seeded");
        self.lifecycle.complete();
        Ok(())
    }

    async fn dispose(&self) -> Result<(), SubsystemError> {
        self.lifecycle.end();
        self.task
            .stop()
            .await
            .map_err(|e| SubsystemError::dispose(NAME, e.to_string()))
    }

    fn is_initialized(&self) -> bool {
        self.lifecycle.is_initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemberInfo;
    use crate::subsystems::testing::{eventually, ready_context};
    use crate::types::UserId;
    use tempfile::TempDir;

    fn member(id: u64) -> MemberInfo {
        MemberInfo {
            user_id: UserId::new(id),
            username: format!("user{id}"),
            bot: false,
        }
    }

    #[test]
    fn test_leave_never_underflows() {
        let counter = Counter::default();
        counter.apply(&GatewayEvent::MemberLeft(member(1)));
        assert_eq!(counter.total.load(Ordering::Acquire), 0);
        assert_eq!(counter.leaves.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_seeds_from_ready_and_tracks() {
        let dir = TempDir::new().unwrap();
        let (context, transport) = ready_context(dir.path(), 41).await;
        let tracker = MembershipTracker::new(context);
        tracker.initialize().await.unwrap();
        assert_eq!(tracker.member_count(), 41);

        transport.push(GatewayEvent::MemberJoined(member(1))).await;
        transport.push(GatewayEvent::MemberJoined(member(2))).await;
        transport.push(GatewayEvent::MemberLeft(member(1))).await;
        eventually(|| tracker.leaves() == 1).await;

        assert_eq!(tracker.member_count(), 42);
        assert_eq!(tracker.joins(), 2);
        tracker.dispose().await.unwrap();
    }
}
