// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Posts member and message notices to the user-logging channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::SubsystemError;
use crate::gateway::GatewayEvent;
use crate::registry::ServiceContext;
use crate::state::{Feature, SharedState};
use crate::subsystem::{EventTask, Lifecycle, Subsystem};

const NAME: &str = "event_logger";

/// Renders the one-line notice for `event`, if its feature flag is enabled.
pub fn render_notice(state: &SharedState, event: &GatewayEvent) -> Option<String> {
    let (feature, notice) = match event {
        GatewayEvent::MemberJoined(m) => (
            Feature::LogUserJoined,
            format!("{} ({}) joined the server", m.username, m.user_id),
        ),
        GatewayEvent::MemberLeft(m) => (
            Feature::LogUserLeft,
            format!("{} ({}) left the server", m.username, m.user_id),
        ),
        GatewayEvent::MemberUpdated(m) => (
            Feature::LogUserUpdated,
            format!("{} ({}) updated their profile", m.username, m.user_id),
        ),
        GatewayEvent::MessageUpdated(m) if !m.author_is_bot => (
            Feature::LogMessageUpdated,
            format!(
                "Message {} by {} edited in {}: {}",
                m.message_id, m.author_id, m.channel_id, m.content
            ),
        ),
        GatewayEvent::MessageDeleted(m) => (
            Feature::LogMessageDeleted,
            format!("Message {} deleted in {}", m.message_id, m.channel_id),
        ),
        _ => return None,
    };

    state.features().is_enabled(feature).then_some(notice)
}

struct Inner {
    context: ServiceContext,
    posted: AtomicU64,
    failed: AtomicU64,
}

impl Inner {
    async fn on_event(&self, event: GatewayEvent) {
        let state = self.context.state();
        let Some(notice) = render_notice(state, &event) else {
            return;
        };
        let channel = state.channels().user_logging;
        if !channel.is_set() {
            debug!(event = event.kind(), "User-logging channel not configured");
            return;
        }

        match self.context.gateway().send_message(channel, &notice).await {
            Ok(()) => {
                self.posted.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(channel = %channel, event = event.kind(), error = %e, "Failed to post notice");
            }
        }
    }
}

/// Announces member and message activity in the user-logging channel.
pub struct EventLogger {
    inner: Arc<Inner>,
    lifecycle: Lifecycle,
    task: EventTask,
}

impl EventLogger {
    /// Creates an uninitialized logger.
    pub fn new(context: ServiceContext) -> Self {
        Self {
            inner: Arc::new(Inner {
                context,
                posted: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
            lifecycle: Lifecycle::new(),
            task: EventTask::new(),
        }
    }

    /// Returns how many notices were posted.
    pub fn notices_posted(&self) -> u64 {
        self.inner.posted.load(Ordering::Relaxed)
    }

    /// Returns how many notices failed to post.
    pub fn notices_failed(&self) -> u64 {
        self.inner.failed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Subsystem for EventLogger {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn initialize(&self) -> Result<(), SubsystemError> {
        self.lifecycle.begin(NAME)?;

        let inner = Arc::clone(&self.inner);
        let events = inner.context.gateway().subscribe();
        self.task.start(NAME, events, move |event| {
            let inner = Arc::clone(&inner);
            async move { inner.on_event(event).await }
        });

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
