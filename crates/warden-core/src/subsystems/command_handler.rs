// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Message screening and prefixed command dispatch.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::audit::{AuditAction, AuditEntry};
use crate::error::SubsystemError;
use crate::gateway::{GatewayEvent, MessageInfo};
use crate::registry::ServiceContext;
use crate::subsystem::{EventTask, Lifecycle, Subsystem};

/// Per-user delay between two accepted commands.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3);

const NAME: &str = "command_handler";

/// What the handler did with one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Bot author, or neither flagged nor a command.
    Ignored,
    /// Contains the banned word.
    Flagged(String),
    /// A command invocation was accepted.
    Invoked(String),
    /// A command was dropped because the author is cooling down.
    CoolingDown(String),
}

struct Inner {
    context: ServiceContext,
    cooldown: Duration,
    invocations: DashMap<String, u64>,
    flagged: AtomicU64,
}

impl Inner {
    fn handle(&self, message: &MessageInfo) -> MessageOutcome {
        if message.author_is_bot {
            return MessageOutcome::Ignored;
        }
        let state = self.context.state();

        if !state.is_exempt_channel(message.channel_id) {
            if let Some(word) = state.find_banned_word(&message.content) {
                self.flagged.fetch_add(1, Ordering::Relaxed);
                info!(
                    user = %message.author_id,
                    channel = %message.channel_id,
                    word = %word,
                    "Message contains a banned word"
                );
                self.context.audit().publish(AuditEntry::moderation(
                    AuditAction::BannedWord,
                    message.author_id,
                    message.channel_id,
                    word.clone(),
                ));
                return MessageOutcome::Flagged(word);
            }
        }

        let Some(invocation) = state.strip_prefix(&message.content) else {
            return MessageOutcome::Ignored;
        };
        let Some(name) = invocation.split_whitespace().next() else {
            return MessageOutcome::Ignored;
        };
        let name = name.to_lowercase();

        let key = format!("cooldown:{}", message.author_id);
        if !self.context.cache().set_if_absent(key, name.clone(), self.cooldown) {
            debug!(user = %message.author_id, command = %name, "Command dropped, user on cooldown");
            return MessageOutcome::CoolingDown(name);
        }

        *self.invocations.entry(name.clone()).or_insert(0) += 1;
        self.context.audit().publish(
            AuditEntry::new(AuditAction::Command)
                .with_user(message.author_id)
                .with_channel(message.channel_id)
                .with_detail(name.clone()),
        );
        MessageOutcome::Invoked(name)
    }
}

/// Screens incoming messages and counts prefixed command invocations.
pub struct CommandHandler {
    inner: Arc<Inner>,
    lifecycle: Lifecycle,
    task: EventTask,
}

impl CommandHandler {
    /// Creates an uninitialized handler with the default cooldown.
    pub fn new(context: ServiceContext) -> Self {
        Self::with_cooldown(context, DEFAULT_COOLDOWN)
    }

    /// Creates an uninitialized handler with a custom per-user cooldown.
    pub fn with_cooldown(context: ServiceContext, cooldown: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                context,
                cooldown,
                invocations: DashMap::new(),
                flagged: AtomicU64::new(0),
            }),
            lifecycle: Lifecycle::new(),
            task: EventTask::new(),
        }
    }

    /// Processes one message synchronously.
    pub fn handle_message(&self, message: &MessageInfo) -> MessageOutcome {
        self.inner.handle(message)
    }

    /// Returns how often `name` has been invoked.
    pub fn invocations(&self, name: &str) -> u64 {
        self.inner.invocations.get(name).map(|n| *n).unwrap_or(0)
    }

    /// Returns the number of invocations across all commands.
    pub fn total_invocations(&self) -> u64 {
        self.inner.invocations.iter().map(|n| *n.value()).sum()
    }

    /// Returns how many messages were flagged for banned words.
    pub fn flagged_messages(&self) -> u64 {
        self.inner.flagged.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Subsystem for CommandHandler {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn initialize(&self) -> Result<(), SubsystemError> {
        self.lifecycle.begin(NAME)?;

        let inner = Arc::clone(&self.inner);
        let events = inner.context.gateway().subscribe();
        self.task.start(NAME, events, move |event| {
            if let GatewayEvent::MessageCreated(message) = &event {
                inner.handle(message);
            }
            std::future::ready(())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::testing::{eventually, ready_context};
    use crate::types::{ChannelId, MessageId, UserId};
    use tempfile::TempDir;

    fn message(author: u64, channel: u64, content: &str) -> MessageInfo {
        MessageInfo {
            message_id: MessageId::new(1),
            channel_id: ChannelId::new(channel),
            author_id: UserId::new(author),
            author_is_bot: false,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_banned_word_is_flagged_and_audited() {
        let dir = TempDir::new().unwrap();
        let (context, _transport) = ready_context(dir.path(), 0).await;
        context.state().add_banned_word("heck");
        let mut audit = context.audit().subscribe();
        let handler = CommandHandler::new(context);

        assert_eq!(
            handler.handle_message(&message(7, 1, "oh Heck no")),
            MessageOutcome::Flagged("heck".into())
        );
        let entry = audit.recv().await.unwrap();
        assert_eq!(entry.action, AuditAction::BannedWord);
        assert_eq!(entry.user, Some(UserId::new(7)));
        assert_eq!(handler.flagged_messages(), 1);
    }

    #[tokio::test]
    async fn test_exempt_channel_is_not_screened() {
        let dir = TempDir::new().unwrap();
        let (context, _transport) = ready_context(dir.path(), 0).await;
        context.state().add_banned_word("heck");
        context.state().add_exempt_channel(ChannelId::new(9));
        let handler = CommandHandler::new(context);

        assert_eq!(handler.handle_message(&message(7, 9, "heck")), MessageOutcome::Ignored);
        assert_eq!(handler.flagged_messages(), 0);
    }

    #[tokio::test]
    async fn test_cooldown_applies_per_user() {
        let dir = TempDir::new().unwrap();
        let (context, _transport) = ready_context(dir.path(), 0).await;
        let handler = CommandHandler::new(context);

        assert_eq!(handler.handle_message(&message(1, 1, "!Ping")), MessageOutcome::Invoked("ping".into()));
        assert_eq!(handler.handle_message(&message(1, 1, "!ping")), MessageOutcome::CoolingDown("ping".into()));
        assert_eq!(handler.handle_message(&message(2, 1, "!ping now")), MessageOutcome::Invoked("ping".into()));
        assert_eq!(handler.invocations("ping"), 2);
        assert_eq!(handler.handle_message(&message(3, 1, "ping")), MessageOutcome::Ignored);
        assert_eq!(handler.handle_message(&message(3, 1, "! ")), MessageOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_bot_authors_are_ignored() {
        let dir = TempDir::new().unwrap();
        let (context, _transport) = ready_context(dir.path(), 0).await;
        let handler = CommandHandler::new(context);
        let mut msg = message(1, 1, "!ping");
        msg.author_is_bot = true;
        assert_eq!(handler.handle_message(&msg), MessageOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_consumes_gateway_messages() {
        let dir = TempDir::new().unwrap();
        let (context, transport) = ready_context(dir.path(), 0).await;
        let handler = CommandHandler::with_cooldown(context, Duration::ZERO);
        handler.initialize().await.unwrap();
        assert!(handler.initialize().await.is_err());

        transport.push(GatewayEvent::MessageCreated(message(4, 1, "!help"))).await;
        eventually(|| handler.invocations("help") == 1).await;

        handler.dispose().await.unwrap();
        assert!(!handler.is_initialized());
    }
}
