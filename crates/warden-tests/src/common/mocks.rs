// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! - [`MockTransport`]: a gateway transport whose logins, ready event and
//!   message posts can be scripted, and which records every interaction
//! - [`RecordingSubsystem`]: a subsystem that journals its lifecycle calls

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use warden_core::error::{GatewayError, SubsystemError};
use warden_core::gateway::{GatewayEvent, GatewayTransport, ReadyInfo};
use warden_core::subsystem::{Lifecycle, Subsystem};
use warden_core::types::{ChannelId, GatewayToken};

// =============================================================================
// MockTransport
// =============================================================================

/// Scriptable in-memory gateway transport.
#[derive(Debug)]
pub struct MockTransport {
    /// Errors returned by the next logins, in order.
    login_script: Mutex<VecDeque<GatewayError>>,

    /// Reject every login with an authentication error.
    reject_all: AtomicBool,

    /// Send a ready event right after login.
    auto_ready: AtomicBool,

    /// Member count reported in the ready event.
    member_count: AtomicU64,

    /// Fail every message post.
    fail_sends: AtomicBool,

    /// Sender side of the current session.
    session: Mutex<Option<mpsc::Sender<GatewayEvent>>>,

    /// Tokens presented at login.
    tokens: Mutex<Vec<String>>,

    /// Posted messages.
    sent: Mutex<Vec<(ChannelId, String)>>,

    open_count: AtomicU64,
    close_count: AtomicU64,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            login_script: Mutex::new(VecDeque::new()),
            reject_all: AtomicBool::new(false),
            auto_ready: AtomicBool::new(true),
            member_count: AtomicU64::new(0),
            fail_sends: AtomicBool::new(false),
            session: Mutex::new(None),
            tokens: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            open_count: AtomicU64::new(0),
            close_count: AtomicU64::new(0),
        }
    }
}

impl MockTransport {
    /// Creates a transport that accepts logins and sends ready immediately.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a transport whose ready event reports `members`.
    pub fn with_members(members: u64) -> Arc<Self> {
        let transport = Self::default();
        transport.member_count.store(members, Ordering::SeqCst);
        Arc::new(transport)
    }

    /// Queues an error for the next login attempt.
    pub fn fail_next_login(&self, error: GatewayError) {
        self.login_script.lock().push_back(error);
    }

    /// Rejects every login.
    pub fn reject_logins(&self) {
        self.reject_all.store(true, Ordering::SeqCst);
    }

    /// Stops sending the ready event after login.
    pub fn withhold_ready(&self) {
        self.auto_ready.store(false, Ordering::SeqCst);
    }

    /// Fails every subsequent message post.
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    /// Delivers `event` on the current session. Returns false without one.
    pub async fn push(&self, event: GatewayEvent) -> bool {
        let sender = self.session.lock().clone();
        match sender {
            Some(sender) => sender.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Number of login attempts.
    pub fn open_count(&self) -> u64 {
        self.open_count.load(Ordering::SeqCst)
    }

    /// Number of close calls.
    pub fn close_count(&self) -> u64 {
        self.close_count.load(Ordering::SeqCst)
    }

    /// Tokens presented at login, in order.
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().clone()
    }

    /// Messages posted so far.
    pub fn sent(&self) -> Vec<(ChannelId, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl GatewayTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open(&self, token: &GatewayToken) -> Result<mpsc::Receiver<GatewayEvent>, GatewayError> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().push(token.expose().to_string());

        if self.reject_all.load(Ordering::SeqCst) {
            return Err(GatewayError::authentication("token rejected"));
        }
        let scripted = self.login_script.lock().pop_front();
        if let Some(error) = scripted {
            return Err(error);
        }

        let (tx, rx) = mpsc::channel(64);
        if self.auto_ready.load(Ordering::SeqCst) {
            let ready = GatewayEvent::Ready(ReadyInfo {
                session_id: format!("mock-{}", self.open_count()),
                member_count: self.member_count.load(Ordering::SeqCst),
                ..Default::default()
            });
            let _ = tx.send(ready).await;
        }
        *self.session.lock() = Some(tx);
        Ok(rx)
    }

    async fn send_message(&self, channel: ChannelId, content: &str) -> Result<(), GatewayError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(GatewayError::connection("send refused"));
        }
        self.sent.lock().push((channel, content.to_string()));
        Ok(())
    }

    async fn close(&self) -> Result<(), GatewayError> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        self.session.lock().take();
        Ok(())
    }
}

// =============================================================================
// RecordingSubsystem
// =============================================================================

/// Shared journal of lifecycle calls, e.g. `init:a`, `dispose:b`.
pub type Journal = Arc<Mutex<Vec<String>>>;

/// Creates an empty journal.
pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// Subsystem that records its lifecycle into a [`Journal`].
pub struct RecordingSubsystem {
    name: &'static str,
    journal: Journal,
    lifecycle: Lifecycle,
    fail_init: bool,
    fail_dispose: bool,
    depends_on: Option<Arc<RecordingSubsystem>>,
}

impl RecordingSubsystem {
    /// Creates a well-behaved subsystem.
    pub fn new(name: &'static str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self::build(name, journal))
    }

    /// Creates a subsystem whose initialization fails.
    pub fn failing_init(name: &'static str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            fail_init: true,
            ..Self::build(name, journal)
        })
    }

    /// Creates a subsystem whose disposal fails.
    pub fn failing_dispose(name: &'static str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            fail_dispose: true,
            ..Self::build(name, journal)
        })
    }

    /// Creates a subsystem that records whether `dependency` was initialized
    /// when its own initialization ran.
    pub fn after(name: &'static str, journal: &Journal, dependency: Arc<RecordingSubsystem>) -> Arc<Self> {
        Arc::new(Self {
            depends_on: Some(dependency),
            ..Self::build(name, journal)
        })
    }

    fn build(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: Arc::clone(journal),
            lifecycle: Lifecycle::new(),
            fail_init: false,
            fail_dispose: false,
            depends_on: None,
        }
    }
}

#[async_trait]
impl Subsystem for RecordingSubsystem {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn initialize(&self) -> Result<(), SubsystemError> {
        self.lifecycle.begin(self.name)?;
        tokio::task::yield_now().await;

        if let Some(dependency) = &self.depends_on {
            self.journal.lock().push(format!(
                "saw:{}={}",
                dependency.name,
                dependency.is_initialized()
            ));
        }
        self.journal.lock().push(format!("init:{}", self.name));

        if self.fail_init {
            self.lifecycle.abort();
            return Err(SubsystemError::init(self.name, "scripted failure"));
        }
        self.lifecycle.complete();
        Ok(())
    }

    async fn dispose(&self) -> Result<(), SubsystemError> {
        self.lifecycle.end();
        self.journal.lock().push(format!("dispose:{}", self.name));
        if self.fail_dispose {
            return Err(SubsystemError::dispose(self.name, "scripted failure"));
        }
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.lifecycle.is_initialized()
    }
}
