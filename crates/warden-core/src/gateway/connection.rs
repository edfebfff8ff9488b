// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The single outbound gateway connection.
//!
//! # State Machine
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──login ok──▶ Connected ──ready──▶ Ready
//!      ▲                        │                        │                 │
//!      │                        └──────login failed──────┤                 │
//!      │                                                 ▼                 ▼
//!      └────────────────────── Disconnecting ◀────────disconnect───────────┘
//! ```
//!
//! The transition to `Ready` happens at most once per connect cycle; further
//! ready events before a disconnect are ignored. Received events are
//! published on a broadcast channel for subsystems to consume.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use super::event::{GatewayEvent, ReadyInfo};
use super::transport::{DEFAULT_EVENT_CAPACITY, GatewayTransport};
use crate::error::GatewayError;
use crate::retry::{RetryConfig, execute_with_retry};
use crate::types::{ChannelId, GatewayToken};

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle state of the gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No session.
    Disconnected,
    /// Login in progress.
    Connecting,
    /// Logged in, waiting for the ready event.
    Connected,
    /// Session usable.
    Ready,
    /// Session being closed.
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Ready => "ready",
            ConnectionState::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Tunables for a [`GatewayConnection`].
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Budget for one login attempt.
    pub connect_timeout: Duration,
    /// Retry policy for login attempts.
    pub retry: RetryConfig,
    /// Capacity of the broadcast channel subsystems subscribe to.
    pub event_capacity: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

// =============================================================================
// GatewayConnection
// =============================================================================

/// Owns the process-wide gateway session.
pub struct GatewayConnection {
    transport: Arc<dyn GatewayTransport>,
    token: GatewayToken,
    settings: ConnectionSettings,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<GatewayEvent>,
    ready: Arc<RwLock<Option<ReadyInfo>>>,
    ready_transitions: Arc<AtomicU64>,
    pump: Mutex<Option<JoinHandle<()>>>,
    lifecycle: tokio::sync::Mutex<()>,
}

impl GatewayConnection {
    /// Creates a disconnected connection over `transport`.
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        token: GatewayToken,
        settings: ConnectionSettings,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));

        Self {
            transport,
            token,
            settings,
            state,
            events,
            ready: Arc::new(RwLock::new(None)),
            ready_transitions: Arc::new(AtomicU64::new(0)),
            pump: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns the transport name.
    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    /// Returns the current state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Returns a receiver that observes state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Subscribes to gateway events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    /// Returns the payload of the last ready event in this connect cycle.
    pub fn ready_info(&self) -> Option<ReadyInfo> {
        self.ready.read().clone()
    }

    /// Returns how many times the connection has become ready.
    pub fn ready_transitions(&self) -> u64 {
        self.ready_transitions.load(Ordering::Acquire)
    }

    /// Logs in, retrying according to the configured policy.
    ///
    /// Only valid while disconnected. On failure the connection returns to
    /// `Disconnected`.
    pub async fn connect(&self) -> Result<(), GatewayError> {
        let _guard = self.lifecycle.lock().await;

        let current = self.state();
        if current != ConnectionState::Disconnected {
            return Err(GatewayError::InvalidState {
                operation: "connect",
                state: current.to_string(),
            });
        }

        self.state.send_replace(ConnectionState::Connecting);
        *self.ready.write() = None;

        tracing::info!(transport = %self.transport.name(), "Connecting to gateway");

        let strategy = self.settings.retry.clone().build();
        let timeout = self.settings.connect_timeout;
        let result = execute_with_retry(strategy.as_ref(), || {
            let transport = Arc::clone(&self.transport);
            let token = self.token.clone();
            async move {
                match tokio::time::timeout(timeout, transport.open(&token)).await {
                    Ok(result) => result,
                    Err(_) => Err(GatewayError::timeout("connect", timeout)),
                }
            }
        })
        .await;

        match result {
            Ok(receiver) => {
                self.state.send_replace(ConnectionState::Connected);
                let handle = self.spawn_pump(receiver);
                if let Some(previous) = self.pump.lock().replace(handle) {
                    previous.abort();
                }
                tracing::info!(transport = %self.transport.name(), "Logged in to gateway");
                Ok(())
            }
            Err(error) => {
                self.state.send_replace(ConnectionState::Disconnected);
                tracing::error!(error = %error, "Gateway login failed");
                Err(error)
            }
        }
    }

    /// Suspends until the connection is ready or `timeout` elapses.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<ReadyInfo, GatewayError> {
        let mut rx = self.state.subscribe();
        let waited = tokio::time::timeout(
            timeout,
            rx.wait_for(|s| matches!(s, ConnectionState::Ready | ConnectionState::Disconnected)),
        )
        .await;

        let reached = match waited {
            Err(_) => return Err(GatewayError::timeout("ready", timeout)),
            Ok(Err(_)) => return Err(GatewayError::Closed),
            Ok(Ok(state)) => *state,
        };

        match reached {
            ConnectionState::Ready => Ok(self.ready_info().unwrap_or_default()),
            _ => Err(GatewayError::Closed),
        }
    }

    /// Ends the session. Calling this while disconnected is a no-op.
    pub async fn disconnect(&self) -> Result<(), GatewayError> {
        let _guard = self.lifecycle.lock().await;

        if self.state() == ConnectionState::Disconnected {
            tracing::debug!("Gateway already disconnected");
            return Ok(());
        }

        self.state.send_replace(ConnectionState::Disconnecting);
        let started = Instant::now();
        let result = self.transport.close().await;

        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        self.state.send_replace(ConnectionState::Disconnected);

        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Gateway transport closed"
        );
        result
    }

    /// Posts `content` to `channel`. Requires a ready connection.
    pub async fn send_message(&self, channel: ChannelId, content: &str) -> Result<(), GatewayError> {
        let current = self.state();
        if current != ConnectionState::Ready {
            return Err(GatewayError::InvalidState {
                operation: "send a message",
                state: current.to_string(),
            });
        }
        self.transport.send_message(channel, content).await
    }

    fn spawn_pump(&self, mut receiver: mpsc::Receiver<GatewayEvent>) -> JoinHandle<()> {
        let state = self.state.clone();
        let events = self.events.clone();
        let ready = Arc::clone(&self.ready);
        let transitions = Arc::clone(&self.ready_transitions);

        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                match &event {
                    GatewayEvent::Ready(info) => {
                        let became_ready = state.send_if_modified(|s| {
                            if *s == ConnectionState::Connected {
                                *s = ConnectionState::Ready;
                                true
                            } else {
                                false
                            }
                        });
                        if became_ready {
                            *ready.write() = Some(info.clone());
                            transitions.fetch_add(1, Ordering::AcqRel);
                            tracing::info!(
                                session = %info.session_id,
                                members = info.member_count,
                                "Gateway ready"
                            );
                        } else {
                            tracing::debug!("Ignoring repeated ready event");
                            continue;
                        }
                    }
                    GatewayEvent::Log(record) => record.emit(),
                    _ => {}
                }

                // No subscribers is not an error.
                let _ = events.send(event);
            }

            let lost = state.send_if_modified(|s| {
                if matches!(s, ConnectionState::Connected | ConnectionState::Ready) {
                    *s = ConnectionState::Disconnected;
                    true
                } else {
                    false
                }
            });
            if lost {
                tracing::warn!("Gateway session ended unexpectedly");
            }
        })
    }
}

impl fmt::Debug for GatewayConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConnection")
            .field("transport", &self.transport.name())
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for GatewayConnection {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get_mut().take() {
            pump.abort();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::event::MemberInfo;
    use crate::retry::RetryMode;
    use crate::types::UserId;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    /// Transport whose handshake outcomes and session events are scripted.
    struct ScriptedTransport {
        failures: Mutex<Vec<GatewayError>>,
        session: Mutex<Option<mpsc::Sender<GatewayEvent>>>,
        opens: AtomicU32,
        closes: AtomicU32,
        sent: Mutex<Vec<(ChannelId, String)>>,
    }

    impl ScriptedTransport {
        fn new(failures: Vec<GatewayError>) -> Arc<Self> {
            Arc::new(Self {
                failures: Mutex::new(failures),
                session: Mutex::new(None),
                opens: AtomicU32::new(0),
                closes: AtomicU32::new(0),
                sent: Mutex::new(Vec::new()),
            })
        }

        async fn push(&self, event: GatewayEvent) {
            let sender = self.session.lock().clone().unwrap();
            sender.send(event).await.unwrap();
        }
    }

    #[async_trait]
    impl GatewayTransport for ScriptedTransport {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn open(&self, _token: &GatewayToken) -> Result<mpsc::Receiver<GatewayEvent>, GatewayError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let mut failures = self.failures.lock();
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
            let (tx, rx) = mpsc::channel(16);
            *self.session.lock() = Some(tx);
            Ok(rx)
        }

        async fn send_message(&self, channel: ChannelId, content: &str) -> Result<(), GatewayError> {
            self.sent.lock().push((channel, content.to_string()));
            Ok(())
        }

        async fn close(&self) -> Result<(), GatewayError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.session.lock().take();
            Ok(())
        }
    }

    fn settings(mode: RetryMode) -> ConnectionSettings {
        ConnectionSettings {
            connect_timeout: Duration::from_secs(1),
            retry: RetryConfig::default()
                .with_mode(mode)
                .with_max_retries(2)
                .with_initial_delay(Duration::from_millis(1)),
            event_capacity: 16,
        }
    }

    fn ready(members: u64) -> GatewayEvent {
        GatewayEvent::Ready(ReadyInfo {
            session_id: "s1".into(),
            user_id: UserId::new(1),
            member_count: members,
        })
    }

    #[tokio::test]
    async fn test_connect_then_ready() {
        let transport = ScriptedTransport::new(vec![]);
        let conn = GatewayConnection::new(transport.clone(), GatewayToken::new("t"), settings(RetryMode::RateLimit));

        conn.connect().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Connected);

        transport.push(ready(12)).await;
        let info = conn.wait_until_ready(Duration::from_secs(1)).await.unwrap();
        assert_eq!(info.member_count, 12);
        assert_eq!(conn.state(), ConnectionState::Ready);
    }

    #[tokio::test]
    async fn test_repeated_ready_ignored() {
        let transport = ScriptedTransport::new(vec![]);
        let conn = GatewayConnection::new(transport.clone(), GatewayToken::new("t"), settings(RetryMode::RateLimit));
        let mut events = conn.subscribe();

        conn.connect().await.unwrap();
        transport.push(ready(1)).await;
        transport.push(ready(2)).await;
        transport
            .push(GatewayEvent::MemberJoined(MemberInfo {
                user_id: UserId::new(5),
                username: "new".into(),
                bot: false,
            }))
            .await;

        assert!(matches!(events.recv().await.unwrap(), GatewayEvent::Ready(_)));
        assert!(matches!(events.recv().await.unwrap(), GatewayEvent::MemberJoined(_)));
        assert_eq!(conn.ready_transitions(), 1);
        assert_eq!(conn.ready_info().unwrap().member_count, 1);
    }

    #[tokio::test]
    async fn test_rate_limit_retried() {
        let transport = ScriptedTransport::new(vec![GatewayError::rate_limited(Duration::from_millis(1))]);
        let conn = GatewayConnection::new(transport.clone(), GatewayToken::new("t"), settings(RetryMode::RateLimit));

        conn.connect().await.unwrap();
        assert_eq!(transport.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_authentication_failure_not_retried() {
        let transport = ScriptedTransport::new(vec![GatewayError::authentication("bad token")]);
        let conn = GatewayConnection::new(transport.clone(), GatewayToken::new("t"), settings(RetryMode::Transient));

        let err = conn.connect().await.unwrap_err();
        assert!(matches!(err, GatewayError::Authentication { .. }));
        assert_eq!(transport.opens.load(Ordering::SeqCst), 1);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_twice_rejected() {
        let transport = ScriptedTransport::new(vec![]);
        let conn = GatewayConnection::new(transport, GatewayToken::new("t"), settings(RetryMode::Never));
        conn.connect().await.unwrap();
        assert!(matches!(
            conn.connect().await,
            Err(GatewayError::InvalidState { operation: "connect", .. })
        ));
    }

    #[tokio::test]
    async fn test_disconnect_idempotent() {
        let transport = ScriptedTransport::new(vec![]);
        let conn = GatewayConnection::new(transport.clone(), GatewayToken::new("t"), settings(RetryMode::Never));

        conn.disconnect().await.unwrap();
        assert_eq!(transport.closes.load(Ordering::SeqCst), 0);

        conn.connect().await.unwrap();
        conn.disconnect().await.unwrap();
        conn.disconnect().await.unwrap();
        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_ready_after_reconnect() {
        let transport = ScriptedTransport::new(vec![]);
        let conn = GatewayConnection::new(transport.clone(), GatewayToken::new("t"), settings(RetryMode::Never));

        conn.connect().await.unwrap();
        transport.push(ready(1)).await;
        conn.wait_until_ready(Duration::from_secs(1)).await.unwrap();
        conn.disconnect().await.unwrap();

        conn.connect().await.unwrap();
        transport.push(ready(1)).await;
        conn.wait_until_ready(Duration::from_secs(1)).await.unwrap();
        assert_eq!(conn.ready_transitions(), 2);
    }

    #[tokio::test]
    async fn test_ready_timeout() {
        let transport = ScriptedTransport::new(vec![]);
        let conn = GatewayConnection::new(transport, GatewayToken::new("t"), settings(RetryMode::Never));
        conn.connect().await.unwrap();

        let err = conn.wait_until_ready(Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Timeout { operation: "ready", .. }));
    }

    #[tokio::test]
    async fn test_send_requires_ready() {
        let transport = ScriptedTransport::new(vec![]);
        let conn = GatewayConnection::new(transport.clone(), GatewayToken::new("t"), settings(RetryMode::Never));
        assert!(conn.send_message(ChannelId::new(1), "hi").await.is_err());

        conn.connect().await.unwrap();
        transport.push(ready(1)).await;
        conn.wait_until_ready(Duration::from_secs(1)).await.unwrap();
        conn.send_message(ChannelId::new(1), "hi").await.unwrap();
        assert_eq!(transport.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_session_loss_marks_disconnected() {
        let transport = ScriptedTransport::new(vec![]);
        let conn = GatewayConnection::new(transport.clone(), GatewayToken::new("t"), settings(RetryMode::Never));
        conn.connect().await.unwrap();

        transport.session.lock().take();
        let err = conn.wait_until_ready(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Closed));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }
}
