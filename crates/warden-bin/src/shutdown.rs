// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Termination requests and the shutdown guard.
//!
//! [`TerminationLatch`] remembers the first termination request, whether it
//! came from an OS signal or from code, so a request that arrives while the
//! bot is still starting is honoured as soon as startup finishes.
//! [`ShutdownGuard`] makes the shutdown sequence run at most once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{BinError, BinResult};

// =============================================================================
// TerminationLatch
// =============================================================================

/// Latched termination request.
#[derive(Debug, Default)]
pub struct TerminationLatch {
    requested: AtomicBool,
    reason: Mutex<Option<String>>,
    notify: Notify,
}

impl TerminationLatch {
    /// Creates a shared, unrequested latch.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records a termination request. Returns `true` for the first request.
    pub fn request(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        if self
            .requested
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!(%reason, "Termination already requested");
            return false;
        }

        info!(%reason, "Termination requested");
        *self.reason.lock() = Some(reason);
        self.notify.notify_waiters();
        true
    }

    /// Returns true once a request has been recorded.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Returns the reason given with the first request.
    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }

    /// Resolves once a request has been recorded, including one recorded
    /// before this call.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_requested() {
                return;
            }
            notified.await;
        }
    }
}

// =============================================================================
// Signal Listener
// =============================================================================

/// Installs handlers for SIGINT, SIGTERM and SIGQUIT (Ctrl-C elsewhere) and
/// forwards the first signal received to `latch`.
///
/// Handlers are registered before this returns, so the default disposition
/// no longer applies once it succeeds. Must be called inside a runtime.
pub fn spawn_signal_listener(latch: Arc<TerminationLatch>) -> BinResult<JoinHandle<()>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let register = |kind: SignalKind, name: &str| {
            signal(kind).map_err(|e| {
                BinError::from(e).with_context(format!("registering {name} handler"))
            })
        };
        let mut sigterm = register(SignalKind::terminate(), "SIGTERM")?;
        let mut sigint = register(SignalKind::interrupt(), "SIGINT")?;
        let mut sigquit = register(SignalKind::quit(), "SIGQUIT")?;

        Ok(tokio::spawn(async move {
            let name = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
                _ = sigquit.recv() => "SIGQUIT",
            };
            info!("Received {}", name);
            latch.request(name);
        }))
    }

    #[cfg(not(unix))]
    {
        Ok(tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C");
                    latch.request("ctrl-c");
                }
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C"),
            }
        }))
    }
}

// =============================================================================
// ShutdownGuard
// =============================================================================

/// Compare-and-swap guard that lets exactly one caller run the shutdown
/// sequence. Late callers see `false` and return immediately.
#[derive(Debug, Default)]
pub struct ShutdownGuard {
    started: AtomicBool,
}

impl ShutdownGuard {
    /// Creates an unclaimed guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the guard. Returns `true` only for the first caller.
    pub fn try_claim(&self) -> bool {
        let claimed = self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if !claimed {
            warn!("Shutdown already in progress, ignoring");
        }
        claimed
    }

    /// Returns true once the guard has been claimed.
    pub fn is_claimed(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_request_wins() {
        let latch = TerminationLatch::new();
        assert!(!latch.is_requested());
        assert!(latch.request("SIGTERM"));
        assert!(!latch.request("SIGINT"));
        assert_eq!(latch.reason().as_deref(), Some("SIGTERM"));
    }

    #[tokio::test]
    async fn test_early_request_is_remembered() {
        let latch = TerminationLatch::new();
        latch.request("startup");

        tokio::time::timeout(Duration::from_millis(100), latch.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_wakes_on_request() {
        let latch = TerminationLatch::new();
        let waiter = {
            let latch = latch.clone();
            tokio::spawn(async move { latch.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        latch.request("test");

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_guard_claimed_once_under_contention() {
        let guard = Arc::new(ShutdownGuard::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let guard = guard.clone();
                tokio::spawn(async move { guard.try_claim() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert!(guard.is_claimed());
    }

    #[tokio::test]
    async fn test_signal_listener_installs() {
        let latch = TerminationLatch::new();
        let handle = spawn_signal_listener(latch.clone()).unwrap();
        assert!(!latch.is_requested());
        handle.abort();
    }
}
