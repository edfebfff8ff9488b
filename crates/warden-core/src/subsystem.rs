// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The subsystem capability and shared lifecycle helpers.
//!
//! A subsystem is built uninitialized, receives everything it needs through
//! its constructor, and becomes initialized exactly once via
//! [`Subsystem::initialize`]. A second call is rejected with
//! [`SubsystemError::AlreadyInitialized`].
//!
//! # Implementing a Subsystem
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use warden_core::subsystem::{Lifecycle, Subsystem};
//!
//! struct Greeter {
//!     lifecycle: Lifecycle,
//! }
//!
//! #[async_trait]
//! impl Subsystem for Greeter {
//!     fn name(&self) -> &'static str {
//!         "greeter"
//!     }
//!
//!     async fn initialize(&self) -> Result<(), SubsystemError> {
//!         self.lifecycle.begin(self.name())?;
//!         self.lifecycle.complete();
//!         Ok(())
//!     }
//!
//!     async fn dispose(&self) -> Result<(), SubsystemError> {
//!         self.lifecycle.end();
//!         Ok(())
//!     }
//!
//!     fn is_initialized(&self) -> bool {
//!         self.lifecycle.is_initialized()
//!     }
//! }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::error::SubsystemError;

// =============================================================================
// Subsystem Trait
// =============================================================================

/// A unit of functionality with an asynchronous initialization step.
#[async_trait]
pub trait Subsystem: Send + Sync {
    /// Returns the subsystem name for logging.
    fn name(&self) -> &'static str;

    /// Brings the subsystem up. Called once, after the gateway is ready.
    async fn initialize(&self) -> Result<(), SubsystemError>;

    /// Releases resources held by the subsystem.
    async fn dispose(&self) -> Result<(), SubsystemError>;

    /// Returns `true` once `initialize` has succeeded.
    fn is_initialized(&self) -> bool;
}

// =============================================================================
// Lifecycle
// =============================================================================

const UNINITIALIZED: u8 = 0;
const INITIALIZING: u8 = 1;
const INITIALIZED: u8 = 2;
const DISPOSED: u8 = 3;

/// Lock-free initialize-once guard for subsystems.
#[derive(Debug, Default)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Lifecycle {
    /// Creates an uninitialized lifecycle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the right to initialize.
    ///
    /// Fails with [`SubsystemError::AlreadyInitialized`] unless this is the
    /// first call. Pair with [`Lifecycle::complete`] or [`Lifecycle::abort`].
    pub fn begin(&self, name: &str) -> Result<(), SubsystemError> {
        self.state
            .compare_exchange(UNINITIALIZED, INITIALIZING, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| SubsystemError::AlreadyInitialized {
                subsystem: name.to_string(),
            })
    }

    /// Marks initialization as successful.
    pub fn complete(&self) {
        let _ = self
            .state
            .compare_exchange(INITIALIZING, INITIALIZED, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Rolls back a failed initialization.
    pub fn abort(&self) {
        let _ = self
            .state
            .compare_exchange(INITIALIZING, UNINITIALIZED, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Marks the subsystem disposed. Returns `true` if it was initialized.
    pub fn end(&self) -> bool {
        self.state.swap(DISPOSED, Ordering::AcqRel) == INITIALIZED
    }

    /// Returns `true` while initialized and not yet disposed.
    pub fn is_initialized(&self) -> bool {
        self.state.load(Ordering::Acquire) == INITIALIZED
    }

    /// Fails with [`SubsystemError::NotInitialized`] unless initialized.
    pub fn require(&self, name: &str) -> Result<(), SubsystemError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(SubsystemError::NotInitialized {
                subsystem: name.to_string(),
            })
        }
    }
}

// =============================================================================
// Event Task
// =============================================================================

/// A background task that feeds broadcast events to a handler until stopped.
#[derive(Debug, Default)]
pub struct EventTask {
    handle: Mutex<Option<JoinHandle<()>>>,
    stop: Arc<Notify>,
}

impl EventTask {
    /// Creates an idle task slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the consumer loop. A previously started loop is aborted.
    pub fn start<E, H, Fut>(&self, name: &'static str, mut events: broadcast::Receiver<E>, mut handler: H)
    where
        E: Clone + Send + 'static,
        H: FnMut(E) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let stop = Arc::clone(&self.stop);
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.notified() => break,
                    received = events.recv() => match received {
                        Ok(event) => handler(event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(subsystem = name, skipped, "Event consumer lagged behind");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            tracing::debug!(subsystem = name, "Event task stopped");
        });

        let previous = self.handle.lock().replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Returns `true` while a loop is running.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Stops the loop and waits for it to exit.
    pub async fn stop(&self) -> Result<(), tokio::task::JoinError> {
        let handle = self.handle.lock().take();
        match handle {
            Some(handle) => {
                self.stop.notify_one();
                handle.await
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_lifecycle_initializes_once() {
        let lifecycle = Lifecycle::new();
        assert!(!lifecycle.is_initialized());
        lifecycle.begin("x").unwrap();
        lifecycle.complete();
        assert!(lifecycle.is_initialized());
        assert!(matches!(
            lifecycle.begin("x"),
            Err(SubsystemError::AlreadyInitialized { .. })
        ));
    }

    #[test]
    fn test_lifecycle_abort_allows_report() {
        let lifecycle = Lifecycle::new();
        lifecycle.begin("x").unwrap();
        lifecycle.abort();
        assert!(!lifecycle.is_initialized());
        assert!(lifecycle.require("x").is_err());
    }

    #[test]
    fn test_lifecycle_end() {
        let lifecycle = Lifecycle::new();
        assert!(!lifecycle.end());

        let lifecycle = Lifecycle::new();
        lifecycle.begin("x").unwrap();
        lifecycle.complete();
        assert!(lifecycle.end());
        assert!(!lifecycle.is_initialized());
        assert!(lifecycle.begin("x").is_err());
    }

    #[tokio::test]
    async fn test_event_task_consumes_and_stops() {
        let (tx, rx) = broadcast::channel::<u32>(8);
        let seen = Arc::new(AtomicUsize::new(0));
        let task = EventTask::new();

        let counter = Arc::clone(&seen);
        task.start("test", rx, move |value| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(value as usize, Ordering::SeqCst);
            }
        });
        assert!(task.is_running());

        tx.send(2).unwrap();
        tx.send(3).unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while seen.load(Ordering::SeqCst) < 5 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        task.stop().await.unwrap();
        assert!(!task.is_running());
        task.stop().await.unwrap();
    }
}
