// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Service context and subsystem registry.
//!
//! [`ServiceContext`] bundles the process-wide singletons (gateway connection,
//! shared state, cache, state store) and is handed to every subsystem at
//! construction. [`ServiceRegistry`] owns the subsystems, initializes them in
//! registration order and disposes them once at process end.
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_core::registry::{ServiceContext, ServiceRegistry};
//! use warden_core::subsystems::MembershipTracker;
//!
//! let registry = ServiceRegistry::standard(context);
//! registry.initialize_all().await?;
//!
//! let members = registry.get::<MembershipTracker>().map(|t| t.member_count());
//!
//! registry.dispose().await?;
//! ```

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::audit::AuditFeed;
use crate::cache::SharedCache;
use crate::error::{RegistryError, SubsystemError};
use crate::gateway::GatewayConnection;
use crate::state::SharedState;
use crate::store::StateStore;
use crate::subsystem::Subsystem;
use crate::subsystems::{AuditLogger, CommandHandler, EventLogger, MembershipTracker};

// =============================================================================
// ServiceContext
// =============================================================================

/// Shared singletons passed to every subsystem.
#[derive(Clone)]
pub struct ServiceContext {
    gateway: Arc<GatewayConnection>,
    state: Arc<SharedState>,
    cache: Arc<SharedCache>,
    store: Arc<StateStore>,
    audit: AuditFeed,
    data_dir: PathBuf,
}

impl ServiceContext {
    /// Creates a context rooted at `data_dir`.
    pub fn new(gateway: Arc<GatewayConnection>, state: Arc<SharedState>, data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            gateway,
            state,
            cache: Arc::new(SharedCache::new()),
            store: Arc::new(StateStore::new(&data_dir)),
            audit: AuditFeed::default(),
            data_dir,
        }
    }

    /// The gateway connection.
    pub fn gateway(&self) -> &Arc<GatewayConnection> {
        &self.gateway
    }

    /// The shared moderation state.
    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// The shared short-lived cache.
    pub fn cache(&self) -> &Arc<SharedCache> {
        &self.cache
    }

    /// The state store.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// The audit feed.
    pub fn audit(&self) -> &AuditFeed {
        &self.audit
    }

    /// The data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

impl fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContext")
            .field("gateway", &self.gateway)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

// =============================================================================
// ServiceRegistry
// =============================================================================

struct Registration {
    subsystem: Arc<dyn Subsystem>,
    any: Arc<dyn Any + Send + Sync>,
}

/// Builder for [`ServiceRegistry`].
pub struct ServiceRegistryBuilder {
    context: ServiceContext,
    registrations: Vec<Registration>,
}

impl ServiceRegistryBuilder {
    /// Appends a subsystem. Registration order is initialization order.
    pub fn register<S: Subsystem + 'static>(mut self, subsystem: Arc<S>) -> Self {
        self.registrations.push(Registration {
            subsystem: Arc::clone(&subsystem) as Arc<dyn Subsystem>,
            any: subsystem as Arc<dyn Any + Send + Sync>,
        });
        self
    }

    /// Finishes the registry.
    pub fn build(self) -> ServiceRegistry {
        ServiceRegistry {
            context: self.context,
            registrations: self.registrations,
            disposed: AtomicBool::new(false),
        }
    }
}

/// Owns every subsystem for the lifetime of the process.
pub struct ServiceRegistry {
    context: ServiceContext,
    registrations: Vec<Registration>,
    disposed: AtomicBool,
}

impl ServiceRegistry {
    /// Starts an empty registry over `context`.
    pub fn builder(context: ServiceContext) -> ServiceRegistryBuilder {
        ServiceRegistryBuilder {
            context,
            registrations: Vec::new(),
        }
    }

    /// Builds the registry with the standard subsystems, in initialization
    /// order: command handler, event logger, membership tracker, audit logger.
    pub fn standard(context: ServiceContext) -> Self {
        Self::builder(context.clone())
            .register(Arc::new(CommandHandler::new(context.clone())))
            .register(Arc::new(EventLogger::new(context.clone())))
            .register(Arc::new(MembershipTracker::new(context.clone())))
            .register(Arc::new(AuditLogger::new(context)))
            .build()
    }

    /// Returns the service context.
    pub fn context(&self) -> &ServiceContext {
        &self.context
    }

    /// Looks up a registered subsystem by concrete type.
    pub fn get<S: Subsystem + 'static>(&self) -> Option<Arc<S>> {
        self.registrations
            .iter()
            .find_map(|r| Arc::clone(&r.any).downcast::<S>().ok())
    }

    /// Returns the subsystem names in initialization order.
    pub fn names(&self) -> Vec<&'static str> {
        self.registrations.iter().map(|r| r.subsystem.name()).collect()
    }

    /// Returns the number of registered subsystems.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Initializes every subsystem sequentially, in registration order.
    ///
    /// Stops at the first failure; later subsystems are left uninitialized.
    /// Returns the number of subsystems initialized.
    pub async fn initialize_all(&self) -> Result<usize, SubsystemError> {
        for registration in &self.registrations {
            let subsystem = &registration.subsystem;
            let started = Instant::now();

            subsystem.initialize().await.inspect_err(|e| {
                tracing::error!(subsystem = subsystem.name(), error = %e, "Subsystem initialization failed");
            })?;

            tracing::info!(
                subsystem = subsystem.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Initialized subsystem"
            );
        }
        Ok(self.registrations.len())
    }

    /// Returns `true` once [`ServiceRegistry::dispose`] has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Disposes initialized subsystems in reverse order, then saves the
    /// shared state.
    ///
    /// Every step runs even if an earlier one fails; failures are collected
    /// into one error. A second call fails with
    /// [`RegistryError::AlreadyDisposed`].
    pub async fn dispose(&self) -> Result<(), RegistryError> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(RegistryError::AlreadyDisposed);
        }

        let mut failures = Vec::new();

        for registration in self.registrations.iter().rev() {
            let subsystem = &registration.subsystem;
            if !subsystem.is_initialized() {
                continue;
            }
            match subsystem.dispose().await {
                Ok(()) => tracing::debug!(subsystem = subsystem.name(), "Disposed subsystem"),
                Err(e) => {
                    tracing::warn!(subsystem = subsystem.name(), error = %e, "Subsystem disposal failed");
                    failures.push(e.to_string());
                }
            }
        }

        if let Err(e) = self.context.store.save_state(&self.context.state) {
            tracing::warn!(error = %e, "Failed to save shared state");
            failures.push(e.to_string());
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::Dispose { failures })
        }
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("subsystems", &self.names())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
