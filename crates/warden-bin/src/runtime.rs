// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bot orchestration.
//!
//! The [`Orchestrator`] owns the process lifecycle:
//!
//! 1. Record the start time and make sure the data directory exists
//! 2. Load the gateway token and connect
//! 3. Wait for the ready event, load persisted state
//! 4. Initialize every subsystem in order, then register the termination guard
//! 5. Run the operator console until `stop` or a termination request
//! 6. Shut down exactly once: disconnect, report uptime, dispose services

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use warden_config::{ConfigLoader, WardenConfig, load_token};
use warden_core::error::GatewayError;
use warden_core::gateway::{GatewayConnection, GatewayTransport, WebSocketTransport};
use warden_core::registry::{ServiceContext, ServiceRegistry};
use warden_core::store::StateStore;
use warden_core::types::GatewayToken;
use warden_core::uptime::Uptime;

use crate::console::{CommandLoop, LoopExit};
use crate::error::{BinError, BinResult};
use crate::shutdown::{ShutdownGuard, TerminationLatch};

/// Builds the service registry once the gateway is ready.
pub type RegistryFactory = Box<dyn FnOnce(ServiceContext) -> ServiceRegistry + Send>;

/// Operator console over boxed stdio-like streams.
pub type Console = CommandLoop<Box<dyn BufRead + Send>, Box<dyn Write + Send>>;

// =============================================================================
// Outcomes
// =============================================================================

/// Why a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The operator entered `stop`.
    Operator,
    /// A termination request (signal or programmatic) arrived.
    Termination,
}

/// What the shutdown sequence did.
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    /// Time since the recorded start.
    pub uptime: Uptime,
    /// Whether the gateway closed cleanly within its budget.
    pub disconnected: bool,
    /// Whether the registry disposed cleanly within its budget.
    pub disposed: bool,
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Owns the gateway connection, the service registry and the console.
pub struct Orchestrator {
    config: WardenConfig,
    transport: Arc<dyn GatewayTransport>,
    token: Mutex<Option<GatewayToken>>,
    registry_factory: Mutex<Option<RegistryFactory>>,
    console: Mutex<Option<Console>>,
    termination: Arc<TerminationLatch>,
    shutdown_guard: ShutdownGuard,
    guard_registered: AtomicBool,
    started_at: AtomicI64,
    gateway: OnceLock<Arc<GatewayConnection>>,
    registry: OnceLock<Arc<ServiceRegistry>>,
}

impl Orchestrator {
    /// Creates a builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    /// Returns the termination latch.
    pub fn termination(&self) -> &Arc<TerminationLatch> {
        &self.termination
    }

    /// Returns the gateway connection once startup has created it.
    pub fn gateway(&self) -> Option<&Arc<GatewayConnection>> {
        self.gateway.get()
    }

    /// Returns the service registry once startup has built it.
    pub fn registry(&self) -> Option<&Arc<ServiceRegistry>> {
        self.registry.get()
    }

    /// Returns true once the termination guard is registered.
    pub fn is_guard_registered(&self) -> bool {
        self.guard_registered.load(Ordering::SeqCst)
    }

    /// Returns true once shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_guard.is_claimed()
    }

    /// Runs the bot to completion.
    ///
    /// Fatal startup failures trigger shutdown and are returned. A stop from
    /// the console or a termination request ends the run successfully.
    pub async fn run(&self) -> BinResult<StopReason> {
        let started = Instant::now();
        self.started_at
            .store(chrono::Utc::now().timestamp(), Ordering::SeqCst);

        info!(bot = %self.config.bot.name, "Starting Warden v{}", warden_core::VERSION);

        if let Err(error) = self.start(started).await {
            error!(error = %error, "Fatal startup failure");
            self.shutdown().await;
            return Err(error);
        }

        let reason = self.serve().await;
        info!(?reason, "Leaving main loop");
        self.shutdown().await;
        Ok(reason)
    }

    async fn start(&self, started: Instant) -> BinResult<()> {
        let data_dir = self.config.bot.data_dir.clone();
        std::fs::create_dir_all(&data_dir).map_err(|e| {
            BinError::from(e).with_context(format!(
                "Failed to create data directory {}",
                data_dir.display()
            ))
        })?;

        let preset = self.token.lock().take();
        let token = match preset {
            Some(token) => token,
            None => load_token(&self.config.bot.token_path)?,
        };

        let gateway = Arc::new(GatewayConnection::new(
            Arc::clone(&self.transport),
            token,
            self.config.gateway.connection_settings(),
        ));
        self.gateway
            .set(Arc::clone(&gateway))
            .map_err(|_| BinError::runtime("Orchestrator has already been started"))?;

        gateway.connect().await?;

        let ready_timeout = self.config.gateway.ready_timeout();
        let ready = gateway
            .wait_until_ready(ready_timeout)
            .await
            .map_err(|e| GatewayError::connection(format!("Gateway did not become ready: {}", e)))?;
        info!(
            session = %ready.session_id,
            members = ready.member_count,
            "Gateway ready"
        );

        let state = Arc::new(StateStore::new(&data_dir).load_state()?);
        let context = ServiceContext::new(gateway, state, data_dir);

        let preset = self.registry_factory.lock().take();
        let factory: RegistryFactory = match preset {
            Some(factory) => factory,
            None => Box::new(ServiceRegistry::standard),
        };
        let registry = Arc::new(factory(context));
        self.registry
            .set(Arc::clone(&registry))
            .map_err(|_| BinError::runtime("Service registry already built"))?;

        let init_started = Instant::now();
        let initialized = registry.initialize_all().await?;
        info!(
            "Initialized {} subsystems in {}ms",
            initialized,
            init_started.elapsed().as_millis()
        );

        self.guard_registered.store(true, Ordering::SeqCst);
        debug!("Termination guard registered");

        info!("Completed startup in {}ms", started.elapsed().as_millis());
        Ok(())
    }

    async fn serve(&self) -> StopReason {
        if self.termination.is_requested() {
            info!("Termination was requested during startup");
            return StopReason::Termination;
        }

        let console = self.console.lock().take();
        let Some(mut console) = console else {
            info!("Console disabled, waiting for a termination signal");
            self.termination.wait().await;
            return StopReason::Termination;
        };

        let mut reader = tokio::task::spawn_blocking(move || console.run());
        tokio::select! {
            exit = &mut reader => match exit {
                Ok(LoopExit::Stopped) => StopReason::Operator,
                Ok(LoopExit::InputClosed) => {
                    info!("Console input closed, waiting for a termination signal");
                    self.termination.wait().await;
                    StopReason::Termination
                }
                Err(e) => {
                    error!(error = %e, "Console task failed, waiting for a termination signal");
                    self.termination.wait().await;
                    StopReason::Termination
                }
            },
            _ = self.termination.wait() => StopReason::Termination,
        }
    }

    /// Runs the shutdown sequence once.
    ///
    /// Returns `None` when another caller already started it. Each step is
    /// bounded by `shutdown.step_timeout_ms`; failures are logged and the
    /// next step still runs.
    pub async fn shutdown(&self) -> Option<ShutdownReport> {
        if !self.shutdown_guard.try_claim() {
            return None;
        }

        info!("Shutting down");
        let uptime = Uptime::since(self.started_at.load(Ordering::SeqCst));
        let step_timeout = self.config.shutdown.step_timeout();

        let disconnected = match self.gateway.get() {
            None => true,
            Some(gateway) => {
                let started = Instant::now();
                match tokio::time::timeout(step_timeout, gateway.disconnect()).await {
                    Ok(Ok(())) => {
                        info!("Successfully disconnected in {}ms", started.elapsed().as_millis());
                        true
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "Gateway disconnect failed");
                        false
                    }
                    Err(_) => {
                        warn!(
                            timeout_ms = step_timeout.as_millis() as u64,
                            "Gateway disconnect timed out"
                        );
                        false
                    }
                }
            }
        };

        info!("Bot uptime was {}", uptime);

        let disposed = match self.registry.get() {
            None => true,
            Some(registry) => match tokio::time::timeout(step_timeout, registry.dispose()).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    error!(error = %e, "Failed to dispose services");
                    false
                }
                Err(_) => {
                    error!(
                        timeout_ms = step_timeout.as_millis() as u64,
                        "Service disposal timed out"
                    );
                    false
                }
            },
        };

        info!(disconnected, disposed, "Shutdown complete");
        Some(ShutdownReport {
            uptime,
            disconnected,
            disposed,
        })
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for [`Orchestrator`].
#[derive(Default)]
pub struct RuntimeBuilder {
    config_path: Option<PathBuf>,
    config: Option<WardenConfig>,
    transport: Option<Arc<dyn GatewayTransport>>,
    token: Option<GatewayToken>,
    registry_factory: Option<RegistryFactory>,
    console: Option<Console>,
    termination: Option<Arc<TerminationLatch>>,
}

impl RuntimeBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from `path` (defaults apply if it is missing).
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Uses an already loaded configuration.
    pub fn config(mut self, config: WardenConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces the WebSocket transport.
    pub fn transport(mut self, transport: Arc<dyn GatewayTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Uses `token` instead of reading `bot.token_path`.
    pub fn token(mut self, token: GatewayToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Replaces the standard subsystem set.
    pub fn registry<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(ServiceContext) -> ServiceRegistry + Send + 'static,
    {
        self.registry_factory = Some(Box::new(factory));
        self
    }

    /// Reads operator commands from `input` and writes notices to `display`.
    pub fn console<R, W>(mut self, input: R, display: W) -> Self
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
    {
        self.console = Some(CommandLoop::new(Box::new(input), Box::new(display)));
        self
    }

    /// Uses the process stdin and stdout as the console.
    pub fn stdio_console(self) -> Self {
        self.console(std::io::BufReader::new(std::io::stdin()), std::io::stdout())
    }

    /// Shares a termination latch, typically one fed by the signal listener.
    pub fn termination(mut self, latch: Arc<TerminationLatch>) -> Self {
        self.termination = Some(latch);
        self
    }

    /// Builds the orchestrator.
    pub fn build(self) -> BinResult<Orchestrator> {
        let config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => ConfigLoader::new().load_or_default(path)?,
            (None, None) => WardenConfig::default(),
        };
        config.validate()?;

        let transport = self.transport.unwrap_or_else(|| {
            Arc::new(
                WebSocketTransport::new(config.gateway.url.clone())
                    .with_event_capacity(config.gateway.event_capacity),
            )
        });

        Ok(Orchestrator {
            config,
            transport,
            token: Mutex::new(self.token),
            registry_factory: Mutex::new(self.registry_factory),
            console: Mutex::new(self.console),
            termination: self.termination.unwrap_or_else(TerminationLatch::new),
            shutdown_guard: ShutdownGuard::new(),
            guard_registered: AtomicBool::new(false),
            started_at: AtomicI64::new(chrono::Utc::now().timestamp()),
            gateway: OnceLock::new(),
            registry: OnceLock::new(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
