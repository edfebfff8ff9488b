// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error hierarchy for Warden.
//!
//! # Error Hierarchy
//!
//! ```text
//! WardenError (root)
//! ├── GatewayError    - Gateway connection lifecycle and transport
//! ├── SubsystemError  - Subsystem initialization and disposal
//! ├── RegistryError   - Service registry disposal
//! ├── StateError      - Shared state invariants
//! ├── StoreError      - State persistence
//! └── AuditError      - Audit trail I/O
//! ```
//!
//! # Examples
//!
//! ```
//! use warden_core::error::{GatewayError, WardenError};
//! use std::time::Duration;
//!
//! let error = GatewayError::rate_limited(Duration::from_secs(2));
//! assert!(error.is_rate_limit());
//!
//! let root: WardenError = error.into();
//! assert_eq!(root.error_type(), "gateway");
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// WardenError - Root Error Type
// =============================================================================

/// The root error type for Warden.
#[derive(Debug, Error)]
pub enum WardenError {
    /// Gateway error.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Subsystem error.
    #[error("Subsystem error: {0}")]
    Subsystem(#[from] SubsystemError),

    /// Registry error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Shared state error.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// State store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Audit trail error.
    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),
}

impl WardenError {
    /// Returns the error type as a string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            WardenError::Gateway(_) => "gateway",
            WardenError::Subsystem(_) => "subsystem",
            WardenError::Registry(_) => "registry",
            WardenError::State(_) => "state",
            WardenError::Store(_) => "store",
            WardenError::Audit(_) => "audit",
        }
    }
}

// =============================================================================
// GatewayError
// =============================================================================

/// Errors raised by the gateway connection and its transports.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway rejected the credentials.
    #[error("Authentication rejected: {message}")]
    Authentication {
        /// Rejection reason.
        message: String,
    },

    /// Transport-level failure while connecting or talking to the gateway.
    #[error("Connection failed: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// The gateway asked the client to slow down.
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Server-provided back-off hint.
        retry_after: Duration,
    },

    /// An operation did not complete within its time budget.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The configured budget.
        duration: Duration,
    },

    /// The operation is not valid in the connection's current state.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// The state the connection was in.
        state: String,
    },

    /// The gateway sent something the transport could not understand.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Error message.
        message: String,
    },

    /// The connection closed before the expected event arrived.
    #[error("Connection closed")]
    Closed,
}

impl GatewayError {
    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a rate-limit error.
    pub fn rate_limited(retry_after: Duration) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: &'static str, duration: Duration) -> Self {
        Self::Timeout {
            operation,
            duration,
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Returns `true` for rate-limit-class errors.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns `true` for errors that may clear up on their own.
    ///
    /// Authentication rejections are never transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Connection { .. } | Self::Closed
        )
    }

    /// Returns the server-provided back-off hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

// =============================================================================
// SubsystemError
// =============================================================================

/// Errors raised by subsystems during their lifecycle.
#[derive(Debug, Error)]
pub enum SubsystemError {
    /// Initialization failed.
    #[error("Failed to initialize '{subsystem}': {message}")]
    Initialization {
        /// Subsystem name.
        subsystem: String,
        /// Error message.
        message: String,
    },

    /// `initialize` was called a second time.
    #[error("Subsystem '{subsystem}' is already initialized")]
    AlreadyInitialized {
        /// Subsystem name.
        subsystem: String,
    },

    /// An operation required an initialized subsystem.
    #[error("Subsystem '{subsystem}' is not initialized")]
    NotInitialized {
        /// Subsystem name.
        subsystem: String,
    },

    /// Releasing resources failed.
    #[error("Failed to dispose '{subsystem}': {message}")]
    Dispose {
        /// Subsystem name.
        subsystem: String,
        /// Error message.
        message: String,
    },
}

impl SubsystemError {
    /// Creates an initialization error.
    pub fn init(subsystem: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Initialization {
            subsystem: subsystem.into(),
            message: message.into(),
        }
    }

    /// Creates a dispose error.
    pub fn dispose(subsystem: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dispose {
            subsystem: subsystem.into(),
            message: message.into(),
        }
    }

    /// Returns the name of the subsystem that raised the error.
    pub fn subsystem(&self) -> &str {
        match self {
            Self::Initialization { subsystem, .. }
            | Self::AlreadyInitialized { subsystem }
            | Self::NotInitialized { subsystem }
            | Self::Dispose { subsystem, .. } => subsystem,
        }
    }
}

// =============================================================================
// RegistryError
// =============================================================================

/// Errors raised by the service registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// `dispose` was called more than once.
    #[error("Service registry is already disposed")]
    AlreadyDisposed,

    /// One or more owned resources failed to release.
    #[error("{} resource(s) failed to dispose: {}", .failures.len(), .failures.join("; "))]
    Dispose {
        /// Individual failure messages.
        failures: Vec<String>,
    },
}

// =============================================================================
// StateError
// =============================================================================

/// Violations of shared-state invariants.
#[derive(Debug, Error)]
pub enum StateError {
    /// The command prefix must never be empty.
    #[error("Command prefix must not be empty")]
    EmptyPrefix,

    /// The command prefix must not contain whitespace.
    #[error("Command prefix '{prefix}' must not contain whitespace")]
    InvalidPrefix {
        /// The rejected prefix.
        prefix: String,
    },
}

// =============================================================================
// StoreError
// =============================================================================

/// Errors raised while persisting or loading shared state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File I/O failed.
    #[error("State file '{path}': {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The state file could not be encoded or decoded.
    #[error("State file '{path}' is malformed: {message}")]
    Serialization {
        /// File path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// The persisted state violates an invariant.
    #[error("State file '{path}' is invalid: {source}")]
    Invalid {
        /// File path.
        path: PathBuf,
        /// The violated invariant.
        #[source]
        source: StateError,
    },
}

// =============================================================================
// AuditError
// =============================================================================

/// Errors raised by audit sinks.
#[derive(Debug, Error)]
pub enum AuditError {
    /// File I/O failed.
    #[error("Audit I/O error on '{path}': {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An entry could not be serialized.
    #[error("Audit serialization error: {0}")]
    Serialization(String),

    /// The sink has been closed.
    #[error("Audit sink is closed")]
    Closed,
}

/// Result type alias for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;

// =============================================================================
// Tests
// =============================================================================
