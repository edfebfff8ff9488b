// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Retry policies for gateway connection attempts.
//!
//! A [`RetryStrategy`] decides, per failure, whether another attempt should be
//! made and how long to wait first. [`execute_with_retry`] drives an async
//! operation through a strategy.
//!
//! # Built-in Strategies
//!
//! - [`NoRetry`]: fail on the first error
//! - [`ExponentialBackoff`]: exponentially increasing delays, filtered by a
//!   [`RetryMode`]
//!
//! Authentication rejections are never retried by any built-in strategy.
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_core::retry::{execute_with_retry, RetryConfig, RetryMode};
//!
//! let strategy = RetryConfig::default().with_mode(RetryMode::Transient).build();
//! let events = execute_with_retry(strategy.as_ref(), || transport.open(&token)).await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

// =============================================================================
// Retry Mode
// =============================================================================

/// Which classes of gateway errors are retried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryMode {
    /// Fail on the first error.
    Never,
    /// Retry only rate-limit errors, honouring the server's retry-after hint.
    #[default]
    RateLimit,
    /// Retry rate-limit, timeout and transport errors.
    Transient,
}

impl RetryMode {
    /// Returns `true` if `error` belongs to a class this mode retries.
    pub fn covers(self, error: &GatewayError) -> bool {
        match self {
            RetryMode::Never => false,
            RetryMode::RateLimit => error.is_rate_limit(),
            RetryMode::Transient => error.is_transient(),
        }
    }
}

impl fmt::Display for RetryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryMode::Never => write!(f, "never"),
            RetryMode::RateLimit => write!(f, "rate_limit"),
            RetryMode::Transient => write!(f, "transient"),
        }
    }
}

// =============================================================================
// Retry Configuration
// =============================================================================

/// Configuration for retry strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Error classes to retry.
    pub mode: RetryMode,
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for computed delays.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            mode: RetryMode::RateLimit,
            max_retries: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Sets the retry mode.
    pub fn with_mode(mut self, mode: RetryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the maximum number of retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Builds the strategy this configuration describes.
    pub fn build(self) -> Box<dyn RetryStrategy> {
        if self.mode == RetryMode::Never || self.max_retries == 0 {
            Box::new(NoRetry)
        } else {
            Box::new(ExponentialBackoff::new(self))
        }
    }
}

// =============================================================================
// Retry Decision
// =============================================================================

/// Decision on whether to retry an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// Do not retry, return the error.
    DoNotRetry,
}

// =============================================================================
// Retry Strategy Trait
// =============================================================================

/// A strategy for determining when and how to retry failed gateway operations.
pub trait RetryStrategy: Send + Sync {
    /// Returns the name of this strategy for logging.
    fn name(&self) -> &str;

    /// Determines whether to retry after a failure.
    ///
    /// `attempt` is the number of the attempt that just failed (1-based).
    fn should_retry(&self, error: &GatewayError, attempt: u32) -> RetryDecision;
}

/// Executes `operation` until it succeeds or `strategy` gives up.
///
/// Returns the last error once no further attempt is allowed.
pub async fn execute_with_retry<F, Fut, T>(
    strategy: &dyn RetryStrategy,
    mut operation: F,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<T, GatewayError>> + Send,
    T: Send,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => match strategy.should_retry(&error, attempt) {
                RetryDecision::Retry(delay) => {
                    tracing::warn!(
                        strategy = %strategy.name(),
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying gateway operation"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry => return Err(error),
            },
        }
    }
}

// =============================================================================
// No Retry Strategy
// =============================================================================

/// A strategy that never retries.
#[derive(Debug, Clone, Default)]
pub struct NoRetry;

impl RetryStrategy for NoRetry {
    fn name(&self) -> &str {
        "no_retry"
    }

    fn should_retry(&self, _error: &GatewayError, _attempt: u32) -> RetryDecision {
        RetryDecision::DoNotRetry
    }
}

// =============================================================================
// Exponential Backoff Strategy
// =============================================================================

/// A strategy with exponentially increasing delays.
///
/// Delay formula: `min(initial_delay * multiplier^(attempt-1), max_delay)`.
/// A server-provided retry-after hint replaces the computed delay.
#[derive(Debug)]
pub struct ExponentialBackoff {
    config: RetryConfig,
    retries: AtomicU64,
}

impl ExponentialBackoff {
    /// Creates a new exponential backoff strategy.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            retries: AtomicU64::new(0),
        }
    }

    /// Returns the number of retries this strategy has granted.
    pub fn retries_granted(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self.config.initial_delay.as_millis() as f64;
        let multiplied = base * self.config.multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = multiplied.min(self.config.max_delay.as_millis() as f64);

        Duration::from_millis(capped as u64)
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn name(&self) -> &str {
        "exponential_backoff"
    }

    fn should_retry(&self, error: &GatewayError, attempt: u32) -> RetryDecision {
        if attempt > self.config.max_retries {
            return RetryDecision::DoNotRetry;
        }

        if !self.config.mode.covers(error) {
            return RetryDecision::DoNotRetry;
        }

        self.retries.fetch_add(1, Ordering::Relaxed);
        let delay = error
            .retry_after()
            .unwrap_or_else(|| self.calculate_delay(attempt));
        RetryDecision::Retry(delay)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;

    fn fast_config(mode: RetryMode) -> RetryConfig {
        RetryConfig::default()
            .with_mode(mode)
            .with_max_retries(3)
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(4))
    }

    #[test]
    fn test_rate_limit_mode_only_retries_rate_limits() {
        let strategy = ExponentialBackoff::new(fast_config(RetryMode::RateLimit));
        let limited = GatewayError::rate_limited(Duration::from_millis(2));

        assert_eq!(
            strategy.should_retry(&limited, 1),
            RetryDecision::Retry(Duration::from_millis(2))
        );
        assert_eq!(
            strategy.should_retry(&GatewayError::connection("reset"), 1),
            RetryDecision::DoNotRetry
        );
    }

    #[test]
    fn test_authentication_never_retried() {
        for mode in [RetryMode::Never, RetryMode::RateLimit, RetryMode::Transient] {
            let strategy = ExponentialBackoff::new(fast_config(mode));
            let err = GatewayError::authentication("invalid token");
            assert_eq!(strategy.should_retry(&err, 1), RetryDecision::DoNotRetry);
        }
    }

    #[test]
    fn test_exponential_delays_capped() {
        let strategy = ExponentialBackoff::new(fast_config(RetryMode::Transient));
        let err = GatewayError::timeout("connect", Duration::from_secs(1));

        assert_eq!(strategy.should_retry(&err, 1), RetryDecision::Retry(Duration::from_millis(1)));
        assert_eq!(strategy.should_retry(&err, 2), RetryDecision::Retry(Duration::from_millis(2)));
        assert_eq!(strategy.should_retry(&err, 3), RetryDecision::Retry(Duration::from_millis(4)));
        assert_eq!(strategy.should_retry(&err, 4), RetryDecision::DoNotRetry);
        assert_eq!(strategy.retries_granted(), 3);
    }

    #[test]
    fn test_build_never_is_no_retry() {
        let strategy = fast_config(RetryMode::Never).build();
        assert_eq!(strategy.name(), "no_retry");
        let strategy = fast_config(RetryMode::RateLimit).build();
        assert_eq!(strategy.name(), "exponential_backoff");
    }

    #[test]
    fn test_retry_mode_serde() {
        let mode: RetryMode = serde_json::from_str("\"rate_limit\"").unwrap();
        assert_eq!(mode, RetryMode::RateLimit);
        assert_eq!(RetryMode::Transient.to_string(), "transient");
    }

    #[tokio::test]
    async fn test_execute_recovers_after_rate_limit() {
        let strategy = fast_config(RetryMode::RateLimit).build();
        let calls = Arc::new(AtomicU32::new(0));

        let result = execute_with_retry(strategy.as_ref(), || {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(GatewayError::rate_limited(Duration::from_millis(1)))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_gives_up_after_exhaustion() {
        let strategy = fast_config(RetryMode::RateLimit).build();
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = execute_with_retry(strategy.as_ref(), || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(GatewayError::rate_limited(Duration::from_millis(1)))
            }
        })
        .await;

        assert!(result.unwrap_err().is_rate_limit());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
