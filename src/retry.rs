//! Retry utilities with exponential backoff
//!
//! The engine only retries *opening* a response stream: once the first byte of a turn
//! has been read, a transport failure ends that turn. [`HttpTransport`] applies the
//! [`RetryConfig`] from [`AgentOptions`]; the functions here are public so callers can
//! wrap their own transports the same way.
//!
//! [`HttpTransport`]: crate::transport::HttpTransport
//! [`AgentOptions`]: crate::AgentOptions
//!
//! # Examples
//!
//! ```rust,no_run
//! use agent_stream::retry::{retry_with_backoff, RetryConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RetryConfig::default()
//!     .with_max_attempts(3)
//!     .with_initial_delay(Duration::from_secs(1));
//!
//! let result = retry_with_backoff(config, || async {
//!     Ok::<_, agent_stream::Error>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Backoff policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,

    pub initial_delay: Duration,

    pub max_delay: Duration,

    pub backoff_multiplier: f64,

    /// Fraction of the computed delay used as random jitter, in `0.0..=1.0`.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter_factor(mut self, jitter: f64) -> Self {
        self.jitter_factor = jitter.clamp(0.0, 1.0);
        self
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay_ms = self.initial_delay.as_millis() as f64;
        let exponential_delay = base_delay_ms * self.backoff_multiplier.powi(attempt as i32);

        let capped_delay = exponential_delay.min(self.max_delay.as_millis() as f64);

        let jitter_range = capped_delay * self.jitter_factor;
        let jitter = rand::random::<f64>() * jitter_range;
        let final_delay = capped_delay + jitter - (jitter_range / 2.0);

        Duration::from_millis(final_delay.max(0.0) as u64)
    }
}

/// Retry `operation` on any error until it succeeds or attempts run out.
pub async fn retry_with_backoff<F, Fut, T>(config: RetryConfig, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_inner(config, operation, |_| true).await
}

/// Like [`retry_with_backoff`], but gives up at once on errors for which
/// [`Error::is_retryable`] is false.
pub async fn retry_with_backoff_conditional<F, Fut, T>(
    config: RetryConfig,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_inner(config, operation, Error::is_retryable).await
}

async fn retry_inner<F, Fut, T, P>(config: RetryConfig, mut operation: F, retryable: P) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let attempts = config.attempts();
    let mut last_error = None;

    for attempt in 0..attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !retryable(&err) {
                    return Err(err);
                }

                // Don't sleep after the last attempt
                if attempt + 1 < attempts {
                    let delay = config.calculate_delay(attempt);
                    log::debug!(
                        "attempt {}/{} failed ({}), retrying in {:?}",
                        attempt + 1,
                        attempts,
                        err,
                        delay
                    );
                    sleep(delay).await;
                }
                last_error = Some(err);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::other("Retry failed with no error")))
}
