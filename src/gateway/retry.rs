// src/gateway/retry.rs

//! Retry policy for gateway calls.
//!
//! Exponential backoff with jitter against a flaky content store. The
//! policy only decides *whether* and *how long* to wait; what counts as
//! retryable is the client's call.

use std::time::Duration;

use crate::config::GatewayConfig;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier (e.g., 2.0 for exponential backoff).
    pub backoff_multiplier: f64,
    /// Whether to add random jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl From<&GatewayConfig> for RetryConfig {
    fn from(gateway: &GatewayConfig) -> Self {
        Self {
            max_retries: gateway.max_retries,
            initial_delay: Duration::from_millis(gateway.backoff_base_ms),
            max_delay: Duration::from_millis(gateway.max_backoff_ms),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry configuration with custom settings.
    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff_multiplier,
            jitter: true,
        }
    }

    /// Creates a retry configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Creates a retry configuration for aggressive retry (many retries, short delays).
    pub fn aggressive() -> Self {
        Self {
            max_retries: 10,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 1.5,
            jitter: true,
        }
    }

    /// Calculates the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt >= self.max_retries {
            return Duration::ZERO;
        }

        let exponential = self.backoff_multiplier.powi(attempt as i32);
        let mut delay_secs = (self.initial_delay.as_secs_f64() * exponential)
            .min(self.max_delay.as_secs_f64());

        if self.jitter {
            // Up to 25% jitter
            delay_secs *= 1.0 + jitter_fraction(attempt) * 0.25;
        }

        Duration::from_secs_f64(delay_secs)
    }

    /// Returns true if more retries are allowed for the given attempt.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// Deterministic jitter in [0, 1) seeded by the attempt number, so delay
/// bounds stay testable.
fn jitter_fraction(seed: u32) -> f64 {
    let x = seed.wrapping_mul(1103515245).wrapping_add(12345);
    (x as f64) / (u32::MAX as f64)
}

/// Represents a retryable operation result.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded.
    Ok(T),
    /// Operation failed but can be retried.
    Retry(E),
    /// Operation failed and should not be retried.
    Fail(E),
}

impl<T, E> RetryResult<T, E> {
    /// Returns true if the result is Ok.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Returns true if the operation should be retried.
    pub fn should_retry(&self) -> bool {
        matches!(self, Self::Retry(_))
    }

    /// Converts to a standard Result, discarding retry information.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Ok(v) => Ok(v),
            Self::Retry(e) | Self::Fail(e) => Err(e),
        }
    }
}

/// Execute a blocking operation with retries.
pub fn retry_blocking<T, E, F>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> RetryResult<T, E>,
{
    let mut attempt = 0;

    loop {
        match operation() {
            RetryResult::Ok(value) => return Ok(value),
            RetryResult::Fail(error) => return Err(error),
            RetryResult::Retry(error) => {
                if !config.should_retry(attempt) {
                    return Err(error);
                }

                let delay = config.delay_for_attempt(attempt);
                std::thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}
