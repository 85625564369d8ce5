//! Retry logic with exponential backoff for network operations.
//!
//! Source page fetches, image downloads, storage writes and destination
//! requests all go through [`with_retry`] or [`with_retry_if`].

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Backoff policy for one class of remote call.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
    /// Add up to 25% random delay.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Builds a config from the attempt-count/base-delay pair used in
    /// configuration files. Jitter is off so delays are exactly
    /// `base * 2^(attempt-1)`.
    pub fn from_attempts(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries: max_attempts.saturating_sub(1),
            initial_delay: base_delay,
            max_delay,
            backoff_multiplier: 2.0,
            add_jitter: false,
        }
    }

    /// Source API pagination: 3 attempts, 5s then 10s.
    pub fn for_source() -> Self {
        Self::from_attempts(3, Duration::from_secs(5), Duration::from_secs(60))
    }

    /// Object storage writes: 3 attempts, 2s then 4s.
    pub fn for_storage() -> Self {
        Self::from_attempts(3, Duration::from_secs(2), Duration::from_secs(30))
    }

    /// Creates a config with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Total number of attempts, the initial one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Calculates the delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self
                .backoff_multiplier
                .powi(attempt.saturating_sub(1) as i32);

        let capped_delay = base_delay.min(self.max_delay.as_secs_f64());

        // Jitter adds at most a quarter of the delay.
        let jitter = if self.add_jitter {
            capped_delay * 0.25 * rand_jitter()
        } else {
            0.0
        };

        Duration::from_secs_f64(capped_delay + jitter)
    }

    /// Delay before retrying after `error`. A `Retry-After` hint can only
    /// lengthen the backoff, and the cap still applies.
    pub fn delay_after(&self, attempt: u32, error: &Error) -> Duration {
        let backoff = self.delay_for_attempt(attempt);
        match error {
            Error::RateLimit {
                retry_after: Some(secs),
            } => backoff
                .max(Duration::from_secs(*secs))
                .min(self.max_delay.max(backoff)),
            _ => backoff,
        }
    }
}

/// Jitter factor in `[0, 1)` taken from the clock's sub-second nanos.
fn rand_jitter() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.subsec_nanos());
    f64::from(nanos % 1000) / 1000.0
}

/// Determines if an error is retryable.
///
/// Timeouts, 429, 5xx, connection failures and storage write failures are
/// transient. Client errors, auth failures and asset validation failures are
/// permanent.
pub fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::RateLimit { .. } | Error::Timeout(_) | Error::Network(_) | Error::Storage(_) => {
            true
        }
        Error::HttpStatus { status, .. } => *status >= 500,
        Error::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::Interrupted
                | std::io::ErrorKind::BrokenPipe
        ),
        _ => false,
    }
}

/// Executes an async operation, retrying errors accepted by
/// [`is_retryable_error`].
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_retry_if(config, operation_name, is_retryable_error, operation).await
}

/// Executes an async operation with retry logic and a custom retry predicate.
///
/// # Arguments
///
/// * `config` - Retry configuration
/// * `operation_name` - Name for logging purposes
/// * `should_retry` - Decides whether a failure is worth another attempt
/// * `operation` - The async operation to execute
///
/// # Returns
///
/// The result of the operation, or the last error if all retries failed.
#[allow(clippy::cognitive_complexity)] // Reason: Retry logic with backoff requires tracking multiple states
pub async fn with_retry_if<F, Fut, T, P>(
    config: &RetryConfig,
    operation_name: &str,
    should_retry: P,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let max_attempts = config.max_attempts();
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{}: Succeeded after {} retries", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                if !should_retry(&e) || attempt >= config.max_retries {
                    // Non-retryable error or last attempt
                    return Err(e);
                }
                attempt += 1;
                let delay = config.delay_after(attempt, &e);
                warn!(
                    "{}: Retryable error (attempt {}/{}), retrying in {:?}: {}",
                    operation_name, attempt, max_attempts, delay, e
                );
                sleep(delay).await;
            }
        }
    }
}
