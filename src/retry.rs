//! Bounded retry with backoff for lookup service calls.
//!
//! This module provides the [`RetryPolicy`] and [`RetryExecutor`] types that
//! wrap an asynchronous unit of work with a fixed attempt budget.
//!
//! # Overview
//!
//! Each attempt's failure is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - transport errors and HTTP 500/502/503/504
//! - [`FailureType::RateLimited`] - HTTP 429
//! - [`FailureType::Permanent`] - every other non-success status
//!
//! The policy decides whether to retry, the executor sleeps through an
//! injected [`Sleeper`] and reports a tagged [`RetryOutcome`] instead of an
//! error, so one failing batch never aborts the rest of a document.
//!
//! # Example
//!
//! ```
//! use hyperlink_core::retry::{RetryPolicy, RetryDecision, FailureType};
//!
//! let policy = RetryPolicy::default();
//! match policy.should_retry(FailureType::Transient, 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;

/// Default base delay between attempts (1 second).
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (30 seconds).
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// HTTP status codes that trigger a retry. Every other non-success status is terminal.
/// How often a pending backoff checks the cancellation flag.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub const RETRYABLE_STATUS_CODES: [u16; 5] = [500, 502, 503, 504, 429];

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Transport error or retryable server error.
    Transient,

    /// Server rate limiting (HTTP 429). Retried with the same backoff.
    RateLimited,

    /// Failure that will not succeed on retry.
    Permanent,
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior.
///
/// # Delay Calculation
///
/// ```text
/// exponential: delay = min(base_delay * 2^retry, max_delay)
/// flat:        delay = base_delay
/// ```
///
/// `retry` is 0 for the first retry, so with defaults the delays are 1s, 2s, 4s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt; total attempts is this plus one.
    max_retry_attempts: u32,

    base_delay: Duration,

    max_delay: Duration,

    /// When false every retry waits `base_delay`.
    exponential: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            exponential: true,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    ///
    /// `max_delay` is raised to `base_delay` when configured below it.
    #[must_use]
    pub fn new(
        max_retry_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        exponential: bool,
    ) -> Self {
        Self {
            max_retry_attempts,
            base_delay,
            max_delay: max_delay.max(base_delay),
            exponential,
        }
    }

    /// Creates a policy with a custom retry count, using defaults for other settings.
    #[must_use]
    pub fn with_max_retry_attempts(max_retry_attempts: u32) -> Self {
        Self {
            max_retry_attempts,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn max_retry_attempts(&self) -> u32 {
        self.max_retry_attempts
    }

    /// Total attempts including the initial one.
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.max_retry_attempts.saturating_add(1)
    }

    #[must_use]
    pub fn is_exponential(&self) -> bool {
        self.exponential
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_retry_attempts = self.max_retry_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.total_attempts() {
            debug!(attempt, max = self.total_attempts(), "retry budget exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("max retry attempts ({}) exhausted", self.max_retry_attempts),
            };
        }

        let delay = self.delay_for_retry(attempt - 1);
        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Delay before retry number `retry` (0-indexed).
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if !self.exponential {
            return self.base_delay;
        }
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Classifies an HTTP status code for retry decisions.
#[must_use]
pub fn classify_status(status: u16) -> FailureType {
    match status {
        429 => FailureType::RateLimited,
        s if RETRYABLE_STATUS_CODES.contains(&s) => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

/// What a single attempt produced, when it did not raise an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// The call succeeded.
    Success(T),
    /// The call completed with a non-success HTTP status.
    Status {
        status: u16,
        message: String,
    },
}

/// Terminal result of a retried call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Success(T),
    /// Every attempt failed with a retryable condition.
    RetriesExhausted {
        attempts: u32,
        last_failure: String,
    },
    /// A non-retryable status was returned; no retry was made.
    NonRetryable {
        status: u16,
        message: String,
    },
    /// Cancellation was observed before the call could finish.
    Cancelled {
        attempts: u32,
    },
}

impl<T> RetryOutcome<T> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn into_success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Human-readable terminal failure text, `None` on success.
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        match self {
            Self::Success(_) => None,
            Self::RetriesExhausted {
                attempts,
                last_failure,
            } => Some(format!("{last_failure} (after {attempts} attempts)")),
            Self::NonRetryable { status, message } => Some(format!("HTTP {status}: {message}")),
            Self::Cancelled { .. } => Some("Cancelled".to_string()),
        }
    }
}

/// Sleep capability injected into the executor.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Runs a unit of work under a [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    cancel: Arc<AtomicBool>,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("cancelled", &self.cancel.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl RetryExecutor {
    /// Creates an executor using the tokio timer and a fresh cancellation flag.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(TokioSleeper),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Shares an external cancellation flag, checked between attempts.
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Resolves once the cancellation flag is set.
    async fn wait_for_cancel(&self) {
        while !self.is_cancelled() {
            tokio::time::sleep(CANCEL_POLL_INTERVAL).await;
        }
    }

    /// Executes `work` until it succeeds, fails terminally or the budget runs out.
    ///
    /// `work` receives the 1-indexed attempt number. An `Err` is a transport
    /// failure and always retryable; [`Attempt::Status`] is retryable only for
    /// [`RETRYABLE_STATUS_CODES`].
    pub async fn execute<T, E, F, Fut>(&self, mut work: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Attempt<T>, E>>,
        E: Display,
    {
        let mut attempt = 0u32;

        loop {
            if self.is_cancelled() {
                debug!(attempt, "cancelled before attempt");
                return RetryOutcome::Cancelled { attempts: attempt };
            }

            attempt += 1;
            debug!(attempt, "executing attempt");

            let (failure_type, failure) = match work(attempt).await {
                Ok(Attempt::Success(value)) => return RetryOutcome::Success(value),
                Ok(Attempt::Status { status, message }) => {
                    let failure_type = classify_status(status);
                    if failure_type == FailureType::Permanent {
                        debug!(status, "non-retryable status");
                        return RetryOutcome::NonRetryable { status, message };
                    }
                    (failure_type, format!("HTTP {status}: {message}"))
                }
                Err(error) => (FailureType::Transient, format!("Exception: {error}")),
            };

            match self.policy.should_retry(failure_type, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    if self.is_cancelled() {
                        debug!(attempt, "cancelled before backoff");
                        return RetryOutcome::Cancelled { attempts: attempt };
                    }
                    info!(
                        attempt = next_attempt,
                        max_attempts = self.policy.total_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %failure,
                        "retrying lookup"
                    );
                    // Race the backoff against the flag so Ctrl+C cuts a long wait short.
                    let interrupted = tokio::select! {
                        biased;
                        () = self.wait_for_cancel() => true,
                        () = self.sleeper.sleep(delay) => false,
                    };
                    if interrupted {
                        debug!(attempt, "cancelled during backoff");
                        return RetryOutcome::Cancelled { attempts: attempt };
                    }
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, "not retrying");
                    return RetryOutcome::RetriesExhausted {
                        attempts: attempt,
                        last_failure: failure,
                    };
                }
            }
        }
    }
}
