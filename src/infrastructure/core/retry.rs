//! Bounded retry with exponential backoff and jitter.
//!
//! `retry` runs an operation up to `1 + max_retries` times. Between
//! attempts it asks the observer to record the failure, then waits for the
//! next backoff delay. A single cancellation token governs both the
//! in-flight attempt and the wait.

use rand::Rng;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Upper bound of the backoff delay, as a multiple of the initial delay.
pub const MAX_DELAY_FACTOR: u32 = 10;
pub const BACKOFF_MULTIPLIER: f64 = 2.0;
/// Each delay is perturbed by up to ±10%.
pub const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Exponential backoff: `initial`, doubling per retry, capped at
/// `MAX_DELAY_FACTOR × initial`, with jitter applied to every delay.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    randomization_factor: f64,
    current: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            max: initial.saturating_mul(MAX_DELAY_FACTOR),
            multiplier: BACKOFF_MULTIPLIER,
            randomization_factor: RANDOMIZATION_FACTOR,
            current: initial,
        }
    }

    pub fn with_randomization_factor(mut self, factor: f64) -> Self {
        self.randomization_factor = factor.clamp(0.0, 1.0);
        self
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    /// The delay to wait before the next retry. Never exceeds
    /// `MAX_DELAY_FACTOR × initial`.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = Duration::try_from_secs_f64(base.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max)
            .min(self.max);

        let jittered = self.randomize(base);
        jittered.min(self.max)
    }

    fn randomize(&self, base: Duration) -> Duration {
        if self.randomization_factor == 0.0 || base.is_zero() {
            return base;
        }
        let secs = base.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let randomized = rand::rng().random_range((secs - delta)..=(secs + delta));
        Duration::try_from_secs_f64(randomized.max(0.0)).unwrap_or(base)
    }
}

/// Receives a notification before every retry wait.
pub trait RetryObserver<E>: Send + Sync {
    fn on_retry(&self, error: &E, delay: Duration);
}

impl<E, F> RetryObserver<E> for F
where
    F: Fn(&E, Duration) + Send + Sync,
{
    fn on_retry(&self, error: &E, delay: Duration) {
        self(error, delay)
    }
}

/// Decides whether a failure may be retried.
pub type RetryablePredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Treats every failure as transient.
pub fn always_retryable<E: 'static>() -> RetryablePredicate<E> {
    Arc::new(|_: &E| true)
}

/// Attempt budget, backoff tuning and failure classification.
pub struct RetryPolicy<E> {
    pub max_retries: u32,
    pub backoff: ExponentialBackoff,
    is_retryable: RetryablePredicate<E>,
}

impl<E: 'static> RetryPolicy<E> {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self::with_predicate(max_retries, initial_delay, always_retryable())
    }
}

impl<E> RetryPolicy<E> {
    pub fn with_predicate(
        max_retries: u32,
        initial_delay: Duration,
        is_retryable: RetryablePredicate<E>,
    ) -> Self {
        Self {
            max_retries,
            backoff: ExponentialBackoff::new(initial_delay),
            is_retryable,
        }
    }

    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_retryable(mut self, predicate: RetryablePredicate<E>) -> Self {
        self.is_retryable = predicate;
        self
    }

    pub fn max_attempts(&self) -> u64 {
        u64::from(self.max_retries) + 1
    }

    pub fn is_retryable(&self, error: &E) -> bool {
        (self.is_retryable)(error)
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

/// Error type for retried operations
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("operation cancelled")]
    Cancelled,

    /// The last failure, returned as-is: after exhaustion or because it was
    /// classified as permanent.
    #[error(transparent)]
    Inner(E),
}

/// Runs `operation` under `policy`.
///
/// Stops on success, on a non-retryable failure, or once the attempt budget
/// is spent. Cancellation wins over any failure observed so far.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy<E>,
    cancel: &CancellationToken,
    observer: &dyn RetryObserver<E>,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut backoff = policy.backoff.clone();
    backoff.reset();
    let max_attempts = policy.max_attempts();
    let mut attempt: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        attempt += 1;

        let result = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            result = operation() => result,
        };

        let error = match result {
            Ok(value) => {
                debug!("Attempt {}/{} succeeded", attempt, max_attempts);
                return Ok(value);
            }
            Err(e) => e,
        };

        if !policy.is_retryable(&error) {
            debug!("Attempt {}/{} failed permanently", attempt, max_attempts);
            return Err(RetryError::Inner(error));
        }
        if attempt >= max_attempts {
            debug!("Attempt budget of {} exhausted", max_attempts);
            return Err(RetryError::Inner(error));
        }

        let delay = backoff.next_delay();
        observer.on_retry(&error, delay);

        tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
