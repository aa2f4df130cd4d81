//! Retry strategies and predicates for transient failures.
//!
//! Retries only ever apply to read-only endpoints (file list, file info,
//! download, user list). Mutating calls are sent exactly once. When retries
//! run out the last failure is returned as the operation's outcome.

use crate::Error;
use rand::Rng;
use std::time::Duration;

/// How long to wait between attempts, and how many attempts to make.
///
/// # Examples
///
/// ```
/// use filexchange::RetryStrategy;
/// use std::time::Duration;
///
/// // 200ms, 400ms, 800ms, then give up
/// let backoff = RetryStrategy::ExponentialBackoff {
///     initial_delay: Duration::from_millis(200),
///     max_delay: Duration::from_secs(5),
///     max_retries: 3,
///     jitter: false,
/// };
/// assert_eq!(backoff.delay_for_attempt(3), Some(Duration::from_millis(800)));
/// assert_eq!(backoff.delay_for_attempt(4), None);
/// ```
#[derive(Debug, Clone, Default)]
pub enum RetryStrategy {
    /// Send once.
    #[default]
    None,

    /// Double the delay after every failed attempt, capped at `max_delay`.
    ExponentialBackoff {
        initial_delay: Duration,
        max_delay: Duration,
        max_retries: usize,
        /// Scale each delay by a random factor in `[0.5, 1.0]`.
        jitter: bool,
    },

    /// Wait the same amount before every retry.
    Linear { delay: Duration, max_retries: usize },

    /// Delay chosen by a function of the 1-indexed attempt number; `None`
    /// stops retrying.
    Custom {
        delay_fn: fn(attempt: usize) -> Option<Duration>,
    },
}

impl RetryStrategy {
    /// The delay before retrying after failed attempt number `attempt`
    /// (1-indexed), or `None` when no retries remain.
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        match self {
            RetryStrategy::None => None,
            RetryStrategy::ExponentialBackoff {
                initial_delay,
                max_delay,
                max_retries,
                jitter,
            } => {
                if attempt > *max_retries {
                    return None;
                }
                let exponent = attempt.saturating_sub(1).min(31) as u32;
                let delay = initial_delay
                    .saturating_mul(1u32 << exponent)
                    .min(*max_delay);
                if *jitter {
                    Some(delay.mul_f64(rand::thread_rng().gen_range(0.5..=1.0)))
                } else {
                    Some(delay)
                }
            }
            RetryStrategy::Linear { delay, max_retries } => {
                (attempt <= *max_retries).then_some(*delay)
            }
            RetryStrategy::Custom { delay_fn } => delay_fn(attempt),
        }
    }

    /// The retry budget, if it is fixed.
    pub fn max_retries(&self) -> Option<usize> {
        match self {
            RetryStrategy::None => Some(0),
            RetryStrategy::ExponentialBackoff { max_retries, .. }
            | RetryStrategy::Linear { max_retries, .. } => Some(*max_retries),
            RetryStrategy::Custom { .. } => None,
        }
    }
}

/// Decides whether a failed read should be attempted again.
///
/// # Examples
///
/// ```
/// use filexchange::{Error, RetryPredicate};
///
/// struct RetryOnUnavailable;
///
/// impl RetryPredicate for RetryOnUnavailable {
///     fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
///         error.status_code() == 503
///     }
/// }
/// ```
pub trait RetryPredicate: Send + Sync {
    /// `attempt` is the 1-indexed number of the attempt that just failed.
    fn should_retry(&self, error: &Error, attempt: usize) -> bool;
}

/// Retries whatever [`Error::is_retryable`] accepts. The default.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnRetryable;

impl RetryPredicate for RetryOnRetryable {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        error.is_retryable()
    }
}

/// Retries 5xx responses only.
#[derive(Debug, Clone, Copy)]
pub struct RetryOn5xx;

impl RetryPredicate for RetryOn5xx {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        matches!(error, Error::Application { status, .. } if status.is_server_error())
    }
}

/// Retries timeouts only.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnTimeout;

impl RetryPredicate for RetryOnTimeout {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        matches!(error, Error::Timeout)
    }
}

/// Retries connection-level failures only.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnConnectionError;

impl RetryPredicate for RetryOnConnectionError {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        matches!(error, Error::Network(_))
    }
}

/// Retries when any inner predicate agrees.
///
/// ```
/// use filexchange::retry::{OrPredicate, RetryOn5xx, RetryOnTimeout};
///
/// let predicate = OrPredicate::new(vec![Box::new(RetryOn5xx), Box::new(RetryOnTimeout)]);
/// ```
pub struct OrPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl OrPredicate {
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for OrPredicate {
    fn should_retry(&self, error: &Error, attempt: usize) -> bool {
        self.predicates
            .iter()
            .any(|p| p.should_retry(error, attempt))
    }
}

/// Retries only when every inner predicate agrees.
pub struct AndPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl AndPredicate {
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for AndPredicate {
    fn should_retry(&self, error: &Error, attempt: usize) -> bool {
        self.predicates
            .iter()
            .all(|p| p.should_retry(error, attempt))
    }
}
