// Bounded retry with exponential backoff
// Callers classify each attempt explicitly instead of relying on error types


use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, warn};

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const EXPONENTIAL_BACKOFF_BASE: u32 = 2;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Outcome of a single call to an external service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Success(T),
    /// The call may succeed if repeated (timeouts, rate limits, 5xx)
    Transient(String),
    /// Repeating the call cannot help (bad request, unknown model, malformed response)
    Terminal(String),
}

impl<T> Attempt<T> {
    /// Classify a transport or status failure reported by `ureq`
    #[inline]
    pub fn from_ureq_error(error: &ureq::Error) -> Self {
        match error {
            ureq::Error::StatusCode(status) if *status >= 500 || *status == 429 => {
                Self::Transient(format!("Server returned HTTP {}", status))
            }
            ureq::Error::StatusCode(status) => Self::Terminal(format!("Client error: HTTP {}", status)),
            ureq::Error::ConnectionFailed
            | ureq::Error::HostNotFound
            | ureq::Error::Timeout(_)
            | ureq::Error::Io(_) => Self::Transient(format!("Transport error: {}", error)),
            _ => Self::Terminal(format!("Non-retryable error: {}", error)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError {
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
    #[error("{0}")]
    Terminal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    #[inline]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt
    #[inline]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = EXPONENTIAL_BACKOFF_BASE.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Run `call` until it succeeds, fails terminally, or the attempt budget runs out.
    ///
    /// The closure receives the 1-based attempt number.
    #[inline]
    pub fn run<T, F>(&self, mut call: F) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Attempt<T>,
    {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            debug!("Attempt {}/{}", attempt, self.max_attempts);

            match call(attempt) {
                Attempt::Success(value) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(value);
                }
                Attempt::Terminal(reason) => {
                    warn!("Non-retryable failure: {}", reason);
                    return Err(RetryError::Terminal(reason));
                }
                Attempt::Transient(reason) => {
                    warn!(
                        "Transient failure: {}, attempt {}/{}",
                        reason, attempt, self.max_attempts
                    );
                    last_error = reason;

                    if attempt < self.max_attempts {
                        let delay = self.delay_after(attempt);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All {} retry attempts failed", self.max_attempts);
        Err(RetryError::Exhausted {
            attempts: self.max_attempts,
            last_error,
        })
    }
}
