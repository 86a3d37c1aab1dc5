// Retry wrapper with exponential backoff for handshake steps.
//
// A step is retried from scratch only when `WikiError::is_transient` says
// so. Delays start at the base delay and double after every failed
// attempt: 1s, 2s, 4s, 8s with the defaults.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use crate::config::DEFAULT_MAX_RETRIES;
use crate::error::{Result, WikiError};

type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// How many times to attempt a step and how long to wait in between.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    max_attempts: u32,
    base_delay: Duration,
    sleep: Sleeper,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(DEFAULT_MAX_RETRIES, Duration::from_secs(1))
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish()
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            base_delay,
            sleep: Arc::new(std::thread::sleep),
        }
    }

    /// Replace the function used to wait between attempts.
    pub fn with_sleeper(mut self, sleep: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleep = Arc::new(sleep);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `op` until it succeeds, fails permanently, or the budget runs out.
    pub fn run<T>(&self, step: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match op() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(err);
            }

            if attempt >= self.max_attempts {
                error!(step, attempts = self.max_attempts, error = %err, "Failed after {} attempts", self.max_attempts);
                return Err(WikiError::RetriesExhausted {
                    attempts: self.max_attempts,
                    last: Box::new(err),
                });
            }

            let delay = self.delay_for(attempt);
            warn!(
                step,
                attempt,
                delay_secs = delay.as_secs_f64(),
                error = %err,
                "Attempt {attempt} failed with transient error. Retrying in {delay:?}..."
            );
            (self.sleep)(delay);
        }
    }
}
