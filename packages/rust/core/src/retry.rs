//! Bounded retry with exponential backoff, as an explicit state machine.
//!
//! Every call to the generator is classified into an [`Attempt`]. Only transient
//! failures move to [`Attempt::RetryableFailure`]; the loop re-sends the identical
//! request after [`RetryPolicy::backoff_delay`].

use std::future::Future;
use std::time::Duration;

use arxivsummary_generator::GenerationError;
use tracing::warn;

/// Outcome of one attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    Success(T),
    /// Attempt `attempt` (0-based) failed and another one is allowed.
    RetryableFailure { attempt: u32, error: GenerationError },
    /// No further attempts: the limit was hit or the error is permanent.
    Exhausted { attempts: u32, error: GenerationError },
}

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Wait after failed attempt `attempt` (0-based): `base * 2^attempt`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Classify the result of attempt `attempt` (0-based).
    pub fn classify<T>(&self, attempt: u32, result: Result<T, GenerationError>) -> Attempt<T> {
        match result {
            Ok(value) => Attempt::Success(value),
            Err(error) if error.is_transient() && attempt + 1 < self.max_attempts => {
                Attempt::RetryableFailure { attempt, error }
            }
            Err(error) => Attempt::Exhausted {
                attempts: attempt + 1,
                error,
            },
        }
    }

    /// Run `op` until it succeeds, fails permanently, or the attempts run out.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, GenerationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        let mut attempt = 0;
        loop {
            match self.classify(attempt, op().await) {
                Attempt::Success(value) => return Ok(value),
                Attempt::RetryableFailure { attempt: failed, error } => {
                    let delay = self.backoff_delay(failed);
                    warn!(
                        attempt = failed + 1,
                        max = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "generation failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Attempt::Exhausted { attempts, error } => {
                    warn!(attempts, error = %error, "generation gave up");
                    return Err(error);
                }
            }
        }
    }
}
