//! Bounded exponential-backoff retry.
//!
//! One helper drives every attempt, first try included, so the first
//! attempt and the retries cannot drift apart.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Retry policy for transient failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay between retries in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Backoff multiplier (delay *= multiplier after each retry)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    10000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// Calculate delay after a failed attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::from_millis(self.initial_delay_ms.min(self.max_delay_ms));
        }

        let delay = self.initial_delay_ms as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);

        let capped = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }
}

/// Progress of one retried call; discarded when the call returns.
/// The last error travels in [`RetryError::Exhausted`].
#[derive(Debug, Default)]
pub struct RetryState {
    /// Attempts made so far
    pub attempt: u32,
    /// Delay before the next attempt
    pub next_delay: Duration,
}

/// Why a retried call gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed with a transient error
    Exhausted { attempts: u32, last: E },

    /// A non-transient error ended the loop early
    Permanent { attempt: u32, error: E },
}

/// Run `operation` until it succeeds, fails permanently, or the policy
/// runs out of attempts. The closure receives the 1-indexed attempt number.
pub async fn retry_with_backoff<T, E, Op, Fut, P>(
    policy: &RetryPolicy,
    is_transient: P,
    mut operation: Op,
) -> Result<T, RetryError<E>>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut state = RetryState::default();

    loop {
        state.attempt += 1;

        match operation(state.attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if !is_transient(&error) => {
                return Err(RetryError::Permanent {
                    attempt: state.attempt,
                    error,
                });
            }
            Err(error) => {
                if state.attempt >= max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: state.attempt,
                        last: error,
                    });
                }

                state.next_delay = policy.delay_for_attempt(state.attempt);
                warn!(
                    attempt = state.attempt,
                    max_attempts,
                    delay_ms = state.next_delay.as_millis() as u64,
                    error = %error,
                    "Transient failure, retrying"
                );

                tokio::time::sleep(state.next_delay).await;
            }
        }
    }
}
