//! Bounded retry with exponential backoff
//!
//! Used for ledger address resolution and the startup connection bootstrap.
//! Policies are values handed to the code that retries, never constants
//! inside it.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            multiplier: 2,
            max_delay: Duration::from_secs(30),
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier.max(1);
        self
    }

    /// Single attempt, no sleeping.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Hostname resolution: 3 attempts, 100ms doubling.
    pub fn resolution() -> Self {
        Self::new(3, Duration::from_millis(100)).with_max_delay(Duration::from_secs(1))
    }

    /// Initial ledger connection: 10 attempts, 500ms doubling up to 5s.
    pub fn bootstrap() -> Self {
        Self::new(10, Duration::from_millis(500)).with_max_delay(Duration::from_secs(5))
    }

    /// Delay slept after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.saturating_pow(exponent);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `operation` until it succeeds or the attempts are exhausted.
    ///
    /// The closure receives the 1-based attempt number. The last error is
    /// returned unchanged.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::bootstrap()
    }
}
