//! Retry with jittered delay.
//!
//! [`RetryPolicy`] re-runs a fallible async operation until it succeeds,
//! hits a non-transient error, or runs out of attempts. Each wait is drawn
//! uniformly from the configured delay range so that many concurrent
//! callers do not hammer a remote service in lockstep.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use glean_core::RetryPolicy;
//!
//! let policy = RetryPolicy::default()
//!     .with_max_attempts(5)
//!     .with_delay_range(Duration::from_millis(200), Duration::from_secs(2));
//! assert_eq!(policy.max_attempts, 5);
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{GleanError, Result};

/// Attempt bound and delay range for retried operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first one.
    pub max_attempts: usize,
    /// Shortest wait between attempts.
    #[serde(with = "secs")]
    pub min_delay: Duration,
    /// Longest wait between attempts.
    #[serde(with = "secs")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 10, min_delay: Duration::from_secs(1), max_delay: Duration::from_secs(10) }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy with `max_attempts` attempts and no delay between them.
    pub fn immediate(max_attempts: usize) -> Self {
        Self { max_attempts, min_delay: Duration::ZERO, max_delay: Duration::ZERO }
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the delay range; each wait is drawn uniformly from `min..=max`.
    #[must_use]
    pub fn with_delay_range(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min;
        self.max_delay = max;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(GleanError::ConfigError("max_attempts must be at least 1".to_string()));
        }
        if self.min_delay > self.max_delay {
            return Err(GleanError::ConfigError(format!(
                "retry delay range is empty ({:?} > {:?})",
                self.min_delay, self.max_delay
            )));
        }
        Ok(())
    }

    /// Draws the wait before the next attempt.
    pub fn jitter(&self) -> Duration {
        if self.min_delay >= self.max_delay {
            return self.min_delay;
        }
        rand::thread_rng().gen_range(self.min_delay..=self.max_delay)
    }

    /// Runs `op` until it succeeds or the policy gives up.
    ///
    /// Only [transient](GleanError::is_transient) errors are retried. The
    /// error of the last attempt is returned exactly as `op` produced it.
    /// The attempt counter lives on this call's stack, so concurrent calls
    /// sharing one policy never interfere.
    ///
    /// # Errors
    ///
    /// Returns [`GleanError::ConfigError`] before running `op` if the policy
    /// allows zero attempts or its delay range is inverted.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.validate()?;

        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.jitter();
                    tracing::warn!(attempt, max_attempts = self.max_attempts, ?delay, error = %err, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        tracing::error!(attempts = attempt, error = %err, "giving up");
                    }
                    return Err(err);
                }
            }
        }
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
