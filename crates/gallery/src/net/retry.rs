//! # Retry Policy
//!
//! Bounded exponential backoff that suspends while the device is offline.
//! Waiting for connectivity does not consume attempts.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{GalleryError, Result};
use crate::net::reachability::ConnectivityGate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled for every following one
    pub base_delay: Duration,
    /// Upper bound for a single delay
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: None,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// `base_delay * 2^(attempt - 1)` for the 1-based `attempt` that just failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.base_delay.saturating_mul(factor);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

/// Runs fallible operations under a [`RetryPolicy`], gated on connectivity.
#[derive(Clone)]
pub struct Retrier {
    policy: RetryPolicy,
    gate: Arc<ConnectivityGate>,
}

impl Retrier {
    pub fn new(policy: RetryPolicy, gate: Arc<ConnectivityGate>) -> Self {
        Self { policy, gate }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn gate(&self) -> &Arc<ConnectivityGate> {
        &self.gate
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or exhausts the policy. The last underlying error is returned on exhaustion.
    ///
    /// `operation` receives the 1-based attempt number. Cancelling `cancel`
    /// aborts the in-flight attempt, any backoff delay and any connectivity
    /// wait, and yields [`GalleryError::Cancelled`].
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GalleryError::Cancelled),
                outcome = operation(attempt) => outcome,
            };

            let error = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = label, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !error.is_retryable() {
                return Err(error);
            }
            if attempt > self.policy.max_retries {
                warn!(
                    operation = label,
                    attempts = attempt,
                    error = %error,
                    "Retries exhausted"
                );
                return Err(error);
            }

            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GalleryError::Cancelled),
                status = self.gate.refresh_status() => status,
            };
            if !status.is_connected() {
                warn!(
                    operation = label,
                    attempt,
                    status = ?status,
                    "Offline, waiting for connectivity before retrying"
                );
                self.gate.wait_until_connected(cancel).await?;
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                operation = label,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Attempt failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GalleryError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
