//! Bounded retry with exponential backoff for transiently busy resources.

use crate::bundler::error::{Error, Result};
use std::{future::Future, time::Duration};

/// How often and how patiently a busy resource is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    /// Delay after the first busy attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Policy that retries `attempts` times without sleeping.
    pub const fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay after the given 1-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Outcome of one attempt at a busy-prone operation.
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    /// Resource reported busy; the reason is kept for the final error.
    Busy(String),
}

/// Runs `op` until it completes, fails, or stays busy for every attempt.
///
/// `op` receives the 1-based attempt number. Exhaustion yields
/// [`Error::ResourceBusy`] naming `resource`.
pub async fn retry_while_busy<T, F, Fut>(policy: &RetryPolicy, resource: &str, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Attempt<T>>>,
{
    let attempts = policy.attempts.max(1);
    let mut last_reason = String::new();

    for attempt in 1..=attempts {
        match op(attempt).await? {
            Attempt::Done(value) => return Ok(value),
            Attempt::Busy(reason) => {
                log::warn!(
                    "{} busy (attempt {}/{}): {}",
                    resource,
                    attempt,
                    attempts,
                    reason
                );
                last_reason = reason;
                if attempt < attempts {
                    tokio::time::sleep(policy.delay_for(attempt)).await;
                }
            }
        }
    }

    Err(Error::ResourceBusy {
        resource: resource.to_string(),
        attempts,
        reason: last_reason,
    })
}
