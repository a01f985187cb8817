//! # Bounded Retry
//!
//! Re-runs an async operation while its error is classified retryable and the
//! attempt budget lasts, sleeping per [`BackoffConfig`] between attempts.

use std::future::Future;
use tracing::{debug, warn};

use crate::config::BackoffConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    component: String,
    config: BackoffConfig,
}

impl RetryPolicy {
    pub fn new(component: impl Into<String>, config: BackoffConfig) -> Self {
        Self {
            component: component.into(),
            config,
        }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Run `operation` (given the 1-based attempt number) until it succeeds,
    /// fails with a non-retryable error, or the budget is spent.
    pub async fn execute<F, Fut, T, E, R>(&self, mut operation: F, is_retryable: R) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(component = %self.component, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt < max_attempts && is_retryable(&err) => {
                    let delay = self.config.delay_for_attempt(attempt);
                    warn!(
                        component = %self.component,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retryable failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
