//! Bounded retry with exponential backoff for the write boundary.
//!
//! Only `CoreError::TransientStore` is retried; business-rule errors
//! (validation, not-found, terminal state) surface immediately. Full jitter
//! keeps concurrent clients from retrying in lockstep.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use cadence_core::error::CoreError;

/// Retry budget for one store operation.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    /// Total attempts, including the first (default 4).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl BackoffConfig {
    /// Exponential delay for the given zero-based retry, with full jitter.
    fn delay_for(&self, retry: u32) -> Duration {
        let exp = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_delay);
        let jittered = rand::rng().random_range(0..=exp.as_millis() as u64);
        Duration::from_millis(jittered)
    }
}

/// Run `op` until it succeeds, fails non-transiently, or the budget runs out.
///
/// On exhaustion the last transient error is returned; the caller decides
/// whether that is fatal (series writes roll back) or merely logged
/// (fire-and-forget sync writes).
pub async fn with_backoff<T, F, Fut>(
    label: &'static str,
    config: BackoffConfig,
    mut op: F,
) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < config.max_attempts => {
                let delay = config.delay_for(attempt);
                tracing::warn!(
                    op = label,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient store failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
