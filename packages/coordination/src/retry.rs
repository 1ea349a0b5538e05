//! Capped exponential backoff with jitter for transient coordination errors.

use std::future::Future;
use std::time::Duration;

use rand::random;
use tokio::time::sleep;
use tracing::warn;

use crate::error::CoordError;

const INITIAL_RETRY_DELAY_MS: u64 = 50;
const MAX_RETRY_DELAY_MS: u64 = 2_000;
const RETRY_DELAY_MULTIPLIER: f64 = 2.0;
const JITTER_PERCENT: f64 = 0.2;

/// Delay before retry number `attempt` (1-based).
pub fn retry_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16) as i32;
    let base_delay = INITIAL_RETRY_DELAY_MS as f64 * RETRY_DELAY_MULTIPLIER.powi(exponent);
    let capped_delay = base_delay.min(MAX_RETRY_DELAY_MS as f64);

    let jitter_range = capped_delay * JITTER_PERCENT;
    let jitter = (random::<f64>() * 2.0 - 1.0) * jitter_range;
    let final_delay = (capped_delay + jitter).max(1.0);

    Duration::from_millis(final_delay as u64)
}

/// Runs `op` until it succeeds or fails with a non-transient error.
/// Transient failures are retried unboundedly with the same inputs.
pub async fn retry_transient<T, F, Fut>(what: &str, mut op: F) -> Result<T, CoordError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoordError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Err(e) if e.is_transient() => {
                let delay = retry_delay(attempt);
                warn!(
                    error = %e,
                    attempt,
                    retry_delay_ms = delay.as_millis() as u64,
                    operation = what,
                    "transient coordination error, retrying"
                );
                sleep(delay).await;
            }
            outcome => return outcome,
        }
    }
}
