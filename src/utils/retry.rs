use std::{future::Future, time::Duration};

use tokio::time;
use tracing::warn;

use crate::error::GenErr;

/// Exponential backoff with a linear jitter term:
/// attempt `n` waits `min(base * 2^n, cap) + step * n`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base:     Duration,
    pub cap:      Duration,
    pub step:     Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            base:     Duration::from_secs(1),
            cap:      Duration::from_secs(10),
            step:     Duration::from_millis(100),
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base.saturating_mul(2u32.saturating_pow(attempt));
        exp.min(self.cap) + self.step * attempt
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or the
/// attempt budget is spent.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, stage: &'static str, mut op: F) -> Result<T, GenErr>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GenErr>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) if attempt >= policy.attempts => {
                return Err(GenErr::Exhausted { stage, attempts: attempt, last: Box::new(e) });
            }
            Err(e) => {
                let wait = policy.delay_for(attempt);
                warn!("{stage} attempt {attempt} failed: {e}; retrying in {wait:?}");
                time::sleep(wait).await;
                attempt += 1;
            }
        }
    }
}
