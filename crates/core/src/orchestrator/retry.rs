//! Retry delays for rate-limited and transient fetches.

use std::time::Duration;

/// A bounded retry schedule with precomputed delays.
///
/// Delay `i` (0-based) is `base * 2^i`, capped at `max`. A provider-supplied
/// retry-after hint raises the delay but is also capped at `max`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    delays: Vec<Duration>,
    max: Duration,
}

impl BackoffPolicy {
    pub fn exponential(max_retries: u32, base: Duration, max: Duration) -> Self {
        let delays = (0..max_retries)
            .map(|i| {
                let factor = 2u32.saturating_pow(i);
                base.saturating_mul(factor).min(max)
            })
            .collect();
        Self { delays, max }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self {
            delays: Vec::new(),
            max: Duration::ZERO,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.delays.len() as u32
    }

    /// Delay before retry number `retry` (0-based), or `None` once retries
    /// are exhausted.
    pub fn delay(&self, retry: u32, retry_after_ms: Option<u64>) -> Option<Duration> {
        let scheduled = *self.delays.get(retry as usize)?;
        let hinted = retry_after_ms
            .map(|ms| Duration::from_millis(ms).min(self.max))
            .unwrap_or(Duration::ZERO);
        Some(scheduled.max(hinted))
    }
}
