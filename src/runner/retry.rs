use crate::config::RetryConfig;
use std::time::Duration;

/// Whole-attempt retry budget for one triage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    retry_count: u32,
    max_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Start a fresh attempt from the first run
    Restart,
    /// Budget spent; the triage ends unresolved
    Exhausted,
}

impl RetryState {
    pub fn new(max_retries: u32) -> Self {
        Self {
            retry_count: 0,
            max_retries,
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Count one infrastructure anomaly. The count never exceeds the cap.
    pub fn record_retry(&mut self) -> RetryDecision {
        self.retry_count = (self.retry_count + 1).min(self.max_retries);
        if self.retry_count < self.max_retries {
            RetryDecision::Restart
        } else {
            RetryDecision::Exhausted
        }
    }

    /// Jittered exponential backoff before the next attempt:
    /// base * 2^(retries - 1) + random(0..base)
    pub fn backoff(&self, config: &RetryConfig) -> Duration {
        let base = config.backoff_base_ms;
        if base == 0 {
            return Duration::ZERO;
        }
        let exponent = self.retry_count.saturating_sub(1).min(16);
        let jitter = rand::random::<u64>() % base;
        Duration::from_millis(base.saturating_mul(1 << exponent).saturating_add(jitter))
    }
}
