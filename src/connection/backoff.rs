//! Exponential backoff with jitter for reconnect and retry loops

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    current_attempt: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
}

impl ExponentialBackoff {
    pub fn new(initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            current_attempt: 0,
            initial_backoff_ms,
            max_backoff_ms,
        }
    }

    /// Next backoff duration with ±20% jitter
    pub fn next_backoff(&mut self) -> Duration {
        // Exponent is capped so the shift cannot overflow before the max
        // bound takes over.
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(self.current_attempt.min(16)))
            .min(self.max_backoff_ms);

        self.current_attempt += 1;

        let jitter = (backoff_ms / 5) as i64;
        let jitter_amount = if jitter > 0 {
            fastrand::i64(-jitter..=jitter)
        } else {
            0
        };
        let final_backoff = (backoff_ms as i64 + jitter_amount).max(0) as u64;

        Duration::from_millis(final_backoff)
    }

    /// Reset to the initial state after a success
    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.current_attempt
    }
}
