//! What to tell the broker after a processing attempt.

use std::time::Duration;

use super::ProcessingError;

/// Broker action for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed; remove from the queue.
    Ack,
    /// Ask the broker to redeliver after the delay.
    Retry(Duration),
    /// Publish to the dead-letter queue, then remove from the queue.
    DeadLetter,
    /// Remove from the queue without redelivery.
    Discard,
}

/// Cap on redeliveries and backoff between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeliveryPolicy {
    /// Attempts allowed before a transient failure is treated as poison.
    pub max_deliver: i64,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Poison messages go to the dead-letter queue instead of being discarded.
    pub dead_letter: bool,
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self {
            max_deliver: 5,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            dead_letter: true,
        }
    }
}

impl RedeliveryPolicy {
    /// Decide the fate of a failed attempt. `delivered` starts at 1.
    pub fn decide(&self, error: &ProcessingError, delivered: i64) -> Disposition {
        if error.is_permanent() || delivered >= self.max_deliver {
            self.poison()
        } else {
            Disposition::Retry(self.backoff(delivered))
        }
    }

    /// Exponential delay: `base * 2^(delivered - 1)`, capped.
    pub fn backoff(&self, delivered: i64) -> Duration {
        let exponent = delivered.saturating_sub(1).clamp(0, 20) as u32;
        self.base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    fn poison(&self) -> Disposition {
        if self.dead_letter {
            Disposition::DeadLetter
        } else {
            Disposition::Discard
        }
    }
}
