//! Reconnect delay generator

use std::time::Duration;

/// Fibonacci backoff: yields `1, 1, 2, 3, 5, 8, ...` multiples of `unit`.
///
/// Each [`Connector`](crate::Connector) owns one and resets it after every
/// successful dial. The sequence saturates instead of overflowing.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    unit: Duration,
    prev: u64,
    curr: u64,
}

impl FibonacciBackoff {
    /// Start a fresh sequence scaled by `unit`.
    pub fn new(unit: Duration) -> Self {
        Self {
            unit,
            prev: 0,
            curr: 1,
        }
    }

    /// Next multiplier in the sequence.
    fn next_factor(&mut self) -> u64 {
        let factor = self.curr;
        let next = self
            .prev
            .saturating_add(self.curr);
        self.prev = self.curr;
        self.curr = next;
        factor
    }

    /// Delay to wait before the next dial attempt.
    pub fn next_delay(&mut self) -> Duration {
        let factor = self.next_factor();
        self.unit
            .saturating_mul(u32::try_from(factor).unwrap_or(u32::MAX))
    }

    /// Restart from the beginning of the sequence.
    pub fn reset(&mut self) {
        self.prev = 0;
        self.curr = 1;
    }
}

impl Iterator for FibonacciBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}
