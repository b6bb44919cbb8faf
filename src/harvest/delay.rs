//! Randomized waits between page visits

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Produces the wait before the next page visit
///
/// Shared by all workers, so implementations must be safe for concurrent use.
pub trait DelayPolicy: Send + Sync {
    fn next_delay(&self) -> Duration;
}

/// Uniformly random delay within `[min, max]`
#[derive(Debug, Clone)]
pub struct RandomDelay {
    min: Duration,
    max: Duration,
}

impl RandomDelay {
    /// Creates a policy; bounds given in the wrong order are swapped
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }
}

impl DelayPolicy for RandomDelay {
    fn next_delay(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if min == max {
            return self.min;
        }
        Duration::from_millis(rand::random_range(min..=max))
    }
}

/// Replays a fixed sequence of delays, cycling when it runs out
#[derive(Debug)]
pub struct FixedSequenceDelay {
    delays: Vec<Duration>,
    cursor: AtomicUsize,
}

impl FixedSequenceDelay {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self {
            delays,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl DelayPolicy for FixedSequenceDelay {
    fn next_delay(&self) -> Duration {
        if self.delays.is_empty() {
            return Duration::ZERO;
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.delays[i % self.delays.len()]
    }
}

/// Never waits
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl DelayPolicy for NoDelay {
    fn next_delay(&self) -> Duration {
        Duration::ZERO
    }
}
