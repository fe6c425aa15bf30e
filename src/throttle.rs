//! Per-subsystem probe gating.

use std::time::{Duration, Instant};

/// Minimum-interval gate for one subsystem's probe.
///
/// The sampler is polled at a single outer cadence, but some probes are too
/// expensive to issue that often (hardware registry traversal, controller
/// IPC). Each subsystem owns one `Throttle`: the probe runs only when
/// [`is_due`](Throttle::is_due) says so, and [`mark`](Throttle::mark) records
/// the attempt.
#[derive(Debug, Clone)]
pub struct Throttle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    /// Gate with the given minimum spacing. `Duration::ZERO` never blocks.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// True on the first call ever, and whenever `min_interval` has elapsed
    /// since the last [`mark`](Throttle::mark).
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last {
            None => true,
            Some(last) => now.duration_since(last) >= self.min_interval,
        }
    }

    /// Record a probe attempt. Call only when the owning subsystem actually
    /// re-probed.
    pub fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}
