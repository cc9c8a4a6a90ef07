//! Drop-not-queue rate limiting for stroke events.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Minimum gap between two accepted stroke tones.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(50);

/// Monotonic time source.
pub trait Clock {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;
}

/// Wall clock measured from construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_millis(&self, ms: u64) {
        self.now.set(Duration::from_millis(ms));
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Accepts an event only if `interval` has passed since the last accepted one.
///
/// Rejected events are dropped, never deferred, and do not push the window
/// forward.
#[derive(Debug)]
pub struct RateLimiter<C: Clock> {
    clock: C,
    interval: Duration,
    last_accepted: Option<Duration>,
}

impl<C: Clock> RateLimiter<C> {
    pub fn new(clock: C, interval: Duration) -> Self {
        Self {
            clock,
            interval,
            last_accepted: None,
        }
    }

    pub fn with_default_interval(clock: C) -> Self {
        Self::new(clock, DEFAULT_INTERVAL)
    }

    /// Check the clock and accept or drop.
    pub fn try_acquire(&mut self) -> bool {
        let now = self.clock.now();
        self.accept_at(now)
    }

    /// Accept or drop an event at an explicit time.
    pub fn accept_at(&mut self, now: Duration) -> bool {
        match self.last_accepted {
            Some(last) if now.saturating_sub(last) < self.interval => false,
            _ => {
                self.last_accepted = Some(now);
                true
            }
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Forget the last accepted event.
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }
}
