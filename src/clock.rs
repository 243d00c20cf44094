//! Time source abstraction.
//!
//! The scheduler never reads wall-clock time directly; every delay decision
//! goes through a [`TickClock`] so that tests can drive delayed tasks with a
//! [`testing::ManualClock`](crate::testing::ManualClock) instead of sleeping.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A 64-bit signed monotonic tick, in microseconds. Never moves backward.
pub type Tick = i64;

/// A monotonic time source.
///
/// Implementations must never return a value smaller than a previously
/// returned value (monotonic), and are read only from the thread that calls
/// them - the scheduler itself only reads the clock while posting delayed
/// tasks or evaluating delayed-task expiry.
pub trait TickClock: Send + Sync {
    /// Returns the current tick.
    fn now(&self) -> Tick;
}

impl<T: TickClock + ?Sized> TickClock for Arc<T> {
    fn now(&self) -> Tick {
        (**self).now()
    }
}

/// A [`TickClock`] backed by [`std::time::Instant`], for production use.
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    /// Creates a clock whose epoch is the moment of construction.
    pub fn new() -> Self {
        SystemClock {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock::new()
    }
}

impl TickClock for SystemClock {
    fn now(&self) -> Tick {
        self.epoch.elapsed().as_micros() as Tick
    }
}

/// A clock whose value is set explicitly by the test, used to exercise
/// delayed-task semantics deterministically (spec scenario: delayed
/// ordering).
#[derive(Clone)]
pub struct ManualClock {
    ticks: Arc<AtomicI64>,
}

impl ManualClock {
    /// Creates a manual clock starting at tick 0.
    pub fn new() -> Self {
        ManualClock {
            ticks: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Sets the clock to an absolute tick. Panics if this would move the
    /// clock backward, since [`TickClock`] is documented as monotonic.
    pub fn set(&self, tick: Tick) {
        let prev = self.ticks.swap(tick, Ordering::SeqCst);
        assert!(
            tick >= prev,
            "ManualClock may not move backward: {} -> {}",
            prev,
            tick
        );
    }

    /// Advances the clock by `delta` ticks (microseconds). `delta` must be
    /// non-negative.
    pub fn advance(&self, delta: Tick) {
        assert!(delta >= 0, "ManualClock can only advance forward");
        self.ticks.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        ManualClock::new()
    }
}

impl TickClock for ManualClock {
    fn now(&self) -> Tick {
        self.ticks.load(Ordering::SeqCst)
    }
}
