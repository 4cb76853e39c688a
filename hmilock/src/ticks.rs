//! The tick counter, the only time base of the HMI.
//!
//! The tick source's callback increments it; the door sequencer and the lockout guard wait on
//! it and reset it between phases. Increments and resets take the same lock, so a reset never
//! races an in-flight increment.

use hmilock_hal::timer::TickCallback;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct Ticks {
    count: u32,
    /// Last count a waiter looked at.
    observed: u32,
}

#[derive(Debug, Default)]
struct Shared {
    ticks: Mutex<Ticks>,
    changed: Condvar,
}

/// Shared handle to the tick count. Clones refer to the same counter.
#[derive(Clone, Debug, Default)]
pub struct TickCounter {
    shared: Arc<Shared>,
}

impl TickCounter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Ticks> {
        // The counter holds no invariant a panicking holder could break.
        self.shared.ticks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Advances the count by one tick.
    pub fn tick(&self) {
        let mut ticks = self.lock();
        ticks.count = ticks.count.wrapping_add(1);
        self.shared.changed.notify_all();
    }

    pub fn get(&self) -> u32 {
        self.lock().count
    }

    /// Sets the count back to zero.
    pub fn reset(&self) {
        let mut ticks = self.lock();
        *ticks = Ticks::default();
        self.shared.changed.notify_all();
    }

    /// Creates the callback to hand to a tick source.
    pub fn callback(&self) -> TickCallback {
        let counter = self.clone();
        Box::new(move || counter.tick())
    }

    /// Blocks until `done` accepts the current count, then returns that count.
    ///
    /// There is no timeout: if the tick source stops or never reaches an accepted value, this
    /// waits forever.
    pub fn wait_until(&self, mut done: impl FnMut(u32) -> bool) -> u32 {
        let mut ticks = self.lock();
        loop {
            ticks.observed = ticks.count;
            self.shared.changed.notify_all();
            if done(ticks.count) {
                return ticks.count;
            }
            ticks = self
                .shared
                .changed
                .wait(ticks)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocks until a waiter has seen the current count, or `stop` is raised.
    ///
    /// Lets a simulated tick source advance in lock-step with [Self::wait_until], so every
    /// value is observed exactly once. Returns `false` when stopped.
    pub fn await_observed(&self, stop: &AtomicBool) -> bool {
        const STOP_POLL: Duration = Duration::from_millis(5);

        let mut ticks = self.lock();
        loop {
            if stop.load(Ordering::Acquire) {
                return false;
            }
            if ticks.observed == ticks.count {
                return true;
            }
            ticks = self
                .shared
                .changed
                .wait_timeout(ticks, STOP_POLL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}
