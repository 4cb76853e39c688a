//! Periodic tick sources.

use crate::{HalError, HalResult};
use log::debug;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Callback invoked once per tick. It must return quickly.
pub type TickCallback = Box<dyn FnMut() + Send>;

pub trait TickSource: Debug {
    /// Starts calling `callback` once every `interval`.
    ///
    /// Starting a running source restarts it with the new callback.
    fn start(&mut self, interval: Duration, callback: TickCallback) -> HalResult<()>;

    /// Stops the source. No callback runs after this returns.
    fn stop(&mut self) -> HalResult<()>;

    fn is_running(&self) -> bool;
}

/// Tick source backed by a thread that sleeps towards fixed deadlines, so a slow callback
/// does not shift later ticks.
#[derive(Default)]
pub struct ThreadTicker {
    worker: Option<(Arc<AtomicBool>, JoinHandle<()>)>,
}

impl ThreadTicker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Debug for ThreadTicker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ThreadTicker(running: {})", self.is_running())
    }
}

impl TickSource for ThreadTicker {
    fn start(&mut self, interval: Duration, mut callback: TickCallback) -> HalResult<()> {
        if interval.is_zero() {
            return Err(HalError::InvalidArgument);
        }
        self.stop()?;

        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();
        let handle = thread::Builder::new()
            .name("tick".into())
            .spawn(move || {
                let mut deadline = Instant::now() + interval;
                loop {
                    let now = Instant::now();
                    if now < deadline {
                        thread::park_timeout(deadline - now);
                    }
                    if flag.load(Ordering::Acquire) {
                        break;
                    }
                    if Instant::now() >= deadline {
                        callback();
                        deadline += interval;
                    }
                }
            })?;

        debug!("Tick source started, interval {:?}.", interval);
        self.worker = Some((stopped, handle));
        Ok(())
    }

    fn stop(&mut self) -> HalResult<()> {
        if let Some((stopped, handle)) = self.worker.take() {
            stopped.store(true, Ordering::Release);
            handle.thread().unpark();
            handle
                .join()
                .map_err(|_| HalError::Other("tick thread panicked".to_string()))?;
            debug!("Tick source stopped.");
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for ThreadTicker {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn ticks_until_stopped() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let mut ticker = ThreadTicker::new();

        ticker
            .start(Duration::from_millis(2), Box::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }))
            .expect("start");
        let deadline = Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::Relaxed) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        ticker.stop().expect("stop");
        let after_stop = count.load(Ordering::Relaxed);

        assert!(after_stop >= 3);
        assert!(!ticker.is_running());
        thread::sleep(Duration::from_millis(10));
        assert_eq!(count.load(Ordering::Relaxed), after_stop);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut ticker = ThreadTicker::new();
        let result = ticker.start(Duration::ZERO, Box::new(|| {}));
        assert_eq!(result, Err(HalError::InvalidArgument));
    }
}
