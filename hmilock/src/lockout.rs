//! Consequences of wrong passwords.

use crate::config::LockoutConfig;
use crate::error::HmiResult;
use crate::screen::Screen;
use crate::ticks::TickCounter;
use hmilock_hal::timer::TickSource;
use log::warn;
use std::thread::sleep;
use std::time::Duration;
use time::OffsetDateTime;

/// Consecutive failed verifications.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MistakeCounter(u32);

impl MistakeCounter {
    pub fn increment(&mut self) -> u32 {
        self.0 = self.0.saturating_add(1);
        self.0
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MistakeOutcome {
    /// Below the threshold; `mistakes` so far.
    Warned { mistakes: u32 },
    /// The threshold was hit and the warning has been served.
    LockedOut,
}

#[derive(Clone, Debug)]
pub struct LockoutGuard {
    config: LockoutConfig,
    interval: Duration,
    presentation: Duration,
}

impl LockoutGuard {
    pub fn new(config: LockoutConfig, interval: Duration, presentation: Duration) -> Self {
        LockoutGuard { config, interval, presentation }
    }

    /// Counts a wrong password. On reaching the limit, blocks for the warning period and
    /// then starts counting again from zero.
    pub fn record_mistake(
        &self,
        mistakes: &mut MistakeCounter,
        ticks: &TickCounter,
        ticker: &mut dyn TickSource,
        screen: &mut dyn Screen,
    ) -> HmiResult<MistakeOutcome> {
        let count = mistakes.increment();
        warn!("Wrong password ({}/{}).", count, self.config.max_mistakes);
        screen.show(" Wrong Password ")?;
        sleep(self.presentation);

        if count < self.config.max_mistakes {
            screen.clear()?;
            return Ok(MistakeOutcome::Warned { mistakes: count });
        }

        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        warn!("Too many wrong passwords, locking out at {}.", now);

        ticks.reset();
        ticker.start(self.interval, ticks.callback())?;
        let shown = screen.show("!!! WARNING !!!");
        if shown.is_ok() {
            let (duration, completion) = (self.config.warning_ticks, self.config.completion);
            ticks.wait_until(|count| completion.is_complete(count, duration));
        }
        let stopped = ticker.stop();
        mistakes.reset();
        ticks.reset();

        shown?;
        stopped?;
        screen.clear()?;
        Ok(MistakeOutcome::LockedOut)
    }
}
