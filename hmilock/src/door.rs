use crate::config::DoorConfig;
use crate::error::HmiResult;
use crate::screen::Screen;
use crate::ticks::TickCounter;
use hmilock_hal::timer::TickSource;
use log::info;
use std::time::Duration;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DoorPhase {
    Opening,
    Holding,
    Closing,
}

impl DoorPhase {
    /// Phases in the order the door goes through them.
    pub const ALL: [DoorPhase; 3] = [DoorPhase::Opening, DoorPhase::Holding, DoorPhase::Closing];

    pub fn label(self) -> &'static str {
        match self {
            DoorPhase::Opening => "Door is Opening",
            DoorPhase::Holding => "Door is on Hold",
            DoorPhase::Closing => "Door is Closing",
        }
    }
}

/// Runs the timed open/hold/close cycle once a door opening was granted.
#[derive(Clone, Debug)]
pub struct DoorSequencer {
    config: DoorConfig,
    interval: Duration,
}

impl DoorSequencer {
    pub fn new(config: DoorConfig, interval: Duration) -> Self {
        DoorSequencer { config, interval }
    }

    pub fn duration(&self, phase: DoorPhase) -> u32 {
        match phase {
            DoorPhase::Opening => self.config.open_ticks,
            DoorPhase::Holding => self.config.hold_ticks,
            DoorPhase::Closing => self.config.close_ticks,
        }
    }

    /// Runs all phases and returns the number of ticks waited.
    ///
    /// The cycle cannot be interrupted. The tick count is zero when this starts counting and
    /// again when it returns, and the tick source is stopped on every exit path.
    pub fn run(&self, ticks: &TickCounter, ticker: &mut dyn TickSource, screen: &mut dyn Screen) -> HmiResult<u32> {
        ticks.reset();
        ticker.start(self.interval, ticks.callback())?;

        let phases = self.run_phases(ticks, screen);
        let stopped = ticker.stop();
        ticks.reset();

        let total = phases?;
        stopped?;
        screen.clear()?;
        info!("Door cycle done after {} ticks.", total);
        Ok(total)
    }

    fn run_phases(&self, ticks: &TickCounter, screen: &mut dyn Screen) -> HmiResult<u32> {
        let mut total = 0;
        for phase in DoorPhase::ALL {
            let duration = self.duration(phase);
            info!("{}", phase.label());
            screen.show(phase.label())?;
            total += ticks.wait_until(|count| count >= duration);
            ticks.reset();
        }
        Ok(total)
    }
}
