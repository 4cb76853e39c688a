//! GPIO backend on top of the Linux GPIO character device, through the `gpiod` crate.
//!
//! Lines are claimed per pin/bus object and released when the object is dropped, so two
//! drivers can never be handed the same line.
use crate::{
    GpioActiveLevel, GpioBias, GpioBus, GpioBusInput, GpioBusOutput, GpioDriveMode, GpioDriver,
    GpioInput, GpioLineConfig, GpioOutput, GpioPin, HalError, HalResult,
};
use bitvec::vec::BitVec;
use log::debug;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::atomic::AtomicU8;

/// GPIO driver for one gpiochip.
pub struct GpiodDriver {
    chip: gpiod::Chip,
    claimed: BitVec<AtomicU8>,
}

impl GpiodDriver {
    pub fn new(chip: gpiod::Chip) -> Self {
        let n = chip.num_lines() as usize;
        Self {
            chip,
            claimed: BitVec::repeat(false, n),
        }
    }

    /// Opens the chip at `path` (usually `/dev/gpiochip0` on a Raspberry Pi).
    pub fn open(path: impl AsRef<Path>) -> HalResult<Self> {
        let chip = gpiod::Chip::new(path.as_ref())?;
        debug!("Opened {} with {} lines.", chip.name(), chip.num_lines());
        Ok(Self::new(chip))
    }

    fn claim<const N: usize>(&self, indices: &[usize; N]) -> HalResult<()> {
        let n = self.count()?;
        if indices.iter().any(|&index| index >= n) {
            return Err(HalError::InvalidArgument);
        }
        if indices.iter().any(|&index| self.claimed[index]) {
            return Err(HalError::AlreadyInUse);
        }
        for &index in indices {
            self.claimed.set_aliased(index, true);
        }
        Ok(())
    }

    fn release(&self, indices: &[usize]) {
        for &index in indices {
            self.claimed.set_aliased(index, false);
        }
    }

    fn request_input<const N: usize>(
        &self,
        indices: &[usize; N],
        config: GpioLineConfig,
    ) -> HalResult<gpiod::Lines<gpiod::Input>> {
        let lines = self.chip.request_lines(
            gpiod::Options::input(indices.map(|index| index as u32))
                .consumer(env!("CARGO_PKG_NAME"))
                .active(config.active_level.into())
                .bias(config.bias.into()),
        )?;
        Ok(lines)
    }

    fn request_output<const N: usize>(
        &self,
        indices: &[usize; N],
        config: GpioLineConfig,
    ) -> HalResult<gpiod::Lines<gpiod::Output>> {
        let lines = self.chip.request_lines(
            gpiod::Options::output(indices.map(|index| index as u32))
                .consumer(env!("CARGO_PKG_NAME"))
                .active(config.active_level.into())
                .bias(config.bias.into())
                .drive(config.drive_mode.into()),
        )?;
        Ok(lines)
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> HalResult<usize> {
        Ok(self.chip.num_lines() as usize)
    }

    fn get_pin(&self, index: usize) -> HalResult<Box<dyn GpioPin + '_>> {
        let bus = self.get_line_set([index])?;
        Ok(Box::new(bus))
    }

    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> HalResult<Box<dyn GpioBus<N> + '_>> {
        let bus = self.get_line_set(indices)?;
        Ok(Box::new(bus))
    }
}

impl GpiodDriver {
    fn get_line_set<const N: usize>(&self, indices: [usize; N]) -> HalResult<GpiodLineSet<'_, N>> {
        self.claim(&indices)?;
        Ok(GpiodLineSet {
            driver: self,
            indices,
            config: GpioLineConfig::default(),
        })
    }
}

impl From<GpioActiveLevel> for gpiod::Active {
    fn from(level: GpioActiveLevel) -> Self {
        match level {
            GpioActiveLevel::High => gpiod::Active::High,
            GpioActiveLevel::Low => gpiod::Active::Low,
        }
    }
}

impl From<GpioBias> for gpiod::Bias {
    fn from(bias: GpioBias) -> Self {
        match bias {
            GpioBias::None => gpiod::Bias::Disable,
            GpioBias::PullUp => gpiod::Bias::PullUp,
            GpioBias::PullDown => gpiod::Bias::PullDown,
        }
    }
}

impl From<GpioDriveMode> for gpiod::Drive {
    fn from(mode: GpioDriveMode) -> Self {
        match mode {
            GpioDriveMode::PushPull => gpiod::Drive::PushPull,
            GpioDriveMode::OpenDrain => gpiod::Drive::OpenDrain,
        }
    }
}

/// A claimed set of lines. A single pin is a set of one.
struct GpiodLineSet<'a, const N: usize> {
    driver: &'a GpiodDriver,
    indices: [usize; N],
    config: GpioLineConfig,
}

impl<const N: usize> Debug for GpiodLineSet<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.driver, self.indices)
    }
}

impl<const N: usize> Drop for GpiodLineSet<'_, N> {
    fn drop(&mut self) {
        self.driver.release(&self.indices);
    }
}

impl GpioPin for GpiodLineSet<'_, 1> {
    fn as_input(&mut self) -> HalResult<Box<dyn GpioInput + '_>> {
        let lines = self.driver.request_input(&self.indices, self.config)?;
        Ok(Box::new(GpiodInput { set: self, lines }))
    }

    fn as_output(&mut self) -> HalResult<Box<dyn GpioOutput + '_>> {
        let lines = self.driver.request_output(&self.indices, self.config)?;
        Ok(Box::new(GpiodOutput { set: self, lines }))
    }

    fn config_mut(&mut self) -> &mut GpioLineConfig {
        &mut self.config
    }
}

impl<const N: usize> GpioBus<N> for GpiodLineSet<'_, N> {
    fn as_input(&mut self) -> HalResult<Box<dyn GpioBusInput<N> + '_>> {
        let lines = self.driver.request_input(&self.indices, self.config)?;
        Ok(Box::new(GpiodInput { set: self, lines }))
    }

    fn as_output(&mut self) -> HalResult<Box<dyn GpioBusOutput<N> + '_>> {
        let lines = self.driver.request_output(&self.indices, self.config)?;
        Ok(Box::new(GpiodOutput { set: self, lines }))
    }

    fn config_mut(&mut self) -> &mut GpioLineConfig {
        &mut self.config
    }
}

struct GpiodInput<'a, const N: usize> {
    set: &'a GpiodLineSet<'a, N>,
    lines: gpiod::Lines<gpiod::Input>,
}

impl<const N: usize> Debug for GpiodInput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[input]", self.set)
    }
}

impl GpioInput for GpiodInput<'_, 1> {
    fn read(&self) -> HalResult<bool> {
        let [value] = self.lines.get_values([false])?;
        Ok(value)
    }
}

impl<const N: usize> GpioBusInput<N> for GpiodInput<'_, N> {
    fn read(&self) -> HalResult<[bool; N]> {
        let values = self.lines.get_values([false; N])?;
        Ok(values)
    }
}

struct GpiodOutput<'a, const N: usize> {
    set: &'a GpiodLineSet<'a, N>,
    lines: gpiod::Lines<gpiod::Output>,
}

impl<const N: usize> Debug for GpiodOutput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.set)
    }
}

impl GpioOutput for GpiodOutput<'_, 1> {
    fn write(&self, value: bool) -> HalResult<()> {
        self.lines.set_values([value])?;
        Ok(())
    }
}

impl<const N: usize> GpioBusOutput<N> for GpiodOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> HalResult<()> {
        self.lines.set_values(*values)?;
        Ok(())
    }
}
