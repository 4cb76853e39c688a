//! Hardware access for the HMI node: GPIO pins, the keypad, the character LCD,
//! the byte link to the control node and the periodic tick source.

pub mod gpiod;
pub mod keypad;
pub mod lcd;
pub mod link;
pub mod timer;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum HalError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("the other end is gone")]
    Disconnected,
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for HalError {
    fn from(err: std::io::Error) -> Self {
        HalError::Io(err.kind())
    }
}

impl From<serialport::Error> for HalError {
    fn from(err: serialport::Error) -> Self {
        match err.kind {
            serialport::ErrorKind::Io(kind) => HalError::Io(kind),
            serialport::ErrorKind::NoDevice => HalError::Disconnected,
            _ => HalError::Other(err.description),
        }
    }
}

pub type HalResult<T> = Result<T, HalError>;

pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO lines available.
    fn count(&self) -> HalResult<usize>;

    /// Gets the GPIO pin at the given index.
    fn get_pin(&self, index: usize) -> HalResult<Box<dyn GpioPin + '_>>;

    /// Gets the GPIO pin bus at the specific indices.
    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> HalResult<Box<dyn GpioBus<N> + '_>>;
}

/// Specifies the active level of a GPIO line.
///
/// The keypad scan lines are wired active low, everything else active high.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioActiveLevel {
    #[default] High,
    Low,
}

/// Specifies the bias of a GPIO line.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioBias {
    #[default] None,
    PullUp,
    PullDown,
}

/// Specifies how an output line is driven.
///
/// Open-drain leaves the line floating when the output is high, which is what the keypad
/// columns need so that two pressed keys never short two driven outputs.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioDriveMode {
    #[default] PushPull,
    OpenDrain,
}

/// Line settings shared by single pins and buses.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct GpioLineConfig {
    pub active_level: GpioActiveLevel,
    pub bias: GpioBias,
    pub drive_mode: GpioDriveMode,
}

pub trait GpioPin: Debug {
    /// Requests the line as an input.
    fn as_input(&mut self) -> HalResult<Box<dyn GpioInput + '_>>;
    /// Requests the line as an output.
    fn as_output(&mut self) -> HalResult<Box<dyn GpioOutput + '_>>;

    /// Mutable access to the line settings used by the next request.
    fn config_mut(&mut self) -> &mut GpioLineConfig;

    fn set_active_level(&mut self, level: GpioActiveLevel) {
        self.config_mut().active_level = level;
    }

    fn set_bias(&mut self, bias: GpioBias) {
        self.config_mut().bias = bias;
    }

    fn set_drive_mode(&mut self, mode: GpioDriveMode) {
        self.config_mut().drive_mode = mode;
    }
}

pub trait GpioInput: Debug {
    /// Reads the state of the GPIO pin.
    fn read(&self) -> HalResult<bool>;
}

pub trait GpioOutput: Debug {
    /// Writes the state of the GPIO pin.
    fn write(&self, value: bool) -> HalResult<()>;
}

pub trait GpioBus<const N: usize>: Debug {
    fn as_input(&mut self) -> HalResult<Box<dyn GpioBusInput<N> + '_>>;
    fn as_output(&mut self) -> HalResult<Box<dyn GpioBusOutput<N> + '_>>;

    fn config_mut(&mut self) -> &mut GpioLineConfig;

    fn set_active_level(&mut self, level: GpioActiveLevel) {
        self.config_mut().active_level = level;
    }

    fn set_bias(&mut self, bias: GpioBias) {
        self.config_mut().bias = bias;
    }

    fn set_drive_mode(&mut self, mode: GpioDriveMode) {
        self.config_mut().drive_mode = mode;
    }
}

pub trait GpioBusInput<const N: usize>: Debug {
    fn read(&self) -> HalResult<[bool; N]>;
}

impl dyn GpioBusInput<4> + '_ {
    /// Reads the bus as a nibble, LSb first.
    pub fn read_nibble(&self) -> HalResult<u8> {
        let values = self.read()?;
        Ok(values
            .iter()
            .enumerate()
            .filter(|(_, set)| **set)
            .fold(0u8, |nibble, (i, _)| nibble | 1 << i))
    }
}

pub trait GpioBusOutput<const N: usize>: Debug {
    fn write(&self, values: &[bool; N]) -> HalResult<()>;
}

impl dyn GpioBusOutput<4> + '_ {
    /// Writes a nibble to the bus, LSb first.
    pub fn write_nibble(&self, value: u8) -> HalResult<()> {
        if value > 0b1111 {
            return Err(HalError::InvalidArgument);
        }

        let mut values = [false; 4];
        for (i, bit) in values.iter_mut().enumerate() {
            *bit = value & (1 << i) != 0;
        }
        self.write(&values)
    }
}
