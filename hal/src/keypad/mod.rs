mod gpio;

use std::fmt::Debug;
use crate::HalResult;
pub use gpio::*;

/// A matrix keypad that reports every key currently held down.
pub trait Keypad: Debug {
    type Key;

    fn read(&self) -> HalResult<Vec<Self::Key>>;
}
