use std::fmt::{Debug, Formatter};
use crate::{GpioBusInput, GpioBusOutput, HalResult};
use crate::keypad::Keypad;

/// Keys of the 4x4 calculator keypad fitted to the HMI board.
///
/// ```text
///  7   8   9   ÷
///  4   5   6   ×
///  1   2   3   -
///  ON  0   =   +
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum KeypadKey {
    Key0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    /// The `÷` key.
    KeyDivide,
    /// The `×` key.
    KeyMultiply,
    /// The `-` key.
    KeyMinus,
    /// The `+` key.
    KeyPlus,
    /// The `=` key, used as enter.
    KeyEquals,
    /// The `ON/C` key.
    KeyClear,
}

impl KeypadKey {
    const LAYOUT: [[KeypadKey; 4]; 4] = {
        use KeypadKey::*;
        [
            [ Key7, Key8, Key9, KeyDivide, ],
            [ Key4, Key5, Key6, KeyMultiply, ],
            [ Key1, Key2, Key3, KeyMinus, ],
            [ KeyClear, Key0, KeyEquals, KeyPlus, ],
        ]
    };

    /// Converts a (row, column) position to a [KeypadKey].
    pub fn from_position(pos: (u8, u8)) -> Option<KeypadKey> {
        Self::LAYOUT
            .get(pos.0 as usize)
            .and_then(|row| row.get(pos.1 as usize))
            .copied()
    }

    /// Gets the digit value of the key, if it is a digit key.
    pub fn digit(self) -> Option<u8> {
        use KeypadKey::*;

        match self {
            Key0 => Some(0),
            Key1 => Some(1),
            Key2 => Some(2),
            Key3 => Some(3),
            Key4 => Some(4),
            Key5 => Some(5),
            Key6 => Some(6),
            Key7 => Some(7),
            Key8 => Some(8),
            Key9 => Some(9),
            _ => None,
        }
    }

    /// Converts the [KeypadKey] to the character printed on it.
    pub fn to_char(self) -> char {
        use KeypadKey::*;

        match self {
            KeyDivide => '%',
            KeyMultiply => '*',
            KeyMinus => '-',
            KeyPlus => '+',
            KeyEquals => '=',
            KeyClear => 'C',
            digit => char::from(b'0' + digit.digit().unwrap_or_default()),
        }
    }
}

/// A 4x4 keypad scanned over GPIO.
///
/// Columns are driven one at a time (active level handled by the bus), rows are read back.
pub struct GpioKeypad<'a> {
    cols: &'a dyn GpioBusOutput<4>,
    rows: &'a dyn GpioBusInput<4>,
}

impl Debug for GpioKeypad<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpioKeypad({:?}, {:?})", self.cols, self.rows)
    }
}

impl <'a> GpioKeypad<'a> {
    pub fn new(cols: &'a dyn GpioBusOutput<4>, rows: &'a dyn GpioBusInput<4>) -> Self {
        GpioKeypad { cols, rows }
    }
}

impl Keypad for GpioKeypad<'_> {
    type Key = KeypadKey;

    fn read(&self) -> HalResult<Vec<Self::Key>> {
        let mut pressed = Vec::new();

        for col in 0..4u8 {
            self.cols.write_nibble(1 << col)?;
            let rows = self.rows.read_nibble()?;
            pressed.extend(
                (0..4u8)
                    .filter(|&row| rows >> row & 1 == 1)
                    .filter_map(|row| KeypadKey::from_position((row, col))),
            );
        }
        self.cols.write_nibble(0)?;

        Ok(pressed)
    }
}
