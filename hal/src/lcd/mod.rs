//! HD44780-compatible character LCD.
//!
//! The HMI board wires the 16x2 module in 4-bit mode with RW tied to ground, so the driver
//! only ever writes and never polls the busy flag; it waits the datasheet execution times
//! instead.

mod gpio;

use crate::{HalError, HalResult};
pub use gpio::*;
use std::fmt::Debug;

/// Number of visible rows and columns of the module.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LcdGeometry {
    pub rows: usize,
    pub cols: usize,
}

impl LcdGeometry {
    /// The 16x2 module fitted to the HMI board.
    pub const LCD_16X2: LcdGeometry = LcdGeometry { rows: 2, cols: 16 };

    /// Gets the DDRAM address of a visible cell.
    ///
    /// Rows start at 0x00, 0x40, 0x00 + cols, 0x40 + cols, as on every HD44780 module.
    pub fn ddram_address(&self, row: usize, col: usize) -> HalResult<u8> {
        if row >= self.rows || col >= self.cols {
            return Err(HalError::InvalidArgument);
        }
        let base = match row {
            0 => 0x00,
            1 => 0x40,
            2 => self.cols,
            _ => 0x40 + self.cols,
        };
        Ok((base + col) as u8)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing data.
    Left,
    /// Moves the cursor to the right after writing data.
    Right,
}

pub trait CharacterLcd: Debug {
    /// Runs the power-on initialization sequence.
    fn init(&mut self) -> HalResult<()>;

    /// Gets the size of the module.
    fn geometry(&self) -> LcdGeometry;

    /// Clears the display and sets the cursor to the home position.
    fn clear_display(&mut self) -> HalResult<()> {
        self.send_command(0b0000_0001)
    }

    /// Sets the cursor movement direction and display shift after each write.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) -> HalResult<()> {
        let mut command = 0b0000_0100;
        if cursor_direction == CursorDirection::Right {
            command |= 0b0000_0010;
        }
        if shift {
            command |= 0b0000_0001;
        }
        self.send_command(command)
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    fn set_display_control(&mut self, display_on: bool, cursor_on: bool, blink_on: bool) -> HalResult<()> {
        let mut command = 0b0000_1000;
        if display_on {
            command |= 0b0000_0100;
        }
        if cursor_on {
            command |= 0b0000_0010;
        }
        if blink_on {
            command |= 0b0000_0001;
        }
        self.send_command(command)
    }

    /// Sets the DDRAM address, which moves the cursor.
    fn set_ddram_address(&mut self, address: u8) -> HalResult<()> {
        if address > 0b0111_1111 {
            return Err(HalError::InvalidArgument);
        }
        self.send_command(0b1000_0000 | address)
    }

    /// Moves the cursor to a visible cell.
    fn set_cursor(&mut self, row: usize, col: usize) -> HalResult<()> {
        let address = self.geometry().ddram_address(row, col)?;
        self.set_ddram_address(address)
    }

    /// Sends an instruction (RS low).
    fn send_command(&mut self, command: u8) -> HalResult<()>;

    /// Sends a character code (RS high).
    fn send_data(&mut self, data: u8) -> HalResult<()>;
}
