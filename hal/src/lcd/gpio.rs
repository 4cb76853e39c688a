use crate::lcd::{CharacterLcd, CursorDirection, LcdGeometry};
use crate::{GpioBusOutput, GpioOutput, HalResult};
use log::trace;
use std::thread::sleep;
use std::time::Duration;

/// Write-only HD44780 driver on a 4-bit GPIO data bus (D4..D7).
#[derive(Debug)]
pub struct GpioLcd<'a> {
    pin_e: &'a dyn GpioOutput,
    pin_rs: &'a dyn GpioOutput,
    data_bus: &'a dyn GpioBusOutput<4>,
    geometry: LcdGeometry,
}

impl<'a> GpioLcd<'a> {
    pub fn new_4bit(
        pin_e: &'a dyn GpioOutput,
        pin_rs: &'a dyn GpioOutput,
        data_bus: &'a dyn GpioBusOutput<4>,
        geometry: LcdGeometry,
    ) -> Self {
        GpioLcd {
            pin_e,
            pin_rs,
            data_bus,
            geometry,
        }
    }

    fn pulse_e(&self) -> HalResult<()> {
        self.pin_e.write(true)?;
        sleep(Duration::from_micros(1));
        self.pin_e.write(false)?;
        sleep(Duration::from_micros(50));
        Ok(())
    }

    fn write_nibble(&self, nibble: u8) -> HalResult<()> {
        self.data_bus.write_nibble(nibble & 0x0F)?;
        self.pulse_e()
    }

    fn send(&mut self, data: u8, rs: bool) -> HalResult<()> {
        trace!("Sending {:08b}, RS: {}", data, rs);
        self.pin_rs.write(rs)?;
        self.write_nibble(data >> 4)?;
        self.write_nibble(data)?;
        // Clear and home take ~1.5 ms, everything else ~40 us.
        if !rs && data <= 0b0000_0011 {
            sleep(Duration::from_millis(2));
        }
        Ok(())
    }
}

impl CharacterLcd for GpioLcd<'_> {
    fn init(&mut self) -> HalResult<()> {
        sleep(Duration::from_millis(50));
        self.pin_rs.write(false)?;

        // Force 8-bit mode three times, then switch to 4-bit.
        for delay in [Duration::from_millis(5), Duration::from_micros(150), Duration::from_micros(150)] {
            self.write_nibble(0b0011)?;
            sleep(delay);
        }
        self.write_nibble(0b0010)?;

        // Function set: 4-bit, two lines, 5x8 font.
        self.send_command(0b0010_1000)?;
        self.set_display_control(false, false, false)?;
        self.clear_display()?;
        self.set_entry_mode(CursorDirection::Right, false)?;
        self.set_display_control(true, false, false)
    }

    fn geometry(&self) -> LcdGeometry {
        self.geometry
    }

    fn send_command(&mut self, command: u8) -> HalResult<()> {
        self.send(command, false)
    }

    fn send_data(&mut self, data: u8) -> HalResult<()> {
        self.send(data, true)
    }
}
