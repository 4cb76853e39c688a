use hmilock_hal::HalResult;
use hmilock_hal::lcd::CharacterLcd;
use log::warn;

/// Character display as used by the session.
pub trait Screen {
    fn clear(&mut self) -> HalResult<()>;
    fn move_cursor(&mut self, row: usize, col: usize) -> HalResult<()>;
    fn write_str(&mut self, text: &str) -> HalResult<()>;
    fn write_char(&mut self, ch: char) -> HalResult<()>;

    /// Clears the screen and writes `text` on the first row.
    fn show(&mut self, text: &str) -> HalResult<()> {
        self.clear()?;
        self.write_str(text)
    }

    /// Clears the screen and writes one text per row.
    fn show_lines(&mut self, lines: &[&str]) -> HalResult<()> {
        self.clear()?;
        for (row, line) in lines.iter().enumerate() {
            self.move_cursor(row, 0)?;
            self.write_str(line)?;
        }
        Ok(())
    }
}

impl <T: ?Sized + CharacterLcd> Screen for T {
    fn clear(&mut self) -> HalResult<()> {
        self.clear_display()
    }

    fn move_cursor(&mut self, row: usize, col: usize) -> HalResult<()> {
        self.set_cursor(row, col)
    }

    fn write_str(&mut self, text: &str) -> HalResult<()> {
        text.chars().try_for_each(|c| self.write_char(c))
    }

    fn write_char(&mut self, ch: char) -> HalResult<()> {
        if ch.is_ascii() {
            self.send_data(ch as u8)
        } else {
            warn!("Non-ASCII character: {}", ch);
            self.send_data(b'?')
        }
    }
}
