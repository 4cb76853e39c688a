use crate::link::ByteLink;
use crate::HalResult;
use log::{debug, trace};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::fmt::{Debug, Formatter};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// UART link to the control node, 8 data bits, no parity, one stop bit.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    /// Read timeout used while waiting without a limit, so the port is polled periodically.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(1);

    pub fn open(path: &str, baud_rate: u32) -> HalResult<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Self::IDLE_TIMEOUT)
            .open()?;
        debug!("Opened serial port {} at {} baud.", path, baud_rate);
        Ok(SerialLink { port })
    }

    fn read_one(&mut self, timeout: Duration) -> HalResult<Option<u8>> {
        self.port.set_timeout(timeout)?;
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(1) => Ok(Some(buf[0])),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == ErrorKind::TimedOut => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl Debug for SerialLink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SerialLink({})", self.port.name().as_deref().unwrap_or("?"))
    }
}

impl ByteLink for SerialLink {
    fn send_byte(&mut self, byte: u8) -> HalResult<()> {
        trace!("uart -> 0x{:02x}", byte);
        self.port.write_all(&[byte])?;
        self.port.flush()?;
        Ok(())
    }

    fn receive_byte(&mut self, timeout: Option<Duration>) -> HalResult<Option<u8>> {
        let byte = match timeout {
            Some(timeout) => self.read_one(timeout)?,
            None => loop {
                if let Some(byte) = self.read_one(Self::IDLE_TIMEOUT)? {
                    break Some(byte);
                }
            },
        };
        if let Some(byte) = byte {
            trace!("uart <- 0x{:02x}", byte);
        }
        Ok(byte)
    }
}
