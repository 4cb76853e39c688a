//! Byte links to the control node.
//!
//! A link moves single bytes with no framing of its own; the handshake on top lives in the
//! `hmilock` crate.

mod serial;

use crate::{HalError, HalResult};
use log::trace;
pub use serial::*;
use std::fmt::{Debug, Formatter};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

pub trait ByteLink: Debug {
    /// Sends one byte.
    fn send_byte(&mut self, byte: u8) -> HalResult<()>;

    /// Receives one byte.
    ///
    /// Waits at most `timeout` and returns `None` if nothing arrived; `None` as the timeout
    /// blocks until a byte arrives.
    fn receive_byte(&mut self, timeout: Option<Duration>) -> HalResult<Option<u8>>;
}

/// One end of an in-memory link.
///
/// Used to run the control-node simulator on a thread next to the HMI.
pub struct ChannelLink {
    name: &'static str,
    tx: Sender<u8>,
    rx: Receiver<u8>,
}

impl ChannelLink {
    /// Creates two connected ends. Bytes sent on one end are received on the other, in order.
    pub fn pair() -> (ChannelLink, ChannelLink) {
        let (hmi_tx, control_rx) = mpsc::channel();
        let (control_tx, hmi_rx) = mpsc::channel();
        (
            ChannelLink { name: "hmi", tx: hmi_tx, rx: hmi_rx },
            ChannelLink { name: "control", tx: control_tx, rx: control_rx },
        )
    }
}

impl Debug for ChannelLink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChannelLink({})", self.name)
    }
}

impl ByteLink for ChannelLink {
    fn send_byte(&mut self, byte: u8) -> HalResult<()> {
        trace!("{} -> 0x{:02x}", self.name, byte);
        self.tx.send(byte).map_err(|_| HalError::Disconnected)
    }

    fn receive_byte(&mut self, timeout: Option<Duration>) -> HalResult<Option<u8>> {
        let byte = match timeout {
            Some(timeout) => match self.rx.recv_timeout(timeout) {
                Ok(byte) => byte,
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => return Err(HalError::Disconnected),
            },
            None => self.rx.recv().map_err(|_| HalError::Disconnected)?,
        };
        trace!("{} <- 0x{:02x}", self.name, byte);
        Ok(Some(byte))
    }
}
