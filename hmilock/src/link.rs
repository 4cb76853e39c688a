//! The handshake with the control node.
//!
//! A command travels in a three-step rendezvous: the sender announces
//! [Command::ReadyToSend], the receiver answers [Command::ReadyToReceive], the sender puts the
//! command byte on the wire and the receiver confirms with [Command::ReceiveDone]. Bytes that
//! arrive while a side waits for a marker are dropped.
//!
//! Password payloads follow their command as raw digit bytes with a fixed gap and no
//! acknowledgement. Lost or reordered digits are not detected here; the control node simply
//! compares whatever it got.
//!
//! With [WaitPolicy::Unbounded] (the default) a silent peer blocks the caller forever. A
//! [CancelToken] is checked between poll slices in either policy.

use crate::protocol::{Command, Frame, MatchStatus, Password, UnknownOpcode, PASSWORD_LENGTH};
use hmilock_hal::link::ByteLink;
use hmilock_hal::HalError;
use log::{debug, trace};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant};
use thiserror::Error;

/// What a side was waiting for when a wait ended without it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Awaiting {
    Marker(Command),
    Opcode,
    PasswordDigit(usize),
}

impl Display for Awaiting {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Awaiting::Marker(marker) => write!(f, "{:?}", marker),
            Awaiting::Opcode => write!(f, "an opcode"),
            Awaiting::PasswordDigit(index) => write!(f, "password digit {}", index),
        }
    }
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum LinkError {
    #[error(transparent)]
    Hal(#[from] HalError),
    #[error("timed out waiting for {0}")]
    TimedOut(Awaiting),
    #[error("wait cancelled")]
    Cancelled,
    #[error(transparent)]
    UnknownOpcode(#[from] UnknownOpcode),
    #[error("payload byte 0x{0:02x} is not a digit")]
    InvalidDigit(u8),
}

pub type LinkResult<T> = Result<T, LinkError>;

/// How long each handshake wait may take.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum WaitPolicy {
    /// Wait forever.
    #[default]
    Unbounded,
    /// Give up with [LinkError::TimedOut] after the duration.
    Bounded(Duration),
}

impl WaitPolicy {
    fn deadline(self) -> Option<Instant> {
        match self {
            WaitPolicy::Unbounded => None,
            WaitPolicy::Bounded(limit) => Some(Instant::now() + limit),
        }
    }
}

/// Shared flag that aborts pending link waits.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Timing knobs of a [Channel].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelTiming {
    /// Gap after every payload byte.
    pub inter_byte: Duration,
    /// Longest single read; bounds how late a cancellation is noticed.
    pub poll_slice: Duration,
}

impl Default for ChannelTiming {
    fn default() -> Self {
        ChannelTiming {
            inter_byte: Duration::from_millis(15),
            poll_slice: Duration::from_millis(100),
        }
    }
}

/// Typed command/payload channel over a byte link. Both nodes speak through the same type.
#[derive(Debug)]
pub struct Channel<'a> {
    link: &'a mut dyn ByteLink,
    policy: WaitPolicy,
    cancel: CancelToken,
    timing: ChannelTiming,
}

impl<'a> Channel<'a> {
    pub fn new(link: &'a mut dyn ByteLink, policy: WaitPolicy, cancel: CancelToken, timing: ChannelTiming) -> Self {
        Channel { link, policy, cancel, timing }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Receives the next byte before `deadline`.
    fn next_byte(&mut self, deadline: Option<Instant>, awaiting: Awaiting) -> LinkResult<u8> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(LinkError::Cancelled);
            }
            let slice = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(LinkError::TimedOut(awaiting));
                    }
                    remaining.min(self.timing.poll_slice)
                }
                None => self.timing.poll_slice,
            };
            if let Some(byte) = self.link.receive_byte(Some(slice))? {
                return Ok(byte);
            }
        }
    }

    fn await_marker(&mut self, marker: Command) -> LinkResult<()> {
        let deadline = self.policy.deadline();
        loop {
            let byte = self.next_byte(deadline, Awaiting::Marker(marker))?;
            if byte == u8::from(marker) {
                return Ok(());
            }
            trace!("Discarding 0x{:02x} while waiting for {:?}.", byte, marker);
        }
    }

    /// Sends one opcode through the full handshake. Returns once the peer confirmed receipt.
    pub fn send_command(&mut self, opcode: impl Into<u8>) -> LinkResult<()> {
        let opcode = opcode.into();
        self.link.send_byte(Command::ReadyToSend.into())?;
        self.await_marker(Command::ReadyToReceive)?;
        self.link.send_byte(opcode)?;
        self.await_marker(Command::ReceiveDone)?;
        debug!("Sent opcode 0x{:02x}.", opcode);
        Ok(())
    }

    /// Receives one opcode through the full handshake, without interpreting it.
    pub fn receive_command(&mut self) -> LinkResult<u8> {
        self.await_marker(Command::ReadyToSend)?;
        self.link.send_byte(Command::ReadyToReceive.into())?;
        let opcode = self.next_byte(self.policy.deadline(), Awaiting::Opcode)?;
        self.link.send_byte(Command::ReceiveDone.into())?;
        debug!("Received opcode 0x{:02x}.", opcode);
        Ok(opcode)
    }

    /// Receives a verdict from the control node.
    pub fn receive_verdict(&mut self) -> LinkResult<MatchStatus> {
        let opcode = self.receive_command()?;
        Ok(MatchStatus::try_from(opcode)?)
    }

    /// Sends the digits of `password`, one byte each, pausing after every byte.
    pub fn send_password(&mut self, password: &Password) -> LinkResult<()> {
        for &digit in password.digits() {
            self.link.send_byte(digit)?;
            sleep(self.timing.inter_byte);
        }
        Ok(())
    }

    /// Receives the digits sent by [Self::send_password].
    pub fn receive_password(&mut self) -> LinkResult<Password> {
        let mut digits = [0u8; PASSWORD_LENGTH];
        for (index, digit) in digits.iter_mut().enumerate() {
            *digit = self.next_byte(self.policy.deadline(), Awaiting::PasswordDigit(index))?;
        }
        Password::new(digits).map_err(|_| {
            let bad = digits.iter().copied().find(|&d| d > 9).unwrap_or_default();
            LinkError::InvalidDigit(bad)
        })
    }

    pub fn send_frame(&mut self, frame: &Frame) -> LinkResult<()> {
        self.send_command(frame.command)?;
        if let Some(password) = &frame.password {
            self.send_password(password)?;
        }
        Ok(())
    }

    pub fn receive_frame(&mut self) -> LinkResult<Frame> {
        let command = Command::try_from(self.receive_command()?)?;
        if command.carries_password() {
            Ok(Frame::with_password(command, self.receive_password()?))
        } else {
            Ok(Frame::command(command))
        }
    }
}
