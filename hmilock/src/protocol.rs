//! Wire vocabulary shared with the control node.
//!
//! Every opcode is a single byte. Handshake markers, commands and verdicts use disjoint
//! values, and none of them collides with a password digit (0..=9).

use crate::utils::WithinExt;
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Number of digits in a password.
pub const PASSWORD_LENGTH: usize = 5;

/// A byte that is not part of the expected opcode set.
#[derive(Copy, Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown opcode 0x{0:02x}")]
pub struct UnknownOpcode(pub u8);

/// Commands and handshake markers.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Command {
    ReadyToSend = 0x10,
    ReadyToReceive = 0x11,
    ReceiveDone = 0x12,
    SendFirstPassword = 0x13,
    SendSecondPassword = 0x14,
    SendCheckPassword = 0x15,
    /// Same byte as the `+` key that selects it.
    OpenDoor = b'+',
    /// Same byte as the `-` key that selects it.
    ChangePassword = b'-',
}

impl Command {
    pub const ALL: [Command; 8] = [
        Command::ReadyToSend,
        Command::ReadyToReceive,
        Command::ReceiveDone,
        Command::SendFirstPassword,
        Command::SendSecondPassword,
        Command::SendCheckPassword,
        Command::OpenDoor,
        Command::ChangePassword,
    ];

    /// Whether a password payload follows the command on the wire.
    pub fn carries_password(self) -> bool {
        matches!(
            self,
            Command::SendFirstPassword | Command::SendSecondPassword | Command::SendCheckPassword
        )
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> u8 {
        command as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = UnknownOpcode;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Command::ALL
            .into_iter()
            .find(|command| u8::from(*command) == byte)
            .ok_or(UnknownOpcode(byte))
    }
}

/// Verdict of a password comparison, decided by the control node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum MatchStatus {
    /// Both enrollment entries were equal and the password is stored.
    Matched = 0x20,
    /// The enrollment entries differ.
    Mismatched = 0x21,
    /// Correct password, the door is being opened.
    OpeningDoor = 0x22,
    /// Correct password, a new password may be enrolled.
    ChangingPassword = 0x23,
    WrongPassword = 0x24,
}

impl MatchStatus {
    pub const ALL: [MatchStatus; 5] = [
        MatchStatus::Matched,
        MatchStatus::Mismatched,
        MatchStatus::OpeningDoor,
        MatchStatus::ChangingPassword,
        MatchStatus::WrongPassword,
    ];
}

impl From<MatchStatus> for u8 {
    fn from(status: MatchStatus) -> u8 {
        status as u8
    }
}

impl TryFrom<u8> for MatchStatus {
    type Error = UnknownOpcode;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        MatchStatus::ALL
            .into_iter()
            .find(|status| u8::from(*status) == byte)
            .ok_or(UnknownOpcode(byte))
    }
}

#[derive(Copy, Clone, Debug, Error, Eq, PartialEq)]
pub enum InvalidPassword {
    #[error("{0} is not a digit")]
    NotADigit(u8),
    #[error("wrong number of digits: {0}")]
    WrongLength(usize),
}

/// A password entry: exactly [PASSWORD_LENGTH] digits, each 0..=9.
#[derive(Copy, Clone, Default, Eq, PartialEq)]
pub struct Password([u8; PASSWORD_LENGTH]);

impl Password {
    pub fn new(digits: [u8; PASSWORD_LENGTH]) -> Result<Self, InvalidPassword> {
        match digits.iter().find(|&&digit| !digit.within(0..=9)) {
            Some(&digit) => Err(InvalidPassword::NotADigit(digit)),
            None => Ok(Password(digits)),
        }
    }

    pub fn digits(&self) -> &[u8; PASSWORD_LENGTH] {
        &self.0
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Password({})", "*".repeat(PASSWORD_LENGTH))
    }
}

impl FromStr for Password {
    type Err = InvalidPassword;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .bytes()
            .map(|b| b.checked_sub(b'0').filter(|d| d.within(0..=9)).ok_or(InvalidPassword::NotADigit(b)))
            .collect::<Result<Vec<_>, _>>()?;
        let len = digits.len();
        let digits: [u8; PASSWORD_LENGTH] = digits
            .try_into()
            .map_err(|_| InvalidPassword::WrongLength(len))?;
        Ok(Password(digits))
    }
}

/// A command with its payload, if the command carries one.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    pub command: Command,
    pub password: Option<Password>,
}

impl Frame {
    pub fn command(command: Command) -> Self {
        Frame { command, password: None }
    }

    pub fn with_password(command: Command, password: Password) -> Self {
        Frame { command, password: Some(password) }
    }
}
