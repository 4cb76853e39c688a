//! A stand-in for the control node, for running the HMI on the bench without the control
//! board and for testing.

use crate::link::{CancelToken, Channel, ChannelTiming, LinkError, LinkResult, WaitPolicy};
use crate::protocol::{Command, Frame, MatchStatus, Password};
use hmilock_hal::link::ByteLink;
use hmilock_hal::HalError;
use log::{debug, info, warn};
use std::io;
use std::thread::{self, JoinHandle};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ControlStats {
    pub enrollments: u32,
    pub mismatches: u32,
    pub doors_opened: u32,
    pub password_changes: u32,
    pub rejected: u32,
}

/// The control node's side of the protocol: stores the enrolled password and judges entries.
#[derive(Debug, Default)]
pub struct ControlNode {
    stored: Option<Password>,
    first: Option<Password>,
    entry: Option<Password>,
    stats: ControlStats,
}

impl ControlNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `password` already enrolled.
    pub fn with_password(mut self, password: Password) -> Self {
        self.stored = Some(password);
        self
    }

    pub fn stored(&self) -> Option<Password> {
        self.stored
    }

    pub fn stats(&self) -> ControlStats {
        self.stats
    }

    /// Applies one frame from the HMI. Returns the verdict to send back, if the frame asks
    /// for one.
    pub fn handle(&mut self, frame: Frame) -> Option<MatchStatus> {
        match (frame.command, frame.password) {
            (Command::SendFirstPassword, Some(password)) => {
                self.first = Some(password);
                None
            }
            (Command::SendSecondPassword, Some(password)) => {
                if self.first.take() == Some(password) {
                    self.stored = Some(password);
                    self.stats.enrollments += 1;
                    Some(MatchStatus::Matched)
                } else {
                    self.stats.mismatches += 1;
                    Some(MatchStatus::Mismatched)
                }
            }
            (Command::SendCheckPassword, Some(password)) => {
                self.entry = Some(password);
                None
            }
            (Command::OpenDoor, _) => Some(self.judge(MatchStatus::OpeningDoor)),
            (Command::ChangePassword, _) => Some(self.judge(MatchStatus::ChangingPassword)),
            (command, _) => {
                warn!("Ignoring stray {:?}.", command);
                None
            }
        }
    }

    fn judge(&mut self, granted: MatchStatus) -> MatchStatus {
        let entry = self.entry.take();
        if entry.is_some() && entry == self.stored {
            match granted {
                MatchStatus::OpeningDoor => self.stats.doors_opened += 1,
                _ => self.stats.password_changes += 1,
            }
            granted
        } else {
            self.stats.rejected += 1;
            MatchStatus::WrongPassword
        }
    }

    /// Answers frames on `link` until the HMI hangs up or `cancel` fires.
    pub fn serve(mut self, mut link: impl ByteLink, timing: ChannelTiming, cancel: CancelToken) -> LinkResult<Self> {
        let mut channel = Channel::new(&mut link, WaitPolicy::Unbounded, cancel, timing);
        info!("Simulated control node ready.");
        loop {
            let frame = match channel.receive_frame() {
                Ok(frame) => frame,
                Err(LinkError::Hal(HalError::Disconnected)) | Err(LinkError::Cancelled) => break,
                Err(err @ (LinkError::UnknownOpcode(_) | LinkError::InvalidDigit(_))) => {
                    warn!("Bad frame from the HMI: {}", err);
                    continue;
                }
                Err(err) => return Err(err),
            };
            debug!("Control node got {:?}.", frame);
            if let Some(verdict) = self.handle(frame) {
                match channel.send_command(verdict) {
                    Ok(()) => {}
                    Err(LinkError::Hal(HalError::Disconnected)) | Err(LinkError::Cancelled) => break,
                    Err(err) => return Err(err),
                }
            }
        }
        info!("Simulated control node stopped: {:?}", self.stats);
        Ok(self)
    }

    /// Serves on a thread of its own.
    pub fn spawn<L: ByteLink + Send + 'static>(
        self,
        link: L,
        timing: ChannelTiming,
        cancel: CancelToken,
    ) -> io::Result<JoinHandle<LinkResult<Self>>> {
        thread::Builder::new()
            .name("control-sim".into())
            .spawn(move || self.serve(link, timing, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::password;

    fn enroll(node: &mut ControlNode, first: &str, second: &str) -> Option<MatchStatus> {
        node.handle(Frame::with_password(Command::SendFirstPassword, password(first)));
        node.handle(Frame::with_password(Command::SendSecondPassword, password(second)))
    }

    #[test]
    fn enrollment_needs_two_equal_entries() {
        let mut node = ControlNode::new();
        assert_eq!(enroll(&mut node, "12345", "54321"), Some(MatchStatus::Mismatched));
        assert_eq!(node.stored(), None);
        assert_eq!(enroll(&mut node, "12345", "12345"), Some(MatchStatus::Matched));
        assert_eq!(node.stored(), Some(password("12345")));
    }

    #[test]
    fn actions_are_judged_against_the_stored_password() {
        let mut node = ControlNode::new().with_password(password("00000"));

        node.handle(Frame::with_password(Command::SendCheckPassword, password("00000")));
        assert_eq!(node.handle(Frame::command(Command::OpenDoor)), Some(MatchStatus::OpeningDoor));

        node.handle(Frame::with_password(Command::SendCheckPassword, password("00001")));
        assert_eq!(node.handle(Frame::command(Command::ChangePassword)), Some(MatchStatus::WrongPassword));

        // Every check needs a fresh entry.
        assert_eq!(node.handle(Frame::command(Command::OpenDoor)), Some(MatchStatus::WrongPassword));

        assert_eq!(
            node.stats(),
            ControlStats { doors_opened: 1, rejected: 2, ..ControlStats::default() }
        );
    }

    #[test]
    fn nothing_is_granted_before_enrollment() {
        let mut node = ControlNode::new();
        node.handle(Frame::with_password(Command::SendCheckPassword, password("12345")));
        assert_eq!(node.handle(Frame::command(Command::OpenDoor)), Some(MatchStatus::WrongPassword));
    }

    #[test]
    fn serving_ends_when_the_hmi_hangs_up() {
        let (hmi, control) = hmilock_hal::link::ChannelLink::pair();
        drop(hmi);
        let node = ControlNode::new().serve(control, ChannelTiming::default(), CancelToken::new());
        assert!(node.is_ok());
    }
}
