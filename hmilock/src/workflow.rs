//! Password exchanges with the control node.

use crate::capture::PasswordCapture;
use crate::error::{HmiError, HmiResult};
use crate::keys::{KeySource, Symbol};
use crate::link::Channel;
use crate::protocol::{Command, Frame, MatchStatus, Password};
use crate::screen::Screen;
use log::{info, warn};
use std::thread::sleep;
use std::time::Duration;

/// What a verified password unlocks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Action {
    OpenDoor,
    ChangePassword,
}

impl Action {
    /// The menu key that selects an action.
    pub fn from_symbol(symbol: Symbol) -> Option<Action> {
        match symbol {
            Symbol::Plus => Some(Action::OpenDoor),
            Symbol::Minus => Some(Action::ChangePassword),
            _ => None,
        }
    }

    pub fn command(self) -> Command {
        match self {
            Action::OpenDoor => Command::OpenDoor,
            Action::ChangePassword => Command::ChangePassword,
        }
    }

    /// The verdict that grants this action.
    pub fn success_status(self) -> MatchStatus {
        match self {
            Action::OpenDoor => MatchStatus::OpeningDoor,
            Action::ChangePassword => MatchStatus::ChangingPassword,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Enrollment {
    /// Entry pairs it took until both entries matched.
    pub rounds: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Verdict {
    Granted,
    Denied,
}

/// One password exchange. Borrows the session's peripherals for its duration.
pub struct Workflow<'s, 'a> {
    pub screen: &'s mut dyn Screen,
    pub keys: &'s mut dyn KeySource,
    pub channel: &'s mut Channel<'a>,
    pub capture: PasswordCapture,
    pub presentation: Duration,
}

impl Workflow<'_, '_> {
    /// Clears the screen, shows `label` and reads a password on the second row.
    fn prompt(&mut self, label: &str) -> HmiResult<Password> {
        self.screen.show(label)?;
        self.screen.move_cursor(1, 0)?;
        Ok(self.capture.capture(&mut *self.keys, &mut *self.screen)?)
    }

    /// Enrolls a new password, asking for it twice until the control node reports both
    /// entries equal. The last entry is left in `entry`.
    pub fn enroll(&mut self, entry: &mut Password) -> HmiResult<Enrollment> {
        let mut rounds = 0;
        loop {
            rounds += 1;
            self.screen.show("  New Password  ")?;
            sleep(self.presentation);

            *entry = self.prompt("Enter Password")?;
            self.channel.send_frame(&Frame::with_password(Command::SendFirstPassword, *entry))?;

            *entry = self.prompt("ReEnter Password")?;
            self.channel.send_frame(&Frame::with_password(Command::SendSecondPassword, *entry))?;

            match self.channel.receive_verdict()? {
                MatchStatus::Matched => {
                    info!("Password enrolled after {} round(s).", rounds);
                    return Ok(Enrollment { rounds });
                }
                MatchStatus::Mismatched => {
                    warn!("Password entries differ, asking again.");
                    self.screen.show("MISMATCHED Pass")?;
                    sleep(self.presentation);
                }
                got => {
                    return Err(HmiError::UnexpectedVerdict {
                        expected: MatchStatus::Matched,
                        got,
                    });
                }
            }
        }
    }

    /// Asks for the current password and lets the control node decide on `action`.
    pub fn verify(&mut self, entry: &mut Password, action: Action) -> HmiResult<Verdict> {
        *entry = self.prompt("Enter Password :")?;
        self.channel.send_frame(&Frame::with_password(Command::SendCheckPassword, *entry))?;
        self.channel.send_command(action.command())?;

        let expected = action.success_status();
        match self.channel.receive_verdict()? {
            got if got == expected => Ok(Verdict::Granted),
            MatchStatus::WrongPassword => Ok(Verdict::Denied),
            got => Err(HmiError::UnexpectedVerdict { expected, got }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{CancelToken, LinkResult, WaitPolicy};
    use crate::sim::ControlNode;
    use crate::testkit::{fast_timing, password, RecordingScreen, ScriptedKeys};
    use hmilock_hal::link::ChannelLink;
    use std::thread;

    /// Runs `body` against a simulated control node, then hangs up and returns the node.
    fn with_control<T>(
        stored: Option<&str>,
        script: &str,
        body: impl FnOnce(&mut Workflow<'_, '_>) -> T,
    ) -> (T, RecordingScreen, ControlNode) {
        let (result, screen, node, _) = with_control_keys(stored, script, body);
        (result, screen, node)
    }

    /// Like [with_control], also returning how many scripted keys were left unread.
    fn with_control_keys<T>(
        stored: Option<&str>,
        script: &str,
        body: impl FnOnce(&mut Workflow<'_, '_>) -> T,
    ) -> (T, RecordingScreen, ControlNode, usize) {
        let (mut hmi, control) = ChannelLink::pair();
        let mut node = ControlNode::new();
        if let Some(stored) = stored {
            node = node.with_password(password(stored));
        }
        let handle = thread::spawn(move || node.serve(control, fast_timing(), CancelToken::new()));

        let mut keys = ScriptedKeys::typing(script);
        let mut screen = RecordingScreen::new();
        let result = {
            let mut channel = Channel::new(&mut hmi, WaitPolicy::Unbounded, CancelToken::new(), fast_timing());
            let mut workflow = Workflow {
                screen: &mut screen,
                keys: &mut keys,
                channel: &mut channel,
                capture: PasswordCapture::new(Duration::ZERO),
                presentation: Duration::ZERO,
            };
            body(&mut workflow)
        };
        drop(hmi);
        let node: LinkResult<ControlNode> = handle.join().expect("control thread");
        (result, screen, node.expect("control node"), keys.remaining())
    }

    #[test]
    fn equal_entries_enroll_in_one_round() {
        let mut entry = Password::default();
        let (result, screen, node) = with_control(None, "24680=24680=", |w| w.enroll(&mut entry));

        assert_eq!(result, Ok(Enrollment { rounds: 1 }));
        assert_eq!(node.stored(), Some(password("24680")));
        assert_eq!(screen.shown(), vec!["  New Password  ", "Enter Password", "ReEnter Password"]);
    }

    #[test]
    fn mismatch_asks_again_until_entries_agree() {
        let mut entry = Password::default();
        let (result, screen, node) =
            with_control(None, "12345=54321=12345=12345=", |w| w.enroll(&mut entry));

        assert_eq!(result, Ok(Enrollment { rounds: 2 }));
        assert_eq!(node.stored(), Some(password("12345")));
        assert_eq!(node.stats().mismatches, 1);
        assert!(screen.shown().contains(&"MISMATCHED Pass".to_string()));
    }

    #[test]
    fn correct_password_is_granted() {
        let mut entry = Password::default();
        let (result, screen, node) =
            with_control(Some("11111"), "11111=", |w| w.verify(&mut entry, Action::OpenDoor));

        assert_eq!(result, Ok(Verdict::Granted));
        assert_eq!(node.stats().doors_opened, 1);
        assert_eq!(screen.row(0), "Enter Password :");
        assert_eq!(screen.row(1), "*****");
    }

    #[test]
    fn wrong_password_is_denied() {
        let mut entry = Password::default();
        let (result, _, node) =
            with_control(Some("11111"), "22222=", |w| w.verify(&mut entry, Action::ChangePassword));

        assert_eq!(result, Ok(Verdict::Denied));
        assert_eq!(node.stats().rejected, 1);
    }

    #[test]
    fn menu_keys_select_actions() {
        assert_eq!(Action::from_symbol(Symbol::Plus), Some(Action::OpenDoor));
        assert_eq!(Action::from_symbol(Symbol::Minus), Some(Action::ChangePassword));
        assert_eq!(Action::from_symbol(Symbol::Digit(1)), None);
        assert_eq!(u8::from(Action::OpenDoor.command()), b'+');
    }

    mod any_enrollment {
        use super::*;
        use proptest::prelude::*;

        fn typed(digits: &[u8; 5]) -> String {
            digits.iter().map(|d| char::from(b'0' + d)).collect()
        }

        fn unequal_pair() -> impl Strategy<Value = ([u8; 5], [u8; 5])> {
            (proptest::array::uniform5(0u8..=9), proptest::array::uniform5(0u8..=9))
                .prop_filter("entries must differ", |(first, second)| first != second)
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn accepts_on_the_first_equal_pair(
                mismatched in proptest::collection::vec(unequal_pair(), 0..4),
                agreed in proptest::array::uniform5(0u8..=9),
                after in proptest::array::uniform5(0u8..=9),
            ) {
                let mut script: String = mismatched
                    .iter()
                    .map(|(first, second)| format!("{}={}=", typed(first), typed(second)))
                    .collect();
                script += &format!("{0}={0}=", typed(&agreed));
                script += &format!("{0}={0}=", typed(&after));

                let mut entry = Password::default();
                let (result, _, node, left) = with_control_keys(None, &script, |w| w.enroll(&mut entry));

                let agreed = Password::new(agreed).expect("digits in range");
                prop_assert_eq!(result, Ok(Enrollment { rounds: mismatched.len() as u32 + 1 }));
                prop_assert_eq!(node.stats().mismatches, mismatched.len() as u32);
                prop_assert_eq!(node.stored(), Some(agreed));
                // The trailing pair is 12 keys and none of them were read.
                prop_assert_eq!(left, 12);
            }
        }
    }
}
