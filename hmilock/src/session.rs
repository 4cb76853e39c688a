//! The HMI's top-level loop: welcome, enrollment, then the menu forever.

use crate::capture::PasswordCapture;
use crate::config::Config;
use crate::door::DoorSequencer;
use crate::error::{HmiError, HmiResult};
use crate::keys::{KeySource, Symbol};
use crate::link::{Channel, LinkError};
use crate::lockout::{LockoutGuard, MistakeCounter, MistakeOutcome};
use crate::protocol::Password;
use crate::screen::Screen;
use crate::ticks::TickCounter;
use crate::workflow::{Action, Enrollment, Verdict, Workflow};
use hmilock_hal::timer::TickSource;
use log::{debug, info, warn};
use std::thread::sleep;
use std::time::Duration;

/// State shared by the session's components.
#[derive(Debug, Default)]
pub struct SessionContext {
    pub ticks: TickCounter,
    pub mistakes: MistakeCounter,
    /// The last password typed in.
    pub entry: Password,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionState {
    Idle,
    Enrolling,
    Menu,
    Verifying,
    DoorCycle,
    Lockout,
    Faulted,
}

/// What one pass through the menu led to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// A key without a menu entry was pressed.
    Ignored(Symbol),
    DoorCycled { ticks: u32 },
    PasswordChanged { rounds: u32 },
    WrongPassword { mistakes: u32 },
    LockedOut,
    /// A protocol fault was shown and the menu will be shown again.
    Fault(HmiError),
}

pub struct Session<'a> {
    screen: &'a mut dyn Screen,
    keys: &'a mut dyn KeySource,
    ticker: &'a mut dyn TickSource,
    channel: Channel<'a>,
    context: SessionContext,
    state: SessionState,
    capture: PasswordCapture,
    door: DoorSequencer,
    lockout: LockoutGuard,
    presentation: Duration,
    key_poll: Duration,
}

impl<'a> Session<'a> {
    pub fn new(
        config: &Config,
        screen: &'a mut dyn Screen,
        keys: &'a mut dyn KeySource,
        ticker: &'a mut dyn TickSource,
        channel: Channel<'a>,
    ) -> Self {
        let timing = &config.timing;
        Session {
            screen,
            keys,
            ticker,
            channel,
            context: SessionContext::default(),
            state: SessionState::Idle,
            capture: PasswordCapture::new(timing.key_poll()),
            door: DoorSequencer::new(config.door.clone(), timing.tick_interval()),
            lockout: LockoutGuard::new(config.lockout.clone(), timing.tick_interval(), timing.presentation()),
            presentation: timing.presentation(),
            key_poll: timing.key_poll(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            info!("Session: {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn enroll(&mut self) -> HmiResult<Enrollment> {
        Workflow {
            screen: &mut *self.screen,
            keys: &mut *self.keys,
            channel: &mut self.channel,
            capture: self.capture,
            presentation: self.presentation,
        }
        .enroll(&mut self.context.entry)
    }

    fn verify(&mut self, action: Action) -> HmiResult<Verdict> {
        Workflow {
            screen: &mut *self.screen,
            keys: &mut *self.keys,
            channel: &mut self.channel,
            capture: self.capture,
            presentation: self.presentation,
        }
        .verify(&mut self.context.entry, action)
    }

    fn show_fault(&mut self, err: &HmiError) -> HmiResult<()> {
        warn!("Recovering from fault: {}", err);
        self.set_state(SessionState::Faulted);
        let label = match err {
            HmiError::Link(LinkError::TimedOut(_)) => "Link Timeout",
            _ => "Protocol Error",
        };
        self.screen.show(label)?;
        sleep(self.presentation);
        Ok(())
    }

    /// Waits for a menu key. Unlike the password prompt, this wait honours cancellation.
    fn wait_for_choice(&mut self) -> HmiResult<Symbol> {
        loop {
            if self.channel.cancel_token().is_cancelled() {
                return Err(LinkError::Cancelled.into());
            }
            if let Some(symbol) = self.keys.poll()? {
                return Ok(symbol);
            }
            sleep(self.key_poll);
        }
    }

    /// Shows the welcome screen and enrolls the first password.
    ///
    /// Enrollment is repeated after recoverable faults until the control node accepts a
    /// password.
    pub fn start(&mut self) -> HmiResult<Enrollment> {
        self.screen.clear()?;
        self.screen.move_cursor(0, 4)?;
        self.screen.write_str("Welcome")?;
        self.screen.move_cursor(1, 0)?;
        self.screen.write_str("Use (=) as Enter")?;
        sleep(self.presentation);
        self.screen.clear()?;

        loop {
            self.set_state(SessionState::Enrolling);
            match self.enroll() {
                Ok(enrollment) => {
                    self.set_state(SessionState::Menu);
                    return Ok(enrollment);
                }
                Err(err) if err.is_recoverable() => self.show_fault(&err)?,
                Err(err) => {
                    self.set_state(SessionState::Faulted);
                    return Err(err);
                }
            }
        }
    }

    /// Shows the menu and handles one choice.
    pub fn step(&mut self) -> HmiResult<Outcome> {
        self.set_state(SessionState::Menu);
        self.screen.show_lines(&["(+): Open Door", "(-): Change Pass"])?;

        let symbol = self.wait_for_choice()?;
        let Some(action) = Action::from_symbol(symbol) else {
            debug!("No menu entry for {:?}.", symbol);
            return Ok(Outcome::Ignored(symbol));
        };

        match self.dispatch(action) {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.is_recoverable() => {
                self.show_fault(&err)?;
                Ok(Outcome::Fault(err))
            }
            Err(err) => {
                self.set_state(SessionState::Faulted);
                Err(err)
            }
        }
    }

    fn dispatch(&mut self, action: Action) -> HmiResult<Outcome> {
        self.set_state(SessionState::Verifying);
        match (self.verify(action)?, action) {
            (Verdict::Granted, Action::OpenDoor) => {
                self.context.mistakes.reset();
                self.set_state(SessionState::DoorCycle);
                let ticks = self.door.run(&self.context.ticks, &mut *self.ticker, &mut *self.screen)?;
                Ok(Outcome::DoorCycled { ticks })
            }
            (Verdict::Granted, Action::ChangePassword) => {
                self.context.mistakes.reset();
                self.set_state(SessionState::Enrolling);
                let Enrollment { rounds } = self.enroll()?;
                Ok(Outcome::PasswordChanged { rounds })
            }
            (Verdict::Denied, _) => {
                self.set_state(SessionState::Lockout);
                let outcome = self.lockout.record_mistake(
                    &mut self.context.mistakes,
                    &self.context.ticks,
                    &mut *self.ticker,
                    &mut *self.screen,
                )?;
                Ok(match outcome {
                    MistakeOutcome::Warned { mistakes } => Outcome::WrongPassword { mistakes },
                    MistakeOutcome::LockedOut => Outcome::LockedOut,
                })
            }
        }
    }

    /// Runs the session until it is cancelled or hits an unrecoverable error.
    pub fn run(&mut self) -> HmiResult<()> {
        match self.run_forever() {
            Err(err) if err.is_cancelled() => {
                info!("Session cancelled.");
                Ok(())
            }
            other => other,
        }
    }

    fn run_forever(&mut self) -> HmiResult<()> {
        self.start()?;
        loop {
            let outcome = self.step()?;
            debug!("Menu outcome: {:?}", outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{CancelToken, WaitPolicy};
    use crate::protocol::{Command, MatchStatus};
    use crate::sim::{ControlNode, ControlStats};
    use crate::testkit::{fast_config, fast_timing, password, LockstepTicker, RecordingScreen, ScriptedKeys};
    use hmilock_hal::link::ChannelLink;
    use std::thread;

    struct Rig {
        screen: RecordingScreen,
        keys: ScriptedKeys,
        ticker: LockstepTicker,
        ticks: TickCounter,
    }

    impl Rig {
        fn new(script: &str) -> Self {
            let ticks = TickCounter::new();
            Rig {
                screen: RecordingScreen::new(),
                keys: ScriptedKeys::typing(script),
                ticker: LockstepTicker::new(ticks.clone()),
                ticks,
            }
        }
    }

    /// Builds a session whose tick counter is the one the rig's ticker watches.
    fn session<'a>(rig: &'a mut Rig, link: &'a mut ChannelLink, policy: WaitPolicy, cancel: CancelToken) -> Session<'a> {
        let channel = Channel::new(link, policy, cancel, fast_timing());
        let mut session = Session::new(&fast_config(), &mut rig.screen, &mut rig.keys, &mut rig.ticker, channel);
        session.context.ticks = rig.ticks.clone();
        session
    }

    #[test]
    fn full_session_against_the_simulated_control_node() {
        let (mut hmi, control) = ChannelLink::pair();
        let node = ControlNode::new().spawn(control, fast_timing(), CancelToken::new()).expect("spawn");
        let mut rig = Rig::new(concat!(
            "12345=54321=12345=12345=", // enrollment, second round matches
            "+12345=",                  // open the door
            "7",                        // not a menu key
            "-00000=",                  // one wrong password
            "+12345=",                  // a success clears the mistakes
            "-00000=-00000=-00000=",    // three in a row lock out
            "-12345=67890=67890=",      // change the password
        ));

        let mut outcomes = Vec::new();
        {
            let mut session = session(&mut rig, &mut hmi, WaitPolicy::Unbounded, CancelToken::new());
            assert_eq!(session.start(), Ok(Enrollment { rounds: 2 }));
            assert_eq!(session.state(), SessionState::Menu);
            for _ in 0..8 {
                outcomes.push(session.step());
            }
            assert_eq!(session.context().mistakes.get(), 0);
            assert_eq!(session.context().ticks.get(), 0);
            assert_eq!(session.context().entry, password("67890"));
        }
        drop(hmi);
        let node = node.join().expect("control thread").expect("control node");

        assert_eq!(
            outcomes,
            vec![
                Ok(Outcome::DoorCycled { ticks: 33 }),
                Ok(Outcome::Ignored(Symbol::Digit(7))),
                Ok(Outcome::WrongPassword { mistakes: 1 }),
                Ok(Outcome::DoorCycled { ticks: 33 }),
                Ok(Outcome::WrongPassword { mistakes: 1 }),
                Ok(Outcome::WrongPassword { mistakes: 2 }),
                Ok(Outcome::LockedOut),
                Ok(Outcome::PasswordChanged { rounds: 1 }),
            ]
        );
        assert_eq!(node.stored(), Some(password("67890")));
        assert_eq!(
            node.stats(),
            ControlStats {
                enrollments: 2,
                mismatches: 1,
                doors_opened: 2,
                password_changes: 1,
                rejected: 4,
            }
        );
        assert_eq!(rig.keys.remaining(), 0);
        assert!(rig.screen.shown().contains(&"!!! WARNING !!!".to_string()));
    }

    #[test]
    fn unexpected_verdict_shows_a_fault_and_returns_to_the_menu() {
        let (mut hmi, control) = ChannelLink::pair();
        let peer = thread::spawn(move || {
            let mut link = control;
            let mut channel = Channel::new(&mut link, WaitPolicy::Unbounded, CancelToken::new(), fast_timing());
            let check = channel.receive_frame()?;
            let action = channel.receive_frame()?;
            channel.send_command(MatchStatus::Matched)?;
            Ok::<_, LinkError>((check.command, action.command))
        });
        let mut rig = Rig::new("+11111=8");

        let mut session = session(&mut rig, &mut hmi, WaitPolicy::Unbounded, CancelToken::new());
        let outcome = session.step();
        assert_eq!(
            outcome,
            Ok(Outcome::Fault(HmiError::UnexpectedVerdict {
                expected: MatchStatus::OpeningDoor,
                got: MatchStatus::Matched,
            }))
        );
        assert_eq!(session.state(), SessionState::Faulted);

        assert_eq!(session.step(), Ok(Outcome::Ignored(Symbol::Digit(8))));
        assert_eq!(session.state(), SessionState::Menu);
        drop(session);

        assert_eq!(
            peer.join().expect("peer"),
            Ok((Command::SendCheckPassword, Command::OpenDoor))
        );
        assert!(rig.screen.shown().contains(&"Protocol Error".to_string()));
    }

    #[test]
    fn bounded_link_times_out_into_a_fault() {
        let (mut hmi, _control) = ChannelLink::pair();
        let mut rig = Rig::new("-11111=");
        let policy = WaitPolicy::Bounded(Duration::from_millis(20));
        let mut session = session(&mut rig, &mut hmi, policy, CancelToken::new());

        let outcome = session.step();

        assert!(matches!(outcome, Ok(Outcome::Fault(HmiError::Link(LinkError::TimedOut(_))))), "{outcome:?}");
        drop(session);
        assert!(rig.screen.shown().contains(&"Link Timeout".to_string()));
    }

    #[test]
    fn cancellation_ends_the_run_cleanly() {
        let (mut hmi, _control) = ChannelLink::pair();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut rig = Rig::new("12345=");

        let mut session = session(&mut rig, &mut hmi, WaitPolicy::Unbounded, cancel);

        assert_eq!(session.run(), Ok(()));
    }

    #[test]
    fn hardware_errors_are_fatal() {
        let (mut hmi, _control) = ChannelLink::pair();
        let mut rig = Rig::new("");
        let mut session = session(&mut rig, &mut hmi, WaitPolicy::Unbounded, CancelToken::new());

        assert_eq!(session.step(), Err(HmiError::Hal(hmilock_hal::HalError::Disconnected)));
    }
}
