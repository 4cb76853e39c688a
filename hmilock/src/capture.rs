use crate::keys::{wait_for_key, KeySource, Symbol};
use crate::protocol::{Password, PASSWORD_LENGTH};
use crate::screen::Screen;
use hmilock_hal::{HalError, HalResult};
use log::{debug, trace};
use std::time::Duration;

/// Reads a password from the keypad, echoing `*` for every accepted digit.
///
/// Exactly [PASSWORD_LENGTH] digits are taken; digits beyond that are dropped, and the entry
/// ends only with Enter once all digits are in. Anything else is ignored. There is no way to
/// erase a digit.
#[derive(Copy, Clone, Debug)]
pub struct PasswordCapture {
    poll: Duration,
}

impl PasswordCapture {
    pub fn new(poll: Duration) -> Self {
        PasswordCapture { poll }
    }

    pub fn capture(&self, keys: &mut dyn KeySource, screen: &mut dyn Screen) -> HalResult<Password> {
        let mut digits = [0u8; PASSWORD_LENGTH];
        let mut count = 0;

        loop {
            match wait_for_key(keys, self.poll)? {
                Symbol::Digit(digit) if count < PASSWORD_LENGTH => {
                    digits[count] = digit;
                    count += 1;
                    screen.write_char('*')?;
                }
                Symbol::Enter if count == PASSWORD_LENGTH => break,
                symbol => trace!("Ignoring {:?} with {} digits entered.", symbol, count),
            }
        }

        debug!("Password entry complete.");
        Password::new(digits).map_err(|_| HalError::InvalidArgument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{password as password_of, RecordingScreen, ScriptedKeys};

    fn capture(script: &str) -> (HalResult<Password>, RecordingScreen) {
        let mut keys = ScriptedKeys::typing(script);
        let mut screen = RecordingScreen::new();
        let password = PasswordCapture::new(Duration::ZERO).capture(&mut keys, &mut screen);
        (password, screen)
    }

    #[test]
    fn five_digits_and_enter_make_a_password() {
        let (password, screen) = capture("13579=");
        assert_eq!(password, Ok(password_of("13579")));
        assert_eq!(screen.echoed(), "*****");
    }

    #[test]
    fn extra_digits_are_discarded() {
        let (password, screen) = capture("1234567=");
        assert_eq!(password, Ok(password_of("12345")));
        assert_eq!(screen.echoed(), "*****");
    }

    #[test]
    fn early_enter_and_other_keys_are_ignored() {
        let (password, _) = capture("=12+-3=45=");
        assert_eq!(password, Ok(password_of("12345")));
    }

    #[test]
    fn running_out_of_keys_is_an_error() {
        let (password, screen) = capture("12");
        assert_eq!(password, Err(HalError::Disconnected));
        assert_eq!(screen.echoed(), "**");
    }

    mod every_password {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn captured_as_typed(digits in proptest::array::uniform5(0u8..=9), extra in "[0-9]{0,3}") {
                let typed: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
                let (password, _) = capture(&format!("{typed}{extra}="));
                prop_assert_eq!(password, Ok(Password::new(digits).expect("digits in range")));
            }
        }
    }
}
