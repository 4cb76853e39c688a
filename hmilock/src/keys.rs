//! Key input as the session sees it: one symbol per press.

use crate::utils::{CollectionExt, TryGetSingleError};
use hmilock_hal::HalResult;
use hmilock_hal::keypad::{Keypad, KeypadKey};
use log::debug;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// A pressed key.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Symbol {
    /// A digit key, 0..=9.
    Digit(u8),
    /// The `=` key.
    Enter,
    /// The `+` key.
    Plus,
    /// The `-` key.
    Minus,
    Other(char),
}

impl From<KeypadKey> for Symbol {
    fn from(key: KeypadKey) -> Self {
        match key {
            KeypadKey::KeyEquals => Symbol::Enter,
            KeypadKey::KeyPlus => Symbol::Plus,
            KeypadKey::KeyMinus => Symbol::Minus,
            key => match key.digit() {
                Some(digit) => Symbol::Digit(digit),
                None => Symbol::Other(key.to_char()),
            },
        }
    }
}

pub trait KeySource {
    /// Returns the symbol of a fresh key press, or `None` if there is none right now.
    fn poll(&mut self) -> HalResult<Option<Symbol>>;
}

/// Blocks until a key is pressed, polling every `interval`.
pub fn wait_for_key(keys: &mut dyn KeySource, interval: Duration) -> HalResult<Symbol> {
    loop {
        if let Some(symbol) = keys.poll()? {
            return Ok(symbol);
        }
        sleep(interval);
    }
}

/// Turns the raw keypad state into presses.
///
/// A key counts once it has been the only key down for `debounce`, and again only after it
/// was released. Chords are ignored.
#[derive(Debug)]
pub struct KeypadKeys<'a> {
    keypad: &'a dyn Keypad<Key = KeypadKey>,
    debounce: Duration,
    candidate: Option<(KeypadKey, Instant)>,
    reported: Option<KeypadKey>,
}

impl<'a> KeypadKeys<'a> {
    pub fn new(keypad: &'a dyn Keypad<Key = KeypadKey>, debounce: Duration) -> Self {
        KeypadKeys {
            keypad,
            debounce,
            candidate: None,
            reported: None,
        }
    }

    /// Feeds one reading taken at `now`; returns a key if it completes a press.
    ///
    /// Only an empty reading counts as a release. A chord restarts the debounce window but
    /// leaves the last reported key held.
    fn update(&mut self, pressed: &[KeypadKey], now: Instant) -> Option<KeypadKey> {
        let key = match pressed.try_get_single() {
            Ok(&key) => key,
            Err(TryGetSingleError::Empty) => {
                self.candidate = None;
                self.reported = None;
                return None;
            }
            Err(TryGetSingleError::MoreThanOne) => {
                self.candidate = None;
                return None;
            }
        };
        if self.reported == Some(key) {
            return None;
        }
        match self.candidate {
            Some((candidate, since)) if candidate == key => {
                if now.duration_since(since) >= self.debounce {
                    self.reported = Some(key);
                    self.candidate = None;
                    return Some(key);
                }
            }
            _ => self.candidate = Some((key, now)),
        }
        None
    }
}

impl KeySource for KeypadKeys<'_> {
    fn poll(&mut self) -> HalResult<Option<Symbol>> {
        let pressed = self.keypad.read()?;
        let fresh = self.update(&pressed, Instant::now());
        if let Some(key) = fresh {
            debug!("Key pressed: {:?}", key);
        }
        Ok(fresh.map(Symbol::from))
    }
}
