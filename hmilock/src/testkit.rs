//! Test doubles for the peripherals.

use crate::config::{Config, TimingConfig};
use crate::keys::{KeySource, Symbol};
use crate::link::ChannelTiming;
use crate::protocol::Password;
use crate::screen::Screen;
use crate::ticks::TickCounter;
use hmilock_hal::timer::{TickCallback, TickSource};
use hmilock_hal::{HalError, HalResult};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub fn password(digits: &str) -> Password {
    digits.parse().expect("valid password")
}

pub fn fast_timing() -> ChannelTiming {
    ChannelTiming {
        inter_byte: Duration::ZERO,
        poll_slice: Duration::from_millis(5),
    }
}

pub fn fast_config() -> Config {
    let mut config = Config {
        timing: TimingConfig {
            presentation_ms: 0,
            inter_byte_ms: 0,
            key_poll_ms: 0,
            debounce_ms: 0,
            tick_interval_ms: 1,
        },
        ..Config::default()
    };
    config.link.poll_slice_ms = 5;
    config
}

/// Plays back a fixed key sequence, with an empty poll before every key. Fails with
/// [HalError::Disconnected] once the script is used up.
#[derive(Debug)]
pub struct ScriptedKeys {
    script: VecDeque<Option<Symbol>>,
}

impl ScriptedKeys {
    /// `0`-`9` are digits, `=` is Enter, `+` and `-` are themselves.
    pub fn typing(keys: &str) -> Self {
        let script = keys
            .chars()
            .flat_map(|c| {
                let symbol = match c {
                    '0'..='9' => Symbol::Digit(c as u8 - b'0'),
                    '=' => Symbol::Enter,
                    '+' => Symbol::Plus,
                    '-' => Symbol::Minus,
                    other => Symbol::Other(other),
                };
                [None, Some(symbol)]
            })
            .collect();
        ScriptedKeys { script }
    }

    pub fn remaining(&self) -> usize {
        self.script.iter().flatten().count()
    }
}

impl KeySource for ScriptedKeys {
    fn poll(&mut self) -> HalResult<Option<Symbol>> {
        self.script.pop_front().ok_or(HalError::Disconnected)
    }
}

/// Remembers what was written, for assertions.
#[derive(Debug, Default)]
pub struct RecordingScreen {
    rows: Vec<String>,
    cursor: (usize, usize),
    strings: Vec<String>,
    chars: String,
}

impl RecordingScreen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every string written, in order.
    pub fn shown(&self) -> Vec<String> {
        self.strings.clone()
    }

    /// Every single character written, in order.
    pub fn echoed(&self) -> &str {
        &self.chars
    }

    /// Whether nothing has been written since the last clear.
    pub fn is_blank(&self) -> bool {
        self.rows.iter().all(|row| row.trim().is_empty())
    }

    pub fn row(&self, row: usize) -> &str {
        self.rows.get(row).map(String::as_str).unwrap_or("")
    }

    fn put(&mut self, ch: char) {
        let (row, col) = self.cursor;
        if self.rows.len() <= row {
            self.rows.resize(row + 1, String::new());
        }
        let mut line: Vec<char> = self.rows[row].chars().collect();
        if line.len() <= col {
            line.resize(col + 1, ' ');
        }
        line[col] = ch;
        self.rows[row] = line.into_iter().collect();
        self.cursor = (row, col + 1);
    }
}

impl Screen for RecordingScreen {
    fn clear(&mut self) -> HalResult<()> {
        self.rows.clear();
        self.cursor = (0, 0);
        Ok(())
    }

    fn move_cursor(&mut self, row: usize, col: usize) -> HalResult<()> {
        self.cursor = (row, col);
        Ok(())
    }

    fn write_str(&mut self, text: &str) -> HalResult<()> {
        self.strings.push(text.to_string());
        text.chars().for_each(|c| self.put(c));
        Ok(())
    }

    fn write_char(&mut self, ch: char) -> HalResult<()> {
        self.chars.push(ch);
        self.put(ch);
        Ok(())
    }
}

/// Tick source that only ticks once the previous count was seen by a waiter, so no value is
/// ever skipped. The interval is ignored.
#[derive(Debug)]
pub struct LockstepTicker {
    ticks: TickCounter,
    step: u32,
    starts: u32,
    worker: Option<(Arc<AtomicBool>, JoinHandle<()>)>,
}

impl LockstepTicker {
    pub fn new(ticks: TickCounter) -> Self {
        Self::skipping(ticks, 1)
    }

    /// Ticks `step` times per observation instead of once.
    pub fn skipping(ticks: TickCounter, step: u32) -> Self {
        LockstepTicker { ticks, step, starts: 0, worker: None }
    }

    pub fn starts(&self) -> u32 {
        self.starts
    }
}

impl TickSource for LockstepTicker {
    fn start(&mut self, _interval: Duration, mut callback: TickCallback) -> HalResult<()> {
        self.stop()?;
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let ticks = self.ticks.clone();
        let step = self.step;
        let handle = thread::spawn(move || {
            while ticks.await_observed(&flag) {
                for _ in 0..step {
                    callback();
                }
            }
        });
        self.starts += 1;
        self.worker = Some((stop, handle));
        Ok(())
    }

    fn stop(&mut self) -> HalResult<()> {
        if let Some((stop, handle)) = self.worker.take() {
            stop.store(true, Ordering::Release);
            handle
                .join()
                .map_err(|_| HalError::Other("lock-step ticker panicked".into()))?;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for LockstepTicker {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
