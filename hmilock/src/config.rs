//! Behaviour settings, stored as JSON next to the binary.

use crate::link::{ChannelTiming, WaitPolicy};
use dotenv::var;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub timing: TimingConfig,
    pub door: DoorConfig,
    pub lockout: LockoutConfig,
    pub link: LinkConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    /// How long transient messages stay on screen.
    pub presentation_ms: u64,
    pub inter_byte_ms: u64,
    pub key_poll_ms: u64,
    pub debounce_ms: u64,
    pub tick_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            presentation_ms: 1000,
            inter_byte_ms: 15,
            key_poll_ms: 20,
            debounce_ms: 30,
            tick_interval_ms: 1000,
        }
    }
}

/// Phase lengths of the door sequence, in ticks.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DoorConfig {
    pub open_ticks: u32,
    pub hold_ticks: u32,
    pub close_ticks: u32,
}

impl Default for DoorConfig {
    fn default() -> Self {
        DoorConfig {
            open_ticks: 15,
            hold_ticks: 3,
            close_ticks: 15,
        }
    }
}

/// When the warning phase counts as over.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WarningCompletion {
    /// The tick count must hit the duration exactly. A skipped tick means waiting forever.
    #[default]
    Exact,
    AtLeast,
}

impl WarningCompletion {
    pub fn is_complete(self, ticks: u32, duration: u32) -> bool {
        match self {
            WarningCompletion::Exact => ticks == duration,
            WarningCompletion::AtLeast => ticks >= duration,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LockoutConfig {
    pub max_mistakes: u32,
    pub warning_ticks: u32,
    pub completion: WarningCompletion,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        LockoutConfig {
            max_mistakes: 3,
            warning_ticks: 60,
            completion: WarningCompletion::Exact,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LinkConfig {
    /// Limit for every handshake wait. `None` waits forever.
    pub timeout_ms: Option<u64>,
    pub poll_slice_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            timeout_ms: None,
            poll_slice_ms: 100,
        }
    }
}

impl TimingConfig {
    pub fn presentation(&self) -> Duration {
        Duration::from_millis(self.presentation_ms)
    }

    pub fn key_poll(&self) -> Duration {
        Duration::from_millis(self.key_poll_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl LinkConfig {
    pub fn wait_policy(&self) -> WaitPolicy {
        match self.timeout_ms {
            Some(ms) => WaitPolicy::Bounded(Duration::from_millis(ms)),
            None => WaitPolicy::Unbounded,
        }
    }
}

impl Config {
    /// Path of the config file: `CONFIG_FILE`, or `config.json`.
    pub fn path() -> PathBuf {
        PathBuf::from(var("CONFIG_FILE").unwrap_or_else(|_| "config.json".to_string()))
    }

    /// Loads the config file, or returns `None` if there is none.
    pub fn try_load() -> Result<Option<Self>, ConfigError> {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(path)?);
        let config: Config = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(Some(config))
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("timing.tick_interval_ms must not be zero".into()));
        }
        if self.link.poll_slice_ms == 0 {
            return Err(ConfigError::Invalid("link.poll_slice_ms must not be zero".into()));
        }
        if self.lockout.max_mistakes == 0 {
            return Err(ConfigError::Invalid("lockout.max_mistakes must not be zero".into()));
        }
        Ok(())
    }

    pub fn channel_timing(&self) -> ChannelTiming {
        ChannelTiming {
            inter_byte: Duration::from_millis(self.timing.inter_byte_ms),
            poll_slice: Duration::from_millis(self.link.poll_slice_ms),
        }
    }
}
