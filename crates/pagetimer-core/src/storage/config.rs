//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Default durations for each timer mode
//! - Pomodoro auto-start behavior
//! - Display options
//!
//! Configuration is stored at `<data dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::timer::{TimerConfig, TimerMode, MINUTE_MS};

/// Default session parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerDefaults {
    #[serde(default = "default_countdown_minutes")]
    pub countdown_minutes: u32,
    /// Soft goal for forward sessions; 0 disables overtime.
    #[serde(default)]
    pub forward_target_minutes: u32,
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u32,
    #[serde(default = "default_short_break")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break")]
    pub long_break_minutes: u32,
    #[serde(default = "default_rounds_before_long_break")]
    pub rounds_before_long_break: u32,
    #[serde(default)]
    pub auto_start_breaks: bool,
    #[serde(default)]
    pub auto_start_work: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Show time left instead of time spent when there is a target.
    #[serde(default = "default_true")]
    pub show_remaining: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data dir>/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerDefaults,
    #[serde(default)]
    pub display: DisplayConfig,
}

fn default_countdown_minutes() -> u32 {
    25
}
fn default_work_minutes() -> u32 {
    25
}
fn default_short_break() -> u32 {
    5
}
fn default_long_break() -> u32 {
    15
}
fn default_rounds_before_long_break() -> u32 {
    crate::timer::DEFAULT_ROUNDS_BEFORE_LONG_BREAK
}
fn default_true() -> bool {
    true
}

impl Default for TimerDefaults {
    fn default() -> Self {
        Self {
            countdown_minutes: default_countdown_minutes(),
            forward_target_minutes: 0,
            work_minutes: default_work_minutes(),
            short_break_minutes: default_short_break(),
            long_break_minutes: default_long_break(),
            rounds_before_long_break: default_rounds_before_long_break(),
            auto_start_breaks: false,
            auto_start_work: false,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_remaining: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timer: TimerDefaults::default(),
            display: DisplayConfig::default(),
        }
    }
}

fn minutes_ms(minutes: u32) -> u64 {
    u64::from(minutes).saturating_mul(MINUTE_MS)
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => value
                        .parse::<bool>()
                        .map(serde_json::Value::Bool)
                        .map_err(|e| invalid(e.to_string()))?,
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load from the data directory, writing the default file on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value in memory by dot-separated key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse
    /// as the key's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Build a session config for `mode` from the stored defaults.
    ///
    /// `minutes` overrides the countdown length (Countdown), the soft
    /// target (Forward) or the work phase (Pomodoro).
    pub fn timer_config(&self, mode: TimerMode, minutes: Option<u32>, book_id: Option<i64>) -> TimerConfig {
        let t = &self.timer;
        let cfg = match mode {
            TimerMode::Forward => TimerConfig::forward()
                .with_target(minutes_ms(minutes.unwrap_or(t.forward_target_minutes))),
            TimerMode::Countdown => {
                TimerConfig::countdown(minutes_ms(minutes.unwrap_or(t.countdown_minutes)))
            }
            TimerMode::Pomodoro => {
                let mut cfg = TimerConfig::pomodoro(
                    minutes_ms(minutes.unwrap_or(t.work_minutes)),
                    minutes_ms(t.short_break_minutes),
                    minutes_ms(t.long_break_minutes),
                )
                .with_auto_start(t.auto_start_breaks, t.auto_start_work);
                cfg.rounds_before_long_break = t.rounds_before_long_break;
                cfg
            }
        };
        cfg.with_book(book_id)
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("using default config: {e}");
            Self::default()
        })
    }
}
