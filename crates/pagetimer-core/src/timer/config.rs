use serde::{Deserialize, Serialize};

use crate::error::TimerError;

pub const MINUTE_MS: u64 = 60 * 1000;
pub const DEFAULT_ROUNDS_BEFORE_LONG_BREAK: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    /// Open-ended stopwatch with an optional overtime threshold.
    Forward,
    /// Fixed duration that completes when the target is reached.
    Countdown,
    /// Work/break cycles.
    Pomodoro,
}

impl TimerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerMode::Forward => "forward",
            TimerMode::Countdown => "countdown",
            TimerMode::Pomodoro => "pomodoro",
        }
    }
}

impl std::fmt::Display for TimerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "forward" | "stopwatch" => Ok(TimerMode::Forward),
            "countdown" => Ok(TimerMode::Countdown),
            "pomodoro" => Ok(TimerMode::Pomodoro),
            other => Err(format!("unknown timer mode: {other}")),
        }
    }
}

/// Immutable parameters of one reading session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    pub mode: TimerMode,
    /// Countdown goal, or Forward overtime threshold when > 0.
    #[serde(default)]
    pub target_duration_ms: u64,
    #[serde(default)]
    pub pomodoro_work_ms: u64,
    #[serde(default)]
    pub pomodoro_short_break_ms: u64,
    #[serde(default)]
    pub pomodoro_long_break_ms: u64,
    #[serde(default)]
    pub auto_start_breaks: bool,
    #[serde(default)]
    pub auto_start_work: bool,
    /// Every Nth work phase is followed by a long break.
    #[serde(default = "default_rounds_before_long_break")]
    pub rounds_before_long_break: u32,
    /// Completing the work phase of this round ends the session.
    #[serde(default)]
    pub max_rounds: Option<u32>,
    #[serde(default)]
    pub book_id: Option<i64>,
}

fn default_rounds_before_long_break() -> u32 {
    DEFAULT_ROUNDS_BEFORE_LONG_BREAK
}

impl TimerConfig {
    pub fn forward() -> Self {
        Self::base(TimerMode::Forward)
    }

    pub fn countdown(target_duration_ms: u64) -> Self {
        Self {
            target_duration_ms,
            ..Self::base(TimerMode::Countdown)
        }
    }

    pub fn pomodoro(work_ms: u64, short_break_ms: u64, long_break_ms: u64) -> Self {
        Self {
            pomodoro_work_ms: work_ms,
            pomodoro_short_break_ms: short_break_ms,
            pomodoro_long_break_ms: long_break_ms,
            ..Self::base(TimerMode::Pomodoro)
        }
    }

    fn base(mode: TimerMode) -> Self {
        Self {
            mode,
            target_duration_ms: 0,
            pomodoro_work_ms: 0,
            pomodoro_short_break_ms: 0,
            pomodoro_long_break_ms: 0,
            auto_start_breaks: false,
            auto_start_work: false,
            rounds_before_long_break: DEFAULT_ROUNDS_BEFORE_LONG_BREAK,
            max_rounds: None,
            book_id: None,
        }
    }

    pub fn with_target(mut self, target_duration_ms: u64) -> Self {
        self.target_duration_ms = target_duration_ms;
        self
    }

    pub fn with_auto_start(mut self, breaks: bool, work: bool) -> Self {
        self.auto_start_breaks = breaks;
        self.auto_start_work = work;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: Option<u32>) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_book(mut self, book_id: Option<i64>) -> Self {
        self.book_id = book_id;
        self
    }

    /// Check the mode invariants.
    ///
    /// # Errors
    /// Returns [`TimerError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<(), TimerError> {
        match self.mode {
            TimerMode::Forward => Ok(()),
            TimerMode::Countdown => {
                if self.target_duration_ms == 0 {
                    return Err(TimerError::invalid_config(
                        "target_duration_ms",
                        "countdown requires a positive target",
                    ));
                }
                Ok(())
            }
            TimerMode::Pomodoro => {
                let durations = [
                    ("pomodoro_work_ms", self.pomodoro_work_ms),
                    ("pomodoro_short_break_ms", self.pomodoro_short_break_ms),
                    ("pomodoro_long_break_ms", self.pomodoro_long_break_ms),
                ];
                for (field, value) in durations {
                    if value == 0 {
                        return Err(TimerError::invalid_config(
                            field,
                            "pomodoro phase durations must be positive",
                        ));
                    }
                }
                if self.rounds_before_long_break == 0 {
                    return Err(TimerError::invalid_config(
                        "rounds_before_long_break",
                        "must be at least 1",
                    ));
                }
                if self.max_rounds == Some(0) {
                    return Err(TimerError::invalid_config("max_rounds", "must be at least 1"));
                }
                Ok(())
            }
        }
    }

    /// Target for the first phase of a session.
    pub fn starting_target_ms(&self) -> u64 {
        match self.mode {
            TimerMode::Forward => 0,
            TimerMode::Countdown => self.target_duration_ms,
            TimerMode::Pomodoro => self.pomodoro_work_ms,
        }
    }
}
