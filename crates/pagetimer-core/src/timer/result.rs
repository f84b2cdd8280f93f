use serde::{Deserialize, Serialize};

use super::config::{TimerConfig, TimerMode};
use super::state::{PomodoroPhase, SessionState};
use crate::error::TimerError;

/// Final record of one terminated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerResult {
    /// Time actually read, pauses and breaks excluded.
    pub duration_ms: u64,
    pub book_id: Option<i64>,
    pub pause_count: u32,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub mode: TimerMode,
    pub pomodoro_rounds_completed: u32,
    pub target_reached: bool,
}

/// Turns a terminated [`SessionState`] into a [`TimerResult`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultBuilder;

impl ResultBuilder {
    /// # Errors
    /// Returns [`TimerError::InvalidTransition`] unless the session is
    /// Completed or Stopped.
    pub fn build(state: &SessionState, config: &TimerConfig) -> Result<TimerResult, TimerError> {
        if !state.is_terminal() {
            return Err(TimerError::InvalidTransition {
                command: "build a result for",
                from: state.status,
            });
        }

        let duration_ms = match config.mode {
            TimerMode::Forward | TimerMode::Countdown => state.elapsed_ms,
            TimerMode::Pomodoro => {
                let current = if state.pomodoro_phase == PomodoroPhase::Work {
                    state.elapsed_ms
                } else {
                    0
                };
                state.work_elapsed_ms.saturating_add(current)
            }
        };

        let target_reached = match config.mode {
            TimerMode::Forward => {
                config.target_duration_ms > 0 && duration_ms >= config.target_duration_ms
            }
            TimerMode::Countdown => duration_ms >= config.target_duration_ms,
            TimerMode::Pomodoro => true,
        };

        let pomodoro_rounds_completed = match config.mode {
            TimerMode::Pomodoro => state.pomodoro_round,
            _ => 0,
        };

        Ok(TimerResult {
            duration_ms,
            book_id: config.book_id,
            pause_count: state.pause_count,
            start_time_ms: state.start_time_ms,
            end_time_ms: state.end_time_ms.unwrap_or(state.start_time_ms),
            mode: config.mode,
            pomodoro_rounds_completed,
            target_reached,
        })
    }
}
