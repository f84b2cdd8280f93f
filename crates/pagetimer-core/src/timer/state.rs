use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Running,
    Paused,
    Completed,
    Stopped,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Running => "running",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Stopped)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PomodoroPhase {
    Work,
    ShortBreak,
    LongBreak,
}

impl PomodoroPhase {
    pub fn is_break(&self) -> bool {
        !matches!(self, PomodoroPhase::Work)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PomodoroPhase::Work => "Work",
            PomodoroPhase::ShortBreak => "Short Break",
            PomodoroPhase::LongBreak => "Long Break",
        }
    }
}

/// Lifecycle data of one timer session.
///
/// Only the functions in [`super::machine`] produce new values; callers
/// own the current one and pass it back in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub status: SessionStatus,
    /// Running time of the current phase (whole session outside Pomodoro).
    pub elapsed_ms: u64,
    /// Goal for the current phase; 0 when there is none.
    pub target_ms: u64,
    pub start_time_ms: i64,
    pub paused_at_ms: Option<i64>,
    pub last_resume_time_ms: i64,
    /// Sum of every closed paused interval.
    pub total_paused_ms: i64,
    pub end_time_ms: Option<i64>,
    pub pause_count: u32,
    pub pomodoro_phase: PomodoroPhase,
    pub pomodoro_round: u32,
    /// Session running time consumed by earlier Pomodoro phases.
    #[serde(default)]
    pub phase_offset_ms: i64,
    /// Running time of every finished Work phase.
    #[serde(default)]
    pub work_elapsed_ms: u64,
    pub is_completed: bool,
    pub is_overtime: bool,
}

impl SessionState {
    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Time left in the current phase; 0 when there is no target.
    pub fn remaining_ms(&self) -> u64 {
        self.target_ms.saturating_sub(self.elapsed_ms)
    }

    /// 0.0 .. 1.0 progress within the current phase.
    pub fn progress(&self) -> f64 {
        if self.target_ms == 0 {
            return 0.0;
        }
        (self.elapsed_ms as f64 / self.target_ms as f64).min(1.0)
    }
}
