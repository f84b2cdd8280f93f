use serde::{Deserialize, Serialize};

use crate::timer::{PomodoroPhase, SessionState, SessionStatus, TimerResult};

/// Every state change of a driven session produces an Event.
/// Callers subscribe to them to refresh displays and persist results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SessionStarted {
        target_ms: u64,
        at_ms: i64,
    },
    SessionPaused {
        elapsed_ms: u64,
        pause_count: u32,
        at_ms: i64,
    },
    SessionResumed {
        elapsed_ms: u64,
        at_ms: i64,
    },
    /// A Pomodoro phase ended and the next one began or awaits the user.
    PhaseChanged {
        phase: PomodoroPhase,
        round: u32,
        target_ms: u64,
        awaiting_user: bool,
        at_ms: i64,
    },
    /// Forward session crossed its soft target.
    OvertimeReached {
        elapsed_ms: u64,
        at_ms: i64,
    },
    /// Session reached a terminal status; carries the final result.
    SessionFinished {
        status: SessionStatus,
        result: TimerResult,
    },
    Tick {
        elapsed_ms: u64,
        remaining_ms: u64,
        at_ms: i64,
    },
}

impl Event {
    /// Events implied by moving from `prev` to `next` at `at_ms`.
    ///
    /// Does not emit [`Event::SessionFinished`]; the driver adds it once a
    /// result has been built.
    pub fn between(prev: &SessionState, next: &SessionState, at_ms: i64) -> Vec<Event> {
        let mut events = Vec::new();

        if next.pomodoro_phase != prev.pomodoro_phase || next.pomodoro_round != prev.pomodoro_round {
            events.push(Event::PhaseChanged {
                phase: next.pomodoro_phase,
                round: next.pomodoro_round,
                target_ms: next.target_ms,
                awaiting_user: next.status == SessionStatus::Paused,
                at_ms,
            });
        }
        if next.is_overtime && !prev.is_overtime {
            events.push(Event::OvertimeReached {
                elapsed_ms: next.elapsed_ms,
                at_ms,
            });
        }

        match (prev.status, next.status) {
            (SessionStatus::Idle, SessionStatus::Running) => events.push(Event::SessionStarted {
                target_ms: next.target_ms,
                at_ms,
            }),
            (SessionStatus::Paused, SessionStatus::Running) => {
                events.push(Event::SessionResumed {
                    elapsed_ms: next.elapsed_ms,
                    at_ms,
                })
            }
            (SessionStatus::Running, SessionStatus::Paused) if next.pause_count > prev.pause_count => {
                events.push(Event::SessionPaused {
                    elapsed_ms: next.elapsed_ms,
                    pause_count: next.pause_count,
                    at_ms,
                })
            }
            (SessionStatus::Running, SessionStatus::Running) => events.push(Event::Tick {
                elapsed_ms: next.elapsed_ms,
                remaining_ms: next.remaining_ms(),
                at_ms,
            }),
            _ => {}
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{SessionStateMachine, TimerConfig};

    #[test]
    fn start_and_pause_events() {
        let cfg = TimerConfig::forward();
        let idle = SessionStateMachine::initial(&cfg).unwrap();
        let running = SessionStateMachine::start(&idle, 0).unwrap();
        assert_eq!(
            Event::between(&idle, &running, 0),
            vec![Event::SessionStarted { target_ms: 0, at_ms: 0 }]
        );

        let paused = SessionStateMachine::pause(&running, 2_000).unwrap();
        assert_eq!(
            Event::between(&running, &paused, 2_000),
            vec![Event::SessionPaused {
                elapsed_ms: 2_000,
                pause_count: 1,
                at_ms: 2_000
            }]
        );
    }

    #[test]
    fn phase_boundary_reports_awaiting_user() {
        let cfg = TimerConfig::pomodoro(1_000, 500, 2_000);
        let idle = SessionStateMachine::initial(&cfg).unwrap();
        let running = SessionStateMachine::start(&idle, 0).unwrap();
        let boundary = SessionStateMachine::tick(&running, &cfg, 1_000);
        let events = Event::between(&running, &boundary, 1_000);
        assert_eq!(
            events,
            vec![Event::PhaseChanged {
                phase: PomodoroPhase::ShortBreak,
                round: 1,
                target_ms: 500,
                awaiting_user: true,
                at_ms: 1_000
            }]
        );
    }

    #[test]
    fn event_json_is_tagged() {
        let json = serde_json::to_value(Event::Tick {
            elapsed_ms: 1,
            remaining_ms: 2,
            at_ms: 3,
        })
        .unwrap();
        assert_eq!(json["type"], "tick");
    }
}
