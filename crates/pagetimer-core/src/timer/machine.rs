//! Session state machine.
//!
//! Pure transition functions over [`SessionState`]. Nothing here reads the
//! clock, logs, or keeps state between calls: every function takes the
//! current state and `now` and returns the next state.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused -> (Completed | Stopped)
//! ```
//!
//! ## Pause accounting
//!
//! Session running time is always `now - start_time_ms - total_paused_ms`.
//! `start_time_ms` is set once; each paused interval is added to
//! `total_paused_ms` exactly once, when it closes. Pomodoro phases measure
//! their own elapsed time by subtracting `phase_offset_ms`, the running
//! time already consumed by earlier phases.

use super::config::{TimerConfig, TimerMode};
use super::state::{PomodoroPhase, SessionState, SessionStatus};
use crate::error::TimerError;

/// Namespace for the engine's transition functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStateMachine;

/// What happens after a Pomodoro phase ends.
enum Boundary {
    /// The configured last round is done; the session is over.
    Finished,
    /// The next phase starts immediately.
    Continue,
    /// The next phase waits for the user to resume.
    AwaitUser,
}

impl SessionStateMachine {
    /// Build the idle state for `config`.
    ///
    /// # Errors
    /// Returns [`TimerError::InvalidConfig`] if the config breaks a mode
    /// invariant.
    pub fn initial(config: &TimerConfig) -> Result<SessionState, TimerError> {
        config.validate()?;
        Ok(SessionState {
            status: SessionStatus::Idle,
            elapsed_ms: 0,
            target_ms: config.starting_target_ms(),
            start_time_ms: 0,
            paused_at_ms: None,
            last_resume_time_ms: 0,
            total_paused_ms: 0,
            end_time_ms: None,
            pause_count: 0,
            pomodoro_phase: PomodoroPhase::Work,
            pomodoro_round: 1,
            phase_offset_ms: 0,
            work_elapsed_ms: 0,
            is_completed: false,
            is_overtime: false,
        })
    }

    /// Start an idle session or resume a paused one.
    pub fn start(state: &SessionState, now: i64) -> Result<SessionState, TimerError> {
        let mut next = state.clone();
        match state.status {
            SessionStatus::Idle => {
                next.status = SessionStatus::Running;
                next.start_time_ms = now;
                next.last_resume_time_ms = now;
                next.total_paused_ms = 0;
                next.phase_offset_ms = 0;
                next.elapsed_ms = 0;
            }
            SessionStatus::Paused => {
                close_paused_interval(&mut next, now);
                next.status = SessionStatus::Running;
                next.last_resume_time_ms = now;
            }
            from => {
                return Err(TimerError::InvalidTransition {
                    command: "start",
                    from,
                })
            }
        }
        Ok(next)
    }

    pub fn pause(state: &SessionState, now: i64) -> Result<SessionState, TimerError> {
        if state.status != SessionStatus::Running {
            return Err(TimerError::InvalidTransition {
                command: "pause",
                from: state.status,
            });
        }
        let mut next = state.clone();
        flush_elapsed(&mut next, now);
        next.paused_at_ms = Some(now);
        next.status = SessionStatus::Paused;
        next.pause_count = next.pause_count.saturating_add(1);
        Ok(next)
    }

    /// Advance a running session to `now` and apply the mode rule.
    ///
    /// A tick on a session that is not running returns it unchanged, so a
    /// straggling tick racing a pause is harmless.
    pub fn tick(state: &SessionState, config: &TimerConfig, now: i64) -> SessionState {
        if state.status != SessionStatus::Running {
            return state.clone();
        }

        let mut next = state.clone();
        next.elapsed_ms = phase_elapsed(&next, now).max(state.elapsed_ms);

        match config.mode {
            TimerMode::Forward => {
                if config.target_duration_ms > 0 && next.elapsed_ms > config.target_duration_ms {
                    next.is_overtime = true;
                }
            }
            TimerMode::Countdown => {
                if next.elapsed_ms >= next.target_ms {
                    next.elapsed_ms = next.target_ms;
                    finish(&mut next, SessionStatus::Completed, now);
                }
            }
            TimerMode::Pomodoro => {
                while next.target_ms > 0 && next.elapsed_ms >= next.target_ms {
                    let target = next.target_ms;
                    let overshoot = next.elapsed_ms - target;
                    match cross_boundary(&mut next, config, target) {
                        Boundary::Finished => {
                            next.elapsed_ms = target;
                            finish(&mut next, SessionStatus::Completed, now);
                            break;
                        }
                        Boundary::Continue => {
                            next.phase_offset_ms =
                                next.phase_offset_ms.saturating_add(to_i64(target));
                            next.elapsed_ms = overshoot;
                        }
                        Boundary::AwaitUser => {
                            next.phase_offset_ms = next
                                .phase_offset_ms
                                .saturating_add(to_i64(target.saturating_add(overshoot)));
                            next.elapsed_ms = 0;
                            next.status = SessionStatus::Paused;
                            next.paused_at_ms = Some(now);
                            break;
                        }
                    }
                }
            }
        }
        next
    }

    /// End the current Pomodoro phase early.
    ///
    /// Work time already read is kept. The next phase follows the same
    /// auto-start rule as a natural boundary.
    pub fn skip(
        state: &SessionState,
        config: &TimerConfig,
        now: i64,
    ) -> Result<SessionState, TimerError> {
        let skippable = matches!(state.status, SessionStatus::Running | SessionStatus::Paused);
        if config.mode != TimerMode::Pomodoro || !skippable {
            return Err(TimerError::InvalidTransition {
                command: "skip",
                from: state.status,
            });
        }

        let mut next = state.clone();
        if next.status == SessionStatus::Running {
            flush_elapsed(&mut next, now);
        }
        let elapsed = next.elapsed_ms;
        // Uncapped running time of the phase, measured where it stopped.
        let ran = phase_elapsed(&next, next.paused_at_ms.unwrap_or(now)).max(elapsed);

        match cross_boundary(&mut next, config, elapsed) {
            Boundary::Finished => {
                close_paused_interval(&mut next, now);
                finish(&mut next, SessionStatus::Completed, now);
            }
            boundary => {
                // A waiting phase drops any overshoot; a continuing one keeps it.
                let consumed = match boundary {
                    Boundary::AwaitUser => ran,
                    _ => elapsed,
                };
                next.phase_offset_ms = next.phase_offset_ms.saturating_add(to_i64(consumed));
                next.elapsed_ms = 0;
                match (boundary, next.status) {
                    (Boundary::Continue, SessionStatus::Paused) => {
                        close_paused_interval(&mut next, now);
                        next.status = SessionStatus::Running;
                        next.last_resume_time_ms = now;
                    }
                    (Boundary::AwaitUser, SessionStatus::Running) => {
                        next.status = SessionStatus::Paused;
                        next.paused_at_ms = Some(now);
                    }
                    _ => {}
                }
            }
        }
        Ok(next)
    }

    /// Stop a running or paused session for good.
    pub fn stop(state: &SessionState, now: i64) -> Result<SessionState, TimerError> {
        let mut next = state.clone();
        match state.status {
            SessionStatus::Running => flush_elapsed(&mut next, now),
            SessionStatus::Paused => close_paused_interval(&mut next, now),
            from => {
                return Err(TimerError::InvalidTransition {
                    command: "stop",
                    from,
                })
            }
        }
        finish(&mut next, SessionStatus::Stopped, now);
        Ok(next)
    }
}

// ── Internal ─────────────────────────────────────────────────────

fn to_i64(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

/// Running time of the whole session at `now`.
fn active_ms(state: &SessionState, now: i64) -> i64 {
    now.saturating_sub(state.start_time_ms)
        .saturating_sub(state.total_paused_ms)
}

/// Running time of the current phase at `now`, clamped to zero.
fn phase_elapsed(state: &SessionState, now: i64) -> u64 {
    let elapsed = active_ms(state, now).saturating_sub(state.phase_offset_ms);
    u64::try_from(elapsed).unwrap_or(0)
}

/// Bring `elapsed_ms` up to `now` without crossing the phase target.
fn flush_elapsed(state: &mut SessionState, now: i64) {
    let mut elapsed = phase_elapsed(state, now).max(state.elapsed_ms);
    if state.target_ms > 0 {
        elapsed = elapsed.min(state.target_ms);
    }
    state.elapsed_ms = elapsed;
}

fn close_paused_interval(state: &mut SessionState, now: i64) {
    if let Some(paused_at) = state.paused_at_ms.take() {
        let gap = now.saturating_sub(paused_at).max(0);
        state.total_paused_ms = state.total_paused_ms.saturating_add(gap);
    }
}

fn finish(state: &mut SessionState, status: SessionStatus, now: i64) {
    state.status = status;
    state.paused_at_ms = None;
    state.end_time_ms = Some(now);
    if status == SessionStatus::Completed {
        state.is_completed = true;
    }
}

/// Move to the phase after the current one, crediting `credited_ms` of
/// reading when a Work phase ends.
fn cross_boundary(state: &mut SessionState, config: &TimerConfig, credited_ms: u64) -> Boundary {
    match state.pomodoro_phase {
        PomodoroPhase::Work => {
            if config
                .max_rounds
                .is_some_and(|max| state.pomodoro_round >= max)
            {
                return Boundary::Finished;
            }
            state.work_elapsed_ms = state.work_elapsed_ms.saturating_add(credited_ms);
            let every = config.rounds_before_long_break.max(1);
            if state.pomodoro_round % every == 0 {
                state.pomodoro_phase = PomodoroPhase::LongBreak;
                state.target_ms = config.pomodoro_long_break_ms;
            } else {
                state.pomodoro_phase = PomodoroPhase::ShortBreak;
                state.target_ms = config.pomodoro_short_break_ms;
            }
            if config.auto_start_breaks {
                Boundary::Continue
            } else {
                Boundary::AwaitUser
            }
        }
        PomodoroPhase::ShortBreak | PomodoroPhase::LongBreak => {
            state.pomodoro_round = state.pomodoro_round.saturating_add(1);
            state.pomodoro_phase = PomodoroPhase::Work;
            state.target_ms = config.pomodoro_work_ms;
            if config.auto_start_work {
                Boundary::Continue
            } else {
                Boundary::AwaitUser
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: i64 = 1000;

    fn started(config: &TimerConfig, at: i64) -> SessionState {
        let idle = SessionStateMachine::initial(config).unwrap();
        SessionStateMachine::start(&idle, at).unwrap()
    }

    #[test]
    fn initial_targets_follow_mode() {
        let fwd = SessionStateMachine::initial(&TimerConfig::forward()).unwrap();
        assert_eq!(fwd.target_ms, 0);
        let cd = SessionStateMachine::initial(&TimerConfig::countdown(90_000)).unwrap();
        assert_eq!(cd.target_ms, 90_000);
        let pomo = SessionStateMachine::initial(&TimerConfig::pomodoro(25, 5, 15)).unwrap();
        assert_eq!(pomo.target_ms, 25);
        assert_eq!(pomo.pomodoro_phase, PomodoroPhase::Work);
        assert_eq!(pomo.pomodoro_round, 1);
        assert_eq!(pomo.status, SessionStatus::Idle);
    }

    #[test]
    fn initial_rejects_invalid_config() {
        let err = SessionStateMachine::initial(&TimerConfig::countdown(0)).unwrap_err();
        assert!(matches!(err, TimerError::InvalidConfig { .. }));
    }

    #[test]
    fn start_sets_timestamps() {
        let state = started(&TimerConfig::forward(), 5 * SEC);
        assert_eq!(state.status, SessionStatus::Running);
        assert_eq!(state.start_time_ms, 5 * SEC);
        assert_eq!(state.last_resume_time_ms, 5 * SEC);
        assert_eq!(state.total_paused_ms, 0);
    }

    #[test]
    fn start_while_running_is_rejected() {
        let state = started(&TimerConfig::forward(), 0);
        let err = SessionStateMachine::start(&state, SEC).unwrap_err();
        assert_eq!(
            err,
            TimerError::InvalidTransition {
                command: "start",
                from: SessionStatus::Running
            }
        );
    }

    #[test]
    fn pause_while_idle_is_rejected() {
        let idle = SessionStateMachine::initial(&TimerConfig::forward()).unwrap();
        assert!(SessionStateMachine::pause(&idle, 0).is_err());
    }

    #[test]
    fn pause_flushes_and_counts() {
        let state = started(&TimerConfig::forward(), 0);
        let paused = SessionStateMachine::pause(&state, 7 * SEC).unwrap();
        assert_eq!(paused.status, SessionStatus::Paused);
        assert_eq!(paused.elapsed_ms, 7_000);
        assert_eq!(paused.paused_at_ms, Some(7 * SEC));
        assert_eq!(paused.pause_count, 1);
    }

    #[test]
    fn resume_keeps_start_time_and_accumulates_pause() {
        let cfg = TimerConfig::forward();
        let state = started(&cfg, 0);
        let paused = SessionStateMachine::pause(&state, 10 * SEC).unwrap();
        let resumed = SessionStateMachine::start(&paused, 15 * SEC).unwrap();
        assert_eq!(resumed.start_time_ms, 0);
        assert_eq!(resumed.total_paused_ms, 5_000);
        assert_eq!(resumed.last_resume_time_ms, 15 * SEC);
        let ticked = SessionStateMachine::tick(&resumed, &cfg, 20 * SEC);
        assert_eq!(ticked.elapsed_ms, 15_000);
    }

    #[test]
    fn forward_flags_overtime_without_completing() {
        let cfg = TimerConfig::forward().with_target(60_000);
        let state = started(&cfg, 0);
        let at_target = SessionStateMachine::tick(&state, &cfg, 60 * SEC);
        assert!(!at_target.is_overtime);
        let over = SessionStateMachine::tick(&at_target, &cfg, 61 * SEC);
        assert!(over.is_overtime);
        assert_eq!(over.status, SessionStatus::Running);
    }

    #[test]
    fn forward_without_target_never_overtime() {
        let cfg = TimerConfig::forward();
        let state = started(&cfg, 0);
        let later = SessionStateMachine::tick(&state, &cfg, 10_000 * SEC);
        assert!(!later.is_overtime);
    }

    #[test]
    fn countdown_clamps_late_tick() {
        let cfg = TimerConfig::countdown(30_000);
        let state = started(&cfg, 0);
        let done = SessionStateMachine::tick(&state, &cfg, 31_500);
        assert_eq!(done.status, SessionStatus::Completed);
        assert_eq!(done.elapsed_ms, 30_000);
        assert!(done.is_completed);
        assert_eq!(done.end_time_ms, Some(31_500));
    }

    #[test]
    fn tick_while_paused_is_noop() {
        let cfg = TimerConfig::forward();
        let state = started(&cfg, 0);
        let paused = SessionStateMachine::pause(&state, SEC).unwrap();
        assert_eq!(SessionStateMachine::tick(&paused, &cfg, 9 * SEC), paused);
    }

    #[test]
    fn stop_twice_is_rejected() {
        let state = started(&TimerConfig::forward(), 0);
        let stopped = SessionStateMachine::stop(&state, 3 * SEC).unwrap();
        assert_eq!(stopped.status, SessionStatus::Stopped);
        assert_eq!(stopped.end_time_ms, Some(3 * SEC));
        let err = SessionStateMachine::stop(&stopped, 4 * SEC).unwrap_err();
        assert_eq!(
            err,
            TimerError::InvalidTransition {
                command: "stop",
                from: SessionStatus::Stopped
            }
        );
    }

    #[test]
    fn stop_while_paused_excludes_pause_gap() {
        let state = started(&TimerConfig::forward(), 0);
        let paused = SessionStateMachine::pause(&state, 4 * SEC).unwrap();
        let stopped = SessionStateMachine::stop(&paused, 60 * SEC).unwrap();
        assert_eq!(stopped.elapsed_ms, 4_000);
        assert_eq!(stopped.total_paused_ms, 56_000);
        assert_eq!(stopped.paused_at_ms, None);
    }

    #[test]
    fn stop_from_idle_is_rejected() {
        let idle = SessionStateMachine::initial(&TimerConfig::forward()).unwrap();
        assert!(SessionStateMachine::stop(&idle, 0).is_err());
    }

    #[test]
    fn pomodoro_work_end_waits_for_user() {
        let cfg = TimerConfig::pomodoro(10_000, 2_000, 5_000);
        let state = started(&cfg, 0);
        let boundary = SessionStateMachine::tick(&state, &cfg, 10_400);
        assert_eq!(boundary.status, SessionStatus::Paused);
        assert_eq!(boundary.pomodoro_phase, PomodoroPhase::ShortBreak);
        assert_eq!(boundary.target_ms, 2_000);
        assert_eq!(boundary.elapsed_ms, 0);
        assert_eq!(boundary.work_elapsed_ms, 10_000);
        assert_eq!(boundary.pause_count, 0);

        let resumed = SessionStateMachine::start(&boundary, 20_000).unwrap();
        let mid_break = SessionStateMachine::tick(&resumed, &cfg, 21_000);
        assert_eq!(mid_break.elapsed_ms, 1_000);
    }

    #[test]
    fn pomodoro_auto_start_carries_overshoot() {
        let cfg = TimerConfig::pomodoro(10_000, 2_000, 5_000).with_auto_start(true, true);
        let state = started(&cfg, 0);
        let next = SessionStateMachine::tick(&state, &cfg, 10_500);
        assert_eq!(next.status, SessionStatus::Running);
        assert_eq!(next.pomodoro_phase, PomodoroPhase::ShortBreak);
        assert_eq!(next.elapsed_ms, 500);

        let back_to_work = SessionStateMachine::tick(&next, &cfg, 12_000);
        assert_eq!(back_to_work.pomodoro_phase, PomodoroPhase::Work);
        assert_eq!(back_to_work.pomodoro_round, 2);
        assert_eq!(back_to_work.elapsed_ms, 0);
    }

    #[test]
    fn pomodoro_catches_up_several_phases_in_one_tick() {
        let cfg = TimerConfig::pomodoro(10_000, 2_000, 5_000).with_auto_start(true, true);
        let state = started(&cfg, 0);
        let next = SessionStateMachine::tick(&state, &cfg, 23_000);
        // work 10s, break 2s, work 10s, then 1s into the second break
        assert_eq!(next.pomodoro_round, 2);
        assert_eq!(next.pomodoro_phase, PomodoroPhase::ShortBreak);
        assert_eq!(next.elapsed_ms, 1_000);
        assert_eq!(next.work_elapsed_ms, 20_000);
    }

    #[test]
    fn pomodoro_max_rounds_completes() {
        let cfg = TimerConfig::pomodoro(10_000, 2_000, 5_000)
            .with_auto_start(true, true)
            .with_max_rounds(Some(1));
        let state = started(&cfg, 0);
        let done = SessionStateMachine::tick(&state, &cfg, 10_200);
        assert_eq!(done.status, SessionStatus::Completed);
        assert_eq!(done.pomodoro_phase, PomodoroPhase::Work);
        assert_eq!(done.elapsed_ms, 10_000);
        assert_eq!(done.work_elapsed_ms, 0);
    }

    #[test]
    fn skip_credits_partial_work() {
        let cfg = TimerConfig::pomodoro(10_000, 2_000, 5_000);
        let state = started(&cfg, 0);
        let skipped = SessionStateMachine::skip(&state, &cfg, 4_000).unwrap();
        assert_eq!(skipped.pomodoro_phase, PomodoroPhase::ShortBreak);
        assert_eq!(skipped.status, SessionStatus::Paused);
        assert_eq!(skipped.work_elapsed_ms, 4_000);

        let resumed = SessionStateMachine::start(&skipped, 9_000).unwrap();
        let ticked = SessionStateMachine::tick(&resumed, &cfg, 10_000);
        assert_eq!(ticked.elapsed_ms, 1_000);
    }

    #[test]
    fn skip_past_target_drops_overshoot_before_waiting_break() {
        let cfg = TimerConfig::pomodoro(10_000, 2_000, 5_000);
        let state = started(&cfg, 0);
        let skipped = SessionStateMachine::skip(&state, &cfg, 15_000).unwrap();
        assert_eq!(skipped.status, SessionStatus::Paused);
        assert_eq!(skipped.pomodoro_phase, PomodoroPhase::ShortBreak);
        assert_eq!(skipped.work_elapsed_ms, 10_000);

        let resumed = SessionStateMachine::start(&skipped, 100_000).unwrap();
        let ticked = SessionStateMachine::tick(&resumed, &cfg, 100_000);
        assert_eq!(ticked.status, SessionStatus::Running);
        assert_eq!(ticked.pomodoro_phase, PomodoroPhase::ShortBreak);
        assert_eq!(ticked.pomodoro_round, 1);
        assert_eq!(ticked.elapsed_ms, 0);
    }

    #[test]
    fn skip_while_paused_past_target_drops_overshoot() {
        let cfg = TimerConfig::pomodoro(10_000, 2_000, 5_000);
        let state = started(&cfg, 0);
        let paused = SessionStateMachine::pause(&state, 15_000).unwrap();
        let skipped = SessionStateMachine::skip(&paused, &cfg, 20_000).unwrap();
        assert_eq!(skipped.status, SessionStatus::Paused);

        let resumed = SessionStateMachine::start(&skipped, 30_000).unwrap();
        let ticked = SessionStateMachine::tick(&resumed, &cfg, 31_000);
        assert_eq!(ticked.pomodoro_phase, PomodoroPhase::ShortBreak);
        assert_eq!(ticked.elapsed_ms, 1_000);
    }

    #[test]
    fn skip_from_pause_with_auto_start_resumes() {
        let cfg = TimerConfig::pomodoro(10_000, 2_000, 5_000).with_auto_start(true, true);
        let state = started(&cfg, 0);
        let paused = SessionStateMachine::pause(&state, 3_000).unwrap();
        let skipped = SessionStateMachine::skip(&paused, &cfg, 8_000).unwrap();
        assert_eq!(skipped.status, SessionStatus::Running);
        assert_eq!(skipped.total_paused_ms, 5_000);
        let ticked = SessionStateMachine::tick(&skipped, &cfg, 9_000);
        assert_eq!(ticked.elapsed_ms, 1_000);
        assert_eq!(ticked.pomodoro_phase, PomodoroPhase::ShortBreak);
    }

    #[test]
    fn skip_outside_pomodoro_is_rejected() {
        let cfg = TimerConfig::countdown(10_000);
        let state = started(&cfg, 0);
        assert!(SessionStateMachine::skip(&state, &cfg, 1_000).is_err());
    }

    #[test]
    fn backwards_clock_is_clamped() {
        let cfg = TimerConfig::forward();
        let state = started(&cfg, 10 * SEC);
        let ticked = SessionStateMachine::tick(&state, &cfg, 9 * SEC);
        assert_eq!(ticked.elapsed_ms, 0);
    }
}
