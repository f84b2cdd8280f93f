//! Cooperative driver for one session.
//!
//! [`TimerSession`] owns the session state behind a single async mutex.
//! Commands and ticks both read the clock while holding that lock, so a
//! tick computed for an earlier instant can never land after a pause or
//! stop taken later, and vice versa.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time;

use super::clock::Clock;
use super::config::TimerConfig;
use super::machine::SessionStateMachine;
use super::result::{ResultBuilder, TimerResult};
use super::state::SessionState;
use crate::error::TimerError;
use crate::events::Event;

pub const TICK_INTERVAL: Duration = Duration::from_millis(1000);
const EVENT_CAPACITY: usize = 64;

struct Inner {
    state: SessionState,
    result: Option<TimerResult>,
    last_now_ms: i64,
}

struct Shared {
    config: TimerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<Event>,
}

impl Shared {
    /// Install `next` and publish what changed. Builds the result the
    /// first time the session turns terminal.
    fn install(&self, inner: &mut Inner, next: SessionState, now: i64) {
        for event in Event::between(&inner.state, &next, now) {
            let _ = self.events.send(event);
        }
        inner.state = next;

        if inner.state.is_terminal() && inner.result.is_none() {
            match ResultBuilder::build(&inner.state, &self.config) {
                Ok(result) => {
                    tracing::info!(
                        mode = %result.mode,
                        duration_ms = result.duration_ms,
                        status = %inner.state.status,
                        "reading session finished"
                    );
                    let _ = self.events.send(Event::SessionFinished {
                        status: inner.state.status,
                        result: result.clone(),
                    });
                    inner.result = Some(result);
                }
                Err(e) => tracing::error!("failed to build session result: {e}"),
            }
        }
    }

    fn now(&self, inner: &mut Inner) -> i64 {
        let now = self.clock.now_ms();
        if now < inner.last_now_ms {
            tracing::warn!(
                now_ms = now,
                previous_ms = inner.last_now_ms,
                "clock moved backwards; elapsed time is clamped"
            );
        }
        inner.last_now_ms = inner.last_now_ms.max(now);
        now
    }
}

/// One driven reading session.
///
/// Cloning is cheap; all clones drive the same session.
#[derive(Clone)]
pub struct TimerSession {
    shared: Arc<Shared>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
}

impl TimerSession {
    /// Create an idle session.
    ///
    /// # Errors
    /// Returns [`TimerError::InvalidConfig`] if `config` is invalid.
    pub fn new(config: TimerConfig, clock: Arc<dyn Clock>) -> Result<Self, TimerError> {
        let state = SessionStateMachine::initial(&config)?;
        Ok(Self::from_state(config, state, clock))
    }

    /// Adopt a state produced earlier, e.g. one restored from storage.
    pub fn from_state(config: TimerConfig, state: SessionState, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let result = if state.is_terminal() {
            ResultBuilder::build(&state, &config).ok()
        } else {
            None
        };
        Self {
            shared: Arc::new(Shared {
                config,
                clock,
                inner: Mutex::new(Inner {
                    state,
                    result,
                    last_now_ms: i64::MIN,
                }),
                events,
            }),
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: TICK_INTERVAL,
        }
    }

    pub fn config(&self) -> &TimerConfig {
        &self.shared.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionState {
        self.shared.inner.lock().await.state.clone()
    }

    /// The final result, once the session has terminated.
    pub async fn result(&self) -> Option<TimerResult> {
        self.shared.inner.lock().await.result.clone()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start or resume the session and (re)arm the ticker.
    pub async fn start(&self) -> Result<SessionState, TimerError> {
        let state = self
            .command(|state, _, now| SessionStateMachine::start(state, now))
            .await?;
        tracing::debug!(elapsed_ms = state.elapsed_ms, "session running");
        Ok(state)
    }

    pub async fn pause(&self) -> Result<SessionState, TimerError> {
        let state = self
            .command(|state, _, now| SessionStateMachine::pause(state, now))
            .await?;
        tracing::debug!(elapsed_ms = state.elapsed_ms, "session paused");
        Ok(state)
    }

    /// Skip the current Pomodoro phase.
    pub async fn skip(&self) -> Result<SessionState, TimerError> {
        self.command(|state, config, now| SessionStateMachine::skip(state, config, now))
            .await
    }

    /// Stop the session and return its result.
    pub async fn stop(&self) -> Result<TimerResult, TimerError> {
        let state = self
            .command(|state, _, now| SessionStateMachine::stop(state, now))
            .await?;
        let result = self.result().await;
        match result {
            Some(result) => Ok(result),
            None => ResultBuilder::build(&state, &self.shared.config),
        }
    }

    /// Stop the session, or hand back its result if it already ended on
    /// its own (a countdown or pomodoro that completed before the stop).
    pub async fn stop_or_result(&self) -> Result<TimerResult, TimerError> {
        if let Some(result) = self.result().await {
            return Ok(result);
        }
        match self.stop().await {
            Err(TimerError::InvalidTransition { from, .. }) if from.is_terminal() => {
                match self.result().await {
                    Some(result) => Ok(result),
                    None => ResultBuilder::build(&self.snapshot().await, &self.shared.config),
                }
            }
            other => other,
        }
    }

    /// Abort the ticker task. Safe to call any number of times, in any
    /// status.
    pub async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    /// Arm the ticker for a session adopted in the running state.
    /// Does nothing if it is already ticking or the session is not running.
    pub async fn resume_ticking(&self) {
        let guard = self.shared.inner.lock().await;
        let mut ticker = self.ticker.lock().await;
        let idle = ticker.as_ref().map_or(true, JoinHandle::is_finished);
        if guard.state.is_running() && idle {
            *ticker = Some(self.spawn_ticker());
        }
    }

    pub async fn is_ticking(&self) -> bool {
        self.ticker
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Apply `op` and bring the ticker in line with the new status.
    ///
    /// The ticker slot is updated before the state lock is released, so two
    /// racing commands can never leave a running session without a ticker.
    /// Lock order is always state, then ticker.
    async fn command<F>(&self, op: F) -> Result<SessionState, TimerError>
    where
        F: FnOnce(&SessionState, &TimerConfig, i64) -> Result<SessionState, TimerError>,
    {
        let shared = &self.shared;
        let mut guard = shared.inner.lock().await;
        let now = shared.now(&mut guard);
        let next = op(&guard.state, &shared.config, now)?;
        shared.install(&mut guard, next, now);

        let mut ticker = self.ticker.lock().await;
        if let Some(handle) = ticker.take() {
            handle.abort();
        }
        if guard.state.is_running() {
            *ticker = Some(self.spawn_ticker());
        }
        Ok(guard.state.clone())
    }

    fn spawn_ticker(&self) -> JoinHandle<()> {
        let shared = self.shared.clone();
        let tick_interval = self.tick_interval;

        tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;

                let mut guard = shared.inner.lock().await;
                if !guard.state.is_running() {
                    break;
                }
                let now = shared.now(&mut guard);
                let next = SessionStateMachine::tick(&guard.state, &shared.config, now);
                shared.install(&mut guard, next, now);
                if !guard.state.is_running() {
                    tracing::debug!(status = %guard.state.status, "ticker stopping");
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{MonotonicClock, SessionStatus};

    fn session(config: TimerConfig) -> TimerSession {
        TimerSession::new(config, Arc::new(MonotonicClock::with_base(0))).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_completes_on_its_own() {
        let timer = session(TimerConfig::countdown(3_000));
        timer.start().await.unwrap();
        time::sleep(Duration::from_millis(3_500)).await;

        let state = timer.snapshot().await;
        assert_eq!(state.status, SessionStatus::Completed);
        assert_eq!(state.elapsed_ms, 3_000);
        let result = timer.result().await.unwrap();
        assert_eq!(result.duration_ms, 3_000);
        assert!(result.target_reached);
        assert!(!timer.is_ticking().await);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_elapsed() {
        let timer = session(TimerConfig::forward());
        timer.start().await.unwrap();
        time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(timer.snapshot().await.elapsed_ms, 2_000);

        let paused = timer.pause().await.unwrap();
        assert_eq!(paused.elapsed_ms, 2_500);
        time::sleep(Duration::from_millis(5_000)).await;
        assert_eq!(timer.snapshot().await.elapsed_ms, 2_500);

        timer.start().await.unwrap();
        time::sleep(Duration::from_millis(1_200)).await;
        assert_eq!(timer.snapshot().await.elapsed_ms, 3_500);

        let result = timer.stop().await.unwrap();
        assert_eq!(result.duration_ms, 3_700);
        assert_eq!(result.pause_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_stop_is_rejected_and_cancel_is_idempotent() {
        let timer = session(TimerConfig::forward());
        timer.start().await.unwrap();
        timer.stop().await.unwrap();
        assert!(matches!(
            timer.stop().await,
            Err(TimerError::InvalidTransition { command: "stop", .. })
        ));
        timer.cancel_ticker().await;
        timer.cancel_ticker().await;
        assert!(!timer.is_ticking().await);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_event_carries_result() {
        let timer = session(TimerConfig::countdown(2_000));
        let mut events = timer.subscribe();
        timer.start().await.unwrap();
        time::sleep(Duration::from_millis(2_100)).await;

        let mut finished = None;
        while let Ok(event) = events.try_recv() {
            if let Event::SessionFinished { status, result } = event {
                finished = Some((status, result));
            }
        }
        let (status, result) = finished.expect("session finished event");
        assert_eq!(status, SessionStatus::Completed);
        assert_eq!(result.duration_ms, 2_000);
    }

    #[tokio::test(start_paused = true)]
    async fn pomodoro_boundary_parks_the_ticker() {
        let timer = session(TimerConfig::pomodoro(2_000, 1_000, 3_000));
        timer.start().await.unwrap();
        time::sleep(Duration::from_millis(4_000)).await;

        let state = timer.snapshot().await;
        assert_eq!(state.status, SessionStatus::Paused);
        assert_eq!(state.pomodoro_phase, crate::timer::PomodoroPhase::ShortBreak);
        assert_eq!(state.elapsed_ms, 0);
        assert!(!timer.is_ticking().await);
    }

    #[tokio::test(start_paused = true)]
    async fn adopted_running_state_resumes_ticking() {
        let config = TimerConfig::forward();
        let idle = SessionStateMachine::initial(&config).unwrap();
        let running = SessionStateMachine::start(&idle, 0).unwrap();
        let timer = TimerSession::from_state(
            config,
            running,
            Arc::new(MonotonicClock::with_base(4_000)),
        );
        assert!(!timer.is_ticking().await);

        timer.resume_ticking().await;
        timer.resume_ticking().await;
        assert!(timer.is_ticking().await);
        time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(timer.snapshot().await.elapsed_ms, 5_000);
    }

    #[tokio::test(start_paused = true)]
    async fn racing_pause_and_start_keep_ticker_in_step() {
        let timer = session(TimerConfig::countdown(60_000));
        let other = timer.clone();
        timer.start().await.unwrap();

        for _ in 0..50 {
            let _ = tokio::join!(other.pause(), timer.start());
            let running = timer.snapshot().await.is_running();
            assert_eq!(running, timer.is_ticking().await);
            let _ = tokio::join!(timer.start(), other.pause());
            let running = timer.snapshot().await.is_running();
            assert_eq!(running, timer.is_ticking().await);
        }

        if timer.snapshot().await.status == SessionStatus::Paused {
            timer.start().await.unwrap();
        }
        time::sleep(Duration::from_secs(61)).await;
        assert_eq!(timer.snapshot().await.status, SessionStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_after_completion_hands_back_result() {
        let timer = session(TimerConfig::countdown(2_000));
        timer.start().await.unwrap();
        time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(timer.snapshot().await.status, SessionStatus::Completed);

        assert!(timer.stop().await.is_err());
        let result = timer.stop_or_result().await.unwrap();
        assert_eq!(result.duration_ms, 2_000);
        assert!(result.target_reached);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_or_result_stops_running_session() {
        let timer = session(TimerConfig::forward());
        timer.start().await.unwrap();
        time::sleep(Duration::from_millis(1_500)).await;
        let result = timer.stop_or_result().await.unwrap();
        assert_eq!(result.duration_ms, 1_500);
        assert_eq!(timer.snapshot().await.status, SessionStatus::Stopped);
    }
}
