use std::sync::Arc;

use clap::{Args, Subcommand};
use pagetimer_core::storage::RecordedSession;
use pagetimer_core::timer::SessionStateMachine;
use pagetimer_core::{
    format_duration, Clock, Config, Database, Event, PomodoroPhase, ProgressUpdate, ResultBuilder,
    SessionRecorder, SessionState, SessionStatus, SystemClock, TimerConfig, TimerMode,
    TimerResult, TimerSession,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

const SESSION_KEY: &str = "active_session";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a new reading session
    Start(StartArgs),
    /// Pause the running session
    Pause,
    /// Resume a paused session
    Resume,
    /// Skip the current pomodoro phase
    Skip,
    /// Stop the session and save the reading record
    Stop(FinishArgs),
    /// Print the current session as JSON
    Status,
    /// Run the session in the foreground until it ends (Ctrl-C stops it)
    Run {
        #[command(flatten)]
        start: StartArgs,
        #[command(flatten)]
        finish: FinishArgs,
    },
}

#[derive(Args, Clone)]
pub struct StartArgs {
    /// Timer mode: forward, countdown or pomodoro
    #[arg(long, default_value = "forward")]
    mode: TimerMode,
    /// Countdown length, forward soft target, or pomodoro work phase
    #[arg(long)]
    minutes: Option<u32>,
    /// Book being read
    #[arg(long)]
    book: Option<i64>,
    /// End a pomodoro session after this many rounds
    #[arg(long)]
    rounds: Option<u32>,
}

#[derive(Args, Clone, Default)]
pub struct FinishArgs {
    /// Page reached at the end of the session
    #[arg(long)]
    end_page: Option<u32>,
    /// Notes stored with the reading record
    #[arg(long)]
    notes: Option<String>,
}

impl From<FinishArgs> for ProgressUpdate {
    fn from(args: FinishArgs) -> Self {
        ProgressUpdate {
            end_page: args.end_page,
            notes: args.notes,
        }
    }
}

/// Session persisted between CLI invocations.
#[derive(Serialize, Deserialize)]
struct ActiveSession {
    config: TimerConfig,
    state: SessionState,
}

#[derive(Serialize)]
struct SessionView {
    mode: TimerMode,
    status: SessionStatus,
    elapsed: String,
    elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phase: Option<PomodoroPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    round: Option<u32>,
    pause_count: u32,
    overtime: bool,
    book_id: Option<i64>,
}

impl SessionView {
    fn new(session: &ActiveSession) -> Self {
        let state = &session.state;
        let pomodoro = session.config.mode == TimerMode::Pomodoro;
        Self {
            mode: session.config.mode,
            status: state.status,
            elapsed: format_duration(state.elapsed_ms),
            elapsed_ms: state.elapsed_ms,
            remaining: (state.target_ms > 0).then(|| format_duration(state.remaining_ms())),
            phase: pomodoro.then_some(state.pomodoro_phase),
            round: pomodoro.then_some(state.pomodoro_round),
            pause_count: state.pause_count,
            overtime: state.is_overtime,
            book_id: session.config.book_id,
        }
    }
}

#[derive(Serialize)]
struct FinishedView {
    result: TimerResult,
    duration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    recorded: Option<RecordedSession>,
}

fn load_session(db: &Database) -> Result<Option<ActiveSession>, Box<dyn std::error::Error>> {
    match db.kv_get(SESSION_KEY)? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

fn require_session(db: &Database) -> Result<ActiveSession, Box<dyn std::error::Error>> {
    load_session(db)?.ok_or_else(|| "no active session; start one with `timer start`".into())
}

fn save_session(db: &Database, session: &ActiveSession) -> Result<(), Box<dyn std::error::Error>> {
    db.kv_set(SESSION_KEY, &serde_json::to_string(session)?)?;
    Ok(())
}

fn new_session(args: &StartArgs) -> Result<ActiveSession, Box<dyn std::error::Error>> {
    let config = Config::load_or_default()
        .timer_config(args.mode, args.minutes, args.book)
        .with_max_rounds(args.rounds);
    let state = SessionStateMachine::initial(&config)?;
    Ok(ActiveSession { config, state })
}

/// Bring a stored session up to `now`; nothing ticks between invocations.
fn catch_up(session: &mut ActiveSession, now: i64) {
    session.state = SessionStateMachine::tick(&session.state, &session.config, now);
}

fn finish(
    db: &Database,
    result: TimerResult,
    args: FinishArgs,
) -> Result<FinishedView, Box<dyn std::error::Error>> {
    // The session is over either way; a failed save must not resurrect it.
    db.kv_delete(SESSION_KEY)?;
    let recorded = match SessionRecorder::new(db, db).record(&result, &args.into()) {
        Ok(recorded) => recorded,
        Err(e) => {
            eprintln!("{}", serde_json::to_string_pretty(&result)?);
            return Err(e.into());
        }
    };
    Ok(FinishedView {
        duration: format_duration(result.duration_ms),
        result,
        recorded,
    })
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let now = SystemClock.now_ms();

    match action {
        TimerAction::Start(args) => {
            if let Some(active) = load_session(&db)? {
                if !active.state.is_terminal() {
                    return Err("a session is already active; stop it first".into());
                }
            }
            let mut session = new_session(&args)?;
            session.state = SessionStateMachine::start(&session.state, now)?;
            save_session(&db, &session)?;
            println!("{}", serde_json::to_string_pretty(&SessionView::new(&session))?);
        }
        TimerAction::Pause | TimerAction::Resume | TimerAction::Skip => {
            let mut session = require_session(&db)?;
            catch_up(&mut session, now);
            session.state = match action {
                TimerAction::Pause => SessionStateMachine::pause(&session.state, now)?,
                TimerAction::Resume => SessionStateMachine::start(&session.state, now)?,
                _ => SessionStateMachine::skip(&session.state, &session.config, now)?,
            };
            save_session(&db, &session)?;
            println!("{}", serde_json::to_string_pretty(&SessionView::new(&session))?);
        }
        TimerAction::Stop(args) => {
            let mut session = require_session(&db)?;
            catch_up(&mut session, now);
            if !session.state.is_terminal() {
                session.state = SessionStateMachine::stop(&session.state, now)?;
            }
            let result = ResultBuilder::build(&session.state, &session.config)?;
            let view = finish(&db, result, args)?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        TimerAction::Status => {
            let mut session = require_session(&db)?;
            catch_up(&mut session, now);
            save_session(&db, &session)?;
            println!("{}", serde_json::to_string_pretty(&SessionView::new(&session))?);
        }
        TimerAction::Run { start, finish: args } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_foreground(&db, start, args))?;
        }
    }
    Ok(())
}

/// Drive a session with the ticker, printing a live line until it ends,
/// waits for the user, or Ctrl-C stops it.
async fn run_foreground(
    db: &Database,
    start: StartArgs,
    args: FinishArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = match load_session(db)? {
        Some(active) if !active.state.is_terminal() => active,
        _ => new_session(&start)?,
    };
    let show_remaining = Config::load_or_default().display.show_remaining;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let timer = TimerSession::from_state(session.config, session.state, clock);
    let mut events = timer.subscribe();

    if timer.snapshot().await.is_running() {
        timer.resume_ticking().await;
    } else {
        timer.start().await?;
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                eprintln!();
                // The session may have completed with its event still queued.
                let result = timer.stop_or_result().await?;
                let view = finish(db, result, args)?;
                println!("{}", serde_json::to_string_pretty(&view)?);
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(Event::Tick { elapsed_ms, remaining_ms, .. }) => {
                    let shown = if show_remaining && remaining_ms > 0 { remaining_ms } else { elapsed_ms };
                    eprint!("\r{}   ", format_duration(shown));
                }
                Ok(Event::OvertimeReached { .. }) => eprintln!("\rtarget reached; still reading"),
                Ok(Event::PhaseChanged { phase, round, awaiting_user, .. }) => {
                    eprintln!("\r{} (round {round})", phase.label());
                    if awaiting_user {
                        save_session(db, &ActiveSession {
                            config: timer.config().clone(),
                            state: timer.snapshot().await,
                        })?;
                        eprintln!("paused; continue with `timer run` or `timer resume`");
                        return Ok(());
                    }
                }
                Ok(Event::SessionFinished { result, .. }) => {
                    eprintln!();
                    let view = finish(db, result, args)?;
                    println!("{}", serde_json::to_string_pretty(&view)?);
                    return Ok(());
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "display fell behind the ticker");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}
