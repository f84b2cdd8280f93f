//! Reading session timer engine.
//!
//! The engine is split into pure pieces ([`SessionStateMachine`],
//! [`ResultBuilder`]) and one async driver ([`TimerSession`]) that ticks a
//! running session once per second.
//!
//! ## Usage
//!
//! ```ignore
//! let config = TimerConfig::countdown(25 * MINUTE_MS);
//! let idle = SessionStateMachine::initial(&config)?;
//! let running = SessionStateMachine::start(&idle, clock.now_ms())?;
//! let later = SessionStateMachine::tick(&running, &config, clock.now_ms());
//! ```

mod clock;
mod config;
mod format;
mod machine;
mod result;
mod state;
mod ticker;

pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock};
pub use config::{TimerConfig, TimerMode, DEFAULT_ROUNDS_BEFORE_LONG_BREAK, MINUTE_MS};
pub use format::format_duration;
pub use machine::SessionStateMachine;
pub use result::{ResultBuilder, TimerResult};
pub use state::{PomodoroPhase, SessionState, SessionStatus};
pub use ticker::{TimerSession, TICK_INTERVAL};
