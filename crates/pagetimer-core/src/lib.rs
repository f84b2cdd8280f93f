//! # pagetimer Core Library
//!
//! This library provides the core logic for timing reading sessions.
//! Every operation is available through the standalone `pagetimer` CLI,
//! which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: pure state machine over an owned [`SessionState`];
//!   forward, countdown and pomodoro modes share one transition function
//! - **Driver**: [`TimerSession`] ticks a running session once per second
//!   and serializes ticks with user commands
//! - **Storage**: SQLite book/reading-record storage and TOML configuration
//!
//! ## Key Components
//!
//! - [`SessionStateMachine`]: session transitions
//! - [`ResultBuilder`]: final [`TimerResult`] of a terminated session
//! - [`Database`]: books, reading records and key-value state
//! - [`SessionRecorder`]: writes a result through the repositories
//! - [`Config`]: application configuration management

pub mod error;
pub mod events;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, TimerError};
pub use events::Event;
pub use storage::{
    Book, BookRepository, BookStatus, Config, Database, ProgressUpdate, ReadingRecord,
    ReadingRecordRepository, SessionRecorder, Transactional,
};
pub use timer::{
    format_duration, Clock, PomodoroPhase, ResultBuilder, SessionState, SessionStateMachine,
    SessionStatus, SystemClock, TimerConfig, TimerMode, TimerResult, TimerSession,
};
