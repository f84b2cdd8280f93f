mod config;
pub mod database;
pub mod migrations;
pub mod recorder;
pub mod repository;

pub use config::{Config, DisplayConfig, TimerDefaults};
pub use database::{Database, ReadingStats};
pub use recorder::{ProgressUpdate, RecordedSession, SessionRecorder};
pub use repository::{
    Book, BookRepository, BookStatus, NewReadingRecord, ReadingRecord, ReadingRecordRepository,
    Transactional,
};

use std::path::PathBuf;

/// Returns the data directory, creating it if needed.
///
/// `PAGETIMER_DATA_DIR` wins when set; otherwise `~/.config/pagetimer[-dev]/`
/// depending on `PAGETIMER_ENV` (set it to `dev` for a development copy).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("PAGETIMER_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("PAGETIMER_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pagetimer-dev")
            } else {
                base_dir.join("pagetimer")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
