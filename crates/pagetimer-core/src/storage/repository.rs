//! Book and reading-record models and the repository contracts the
//! session recorder writes through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    WantToRead,
    Reading,
    Finished,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::WantToRead => "want_to_read",
            BookStatus::Reading => "reading",
            BookStatus::Finished => "finished",
        }
    }

    /// Parse a database string; unknown values read as `WantToRead`.
    pub fn from_db(value: &str) -> Self {
        match value {
            "reading" => BookStatus::Reading,
            "finished" => BookStatus::Finished,
            _ => BookStatus::WantToRead,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: Option<String>,
    /// 0 when unknown.
    pub total_pages: u32,
    pub current_page: u32,
    pub status: BookStatus,
    /// Reading time accumulated over every recorded session.
    pub total_reading_ms: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRecord {
    pub id: i64,
    pub book_id: i64,
    pub start_progress: u32,
    pub end_progress: u32,
    pub duration_ms: u64,
    /// Local calendar date, `YYYY-MM-DD`.
    pub date: String,
    pub notes: Option<String>,
}

/// Fields of a reading record that is about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReadingRecord<'a> {
    pub book_id: i64,
    pub start_progress: u32,
    pub end_progress: u32,
    pub duration_ms: u64,
    pub date_iso: &'a str,
    pub notes: Option<&'a str>,
}

pub trait BookRepository {
    fn get_book_by_id(&self, id: i64) -> Result<Option<Book>, DatabaseError>;
    fn update_book(&self, book: &Book) -> Result<(), DatabaseError>;
}

pub trait ReadingRecordRepository {
    /// Insert a record and return its id.
    fn insert_reading_record(&self, record: &NewReadingRecord<'_>) -> Result<i64, DatabaseError>;
}

/// Storage that can group several writes so they land together or not at all.
pub trait Transactional {
    /// Run `f` in one transaction; it commits only if `f` returns `Ok`.
    fn transaction<T, F>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce() -> Result<T, DatabaseError>;
}
