//! Persists finished timer sessions.
//!
//! The engine hands over an immutable [`TimerResult`]; recording it never
//! touches timer state. The record and the book update are written in one
//! transaction, so a failed save leaves nothing behind and can be retried
//! with the same result.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::repository::{
    Book, BookRepository, BookStatus, NewReadingRecord, ReadingRecordRepository, Transactional,
};
use crate::error::DatabaseError;
use crate::timer::TimerResult;

/// Page progress reported by the reader when a session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Page reached; `None` keeps the book's current page.
    pub end_page: Option<u32>,
    pub notes: Option<String>,
}

/// What was written for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedSession {
    pub record_id: i64,
    pub book: Book,
}

pub struct SessionRecorder<'a, B: BookRepository, R: ReadingRecordRepository> {
    books: &'a B,
    records: &'a R,
}

impl<'a, B, R> SessionRecorder<'a, B, R>
where
    B: BookRepository,
    R: ReadingRecordRepository + Transactional,
{
    pub fn new(books: &'a B, records: &'a R) -> Self {
        Self { books, records }
    }

    /// Store `result` as a reading record and update the book's progress.
    ///
    /// Returns `Ok(None)` when the session was not tied to a book.
    ///
    /// # Errors
    /// Returns [`DatabaseError::NotFound`] if the book does not exist, or
    /// any repository error.
    pub fn record(
        &self,
        result: &TimerResult,
        progress: &ProgressUpdate,
    ) -> Result<Option<RecordedSession>, DatabaseError> {
        let Some(book_id) = result.book_id else {
            tracing::debug!("session has no book; nothing to record");
            return Ok(None);
        };
        let mut book = self
            .books
            .get_book_by_id(book_id)?
            .ok_or(DatabaseError::NotFound { entity: "book", id: book_id })?;

        let start_progress = book.current_page;
        let end_progress = progress.end_page.unwrap_or(start_progress);
        let date = session_date(result.end_time_ms);

        apply_progress(&mut book, end_progress, result.duration_ms);
        let record_id = self.records.transaction(|| {
            let record_id = self.records.insert_reading_record(&NewReadingRecord {
                book_id,
                start_progress,
                end_progress,
                duration_ms: result.duration_ms,
                date_iso: &date,
                notes: progress.notes.as_deref(),
            })?;
            self.books.update_book(&book)?;
            Ok(record_id)
        })?;

        tracing::info!(
            book_id,
            record_id,
            duration_ms = result.duration_ms,
            "reading session recorded"
        );
        Ok(Some(RecordedSession { record_id, book }))
    }
}

fn apply_progress(book: &mut Book, end_page: u32, duration_ms: u64) {
    book.current_page = if book.total_pages > 0 {
        end_page.min(book.total_pages)
    } else {
        end_page
    };
    book.status = if book.total_pages > 0 && book.current_page >= book.total_pages {
        BookStatus::Finished
    } else {
        BookStatus::Reading
    };
    book.total_reading_ms = book.total_reading_ms.saturating_add(duration_ms);
    book.updated_at = Utc::now();
}

/// Local calendar date of an epoch-millisecond instant.
fn session_date(epoch_ms: i64) -> String {
    let utc = Utc
        .timestamp_millis_opt(epoch_ms)
        .single()
        .unwrap_or_else(Utc::now);
    DateTime::<Local>::from(utc).format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::storage::Database;
    use crate::timer::TimerMode;

    fn result(book_id: Option<i64>, duration_ms: u64) -> TimerResult {
        TimerResult {
            duration_ms,
            book_id,
            pause_count: 0,
            start_time_ms: 1_700_000_000_000,
            end_time_ms: 1_700_000_000_000 + duration_ms as i64,
            mode: TimerMode::Forward,
            pomodoro_rounds_completed: 0,
            target_reached: false,
        }
    }

    #[test]
    fn session_without_book_is_skipped() {
        let db = Database::open_memory().unwrap();
        let recorder = SessionRecorder::new(&db, &db);
        let saved = recorder.record(&result(None, 1_000), &ProgressUpdate::default()).unwrap();
        assert!(saved.is_none());
        assert_eq!(db.reading_stats().unwrap().total_sessions, 0);
    }

    #[test]
    fn record_updates_progress_and_time() {
        let db = Database::open_memory().unwrap();
        let book = db.add_book("Dune", None, 100).unwrap();
        let recorder = SessionRecorder::new(&db, &db);

        let progress = ProgressUpdate {
            end_page: Some(40),
            notes: Some("great start".into()),
        };
        let saved = recorder
            .record(&result(Some(book.id), 600_000), &progress)
            .unwrap()
            .unwrap();
        assert_eq!(saved.book.current_page, 40);
        assert_eq!(saved.book.status, BookStatus::Reading);
        assert_eq!(saved.book.total_reading_ms, 600_000);

        let records = db.records_for_book(book.id).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].start_progress, 0);
        assert_eq!(records[0].end_progress, 40);
        assert_eq!(records[0].notes.as_deref(), Some("great start"));
    }

    #[test]
    fn reaching_last_page_finishes_book() {
        let db = Database::open_memory().unwrap();
        let book = db.add_book("Dune", None, 100).unwrap();
        let recorder = SessionRecorder::new(&db, &db);
        let progress = ProgressUpdate {
            end_page: Some(120),
            notes: None,
        };
        let saved = recorder
            .record(&result(Some(book.id), 1_000), &progress)
            .unwrap()
            .unwrap();
        assert_eq!(saved.book.current_page, 100);
        assert_eq!(saved.book.status, BookStatus::Finished);
    }

    /// Book storage whose next update fails once.
    struct FailingUpdate<'a> {
        db: &'a Database,
        fail_next: Cell<bool>,
    }

    impl BookRepository for FailingUpdate<'_> {
        fn get_book_by_id(&self, id: i64) -> Result<Option<Book>, DatabaseError> {
            self.db.get_book_by_id(id)
        }

        fn update_book(&self, book: &Book) -> Result<(), DatabaseError> {
            if self.fail_next.replace(false) {
                return Err(DatabaseError::QueryFailed("disk I/O error".into()));
            }
            self.db.update_book(book)
        }
    }

    #[test]
    fn failed_book_update_rolls_back_record() {
        let db = Database::open_memory().unwrap();
        let book = db.add_book("Dune", None, 100).unwrap();
        let books = FailingUpdate {
            db: &db,
            fail_next: Cell::new(true),
        };
        let recorder = SessionRecorder::new(&books, &db);
        let session = result(Some(book.id), 60_000);
        let progress = ProgressUpdate {
            end_page: Some(10),
            notes: None,
        };

        assert!(recorder.record(&session, &progress).is_err());
        assert!(db.records_for_book(book.id).unwrap().is_empty());
        assert_eq!(db.get_book_by_id(book.id).unwrap().unwrap().total_reading_ms, 0);

        recorder.record(&session, &progress).unwrap().unwrap();
        assert_eq!(db.records_for_book(book.id).unwrap().len(), 1);
        assert_eq!(db.get_book_by_id(book.id).unwrap().unwrap().total_reading_ms, 60_000);
    }

    #[test]
    fn unknown_book_is_an_error() {
        let db = Database::open_memory().unwrap();
        let recorder = SessionRecorder::new(&db, &db);
        let err = recorder
            .record(&result(Some(5), 1_000), &ProgressUpdate::default())
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { id: 5, .. }));
    }
}
