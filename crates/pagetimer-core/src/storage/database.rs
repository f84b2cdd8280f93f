//! SQLite-based book and reading-record storage.
//!
//! Provides persistent storage for:
//! - Books and their reading progress
//! - Reading records, one per finished timer session
//! - Key-value store for application state (the CLI's active session)

use std::path::Path;

use chrono::{DateTime, Local, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::data_dir;
use super::migrations;
use super::repository::{
    Book, BookRepository, BookStatus, NewReadingRecord, ReadingRecord, ReadingRecordRepository,
    Transactional,
};
use crate::error::DatabaseError;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ReadingStats {
    pub total_sessions: u64,
    pub total_reading_ms: u64,
    pub today_sessions: u64,
    pub today_reading_ms: u64,
    pub books_reading: u64,
    pub books_finished: u64,
}

/// SQLite database for books and reading records.
pub struct Database {
    conn: Connection,
}

fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        total_pages: row.get(3)?,
        current_page: row.get(4)?,
        status: BookStatus::from_db(&row.get::<_, String>(5)?),
        total_reading_ms: row.get(6)?,
        created_at: parse_timestamp(7, row.get(7)?)?,
        updated_at: parse_timestamp(8, row.get(8)?)?,
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ReadingRecord> {
    Ok(ReadingRecord {
        id: row.get(0)?,
        book_id: row.get(1)?,
        start_progress: row.get(2)?,
        end_progress: row.get(3)?,
        duration_ms: row.get(4)?,
        date: row.get(5)?,
        notes: row.get(6)?,
    })
}

const BOOK_COLUMNS: &str = "id, title, author, total_pages, current_page, status, total_reading_ms, created_at, updated_at";

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data dir>/pagetimer.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let path = data_dir()?.join("pagetimer.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at `path`.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::init(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    // ── Books ────────────────────────────────────────────────────────

    pub fn add_book(
        &self,
        title: &str,
        author: Option<&str>,
        total_pages: u32,
    ) -> Result<Book, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO books (title, author, total_pages, current_page, status, total_reading_ms, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, 0, ?5, ?5)",
            params![title, author, total_pages, BookStatus::WantToRead.as_str(), now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_book_by_id(id)?
            .ok_or(DatabaseError::NotFound { entity: "book", id })
    }

    pub fn list_books(&self) -> Result<Vec<Book>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY updated_at DESC, id"))?;
        let books = stmt
            .query_map([], book_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(books)
    }

    // ── Reading records ──────────────────────────────────────────────

    pub fn records_for_book(&self, book_id: i64) -> Result<Vec<ReadingRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, book_id, start_progress, end_progress, duration_ms, date, notes
             FROM reading_records
             WHERE book_id = ?1
             ORDER BY date DESC, id DESC",
        )?;
        let records = stmt
            .query_map(params![book_id], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn reading_stats(&self) -> Result<ReadingStats, DatabaseError> {
        let today = Local::now().format("%Y-%m-%d").to_string();
        let mut stats = ReadingStats::default();

        let (count, total): (u64, u64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_ms), 0) FROM reading_records",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        stats.total_sessions = count;
        stats.total_reading_ms = total;

        let (count, total): (u64, u64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_ms), 0) FROM reading_records WHERE date = ?1",
            params![today],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        stats.today_sessions = count;
        stats.today_reading_ms = total;

        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM books GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            match BookStatus::from_db(&status) {
                BookStatus::Reading => stats.books_reading += count,
                BookStatus::Finished => stats.books_finished += count,
                BookStatus::WantToRead => {}
            }
        }

        Ok(stats)
    }

    // ── Key-value store ──────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), DatabaseError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl BookRepository for Database {
    fn get_book_by_id(&self, id: i64) -> Result<Option<Book>, DatabaseError> {
        let book = self
            .conn
            .query_row(
                &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
                params![id],
                book_from_row,
            )
            .optional()?;
        Ok(book)
    }

    fn update_book(&self, book: &Book) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE books
             SET title = ?2, author = ?3, total_pages = ?4, current_page = ?5,
                 status = ?6, total_reading_ms = ?7, updated_at = ?8
             WHERE id = ?1",
            params![
                book.id,
                book.title,
                book.author,
                book.total_pages,
                book.current_page,
                book.status.as_str(),
                book.total_reading_ms,
                book.updated_at.to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "book",
                id: book.id,
            });
        }
        Ok(())
    }
}

impl Transactional for Database {
    fn transaction<T, F>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce() -> Result<T, DatabaseError>,
    {
        let tx = self.conn.unchecked_transaction()?;
        // Dropping `tx` on the error path rolls everything back.
        let value = f()?;
        tx.commit()?;
        Ok(value)
    }
}

impl ReadingRecordRepository for Database {
    fn insert_reading_record(&self, record: &NewReadingRecord<'_>) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO reading_records (book_id, start_progress, end_progress, duration_ms, date, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.book_id,
                record.start_progress,
                record.end_progress,
                record.duration_ms,
                record.date_iso,
                record.notes,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}
