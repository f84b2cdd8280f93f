use pagetimer_core::{format_duration, Database};
use serde::Serialize;

#[derive(Serialize)]
struct StatsView {
    total_sessions: u64,
    total_reading: String,
    today_sessions: u64,
    today_reading: String,
    books_reading: u64,
    books_finished: u64,
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let stats = db.reading_stats()?;
    let view = StatsView {
        total_sessions: stats.total_sessions,
        total_reading: format_duration(stats.total_reading_ms),
        today_sessions: stats.today_sessions,
        today_reading: format_duration(stats.today_reading_ms),
        books_reading: stats.books_reading,
        books_finished: stats.books_finished,
    };
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
