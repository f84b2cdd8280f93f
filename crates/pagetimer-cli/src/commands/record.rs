use clap::Subcommand;
use pagetimer_core::{format_duration, Database, ReadingRecord};
use serde::Serialize;

#[derive(Subcommand)]
pub enum RecordAction {
    /// List reading records for a book, newest first
    List {
        /// Book ID
        #[arg(long)]
        book: i64,
    },
}

#[derive(Serialize)]
struct RecordView {
    #[serde(flatten)]
    record: ReadingRecord,
    duration: String,
}

pub fn run(action: RecordAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        RecordAction::List { book } => {
            let records: Vec<RecordView> = db
                .records_for_book(book)?
                .into_iter()
                .map(|record| RecordView {
                    duration: format_duration(record.duration_ms),
                    record,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }
    Ok(())
}
