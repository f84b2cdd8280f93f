use clap::Subcommand;
use pagetimer_core::{BookRepository, Database};

#[derive(Subcommand)]
pub enum BookAction {
    /// Add a book to the library
    Add {
        /// Book title
        title: String,
        /// Author name
        #[arg(long)]
        author: Option<String>,
        /// Total number of pages (0 if unknown)
        #[arg(long, default_value = "0")]
        pages: u32,
    },
    /// List all books
    List,
    /// Show one book with its reading history
    Show {
        /// Book ID
        id: i64,
    },
}

pub fn run(action: BookAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        BookAction::Add {
            title,
            author,
            pages,
        } => {
            let book = db.add_book(&title, author.as_deref(), pages)?;
            println!("{}", serde_json::to_string_pretty(&book)?);
        }
        BookAction::List => {
            let books = db.list_books()?;
            println!("{}", serde_json::to_string_pretty(&books)?);
        }
        BookAction::Show { id } => {
            let book = db
                .get_book_by_id(id)?
                .ok_or_else(|| format!("book {id} not found"))?;
            let records = db.records_for_book(id)?;
            let json = serde_json::json!({ "book": book, "records": records });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}
