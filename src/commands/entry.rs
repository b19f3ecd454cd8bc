use chrono::NaiveDate;
use clap::{Args, Subcommand};
use ondoku_core::models::selectable_pages;
use ondoku_core::{Column, Entry, EntryField, EntryId, PageRange, SignField, SyncError};
use serde_json::Value;

use super::OutputFormat;
use crate::app::{App, AppError};

#[derive(Args)]
pub struct EntryCommand {
    #[command(subcommand)]
    pub command: EntrySubcommand,
}

#[derive(Subcommand)]
pub enum EntrySubcommand {
    /// Add today's entry
    Add,

    /// List entries, newest first
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Change the date of an entry
    Date {
        /// Entry ID
        id: String,

        /// Date (YYYY-MM-DD)
        date: String,
    },

    /// Set the page range of an entry
    Page {
        /// Entry ID
        id: String,

        /// Page text such as P.12 or P.12-15
        text: Option<String>,

        /// Move the first page
        #[arg(long)]
        start: Option<u32>,

        /// Move the last page
        #[arg(long)]
        end: Option<u32>,

        /// Remove the page range
        #[arg(long, conflicts_with_all = ["text", "start", "end"])]
        clear: bool,
    },

    /// Set an evaluation value (◎, 〇, △, a number or text)
    Set {
        /// Entry ID
        id: String,

        /// Column ID or title
        column: String,

        /// New value
        value: String,
    },

    /// Toggle the parent or teacher sign
    Sign {
        /// Entry ID
        id: String,

        /// parent or teacher
        which: String,
    },

    /// Delete an entry
    Delete {
        /// Entry ID
        id: String,
    },

    /// Delete every entry
    Reset,
}

impl EntryCommand {
    pub async fn run(&self, app: &mut App) -> Result<(), AppError> {
        app.activate().await?;

        match &self.command {
            EntrySubcommand::Add => {
                let id = app.engine.add_entry()?;
                app.engine.settle().await;
                println!("Added entry:");
                println!();
                show(app, &id);
            }
            EntrySubcommand::List { format } => list(app, format)?,
            EntrySubcommand::Date { id, date } => {
                let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
                    AppError::Invalid(format!("Invalid date format '{}'. Use YYYY-MM-DD.", date))
                })?;
                update(app, id, EntryField::Date(parsed)).await?;
            }
            EntrySubcommand::Page {
                id,
                text,
                start,
                end,
                clear,
            } => {
                let range = if *clear {
                    PageRange::default()
                } else {
                    let current = existing(app, id)?.page_range();
                    page_range(current, text.as_deref(), *start, *end)?
                };
                update(app, id, EntryField::Page(range.encode())).await?;
            }
            EntrySubcommand::Set { id, column, value } => {
                let column = find_column(app, column)?;
                let parsed = column.parse_input(value).map_err(SyncError::from)?;
                update(app, id, EntryField::Column(column.id.clone(), parsed)).await?;
            }
            EntrySubcommand::Sign { id, which } => {
                let sign: SignField = which.parse().map_err(AppError::Invalid)?;
                let current = existing(app, id)?.sign(sign);
                let entry_id = EntryId::from(id.as_str());
                app.engine.toggle_sign(&entry_id, sign, current)?;
                app.engine.settle().await;
                show(app, &entry_id);
            }
            EntrySubcommand::Delete { id } => {
                let entry_id = EntryId::from(id.as_str());
                if app.engine.delete_entry(&entry_id)? {
                    app.engine.settle().await;
                    println!("Deleted entry: {}", id);
                } else {
                    println!("Cancelled.");
                }
            }
            EntrySubcommand::Reset => {
                if app.engine.reset_all()? {
                    app.engine.settle().await;
                    println!(
                        "Reset finished. {} entries remain.",
                        app.engine.entries().len()
                    );
                } else {
                    println!("Cancelled.");
                }
            }
        }

        Ok(())
    }
}

fn existing<'a>(app: &'a App, id: &str) -> Result<&'a Entry, AppError> {
    let entry_id = EntryId::from(id);
    app.engine
        .entry(&entry_id)
        .ok_or_else(|| SyncError::UnknownEntry(entry_id).into())
}

fn find_column(app: &App, key: &str) -> Result<Column, AppError> {
    app.engine
        .schema()
        .iter()
        .find(|c| c.id == key || c.title == key)
        .cloned()
        .ok_or_else(|| AppError::Invalid(format!("Column not found: {}", key)))
}

/// Applies the picker moves to `current`. Explicit text replaces it first.
fn page_range(
    current: PageRange,
    text: Option<&str>,
    start: Option<u32>,
    end: Option<u32>,
) -> Result<PageRange, AppError> {
    for page in [start, end].into_iter().flatten() {
        if !selectable_pages().contains(&page) {
            let pages = selectable_pages();
            return Err(AppError::Invalid(format!(
                "Page {} is outside {}..={}",
                page,
                pages.start(),
                pages.end()
            )));
        }
    }

    let mut range = text.map(PageRange::decode).unwrap_or(current);
    if let Some(start) = start {
        range = range.set_start(start);
    }
    if let Some(end) = end {
        range = range.set_end(end);
    }
    Ok(range)
}

async fn update(app: &mut App, id: &str, field: EntryField) -> Result<(), AppError> {
    let entry_id = EntryId::from(id);
    app.engine.update_entry(&entry_id, field)?;
    app.engine.settle().await;
    show(app, &entry_id);
    Ok(())
}

fn show(app: &App, id: &EntryId) {
    let Some(entry) = app.engine.entry(id) else {
        println!("Entry {} is no longer present.", id);
        return;
    };
    print!("{}", entry);
    for column in app.engine.schema() {
        println!("{}: {}", column_label(column), entry.display_value(column));
    }
}

fn column_label(column: &Column) -> String {
    if column.subtitle.is_empty() {
        column.title.clone()
    } else {
        format!("{} ({})", column.title, column.subtitle)
    }
}

fn list(app: &App, format: &OutputFormat) -> Result<(), AppError> {
    let entries = app.engine.entries();
    let schema = app.engine.schema();

    match format {
        OutputFormat::Json => {
            let rows: Vec<Value> = entries
                .iter()
                .map(|entry| {
                    let mut document = entry.to_document();
                    document.insert("id".to_string(), Value::String(entry.id.to_string()));
                    Value::Object(document)
                })
                .collect();
            let json = serde_json::to_string_pretty(&rows)
                .map_err(|e| AppError::Invalid(e.to_string()))?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No entries found.");
                return Ok(());
            }

            let mut header = format!("{:<15} {:<10} {:<9}", "ID", "Date", "Page");
            for column in schema {
                header.push_str(&format!(" {:<8}", column.title));
            }
            header.push_str(&format!(" {:<6} {:<6}", "Parent", "Teacher"));
            println!("{}", header);
            println!("{}", "-".repeat(header.chars().count()));

            for entry in entries {
                let mut row = format!(
                    "{:<15} {:<10} {:<9}",
                    entry.id.to_string(),
                    entry.date_text(),
                    entry.page
                );
                for column in schema {
                    row.push_str(&format!(" {:<8}", entry.display_value(column)));
                }
                row.push_str(&format!(
                    " {:<6} {:<6}",
                    if entry.parent_sign { "済" } else { "-" },
                    if entry.teacher_sign { "確認" } else { "-" }
                ));
                println!("{}", row);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_range_moves_start_past_end() {
        let current = PageRange::decode("P.3-5");
        let range = page_range(current, None, Some(8), None).unwrap();
        assert_eq!(range.encode(), "P.8");
    }

    #[test]
    fn test_page_range_text_then_end() {
        let range = page_range(PageRange::default(), Some("P.12"), None, Some(15)).unwrap();
        assert_eq!(range.encode(), "P.12-15");
    }

    #[test]
    fn test_page_range_end_only_on_empty() {
        let range = page_range(PageRange::default(), None, None, Some(4)).unwrap();
        assert_eq!(range.encode(), "P.4");
    }

    #[test]
    fn test_page_range_rejects_out_of_picker_pages() {
        assert!(page_range(PageRange::default(), None, Some(0), None).is_err());
        assert!(page_range(PageRange::default(), None, None, Some(201)).is_err());
    }

    #[test]
    fn test_column_label() {
        let schema = ondoku_core::ColumnSchema::builtin();
        assert_eq!(column_label(&schema.columns()[0]), "点・丸 (気をつける)");
    }
}
