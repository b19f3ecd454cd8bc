use clap::{Args, Subcommand};
use ondoku_core::{Column, ColumnType};
use serde_json::Value;

use super::OutputFormat;
use crate::app::{App, AppError};

#[derive(Args)]
pub struct ColumnCommand {
    #[command(subcommand)]
    pub command: ColumnSubcommand,
}

#[derive(Subcommand)]
pub enum ColumnSubcommand {
    /// List evaluation columns
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a select column
    Add,

    /// Remove a column (its values stay in old entries)
    Remove {
        /// Column ID
        id: String,
    },

    /// Change one field of a column
    Set {
        /// Column ID
        id: String,

        /// Field: title, subtitle, type, options.min or options.max
        path: String,

        /// New value
        value: String,
    },
}

impl ColumnCommand {
    pub async fn run(&self, app: &mut App) -> Result<(), AppError> {
        app.activate().await?;

        match &self.command {
            ColumnSubcommand::List { format } => list(app, format)?,
            ColumnSubcommand::Add => {
                let id = app.engine.add_column()?;
                app.engine.settle().await;
                println!("Added column: {}", id);
            }
            ColumnSubcommand::Remove { id } => {
                if app.engine.remove_column(id)? {
                    app.engine.settle().await;
                    println!("Removed column: {}", id);
                } else if app.engine.schema().get(id).is_none() {
                    println!("Column not found: {}", id);
                } else {
                    println!("Cancelled.");
                }
            }
            ColumnSubcommand::Set { id, path, value } => {
                if app.engine.schema().get(id).is_none() {
                    return Err(AppError::Invalid(format!("Column not found: {}", id)));
                }
                app.engine.update_column(id, path, field_value(path, value))?;
                app.engine.settle().await;
                if let Some(column) = app.engine.schema().get(id) {
                    println!("{}", describe(column));
                }
            }
        }

        Ok(())
    }
}

/// Text fields stay strings; bounds and unknown keys are read as JSON
/// when they parse.
fn field_value(path: &str, raw: &str) -> Value {
    match path {
        "title" | "subtitle" | "type" => Value::String(raw.to_string()),
        _ => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

fn options_label(column: &Column) -> String {
    match column.column_type {
        ColumnType::Number => {
            let (min, max) = column.bounds();
            format!("{}..={}", min, max)
        }
        ColumnType::Select => "◎/〇/△".to_string(),
        ColumnType::Text => String::new(),
    }
}

fn describe(column: &Column) -> String {
    format!(
        "{:<22} {:<12} {:<12} {:<7} {}",
        column.id,
        column.title,
        column.subtitle,
        column.column_type,
        options_label(column)
    )
}

fn list(app: &App, format: &OutputFormat) -> Result<(), AppError> {
    let schema = app.engine.schema();

    match format {
        OutputFormat::Json => {
            let data = schema
                .to_document()
                .remove("data")
                .unwrap_or(Value::Array(Vec::new()));
            let json = serde_json::to_string_pretty(&data)
                .map_err(|e| AppError::Invalid(e.to_string()))?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            let header = format!(
                "{:<22} {:<12} {:<12} {:<7} {}",
                "ID", "Title", "Subtitle", "Type", "Options"
            );
            println!("{}", header);
            println!("{}", "-".repeat(header.chars().count()));
            for column in schema {
                println!("{}", describe(column));
            }
        }
    }
    Ok(())
}
