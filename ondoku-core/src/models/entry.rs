use chrono::{Local, NaiveDate};
use serde_json::{Map, Value};
use std::fmt;

use super::column::{Column, ColumnSchema};
use super::entry_id::EntryId;
use super::mark::Mark;
use super::page_range::PageRange;

/// Typed value of one evaluation column on one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Number(i64),
    Text(String),
    Select(Mark),
}

impl FieldValue {
    /// Stored JSON form. Numbers are written as numeric strings, the shape
    /// a form field produces.
    pub fn to_value(&self) -> Value {
        match self {
            FieldValue::Number(n) => Value::String(n.to_string()),
            FieldValue::Text(text) => Value::String(text.clone()),
            FieldValue::Select(mark) => Value::String(mark.symbol().to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Select(mark) => write!(f, "{}", mark),
        }
    }
}

/// The two sign-off stamps on an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignField {
    Parent,
    Teacher,
}

impl SignField {
    pub fn key(&self) -> &'static str {
        match self {
            SignField::Parent => "parentSign",
            SignField::Teacher => "teacherSign",
        }
    }
}

impl fmt::Display for SignField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignField::Parent => write!(f, "parent"),
            SignField::Teacher => write!(f, "teacher"),
        }
    }
}

impl std::str::FromStr for SignField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "parent" | "parentsign" => Ok(SignField::Parent),
            "teacher" | "teachersign" => Ok(SignField::Teacher),
            _ => Err(format!("Invalid sign '{}'. Valid options: parent, teacher", s)),
        }
    }
}

/// A single-field change to an entry. Each variant maps to exactly one key
/// of the stored document.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryField {
    Date(NaiveDate),
    Page(String),
    Sign(SignField, bool),
    Column(String, FieldValue),
}

impl EntryField {
    pub fn key(&self) -> &str {
        match self {
            EntryField::Date(_) => DATE_KEY,
            EntryField::Page(_) => "page",
            EntryField::Sign(sign, _) => sign.key(),
            EntryField::Column(id, _) => id,
        }
    }

    pub fn value(&self) -> Value {
        match self {
            EntryField::Date(date) => Value::String(date.format(DATE_FORMAT).to_string()),
            EntryField::Page(page) => Value::String(page.clone()),
            EntryField::Sign(_, signed) => Value::Bool(*signed),
            EntryField::Column(_, value) => value.to_value(),
        }
    }
}

const DATE_KEY: &str = "date";
const PAGE_KEY: &str = "page";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A cleared date input stores `""`; anything that is not a calendar date
/// reads as unset.
fn read_date(raw: Option<Value>) -> Option<NaiveDate> {
    match raw? {
        Value::String(text) => NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).ok(),
        _ => None,
    }
}

fn read_page(raw: Option<Value>) -> String {
    match raw {
        Some(Value::String(text)) => text,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn read_flag(raw: Option<Value>) -> bool {
    matches!(raw, Some(Value::Bool(true)))
}

/// One dated practice-log row.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: EntryId,
    /// `None` when the stored date is blank or unreadable.
    pub date: Option<NaiveDate>,
    /// Canonical page-range text, or empty.
    pub page: String,
    pub parent_sign: bool,
    pub teacher_sign: bool,
    /// Evaluation values keyed by column id, including values of columns
    /// that have since been removed.
    pub fields: Map<String, Value>,
}

impl Entry {
    /// Create today's entry with a default value for every column.
    pub fn new(schema: &ColumnSchema) -> Self {
        Self::with_id(EntryId::generate(), Local::now().date_naive(), schema)
    }

    pub fn with_id(id: EntryId, date: NaiveDate, schema: &ColumnSchema) -> Self {
        let fields = schema
            .iter()
            .map(|column| (column.id.clone(), column.default_value().to_value()))
            .collect();
        Self {
            id,
            date: Some(date),
            page: String::new(),
            parent_sign: false,
            teacher_sign: false,
            fields,
        }
    }

    /// Decode a stored document. Never fails: blank or mistyped built-in
    /// fields fall back to their empty values so every stored entry stays
    /// visible and editable.
    pub fn from_document(id: EntryId, mut document: Map<String, Value>) -> Self {
        let date = read_date(document.remove(DATE_KEY));
        let page = read_page(document.remove(PAGE_KEY));
        let parent_sign = read_flag(document.remove(SignField::Parent.key()));
        let teacher_sign = read_flag(document.remove(SignField::Teacher.key()));
        Self {
            id,
            date,
            page,
            parent_sign,
            teacher_sign,
            fields: document,
        }
    }

    pub fn to_document(&self) -> Map<String, Value> {
        let mut document = self.fields.clone();
        document.insert(DATE_KEY.to_string(), Value::String(self.date_text()));
        document.insert(PAGE_KEY.to_string(), Value::String(self.page.clone()));
        document.insert(
            SignField::Parent.key().to_string(),
            Value::Bool(self.parent_sign),
        );
        document.insert(
            SignField::Teacher.key().to_string(),
            Value::Bool(self.teacher_sign),
        );
        document
    }

    /// `YYYY-MM-DD`, or empty when unset.
    pub fn date_text(&self) -> String {
        self.date
            .map(|date| date.format(DATE_FORMAT).to_string())
            .unwrap_or_default()
    }

    pub fn page_range(&self) -> PageRange {
        PageRange::decode(&self.page)
    }

    pub fn sign(&self, sign: SignField) -> bool {
        match sign {
            SignField::Parent => self.parent_sign,
            SignField::Teacher => self.teacher_sign,
        }
    }

    /// Value stored for `column`, checked against the column's current type.
    /// `None` if the entry predates the column or the stored value no longer
    /// fits.
    pub fn value(&self, column: &Column) -> Option<FieldValue> {
        self.fields.get(&column.id).and_then(|raw| column.read(raw))
    }

    /// Text shown in a table cell. Select columns fall back to the default
    /// mark; other columns show an empty cell.
    pub fn display_value(&self, column: &Column) -> String {
        match self.value(column) {
            Some(value) => value.to_string(),
            None if column.column_type == super::ColumnType::Select => Mark::default().to_string(),
            None => String::new(),
        }
    }

    /// Apply a single-field change in place.
    pub fn apply(&mut self, field: &EntryField) {
        match field {
            EntryField::Date(date) => self.date = Some(*date),
            EntryField::Page(page) => self.page = page.clone(),
            EntryField::Sign(SignField::Parent, signed) => self.parent_sign = *signed,
            EntryField::Sign(SignField::Teacher, signed) => self.teacher_sign = *signed,
            EntryField::Column(id, value) => {
                self.fields.insert(id.clone(), value.to_value());
            }
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.date {
            Some(date) => writeln!(f, "Entry {} - {}", self.id, date)?,
            None => writeln!(f, "Entry {} - (no date)", self.id)?,
        }
        writeln!(f, "{}", "=".repeat(30))?;
        if !self.page.is_empty() {
            writeln!(f, "Page: {}", self.page)?;
        }
        writeln!(
            f,
            "Parent sign: {}",
            if self.parent_sign { "済" } else { "-" }
        )?;
        writeln!(
            f,
            "Teacher sign: {}",
            if self.teacher_sign { "確認" } else { "-" }
        )?;
        Ok(())
    }
}
