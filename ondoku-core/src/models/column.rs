//! Evaluation columns: the user-editable schema that decides which extra
//! fields every new entry carries.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::entry::FieldValue;
use super::entry_id::next_millis;
use super::mark::Mark;
use crate::error::ValidationError;

/// Longest value accepted by a `text` column, in characters.
pub const TEXT_MAX_CHARS: usize = 20;

const DEFAULT_MIN: i64 = 1;
const DEFAULT_MAX: i64 = 5;
const NEW_COLUMN_TITLE: &str = "新規項目";

/// Input widget a column renders as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnType {
    /// One of the three evaluation marks. Also the fallback for unknown types.
    #[default]
    Select,
    Number,
    Text,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Select => write!(f, "select"),
            ColumnType::Number => write!(f, "number"),
            ColumnType::Text => write!(f, "text"),
        }
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "select" => Ok(ColumnType::Select),
            "number" => Ok(ColumnType::Number),
            "text" => Ok(ColumnType::Text),
            _ => Err(format!(
                "Invalid column type '{}'. Valid options: select, number, text",
                s
            )),
        }
    }
}

impl From<String> for ColumnType {
    fn from(s: String) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl From<ColumnType> for String {
    fn from(t: ColumnType) -> Self {
        t.to_string()
    }
}

/// Bounds of a `number` column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumberOptions {
    #[serde(
        default,
        deserialize_with = "lenient_int",
        skip_serializing_if = "Option::is_none"
    )]
    pub min: Option<i64>,
    #[serde(
        default,
        deserialize_with = "lenient_int",
        skip_serializing_if = "Option::is_none"
    )]
    pub max: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NumberOptions {
    pub fn new(min: i64, max: i64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            extra: Map::new(),
        }
    }

    pub fn min(&self) -> i64 {
        self.min.unwrap_or(DEFAULT_MIN)
    }

    pub fn max(&self) -> i64 {
        self.max.unwrap_or(DEFAULT_MAX)
    }
}

/// Numbers may arrive as JSON numbers or as numeric strings from a form
/// field; anything else counts as unset.
fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(int_from_value(&value))
}

pub(crate) fn int_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// One evaluation column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<NumberOptions>,
    /// Keys this client does not know about, kept so whole-document
    /// rewrites do not drop them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Column {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        subtitle: impl Into<String>,
        column_type: ColumnType,
    ) -> Self {
        let options = match column_type {
            ColumnType::Number => Some(NumberOptions::new(DEFAULT_MIN, DEFAULT_MAX)),
            _ => None,
        };
        Self {
            id: id.into(),
            title: title.into(),
            subtitle: subtitle.into(),
            column_type,
            options,
            extra: Map::new(),
        }
    }

    pub fn with_options(mut self, min: i64, max: i64) -> Self {
        self.options = Some(NumberOptions::new(min, max));
        self
    }

    /// Effective `(min, max)` of a number column.
    pub fn bounds(&self) -> (i64, i64) {
        self.options
            .as_ref()
            .map(|o| (o.min(), o.max()))
            .unwrap_or((DEFAULT_MIN, DEFAULT_MAX))
    }

    /// Value a freshly created entry gets for this column.
    pub fn default_value(&self) -> FieldValue {
        match self.column_type {
            ColumnType::Number => FieldValue::Number(self.bounds().0),
            ColumnType::Text => FieldValue::Text(String::new()),
            ColumnType::Select => FieldValue::Select(Mark::default()),
        }
    }

    /// Interpret a stored value against this column's current type.
    /// Returns `None` when the stored shape does not fit.
    pub fn read(&self, raw: &Value) -> Option<FieldValue> {
        match self.column_type {
            ColumnType::Number => int_from_value(raw).map(FieldValue::Number),
            ColumnType::Text => raw.as_str().map(|s| FieldValue::Text(s.to_string())),
            ColumnType::Select => raw
                .as_str()
                .and_then(|s| s.parse::<Mark>().ok())
                .map(FieldValue::Select),
        }
    }

    /// Parse user input typed for this column.
    pub fn parse_input(&self, input: &str) -> Result<FieldValue, ValidationError> {
        let value = match self.column_type {
            ColumnType::Number => input
                .trim()
                .parse::<i64>()
                .map(FieldValue::Number)
                .map_err(|_| ValidationError::invalid(&self.id, "expected a whole number"))?,
            ColumnType::Text => FieldValue::Text(input.to_string()),
            ColumnType::Select => input
                .parse::<Mark>()
                .map(FieldValue::Select)
                .map_err(|e| ValidationError::invalid(&self.id, e))?,
        };
        self.validate(&value)?;
        Ok(value)
    }

    /// Check that a value fits this column.
    pub fn validate(&self, value: &FieldValue) -> Result<(), ValidationError> {
        match (self.column_type, value) {
            (ColumnType::Number, FieldValue::Number(n)) => {
                let (min, max) = self.bounds();
                if *n < min || *n > max {
                    return Err(ValidationError::invalid(
                        &self.id,
                        format!("{} is outside {}..={}", n, min, max),
                    ));
                }
                Ok(())
            }
            (ColumnType::Text, FieldValue::Text(text)) => {
                if text.chars().count() > TEXT_MAX_CHARS {
                    return Err(ValidationError::invalid(
                        &self.id,
                        format!("text is limited to {} characters", TEXT_MAX_CHARS),
                    ));
                }
                Ok(())
            }
            (ColumnType::Select, FieldValue::Select(_)) => Ok(()),
            (column_type, value) => Err(ValidationError::invalid(
                &self.id,
                format!("{} column cannot hold {:?}", column_type, value),
            )),
        }
    }

    fn set_type(&mut self, column_type: ColumnType) {
        self.column_type = column_type;
        match column_type {
            ColumnType::Number => {
                self.options
                    .get_or_insert_with(|| NumberOptions::new(DEFAULT_MIN, DEFAULT_MAX));
            }
            _ => self.options = None,
        }
    }

    fn set_option(&mut self, key: &str, value: Value) -> Result<(), ValidationError> {
        let path = format!("options.{}", key);
        if self.column_type != ColumnType::Number {
            return Err(ValidationError::invalid(
                path,
                "options only apply to number columns",
            ));
        }

        let options = self.options.get_or_insert_with(NumberOptions::default);
        match key {
            "min" | "max" => {
                let n = int_from_value(&value)
                    .ok_or_else(|| ValidationError::invalid(&path, "expected an integer"))?;
                if key == "min" {
                    options.min = Some(n);
                } else {
                    options.max = Some(n);
                }
                let (min, max) = (options.min(), options.max());
                if min > max {
                    return Err(ValidationError::InvalidRange { min, max });
                }
            }
            other => {
                options.extra.insert(other.to_string(), value);
            }
        }
        Ok(())
    }

    fn set_field(&mut self, path: &str, value: Value) -> Result<(), ValidationError> {
        if let Some(key) = path.strip_prefix("options.") {
            return self.set_option(key, value);
        }

        match path {
            "id" => Err(ValidationError::invalid("id", "column ids cannot change")),
            "title" | "subtitle" => {
                let text = value
                    .as_str()
                    .ok_or_else(|| ValidationError::invalid(path, "expected text"))?
                    .to_string();
                if path == "title" {
                    self.title = text;
                } else {
                    self.subtitle = text;
                }
                Ok(())
            }
            "type" => {
                let column_type = value
                    .as_str()
                    .ok_or_else(|| ValidationError::invalid(path, "expected text"))?
                    .parse::<ColumnType>()
                    .map_err(|e| ValidationError::invalid(path, e))?;
                self.set_type(column_type);
                Ok(())
            }
            "options" => {
                let options: NumberOptions = serde_json::from_value(value)
                    .map_err(|e| ValidationError::invalid(path, e.to_string()))?;
                if options.min() > options.max() {
                    return Err(ValidationError::InvalidRange {
                        min: options.min(),
                        max: options.max(),
                    });
                }
                self.options = Some(options);
                Ok(())
            }
            other => {
                self.extra.insert(other.to_string(), value);
                Ok(())
            }
        }
    }
}

/// Stored shape of `users/<id>/settings/columns`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnsDocument {
    data: Vec<Column>,
}

/// The ordered, non-empty list of evaluation columns. Order is display
/// order. Every edit returns a new schema; callers persist it wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    columns: Vec<Column>,
}

impl ColumnSchema {
    pub fn new(columns: Vec<Column>) -> Result<Self, ValidationError> {
        if columns.is_empty() {
            return Err(ValidationError::EmptySchema);
        }
        Ok(Self { columns })
    }

    /// The three columns every identity starts with.
    pub fn builtin() -> Self {
        Self {
            columns: vec![
                Column::new("eval1", "点・丸", "気をつける", ColumnType::Select),
                Column::new("eval2", "気持ち", "こめる", ColumnType::Select),
                Column::new("eval3", "九九", "カード", ColumnType::Select),
            ],
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Append a select column with a fresh id and a placeholder title.
    pub fn add_column(&self) -> Self {
        let mut columns = self.columns.clone();
        columns.push(Column::new(
            format!("eval_{}", next_millis()),
            NEW_COLUMN_TITLE,
            "",
            ColumnType::Select,
        ));
        Self { columns }
    }

    /// Remove a column. Removing the last remaining column is rejected.
    /// Data already stored under the column id stays in old entries.
    pub fn remove_column(&self, id: &str) -> Result<Self, ValidationError> {
        if self.columns.len() <= 1 {
            return Err(ValidationError::LastColumn);
        }
        let columns = self
            .columns
            .iter()
            .filter(|c| c.id != id)
            .cloned()
            .collect();
        Self::new(columns)
    }

    /// Set one field of one column. `path` is a top-level key (`title`,
    /// `subtitle`, `type`, ...) or `options.<key>` for a number bound.
    /// An unknown column id leaves the schema unchanged.
    pub fn update_field(&self, id: &str, path: &str, value: Value) -> Result<Self, ValidationError> {
        let mut columns = self.columns.clone();
        if let Some(column) = columns.iter_mut().find(|c| c.id == id) {
            column.set_field(path, value)?;
        }
        Ok(Self { columns })
    }

    /// Decode the stored `{ data: [...] }` document.
    pub fn from_document(document: Map<String, Value>) -> Result<Self, SchemaDecodeError> {
        let doc: ColumnsDocument = serde_json::from_value(Value::Object(document))?;
        Ok(Self::new(doc.data)?)
    }

    /// Encode as the stored `{ data: [...] }` document.
    pub fn to_document(&self) -> Map<String, Value> {
        let mut document = Map::new();
        let data = self
            .columns
            .iter()
            .map(|c| serde_json::to_value(c).unwrap_or(Value::Null))
            .collect();
        document.insert("data".to_string(), Value::Array(data));
        document
    }
}

impl Default for ColumnSchema {
    fn default() -> Self {
        Self::builtin()
    }
}

impl<'a> IntoIterator for &'a ColumnSchema {
    type Item = &'a Column;
    type IntoIter = std::slice::Iter<'a, Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

/// Why a stored schema document could not be used.
#[derive(Debug, thiserror::Error)]
pub enum SchemaDecodeError {
    #[error("Malformed columns document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single_column_schema() -> ColumnSchema {
        ColumnSchema::new(vec![Column::new("only", "Only", "", ColumnType::Select)]).unwrap()
    }

    #[test]
    fn test_builtin_schema() {
        let schema = ColumnSchema::builtin();
        let ids: Vec<&str> = schema.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["eval1", "eval2", "eval3"]);
        assert!(schema.iter().all(|c| c.column_type == ColumnType::Select));
        assert_eq!(schema.get("eval1").unwrap().title, "点・丸");
    }

    #[test]
    fn test_default_value_per_type() {
        let number = Column::new("n", "N", "", ColumnType::Number).with_options(2, 6);
        let text = Column::new("t", "T", "", ColumnType::Text);
        let select = Column::new("s", "S", "", ColumnType::Select);

        assert_eq!(number.default_value(), FieldValue::Number(2));
        assert_eq!(text.default_value(), FieldValue::Text(String::new()));
        assert_eq!(select.default_value(), FieldValue::Select(Mark::Good));
    }

    #[test]
    fn test_default_value_number_without_options_is_one() {
        let mut column = Column::new("n", "N", "", ColumnType::Number);
        column.options = None;
        assert_eq!(column.default_value(), FieldValue::Number(1));
    }

    #[test]
    fn test_add_column_appends_select() {
        let schema = ColumnSchema::builtin();
        let updated = schema.add_column();

        assert_eq!(schema.len(), 3);
        assert_eq!(updated.len(), 4);
        let added = &updated.columns()[3];
        assert!(added.id.starts_with("eval_"));
        assert_eq!(added.title, "新規項目");
        assert_eq!(added.subtitle, "");
        assert_eq!(added.column_type, ColumnType::Select);
    }

    #[test]
    fn test_add_column_ids_are_unique() {
        let schema = ColumnSchema::builtin().add_column().add_column();
        assert_ne!(schema.columns()[3].id, schema.columns()[4].id);
    }

    #[test]
    fn test_remove_column_preserves_order() {
        let schema = ColumnSchema::builtin().remove_column("eval2").unwrap();
        let ids: Vec<&str> = schema.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["eval1", "eval3"]);
    }

    #[test]
    fn test_remove_last_column_rejected() {
        let schema = single_column_schema();
        let result = schema.remove_column("only");
        assert_eq!(result, Err(ValidationError::LastColumn));
        assert_eq!(schema.len(), 1);
        assert_eq!(schema.columns()[0].id, "only");
    }

    #[test]
    fn test_update_title_is_pure() {
        let schema = ColumnSchema::builtin();
        let updated = schema.update_field("eval2", "title", json!("音読")).unwrap();

        assert_eq!(updated.get("eval2").unwrap().title, "音読");
        assert_eq!(schema.get("eval2").unwrap().title, "気持ち");
    }

    #[test]
    fn test_update_nested_option_keeps_sibling() {
        let schema = ColumnSchema::builtin()
            .update_field("eval1", "type", json!("number"))
            .unwrap()
            .update_field("eval1", "options.max", json!(10))
            .unwrap()
            .update_field("eval1", "options.min", json!("3"))
            .unwrap();

        let options = schema.get("eval1").unwrap().options.clone().unwrap();
        assert_eq!(options.min(), 3);
        assert_eq!(options.max(), 10);
    }

    #[test]
    fn test_update_option_rejects_inverted_range() {
        let schema = ColumnSchema::builtin()
            .update_field("eval1", "type", json!("number"))
            .unwrap();
        let result = schema.update_field("eval1", "options.min", json!(9));
        assert_eq!(result, Err(ValidationError::InvalidRange { min: 9, max: 5 }));
    }

    #[test]
    fn test_update_option_on_select_rejected() {
        let result = ColumnSchema::builtin().update_field("eval1", "options.min", json!(2));
        assert!(matches!(result, Err(ValidationError::InvalidValue { .. })));
    }

    #[test]
    fn test_switching_type_away_drops_options() {
        let schema = ColumnSchema::builtin()
            .update_field("eval3", "type", json!("number"))
            .unwrap();
        assert!(schema.get("eval3").unwrap().options.is_some());

        let schema = schema.update_field("eval3", "type", json!("text")).unwrap();
        assert!(schema.get("eval3").unwrap().options.is_none());
    }

    #[test]
    fn test_update_unknown_path_kept_as_extra() {
        let schema = ColumnSchema::builtin()
            .update_field("eval1", "color", json!("red"))
            .unwrap();
        assert_eq!(schema.get("eval1").unwrap().extra["color"], json!("red"));
    }

    #[test]
    fn test_update_unknown_column_is_noop() {
        let schema = ColumnSchema::builtin();
        let updated = schema.update_field("nope", "title", json!("x")).unwrap();
        assert_eq!(updated, schema);
    }

    #[test]
    fn test_id_is_immutable() {
        let result = ColumnSchema::builtin().update_field("eval1", "id", json!("other"));
        assert!(result.is_err());
    }

    #[test]
    fn test_read_validates_shape() {
        let number = Column::new("n", "N", "", ColumnType::Number);
        assert_eq!(number.read(&json!("4")), Some(FieldValue::Number(4)));
        assert_eq!(number.read(&json!(4)), Some(FieldValue::Number(4)));
        assert_eq!(number.read(&json!("four")), None);

        let select = Column::new("s", "S", "", ColumnType::Select);
        assert_eq!(select.read(&json!("◎")), Some(FieldValue::Select(Mark::Excellent)));
        assert_eq!(select.read(&json!(3)), None);
    }

    #[test]
    fn test_parse_input_checks_bounds_and_length() {
        let number = Column::new("n", "N", "", ColumnType::Number).with_options(1, 3);
        assert_eq!(number.parse_input("2").unwrap(), FieldValue::Number(2));
        assert!(number.parse_input("4").is_err());

        let text = Column::new("t", "T", "", ColumnType::Text);
        assert!(text.parse_input("short note").is_ok());
        assert!(text.parse_input(&"あ".repeat(21)).is_err());
    }

    #[test]
    fn test_document_roundtrip_keeps_unknown_keys() {
        let document = json!({
            "data": [
                { "id": "a", "title": "A", "subtitle": "", "type": "number",
                  "options": { "min": "2", "max": 4, "step": 1 }, "color": "blue" },
                { "id": "b", "title": "B" }
            ]
        });
        let Value::Object(map) = document else { unreachable!() };
        let schema = ColumnSchema::from_document(map).unwrap();

        let a = schema.get("a").unwrap();
        assert_eq!(a.bounds(), (2, 4));
        assert_eq!(a.extra["color"], json!("blue"));
        assert_eq!(schema.get("b").unwrap().column_type, ColumnType::Select);

        let encoded = schema.to_document();
        assert_eq!(encoded["data"][0]["options"]["step"], json!(1));
        assert_eq!(encoded["data"][0]["color"], json!("blue"));
    }

    #[test]
    fn test_unknown_type_falls_back_to_select() {
        let column: Column = serde_json::from_value(json!({ "id": "x", "type": "stars" })).unwrap();
        assert_eq!(column.column_type, ColumnType::Select);
    }

    #[test]
    fn test_empty_document_rejected() {
        let Value::Object(map) = json!({ "data": [] }) else { unreachable!() };
        assert!(matches!(
            ColumnSchema::from_document(map),
            Err(SchemaDecodeError::Invalid(ValidationError::EmptySchema))
        ));
    }
}
