//! Validity gate for staged semi-structured files.

use serde_json::Value;

use landing_docstore::Record;

/// Extension of staged semi-structured files.
pub const JSON_EXTENSION: &str = "json";

#[derive(Debug, thiserror::Error)]
pub enum RecordShapeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("top-level value is {0}, expected a list of records")]
    NotAList(&'static str),

    #[error("list is empty")]
    Empty,

    #[error("element {0} is not a record")]
    NotARecord(usize),
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Parse `data` as a non-empty JSON list of objects.
///
/// Objects, scalars, empty lists and lists holding anything other than
/// objects are rejected.
pub fn parse_records(data: &[u8]) -> Result<Vec<Record>, RecordShapeError> {
    let value: Value = serde_json::from_slice(data)?;
    let items = match value {
        Value::Array(items) => items,
        other => return Err(RecordShapeError::NotAList(kind(&other))),
    };
    if items.is_empty() {
        return Err(RecordShapeError::Empty);
    }
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(record) => Ok(record),
            _ => Err(RecordShapeError::NotARecord(idx)),
        })
        .collect()
}
