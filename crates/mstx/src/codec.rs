//! 🎼 The line codec: one compact JSON object per line, newline-terminated.
//!
//! This is the only on-disk format mstx knows. Rows read from a blob are decoded one
//! line at a time. Search hits written back to a blob are composed the same way, so the
//! next task in the workflow can read them with the same normalizer.
//!
//! ```text
//!   {"id":"1","name":"John"}\n
//!   {"id":"2","name":"Johnny"}\n
//! ```

use serde_json::Value;

use crate::common::Row;
use crate::error::{Result, TaskError};

/// 📦 Encode a row in its canonical compact form. No trailing newline.
pub fn encode_row(row: &Row) -> Result<String> {
    serde_json::to_string(row)
        .map_err(|e| TaskError::invalid_shape(format!("row could not be encoded: {e}")))
}

/// 📖 Decode one line into a row.
///
/// Blank lines decode to `None` and are skipped by callers. `line_number` is 1-based and
/// only shows up in error messages.
pub fn decode_line(line: &str, line_number: u64) -> Result<Option<Row>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(row)) => Ok(Some(row)),
        Ok(other) => Err(TaskError::invalid_shape(format!(
            "line {line_number}: expected a JSON object, found {}",
            value_kind(&other)
        ))),
        Err(e) => Err(TaskError::invalid_shape(format!(
            "line {line_number}: not valid JSON ({e})"
        ))),
    }
}

/// 📡 Compose rows into a newline-delimited payload, trailing `\n` included.
pub fn compose_ndjson(rows: &[Row]) -> Result<String> {
    let mut payload = String::new();
    for row in rows {
        payload.push_str(&encode_row(row)?);
        payload.push('\n');
    }
    Ok(payload)
}

/// 🏷️ A human name for what a JSON value turned out to be.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
