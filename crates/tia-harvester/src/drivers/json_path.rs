//! Field access over provider JSON records.
//!
//! Paths use `!` between nesting levels; dots are literal key characters, so
//! `"dc.title"` names a single flat key and `"open_access!is_oa"` descends
//! one level. Missing optional fields read as `None` or an empty list, while
//! missing required fields and wrong shapes are decode errors.

use chrono::NaiveDate;
use serde_json::Value;
use tia_common::dates::parse_date;
use tia_common::{Result, TiaError};

pub fn node<'a>(record: &'a Value, path: &str, required: bool) -> Result<Option<&'a Value>> {
    let mut current = record;
    for key in path.split('!') {
        match current.get(key) {
            Some(next) => current = next,
            None if required => {
                return Err(TiaError::Decode(format!("cannot find node \"{path}\"")));
            }
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

fn scalar_text(value: &Value, path: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Object(_) => Err(TiaError::Decode(format!("node \"{path}\" is an object, string is expected"))),
        Value::Array(_) => Err(TiaError::Decode(format!("node \"{path}\" is an array, string is expected"))),
        other => Ok(other.to_string()),
    }
}

/// Scalar value as text. JSON null reads as `None` even when required.
pub fn string(record: &Value, path: &str, required: bool) -> Result<Option<String>> {
    match node(record, path, required)? {
        None | Some(Value::Null) => Ok(None),
        Some(v) => scalar_text(v, path).map(Some),
    }
}

pub fn required_string(record: &Value, path: &str) -> Result<String> {
    string(record, path, true)?
        .ok_or_else(|| TiaError::Decode(format!("node \"{path}\" is null")))
}

/// Array of scalars, or a single scalar read as a one-element list.
pub fn string_list(record: &Value, path: &str, required: bool) -> Result<Vec<String>> {
    match node(record, path, required)? {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items.iter().map(|item| scalar_text(item, path)).collect(),
        Some(v) => Ok(vec![scalar_text(v, path)?]),
    }
}

pub fn boolean(record: &Value, path: &str) -> Result<Option<bool>> {
    match node(record, path, false)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(TiaError::Decode(format!("node \"{path}\" is not a boolean"))),
    }
}

pub fn integer(record: &Value, path: &str) -> Result<Option<i64>> {
    match node(record, path, false)? {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| TiaError::Decode(format!("node \"{path}\" is not an integer"))),
    }
}

/// `yyyy/MM/dd` or `yyyy-MM-dd`; any other text is a decode error.
pub fn date(record: &Value, path: &str) -> Result<Option<NaiveDate>> {
    match string(record, path, false)? {
        None => Ok(None),
        Some(text) => parse_date(&text)
            .map(Some)
            .ok_or_else(|| TiaError::Decode(format!("cannot decode date: {text}"))),
    }
}
