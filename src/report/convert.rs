//! Per-field value conversion.
//!
//! Each converter takes the (possibly missing) JSON value of one report key.
//! A missing key and an explicit `null` both convert to `Ok(None)`. A value
//! of the wrong shape is a `ConversionError`, which the parser turns into a
//! null field.

use serde_json::Value;
use thiserror::Error;

use crate::report::model::Disposition;

/// A value that could not be converted to the field's type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected {expected}, found {found}")]
pub struct ConversionError {
    pub expected: &'static str,
    pub found: String,
}

impl ConversionError {
    fn new(expected: &'static str, found: &Value) -> Self {
        let mut found = found.to_string();
        if found.len() > 64 {
            let mut end = 64;
            while !found.is_char_boundary(end) {
                end -= 1;
            }
            found.truncate(end);
            found.push_str("...");
        }
        Self { expected, found }
    }
}

pub type Conversion<T> = Result<Option<T>, ConversionError>;

/// Convert to text.
///
/// Strings are taken verbatim. Scalars are rendered to their JSON text and
/// containers to compact JSON, so no value ever fails.
pub fn to_text(value: Option<&Value>) -> Conversion<String> {
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    })
}

/// Convert to a non-negative integer that fits in `T`.
///
/// Accepts JSON integers, floats without a fractional part and decimal
/// strings (surrounding whitespace ignored).
pub fn to_unsigned<T>(value: Option<&Value>) -> Conversion<T>
where
    T: TryFrom<u64>,
{
    let v = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };

    let wide = match v {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f < u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    wide.and_then(|w| T::try_from(w).ok())
        .map(Some)
        .ok_or_else(|| ConversionError::new("non-negative integer", v))
}

/// Convert to a policy disposition.
pub fn to_disposition(value: Option<&Value>) -> Conversion<Disposition> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .and_then(Disposition::parse)
            .map(Some)
            .ok_or_else(|| ConversionError::new("\"enforce\" or \"report\"", v)),
    }
}

/// Loose boolean coercion for settings values.
pub fn value_to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" | "" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

/// Loose list-of-strings coercion for settings values.
///
/// Accepts a JSON array of strings or a comma-separated string. Blank
/// entries are dropped.
pub fn value_to_string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(|s| s.trim().to_string()))
            .filter(|item| item.as_deref() != Some(""))
            .collect(),
        Value::String(s) => Some(
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        Value::Null => Some(Vec::new()),
        _ => None,
    }
}
