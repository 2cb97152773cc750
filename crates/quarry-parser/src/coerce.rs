//! Value coercion for raw request strings

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use quarry_core::Value;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Coerce an equality operand: `true`/`false` become booleans, everything
/// else stays a string
pub fn coerce_scalar(raw: &str) -> Value {
    match raw.trim() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// Coerce an operand of an ordering operator (`gt`, `lt`, `between`, ...).
///
/// Numbers become `Value::Number`, date-shaped strings are kept verbatim,
/// anything else is rejected.
pub fn coerce_ordered(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(n) = trimmed.parse::<f64>() {
        if n.is_finite() {
            return Some(Value::Number(n));
        }
    }
    normalize_date(trimmed).map(|_| Value::String(trimmed.to_string()))
}

/// Normalize a date or datetime string to its calendar date (`YYYY-MM-DD`)
pub fn normalize_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
        return Some(date.format(DATE_FORMAT).to_string());
    }

    if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(datetime.date_naive().format(DATE_FORMAT).to_string());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|datetime| datetime.date().format(DATE_FORMAT).to_string())
}

/// Split a comma separated scalar into trimmed, non-empty parts
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Identifier check for field and relation names coming from requests
pub fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.ends_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}
