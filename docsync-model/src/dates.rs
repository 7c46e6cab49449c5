//! Date normalization for documents.
//!
//! Remote documents carry dates as strings. [`DatedValue`] mirrors a JSON
//! value but lifts every string that looks like a date into a
//! `DateTime<Utc>`; strings that do not match a recognized pattern pass
//! through unchanged.
//!
//! Recognized patterns:
//! - RFC 3339 (`2024-03-01T09:30:00Z`, `2024-03-01T09:30:00.250+02:00`)
//! - naive date-time, read as UTC (`2024-03-01T09:30:00`, optional fraction)
//! - calendar date, read as midnight UTC (`2024-03-01`)

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// A JSON value with date-like strings converted to dates.
#[derive(Debug, Clone, PartialEq)]
pub enum DatedValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<DatedValue>),
    Object(BTreeMap<String, DatedValue>),
}

impl DatedValue {
    /// Converts a JSON value, recursing into arrays and objects.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => DatedValue::Null,
            Value::Bool(b) => DatedValue::Bool(*b),
            Value::Number(n) => DatedValue::Number(n.clone()),
            Value::String(s) => match parse_date(s) {
                Some(date) => DatedValue::Date(date),
                None => DatedValue::String(s.clone()),
            },
            Value::Array(items) => DatedValue::Array(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => DatedValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts back to JSON; dates render as RFC 3339 with milliseconds.
    pub fn to_json(&self) -> Value {
        match self {
            DatedValue::Null => Value::Null,
            DatedValue::Bool(b) => Value::Bool(*b),
            DatedValue::Number(n) => Value::Number(n.clone()),
            DatedValue::String(s) => Value::String(s.clone()),
            DatedValue::Date(d) => Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            DatedValue::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            DatedValue::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json());
                }
                Value::Object(out)
            }
        }
    }

    /// Object member lookup.
    pub fn get(&self, key: &str) -> Option<&DatedValue> {
        match self {
            DatedValue::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            DatedValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatedValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&Value> for DatedValue {
    fn from(value: &Value) -> Self {
        Self::from_json(value)
    }
}

/// Parses a date-like string, or returns `None` if it matches no pattern.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if !looks_like_date(s) {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if s.len() == 10 {
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}

// Cheap prefilter so ordinary strings never reach the chrono parsers.
fn looks_like_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit)
}
