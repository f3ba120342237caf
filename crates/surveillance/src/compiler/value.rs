//! Value coercion shared by leaf comparators and the index planner.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::schema::{Field, FieldValue};

/// A literal from a filter leaf, normalized at compile time.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl Scalar {
    /// Convert a JSON literal. Timestamps on `killmail_time` become Unix seconds.
    pub(crate) fn from_json(field: Field, value: &Value) -> Result<Scalar, String> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Scalar::Int(i))
                } else {
                    n.as_f64()
                        .map(Scalar::Float)
                        .ok_or_else(|| format!("number {n} is out of range"))
                }
            }
            Value::String(s) if field == Field::KillmailTime => parse_timestamp(s)
                .map(Scalar::Float)
                .ok_or_else(|| format!("'{s}' is not an RFC 3339 timestamp")),
            Value::String(s) => Ok(Scalar::Text(s.clone())),
            Value::Bool(b) => Ok(Scalar::Bool(*b)),
            Value::Null => Err("value is missing".to_string()),
            Value::Object(_) => Err("value must be a number, string or boolean".to_string()),
            Value::Array(_) => Err("nested lists are not supported".to_string()),
        }
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Text(s) => s.trim().parse().ok(),
            Scalar::Bool(_) => None,
        }
    }

    /// Integer form usable as an inverted-index key.
    pub(crate) fn as_index_key(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            Scalar::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Scalar::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

fn parse_timestamp(s: &str) -> Option<f64> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| epoch_seconds(dt.with_timezone(&Utc)))
}

pub(crate) fn epoch_seconds(dt: DateTime<Utc>) -> f64 {
    dt.timestamp_millis() as f64 / 1000.0
}

/// One element of a killmail field viewed as a list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Elem<'a> {
    Int(i64),
    Float(f64),
    Text(&'a str),
    Bool(bool),
}

impl<'a> Elem<'a> {
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Elem::Int(i) => Some(*i as f64),
            Elem::Float(f) => Some(*f),
            Elem::Text(s) => s.trim().parse().ok(),
            Elem::Bool(_) => None,
        }
    }

    /// Loose equality: numbers numerically, text case-insensitively.
    pub(crate) fn matches(&self, literal: &Scalar) -> bool {
        match (self, literal) {
            (Elem::Int(a), Scalar::Int(b)) => a == b,
            (Elem::Text(a), Scalar::Text(b)) => a.eq_ignore_ascii_case(b),
            (Elem::Bool(a), Scalar::Bool(b)) => a == b,
            (Elem::Bool(_), _) | (_, Scalar::Bool(_)) => false,
            _ => match (self.as_f64(), literal.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

/// Flatten a field value into comparable elements (a scalar becomes a one-element list).
pub(crate) fn elements<'a>(value: &FieldValue<'a>) -> Vec<Elem<'a>> {
    match value {
        FieldValue::Int(i) => vec![Elem::Int(*i)],
        FieldValue::Float(f) => vec![Elem::Float(*f)],
        FieldValue::Text(s) => vec![Elem::Text(*s)],
        FieldValue::Bool(b) => vec![Elem::Bool(*b)],
        FieldValue::Time(t) => vec![Elem::Float(epoch_seconds(*t))],
        FieldValue::IntList(ids) => ids.iter().map(|i| Elem::Int(*i)).collect(),
        FieldValue::TextList(tags) => {
            let tags: &'a [String] = *tags;
            tags.iter().map(|t| Elem::Text(t.as_str())).collect()
        }
        FieldValue::Missing => Vec::new(),
    }
}

/// Short description of a field value for error messages.
pub(crate) fn describe(value: &FieldValue<'_>) -> String {
    match value {
        FieldValue::Int(i) => format!("integer {i}"),
        FieldValue::Float(f) => format!("number {f}"),
        FieldValue::Text(s) => format!("text '{s}'"),
        FieldValue::Bool(b) => format!("boolean {b}"),
        FieldValue::Time(t) => format!("timestamp {}", t.to_rfc3339()),
        FieldValue::IntList(ids) => format!("list of {} ids", ids.len()),
        FieldValue::TextList(tags) => format!("list of {} tags", tags.len()),
        FieldValue::Missing => "nothing".to_string(),
    }
}
