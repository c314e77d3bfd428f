//! Decoded response payloads and attribute type coercion

use chrono::NaiveDateTime;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Control character the web UI substitutes for newlines inside values
pub const NEWLINE_ESCAPE: char = '\u{12}';

/// Router local-time format, e.g. `2020-07-16 23:04:16`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Attribute value after coercion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One object returned by the router, attributes in arrival order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an attribute, keeping its first position
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Router reply: error code plus the objects it carried
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ResponsePayload {
    pub error_code: i64,
    pub records: Vec<Record>,
}

/// Target type of a known attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Integer,
    Boolean,
    Timestamp,
    Content,
    Raw,
}

/// Fixed attribute-name to type table
pub fn attribute_kind(name: &str) -> AttributeKind {
    match name {
        "index" | "sendResult" => AttributeKind::Integer,
        "unread" => AttributeKind::Boolean,
        "receivedTime" | "sendTime" => AttributeKind::Timestamp,
        "content" => AttributeKind::Content,
        _ => AttributeKind::Raw,
    }
}

/// Apply the attribute type table to every text value.
///
/// Values that do not parse as their target type stay as text.
pub fn coerce_types(payload: ResponsePayload) -> ResponsePayload {
    let records: Vec<Record> = payload
        .records
        .into_iter()
        .map(|record| {
            record
                .fields
                .into_iter()
                .map(|(name, value)| {
                    let value = match value {
                        Value::Text(raw) => coerce_value(&name, raw),
                        other => other,
                    };
                    (name, value)
                })
                .collect::<Record>()
        })
        .collect();

    ResponsePayload {
        error_code: payload.error_code,
        records,
    }
}

/// Coerce one raw attribute according to its name
pub fn coerce_value(name: &str, raw: String) -> Value {
    match attribute_kind(name) {
        AttributeKind::Integer => match parse_leading_int(&raw) {
            Some(n) => Value::Integer(n),
            None => Value::Text(raw),
        },
        AttributeKind::Boolean => match parse_leading_int(&raw) {
            Some(n) => Value::Boolean(n > 0),
            None => Value::Text(raw),
        },
        AttributeKind::Timestamp => match NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT) {
            Ok(t) => Value::Timestamp(t),
            Err(_) => Value::Text(raw),
        },
        AttributeKind::Content => Value::Text(raw.replace(NEWLINE_ESCAPE, "\n")),
        AttributeKind::Raw => Value::Text(raw),
    }
}

/// Integer prefix of `s`: optional whitespace and sign, then digits.
/// `"35"`, `" 35 "` and `"35abc"` all give 35.
pub fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = rest
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    let n: i64 = rest[..end].parse().ok()?;
    Some(if negative { -n } else { n })
}
