//! Dynamic column values.

use crate::catalog::{FieldType, ScalarType};
use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use serde::{Serialize, Serializer};
use serde_json::Value as Json;
use std::fmt;

/// A column value held by an entity record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value (SQL NULL).
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit integer.
    Integer(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
    /// Multi-valued attribute.
    List(Vec<Value>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text form written to the audit trail.
    ///
    /// Null renders as no value. Lists render every element, joined with `,`.
    pub fn render(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Get the text content, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer content, if this is an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the boolean content, if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Check whether this value can be stored in a column of the given type.
    ///
    /// A list column may itself be null but its elements may not.
    pub fn conforms_to(&self, field_type: &FieldType) -> bool {
        match (self, field_type) {
            (Value::Null, _) => true,
            (Value::List(items), FieldType::Array(scalar)) => {
                items
                    .iter()
                    .all(|item| !item.is_null() && item.is_scalar_of(*scalar))
            }
            (value, FieldType::Scalar(scalar)) => value.is_scalar_of(*scalar),
            _ => false,
        }
    }

    fn is_scalar_of(&self, scalar: ScalarType) -> bool {
        matches!(
            (self, scalar),
            (Value::Null, _)
                | (Value::Bool(_), ScalarType::Bool)
                | (Value::Integer(_), ScalarType::Integer)
                | (Value::Float(_), ScalarType::Float)
                | (Value::Text(_), ScalarType::Text)
                | (Value::Timestamp(_), ScalarType::Timestamp)
        )
    }

    /// Decode a column read from SQLite.
    pub(crate) fn from_column(raw: ValueRef<'_>, field_type: &FieldType) -> Result<Self> {
        if let ValueRef::Null = raw {
            return Ok(Value::Null);
        }

        match field_type {
            FieldType::Scalar(scalar) => Self::scalar_from_column(raw, *scalar),
            FieldType::Array(scalar) => {
                let text = raw
                    .as_str()
                    .map_err(|e| Error::InvalidData(e.to_string()))?;
                let json: Json = serde_json::from_str(text)
                    .map_err(|e| Error::InvalidData(format!("array column: {}", e)))?;
                Self::from_json(&json, *scalar)
            }
        }
    }

    fn scalar_from_column(raw: ValueRef<'_>, scalar: ScalarType) -> Result<Self> {
        let invalid = |e: rusqlite::types::FromSqlError| Error::InvalidData(e.to_string());

        Ok(match scalar {
            ScalarType::Bool => Value::Bool(raw.as_i64().map_err(invalid)? != 0),
            ScalarType::Integer => Value::Integer(raw.as_i64().map_err(invalid)?),
            ScalarType::Float => match raw {
                ValueRef::Integer(i) => Value::Float(i as f64),
                other => Value::Float(other.as_f64().map_err(invalid)?),
            },
            ScalarType::Text => Value::Text(raw.as_str().map_err(invalid)?.to_string()),
            ScalarType::Timestamp => {
                Value::Timestamp(parse_timestamp(raw.as_str().map_err(invalid)?)?)
            }
        })
    }

    fn from_json(json: &Json, scalar: ScalarType) -> Result<Self> {
        match (json, scalar) {
            (Json::Null, _) => Ok(Value::Null),
            (Json::Array(items), _) => items
                .iter()
                .map(|item| Self::from_json(item, scalar))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            (Json::Bool(b), ScalarType::Bool) => Ok(Value::Bool(*b)),
            (Json::Number(n), ScalarType::Integer) => n
                .as_i64()
                .map(Value::Integer)
                .ok_or_else(|| Error::InvalidData(format!("{} is not an integer", n))),
            (Json::Number(n), ScalarType::Float) => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| Error::InvalidData(format!("{} is not a float", n))),
            (Json::String(s), ScalarType::Text) => Ok(Value::Text(s.clone())),
            (Json::String(s), ScalarType::Timestamp) => parse_timestamp(s).map(Value::Timestamp),
            (other, scalar) => Err(Error::InvalidData(format!(
                "unexpected {} for {:?} column",
                other, scalar
            ))),
        }
    }

    /// JSON form of this value.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Integer(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Text(s) => Json::String(s.clone()),
            Value::Timestamp(ts) => Json::String(format_timestamp(ts)),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
        }
    }
}

/// Format a timestamp the way it is stored.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
pub(crate) fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::InvalidData(format!("timestamp `{}`: {}", text, e)))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::Timestamp(ts) => write!(f, "{}", format_timestamp(ts)),
            Value::List(items) => {
                let rendered: Vec<String> = items.iter().map(Value::to_string).collect();
                write!(f, "{}", rendered.join(","))
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(x) => ToSqlOutput::Owned(SqlValue::Real(*x)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Timestamp(ts) => ToSqlOutput::Owned(SqlValue::Text(format_timestamp(ts))),
            Value::List(_) => ToSqlOutput::Owned(SqlValue::Text(self.to_json().to_string())),
        })
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rusqlite::Connection;

    #[test]
    fn test_render_scalars() {
        assert_eq!(Value::Null.render(), None);
        assert_eq!(Value::from("guido").render().as_deref(), Some("guido"));
        assert_eq!(Value::from(42i64).render().as_deref(), Some("42"));
        assert_eq!(Value::from(true).render().as_deref(), Some("true"));
        assert_eq!(Value::from(1.5).render().as_deref(), Some("1.5"));
    }

    #[test]
    fn test_render_list_joins_every_element() {
        let tags = Value::from(vec!["a", "b", "c"]);
        assert_eq!(tags.render().as_deref(), Some("a,b,c"));

        let single = Value::from(vec!["only"]);
        assert_eq!(single.render().as_deref(), Some("only"));
    }

    #[test]
    fn test_render_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(
            Value::from(ts).render().as_deref(),
            Some("2024-05-01T12:30:00.000000Z")
        );
    }

    #[test]
    fn test_conforms_to() {
        let text = FieldType::scalar(ScalarType::Text);
        assert!(Value::from("x").conforms_to(&text));
        assert!(Value::Null.conforms_to(&text));
        assert!(!Value::from(1i64).conforms_to(&text));

        let ints = FieldType::array(ScalarType::Integer);
        assert!(Value::from(vec![1i64, 2]).conforms_to(&ints));
        assert!(!Value::from(vec!["x"]).conforms_to(&ints));
        assert!(!Value::from(1i64).conforms_to(&ints));
        assert!(Value::Null.conforms_to(&ints));
        assert!(Value::List(vec![]).conforms_to(&ints));
        assert!(!Value::List(vec![Value::Integer(1), Value::Null]).conforms_to(&ints));
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<&str>), Value::Null);
        assert_eq!(Value::from(Some(3i64)), Value::Integer(3));
    }

    #[test]
    fn test_sqlite_column_decoding() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (b INTEGER, f REAL, ts TEXT, tags TEXT, missing TEXT);",
        )
        .unwrap();

        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let tags = Value::from(vec!["x", "y"]);
        conn.execute(
            "INSERT INTO t VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                Value::Bool(true),
                Value::Integer(2),
                Value::Timestamp(ts),
                tags,
                Value::Null
            ],
        )
        .unwrap();

        let row: Vec<Value> = conn
            .query_row("SELECT b, f, ts, tags, missing FROM t", [], |row| {
                let types = [
                    FieldType::scalar(ScalarType::Bool),
                    FieldType::scalar(ScalarType::Float),
                    FieldType::scalar(ScalarType::Timestamp),
                    FieldType::array(ScalarType::Text),
                    FieldType::scalar(ScalarType::Text),
                ];
                Ok(types
                    .iter()
                    .enumerate()
                    .map(|(i, t)| Value::from_column(row.get_ref(i).unwrap(), t).unwrap())
                    .collect())
            })
            .unwrap();

        assert_eq!(row[0], Value::Bool(true));
        assert_eq!(row[1], Value::Float(2.0));
        assert_eq!(row[2], Value::Timestamp(ts));
        assert_eq!(row[3], Value::from(vec!["x", "y"]));
        assert_eq!(row[4], Value::Null);
    }

    #[test]
    fn test_serialize_as_plain_json() {
        let json = serde_json::to_string(&Value::from(vec![1i64, 2])).unwrap();
        assert_eq!(json, "[1,2]");
        let json = serde_json::to_string(&Value::from("guido")).unwrap();
        assert_eq!(json, "\"guido\"");
    }
}
