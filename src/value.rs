use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Flat stored value — the shape a relational engine actually holds.
///
/// The transcoder converts between this and the rich application-side
/// `serde_json::Value` representation (structured values serialized to
/// `Text`, booleans normalized, and so on).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
    Blob(Vec<u8>),
}

/// One stored row, keyed by column name.
pub type EncodedRow = BTreeMap<String, SqlValue>;

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{}", r),
            SqlValue::Text(s) => write!(f, "{}", s),
            SqlValue::Boolean(b) => write!(f, "{}", b),
            SqlValue::Blob(b) => write!(f, "BLOB({} bytes)", b.len()),
        }
    }
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Flatten a JSON value into its stored shape without consulting the
    /// model. Arrays and objects fall back to their JSON text; typed
    /// handling of those lives in the transcoder.
    pub fn from_json(value: &Json) -> SqlValue {
        match value {
            Json::Null => SqlValue::Null,
            Json::Bool(b) => SqlValue::Boolean(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Integer(i)
                } else {
                    SqlValue::Real(n.as_f64().unwrap_or(0.0))
                }
            }
            Json::String(s) => SqlValue::Text(s.clone()),
            Json::Array(_) | Json::Object(_) => SqlValue::Text(value.to_string()),
        }
    }

    /// Lift a stored value back into the application-side JSON shape.
    pub fn to_json(&self) -> Json {
        match self {
            SqlValue::Null => Json::Null,
            SqlValue::Integer(i) => Json::from(*i),
            SqlValue::Real(r) => serde_json::Number::from_f64(*r)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            SqlValue::Text(s) => Json::String(s.clone()),
            SqlValue::Boolean(b) => Json::Bool(*b),
            SqlValue::Blob(b) => Json::String(hex::encode(b)),
        }
    }
}
