use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod streaming;

// Re-export streaming types
pub use streaming::{ChangeBatch, ChangeFeed, ChangeItem, Cursor, FeedError};

/// Attribute value carried in an entity snapshot.
///
/// The change feed delivers entity attributes as loosely typed values;
/// the metadata mapping decides which destination column each one lands in.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Json(serde_json::Value),
    Null,
}

impl Value {
    /// Create a Value from a serde_json::Value.
    ///
    /// Scalars map to their typed variants; arrays and objects are kept
    /// as raw JSON. RFC3339 strings are not sniffed into DateTime - the
    /// column mapping decides how a string is stored.
    pub fn from_json_value(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Json(serde_json::Value::Number(n))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            other => Value::Json(other),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_value_maps_scalars() {
        assert_eq!(
            Value::from_json_value(serde_json::json!("Ann")),
            Value::String("Ann".to_string())
        );
        assert_eq!(Value::from_json_value(serde_json::json!(42)), Value::Integer(42));
        assert_eq!(Value::from_json_value(serde_json::json!(1.5)), Value::Float(1.5));
        assert_eq!(Value::from_json_value(serde_json::json!(true)), Value::Boolean(true));
        assert_eq!(Value::from_json_value(serde_json::Value::Null), Value::Null);
    }

    #[test]
    fn from_json_value_keeps_compound_values_as_json() {
        let v = Value::from_json_value(serde_json::json!({"street": "Main"}));
        match v {
            Value::Json(j) => assert_eq!(j["street"], "Main"),
            other => panic!("expected Json variant, got {:?}", other),
        }
    }

    #[test]
    fn as_datetime_parses_rfc3339_strings() {
        let v = Value::String("2024-03-01T10:00:00Z".to_string());
        let dt = v.as_datetime().expect("should parse");
        assert_eq!(dt.to_rfc3339(), "2024-03-01T10:00:00+00:00");
        assert_eq!(Value::Integer(3).as_datetime(), None);
    }
}
