//! Value model for boundary payloads
//!
//! Arguments and results cross the boundary as JSON-shaped trees. Numbers
//! carry no int/float distinction: every numeric literal decodes to `f64`
//! and stays that way until the coercion engine converts it against a
//! target type descriptor.

use std::collections::BTreeMap;

use crate::{BridgeError, BridgeResult};

/// A node in the untyped value tree carried across the boundary.
///
/// Mapping keys are unique; `BTreeMap` keeps encoding deterministic.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value
    Null,

    /// Boolean (true/false)
    Bool(bool),

    /// Number (always f64 until coerced)
    Number(f64),

    /// UTF-8 string
    String(String),

    /// Ordered list of values
    Sequence(Vec<Value>),

    /// String-keyed mapping
    Mapping(BTreeMap<String, Value>),
}

impl Value {
    /// Get the node kind as a string (used in coercion error messages)
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Extract the number if this is a `Number`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract the boolean if this is a `Bool`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract the string if this is a `String`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Extract the elements if this is a `Sequence`
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Extract the entries if this is a `Mapping`
    pub fn as_mapping(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// Decode a value tree from JSON text.
    ///
    /// All numbers decode to `f64`, whatever their spelling.
    pub fn from_json(text: &str) -> BridgeResult<Value> {
        serde_json::from_str::<serde_json::Value>(text)
            .map(Value::from_serde)
            .map_err(|e| BridgeError::MalformedInput(e.to_string()))
    }

    /// Encode the value tree as JSON text.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.to_serde()).unwrap_or_else(|_| String::from("null"))
    }

    /// Convert from a `serde_json` tree, collapsing all numbers to `f64`.
    pub fn from_serde(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from_serde).collect())
            }
            serde_json::Value::Object(entries) => Value::Mapping(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_serde(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to a `serde_json` tree.
    ///
    /// Integral numbers encode without a fractional part (`5`, not `5.0`).
    /// Non-finite numbers have no JSON spelling and encode as null.
    pub fn to_serde(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => {
                let n = *n;
                if n.is_finite() && n.fract() == 0.0 && (i64::MIN as f64..=i64::MAX as f64).contains(&n) {
                    serde_json::Value::Number(serde_json::Number::from(n as i64))
                } else {
                    serde_json::Number::from_f64(n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_serde).collect())
            }
            Value::Mapping(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_serde()))
                    .collect(),
            ),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_scalars() {
        assert_eq!(Value::from_json("null").unwrap(), Value::Null);
        assert_eq!(Value::from_json("true").unwrap(), Value::Bool(true));
        assert_eq!(Value::from_json("\"hi\"").unwrap(), Value::String("hi".to_string()));
    }

    #[test]
    fn test_numbers_decode_to_f64() {
        // Integer spellings and float spellings land in the same representation
        assert_eq!(Value::from_json("3").unwrap(), Value::Number(3.0));
        assert_eq!(Value::from_json("3.0").unwrap(), Value::Number(3.0));
        assert_eq!(Value::from_json("-7").unwrap(), Value::Number(-7.0));
    }

    #[test]
    fn test_decode_nested() {
        let v = Value::from_json(r#"{"a": [1, 2], "b": {"c": true}}"#).unwrap();
        let map = v.as_mapping().unwrap();
        assert_eq!(
            map["a"],
            Value::Sequence(vec![Value::Number(1.0), Value::Number(2.0)])
        );
        assert_eq!(map["b"].as_mapping().unwrap()["c"], Value::Bool(true));
    }

    #[test]
    fn test_encode_round_trip() {
        let text = r#"{"name":"x","values":[1.5,2.5]}"#;
        let v = Value::from_json(text).unwrap();
        assert_eq!(Value::from_json(&v.to_json()).unwrap(), v);
    }

    #[test]
    fn test_malformed_input() {
        let err = Value::from_json("{not json").unwrap_err();
        assert!(matches!(err, BridgeError::MalformedInput(_)));
    }

    #[test]
    fn test_non_finite_encodes_as_null() {
        assert_eq!(Value::Number(f64::NAN).to_json(), "null");
        assert_eq!(Value::Number(f64::INFINITY).to_json(), "null");
    }

    #[test]
    fn test_integral_numbers_encode_without_fraction() {
        assert_eq!(Value::Number(5.0).to_json(), "5");
        assert_eq!(Value::Number(-2.0).to_json(), "-2");
        assert_eq!(Value::Number(4.5).to_json(), "4.5");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Number(1.0).type_name(), "number");
        assert_eq!(Value::Sequence(vec![]).type_name(), "sequence");
        assert_eq!(Value::Mapping(BTreeMap::new()).type_name(), "mapping");
    }
}
