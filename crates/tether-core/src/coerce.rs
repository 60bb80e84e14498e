//! Type coercion engine
//!
//! Converts one value-model node into a coerced native argument matching a
//! target [`TypeDesc`], recursively. The rules:
//!
//! - Int/Uint targets accept a `Number`, truncating toward zero
//! - Float targets accept a `Number` only
//! - Bool targets accept a `Bool` only, String targets a `String` only
//! - Duration targets accept a `Number` counted in nanoseconds
//! - Sequence targets accept a `Sequence` (element-wise recursion) or a
//!   bare `Number`, which wraps into a one-element sequence — a deliberate
//!   ergonomic special case for numeric vector inputs that does not extend
//!   to other scalar kinds
//! - Mapping targets accept a `Mapping`; string keys pass through,
//!   integer-keyed targets parse their keys
//! - Record targets accept a `Mapping`, carried opaquely and decoded into
//!   the concrete struct by the receiving trampoline
//!
//! The first failure aborts the whole parameter list; every error carries
//! the 0-based parameter index and an expected/actual description. Nested
//! failures keep the original parameter index, not a nested one.

use std::time::Duration;

use crate::types::{ScalarKind, TypeDesc};
use crate::value::Value;
use crate::{BridgeError, BridgeResult};

/// A coerced native argument, ready for a typed trampoline.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    Uint(u64),
    /// Floating point
    Float(f64),
    /// Boolean
    Bool(bool),
    /// UTF-8 string
    Str(String),
    /// Time span
    Duration(Duration),
    /// Sequence of coerced elements
    Seq(Vec<Arg>),
    /// Mapping with converted keys and coerced values
    Map(Vec<(MapKey, Arg)>),
    /// Shape-checked mapping for a record target, decoded by the receiver
    Record(Value),
}

/// A converted mapping key.
#[derive(Debug, Clone, PartialEq)]
pub enum MapKey {
    /// String key, passed through
    Str(String),
    /// Integer key, parsed from the string form
    Int(i64),
}

impl Arg {
    /// Get the argument kind as a string (used in extraction mismatch errors)
    pub fn kind_name(&self) -> &'static str {
        match self {
            Arg::Int(_) => "int",
            Arg::Uint(_) => "uint",
            Arg::Float(_) => "float",
            Arg::Bool(_) => "bool",
            Arg::Str(_) => "string",
            Arg::Duration(_) => "duration",
            Arg::Seq(_) => "sequence",
            Arg::Map(_) => "mapping",
            Arg::Record(_) => "record",
        }
    }
}

/// Convert a value-model node into an argument matching `target`.
///
/// `index` is the 0-based position of the parameter being converted; it is
/// carried into every error this conversion (or any nested conversion)
/// produces.
pub fn convert(value: &Value, target: &TypeDesc, index: usize) -> BridgeResult<Arg> {
    match target {
        TypeDesc::Scalar(kind) => convert_scalar(value, *kind, index),
        TypeDesc::Sequence(element) => convert_sequence(value, element, index),
        TypeDesc::Mapping { key, value: val } => convert_mapping(value, *key, val, index),
        TypeDesc::Record(desc) => match value {
            Value::Mapping(_) => Ok(Arg::Record(value.clone())),
            other => Err(BridgeError::coercion(index, desc.name(), other.type_name())),
        },
    }
}

fn convert_scalar(value: &Value, kind: ScalarKind, index: usize) -> BridgeResult<Arg> {
    match kind {
        ScalarKind::Int => match value {
            // `as` truncates toward zero and saturates at the bounds
            Value::Number(n) => Ok(Arg::Int(*n as i64)),
            other => Err(BridgeError::coercion(index, "int", other.type_name())),
        },
        ScalarKind::Uint => match value {
            Value::Number(n) => Ok(Arg::Uint(*n as u64)),
            other => Err(BridgeError::coercion(index, "uint", other.type_name())),
        },
        ScalarKind::Float => match value {
            Value::Number(n) => Ok(Arg::Float(*n)),
            other => Err(BridgeError::coercion(index, "float", other.type_name())),
        },
        ScalarKind::Bool => match value {
            Value::Bool(b) => Ok(Arg::Bool(*b)),
            other => Err(BridgeError::coercion(index, "bool", other.type_name())),
        },
        ScalarKind::Str => match value {
            Value::String(s) => Ok(Arg::Str(s.clone())),
            other => Err(BridgeError::coercion(index, "string", other.type_name())),
        },
        ScalarKind::Duration => match value {
            Value::Number(n) => Ok(Arg::Duration(Duration::from_nanos(*n as u64))),
            other => Err(BridgeError::coercion(index, "duration", other.type_name())),
        },
    }
}

fn convert_sequence(value: &Value, element: &TypeDesc, index: usize) -> BridgeResult<Arg> {
    match value {
        Value::Sequence(items) => items
            .iter()
            .map(|item| convert(item, element, index))
            .collect::<BridgeResult<Vec<_>>>()
            .map(Arg::Seq),
        // A bare number coerces into a one-element sequence
        Value::Number(_) => Ok(Arg::Seq(vec![convert(value, element, index)?])),
        other => Err(BridgeError::coercion(
            index,
            format!("list<{}>", element.type_name()),
            other.type_name(),
        )),
    }
}

fn convert_mapping(
    value: &Value,
    key_kind: ScalarKind,
    val_desc: &TypeDesc,
    index: usize,
) -> BridgeResult<Arg> {
    let entries = match value {
        Value::Mapping(entries) => entries,
        other => {
            return Err(BridgeError::coercion(
                index,
                format!("map<{}, {}>", key_kind.type_name(), val_desc.type_name()),
                other.type_name(),
            ))
        }
    };

    let mut out = Vec::with_capacity(entries.len());
    for (key_str, raw) in entries {
        let key = match key_kind {
            ScalarKind::Str => MapKey::Str(key_str.clone()),
            ScalarKind::Int | ScalarKind::Uint => match key_str.parse::<i64>() {
                Ok(i) => MapKey::Int(i),
                Err(_) => {
                    return Err(BridgeError::coercion(
                        index,
                        "integer map key",
                        format!("key {key_str:?}"),
                    ))
                }
            },
            other => {
                return Err(BridgeError::coercion(
                    index,
                    "string or integer map key",
                    other.type_name(),
                ))
            }
        };
        out.push((key, convert(raw, val_desc, index)?));
    }
    Ok(Arg::Map(out))
}
