//! Marshalling traits between coerced arguments and Rust values
//!
//! [`FromArg`] turns a coerced [`Arg`] into a typed Rust value and names
//! the [`TypeDesc`] the coercion engine should aim for. [`IntoValue`] and
//! [`IntoResults`] carry method results back into the value model. These
//! traits are the seam that replaces runtime reflection: the typed
//! trampolines registered by each [`Expose`](crate::method::Expose) impl
//! are generic over them.
//!
//! Record types implement `FromArg`/`IntoValue` by hand over the
//! [`decode_record`]/[`encode_record`] helpers (manual implementation for
//! now; derive macros can be added later):
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Plan { epochs: i64, rate: f64 }
//!
//! impl FromArg for Plan {
//!     fn descriptor() -> TypeDesc {
//!         TypeDesc::Record(
//!             RecordDesc::builder("Plan")
//!                 .field("epochs", TypeDesc::INT)
//!                 .field("rate", TypeDesc::FLOAT)
//!                 .build(),
//!         )
//!     }
//!     fn from_arg(arg: Arg, index: usize) -> BridgeResult<Self> {
//!         decode_record(arg, "Plan", index)
//!     }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::coerce::{Arg, MapKey};
use crate::types::{ScalarKind, TypeDesc};
use crate::value::Value;
use crate::{BridgeError, BridgeResult};

// ============================================================================
// FromArg
// ============================================================================

/// Convert a coerced argument into a typed Rust value.
///
/// `descriptor()` names the target shape; the invocation engine runs the
/// coercion engine against it before the trampoline ever sees the argument,
/// so `from_arg` only unwraps the already-matching variant.
pub trait FromArg: Sized {
    /// The type descriptor the coercion engine targets for this type
    fn descriptor() -> TypeDesc;

    /// Extract the typed value; `index` is the 0-based parameter position
    fn from_arg(arg: Arg, index: usize) -> BridgeResult<Self>;
}

macro_rules! impl_from_arg_scalar {
    ($variant:ident, $desc:expr, $expected:literal, $($ty:ty),*) => {$(
        impl FromArg for $ty {
            fn descriptor() -> TypeDesc {
                $desc
            }

            fn from_arg(arg: Arg, index: usize) -> BridgeResult<Self> {
                match arg {
                    Arg::$variant(v) => Ok(v as $ty),
                    other => Err(BridgeError::coercion(index, $expected, other.kind_name())),
                }
            }
        }
    )*};
}

impl_from_arg_scalar!(Int, TypeDesc::INT, "int", i8, i16, i32, i64, isize);
impl_from_arg_scalar!(Uint, TypeDesc::UINT, "uint", u8, u16, u32, u64, usize);
impl_from_arg_scalar!(Float, TypeDesc::FLOAT, "float", f32, f64);

impl FromArg for bool {
    fn descriptor() -> TypeDesc {
        TypeDesc::BOOL
    }

    fn from_arg(arg: Arg, index: usize) -> BridgeResult<Self> {
        match arg {
            Arg::Bool(b) => Ok(b),
            other => Err(BridgeError::coercion(index, "bool", other.kind_name())),
        }
    }
}

impl FromArg for String {
    fn descriptor() -> TypeDesc {
        TypeDesc::STRING
    }

    fn from_arg(arg: Arg, index: usize) -> BridgeResult<Self> {
        match arg {
            Arg::Str(s) => Ok(s),
            other => Err(BridgeError::coercion(index, "string", other.kind_name())),
        }
    }
}

impl FromArg for Duration {
    fn descriptor() -> TypeDesc {
        TypeDesc::DURATION
    }

    fn from_arg(arg: Arg, index: usize) -> BridgeResult<Self> {
        match arg {
            Arg::Duration(d) => Ok(d),
            other => Err(BridgeError::coercion(index, "duration", other.kind_name())),
        }
    }
}

impl<T: FromArg> FromArg for Vec<T> {
    fn descriptor() -> TypeDesc {
        TypeDesc::Sequence(Box::new(T::descriptor()))
    }

    fn from_arg(arg: Arg, index: usize) -> BridgeResult<Self> {
        match arg {
            Arg::Seq(items) => items
                .into_iter()
                .map(|item| T::from_arg(item, index))
                .collect(),
            other => Err(BridgeError::coercion(
                index,
                Self::descriptor().type_name(),
                other.kind_name(),
            )),
        }
    }
}

/// Mapping key types accepted by keyed-map extraction.
pub trait FromMapKey: Sized {
    /// The scalar kind the coercion engine converts wire keys into
    const KIND: ScalarKind;

    /// Extract the typed key
    fn from_map_key(key: MapKey, index: usize) -> BridgeResult<Self>;
}

impl FromMapKey for String {
    const KIND: ScalarKind = ScalarKind::Str;

    fn from_map_key(key: MapKey, index: usize) -> BridgeResult<Self> {
        match key {
            MapKey::Str(s) => Ok(s),
            MapKey::Int(i) => Err(BridgeError::coercion(
                index,
                "string map key",
                format!("key {i}"),
            )),
        }
    }
}

impl FromMapKey for i64 {
    const KIND: ScalarKind = ScalarKind::Int;

    fn from_map_key(key: MapKey, index: usize) -> BridgeResult<Self> {
        match key {
            MapKey::Int(i) => Ok(i),
            MapKey::Str(s) => Err(BridgeError::coercion(
                index,
                "integer map key",
                format!("key {s:?}"),
            )),
        }
    }
}

impl<K: FromMapKey + Ord, V: FromArg> FromArg for BTreeMap<K, V> {
    fn descriptor() -> TypeDesc {
        TypeDesc::Mapping {
            key: K::KIND,
            value: Box::new(V::descriptor()),
        }
    }

    fn from_arg(arg: Arg, index: usize) -> BridgeResult<Self> {
        match arg {
            Arg::Map(pairs) => pairs
                .into_iter()
                .map(|(k, v)| Ok((K::from_map_key(k, index)?, V::from_arg(v, index)?)))
                .collect(),
            other => Err(BridgeError::coercion(
                index,
                Self::descriptor().type_name(),
                other.kind_name(),
            )),
        }
    }
}

impl<K: FromMapKey + Eq + Hash, V: FromArg> FromArg for HashMap<K, V> {
    fn descriptor() -> TypeDesc {
        TypeDesc::Mapping {
            key: K::KIND,
            value: Box::new(V::descriptor()),
        }
    }

    fn from_arg(arg: Arg, index: usize) -> BridgeResult<Self> {
        match arg {
            Arg::Map(pairs) => pairs
                .into_iter()
                .map(|(k, v)| Ok((K::from_map_key(k, index)?, V::from_arg(v, index)?)))
                .collect(),
            other => Err(BridgeError::coercion(
                index,
                Self::descriptor().type_name(),
                other.kind_name(),
            )),
        }
    }
}

/// Decode a record argument into a concrete struct.
///
/// This is the re-encode/decode half of record coercion: the mapping is
/// carried through the engine shape-checked and decoded here with serde.
/// Decode failures keep the original parameter index.
pub fn decode_record<T: DeserializeOwned>(arg: Arg, name: &str, index: usize) -> BridgeResult<T> {
    match arg {
        Arg::Record(value) => serde_json::from_value(value.to_serde())
            .map_err(|e| BridgeError::coercion(index, name, format!("mapping ({e})"))),
        other => Err(BridgeError::coercion(index, name, other.kind_name())),
    }
}

/// Encode a record result as a value-model mapping.
pub fn encode_record<T: Serialize>(record: &T) -> Value {
    serde_json::to_value(record)
        .map(Value::from_serde)
        .unwrap_or(Value::Null)
}

// ============================================================================
// IntoValue
// ============================================================================

/// Convert one native result into a value-model node.
pub trait IntoValue {
    /// The type descriptor reported for this result position
    fn descriptor() -> TypeDesc;

    /// Convert into the value model
    fn into_value(self) -> Value;
}

macro_rules! impl_into_value_number {
    ($desc:expr, $($ty:ty),*) => {$(
        impl IntoValue for $ty {
            fn descriptor() -> TypeDesc {
                $desc
            }

            fn into_value(self) -> Value {
                Value::Number(self as f64)
            }
        }
    )*};
}

impl_into_value_number!(TypeDesc::INT, i8, i16, i32, i64, isize);
impl_into_value_number!(TypeDesc::UINT, u8, u16, u32, u64, usize);
impl_into_value_number!(TypeDesc::FLOAT, f32, f64);

impl IntoValue for bool {
    fn descriptor() -> TypeDesc {
        TypeDesc::BOOL
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl IntoValue for String {
    fn descriptor() -> TypeDesc {
        TypeDesc::STRING
    }

    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl IntoValue for Duration {
    fn descriptor() -> TypeDesc {
        TypeDesc::DURATION
    }

    fn into_value(self) -> Value {
        Value::Number(self.as_nanos() as f64)
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn descriptor() -> TypeDesc {
        TypeDesc::Sequence(Box::new(T::descriptor()))
    }

    fn into_value(self) -> Value {
        Value::Sequence(self.into_iter().map(IntoValue::into_value).collect())
    }
}

/// Mapping key types renderable in result mappings.
///
/// All mapping keys are strings on the wire; integer keys stringify.
pub trait IntoMapKey {
    /// The scalar kind reported for this key type
    const KIND: ScalarKind;

    /// Render the key as a wire string
    fn into_map_key(self) -> String;
}

impl IntoMapKey for String {
    const KIND: ScalarKind = ScalarKind::Str;

    fn into_map_key(self) -> String {
        self
    }
}

impl IntoMapKey for i64 {
    const KIND: ScalarKind = ScalarKind::Int;

    fn into_map_key(self) -> String {
        self.to_string()
    }
}

impl<K: IntoMapKey + Ord, V: IntoValue> IntoValue for BTreeMap<K, V> {
    fn descriptor() -> TypeDesc {
        TypeDesc::Mapping {
            key: K::KIND,
            value: Box::new(V::descriptor()),
        }
    }

    fn into_value(self) -> Value {
        Value::Mapping(
            self.into_iter()
                .map(|(k, v)| (k.into_map_key(), v.into_value()))
                .collect(),
        )
    }
}

impl<K: IntoMapKey + Eq + Hash, V: IntoValue> IntoValue for HashMap<K, V> {
    fn descriptor() -> TypeDesc {
        TypeDesc::Mapping {
            key: K::KIND,
            value: Box::new(V::descriptor()),
        }
    }

    fn into_value(self) -> Value {
        Value::Mapping(
            self.into_iter()
                .map(|(k, v)| (k.into_map_key(), v.into_value()))
                .collect(),
        )
    }
}

// ============================================================================
// IntoResults
// ============================================================================

/// Convert a method's return value into the ordered result list.
///
/// Implemented for `()` (no results), every [`IntoValue`] scalar and
/// container (one result), tuples up to three results, and
/// `Result<R, E>` (an `Err` becomes an invocation fault). Record types
/// returned bare implement this alongside `IntoValue`, delegating both
/// methods the same way the scalar impls do.
pub trait IntoResults {
    /// The type descriptors reported for the result positions
    fn descriptors() -> Vec<TypeDesc>;

    /// Convert into the ordered result list
    fn into_results(self) -> BridgeResult<Vec<Value>>;
}

impl IntoResults for () {
    fn descriptors() -> Vec<TypeDesc> {
        Vec::new()
    }

    fn into_results(self) -> BridgeResult<Vec<Value>> {
        Ok(Vec::new())
    }
}

macro_rules! impl_results_single {
    ($($ty:ty),* $(,)?) => {$(
        impl IntoResults for $ty {
            fn descriptors() -> Vec<TypeDesc> {
                vec![<$ty as IntoValue>::descriptor()]
            }

            fn into_results(self) -> BridgeResult<Vec<Value>> {
                Ok(vec![self.into_value()])
            }
        }
    )*};
}

impl_results_single!(
    i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, String, Duration,
);

impl<T: IntoValue> IntoResults for Vec<T> {
    fn descriptors() -> Vec<TypeDesc> {
        vec![<Vec<T> as IntoValue>::descriptor()]
    }

    fn into_results(self) -> BridgeResult<Vec<Value>> {
        Ok(vec![self.into_value()])
    }
}

impl<K: IntoMapKey + Ord, V: IntoValue> IntoResults for BTreeMap<K, V> {
    fn descriptors() -> Vec<TypeDesc> {
        vec![<BTreeMap<K, V> as IntoValue>::descriptor()]
    }

    fn into_results(self) -> BridgeResult<Vec<Value>> {
        Ok(vec![self.into_value()])
    }
}

impl<K: IntoMapKey + Eq + Hash, V: IntoValue> IntoResults for HashMap<K, V> {
    fn descriptors() -> Vec<TypeDesc> {
        vec![<HashMap<K, V> as IntoValue>::descriptor()]
    }

    fn into_results(self) -> BridgeResult<Vec<Value>> {
        Ok(vec![self.into_value()])
    }
}

impl<A: IntoValue, B: IntoValue> IntoResults for (A, B) {
    fn descriptors() -> Vec<TypeDesc> {
        vec![A::descriptor(), B::descriptor()]
    }

    fn into_results(self) -> BridgeResult<Vec<Value>> {
        Ok(vec![self.0.into_value(), self.1.into_value()])
    }
}

impl<A: IntoValue, B: IntoValue, C: IntoValue> IntoResults for (A, B, C) {
    fn descriptors() -> Vec<TypeDesc> {
        vec![A::descriptor(), B::descriptor(), C::descriptor()]
    }

    fn into_results(self) -> BridgeResult<Vec<Value>> {
        Ok(vec![
            self.0.into_value(),
            self.1.into_value(),
            self.2.into_value(),
        ])
    }
}

impl<R: IntoResults, E: std::fmt::Display> IntoResults for Result<R, E> {
    fn descriptors() -> Vec<TypeDesc> {
        R::descriptors()
    }

    fn into_results(self) -> BridgeResult<Vec<Value>> {
        match self {
            Ok(r) => r.into_results(),
            Err(e) => Err(BridgeError::Invocation(e.to_string())),
        }
    }
}
