//! Tether Bridge Core
//!
//! This crate implements a dynamic invocation bridge: callers outside the
//! process's type system invoke methods on in-process objects by name,
//! passing and receiving untyped structured data. It provides:
//! - The value model carried across the boundary (JSON-shaped trees)
//! - A type coercion engine mapping value trees onto typed signatures
//! - A process-wide handle registry owning the invoked objects
//! - A method invocation engine with fault isolation
//! - A method introspection reporter for discovery without invocation
//!
//! Rust has no runtime reflection, so method sets are declared up front:
//! each registrable type implements [`Expose`] and registers typed
//! trampoline closures in a [`Methods`] builder. Dispatch and discovery
//! both read the resulting table, so they can never disagree.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod value;
pub mod types;
pub mod coerce;
pub mod marshal;
pub mod method;
pub mod registry;
pub mod bridge;

pub use value::Value;
pub use types::{RecordDesc, RecordDescBuilder, ScalarKind, TypeDesc};
pub use coerce::{convert, Arg, MapKey};
pub use marshal::{
    decode_record, encode_record, FromArg, FromMapKey, IntoMapKey, IntoResults, IntoValue,
};
pub use method::{Expose, Handler, MethodDef, MethodTable, Methods};
pub use registry::{Handle, ManagedObject, Registry};
pub use bridge::{error_text, Bridge, BridgeOptions, InfoReport, MethodEntry, MethodReport};

/// Bridge errors
///
/// Every failure surfaces as a structured error result at the point of the
/// failing operation; none of them terminate the process, and nothing is
/// retried automatically.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    /// An operation referenced a handle absent from the registry
    #[error("unknown handle {0}")]
    HandleNotFound(registry::Handle),

    /// Invocation named a method absent from, or not exposed on, the target
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Decoded argument count differs from the declared parameter count
    #[error("expected {expected} parameters, got {got}")]
    ArityMismatch {
        /// Declared parameter count
        expected: usize,
        /// Decoded argument count
        got: usize,
    },

    /// An argument's shape cannot be converted to its target type
    #[error("parameter {index}: expected {expected}, got {got}")]
    Coercion {
        /// 0-based parameter index
        index: usize,
        /// Expected type description
        expected: String,
        /// Actual value description
        got: String,
    },

    /// The invoked method raised a fault during execution
    #[error("invocation fault: {0}")]
    Invocation(String),

    /// The encoded argument text is not valid value-model text
    #[error("invalid argument text: {0}")]
    MalformedInput(String),
}

impl BridgeError {
    /// Build a coercion error for the given parameter index.
    pub fn coercion(index: usize, expected: impl Into<String>, got: impl Into<String>) -> Self {
        BridgeError::Coercion {
            index,
            expected: expected.into(),
            got: got.into(),
        }
    }
}

/// Bridge operation result
pub type BridgeResult<T> = Result<T, BridgeError>;
