//! Method invocation engine and introspection reporter
//!
//! [`Bridge`] ties the pieces together: resolve the handle, resolve the
//! exposed method, decode the argument text, check arity, coerce each
//! argument, run the call under fault isolation, and encode the results.
//! Every failure becomes a `{"error": "<message>"}` payload; no failure
//! terminates the process, and nothing is retried.
//!
//! # Concurrency
//!
//! The bridge is synchronous: each invocation runs to completion on the
//! caller's thread. The registry lock covers only table lookups; each
//! object has its own mutex held for that object's call, so calls on
//! unrelated handles never contend. Concurrent calls on the *same* handle
//! serialize, and a method that re-invokes its own handle deadlocks.
//! There is no timeout or cancellation: a call that blocks inside the
//! invoked object blocks the calling thread.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;

use crate::coerce::{self, Arg};
use crate::method::{Expose, MethodDef};
use crate::registry::{Handle, ManagedObject, Registry};
use crate::types::TypeDesc;
use crate::value::Value;
use crate::{BridgeError, BridgeResult};

/// Bridge behavior options.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Convert panics raised by invoked methods into error results.
    /// On by default; a debugging host can switch it off to let panics
    /// propagate to the caller's unwind machinery.
    pub catch_panics: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self { catch_panics: true }
    }
}

/// The invocation bridge: registry plus dispatch.
#[derive(Default)]
pub struct Bridge {
    registry: Registry,
    options: BridgeOptions,
}

impl Bridge {
    /// Create a bridge with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bridge with the given options
    pub fn with_options(options: BridgeOptions) -> Self {
        Self {
            registry: Registry::new(),
            options,
        }
    }

    /// Access the underlying registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register an object and return its handle
    pub fn register<T: Expose>(&self, object: T) -> Handle {
        self.registry.register(object)
    }

    /// Release a handle; idempotent
    pub fn release(&self, handle: Handle) {
        self.registry.release(handle)
    }

    /// Invoke a method with encoded arguments, returning an encoded result.
    ///
    /// The argument text is a JSON array of parameters; empty or absent
    /// text is a zero-length list, and a bare non-array value is wrapped
    /// as a one-element list. On success the result list encodes as a
    /// JSON array; on failure the payload is `{"error": "<message>"}`.
    pub fn invoke(&self, handle: Handle, method: &str, args_json: &str) -> String {
        tracing::trace!(handle, method, "invoke");
        match self.invoke_text(handle, method, args_json) {
            Ok(results) => encode_results(&results),
            Err(err) => error_payload(&err),
        }
    }

    fn invoke_text(
        &self,
        handle: Handle,
        method: &str,
        args_json: &str,
    ) -> BridgeResult<Vec<Value>> {
        let object = self.registry.resolve(handle)?;
        let def = object
            .table()
            .resolve(method)
            .ok_or_else(|| BridgeError::MethodNotFound(method.to_string()))?;
        // Decode after resolution: an unknown handle or method outranks bad text
        let args = decode_args(args_json)?;
        self.dispatch(&object, def, args)
    }

    /// Invoke a method with already-decoded arguments.
    ///
    /// This is the Rust-side entry point; [`Bridge::invoke`] wraps it with
    /// decoding and encoding for the text boundary.
    pub fn try_invoke(
        &self,
        handle: Handle,
        method: &str,
        args: Vec<Value>,
    ) -> BridgeResult<Vec<Value>> {
        let object = self.registry.resolve(handle)?;
        let def = object
            .table()
            .resolve(method)
            .ok_or_else(|| BridgeError::MethodNotFound(method.to_string()))?;
        self.dispatch(&object, def, args)
    }

    fn dispatch(
        &self,
        object: &ManagedObject,
        def: &MethodDef,
        args: Vec<Value>,
    ) -> BridgeResult<Vec<Value>> {
        if args.len() != def.params().len() {
            return Err(BridgeError::ArityMismatch {
                expected: def.params().len(),
                got: args.len(),
            });
        }

        let mut coerced = Vec::with_capacity(args.len());
        for (index, (value, desc)) in args.iter().zip(def.params()).enumerate() {
            coerced.push(coerce::convert(value, desc, index)?);
        }

        let results = self.call_isolated(object, def, coerced)?;
        check_reserved_keys(&results)?;
        Ok(results)
    }

    fn call_isolated(
        &self,
        object: &ManagedObject,
        def: &MethodDef,
        args: Vec<Arg>,
    ) -> BridgeResult<Vec<Value>> {
        let mut cell = object.cell().lock();
        let recv: &mut dyn std::any::Any = &mut **cell;

        if !self.options.catch_panics {
            return def.call(recv, args);
        }

        match catch_unwind(AssertUnwindSafe(|| def.call(recv, args))) {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic);
                tracing::warn!(method = def.name(), panic = %message, "invoked method panicked");
                Err(BridgeError::Invocation(message))
            }
        }
    }

    /// Enumerate a handle's exposed methods without invoking any of them.
    pub fn describe(&self, handle: Handle) -> BridgeResult<MethodReport> {
        let object = self.registry.resolve(handle)?;
        let methods: Vec<MethodEntry> = object
            .table()
            .iter_exposed()
            .map(|def| MethodEntry {
                name: def.name().to_string(),
                parameters: def.params().iter().map(TypeDesc::type_name).collect(),
                returns: def.results().iter().map(TypeDesc::type_name).collect(),
            })
            .collect();
        let count = methods.len();
        Ok(MethodReport { methods, count })
    }

    /// Encoded form of [`Bridge::describe`]; errors become sentinel payloads
    pub fn describe_json(&self, handle: Handle) -> String {
        match self.describe(handle) {
            Ok(report) => encode_report(&report),
            Err(err) => error_payload(&err),
        }
    }

    /// Summarize a handle: type name and exposed method count.
    pub fn info(&self, handle: Handle) -> BridgeResult<InfoReport> {
        let object = self.registry.resolve(handle)?;
        Ok(InfoReport {
            handle,
            type_name: object.type_name().to_string(),
            methods: object.table().exposed_len(),
        })
    }

    /// Encoded form of [`Bridge::info`]; errors become sentinel payloads
    pub fn info_json(&self, handle: Handle) -> String {
        match self.info(handle) {
            Ok(report) => encode_report(&report),
            Err(err) => error_payload(&err),
        }
    }
}

/// Discovery report for one object's exposed methods.
#[derive(Debug, Clone, Serialize)]
pub struct MethodReport {
    /// Exposed methods in name order
    pub methods: Vec<MethodEntry>,
    /// Number of exposed methods
    pub count: usize,
}

/// One exposed method's declared signature.
#[derive(Debug, Clone, Serialize)]
pub struct MethodEntry {
    /// Method name
    pub name: String,
    /// Ordered parameter type names
    pub parameters: Vec<String>,
    /// Ordered result type names
    pub returns: Vec<String>,
}

/// Summary report for one registered object.
#[derive(Debug, Clone, Serialize)]
pub struct InfoReport {
    /// The handle queried
    pub handle: Handle,
    /// Rust type name of the underlying object
    #[serde(rename = "type")]
    pub type_name: String,
    /// Number of exposed methods
    pub methods: usize,
}

fn decode_args(text: &str) -> BridgeResult<Vec<Value>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    match Value::from_json(trimmed)? {
        Value::Sequence(items) => Ok(items),
        single => Ok(vec![single]),
    }
}

fn encode_results(results: &[Value]) -> String {
    Value::Sequence(results.to_vec()).to_json()
}

fn encode_report<T: Serialize>(report: &T) -> String {
    serde_json::to_string(report).unwrap_or_else(|_| error_text("report encoding failed"))
}

/// Build an error sentinel payload from a message.
pub fn error_text(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

fn error_payload(err: &BridgeError) -> String {
    error_text(&err.to_string())
}

// The far side discriminates errors by the presence of the "error" key, so
// a successful result must never carry it as a field name at any depth.
fn check_reserved_keys(results: &[Value]) -> BridgeResult<()> {
    fn has_reserved(value: &Value) -> bool {
        match value {
            Value::Mapping(entries) => {
                entries.contains_key("error") || entries.values().any(has_reserved)
            }
            Value::Sequence(items) => items.iter().any(has_reserved),
            _ => false,
        }
    }

    if results.iter().any(has_reserved) {
        return Err(BridgeError::Invocation(
            "result field name \"error\" is reserved for the error sentinel".to_string(),
        ));
    }
    Ok(())
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
