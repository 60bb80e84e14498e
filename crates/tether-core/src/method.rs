//! Method tables and typed trampolines
//!
//! Each registrable type declares its callable methods once through the
//! [`Expose`] trait. Registration erases the typed closure behind a
//! trampoline that downcasts the receiver and extracts arguments with
//! [`FromArg`]; the declared parameter and result descriptors stay on the
//! [`MethodDef`] so dispatch and discovery read the same table.
//!
//! Visibility follows the host object-model convention: only method names
//! beginning with an ASCII uppercase letter are exposed. Lowercase names
//! are registrable but invisible to both dispatch and discovery.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use crate::coerce::Arg;
use crate::marshal::{FromArg, IntoResults};
use crate::types::TypeDesc;
use crate::value::Value;
use crate::{BridgeError, BridgeResult};

type ErasedHandler = Box<dyn Fn(&mut dyn Any, Vec<Arg>) -> BridgeResult<Vec<Value>> + Send + Sync>;

/// One callable method: name, declared signature, and erased trampoline.
pub struct MethodDef {
    name: String,
    params: Vec<TypeDesc>,
    results: Vec<TypeDesc>,
    handler: ErasedHandler,
}

impl MethodDef {
    /// Get the method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the ordered parameter descriptors
    pub fn params(&self) -> &[TypeDesc] {
        &self.params
    }

    /// Get the ordered result descriptors
    pub fn results(&self) -> &[TypeDesc] {
        &self.results
    }

    pub(crate) fn call(&self, recv: &mut dyn Any, args: Vec<Arg>) -> BridgeResult<Vec<Value>> {
        (self.handler)(recv, args)
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("results", &self.results)
            .finish()
    }
}

fn is_exposed(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// Name-keyed table of a registered object's methods.
#[derive(Debug, Default)]
pub struct MethodTable {
    methods: BTreeMap<String, MethodDef>,
}

impl MethodTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a method definition, replacing any earlier one with the name
    pub fn insert(&mut self, def: MethodDef) {
        self.methods.insert(def.name.clone(), def);
    }

    /// Resolve an exposed method by exact, case-sensitive name
    pub fn resolve(&self, name: &str) -> Option<&MethodDef> {
        if !is_exposed(name) {
            return None;
        }
        self.methods.get(name)
    }

    /// Iterate over exposed methods in name order
    pub fn iter_exposed(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods
            .values()
            .filter(|def| is_exposed(&def.name))
    }

    /// Count exposed methods
    pub fn exposed_len(&self) -> usize {
        self.iter_exposed().count()
    }

    /// Count all registered methods, exposed or not
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// A typed method handler over receiver `T`.
///
/// Implemented for closures and fn items of the form
/// `Fn(&mut T, A0, .., An) -> R` with every `Ai: FromArg` and
/// `R: IntoResults`, for arities 0 through 6. `Args` is the argument
/// tuple, inferred at the [`Methods::register`] call site.
pub trait Handler<T, Args>: Send + Sync + 'static {
    /// The declared parameter descriptors
    fn params() -> Vec<TypeDesc>;

    /// The declared result descriptors
    fn results() -> Vec<TypeDesc>;

    /// Extract arguments, call the method, convert results
    fn call(&self, recv: &mut T, args: Vec<Arg>) -> BridgeResult<Vec<Value>>;
}

macro_rules! impl_handler {
    ($($arg:ident),*) => {
        impl<T, F, R, $($arg),*> Handler<T, ($($arg,)*)> for F
        where
            T: 'static,
            F: Fn(&mut T $(, $arg)*) -> R + Send + Sync + 'static,
            R: IntoResults,
            $($arg: FromArg + 'static,)*
        {
            fn params() -> Vec<TypeDesc> {
                vec![$(<$arg as FromArg>::descriptor()),*]
            }

            fn results() -> Vec<TypeDesc> {
                R::descriptors()
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn call(&self, recv: &mut T, args: Vec<Arg>) -> BridgeResult<Vec<Value>> {
                let expected: usize = 0 $(+ { let _ = stringify!($arg); 1 })*;
                if args.len() != expected {
                    return Err(BridgeError::ArityMismatch {
                        expected,
                        got: args.len(),
                    });
                }
                let mut iter = args.into_iter();
                let mut index = 0usize;
                $(
                    let $arg = match iter.next() {
                        Some(arg) => <$arg as FromArg>::from_arg(arg, index)?,
                        None => {
                            return Err(BridgeError::ArityMismatch {
                                expected,
                                got: index,
                            })
                        }
                    };
                    index += 1;
                )*
                (self)(recv $(, $arg)*).into_results()
            }
        }
    };
}

impl_handler!();
impl_handler!(A0);
impl_handler!(A0, A1);
impl_handler!(A0, A1, A2);
impl_handler!(A0, A1, A2, A3);
impl_handler!(A0, A1, A2, A3, A4);
impl_handler!(A0, A1, A2, A3, A4, A5);

/// Typed method-table builder for receiver `T`.
pub struct Methods<T> {
    table: MethodTable,
    _marker: PhantomData<fn(&mut T)>,
}

impl<T: 'static> Methods<T> {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            table: MethodTable::new(),
            _marker: PhantomData,
        }
    }

    /// Register a method under `name`.
    ///
    /// The handler's parameter and result types declare the signature;
    /// registering an existing name replaces the earlier definition.
    pub fn register<Args, H>(&mut self, name: &str, handler: H)
    where
        H: Handler<T, Args>,
    {
        let trampoline = move |recv: &mut dyn Any, args: Vec<Arg>| -> BridgeResult<Vec<Value>> {
            let recv = recv
                .downcast_mut::<T>()
                .ok_or_else(|| BridgeError::Invocation("receiver type mismatch".to_string()))?;
            handler.call(recv, args)
        };
        self.table.insert(MethodDef {
            name: name.to_string(),
            params: H::params(),
            results: H::results(),
            handler: Box::new(trampoline),
        });
    }

    /// Finish building and return the table
    pub fn into_table(self) -> MethodTable {
        self.table
    }
}

impl<T: 'static> Default for Methods<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Types registrable with the bridge.
///
/// Implementors declare their callable methods once; the registry builds
/// the table at registration time.
pub trait Expose: Send + Sized + 'static {
    /// Register this type's callable methods
    fn expose(methods: &mut Methods<Self>);

    /// Build the full method table for this type
    fn method_table() -> MethodTable {
        let mut methods = Methods::new();
        Self::expose(&mut methods);
        methods.into_table()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        total: i64,
    }

    impl Expose for Counter {
        fn expose(methods: &mut Methods<Self>) {
            methods.register("Add", |c: &mut Counter, n: i64| {
                c.total += n;
                c.total
            });
            methods.register("Total", |c: &mut Counter| c.total);
            methods.register("reset", |c: &mut Counter| {
                c.total = 0;
            });
        }
    }

    #[test]
    fn test_declared_signature() {
        let table = Counter::method_table();
        let def = table.resolve("Add").unwrap();
        assert_eq!(def.params(), &[TypeDesc::INT][..]);
        assert_eq!(def.results(), &[TypeDesc::INT][..]);
    }

    #[test]
    fn test_trampoline_call() {
        let table = Counter::method_table();
        let mut counter = Counter { total: 2 };
        let def = table.resolve("Add").unwrap();
        let results = def.call(&mut counter, vec![Arg::Int(5)]).unwrap();
        assert_eq!(results, vec![Value::Number(7.0)]);
        assert_eq!(counter.total, 7);
    }

    #[test]
    fn test_lowercase_names_hidden() {
        let table = Counter::method_table();
        assert!(table.resolve("reset").is_none());
        assert_eq!(table.len(), 3);
        assert_eq!(table.exposed_len(), 2);
        assert!(table.iter_exposed().all(|def| def.name() != "reset"));
    }

    #[test]
    fn test_resolution_is_case_sensitive() {
        let table = Counter::method_table();
        assert!(table.resolve("add").is_none());
        assert!(table.resolve("ADD").is_none());
        assert!(table.resolve("Add").is_some());
    }

    #[test]
    fn test_duplicate_registration_replaces() {
        let mut methods = Methods::<Counter>::new();
        methods.register("Value", |c: &mut Counter| c.total);
        methods.register("Value", |c: &mut Counter| c.total * 2);
        let table = methods.into_table();
        assert_eq!(table.exposed_len(), 1);

        let mut counter = Counter { total: 4 };
        let results = table
            .resolve("Value")
            .unwrap()
            .call(&mut counter, Vec::new())
            .unwrap();
        assert_eq!(results, vec![Value::Number(8.0)]);
    }

    #[test]
    fn test_trampoline_arity_guard() {
        let table = Counter::method_table();
        let mut counter = Counter { total: 0 };
        let err = table
            .resolve("Add")
            .unwrap()
            .call(&mut counter, Vec::new())
            .unwrap_err();
        assert!(matches!(err, BridgeError::ArityMismatch { expected: 1, got: 0 }));
    }
}
