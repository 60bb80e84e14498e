//! Process-wide handle registry
//!
//! Maps opaque `i64` handles to owned managed objects. Handles are
//! assigned monotonically starting at 1 and never reused within a process.
//! The table lock is held only for register/resolve/release, never across
//! an invocation, so unrelated objects' calls never contend.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::method::{Expose, MethodTable};
use crate::{BridgeError, BridgeResult};

/// Opaque object handle, unique for the lifetime of the process.
pub type Handle = i64;

/// A registered object with its method table.
///
/// The registry exclusively owns the object; callers hold only the handle.
/// The object sits behind its own mutex, locked for the duration of that
/// object's calls only. An object's own teardown is its `Drop` impl,
/// which runs when `release` removes the last reference.
pub struct ManagedObject {
    type_name: &'static str,
    table: MethodTable,
    cell: Mutex<Box<dyn Any + Send>>,
}

impl std::fmt::Debug for ManagedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedObject")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

impl ManagedObject {
    /// Get the Rust type name of the underlying object
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Get the object's method table
    pub fn table(&self) -> &MethodTable {
        &self.table
    }

    pub(crate) fn cell(&self) -> &Mutex<Box<dyn Any + Send>> {
        &self.cell
    }
}

struct State {
    next: Handle,
    objects: FxHashMap<Handle, Arc<ManagedObject>>,
}

/// Process-wide table of managed objects.
pub struct Registry {
    inner: Mutex<State>,
}

impl Registry {
    /// Create an empty registry; the first handle assigned is 1
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(State {
                next: 1,
                objects: FxHashMap::default(),
            }),
        }
    }

    /// Register an object and return its handle. Never fails.
    pub fn register<T: Expose>(&self, object: T) -> Handle {
        let type_name = std::any::type_name::<T>();
        // Build the table outside the lock; the lock covers the table only
        let managed = Arc::new(ManagedObject {
            type_name,
            table: T::method_table(),
            cell: Mutex::new(Box::new(object)),
        });

        let handle = {
            let mut state = self.inner.lock();
            let handle = state.next;
            state.next += 1;
            state.objects.insert(handle, managed);
            handle
        };
        tracing::debug!(handle, ty = type_name, "registered object");
        handle
    }

    /// Look up a handle without removing it
    pub fn resolve(&self, handle: Handle) -> BridgeResult<Arc<ManagedObject>> {
        self.inner
            .lock()
            .objects
            .get(&handle)
            .cloned()
            .ok_or(BridgeError::HandleNotFound(handle))
    }

    /// Remove a handle's entry, dropping the object.
    ///
    /// Idempotent: releasing an unknown or already-released handle is a
    /// no-op, which keeps cleanup-on-failure paths simple for the caller.
    pub fn release(&self, handle: Handle) {
        let removed = self.inner.lock().objects.remove(&handle);
        if removed.is_some() {
            tracing::debug!(handle, "released object");
        }
    }

    /// Count live objects
    pub fn len(&self) -> usize {
        self.inner.lock().objects.len()
    }

    /// Check if no objects are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
