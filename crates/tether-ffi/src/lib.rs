//! C FFI bindings for the Tether invocation bridge
//!
//! This crate exposes the bridge to foreign callers. The API follows these
//! principles:
//! - ABI-stable (only C-compatible types cross the boundary)
//! - Handles are plain `i64` values, never pointers
//! - Every payload is UTF-8 JSON text; errors are `{"error": "<message>"}`
//! - Every string handed outward is owned by the caller until returned
//!   through [`tether_string_free`] — the bridge never assumes the far
//!   side garbage-collects
//! - No exported function terminates the process
//!
//! Object registration stays on the Rust side: the embedding host calls
//! [`register`] (or works with [`bridge`] directly) to seed objects, then
//! hands the returned handles across the boundary.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use once_cell::sync::Lazy;
use tether_core::{error_text, Bridge, Expose, Handle};

static BRIDGE: Lazy<Bridge> = Lazy::new(Bridge::default);

/// Access the process-wide bridge instance.
pub fn bridge() -> &'static Bridge {
    &BRIDGE
}

/// Register an object with the process-wide bridge and return its handle.
pub fn register<T: Expose>(object: T) -> Handle {
    BRIDGE.register(object)
}

/// Convert an outbound payload into a C string (caller must free)
fn into_c_string(payload: String) -> *mut c_char {
    match CString::new(payload) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn error_c_string(message: &str) -> *mut c_char {
    into_c_string(error_text(message))
}

/// Invoke a method on a registered object.
///
/// # Arguments
/// * `handle` - Object handle returned at registration
/// * `method` - Null-terminated method name (case-sensitive)
/// * `args_json` - Null-terminated JSON array of arguments; NULL or empty
///   means no arguments, a bare value is treated as a single argument
///
/// # Returns
/// * JSON array of results on success
/// * `{"error": "<message>"}` on failure
/// * The returned string must be freed with `tether_string_free()`
///
/// # Safety
/// - `method` must be NULL or a valid null-terminated string
/// - `args_json` must be NULL or a valid null-terminated string
///
/// # Example (C)
/// ```c
/// char* result = tether_invoke(handle, "Add", "[2,3]");
/// printf("%s\n", result);   // [5]
/// tether_string_free(result);
/// ```
#[no_mangle]
pub unsafe extern "C" fn tether_invoke(
    handle: i64,
    method: *const c_char,
    args_json: *const c_char,
) -> *mut c_char {
    if method.is_null() {
        return error_c_string("null method name");
    }
    let method = match CStr::from_ptr(method).to_str() {
        Ok(s) => s,
        Err(_) => return error_c_string("invalid UTF-8 in method name"),
    };

    // An absent argument list is a zero-length argument list
    let args = if args_json.is_null() {
        ""
    } else {
        match CStr::from_ptr(args_json).to_str() {
            Ok(s) => s,
            Err(_) => return error_c_string("invalid UTF-8 in argument text"),
        }
    };

    into_c_string(BRIDGE.invoke(handle, method, args))
}

/// List a registered object's exposed methods with their signatures.
///
/// # Arguments
/// * `handle` - Object handle returned at registration
///
/// # Returns
/// * `{"methods": [{"name", "parameters", "returns"}, ...], "count": N}`
/// * `{"error": "<message>"}` if the handle is unknown
/// * The returned string must be freed with `tether_string_free()`
///
/// # Safety
/// No pointer arguments; always safe to call.
#[no_mangle]
pub unsafe extern "C" fn tether_describe(handle: i64) -> *mut c_char {
    into_c_string(BRIDGE.describe_json(handle))
}

/// Summarize a registered object: type name and exposed method count.
///
/// # Arguments
/// * `handle` - Object handle returned at registration
///
/// # Returns
/// * `{"handle": H, "type": "...", "methods": N}`
/// * `{"error": "<message>"}` if the handle is unknown
/// * The returned string must be freed with `tether_string_free()`
///
/// # Safety
/// No pointer arguments; always safe to call.
#[no_mangle]
pub unsafe extern "C" fn tether_info(handle: i64) -> *mut c_char {
    into_c_string(BRIDGE.info_json(handle))
}

/// Release a registered object, dropping it and invalidating the handle.
///
/// # Arguments
/// * `handle` - Object handle returned at registration
///
/// # Safety
/// No pointer arguments; always safe to call. Idempotent: releasing an
/// unknown or already-released handle is a no-op.
#[no_mangle]
pub unsafe extern "C" fn tether_release(handle: i64) {
    BRIDGE.release(handle);
}

/// Free a string returned by this library.
///
/// # Arguments
/// * `s` - String returned by `tether_invoke`/`tether_describe`/
///   `tether_info` (may be NULL)
///
/// # Safety
/// - `s` must have been returned by this library
/// - `s` must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn tether_string_free(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    drop(CString::from_raw(s));
}

/// Get the bridge version string.
///
/// # Returns
/// * Null-terminated version string (e.g., "0.1.0")
///
/// # Safety
/// The returned string is static and must not be freed.
#[no_mangle]
pub unsafe extern "C" fn tether_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::Methods;

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
        }
    }

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let out = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        tether_string_free(ptr);
        out
    }

    #[test]
    fn test_invoke_through_c_surface() {
        unsafe {
            let handle = register(Counter { total: 0 });
            let result = take_string(tether_invoke(
                handle,
                b"Add\0".as_ptr() as *const c_char,
                b"[5]\0".as_ptr() as *const c_char,
            ));
            assert_eq!(result, "[5]");

            // NULL argument text means a zero-length argument list
            let result = take_string(tether_invoke(
                handle,
                b"Total\0".as_ptr() as *const c_char,
                ptr::null(),
            ));
            assert_eq!(result, "[5]");

            tether_release(handle);
        }
    }

    #[test]
    fn test_null_method_name() {
        unsafe {
            let result = take_string(tether_invoke(1, ptr::null(), ptr::null()));
            assert_eq!(result, r#"{"error":"null method name"}"#);
        }
    }

    #[test]
    fn test_unknown_handle_payload() {
        unsafe {
            let result = take_string(tether_invoke(
                987_654_321,
                b"Add\0".as_ptr() as *const c_char,
                b"[1]\0".as_ptr() as *const c_char,
            ));
            assert_eq!(result, r#"{"error":"unknown handle 987654321"}"#);
        }
    }

    #[test]
    fn test_describe_and_info() {
        unsafe {
            let handle = register(Counter { total: 0 });

            let description = take_string(tether_describe(handle));
            assert!(description.contains("\"count\":2"));
            assert!(description.contains("\"Add\""));

            let info = take_string(tether_info(handle));
            assert!(info.contains("Counter"));
            assert!(info.contains("\"methods\":2"));

            tether_release(handle);
        }
    }

    #[test]
    fn test_release_is_idempotent_through_c() {
        unsafe {
            let handle = register(Counter { total: 0 });
            tether_release(handle);
            tether_release(handle);

            let result = take_string(tether_invoke(
                handle,
                b"Total\0".as_ptr() as *const c_char,
                ptr::null(),
            ));
            assert!(result.contains("unknown handle"));
        }
    }

    #[test]
    fn test_string_free_accepts_null() {
        unsafe {
            tether_string_free(ptr::null_mut());
        }
    }

    #[test]
    fn test_version() {
        unsafe {
            let version = tether_version();
            assert!(!version.is_null());
            let version = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version.is_empty());
        }
    }
}
