//! C-ABI wrapper around `wifi-http-core`.
//!
//! # Overview
//! This is the native half of the HttpOverWifi plugin bridge. The host
//! passes the action name and the JSON argument array; the call blocks for
//! the whole exchange and returns an `FfiPluginResult` telling the host
//! which callback to fire and with what payload.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Calls block on network I/O; the host must not invoke them from its UI
//!   thread.
//! - The C caller owns all returned pointers and must call the matching
//!   `wifi_http_free_*` function to release them.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::catch_unwind;

use wifi_http_core::{BridgeError, HttpOverWifiPlugin, REQUEST_ACTION};

use types::*;

/// Borrow a C string as UTF-8, mapping failure to `BridgeError::Encoding`.
fn read_str<'a>(ptr: *const c_char) -> Result<&'a str, BridgeError> {
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|e| BridgeError::Encoding(e.to_string()))
}

// ---------------------------------------------------------------------------
// Bridge entry points
// ---------------------------------------------------------------------------

/// Run a plugin action with its JSON argument array.
///
/// Returns a result with `error_code = UnknownAction` for actions other
/// than `request`. Never returns null.
/// The caller must free the returned pointer with `wifi_http_free_result`.
#[unsafe(no_mangle)]
pub extern "C" fn wifi_http_exec(
    action: *const c_char,
    args_json: *const c_char,
) -> *mut FfiPluginResult {
    catch_unwind(|| {
        if action.is_null() {
            return FfiPluginResult::null_arg("action");
        }
        if args_json.is_null() {
            return FfiPluginResult::null_arg("args_json");
        }
        let action = match read_str(action) {
            Ok(a) => a,
            Err(e) => return FfiPluginResult::from_error(e),
        };
        if action != REQUEST_ACTION {
            return FfiPluginResult::unknown_action(action);
        }
        let args = match read_str(args_json) {
            Ok(a) => a,
            Err(e) => return FfiPluginResult::from_error(e),
        };
        let args: serde_json::Value = match serde_json::from_str(args) {
            Ok(v) => v,
            Err(e) => return FfiPluginResult::from_error(BridgeError::InvalidOptions(e.to_string())),
        };

        tracing::debug!(action, "dispatching");
        match HttpOverWifiPlugin::system().dispatch(action, &args) {
            Some(result) => FfiPluginResult::from_result(&result),
            None => FfiPluginResult::unknown_action(action),
        }
    })
    .unwrap_or_else(|_| FfiPluginResult::panic("panic in wifi_http_exec"))
}

/// Perform one request from a JSON options object (the `request` action).
///
/// The caller must free the returned pointer with `wifi_http_free_result`.
#[unsafe(no_mangle)]
pub extern "C" fn wifi_http_request(options_json: *const c_char) -> *mut FfiPluginResult {
    catch_unwind(|| {
        let action = CString::new(REQUEST_ACTION).unwrap_or_default();
        wifi_http_exec(action.as_ptr(), options_json)
    })
    .unwrap_or_else(|_| FfiPluginResult::panic("panic in wifi_http_request"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiPluginResult` returned by `wifi_http_exec` or
/// `wifi_http_request`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn wifi_http_free_result(result: *mut FfiPluginResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        free_c_string(result.error_message);
        free_c_string(result.body);
        free_c_string(result.payload_json);
        if !result.headers.is_null() && result.headers_len > 0 {
            let headers = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    result.headers,
                    result.headers_len as usize,
                ))
            };
            for h in headers.iter() {
                free_c_string(h.key);
                free_c_string(h.value);
            }
        }
    });
}

fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn wifi_http_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| free_c_string(s));
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
