//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! `FfiPluginResult` mirrors the bridge's two callbacks: `channel` says
//! which one fires and `payload_json` is the exact value to hand it (an
//! object for outcomes, a string for terminal errors). The structured
//! fields are provided alongside so C callers need not parse JSON.

use std::ffi::CString;
use std::os::raw::c_char;

use wifi_http_core::{BridgeError, ErrorKind, PluginResult, RequestOutcome};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Which bridge callback the result belongs on.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiChannel {
    Success = 0,
    Error = 1,
}

/// Error codes returned in `FfiPluginResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    /// The exchange hit a transport fault; the payload is still filled in.
    Transport = 1,
    Argument = 2,
    Encoding = 3,
    InterfaceUnavailable = 4,
    Connection = 5,
    Cleanup = 6,
    UnknownAction = 7,
    Panic = 8,
    NullArg = 9,
}

impl From<ErrorKind> for FfiErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Argument => FfiErrorCode::Argument,
            ErrorKind::Encoding => FfiErrorCode::Encoding,
            ErrorKind::InterfaceUnavailable => FfiErrorCode::InterfaceUnavailable,
            ErrorKind::Connection => FfiErrorCode::Connection,
            ErrorKind::Cleanup => FfiErrorCode::Cleanup,
        }
    }
}

/// A single response header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// Result envelope for every bridge call.
///
/// For outcomes (`error_code` `Ok` or `Transport`) `status`, `headers` and
/// `body` carry the response and `error_message` is null. For terminal
/// errors `error_message` is set, `status` is 0 and the response fields are
/// null. `payload_json` is always set.
#[repr(C)]
pub struct FfiPluginResult {
    pub channel: FfiChannel,
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub status: i32,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
    pub payload_json: *mut c_char,
}

/// Convert to a heap C string. Interior NUL bytes are dropped; the JSON
/// payload keeps them escaped.
pub(crate) fn to_c_string(s: String) -> *mut c_char {
    CString::new(s)
        .unwrap_or_else(|e| {
            let mut bytes = e.into_vec();
            bytes.retain(|&b| b != 0);
            CString::new(bytes).unwrap_or_default()
        })
        .into_raw()
}

impl FfiPluginResult {
    /// Build a result from the executor's output.
    pub(crate) fn from_result(result: &Result<RequestOutcome, BridgeError>) -> *mut Self {
        let payload_json = to_c_string(PluginResult::from(result).value().to_string());
        match result {
            Ok(outcome) => {
                let (channel, error_code) = if outcome.is_success() {
                    (FfiChannel::Success, FfiErrorCode::Ok)
                } else {
                    (FfiChannel::Error, FfiErrorCode::Transport)
                };
                let payload = outcome.payload();
                let headers_len = payload.headers.len() as u32;
                let headers = if payload.headers.is_empty() {
                    std::ptr::null_mut()
                } else {
                    let ffi_headers: Box<[FfiHeader]> = payload
                        .headers
                        .iter()
                        .map(|(k, v)| FfiHeader {
                            key: to_c_string(k.clone()),
                            value: to_c_string(v.clone()),
                        })
                        .collect();
                    Box::into_raw(ffi_headers) as *mut FfiHeader
                };
                Box::into_raw(Box::new(FfiPluginResult {
                    channel,
                    error_code,
                    error_message: std::ptr::null_mut(),
                    status: payload.status,
                    headers,
                    headers_len,
                    body: to_c_string(payload.body.clone()),
                    payload_json,
                }))
            }
            Err(e) => Self::error(FfiErrorCode::from(e.kind()), e.to_string(), payload_json),
        }
    }

    /// Build an error result for a `BridgeError` raised at the boundary.
    pub(crate) fn from_error(err: BridgeError) -> *mut Self {
        Self::from_result(&Err(err))
    }

    /// Build an error result for an action the plugin does not handle.
    pub(crate) fn unknown_action(action: &str) -> *mut Self {
        let msg = format!("unknown action: {action}");
        let payload_json = to_c_string(serde_json::Value::String(msg.clone()).to_string());
        Self::error(FfiErrorCode::UnknownAction, msg, payload_json)
    }

    /// Build an error result for a null argument.
    pub(crate) fn null_arg(name: &str) -> *mut Self {
        let msg = format!("null argument: {name}");
        let payload_json = to_c_string(serde_json::Value::String(msg.clone()).to_string());
        Self::error(FfiErrorCode::NullArg, msg, payload_json)
    }

    /// Build an error result for a caught panic.
    pub(crate) fn panic(msg: &str) -> *mut Self {
        let payload_json = to_c_string(serde_json::Value::String(msg.to_string()).to_string());
        Self::error(FfiErrorCode::Panic, msg.to_string(), payload_json)
    }

    fn error(error_code: FfiErrorCode, msg: String, payload_json: *mut c_char) -> *mut Self {
        Box::into_raw(Box::new(FfiPluginResult {
            channel: FfiChannel::Error,
            error_code,
            error_message: to_c_string(msg),
            status: 0,
            headers: std::ptr::null_mut(),
            headers_len: 0,
            body: std::ptr::null_mut(),
            payload_json,
        }))
    }
}
