//! Error types for the WiFi-bound request bridge.
//!
//! # Design
//! `BridgeError` covers only the terminal failures that are reported to the
//! caller as a plain message. Transport faults during connect, status read
//! or body read never appear here: they are absorbed into a
//! `RequestOutcome::Failure` that still carries a structured payload.

use std::fmt;

/// Terminal errors raised before or around the HTTP exchange.
#[derive(Debug)]
pub enum BridgeError {
    /// The argument payload was not an options object, or a field had the
    /// wrong shape.
    InvalidOptions(String),

    /// `url` was missing, not absolute, or not http/https.
    InvalidUrl(String),

    /// The method is not one the transport accepts.
    UnsupportedMethod(String),

    /// An input string was not valid UTF-8.
    Encoding(String),

    /// Enumerating the OS network interfaces failed.
    NetworkQuery(String),

    /// No active WiFi interface was found to bind to.
    InterfaceUnavailable,

    /// The connection object could not be created.
    Connection(String),

    /// Writing the request body failed.
    RequestBody(String),

    /// Closing a request or response stream failed.
    Cleanup(String),
}

/// Coarse classification of `BridgeError`, used by the C bridge for error
/// codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Argument,
    Encoding,
    InterfaceUnavailable,
    Connection,
    Cleanup,
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::InvalidOptions(_)
            | BridgeError::InvalidUrl(_)
            | BridgeError::UnsupportedMethod(_) => ErrorKind::Argument,
            BridgeError::Encoding(_) => ErrorKind::Encoding,
            BridgeError::NetworkQuery(_) | BridgeError::InterfaceUnavailable => {
                ErrorKind::InterfaceUnavailable
            }
            BridgeError::Connection(_) | BridgeError::RequestBody(_) => ErrorKind::Connection,
            BridgeError::Cleanup(_) => ErrorKind::Cleanup,
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::InvalidOptions(msg) => write!(f, "Invalid options passed, {msg}"),
            BridgeError::InvalidUrl(msg) => write!(f, "Invalid url passed, {msg}"),
            BridgeError::UnsupportedMethod(method) => {
                write!(f, "Method was not supported, {method}")
            }
            BridgeError::Encoding(msg) => write!(f, "Input was not valid UTF-8, {msg}"),
            BridgeError::NetworkQuery(msg) => {
                write!(f, "Could not enumerate network interfaces, {msg}")
            }
            BridgeError::InterfaceUnavailable => write!(f, "Could not find WiFi network to bind to"),
            BridgeError::Connection(msg) => write!(f, "Could not open connection, {msg}"),
            BridgeError::RequestBody(msg) => {
                write!(f, "Got error when writing request body, {msg}")
            }
            BridgeError::Cleanup(msg) => write!(f, "Got error when closing stream, {msg}"),
        }
    }
}

impl std::error::Error for BridgeError {}
