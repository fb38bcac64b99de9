//! Bridge argument parsing.
//!
//! Turns the JSON argument array handed over by the plugin bridge into a
//! `RequestDescriptor`. Everything here runs before any network action, so
//! a failure never touches interface enumeration or the transport.

use reqwest::header::{HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::BridgeError;
use crate::http::{HttpMethod, RequestDescriptor, DEFAULT_TIMEOUT_MS};

#[derive(Debug, Deserialize)]
struct RequestOptions {
    method: String,
    url: String,
    #[serde(default)]
    headers: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    timeout: Option<Value>,
}

/// Parse the raw JSON text of a bridge argument array.
pub fn parse_args_json(text: &str) -> Result<RequestDescriptor, BridgeError> {
    let args: Value =
        serde_json::from_str(text).map_err(|e| BridgeError::InvalidOptions(e.to_string()))?;
    parse_args(&args)
}

/// Parse a bridge argument array (`[options]`) or a bare options object.
pub fn parse_args(args: &Value) -> Result<RequestDescriptor, BridgeError> {
    let options = match args {
        Value::Array(items) => items
            .first()
            .ok_or_else(|| BridgeError::InvalidOptions("missing options object".to_string()))?,
        other => other,
    };
    if !options.is_object() {
        return Err(BridgeError::InvalidOptions(
            "options must be an object".to_string(),
        ));
    }

    let raw: RequestOptions = serde_json::from_value(options.clone())
        .map_err(|e| BridgeError::InvalidOptions(e.to_string()))?;

    let method =
        HttpMethod::parse(&raw.method).ok_or_else(|| BridgeError::UnsupportedMethod(raw.method.clone()))?;
    let url = parse_url(&raw.url)?;
    let headers = parse_headers(raw.headers)?;
    let body = match raw.data {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    };
    let timeout_ms = raw.timeout.as_ref().and_then(coerce_timeout).unwrap_or(DEFAULT_TIMEOUT_MS);

    Ok(RequestDescriptor {
        method,
        url,
        headers,
        body,
        timeout_ms,
    })
}

fn parse_url(raw: &str) -> Result<Url, BridgeError> {
    let url = Url::parse(raw).map_err(|e| BridgeError::InvalidUrl(format!("{e}: {raw}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(BridgeError::InvalidUrl(format!("unknown protocol: {scheme}"))),
    }
}

fn parse_headers(raw: Option<Value>) -> Result<Vec<(String, String)>, BridgeError> {
    let map = match raw {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(BridgeError::InvalidOptions(
                "headers needs to be an object".to_string(),
            ))
        }
    };
    map.into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => {
                    return Err(BridgeError::InvalidOptions(format!(
                        "header {name} is not a string"
                    )))
                }
            };
            check_header(&name, &value)?;
            Ok((name, value))
        })
        .collect()
}

/// Reject names and values that could not be put on the wire, so they fail
/// as bad arguments instead of as a transport fault after interface binding.
fn check_header(name: &str, value: &str) -> Result<(), BridgeError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| BridgeError::InvalidOptions(format!("invalid header name {name:?}")))?;
    HeaderValue::from_str(value)
        .map_err(|_| BridgeError::InvalidOptions(format!("invalid value for header {name}")))?;
    Ok(())
}

/// Coerce a timeout option to milliseconds. Anything that is not a
/// non-negative number (or numeric string) falls back to the default.
fn coerce_timeout(value: &Value) -> Option<u32> {
    let ms = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !ms.is_finite() || ms < 0.0 {
        return None;
    }
    Some(ms.min(f64::from(u32::MAX)) as u32)
}
