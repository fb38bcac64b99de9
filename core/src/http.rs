//! Request and response types for a single WiFi-bound exchange.
//!
//! # Design
//! `RequestDescriptor` is built once per call by `options::parse_args` and
//! never mutated. `RequestOutcome` tags the same `ResponsePayload` with the
//! channel it must be reported on, so payload construction happens in one
//! place regardless of whether the transport faulted.

use std::fmt;
use std::time::Duration;

use serde_json::{json, Map, Value};
use url::Url;

/// Default connect/read timeout when the caller gives none.
pub const DEFAULT_TIMEOUT_MS: u32 = 10_000;

/// HTTP method accepted by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Trace,
}

impl HttpMethod {
    /// Parse a method token. Matching is case-sensitive, as on the wire.
    pub fn parse(token: &str) -> Option<Self> {
        let method = match token {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "DELETE" => HttpMethod::Delete,
            "HEAD" => HttpMethod::Head,
            "OPTIONS" => HttpMethod::Options,
            "PATCH" => HttpMethod::Patch,
            "TRACE" => HttpMethod::Trace,
            _ => return None,
        };
        Some(method)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validated request, ready to execute.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub timeout_ms: u32,
}

impl RequestDescriptor {
    /// Timeout applied to both connect and read. Zero means no limit.
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(u64::from(ms))),
        }
    }
}

/// Status, headers and body collected from one exchange.
///
/// `status` is -1 when no status line could be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePayload {
    pub status: i32,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ResponsePayload {
    /// The payload for an exchange that never produced a response.
    pub fn unreachable() -> Self {
        Self {
            status: -1,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Bridge shape: `{ "status": int, "data": string, "headers": {..} }`.
    pub fn to_json(&self) -> Value {
        let headers: Map<String, Value> = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        json!({
            "status": self.status,
            "data": self.body,
            "headers": headers,
        })
    }
}

/// Result of `Executor::execute`. Both arms carry the same payload; the
/// arm only says whether a transport fault occurred along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Success(ResponsePayload),
    Failure(ResponsePayload),
}

impl RequestOutcome {
    pub fn new(payload: ResponsePayload, transport_ok: bool) -> Self {
        if transport_ok {
            RequestOutcome::Success(payload)
        } else {
            RequestOutcome::Failure(payload)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RequestOutcome::Success(_))
    }

    pub fn payload(&self) -> &ResponsePayload {
        match self {
            RequestOutcome::Success(p) | RequestOutcome::Failure(p) => p,
        }
    }
}

/// Fold raw response header entries into one value per name.
///
/// Entries without a name (a status line reported as a header) are dropped.
/// Names are grouped case-insensitively, keeping the first spelling seen;
/// values are joined with "," in the order they arrived.
pub fn fold_headers<I>(raw: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (Option<String>, String)>,
{
    let mut folded: Vec<(String, String)> = Vec::new();
    for (name, value) in raw {
        let Some(name) = name else { continue };
        match folded.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some((_, joined)) => {
                joined.push(',');
                joined.push_str(&value);
            }
            None => folded.push((name, value)),
        }
    }
    folded
}
