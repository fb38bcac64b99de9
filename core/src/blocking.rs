//! Production transport on `reqwest::blocking`.
//!
//! The connection buffers its configuration until `connect`, then builds a
//! single-use client (bound to the selected interface when the strategy
//! asks for it) and sends the request. Nothing is pooled across calls.

use std::io::{self, Read, Write};
use std::time::Duration;

use reqwest::blocking::{Client, ClientBuilder, Response};
use reqwest::Method;
use tracing::{debug, trace};
use url::Url;

use crate::http::{HttpMethod, DEFAULT_TIMEOUT_MS};
use crate::network::ConnectionStrategy;
use crate::transport::{Close, Connection, ReadStream, Transport, WriteStream};

const BINDING_SUPPORTED: bool = cfg!(any(
    target_os = "android",
    target_os = "fuchsia",
    target_os = "linux"
));

/// Opens `ReqwestConnection`s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestTransport;

impl Transport for ReqwestTransport {
    type Conn = ReqwestConnection;

    fn open(&self, url: &Url, strategy: &ConnectionStrategy) -> io::Result<ReqwestConnection> {
        let interface = match strategy {
            ConnectionStrategy::InterfaceBound(iface) if !BINDING_SUPPORTED => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("cannot bind to {} on this platform", iface.name),
                ));
            }
            ConnectionStrategy::InterfaceBound(iface) => Some(iface.name.clone()),
            ConnectionStrategy::Default => None,
        };
        if !matches!(url.scheme(), "http" | "https") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported protocol: {}", url.scheme()),
            ));
        }
        Ok(ReqwestConnection {
            url: url.clone(),
            interface,
            method: Method::GET,
            headers: Vec::new(),
            timeout: Some(Duration::from_millis(u64::from(DEFAULT_TIMEOUT_MS))),
            body: None,
            state: State::Idle,
        })
    }
}

enum State {
    Idle,
    Connected {
        status: u16,
        headers: Vec<(Option<String>, String)>,
        response: Option<Response>,
    },
    Failed(String),
    Closed,
}

/// A single request/response exchange over reqwest.
pub struct ReqwestConnection {
    url: Url,
    interface: Option<String>,
    method: Method,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
    body: Option<Vec<u8>>,
    state: State,
}

impl ReqwestConnection {
    fn client(&self) -> reqwest::Result<Client> {
        let mut builder = Client::builder().timeout(self.timeout);
        if let Some(timeout) = self.timeout {
            builder = builder.connect_timeout(timeout);
        }
        bind_interface(builder, self.interface.as_deref()).build()
    }

    fn not_connected(&self) -> io::Error {
        match &self.state {
            State::Failed(msg) => io::Error::new(io::ErrorKind::NotConnected, msg.clone()),
            State::Closed => io::Error::new(io::ErrorKind::NotConnected, "connection closed"),
            _ => io::Error::new(io::ErrorKind::NotConnected, "no response available"),
        }
    }
}

#[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
fn bind_interface(builder: ClientBuilder, interface: Option<&str>) -> ClientBuilder {
    match interface {
        Some(name) => builder.interface(name),
        None => builder,
    }
}

#[cfg(not(any(target_os = "android", target_os = "fuchsia", target_os = "linux")))]
fn bind_interface(builder: ClientBuilder, _interface: Option<&str>) -> ClientBuilder {
    builder
}

/// Restore the conventional spelling of a header name (`set-cookie` to
/// `Set-Cookie`). hyper lowercases names on receipt, so the wire case is
/// not available.
fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
        upper = c == '-';
    }
    out
}

fn to_reqwest(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Options => Method::OPTIONS,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Trace => Method::TRACE,
    }
}

impl Connection for ReqwestConnection {
    fn set_method(&mut self, method: HttpMethod) -> io::Result<()> {
        if !matches!(self.state, State::Idle) {
            return Err(io::Error::other("method set after connection was opened"));
        }
        self.method = to_reqwest(method);
        Ok(())
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    fn request_body(&mut self, len: usize) -> io::Result<Box<dyn WriteStream + '_>> {
        if !matches!(self.state, State::Idle) {
            return Err(io::Error::other("request body opened after connection was opened"));
        }
        let buf = self.body.insert(Vec::with_capacity(len));
        Ok(Box::new(FixedLengthBody { buf, declared: len }))
    }

    fn connect(&mut self) -> io::Result<()> {
        if !matches!(self.state, State::Idle) {
            return Ok(());
        }
        trace!(url = %self.url, interface = ?self.interface, "sending request");
        let client = self.client().map_err(io::Error::other)?;
        let mut request = client.request(self.method.clone(), self.url.clone());
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = self.body.take() {
            request = request.body(body);
        }
        match request.send() {
            Ok(response) => {
                let headers = response
                    .headers()
                    .iter()
                    .map(|(name, value)| {
                        (
                            Some(title_case(name.as_str())),
                            String::from_utf8_lossy(value.as_bytes()).into_owned(),
                        )
                    })
                    .collect();
                self.state = State::Connected {
                    status: response.status().as_u16(),
                    headers,
                    response: Some(response),
                };
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "request failed");
                self.state = State::Failed(e.to_string());
                Err(io::Error::other(e))
            }
        }
    }

    fn status(&mut self) -> io::Result<u16> {
        match &self.state {
            State::Connected { status, .. } => Ok(*status),
            _ => Err(self.not_connected()),
        }
    }

    fn headers(&self) -> Vec<(Option<String>, String)> {
        match &self.state {
            State::Connected { headers, .. } => headers.clone(),
            _ => Vec::new(),
        }
    }

    fn response_body(&mut self) -> io::Result<Box<dyn ReadStream>> {
        if let State::Connected { response, .. } = &mut self.state {
            if let Some(response) = response.take() {
                return Ok(Box::new(ResponseBody { response }));
            }
        }
        Err(self.not_connected())
    }

    fn error_body(&mut self) -> Option<Box<dyn ReadStream>> {
        // reqwest delivers error bodies on the primary stream.
        None
    }

    fn disconnect(&mut self) {
        self.body = None;
        self.state = State::Closed;
    }
}

/// Request body buffer with a declared length.
struct FixedLengthBody<'a> {
    buf: &'a mut Vec<u8>,
    declared: usize,
}

impl Write for FixedLengthBody<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.len() + data.len() > self.declared {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("too many bytes written, expected {}", self.declared),
            ));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for FixedLengthBody<'_> {
    fn close(&mut self) -> io::Result<()> {
        if self.buf.len() != self.declared {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "insufficient data written, {} of {} bytes",
                    self.buf.len(),
                    self.declared
                ),
            ));
        }
        Ok(())
    }
}

struct ResponseBody {
    response: Response,
}

impl Read for ResponseBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.response.read(buf)
    }
}

impl Close for ResponseBody {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}
