//! Interface-bound request executor.
//!
//! # Design
//! `execute` runs one linear exchange: select strategy, open, configure,
//! write body, connect, read status/headers/body, release. Failures before
//! the connection is usable are terminal `BridgeError`s. Faults from
//! connect onwards only downgrade the outcome to `Failure`, so the caller
//! still gets whatever status, headers and body could be collected.

use std::io::{Read, Write};

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::blocking::ReqwestTransport;
use crate::error::BridgeError;
use crate::http::{fold_headers, RequestDescriptor, RequestOutcome, ResponsePayload};
use crate::network::{select_strategy, NetworkProvider, SysfsNetworkProvider};
use crate::options::parse_args;
use crate::transport::{Connection, ConnectionGuard, StreamGuard, Transport};

/// Executes requests over the interface chosen by `P` using transport `T`.
///
/// Holds no per-request state; one executor may serve concurrent callers
/// when `P` and `T` are `Sync`.
#[derive(Debug, Clone)]
pub struct Executor<P, T> {
    provider: P,
    transport: T,
}

impl Executor<SysfsNetworkProvider, ReqwestTransport> {
    /// Executor backed by the OS interface table and reqwest.
    pub fn system() -> Self {
        Self::new(SysfsNetworkProvider::default(), ReqwestTransport)
    }
}

impl<P: NetworkProvider, T: Transport> Executor<P, T> {
    pub fn new(provider: P, transport: T) -> Self {
        Self {
            provider,
            transport,
        }
    }

    /// Parse bridge arguments and execute the request they describe.
    pub fn request(&self, args: &Value) -> Result<RequestOutcome, BridgeError> {
        let descriptor = parse_args(args)?;
        self.execute(&descriptor)
    }

    pub fn execute(&self, request: &RequestDescriptor) -> Result<RequestOutcome, BridgeError> {
        trace!(method = %request.method, url = %request.url, "entering request");
        let strategy = select_strategy(&self.provider)?;

        trace!(?strategy, "creating request");
        let conn = self
            .transport
            .open(&request.url, &strategy)
            .map_err(|e| BridgeError::Connection(e.to_string()))?;
        let mut conn = ConnectionGuard::new(conn);

        conn.set_method(request.method)
            .map_err(|e| BridgeError::UnsupportedMethod(format!("{}, {e}", request.method)))?;
        for (name, value) in &request.headers {
            conn.set_header(name, value);
        }
        conn.set_timeout(request.timeout());

        if !request.body.is_empty() {
            write_body(&mut *conn, request.body.as_bytes())?;
        }

        let mut transport_ok = true;

        trace!("connecting");
        if let Err(e) = conn.connect() {
            debug!(error = %e, "connect failed");
            transport_ok = false;
        }

        let status = match conn.status() {
            Ok(status) => i32::from(status),
            Err(e) => {
                debug!(error = %e, "no response status");
                transport_ok = false;
                -1
            }
        };

        let headers = fold_headers(conn.headers());
        let body = read_body(&mut *conn, &mut transport_ok)?;
        drop(conn);

        if !transport_ok {
            warn!(url = %request.url, status, "request finished with a transport failure");
        }
        trace!("exiting request");
        Ok(RequestOutcome::new(
            ResponsePayload {
                status,
                headers,
                body,
            },
            transport_ok,
        ))
    }
}

fn write_body<C: Connection>(conn: &mut C, bytes: &[u8]) -> Result<(), BridgeError> {
    let stream = conn
        .request_body(bytes.len())
        .map_err(|e| BridgeError::RequestBody(format!("could not get request output stream, {e}")))?;
    let mut stream = StreamGuard::new(stream);
    stream
        .write_all(bytes)
        .map_err(|e| BridgeError::RequestBody(e.to_string()))?;
    stream
        .finish()
        .map_err(|e| BridgeError::Cleanup(format!("request body, {e}")))
}

/// Read the primary body, or the error body when the primary one is not
/// available. A close failure is terminal even if the read succeeded.
fn read_body<C: Connection>(conn: &mut C, transport_ok: &mut bool) -> Result<String, BridgeError> {
    let stream = match conn.response_body() {
        Ok(stream) => Some(stream),
        Err(e) => {
            debug!(error = %e, "falling back to error stream");
            *transport_ok = false;
            conn.error_body()
        }
    };
    let Some(stream) = stream else {
        return Ok(String::new());
    };

    let mut stream = StreamGuard::new(stream);
    let mut bytes = Vec::new();
    if let Err(e) = stream.read_to_end(&mut bytes) {
        debug!(error = %e, read = bytes.len(), "response body read failed");
        *transport_ok = false;
    }
    stream
        .finish()
        .map_err(|e| BridgeError::Cleanup(format!("response body, {e}")))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::io::{self, Cursor};
    use std::rc::Rc;
    use std::time::Duration;

    use serde_json::json;
    use url::Url;

    use crate::http::HttpMethod;
    use crate::network::{ConnectionStrategy, InterfaceKind, NetworkInterface};
    use crate::transport::{Close, ReadStream, WriteStream};

    // -----------------------------------------------------------------------
    // Fakes
    // -----------------------------------------------------------------------

    struct FakeNetworks {
        binding: bool,
        interfaces: Vec<NetworkInterface>,
        queries: Cell<usize>,
    }

    impl NetworkProvider for FakeNetworks {
        fn supports_binding(&self) -> bool {
            self.binding
        }

        fn active_interfaces(&self) -> io::Result<Vec<NetworkInterface>> {
            self.queries.set(self.queries.get() + 1);
            Ok(self.interfaces.clone())
        }
    }

    fn wlan0() -> NetworkInterface {
        NetworkInterface {
            name: "wlan0".to_string(),
            index: 30,
            kind: InterfaceKind::Wifi,
        }
    }

    fn with_wifi() -> FakeNetworks {
        FakeNetworks {
            binding: true,
            interfaces: vec![
                NetworkInterface {
                    name: "rmnet0".to_string(),
                    index: 12,
                    kind: InterfaceKind::Cellular,
                },
                wlan0(),
            ],
            queries: Cell::new(0),
        }
    }

    #[derive(Clone, Default)]
    struct Script {
        open_fails: bool,
        method_fails: bool,
        write_fails: bool,
        request_close_fails: bool,
        connect_fails: bool,
        status: Option<u16>,
        headers: Vec<(Option<String>, String)>,
        body: Option<&'static str>,
        error_body: Option<&'static str>,
        read_fails: bool,
        response_close_fails: bool,
    }

    impl Script {
        fn ok(status: u16, body: &'static str) -> Self {
            Self {
                status: Some(status),
                body: Some(body),
                ..Self::default()
            }
        }
    }

    #[derive(Default)]
    struct Log {
        opens: usize,
        disconnects: usize,
        connects: usize,
        strategy: Option<ConnectionStrategy>,
        method: Option<HttpMethod>,
        headers: Vec<(String, String)>,
        timeout: Option<Option<Duration>>,
        declared: Option<usize>,
        written: Vec<u8>,
    }

    struct FakeTransport {
        script: Script,
        log: Rc<RefCell<Log>>,
    }

    impl FakeTransport {
        fn new(script: Script) -> (Self, Rc<RefCell<Log>>) {
            let log = Rc::new(RefCell::new(Log::default()));
            (
                Self {
                    script,
                    log: log.clone(),
                },
                log,
            )
        }
    }

    impl Transport for FakeTransport {
        type Conn = FakeConnection;

        fn open(&self, _url: &Url, strategy: &ConnectionStrategy) -> io::Result<FakeConnection> {
            if self.script.open_fails {
                return Err(io::Error::other("socket exhausted"));
            }
            let mut log = self.log.borrow_mut();
            log.opens += 1;
            log.strategy = Some(strategy.clone());
            Ok(FakeConnection {
                script: self.script.clone(),
                log: self.log.clone(),
                connected: false,
            })
        }
    }

    struct FakeConnection {
        script: Script,
        log: Rc<RefCell<Log>>,
        connected: bool,
    }

    impl Connection for FakeConnection {
        fn set_method(&mut self, method: HttpMethod) -> io::Result<()> {
            if self.script.method_fails {
                return Err(io::Error::other("invalid method"));
            }
            self.log.borrow_mut().method = Some(method);
            Ok(())
        }

        fn set_header(&mut self, name: &str, value: &str) {
            self.log
                .borrow_mut()
                .headers
                .push((name.to_string(), value.to_string()));
        }

        fn set_timeout(&mut self, timeout: Option<Duration>) {
            self.log.borrow_mut().timeout = Some(timeout);
        }

        fn request_body(&mut self, len: usize) -> io::Result<Box<dyn WriteStream + '_>> {
            self.log.borrow_mut().declared = Some(len);
            Ok(Box::new(FakeWriter {
                log: self.log.clone(),
                fails: self.script.write_fails,
                close_fails: self.script.request_close_fails,
            }))
        }

        fn connect(&mut self) -> io::Result<()> {
            self.log.borrow_mut().connects += 1;
            if self.script.connect_fails {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
            }
            self.connected = true;
            Ok(())
        }

        fn status(&mut self) -> io::Result<u16> {
            match (self.connected, self.script.status) {
                (true, Some(status)) => Ok(status),
                _ => Err(io::Error::new(io::ErrorKind::NotConnected, "no status")),
            }
        }

        fn headers(&self) -> Vec<(Option<String>, String)> {
            if self.connected {
                self.script.headers.clone()
            } else {
                Vec::new()
            }
        }

        fn response_body(&mut self) -> io::Result<Box<dyn ReadStream>> {
            match (self.connected, self.script.body) {
                (true, Some(body)) => Ok(Box::new(FakeReader {
                    data: Cursor::new(body.as_bytes().to_vec()),
                    fails: self.script.read_fails,
                    close_fails: self.script.response_close_fails,
                })),
                _ => Err(io::Error::other("no input stream")),
            }
        }

        fn error_body(&mut self) -> Option<Box<dyn ReadStream>> {
            self.script.error_body.map(|body| {
                Box::new(FakeReader {
                    data: Cursor::new(body.as_bytes().to_vec()),
                    fails: false,
                    close_fails: false,
                }) as Box<dyn ReadStream>
            })
        }

        fn disconnect(&mut self) {
            self.log.borrow_mut().disconnects += 1;
        }
    }

    struct FakeWriter {
        log: Rc<RefCell<Log>>,
        fails: bool,
        close_fails: bool,
    }

    impl Write for FakeWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fails {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
            }
            self.log.borrow_mut().written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Close for FakeWriter {
        fn close(&mut self) -> io::Result<()> {
            if self.close_fails {
                Err(io::Error::other("close failed"))
            } else {
                Ok(())
            }
        }
    }

    struct FakeReader {
        data: Cursor<Vec<u8>>,
        fails: bool,
        close_fails: bool,
    }

    impl Read for FakeReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 && self.fails {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
            }
            Ok(n)
        }
    }

    impl Close for FakeReader {
        fn close(&mut self) -> io::Result<()> {
            if self.close_fails {
                Err(io::Error::other("close failed"))
            } else {
                Ok(())
            }
        }
    }

    fn get(url: &str) -> RequestDescriptor {
        RequestDescriptor {
            method: HttpMethod::Get,
            url: Url::parse(url).unwrap(),
            headers: Vec::new(),
            body: String::new(),
            timeout_ms: 10_000,
        }
    }

    fn run(script: Script, request: &RequestDescriptor) -> (Result<RequestOutcome, BridgeError>, Rc<RefCell<Log>>) {
        let (transport, log) = FakeTransport::new(script);
        let executor = Executor::new(with_wifi(), transport);
        (executor.execute(request), log)
    }

    // -----------------------------------------------------------------------
    // Outcomes
    // -----------------------------------------------------------------------

    #[test]
    fn get_ok_reports_success() {
        let script = Script {
            headers: vec![
                (None, "HTTP/1.1 200 OK".to_string()),
                (Some("Set-Cookie".to_string()), "a".to_string()),
                (Some("Content-Type".to_string()), "text/plain".to_string()),
                (Some("Set-Cookie".to_string()), "b".to_string()),
            ],
            ..Script::ok(200, "hi")
        };
        let (result, log) = run(script, &get("http://example.test/ok"));
        let outcome = result.unwrap();
        assert!(outcome.is_success());
        let payload = outcome.payload();
        assert_eq!(payload.status, 200);
        assert_eq!(payload.body, "hi");
        assert_eq!(payload.header("Set-Cookie"), Some("a,b"));
        assert_eq!(payload.headers.len(), 2);

        let log = log.borrow();
        assert_eq!(log.opens, 1);
        assert_eq!(log.disconnects, 1);
        assert_eq!(log.strategy, Some(ConnectionStrategy::InterfaceBound(wlan0())));
        assert_eq!(log.declared, None);
    }

    #[test]
    fn post_writes_exact_body_with_declared_length() {
        let mut request = get("http://example.test/echo");
        request.method = HttpMethod::Post;
        request.body = "payload".to_string();
        request.headers = vec![("Content-Type".to_string(), "text/plain".to_string())];
        request.timeout_ms = 1500;

        let (result, log) = run(Script::ok(201, "payload"), &request);
        let outcome = result.unwrap();
        assert_eq!(outcome, RequestOutcome::Success(ResponsePayload {
            status: 201,
            headers: Vec::new(),
            body: "payload".to_string(),
        }));

        let log = log.borrow();
        assert_eq!(log.method, Some(HttpMethod::Post));
        assert_eq!(log.declared, Some(7));
        assert_eq!(log.written, b"payload");
        assert_eq!(log.headers, request.headers);
        assert_eq!(log.timeout, Some(Some(Duration::from_millis(1500))));
    }

    #[test]
    fn http_error_status_is_still_success() {
        let (result, _) = run(Script::ok(500, "boom"), &get("http://example.test/fail"));
        let outcome = result.unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.payload().status, 500);
        assert_eq!(outcome.payload().body, "boom");
    }

    #[test]
    fn connect_failure_yields_unreachable_failure() {
        let script = Script {
            connect_fails: true,
            ..Script::default()
        };
        let (result, log) = run(script, &get("http://example.test/ok"));
        assert_eq!(result.unwrap(), RequestOutcome::Failure(ResponsePayload::unreachable()));
        assert_eq!(log.borrow().disconnects, 1);
    }

    #[test]
    fn missing_primary_stream_falls_back_to_error_stream() {
        let script = Script {
            status: Some(404),
            error_body: Some("not here"),
            ..Script::default()
        };
        let (result, _) = run(script, &get("http://example.test/missing"));
        let outcome = result.unwrap();
        assert!(!outcome.is_success());
        assert_eq!(outcome.payload().status, 404);
        assert_eq!(outcome.payload().body, "not here");
    }

    #[test]
    fn body_read_fault_keeps_partial_body() {
        let script = Script {
            read_fails: true,
            ..Script::ok(200, "partial")
        };
        let (result, _) = run(script, &get("http://example.test/slow"));
        let outcome = result.unwrap();
        assert!(!outcome.is_success());
        assert_eq!(outcome.payload().status, 200);
        assert_eq!(outcome.payload().body, "partial");
    }

    #[test]
    fn non_ascii_body_is_decoded() {
        let script = Script {
            body: Some("caf\u{e9}"),
            ..Script::ok(200, "")
        };
        let (result, _) = run(script, &get("http://example.test/"));
        assert_eq!(result.unwrap().payload().body, "caf\u{e9}");
    }

    // -----------------------------------------------------------------------
    // Terminal errors
    // -----------------------------------------------------------------------

    #[test]
    fn response_close_error_overrides_success() {
        let script = Script {
            response_close_fails: true,
            ..Script::ok(200, "hi")
        };
        let (result, log) = run(script, &get("http://example.test/ok"));
        assert!(matches!(result, Err(BridgeError::Cleanup(_))));
        assert_eq!(log.borrow().disconnects, 1);
    }

    #[test]
    fn request_close_error_aborts_before_connect() {
        let mut request = get("http://example.test/echo");
        request.method = HttpMethod::Put;
        request.body = "x".to_string();
        let script = Script {
            request_close_fails: true,
            ..Script::ok(200, "")
        };
        let (result, log) = run(script, &request);
        assert!(matches!(result, Err(BridgeError::Cleanup(_))));
        let log = log.borrow();
        assert_eq!(log.connects, 0);
        assert_eq!(log.disconnects, 1);
    }

    #[test]
    fn body_write_error_is_terminal() {
        let mut request = get("http://example.test/echo");
        request.body = "x".to_string();
        let script = Script {
            write_fails: true,
            ..Script::ok(200, "")
        };
        let (result, log) = run(script, &request);
        assert!(matches!(result, Err(BridgeError::RequestBody(_))));
        assert_eq!(log.borrow().disconnects, 1);
    }

    #[test]
    fn rejected_method_is_terminal() {
        let script = Script {
            method_fails: true,
            ..Script::ok(200, "")
        };
        let (result, log) = run(script, &get("http://example.test/"));
        assert!(matches!(result, Err(BridgeError::UnsupportedMethod(_))));
        let log = log.borrow();
        assert_eq!(log.connects, 0);
        assert_eq!(log.disconnects, 1);
    }

    #[test]
    fn open_failure_is_a_connection_error() {
        let script = Script {
            open_fails: true,
            ..Script::default()
        };
        let (result, log) = run(script, &get("http://example.test/"));
        assert!(matches!(result, Err(BridgeError::Connection(_))));
        assert_eq!(log.borrow().disconnects, 0);
    }

    #[test]
    fn no_wifi_never_opens_a_connection() {
        let (transport, log) = FakeTransport::new(Script::ok(200, ""));
        let networks = FakeNetworks {
            binding: true,
            interfaces: Vec::new(),
            queries: Cell::new(0),
        };
        let executor = Executor::new(networks, transport);
        let err = executor.execute(&get("http://example.test/")).unwrap_err();
        assert!(matches!(err, BridgeError::InterfaceUnavailable));
        assert_eq!(log.borrow().opens, 0);
    }

    #[test]
    fn without_binding_support_default_route_is_used() {
        let (transport, log) = FakeTransport::new(Script::ok(200, "ok"));
        let networks = FakeNetworks {
            binding: false,
            interfaces: Vec::new(),
            queries: Cell::new(0),
        };
        let executor = Executor::new(networks, transport);
        assert!(executor.execute(&get("http://example.test/")).unwrap().is_success());
        assert_eq!(log.borrow().strategy, Some(ConnectionStrategy::Default));
    }

    #[test]
    fn malformed_url_fails_before_interface_selection() {
        let (transport, log) = FakeTransport::new(Script::ok(200, ""));
        let executor = Executor::new(with_wifi(), transport);
        let err = executor
            .request(&json!([{"method": "GET", "url": "::not a url::"}]))
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidUrl(_)));
        assert_eq!(executor.provider.queries.get(), 0);
        assert_eq!(log.borrow().opens, 0);
    }
}
