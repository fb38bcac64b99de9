//! Transport abstraction for one interface-bound HTTP exchange.
//!
//! # Design
//! `Connection` exposes the exchange as discrete steps (configure, write
//! body, connect, read status/headers/body) so the executor can decide per
//! step whether a fault is terminal or only downgrades the outcome.
//! Resources are held by guards: `ConnectionGuard` disconnects exactly once
//! when dropped, and each `StreamGuard` closes exactly the stream it wraps.

use std::io::{self, Read, Write};
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use url::Url;

use crate::http::HttpMethod;
use crate::network::ConnectionStrategy;

/// A stream whose release can fail.
pub trait Close {
    fn close(&mut self) -> io::Result<()>;
}

/// Request body sink.
pub trait WriteStream: Write + Close {}

impl<T: Write + Close> WriteStream for T {}

/// Response body source.
pub trait ReadStream: Read + Close {}

impl<T: Read + Close> ReadStream for T {}

/// One HTTP exchange, configured step by step.
pub trait Connection {
    /// Fails when the transport does not support `method` or the exchange
    /// has already started.
    fn set_method(&mut self, method: HttpMethod) -> io::Result<()>;

    fn set_header(&mut self, name: &str, value: &str);

    /// Applies to both connection establishment and reads. `None` disables
    /// the limit.
    fn set_timeout(&mut self, timeout: Option<Duration>);

    /// Open the request body with a fixed declared length. The body is sent
    /// with that exact Content-Length, never chunked.
    fn request_body(&mut self, len: usize) -> io::Result<Box<dyn WriteStream + '_>>;

    /// Perform the network exchange up to the response head.
    fn connect(&mut self) -> io::Result<()>;

    fn status(&mut self) -> io::Result<u16>;

    /// Raw response header entries in arrival order. An entry without a
    /// name is allowed (some transports report the status line that way).
    fn headers(&self) -> Vec<(Option<String>, String)>;

    /// The primary response body.
    fn response_body(&mut self) -> io::Result<Box<dyn ReadStream>>;

    /// The body the transport keeps aside for error responses, if any.
    fn error_body(&mut self) -> Option<Box<dyn ReadStream>>;

    /// Release the underlying connection.
    fn disconnect(&mut self);
}

/// Opens connections bound according to a `ConnectionStrategy`.
pub trait Transport {
    type Conn: Connection;

    fn open(&self, url: &Url, strategy: &ConnectionStrategy) -> io::Result<Self::Conn>;
}

/// Owns a connection and disconnects it exactly once, on drop.
pub struct ConnectionGuard<C: Connection> {
    conn: C,
}

impl<C: Connection> ConnectionGuard<C> {
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

impl<C: Connection> Deref for ConnectionGuard<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.conn
    }
}

impl<C: Connection> DerefMut for ConnectionGuard<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.conn
    }
}

impl<C: Connection> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        self.conn.disconnect();
    }
}

/// Owns one stream and closes it exactly once.
///
/// `finish` closes and reports the result. A guard dropped without
/// `finish` (an early return) still closes, discarding the error.
pub struct StreamGuard<S: Close + ?Sized> {
    stream: Box<S>,
    closed: bool,
}

impl<S: Close + ?Sized> StreamGuard<S> {
    pub fn new(stream: Box<S>) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    pub fn finish(mut self) -> io::Result<()> {
        self.closed = true;
        self.stream.close()
    }
}

impl<S: Close + ?Sized> Deref for StreamGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.stream
    }
}

impl<S: Close + ?Sized> DerefMut for StreamGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}

impl<S: Close + ?Sized> Drop for StreamGuard<S> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.stream.close();
        }
    }
}
