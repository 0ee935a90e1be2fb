//! HTTP wire types exchanged between the executor and a transport.
//!
//! # Design
//! Requests are plain data: the dispatcher produces an `HttpRequest` and the
//! transport does the I/O. Responses carry their body as a one-shot
//! `ResponseBody` so the executor can decide whether to drain it at all. A
//! non-success response is dropped unread, and dropping the body is what
//! releases the underlying connection.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::BoxError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// Built by `encode::encode`. `path` is the full target URL including any
/// query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// First value of the named header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of the named header, in wire order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response returned by a transport.
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

type PendingBody = Pin<Box<dyn Future<Output = Result<Vec<u8>, BoxError>> + Send>>;

/// Response body that can be drained exactly once.
pub struct ResponseBody {
    inner: BodyInner,
}

enum BodyInner {
    Buffered(Vec<u8>),
    Pending(PendingBody),
}

impl ResponseBody {
    /// A body that is already in memory.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: BodyInner::Buffered(bytes.into()),
        }
    }

    /// A body produced by draining a connection. The future owns whatever
    /// holds the connection open; dropping the body releases it.
    pub fn pending<F>(drain: F) -> Self
    where
        F: Future<Output = Result<Vec<u8>, BoxError>> + Send + 'static,
    {
        Self {
            inner: BodyInner::Pending(Box::pin(drain)),
        }
    }

    /// Drain the whole body. Consumes `self`, so a body is never re-read.
    pub async fn read_all(self) -> Result<Vec<u8>, BoxError> {
        match self.inner {
            BodyInner::Buffered(bytes) => Ok(bytes),
            BodyInner::Pending(drain) => drain.await,
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            BodyInner::Buffered(bytes) => write!(f, "ResponseBody({} bytes)", bytes.len()),
            BodyInner::Pending(_) => f.write_str("ResponseBody(pending)"),
        }
    }
}
