//! Error types for the outbound executor.
//!
//! # Design
//! Every failure a call can hit is one variant of `CallError`, so the caller
//! always gets either a body or exactly one typed error. Encoding problems are
//! caught before anything touches the network. Transport failures, deadline
//! expiry and caller cancellation all share `TransportError` because the
//! executor cannot tell them apart from the transport's point of view. A
//! non-success status keeps only the code and status text; the body is dropped.

use std::time::Duration;

use thiserror::Error;

/// Boxed error produced by a transport or a response body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a single call: the response body, or why there is none.
pub type CallResult = Result<Vec<u8>, CallError>;

/// Errors returned by `Executor::fetch`, `submit` and `remove`.
#[derive(Debug, Error)]
pub enum CallError {
    /// The request could not be encoded; nothing was sent.
    #[error("encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    /// The transport failed, or the call was interrupted before a response.
    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),

    /// The server answered with a status other than the success status.
    #[error("{status} {status_text}")]
    Status { status: u16, status_text: String },

    /// A success response arrived but its body could not be drained.
    #[error("reading response body failed: {0}")]
    BodyRead(#[source] BoxError),
}

impl CallError {
    /// Status code for `CallError::Status`, `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            CallError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Status text for `CallError::Status`, `None` otherwise.
    pub fn status_text(&self) -> Option<&str> {
        match self {
            CallError::Status { status_text, .. } => Some(status_text),
            _ => None,
        }
    }

    /// True when the call was cut short by its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CallError::Transport(TransportError::TimedOut(_)))
    }
}

/// Failures while turning a request spec into a wire request.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// The params value could not be converted to JSON at all.
    #[error("params are not serializable: {0}")]
    Params(#[source] serde_json::Error),

    /// The params value serialized to something other than a JSON object.
    #[error("params must serialize to an object, got {0}")]
    NotAnObject(&'static str),

    /// JSON body serialization failed.
    #[error("json body: {0}")]
    Json(#[source] serde_json::Error),

    /// Query string or form body serialization failed.
    #[error("url encoding: {0}")]
    UrlEncoded(#[source] serde_urlencoded::ser::Error),

    /// The requested body content type has no encoder.
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(&'static str),

    /// A caller header has a name or value that cannot go on the wire.
    #[error("invalid header {name:?}")]
    InvalidHeader {
        name: String,
        #[source]
        source: http::Error,
    },
}

/// Reasons a call never produced a response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The per-call timeout or the parent deadline elapsed.
    #[error("request timed out after {0:?}")]
    TimedOut(Duration),

    /// The caller's context was cancelled.
    #[error("request cancelled")]
    Cancelled,

    /// The transport reported a failure (connect, DNS, protocol, ...).
    #[error("{0}")]
    Failed(#[source] BoxError),
}

/// Split a call result into the `(body, error)` pair.
///
/// Exactly one side is `Some`.
pub fn into_parts(result: CallResult) -> (Option<Vec<u8>>, Option<CallError>) {
    match result {
        Ok(body) => (Some(body), None),
        Err(e) => (None, Some(e)),
    }
}
