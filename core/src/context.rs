//! Caller context: cancellation, deadline and trace identity.
//!
//! # Design
//! `CallContext` is a cheap, cloneable handle. Cancellation is hierarchical
//! (a child token is cancelled with its parent) and the deadline is absolute,
//! so deriving a child can only tighten it. Transports observe a context
//! through `done()`.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Trace id used when a supplied id is not 32 hex digits.
pub const FALLBACK_TRACE_ID: &str = "01000000000000000000000000000000";
/// Span id used when a supplied id is not 16 hex digits.
pub const FALLBACK_SPAN_ID: &str = "0200000000000000";

/// W3C trace identity carried by a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: String,
    span_id: String,
}

impl TraceContext {
    /// Build from hex ids. Invalid ids are replaced by the fallback ids
    /// rather than rejected.
    pub fn new(trace_id: &str, span_id: &str) -> Self {
        Self {
            trace_id: valid_hex_id(trace_id, 32).unwrap_or_else(|| FALLBACK_TRACE_ID.to_string()),
            span_id: valid_hex_id(span_id, 16).unwrap_or_else(|| FALLBACK_SPAN_ID.to_string()),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    /// Value for the `traceparent` header (version 00, sampled).
    pub fn traceparent(&self) -> String {
        format!("00-{}-{}-01", self.trace_id, self.span_id)
    }
}

// All-zero ids are invalid in W3C trace context.
fn valid_hex_id(id: &str, len: usize) -> Option<String> {
    let ok = id.len() == len
        && id.bytes().all(|b| b.is_ascii_hexdigit())
        && id.bytes().any(|b| b != b'0');
    ok.then(|| id.to_ascii_lowercase())
}

/// Cancellation, deadline and trace identity for one logical request.
#[derive(Debug, Clone)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    trace: Option<TraceContext>,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::background()
    }
}

impl CallContext {
    /// A root context: never cancelled, no deadline, no trace.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            trace: None,
        }
    }

    /// A child that is cancelled whenever `self` is, and can be cancelled
    /// on its own without affecting `self`.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            trace: self.trace.clone(),
        }
    }

    /// A child whose deadline is at most `timeout` from now. A timeout too
    /// large to represent leaves the inherited deadline, if any, in place.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.child(),
        }
    }

    /// A child whose deadline is the earlier of `deadline` and ours.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut child = self.child();
        child.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        child
    }

    /// A copy of this context carrying the given trace identity.
    pub fn with_trace(&self, trace_id: &str, span_id: &str) -> Self {
        Self {
            token: self.token.clone(),
            deadline: self.deadline,
            trace: Some(TraceContext::new(trace_id, span_id)),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancelled, or past the deadline.
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.deadline.is_some_and(|at| Instant::now() >= at)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn trace(&self) -> Option<&TraceContext> {
        self.trace.as_ref()
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace.as_ref().map(TraceContext::trace_id)
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(at) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = sleep_until(at) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}
