//! Per-call instrumentation.
//!
//! # Design
//! Every call produces exactly one `CallEvent` when it reaches a terminal
//! outcome. The event goes to an injected `CallObserver`, and the default
//! `TracingObserver` turns it into a structured `tracing` event. Observers
//! only see a summary of the result, so they cannot alter what the caller
//! receives.

use std::time::Duration;

use tracing::Level;
use uuid::Uuid;

use crate::error::{CallError, CallResult};
use crate::http::HttpMethod;

/// `tracing` target used for call events.
pub const TARGET: &str = "outbound_core::call";

/// Terminal classification of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Status,
    Transport,
    BodyRead,
    Encoding,
}

impl Outcome {
    pub fn of(result: &CallResult) -> Self {
        match result {
            Ok(_) => Outcome::Success,
            Err(CallError::Status { .. }) => Outcome::Status,
            Err(CallError::Transport(_)) => Outcome::Transport,
            Err(CallError::BodyRead(_)) => Outcome::BodyRead,
            Err(CallError::Encoding(_)) => Outcome::Encoding,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Status => "status",
            Outcome::Transport => "transport_error",
            Outcome::BodyRead => "body_read_error",
            Outcome::Encoding => "encoding_error",
        }
    }

    pub fn level(&self) -> Level {
        match self {
            Outcome::Success => Level::INFO,
            Outcome::Status => Level::WARN,
            Outcome::Transport | Outcome::BodyRead | Outcome::Encoding => Level::ERROR,
        }
    }
}

/// Summary of one finished call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEvent {
    pub correlation_id: Uuid,
    pub trace_id: Option<String>,
    pub method: HttpMethod,
    /// Effective target, including the query string for fetch/remove.
    pub path: String,
    pub elapsed: Duration,
    pub outcome: Outcome,
    pub status: Option<u16>,
    pub body_len: Option<usize>,
    pub error: Option<String>,
}

impl CallEvent {
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Receives one event per call.
pub trait CallObserver: Send + Sync {
    fn record(&self, event: &CallEvent);
}

/// Emits call events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CallObserver for TracingObserver {
    fn record(&self, event: &CallEvent) {
        let correlation_id = event.correlation_id.to_string();
        let trace_id = event.trace_id.as_deref().unwrap_or_default();
        let elapsed_ms = event.elapsed_ms();
        let method = event.method.as_str();
        let outcome = event.outcome.as_str();
        let error = event.error.as_deref().unwrap_or_default();

        match event.outcome {
            Outcome::Success => tracing::info!(
                target: TARGET,
                %correlation_id, trace_id, method, path = %event.path, elapsed_ms, outcome,
                status = event.status, body_len = event.body_len,
                "request done"
            ),
            Outcome::Status => tracing::warn!(
                target: TARGET,
                %correlation_id, trace_id, method, path = %event.path, elapsed_ms, outcome,
                status = event.status, error,
                "request failed"
            ),
            Outcome::BodyRead => tracing::error!(
                target: TARGET,
                %correlation_id, trace_id, method, path = %event.path, elapsed_ms, outcome,
                status = event.status, error,
                "read body failed"
            ),
            Outcome::Transport | Outcome::Encoding => tracing::error!(
                target: TARGET,
                %correlation_id, trace_id, method, path = %event.path, elapsed_ms, outcome, error,
                "request failed"
            ),
        }
    }
}
