//! Outbound request executor.
//!
//! # Overview
//! Sends single request/response calls (`fetch`, `submit`, `remove`) to
//! remote HTTP endpoints. Each call is encoded, bounded by a deadline,
//! executed once through an injected `Transport`, classified into a body or
//! a typed `CallError`, and reported once to a `CallObserver`.
//!
//! # Design
//! - `Executor` holds no per-call state; it is cheap to clone and share.
//! - Network I/O lives behind the `Transport` trait. `ReqwestTransport` is
//!   provided, and tests substitute in-memory transports.
//! - Options are an explicit builder (`CallOptions`) replayed in order onto a
//!   fresh `RequestSpec`; the dispatcher only ever sees a finished spec.
//! - Deadlines are enforced by the executor itself, independent of any
//!   timeout the transport may have.
//! - No retries, no caching, no streaming: one attempt, fully reported.
//!
//! ```no_run
//! use std::sync::Arc;
//! use outbound_core::{CallContext, CallOptions, Executor, ReqwestTransport};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), outbound_core::CallError> {
//! let executor = Executor::new(Arc::new(ReqwestTransport::default()));
//! let ctx = CallContext::background();
//! let body = executor
//!     .fetch(&ctx, "http://localhost:3000/search", &json!({"q": "abc"}), CallOptions::new().timeout_ms(500))
//!     .await?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod deadline;
pub mod encode;
pub mod error;
pub mod http;
pub mod instrument;
pub mod logging;
pub mod options;
pub mod transport;
pub mod types;

pub use client::Executor;
pub use config::ExecutorConfig;
pub use context::{CallContext, TraceContext};
pub use deadline::{Deadline, Interrupt};
pub use error::{into_parts, BoxError, CallError, CallResult, EncodingError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, ResponseBody};
pub use instrument::{CallEvent, CallObserver, Outcome, TracingObserver};
pub use logging::LogConfig;
pub use options::{CallOption, CallOptions};
pub use transport::Transport;
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use types::{BasicAuth, CallMethod, ContentType, RequestSpec};
