//! The outbound request executor.
//!
//! # Design
//! `Executor` holds only shared, immutable pieces: the transport, the
//! observer and the config. All per-call state lives in the call itself, so
//! one executor can be cloned into any number of tasks without locks.
//!
//! A call moves through fixed stages: build the `RequestSpec`, apply options,
//! encode, dispatch under a `Deadline`, classify, record, return. There is no
//! path back to an earlier stage. Classification follows a strict priority:
//! transport failure, then non-success status (body dropped unread), then
//! body drain failure, then success.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::Instrument as _;
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::context::CallContext;
use crate::deadline::Deadline;
use crate::encode::encode;
use crate::error::{BoxError, CallError, CallResult, TransportError};
use crate::http::HttpRequest;
use crate::instrument::{CallEvent, CallObserver, Outcome, TracingObserver, TARGET};
use crate::options::CallOptions;
use crate::transport::Transport;
use crate::types::{to_params, CallMethod, RequestSpec};

/// Executes fetch/submit/remove calls against an injected transport.
#[derive(Clone)]
pub struct Executor {
    transport: Arc<dyn Transport>,
    observer: Arc<dyn CallObserver>,
    config: ExecutorConfig,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Executor with the default config, reporting through `tracing`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            observer: Arc::new(TracingObserver),
            config: ExecutorConfig::default(),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// GET `path` with `params` in the query string.
    pub async fn fetch<P>(&self, ctx: &CallContext, path: &str, params: &P, options: CallOptions) -> CallResult
    where
        P: Serialize + ?Sized,
    {
        self.call(ctx, CallMethod::Fetch, path, params, options).await
    }

    /// POST `params` to `path` as a JSON (default) or form body.
    pub async fn submit<P>(&self, ctx: &CallContext, path: &str, params: &P, options: CallOptions) -> CallResult
    where
        P: Serialize + ?Sized,
    {
        self.call(ctx, CallMethod::Submit, path, params, options).await
    }

    /// DELETE `path` with `params` in the query string.
    pub async fn remove<P>(&self, ctx: &CallContext, path: &str, params: &P, options: CallOptions) -> CallResult
    where
        P: Serialize + ?Sized,
    {
        self.call(ctx, CallMethod::Remove, path, params, options).await
    }

    async fn call<P>(
        &self,
        ctx: &CallContext,
        method: CallMethod,
        path: &str,
        params: &P,
        options: CallOptions,
    ) -> CallResult
    where
        P: Serialize + ?Sized,
    {
        let correlation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            target: TARGET,
            "outbound_call",
            %correlation_id,
            method = method.name()
        );

        async move {
            let started = Instant::now();
            let (effective_path, result, status) = match self.build(ctx, method, path, params, options) {
                Ok((request, timeout)) => {
                    let effective_path = request.path.clone();
                    let (result, status) = self.dispatch(ctx, request, timeout).await;
                    (effective_path, result, status)
                }
                Err(e) => (path.to_string(), Err(e), None),
            };

            self.observer.record(&CallEvent {
                correlation_id,
                trace_id: ctx.trace_id().map(str::to_string),
                method: method.http_method(),
                path: effective_path,
                elapsed: started.elapsed(),
                outcome: Outcome::of(&result),
                status,
                body_len: result.as_ref().ok().map(Vec::len),
                error: result.as_ref().err().map(ToString::to_string),
            });
            result
        }
        .instrument(span)
        .await
    }

    fn build<P>(
        &self,
        ctx: &CallContext,
        method: CallMethod,
        path: &str,
        params: &P,
        options: CallOptions,
    ) -> Result<(HttpRequest, Duration), CallError>
    where
        P: Serialize + ?Sized,
    {
        let default_timeout = self.config.default_timeout();
        let mut spec = RequestSpec::new(method, path, to_params(params)?);
        spec.timeout = default_timeout;
        options.apply(&mut spec, default_timeout);

        let request = encode(&spec, ctx.trace())?;
        Ok((request, spec.timeout))
    }

    async fn dispatch(&self, ctx: &CallContext, request: HttpRequest, timeout: Duration) -> (CallResult, Option<u16>) {
        let deadline = Deadline::derive(ctx, timeout);

        let response = match deadline
            .run(self.transport.execute(request, deadline.context()))
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(cause)) => return (Err(transport_failure(cause).into()), None),
            Err(interrupt) => return (Err(TransportError::from(interrupt).into()), None),
        };

        let status = response.status;
        if status != self.config.success_status {
            return (
                Err(CallError::Status {
                    status,
                    status_text: response.status_text,
                }),
                Some(status),
            );
        }

        let result = match deadline.run(response.body.read_all()).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(cause)) => Err(CallError::BodyRead(cause)),
            Err(interrupt) => Err(CallError::BodyRead(Box::new(TransportError::from(interrupt)))),
        };
        (result, Some(status))
    }
}

// Transports may already report a `TransportError` (e.g. cancellation they observed).
fn transport_failure(cause: BoxError) -> TransportError {
    match cause.downcast::<TransportError>() {
        Ok(known) => *known,
        Err(other) => TransportError::Failed(other),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::future::pending;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::context::FALLBACK_TRACE_ID;
    use crate::encode::{CONTENT_LENGTH, CONTENT_TYPE, TRACEPARENT};
    use crate::error::EncodingError;
    use crate::http::{HttpMethod, HttpResponse, ResponseBody};
    use crate::types::ContentType;

    #[derive(Clone, Copy)]
    enum Reply {
        Ok(&'static str),
        Status(u16, &'static str),
        Refused,
        BrokenBody,
        Stall,
        StallBody,
    }

    struct FakeTransport {
        reply: Reply,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl FakeTransport {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn last_request(&self) -> HttpRequest {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    fn response(status: u16, status_text: &str, body: ResponseBody) -> HttpResponse {
        HttpResponse {
            status,
            status_text: status_text.to_string(),
            headers: Vec::new(),
            body,
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn execute(&self, request: HttpRequest, _ctx: &CallContext) -> Result<HttpResponse, BoxError> {
            self.seen.lock().unwrap().push(request);
            match self.reply {
                Reply::Ok(body) => Ok(response(200, "OK", ResponseBody::from_bytes(body))),
                Reply::Status(code, text) => Ok(response(code, text, ResponseBody::from_bytes("ignored"))),
                Reply::Refused => Err("connection refused".into()),
                Reply::BrokenBody => Ok(response(
                    200,
                    "OK",
                    ResponseBody::pending(async { Err::<Vec<u8>, BoxError>("unexpected eof".into()) }),
                )),
                Reply::Stall => pending().await,
                Reply::StallBody => Ok(response(200, "OK", ResponseBody::pending(pending()))),
            }
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<CallEvent>>);

    impl Recorder {
        fn events(&self) -> Vec<CallEvent> {
            self.0.lock().unwrap().clone()
        }
    }

    impl CallObserver for Recorder {
        fn record(&self, event: &CallEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    fn executor(transport: Arc<FakeTransport>) -> (Executor, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let exec = Executor::new(transport).with_observer(recorder.clone());
        (exec, recorder)
    }

    fn bg() -> CallContext {
        CallContext::background()
    }

    #[tokio::test]
    async fn fetch_success_scenario() {
        let transport = FakeTransport::new(Reply::Ok(r#"{"result":1}"#));
        let (exec, recorder) = executor(transport.clone());

        let body = exec
            .fetch(&bg(), "http://x/search", &json!({"q": "abc"}), CallOptions::new())
            .await
            .unwrap();

        assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"result": 1}));
        let req = transport.last_request();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://x/search?q=abc");

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, Outcome::Success);
        assert_eq!(events[0].path, "http://x/search?q=abc");
        assert_eq!(events[0].status, Some(200));
        assert_eq!(events[0].body_len, Some(12));
        assert!(events[0].error.is_none());
    }

    #[tokio::test]
    async fn submit_status_error_scenario() {
        let transport = FakeTransport::new(Reply::Status(500, "Internal Server Error"));
        let (exec, recorder) = executor(transport.clone());

        let result = exec
            .submit(&bg(), "http://x/create", &json!({"name": "a", "age": 3}), CallOptions::new())
            .await;

        let (body, err) = crate::error::into_parts(result);
        assert!(body.is_none());
        let err = err.unwrap();
        assert_eq!(err.status_text(), Some("Internal Server Error"));
        assert_eq!(err.status(), Some(500));

        let req = transport.last_request();
        assert_eq!(req.header(CONTENT_TYPE), Some("application/json;charset=utf-8"));
        let sent: Value = serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(sent, json!({"name": "a", "age": 3}));

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, Outcome::Status);
        assert_eq!(events[0].status, Some(500));
        assert_eq!(events[0].error.as_deref(), Some("500 Internal Server Error"));
        assert!(events[0].body_len.is_none());
    }

    #[tokio::test]
    async fn form_submit_scenario() {
        let transport = FakeTransport::new(Reply::Ok("{}"));
        let (exec, _) = executor(transport.clone());

        exec.submit(
            &bg(),
            "http://x/form",
            &json!({"a": "1", "b": "2 c"}),
            CallOptions::new().content_type(ContentType::Form),
        )
        .await
        .unwrap();

        let req = transport.last_request();
        assert_eq!(req.body.as_deref(), Some(&b"a=1&b=2+c"[..]));
        assert_eq!(req.header(CONTENT_TYPE), Some("application/x-www-form-urlencoded"));
        assert_eq!(req.header(CONTENT_LENGTH), Some("9"));
    }

    #[tokio::test]
    async fn remove_uses_delete_with_query() {
        let transport = FakeTransport::new(Reply::Ok(""));
        let (exec, _) = executor(transport.clone());

        let body = exec
            .remove(&bg(), "http://x/item", &json!({"id": 7}), CallOptions::new())
            .await
            .unwrap();

        assert!(body.is_empty());
        let req = transport.last_request();
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.path, "http://x/item?id=7");
    }

    #[tokio::test]
    async fn transport_failure_is_reported_once() {
        let transport = FakeTransport::new(Reply::Refused);
        let (exec, recorder) = executor(transport);

        let err = exec
            .fetch(&bg(), "http://x/search", &(), CallOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(&err, CallError::Transport(TransportError::Failed(e)) if e.to_string() == "connection refused"));
        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, Outcome::Transport);
        assert!(events[0].status.is_none());
    }

    #[tokio::test]
    async fn body_read_failure() {
        let transport = FakeTransport::new(Reply::BrokenBody);
        let (exec, recorder) = executor(transport);

        let err = exec
            .fetch(&bg(), "http://x/search", &(), CallOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CallError::BodyRead(_)));
        assert_eq!(recorder.events()[0].outcome, Outcome::BodyRead);
        assert_eq!(recorder.events()[0].status, Some(200));
    }

    #[tokio::test]
    async fn ssml_fails_before_dispatch() {
        let transport = FakeTransport::new(Reply::Ok("{}"));
        let (exec, recorder) = executor(transport.clone());

        let err = exec
            .submit(
                &bg(),
                "http://x/speak",
                &json!({"text": "hi"}),
                CallOptions::new().content_type(ContentType::Ssml),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CallError::Encoding(_)));
        assert_eq!(transport.calls(), 0);
        assert_eq!(recorder.events()[0].outcome, Outcome::Encoding);
    }

    #[tokio::test]
    async fn invalid_header_fails_before_dispatch() {
        let transport = FakeTransport::new(Reply::Ok("{}"));
        let (exec, recorder) = executor(transport.clone());

        let err = exec
            .fetch(&bg(), "http://x/search", &json!({}), CallOptions::new().header("bad name", ["v"]))
            .await
            .unwrap_err();

        assert!(matches!(err, CallError::Encoding(EncodingError::InvalidHeader { .. })), "{err}");
        assert_eq!(transport.calls(), 0);
        assert_eq!(recorder.events()[0].outcome, Outcome::Encoding);
    }

    #[tokio::test]
    async fn non_object_params_fail_before_dispatch() {
        let transport = FakeTransport::new(Reply::Ok("{}"));
        let (exec, _) = executor(transport.clone());

        let err = exec
            .fetch(&bg(), "http://x/search", "just a string", CallOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CallError::Encoding(_)));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_transport_times_out_at_configured_timeout() {
        let transport = FakeTransport::new(Reply::Stall);
        let (exec, recorder) = executor(transport);
        let start = Instant::now();

        let err = exec
            .fetch(&bg(), "http://x/slow", &(), CallOptions::new().timeout_ms(50))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(recorder.events()[0].outcome, Outcome::Transport);
    }

    #[tokio::test(start_paused = true)]
    async fn default_timeout_is_three_seconds() {
        let transport = FakeTransport::new(Reply::Stall);
        let (exec, _) = executor(transport);
        let start = Instant::now();

        let err = exec.fetch(&bg(), "http://x/slow", &(), CallOptions::new()).await.unwrap_err();

        assert!(matches!(err, CallError::Transport(TransportError::TimedOut(d)) if d == Duration::from_millis(3000)));
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn configured_default_applies_to_non_positive_override() {
        let transport = FakeTransport::new(Reply::Stall);
        let (exec, _) = executor(transport);
        let exec = exec.with_config(ExecutorConfig {
            default_timeout_ms: 200,
            ..ExecutorConfig::default()
        });

        let err = exec
            .fetch(&bg(), "http://x/slow", &(), CallOptions::new().timeout_ms(-1))
            .await
            .unwrap_err();

        assert!(matches!(err, CallError::Transport(TransportError::TimedOut(d)) if d == Duration::from_millis(200)));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_body_is_a_body_read_error() {
        let transport = FakeTransport::new(Reply::StallBody);
        let (exec, _) = executor(transport);

        let err = exec
            .fetch(&bg(), "http://x/slow-body", &(), CallOptions::new().timeout_ms(50))
            .await
            .unwrap_err();

        match err {
            CallError::BodyRead(cause) => {
                assert!(matches!(cause.downcast_ref::<TransportError>(), Some(TransportError::TimedOut(_))));
            }
            other => panic!("expected body read error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn caller_cancellation_surfaces_as_transport_error() {
        let transport = FakeTransport::new(Reply::Stall);
        let (exec, _) = executor(transport);
        let ctx = bg();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = exec.fetch(&ctx, "http://x/slow", &(), CallOptions::new()).await.unwrap_err();
        assert!(matches!(err, CallError::Transport(TransportError::Cancelled)));
    }

    #[tokio::test]
    async fn custom_success_status() {
        let transport = FakeTransport::new(Reply::Status(201, "Created"));
        let (exec, _) = executor(transport);
        let exec = exec.with_config(ExecutorConfig {
            success_status: 201,
            ..ExecutorConfig::default()
        });

        let body = exec.submit(&bg(), "http://x/create", &json!({}), CallOptions::new()).await.unwrap();
        assert_eq!(body, b"ignored");
    }

    #[tokio::test]
    async fn trace_id_flows_into_request_and_event() {
        let transport = FakeTransport::new(Reply::Ok("{}"));
        let (exec, recorder) = executor(transport.clone());
        let ctx = bg().with_trace(FALLBACK_TRACE_ID, "00f067aa0ba902b7");

        exec.fetch(&ctx, "http://x/search", &(), CallOptions::new()).await.unwrap();

        assert_eq!(
            transport.last_request().header(TRACEPARENT),
            Some("00-01000000000000000000000000000000-00f067aa0ba902b7-01")
        );
        assert_eq!(recorder.events()[0].trace_id.as_deref(), Some(FALLBACK_TRACE_ID));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_calls_get_distinct_correlation_ids() {
        let transport = FakeTransport::new(Reply::Ok(r#"{"result":1}"#));
        let (exec, recorder) = executor(transport.clone());

        let mut handles = Vec::new();
        for i in 0..100 {
            let exec = exec.clone();
            handles.push(tokio::spawn(async move {
                exec.fetch(&CallContext::background(), "http://x/search", &json!({"i": i}), CallOptions::new())
                    .await
            }));
        }
        for handle in handles {
            let body = handle.await.unwrap().unwrap();
            assert_eq!(body, br#"{"result":1}"#);
        }

        let events = recorder.events();
        assert_eq!(events.len(), 100);
        let ids: HashSet<Uuid> = events.iter().map(|e| e.correlation_id).collect();
        assert_eq!(ids.len(), 100);
        let paths: HashSet<String> = events.into_iter().map(|e| e.path).collect();
        assert_eq!(paths.len(), 100);
        assert_eq!(transport.calls(), 100);
    }

    #[test]
    fn transport_errors_are_not_double_wrapped() {
        let boxed: BoxError = Box::new(TransportError::Cancelled);
        assert!(matches!(transport_failure(boxed), TransportError::Cancelled));
        assert!(matches!(transport_failure("dns".into()), TransportError::Failed(_)));
    }
}
