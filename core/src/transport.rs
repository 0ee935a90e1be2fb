//! The transport capability the executor calls into.
//!
//! # Design
//! The executor owns no network code. A `Transport` is built once and
//! shared as `Arc<dyn Transport>` by every call, so it must be safe for
//! concurrent use. A transport should watch `CallContext::done()` and give up
//! when it fires. The executor also drops the in-flight future at the
//! deadline, so a transport that ignores the context still cannot hold the
//! caller past its timeout.

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::BoxError;
use crate::http::{HttpRequest, HttpResponse};

/// Executes one wire request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the response head plus an undrained body.
    ///
    /// Any status code is a successful execution; only failures to obtain a
    /// response at all are errors.
    async fn execute(&self, request: HttpRequest, ctx: &CallContext) -> Result<HttpResponse, BoxError>;
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use std::time::Duration;

    use async_trait::async_trait;
    use hyper::ext::ReasonPhrase;
    use reqwest::{Client, Method};

    use super::Transport;
    use crate::context::CallContext;
    use crate::error::{BoxError, TransportError};
    use crate::http::{HttpMethod, HttpRequest, HttpResponse, ResponseBody};

    /// `Transport` backed by a shared `reqwest::Client`.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: Client,
    }

    impl Default for ReqwestTransport {
        fn default() -> Self {
            Self::new(Client::new())
        }
    }

    impl ReqwestTransport {
        pub fn new(client: Client) -> Self {
            Self { client }
        }

        /// Client with a connect timeout as its lower-level safety net.
        pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, BoxError> {
            let client = Client::builder().connect_timeout(connect_timeout).build()?;
            Ok(Self::new(client))
        }
    }

    fn method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    // hyper keeps the reason phrase only when it differs from the canonical one.
    fn status_text(response: &reqwest::Response) -> String {
        match response.extensions().get::<ReasonPhrase>() {
            Some(reason) => String::from_utf8_lossy(reason.as_bytes()).into_owned(),
            None => response.status().canonical_reason().unwrap_or_default().to_string(),
        }
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        async fn execute(&self, request: HttpRequest, ctx: &CallContext) -> Result<HttpResponse, BoxError> {
            let mut builder = self.client.request(method(request.method), request.path.as_str());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = tokio::select! {
                biased;
                _ = ctx.done() => return Err(TransportError::Cancelled.into()),
                sent = builder.send() => sent?,
            };

            let status = response.status();
            let status_text = status_text(&response);
            let headers = response
                .headers()
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
                .collect();

            let drain_ctx = ctx.clone();
            let body = ResponseBody::pending(async move {
                let drained: Result<Vec<u8>, BoxError> = tokio::select! {
                    biased;
                    _ = drain_ctx.done() => Err(TransportError::Cancelled.into()),
                    bytes = response.bytes() => bytes.map(|b| b.to_vec()).map_err(Into::into),
                };
                drained
            });

            Ok(HttpResponse {
                status: status.as_u16(),
                status_text,
                headers,
                body,
            })
        }
    }

}
