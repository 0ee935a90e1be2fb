//! Request description built fresh for every call.
//!
//! # Design
//! `RequestSpec` is mutable only while `CallOptions` are applied to it. The
//! dispatcher takes it by shared reference and produces a separate
//! `HttpRequest`, so nothing can change the spec once encoding starts.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::EncodingError;
use crate::http::HttpMethod;

/// Timeout used when neither the config nor an option sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// The three call kinds the executor exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMethod {
    Fetch,
    Submit,
    Remove,
}

impl CallMethod {
    pub fn http_method(&self) -> HttpMethod {
        match self {
            CallMethod::Fetch => HttpMethod::Get,
            CallMethod::Submit => HttpMethod::Post,
            CallMethod::Remove => HttpMethod::Delete,
        }
    }

    /// Name used in logs and instrumentation.
    pub fn name(&self) -> &'static str {
        match self {
            CallMethod::Fetch => "fetch",
            CallMethod::Submit => "submit",
            CallMethod::Remove => "remove",
        }
    }

    /// Whether params travel in the query string rather than the body.
    pub fn uses_query(&self) -> bool {
        !matches!(self, CallMethod::Submit)
    }
}

/// Body encoding for `submit`. Ignored by `fetch` and `remove`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentType {
    #[default]
    Json,
    Form,
    Ssml,
}

impl ContentType {
    pub fn mime(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json;charset=utf-8",
            ContentType::Form => "application/x-www-form-urlencoded",
            ContentType::Ssml => "application/ssml+xml",
        }
    }
}

/// Credentials sent as an `Authorization: Basic` header.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Description of a single outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub path: String,
    pub method: CallMethod,
    pub params: Map<String, Value>,
    pub content_type: ContentType,
    /// Caller headers, one entry per distinct name (case-insensitive).
    pub headers: Vec<(String, Vec<String>)>,
    pub timeout: Duration,
    pub basic_auth: Option<BasicAuth>,
}

impl RequestSpec {
    pub fn new(method: CallMethod, path: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            path: path.into(),
            method,
            params,
            content_type: ContentType::default(),
            headers: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            basic_auth: None,
        }
    }

    /// Add header values, appending to an existing entry with the same name.
    pub(crate) fn merge_header(&mut self, name: String, values: Vec<String>) {
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some((_, existing)) => existing.extend(values),
            None => self.headers.push((name, values)),
        }
    }
}

/// Convert caller params into the JSON object the dispatcher encodes.
///
/// `null` (e.g. `&()` or `None`) is accepted as "no params".
pub fn to_params<P>(params: &P) -> Result<Map<String, Value>, EncodingError>
where
    P: Serialize + ?Sized,
{
    match serde_json::to_value(params).map_err(EncodingError::Params)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        Value::Bool(_) => Err(EncodingError::NotAnObject("a boolean")),
        Value::Number(_) => Err(EncodingError::NotAnObject("a number")),
        Value::String(_) => Err(EncodingError::NotAnObject("a string")),
        Value::Array(_) => Err(EncodingError::NotAnObject("an array")),
    }
}
