//! Turns a finished `RequestSpec` into an `HttpRequest`.
//!
//! # Design
//! Fetch and remove put params in the query string, and submit puts them in
//! the body according to the content type. Query and form pairs are emitted
//! in key order, so the same spec always encodes to the same bytes. Headers are layered in
//! a fixed order: computed content headers, then basic auth, then caller
//! headers (which replace any earlier header with the same name), then
//! `traceparent` if the context carries a trace and nobody set one.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http::{HeaderName, HeaderValue};
use serde_json::{Map, Value};

use crate::context::TraceContext;
use crate::error::EncodingError;
use crate::http::HttpRequest;
use crate::types::{ContentType, RequestSpec};

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const AUTHORIZATION: &str = "Authorization";
pub const TRACEPARENT: &str = "traceparent";

/// Encode `spec` into a wire request. Nothing is sent if this fails.
pub fn encode(spec: &RequestSpec, trace: Option<&TraceContext>) -> Result<HttpRequest, EncodingError> {
    let mut headers = Vec::new();
    let mut path = spec.path.clone();
    let mut body = None;

    if spec.method.uses_query() {
        append_query(&mut path, &spec.params)?;
    } else {
        let encoded = encode_body(spec.content_type, &spec.params)?;
        headers.push((CONTENT_TYPE.to_string(), spec.content_type.mime().to_string()));
        headers.push((CONTENT_LENGTH.to_string(), encoded.len().to_string()));
        body = Some(encoded);
    }

    if let Some(auth) = &spec.basic_auth {
        let token = STANDARD.encode(format!("{}:{}", auth.username, auth.password));
        set_header(&mut headers, AUTHORIZATION, vec![format!("Basic {token}")]);
    }

    for (name, values) in &spec.headers {
        validate_header(name, values)?;
        set_header(&mut headers, name, values.clone());
    }

    if let Some(trace) = trace {
        if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(TRACEPARENT)) {
            headers.push((TRACEPARENT.to_string(), trace.traceparent()));
        }
    }

    Ok(HttpRequest {
        method: spec.method.http_method(),
        path,
        headers,
        body,
    })
}

/// Render a param value the way it appears in a query string or form body.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn url_encode(params: &Map<String, Value>) -> Result<String, EncodingError> {
    let mut pairs: Vec<(&str, String)> = params
        .iter()
        .map(|(k, v)| (k.as_str(), stringify(v)))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    serde_urlencoded::to_string(pairs).map_err(EncodingError::UrlEncoded)
}

fn append_query(path: &mut String, params: &Map<String, Value>) -> Result<(), EncodingError> {
    if params.is_empty() {
        return Ok(());
    }
    let query = url_encode(params)?;
    path.push(if path.contains('?') { '&' } else { '?' });
    path.push_str(&query);
    Ok(())
}

fn encode_body(content_type: ContentType, params: &Map<String, Value>) -> Result<Vec<u8>, EncodingError> {
    match content_type {
        ContentType::Json => serde_json::to_vec(params).map_err(EncodingError::Json),
        ContentType::Form => url_encode(params).map(String::into_bytes),
        ContentType::Ssml => Err(EncodingError::UnsupportedContentType(content_type.mime())),
    }
}

fn validate_header(name: &str, values: &[String]) -> Result<(), EncodingError> {
    let invalid = |source: http::Error| EncodingError::InvalidHeader {
        name: name.to_string(),
        source,
    };
    HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.into()))?;
    for value in values {
        HeaderValue::from_str(value).map_err(|e| invalid(e.into()))?;
    }
    Ok(())
}

// Replaces every existing header of that name, keeping the caller's values in order.
fn set_header(headers: &mut Vec<(String, String)>, name: &str, values: Vec<String>) {
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    headers.extend(values.into_iter().map(|v| (name.to_string(), v)));
}
