// Shapes the upstream response for the caller
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use crate::proxy::common::headers::filter_response_headers;
use crate::proxy::middleware::cors::{apply_cors_headers, expose_headers_value};

/// Response shape requested through `reveal=`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealMode {
    None,
    Headers,
}

impl RevealMode {
    /// Only the exact value `headers` switches modes
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("headers") => RevealMode::Headers,
            _ => RevealMode::None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct RevealPayload {
    pub status: String,
    pub headers: Vec<HeaderEntry>,
}

impl RevealPayload {
    /// One entry per header value, duplicates included, in upstream order
    pub fn new(status: StatusCode, headers: &HeaderMap) -> Self {
        Self {
            status: status.as_u16().to_string(),
            headers: headers
                .iter()
                .map(|(name, value)| HeaderEntry {
                    name: name.as_str().to_string(),
                    value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
                })
                .collect(),
        }
    }
}

pub fn transform(
    upstream: reqwest::Response,
    mode: RevealMode,
    cors_origin: &HeaderValue,
) -> Response {
    match mode {
        RevealMode::Headers => {
            let payload = RevealPayload::new(upstream.status(), upstream.headers());
            // The body is never read; dropping the response releases it.
            drop(upstream);
            reveal_response(payload, cors_origin)
        }
        RevealMode::None => passthrough_response(upstream, cors_origin),
    }
}

fn reveal_response(payload: RevealPayload, cors_origin: &HeaderValue) -> Response {
    let mut response = (StatusCode::OK, Json(payload)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    apply_cors_headers(headers, cors_origin);
    response
}

/// Upstream status and body untouched, CORS headers overlaid
fn passthrough_response(upstream: reqwest::Response, cors_origin: &HeaderValue) -> Response {
    let status = upstream.status();
    let expose = expose_headers_value(upstream.headers());
    let mut headers = filter_response_headers(upstream.headers());

    apply_cors_headers(&mut headers, cors_origin);
    if let Some(expose) = expose {
        headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, expose);
    }

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
