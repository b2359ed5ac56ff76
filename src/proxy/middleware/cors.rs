// CORS headers for relayed, preflight and error responses
use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};

pub const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS, PATCH";
pub const PREFLIGHT_MAX_AGE: &str = "86400";

/// The caller's `Origin`, or `*` when none was sent
pub fn cors_origin(headers: &HeaderMap) -> HeaderValue {
    headers
        .get(header::ORIGIN)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"))
}

/// Stamp the headers every response carries
pub fn apply_base_headers(headers: &mut HeaderMap, origin: &HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
}

/// Base headers plus the method and request-header allowances
pub fn apply_cors_headers(headers: &mut HeaderMap, origin: &HeaderValue) {
    apply_base_headers(headers, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
}

/// Comma-joined list of every header name in `headers`
pub fn expose_headers_value(headers: &HeaderMap) -> Option<HeaderValue> {
    if headers.is_empty() {
        return None;
    }
    let names = headers
        .keys()
        .map(|name| name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    HeaderValue::from_str(&names).ok()
}

/// 204 answer to an `OPTIONS` preflight
pub fn preflight_response(request_headers: &HeaderMap) -> Response {
    let origin = cors_origin(request_headers);
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;

    let headers = response.headers_mut();
    apply_cors_headers(headers, &origin);
    if let Some(requested) = request_headers.get(header::ACCESS_CONTROL_REQUEST_HEADERS) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
    }
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(PREFLIGHT_MAX_AGE),
    );

    response
}

/// Attach `Allow-Origin` and `Allow-Credentials` to every response so
/// browsers can read error bodies too.
pub async fn cors_middleware(request: Request, next: Next) -> Response {
    let origin = cors_origin(request.headers());
    let mut response = next.run(request).await;
    apply_base_headers(response.headers_mut(), &origin);
    response
}
