// Header names and filtering shared by the relay handlers

use axum::http::header::{self, HeaderMap, HeaderName};

/// Gateway credential header; never forwarded upstream
pub const X_API_KEY: &str = "x-api-key";
/// Browser-settable stand-in for `cookie`
pub const X_COOKIE: &str = "x-cookie";

/// Connection-scoped headers that must not cross the relay
const HOP_BY_HOP_HEADERS: &[HeaderName] = &[
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

pub fn is_hop_by_hop_header(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(name)
        || name.as_str() == "keep-alive"
        || name.as_str() == "proxy-connection"
}

/// Build the outbound header set from the caller's headers.
///
/// `x-cookie` is moved into `cookie`; `host`, the gateway key and
/// hop-by-hop headers are dropped.
pub fn build_outbound_headers(incoming: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(incoming.len());

    for (name, value) in incoming {
        if is_hop_by_hop_header(name)
            || *name == header::HOST
            || name.as_str() == X_API_KEY
            || name.as_str() == X_COOKIE
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    if let Some(cookie) = incoming.get(X_COOKIE) {
        headers.insert(header::COOKIE, cookie.clone());
    }

    headers
}

/// Copy of a response header map without hop-by-hop entries
pub fn filter_response_headers(response_headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(response_headers.len());

    for (name, value) in response_headers {
        if !is_hop_by_hop_header(name) {
            filtered.append(name.clone(), value.clone());
        }
    }

    filtered
}
