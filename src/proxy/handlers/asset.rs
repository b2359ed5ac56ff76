// Static icon, served without authorization
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;

static FAVICON: &[u8] = include_bytes!("../../../assets/favicon.ico");

pub fn favicon() -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("image/x-icon")),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("public, max-age=31536000, immutable"),
            ),
        ],
        Bytes::from_static(FAVICON),
    )
        .into_response()
}
