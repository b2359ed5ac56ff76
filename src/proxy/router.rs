// Request routing: one endpoint, four branches
use axum::{
    extract::{Request, State},
    http::Method,
    response::Response,
};

use crate::proxy::handlers;
use crate::proxy::middleware::cors::preflight_response;
use crate::proxy::server::AppState;

pub const FAVICON_PATH: &str = "/favicon.ico";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Asset,
    Preflight,
    Landing,
    Proxy,
}

/// Query parameters understood by the relay. The first occurrence of a
/// name wins.
#[derive(Debug, Clone, Default)]
pub struct RelayParams {
    pub url: Option<String>,
    pub reveal: Option<String>,
    pub key: Option<String>,
}

impl RelayParams {
    pub fn from_query(query: Option<&str>) -> Self {
        let mut params = RelayParams::default();
        let Some(query) = query else {
            return params;
        };

        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match name.as_ref() {
                "url" => &mut params.url,
                "reveal" => &mut params.reveal,
                "key" => &mut params.key,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }
}

/// Select the branch for a request. The asset path wins over everything,
/// then preflight, then the presence of a non-empty `url`.
pub fn classify(method: &Method, path: &str, target: Option<&str>) -> Route {
    if path == FAVICON_PATH {
        Route::Asset
    } else if *method == Method::OPTIONS {
        Route::Preflight
    } else if target.map_or(true, str::is_empty) {
        Route::Landing
    } else {
        Route::Proxy
    }
}

/// Fallback handler for every path and method
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let params = RelayParams::from_query(request.uri().query());

    match classify(request.method(), request.uri().path(), params.url.as_deref()) {
        Route::Asset => handlers::asset::favicon(),
        Route::Preflight => preflight_response(request.headers()),
        Route::Landing => handlers::landing::landing_page(request.headers()),
        Route::Proxy => handlers::relay::handle_relay(state, params, request).await,
    }
}
