// Relay handler: authorize, forward, shape the response
use axum::{
    extract::Request,
    http::{header, request::Parts, HeaderMap},
    response::{IntoResponse, Response},
};
use tracing::Instrument;

use crate::error::ProxyError;
use crate::proxy::auth::{extract_api_key, AuthDecision};
use crate::proxy::mappers::{transform, RevealMode};
use crate::proxy::middleware::cors::cors_origin;
use crate::proxy::router::RelayParams;
use crate::proxy::server::AppState;
use crate::proxy::upstream::{validate_target_url, RedirectMode};

/// Everything the pipeline needs to know about one inbound request
#[derive(Debug, Clone)]
pub struct ProxyRequestContext {
    /// Target exactly as supplied, before parsing
    pub raw_target: String,
    pub reveal: RevealMode,
    pub origin: Option<String>,
    pub api_key: Option<String>,
    /// Host the caller addressed this relay by
    pub host: String,
}

impl ProxyRequestContext {
    pub fn new(params: RelayParams, parts: &Parts) -> Self {
        Self {
            api_key: extract_api_key(&parts.headers, params.key.as_deref()).map(str::to_string),
            raw_target: params.url.unwrap_or_default(),
            reveal: RevealMode::from_param(params.reveal.as_deref()),
            // A present Origin stays present even when it is not valid UTF-8
            origin: parts
                .headers
                .get(header::ORIGIN)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned()),
            host: header_str(&parts.headers, header::HOST.as_str())
                .map(str::to_string)
                .or_else(|| parts.uri.authority().map(|a| a.to_string()))
                .unwrap_or_default(),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub async fn handle_relay(state: AppState, params: RelayParams, request: Request) -> Response {
    let request_id = uuid::Uuid::new_v4().simple().to_string();
    let span = tracing::info_span!("relay", id = %request_id, method = %request.method());

    async move {
        match relay(&state, params, request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Relay rejected ({}): {}", e.code(), e);
                e.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

async fn relay(
    state: &AppState,
    params: RelayParams,
    request: Request,
) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();
    let ctx = ProxyRequestContext::new(params, &parts);

    let decision = state
        .authorizer
        .authorize(
            ctx.api_key.as_deref(),
            ctx.origin.as_deref(),
            &ctx.raw_target,
            &ctx.host,
        )
        .await;
    if let AuthDecision::Reject(reason) = decision {
        return Err(ProxyError::Unauthorized(reason));
    }

    let target = validate_target_url(&ctx.raw_target)?;
    let redirects = match ctx.reveal {
        RevealMode::Headers => RedirectMode::Manual,
        RevealMode::None => RedirectMode::Follow,
    };

    tracing::info!("Relaying {} {}", parts.method, target);
    let upstream = state
        .upstream
        .forward(&target, parts.method.clone(), &parts.headers, body, redirects)
        .await?;

    Ok(transform(upstream, ctx.reveal, &cors_origin(&parts.headers)))
}
