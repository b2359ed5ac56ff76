// Upstream client implementation
// Issues the relayed request against the caller-supplied target

use axum::body::{Body, HttpBody};
use axum::http::{HeaderMap, Method};
use reqwest::{redirect, Client, Response};
use std::error::Error as StdError;
use url::Url;

use crate::error::{AppResult, ProxyError};
use crate::proxy::common::headers::build_outbound_headers;
use crate::proxy::config::UpstreamProxyConfig;
use crate::utils::http::create_client_with_proxy;

/// How the upstream client treats 3xx responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// Chase redirects and return the final response
    Follow,
    /// Return the first response as-is
    Manual,
}

pub struct UpstreamClient {
    follow_client: Client,
    manual_client: Client,
}

/// Parse the raw target and restrict it to http/https
pub fn validate_target_url(raw: &str) -> Result<Url, ProxyError> {
    let url = Url::parse(raw).map_err(|e| ProxyError::InvalidUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ProxyError::InvalidProtocol),
    }
}

/// Render an error together with its source chain
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl UpstreamClient {
    pub fn new(timeout_secs: u64, proxy_config: Option<&UpstreamProxyConfig>) -> AppResult<Self> {
        Ok(Self {
            follow_client: create_client_with_proxy(
                timeout_secs,
                proxy_config,
                redirect::Policy::default(),
            )?,
            manual_client: create_client_with_proxy(
                timeout_secs,
                proxy_config,
                redirect::Policy::none(),
            )?,
        })
    }

    /// Forward one request upstream.
    ///
    /// GET and HEAD never carry a body; other methods stream `body` through
    /// unless it is known to be empty.
    /// A single attempt is made; transport failures become
    /// `ProxyError::UpstreamFailed`.
    pub async fn forward(
        &self,
        target: &Url,
        method: Method,
        headers: &HeaderMap,
        body: Body,
        redirects: RedirectMode,
    ) -> Result<Response, ProxyError> {
        let client = match redirects {
            RedirectMode::Follow => &self.follow_client,
            RedirectMode::Manual => &self.manual_client,
        };

        let mut outbound = build_outbound_headers(headers);
        let mut request = client.request(method.clone(), target.clone());

        if method == Method::GET || method == Method::HEAD {
            outbound.remove(axum::http::header::CONTENT_LENGTH);
        } else if body.size_hint().exact() != Some(0) {
            request = request.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let response = request
            .headers(outbound)
            .send()
            .await
            .map_err(|e| ProxyError::UpstreamFailed(error_chain(&e)))?;

        tracing::debug!(
            "Upstream {} {} answered {}",
            method,
            target,
            response.status()
        );

        Ok(response)
    }
}
