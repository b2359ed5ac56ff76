// API key authorization
use axum::http::HeaderMap;
use serde::Deserialize;
use std::sync::Arc;

use crate::proxy::common::headers::X_API_KEY;
use crate::proxy::common::pattern;
use crate::proxy::key_store::KeyStore;

/// Restrictions stored alongside a key. Missing or empty lists are open.
#[derive(Debug, Default, Deserialize)]
pub struct KeyRestrictions {
    #[serde(default)]
    pub origins: Option<Vec<String>>,
    #[serde(default)]
    pub urls: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Accept,
    Reject(String),
}

/// Extract the API key: `x-api-key` header first, then the `key` query value
pub fn extract_api_key<'a>(headers: &'a HeaderMap, query_key: Option<&'a str>) -> Option<&'a str> {
    headers
        .get(X_API_KEY)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| query_key.map(str::trim).filter(|s| !s.is_empty()))
}

pub struct Authorizer {
    store: Arc<dyn KeyStore>,
    same_origin_hosts: Vec<String>,
}

impl Authorizer {
    pub fn new(store: Arc<dyn KeyStore>, same_origin_hosts: Vec<String>) -> Self {
        let same_origin_hosts = same_origin_hosts
            .into_iter()
            .filter(|h| !h.is_empty())
            .map(|h| h.to_ascii_lowercase())
            .collect();
        Self {
            store,
            same_origin_hosts,
        }
    }

    /// Decide whether a caller may relay to `target_url`.
    ///
    /// `target_url` is the raw string the caller supplied, before parsing.
    pub async fn authorize(
        &self,
        api_key: Option<&str>,
        origin: Option<&str>,
        target_url: &str,
        request_host: &str,
    ) -> AuthDecision {
        let api_key = match api_key {
            Some(k) if !k.is_empty() => k,
            _ => return AuthDecision::Reject("Missing API key".to_string()),
        };

        let payload = match self.store.get(api_key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return AuthDecision::Reject("Invalid API key".to_string()),
            Err(e) => {
                tracing::error!("API key lookup failed: {}", e);
                return AuthDecision::Reject("API key validation failed".to_string());
            }
        };

        let restrictions: KeyRestrictions = match serde_json::from_str(&payload) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(
                    "Stored config for an API key is not valid JSON ({}), treating key as unrestricted",
                    e
                );
                return AuthDecision::Accept;
            }
        };

        let origins = restrictions.origins.unwrap_or_default();
        if !origins.is_empty() && !self.is_same_origin(origin, request_host) {
            let received = origin.unwrap_or("");
            if !pattern::matches_any(&origins, received) {
                return AuthDecision::Reject(format!(
                    "Origin '{}' is not allowed for this API key",
                    received
                ));
            }
        }

        let urls = restrictions.urls.unwrap_or_default();
        if !pattern::matches_any(&urls, target_url) {
            return AuthDecision::Reject(format!(
                "URL '{}' is not allowed for this API key",
                target_url
            ));
        }

        AuthDecision::Accept
    }

    /// No declared origin and a host we serve ourselves
    fn is_same_origin(&self, origin: Option<&str>, request_host: &str) -> bool {
        if origin.is_some() {
            return false;
        }
        let host = request_host.to_ascii_lowercase();
        self.same_origin_hosts.iter().any(|h| host.contains(h.as_str()))
    }
}
