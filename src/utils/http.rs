use crate::error::AppResult;
use crate::proxy::config::UpstreamProxyConfig;
use reqwest::{redirect, Client, Proxy};

/// Create an HTTP client with the given redirect policy and optional
/// outbound proxy.
///
/// System proxy variables are ignored; only `proxy_config` routes traffic.
pub fn create_client_with_proxy(
    timeout_secs: u64,
    proxy_config: Option<&UpstreamProxyConfig>,
    redirect_policy: redirect::Policy,
) -> AppResult<Client> {
    let mut builder = Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .redirect(redirect_policy)
        .no_proxy();

    if let Some(config) = proxy_config {
        if config.enabled && !config.url.is_empty() {
            match Proxy::all(&config.url) {
                Ok(proxy) => {
                    builder = builder.proxy(proxy);
                    tracing::info!("HTTP client upstream proxy enabled: {}", config.url);
                }
                Err(e) => {
                    tracing::error!("Invalid proxy address: {}, error: {}", config.url, e);
                }
            }
        }
    }

    Ok(builder.build()?)
}
