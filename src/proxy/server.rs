use crate::error::{AppError, AppResult};
use crate::proxy::auth::Authorizer;
use crate::proxy::config::ProxyConfig;
use crate::proxy::key_store::KeyStore;
use crate::proxy::upstream::UpstreamClient;
use axum::Router;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Axum application state
#[derive(Clone)]
pub struct AppState {
    pub authorizer: Arc<Authorizer>,
    pub upstream: Arc<UpstreamClient>,
}

impl AppState {
    pub fn new(config: &ProxyConfig, store: Arc<dyn KeyStore>) -> AppResult<Self> {
        Ok(Self {
            authorizer: Arc::new(Authorizer::new(store, config.same_origin_hosts())),
            upstream: Arc::new(UpstreamClient::new(
                config.request_timeout,
                Some(&config.upstream_proxy),
            )?),
        })
    }
}

/// Single catch-all route; branching happens in the router module
pub fn build_router(state: AppState) -> Router {
    use crate::proxy::{middleware, router};

    Router::new()
        .fallback(router::dispatch)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(middleware::cors_middleware))
        .with_state(state)
}

/// Axum server instance
pub struct AxumServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
    local_addr: std::net::SocketAddr,
}

impl AxumServer {
    /// Start Axum server
    pub async fn start(
        host: &str,
        port: u16,
        state: AppState,
    ) -> AppResult<(Self, tokio::task::JoinHandle<()>)> {
        let app = build_router(state);

        // Bind address
        let addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            AppError::Config(format!("Failed to bind address {}: {}", addr, e))
        })?;
        let local_addr = listener.local_addr()?;

        tracing::info!("CORS relay started at http://{}", local_addr);

        // Create shutdown channel
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        // Start server in new task
        let handle = tokio::spawn(async move {
            use hyper::server::conn::http1;
            use hyper_util::rt::TokioIo;
            use hyper_util::service::TowerToHyperService;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let service = TowerToHyperService::new(app.clone());

                                // Dropping the connection drops the handler future,
                                // which cancels any upstream call in flight.
                                tokio::task::spawn(async move {
                                    if let Err(err) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection handling finished or errored: {:?}", err);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {:?}", e);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::info!("CORS relay stopped listening");
                        break;
                    }
                }
            }
        });

        Ok((
            Self {
                shutdown_tx: Some(shutdown_tx),
                local_addr,
            },
            handle,
        ))
    }

    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// Stop server
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::key_store::MemoryKeyStore;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
        response::{AppendHeaders, IntoResponse, Json, Redirect},
        routing::{any, get},
    };
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Memory store that counts lookups
    struct CountingStore {
        inner: MemoryKeyStore,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl KeyStore for CountingStore {
        async fn get(&self, key: &str) -> AppResult<Option<String>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key).await
        }
    }

    /// Store whose backend is always unreachable
    struct UnreachableStore;

    #[async_trait]
    impl KeyStore for UnreachableStore {
        async fn get(&self, _key: &str) -> AppResult<Option<String>> {
            Err(AppError::Store("connection refused".to_string()))
        }
    }

    async fn echo(method: Method, headers: HeaderMap, body: String) -> impl IntoResponse {
        let value_of = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        (
            AppendHeaders([
                (header::SET_COOKIE, "a=1"),
                (header::SET_COOKIE, "b=2"),
                (header::HeaderName::from_static("x-upstream"), "yes"),
            ]),
            Json(serde_json::json!({
                "method": method.as_str(),
                "cookie": value_of("cookie"),
                "x_cookie": value_of("x-cookie"),
                "x_api_key": value_of("x-api-key"),
                "transfer_encoding": value_of("transfer-encoding"),
                "content_length": value_of("content-length"),
                "body": body,
            })),
        )
    }

    /// Throwaway upstream on an ephemeral port
    async fn spawn_upstream() -> String {
        let app = Router::new()
            .route("/echo", any(echo))
            .route("/redirect", get(|| async { Redirect::to("/echo") }))
            .route(
                "/teapot",
                get(|| async { (StatusCode::IM_A_TEAPOT, "short and stout") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn relay_app() -> (Router, Arc<CountingStore>) {
        let inner = MemoryKeyStore::new();
        inner.insert("fk-open", "enabled");
        inner.insert("fk-local", r#"{"urls": ["http://127.0.0.1:*"]}"#);
        inner.insert("fk-remote", r#"{"urls": ["https://api.example.com/*"]}"#);
        inner.insert("fk-app", r#"{"origins": ["https://app.test"]}"#);
        let store = Arc::new(CountingStore {
            inner,
            lookups: AtomicUsize::new(0),
        });

        let state = AppState::new(&ProxyConfig::default(), store.clone()).unwrap();
        (build_router(state), store)
    }

    fn relay_uri(target: &str, extra: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
        format!("/?url={}{}", encoded, extra)
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_preflight_skips_pipeline() {
        let (app, store) = relay_app();
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri(relay_uri("https://api.example.com/", ""))
            .header(header::ORIGIN, "https://app.test")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.test"
        );
        assert_eq!(response.headers()[header::ACCESS_CONTROL_MAX_AGE], "86400");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.is_empty());
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_landing_without_url_skips_pipeline() {
        let (app, store) = relay_app();
        let request = Request::builder()
            .uri("/?key=fk-invalid")
            .header(header::ORIGIN, "https://app.test")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.test"
        );
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_favicon_needs_no_key() {
        let (app, store) = relay_app();
        let request = Request::builder()
            .uri("/favicon.ico?url=https://api.example.com/")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/x-icon");
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_key_is_unauthorized_with_cors() {
        let (app, _) = relay_app();
        let request = Request::builder()
            .uri(relay_uri("https://api.example.com/", ""))
            .header(header::ORIGIN, "https://app.test")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.test"
        );
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );
        let body = json_body(response).await;
        assert_eq!(body["error"], "Unauthorized");
        assert_eq!(body["message"], "Missing API key");
    }

    #[tokio::test]
    async fn test_url_restriction_echoes_target() {
        let (app, _) = relay_app();
        let request = Request::builder()
            .uri(relay_uri("https://other.com/", "&key=fk-remote"))
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let body = json_body(response).await;
        assert!(body["message"].as_str().unwrap().contains("https://other.com/"));
    }

    #[tokio::test]
    async fn test_origin_restriction() {
        let (app, _) = relay_app();
        let request = Request::builder()
            .uri(relay_uri("http://127.0.0.1:1/", ""))
            .header("x-api-key", "fk-app")
            .header(header::ORIGIN, "https://evil.test")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert!(body["message"].as_str().unwrap().contains("https://evil.test"));
    }

    #[tokio::test]
    async fn test_undecodable_origin_is_not_same_origin() {
        let (app, _) = relay_app();
        let request = Request::builder()
            .uri(relay_uri("http://127.0.0.1:1/", ""))
            .header("x-api-key", "fk-app")
            .header(header::HOST, "localhost")
            .header(
                header::ORIGIN,
                HeaderValue::from_bytes(b"https://ev\xffil.test").unwrap(),
            )
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN].as_bytes(),
            b"https://ev\xffil.test"
        );
        let body = json_body(response).await;
        let message = body["message"].as_str().unwrap();
        assert!(message.starts_with("Origin 'https://ev"));
        assert!(message.contains("il.test' is not allowed"));
    }

    #[tokio::test]
    async fn test_store_failure_is_unauthorized() {
        let state = AppState::new(&ProxyConfig::default(), Arc::new(UnreachableStore)).unwrap();
        let request = Request::builder()
            .uri(relay_uri("https://api.example.com/", "&key=fk-any"))
            .body(Body::empty())
            .unwrap();

        let response = build_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let body = json_body(response).await;
        assert_eq!(body["error"], "Unauthorized");
        assert_eq!(body["message"], "API key validation failed");
    }

    #[tokio::test]
    async fn test_bad_targets() {
        let (app, _) = relay_app();

        let request = Request::builder()
            .uri(relay_uri("not a url", "&key=fk-open"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Invalid URL format");
        assert!(!body["message"].as_str().unwrap().is_empty());

        let request = Request::builder()
            .uri(relay_uri("ftp://files.example.com/", "&key=fk-open"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Invalid protocol");
        assert_eq!(body["message"], "Only http:// and https:// URLs are allowed");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_bad_gateway() {
        let (app, _) = relay_app();
        let request = Request::builder()
            .uri(relay_uri("http://127.0.0.1:1/", "&key=fk-local"))
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let body = json_body(response).await;
        assert_eq!(body["error"], "Proxy request failed");
        assert!(!body["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_passthrough_keeps_status_and_body() {
        let upstream = spawn_upstream().await;
        let (app, _) = relay_app();
        let request = Request::builder()
            .uri(relay_uri(&format!("{}/teapot", upstream), ""))
            .header("x-api-key", "fk-local")
            .header(header::ORIGIN, "https://app.test")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.test");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, PUT, DELETE, OPTIONS, PATCH"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "*");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"short and stout");
    }

    #[tokio::test]
    async fn test_expose_headers_match_upstream_names() {
        let upstream = spawn_upstream().await;
        let (app, _) = relay_app();
        let target = format!("{}/echo", upstream);

        let revealed = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(relay_uri(&target, "&reveal=headers&key=fk-local"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let payload = json_body(revealed).await;
        let upstream_names: BTreeSet<String> = payload["headers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|h| h["name"].as_str().unwrap().to_string())
            .collect();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(relay_uri(&target, "&key=fk-local"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let exposed: BTreeSet<String> = response.headers()[header::ACCESS_CONTROL_EXPOSE_HEADERS]
            .to_str()
            .unwrap()
            .split(", ")
            .map(str::to_string)
            .collect();

        assert!(exposed.contains("x-upstream"));
        assert!(exposed.contains("set-cookie"));
        assert_eq!(exposed, upstream_names);
        assert_eq!(response.headers().get_all(header::SET_COOKIE).iter().count(), 2);
    }

    #[tokio::test]
    async fn test_x_cookie_rewrite_for_get_and_post() {
        let upstream = spawn_upstream().await;
        let (app, _) = relay_app();
        let target = format!("{}/echo", upstream);

        for method in [Method::GET, Method::POST] {
            let body = if method == Method::POST {
                Body::from("payload=1")
            } else {
                Body::empty()
            };
            let request = Request::builder()
                .method(method.clone())
                .uri(relay_uri(&target, ""))
                .header("x-api-key", "fk-local")
                .header("x-cookie", "abc=1")
                .body(body)
                .unwrap();

            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let echoed = json_body(response).await;
            assert_eq!(echoed["method"], method.as_str());
            assert_eq!(echoed["cookie"], "abc=1");
            assert!(echoed["x_cookie"].is_null());
            assert!(echoed["x_api_key"].is_null());
            if method == Method::POST {
                assert_eq!(echoed["body"], "payload=1");
            } else {
                assert_eq!(echoed["body"], "");
            }
        }
    }

    #[tokio::test]
    async fn test_bodiless_methods_send_no_body() {
        let upstream = spawn_upstream().await;
        let (app, _) = relay_app();
        let target = format!("{}/echo", upstream);

        for method in [Method::DELETE, Method::PUT, Method::PATCH] {
            let request = Request::builder()
                .method(method.clone())
                .uri(relay_uri(&target, "&key=fk-local"))
                .body(Body::empty())
                .unwrap();

            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let echoed = json_body(response).await;
            assert_eq!(echoed["method"], method.as_str());
            assert!(echoed["transfer_encoding"].is_null());
            assert_eq!(echoed["body"], "");
        }
    }

    #[tokio::test]
    async fn test_reveal_mode_does_not_follow_redirects() {
        let upstream = spawn_upstream().await;
        let (app, _) = relay_app();
        let request = Request::builder()
            .uri(relay_uri(
                &format!("{}/redirect", upstream),
                "&reveal=headers&key=fk-local",
            ))
            .header(header::ORIGIN, "https://app.test")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.test"
        );

        let payload = json_body(response).await;
        assert_eq!(payload["status"], "303");
        let location = payload["headers"]
            .as_array()
            .unwrap()
            .iter()
            .find(|h| h["name"] == "location")
            .unwrap();
        assert_eq!(location["value"], "/echo");
    }

    #[tokio::test]
    async fn test_passthrough_follows_redirects() {
        let upstream = spawn_upstream().await;
        let (app, _) = relay_app();
        let request = Request::builder()
            .uri(relay_uri(&format!("{}/redirect", upstream), "&key=fk-local"))
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-upstream"], "yes");
        let echoed = json_body(response).await;
        assert_eq!(echoed["method"], "GET");
    }

    #[tokio::test]
    async fn test_server_start_and_stop() {
        let store = Arc::new(MemoryKeyStore::new());
        let state = AppState::new(&ProxyConfig::default(), store).unwrap();
        let (server, handle) = AxumServer::start("127.0.0.1", 0, state).await.unwrap();
        let addr = server.local_addr();

        let response = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap()
            .get(format!("http://{}/", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "*"
        );

        server.stop();
        handle.await.unwrap();
    }
}
