//! `NsmuxServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use nsmux_core::{ConnectionId, HubConfig, NamespaceHub, Transport};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::health::{HealthResponse, Uptime};
use crate::metrics::WS_REJECTED_TOTAL;
use crate::origin::{Authorizer, origin_allowed};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::pool::ConnectionPool;
use crate::websocket::session::{SessionSettings, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Routing engine and emit API.
    pub hub: Arc<NamespaceHub>,
    /// Live connections.
    pub pool: Arc<ConnectionPool>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Optional upgrade auth hook.
    pub authorizer: Option<Arc<Authorizer>>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Prometheus handle for `/metrics`, if a recorder was installed.
    pub metrics: Option<PrometheusHandle>,
    /// Server start.
    pub uptime: Uptime,
}

/// The nsmux server.
pub struct NsmuxServer {
    config: Arc<ServerConfig>,
    hub: Arc<NamespaceHub>,
    pool: Arc<ConnectionPool>,
    shutdown: Arc<ShutdownCoordinator>,
    authorizer: Option<Arc<Authorizer>>,
    metrics: Option<PrometheusHandle>,
    uptime: Uptime,
}

impl NsmuxServer {
    /// Create a server whose hub routes through the server's connection pool.
    pub fn new(config: ServerConfig, hub_config: HubConfig) -> Self {
        let pool = Arc::new(ConnectionPool::new(config.max_connections));
        let transport: Arc<dyn Transport> = pool.clone();
        let hub = Arc::new(NamespaceHub::new(hub_config, transport));
        Self {
            config: Arc::new(config),
            hub,
            pool,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            authorizer: None,
            metrics: None,
            uptime: Uptime::start(),
        }
    }

    /// Reject upgrades for which `authorizer` returns `false` (HTTP 401).
    #[must_use]
    pub fn with_authorizer<F>(mut self, authorizer: F) -> Self
    where
        F: Fn(&HeaderMap) -> bool + Send + Sync + 'static,
    {
        self.authorizer = Some(Arc::new(authorizer));
        self
    }

    /// Serve `GET /metrics` from this Prometheus handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            pool: self.pool.clone(),
            config: self.config.clone(),
            authorizer: self.authorizer.clone(),
            shutdown: self.shutdown.clone(),
            metrics: self.metrics.clone(),
            uptime: self.uptime,
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route(&self.config.path, get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(%addr, path = %self.config.path, "nsmux listening");
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        });
        Ok((addr, handle))
    }

    /// Stop accepting, close every connection and wait for `handles`.
    pub async fn shutdown_gracefully(
        &self,
        handles: Vec<JoinHandle<()>>,
        timeout: Option<Duration>,
    ) -> bool {
        self.shutdown
            .graceful_shutdown(&self.pool, handles, timeout)
            .await
    }

    /// Get the namespace hub.
    pub fn hub(&self) -> &Arc<NamespaceHub> {
        &self.hub
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::collect(
        &state.uptime,
        &state.hub,
        &state.pool,
        state.shutdown.is_shutting_down(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// GET `<path>`: admission checks, then the WebSocket upgrade.
async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if let Some(authorizer) = &state.authorizer {
        if !authorizer(&headers) {
            counter!(WS_REJECTED_TOTAL, "reason" => "unauthorized").increment(1);
            debug!("upgrade rejected by authorizer");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }
    if !origin_allowed(&headers, &state.config.allowed_origins) {
        counter!(WS_REJECTED_TOTAL, "reason" => "origin").increment(1);
        debug!(origin = ?headers.get(axum::http::header::ORIGIN), "upgrade rejected, origin not allowed");
        return StatusCode::FORBIDDEN.into_response();
    }
    if state.pool.is_full() {
        counter!(WS_REJECTED_TOTAL, "reason" => "capacity").increment(1);
        warn!(max = state.config.max_connections, "upgrade rejected, connection limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let conn_id = ConnectionId::generate();
    let settings = SessionSettings::from(state.config.as_ref());
    let token = state.shutdown.token();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            run_ws_session(socket, conn_id, state.hub, state.pool, settings, token)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn make_server() -> NsmuxServer {
        let hub_config = HubConfig::new().on(
            "message",
            |_: &ConnectionId, _: serde_json::Value, _: &NamespaceHub| {},
        );
        NsmuxServer::new(ServerConfig::default(), hub_config)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or_default())
    }

    fn ws_request(origin: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/ws");
        if let Some(origin) = origin {
            builder = builder.header("origin", origin);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn hub_registers_declared_namespaces() {
        let server = make_server();
        assert_eq!(
            server.hub().namespaces(),
            vec!["default", "default/message"]
        );
        assert_eq!(server.pool().connection_count(), 0);
        assert!(!server.shutdown().is_shutting_down());
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (status, body) = get_json(make_server().router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert_eq!(body["namespaces"], 2);
        assert_eq!(body["subscriptions"], 0);
        assert!(body["started_at"].is_string());
        assert!(body["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn health_reports_draining_after_shutdown() {
        let server = make_server();
        server.shutdown().shutdown();
        let (status, body) = get_json(server.router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "draining");
    }

    #[tokio::test]
    async fn metrics_without_recorder_is_404() {
        let resp = make_server()
            .router()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_with_handle_renders_text() {
        let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle();
        let resp = make_server()
            .with_metrics(handle)
            .router()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let (status, _) = get_json(make_server().router(), "/nonexistent").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn authorizer_rejects_with_401() {
        let app = make_server()
            .with_authorizer(|headers: &HeaderMap| headers.contains_key("x-token"))
            .router();
        let resp = app.oneshot(ws_request(None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn disallowed_origin_rejected_with_403() {
        let config = ServerConfig {
            allowed_origins: vec!["localhost:3000".into()],
            ..ServerConfig::default()
        };
        let app = NsmuxServer::new(config, HubConfig::new()).router();
        let resp = app
            .oneshot(ws_request(Some("http://evil.example")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn plain_get_without_upgrade_is_rejected() {
        let app = make_server().router();
        let resp = app.oneshot(ws_request(None)).await.unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn custom_path_is_routed() {
        let config = ServerConfig {
            path: "/live".into(),
            allowed_origins: vec!["localhost:3000".into()],
            ..ServerConfig::default()
        };
        let app = NsmuxServer::new(config, HubConfig::new()).router();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/live")
                    .header("origin", "http://nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn listen_binds_ephemeral_port_and_stops_on_shutdown() {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let server = NsmuxServer::new(config, HubConfig::new());
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);

        assert!(
            server
                .shutdown_gracefully(vec![handle], Some(Duration::from_secs(5)))
                .await
        );
    }
}
