//! `RelayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use relay_core::{RoomAccessPolicy, TokenVerifier};
use relay_store::{MessageService, RoomService, UserService};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api;
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::metrics;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::hub::Hub;
use crate::websocket::session::SessionDeps;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connection registry.
    pub hub: Hub,
    /// Registration and login.
    pub users: Arc<UserService>,
    /// Room lifecycle.
    pub rooms: Arc<RoomService>,
    /// Message gateway and history.
    pub messages: Arc<MessageService>,
    /// Bearer token verification.
    pub verifier: Arc<dyn TokenVerifier>,
    /// Room access decisions for `/ws`.
    pub access: Arc<dyn RoomAccessPolicy>,
    /// Handed to every room connection.
    pub session: SessionDeps,
    /// Transport messages above this size close the connection.
    pub max_message_size: usize,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The relay server.
pub struct RelayServer {
    config: ServerConfig,
    state: AppState,
    shutdown: Arc<ShutdownCoordinator>,
    hub_task: Option<JoinHandle<()>>,
}

impl RelayServer {
    /// Assemble a server from its parts. See [`crate::app::build`].
    pub fn new(
        config: ServerConfig,
        state: AppState,
        shutdown: Arc<ShutdownCoordinator>,
        hub_task: JoinHandle<()>,
    ) -> Self {
        Self {
            config,
            state,
            shutdown,
            hub_task: Some(hub_task),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(api::ws_handler))
            .nest("/api", api::routes())
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind and serve until the shutdown token fires.
    ///
    /// Returns the bound address and the serving task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "http server failed");
            }
        });
        info!(%addr, "relay server listening");
        Ok((addr, handle))
    }

    /// Take the hub coordinator task so it can be awaited during shutdown.
    pub fn take_hub_task(&mut self) -> Option<JoinHandle<()>> {
        self.hub_task.take()
    }

    /// Get the connection registry.
    pub fn hub(&self) -> &Hub {
        &self.state.hub
    }

    /// Get the shared handler state.
    pub fn state(&self) -> &AppState {
        &self.state
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
    Json(health::health_check(state.start_time, state.hub.total_connections()))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use relay_settings::RelaySettings;
    use tower::ServiceExt;

    fn make_server(metrics: Option<PrometheusHandle>) -> RelayServer {
        let mut settings = RelaySettings::default();
        settings.auth.password_memory_kib = 1024;
        settings.auth.password_iterations = 1;
        crate::app::build(&settings, ServerConfig::default(), metrics).unwrap()
    }

    async fn call(app: Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        let parsed = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, parsed)
    }

    fn post_json(uri: &str, token: Option<&str>, body: &serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", token);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_with(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn register(server: &RelayServer, name: &str) -> String {
        let (status, body) = call(
            server.router(),
            post_json("/api/register", None, &serde_json::json!({"username": name, "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn server_with_default_config() {
        let server = make_server(None);
        assert_eq!(server.config().host, "127.0.0.1");
        assert_eq!(server.config().port, 0);
        assert!(!server.shutdown().is_shutting_down());
        assert_eq!(server.hub().total_connections(), 0);
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let server = make_server(None);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = call(server.router(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn metrics_endpoint_needs_a_recorder() {
        let server = make_server(None);
        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let handle = PrometheusBuilder::new().build_recorder().handle();
        let server = make_server(Some(handle));
        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server(None);
        let req = Request::builder().uri("/nonexistent").body(Body::empty()).unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn register_then_login() {
        let server = make_server(None);
        let _ = register(&server, "alice").await;

        let (status, body) = call(
            server.router(),
            post_json("/api/login", None, &serde_json::json!({"username": "alice", "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["user"]["username"], "alice");

        let (status, body) = call(
            server.router(),
            post_json("/api/login", None, &serde_json::json!({"username": "alice", "password": "wrong-pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentication failed");
        assert_eq!(body["message"], "invalid credentials");
    }

    #[tokio::test]
    async fn malformed_json_is_a_400_envelope() {
        let server = make_server(None);
        let req = Request::builder()
            .method("POST")
            .uri("/api/register")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = call(server.router(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid JSON");
    }

    #[tokio::test]
    async fn rooms_require_authorization() {
        let server = make_server(None);
        let req = Request::builder().uri("/api/rooms").body(Body::empty()).unwrap();
        let (status, body) = call(server.router(), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Missing Authorization header");

        let (status, _) = call(server.router(), get_with("/api/rooms", "garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn private_room_flow() {
        let server = make_server(None);
        let owner = register(&server, "owner").await;
        let guest = register(&server, "guest").await;

        let (status, body) = call(
            server.router(),
            post_json("/api/rooms", Some(&owner), &serde_json::json!({"name": "secret", "is_private": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let room_id = body["data"]["id"].as_u64().unwrap();
        let code = body["data"]["invite_code"].as_str().unwrap().to_string();

        let (_, body) = call(server.router(), get_with("/api/rooms", &guest)).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let uri = format!("/api/messages?roomId={room_id}");
        let (status, _) = call(server.router(), get_with(&uri, &guest)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(
            server.router(),
            post_json("/api/rooms/join", Some(&guest), &serde_json::json!({"invite_code": code})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(server.router(), get_with(&uri, &guest)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_room_rules() {
        let server = make_server(None);
        let owner = register(&server, "owner").await;
        let other = register(&server, "other").await;

        let (_, body) = call(
            server.router(),
            post_json("/api/rooms", Some(&owner), &serde_json::json!({"name": "temp"})),
        )
        .await;
        let room_id = body["data"]["id"].as_u64().unwrap();

        let delete = |token: &str, id: String| {
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/rooms/{id}"))
                .header("authorization", token)
                .body(Body::empty())
                .unwrap()
        };

        let (status, _) = call(server.router(), delete(&owner, "1".into())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(server.router(), delete(&other, room_id.to_string())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(server.router(), delete(&owner, "abc".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = call(server.router(), delete(&owner, room_id.to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["message"], "Room deleted successfully");
        let (status, _) = call(server.router(), delete(&owner, room_id.to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ws_rejects_before_upgrade() {
        let server = make_server(None);
        let token = register(&server, "alice").await;

        let req = Request::builder().uri("/ws?token=x").body(Body::empty()).unwrap();
        let (status, body) = call(server.router(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "roomId query parameter is required");

        let req = Request::builder().uri("/ws?roomId=1&token=bad").body(Body::empty()).unwrap();
        let (status, _) = call(server.router(), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let uri = format!("/ws?roomId=99&token={token}");
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, _) = call(server.router(), req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn room_count_reports_live_connections() {
        let server = make_server(None);
        let token = register(&server, "alice").await;
        let (status, body) = call(server.router(), get_with("/api/rooms/1/count", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["room_id"], 1);
        assert_eq!(body["data"]["connections"], 0);
    }
}
