//! `GatewayServer` — Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;

use tracing::{info, instrument, warn};

use flowgate_approval::ApprovalBroker;
use flowgate_artifacts::ArtifactLedger;
use flowgate_runtime::collaborator::RuntimeCollaborator;
use flowgate_runtime::manager::SessionManager;
use flowgate_settings::PreferencesStore;

use crate::auth::AuthStore;
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::rest;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::dispatch::run_connection;
use crate::websocket::registry::ConnectionRegistry;

/// Generates UUIDv7 request IDs.
#[derive(Clone)]
struct UuidV7RequestId;

impl MakeRequestId for UuidV7RequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::now_v7().to_string();
        axum::http::HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Shared state accessible from every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// Owns the live session set and drives it through the collaborator.
    pub session_manager: Arc<SessionManager>,
    /// Correlates pending tool approvals with client responses.
    pub approvals: Arc<ApprovalBroker>,
    /// Derived file-change timeline per session.
    pub artifacts: Arc<ArtifactLedger>,
    /// Persisted user preferences and custom bundle/behavior registries.
    pub preferences: Arc<PreferencesStore>,
    /// The server's single bearer token.
    pub auth: Arc<AuthStore>,
    /// Tracks every live connection and which connection owns which session.
    pub registry: Arc<ConnectionRegistry>,
    /// Server configuration.
    pub config: ServerConfig,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
}

/// The session-streaming gateway server.
pub struct GatewayServer {
    config: ServerConfig,
    state: AppState,
}

impl GatewayServer {
    /// Assemble the server from its constituent stores and the runtime
    /// collaborator that fronts the actual agent runtime.
    #[must_use]
    pub fn new(config: ServerConfig, collaborator: Arc<dyn RuntimeCollaborator>, transcripts: Arc<flowgate_events::TranscriptStore>) -> Self {
        let approvals = Arc::new(ApprovalBroker::new());
        let session_manager = Arc::new(SessionManager::new(collaborator, transcripts, approvals.clone()));
        let state = AppState {
            session_manager,
            approvals,
            artifacts: Arc::new(ArtifactLedger::new()),
            preferences: Arc::new(PreferencesStore::open(&config.state_root)),
            auth: Arc::new(AuthStore::open(&config.state_root)),
            registry: Arc::new(ConnectionRegistry::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            config: config.clone(),
        };
        Self { config, state }
    }

    /// Build the Axum router with all routes and middleware.
    ///
    /// `/ws` requires the service to be served via
    /// [`Router::into_make_service_with_connect_info`] (see [`Self::listen`])
    /// since its handler extracts the peer address; hitting it through a bare
    /// `Router::oneshot` in tests will fail the `ConnectInfo` extraction.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_upgrade_handler))
            .nest("/api", rest::router())
            .with_state(self.state.clone())
            // Outermost layers execute first on request, last on response.
            .layer(CatchPanicLayer::new())
            .layer(CompressionLayer::new())
            .layer(RequestBodyLimitLayer::new(self.config.max_message_size))
            .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(30)))
            .layer(SetRequestIdLayer::x_request_id(UuidV7RequestId))
            .layer(PropagateRequestIdLayer::x_request_id())
    }

    /// Bind to a TCP port and start serving. Returns the bound address and a
    /// join handle for the server task.
    #[instrument(skip_all, fields(host = %self.config.host, port = self.config.port))]
    pub async fn listen(&self) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), std::io::Error> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "server started");

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        let shutdown_token = self.state.shutdown.token();

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_token.cancelled().await;
                    info!("server shutdown initiated");
                })
                .await;
            info!("server shutdown complete");
        });

        Ok((bound_addr, handle))
    }

    /// Shared state, for wiring outside the server (e.g. signal handlers).
    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The shutdown coordinator.
    #[must_use]
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// The server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.registry.connection_count();
    let sessions = state.session_manager.active_count();
    Json(health::health_check(state.start_time, connections, sessions))
}

/// GET /ws — WebSocket upgrade handler.
async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, StatusCode> {
    let current = state.registry.connection_count();
    if current >= state.config.max_connections {
        warn!(current, max = state.config.max_connections, "connection limit reached, rejecting WebSocket upgrade");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    let connection_id = uuid::Uuid::now_v7().to_string();
    let max_message_size = state.config.max_message_size;

    Ok(ws
        .max_message_size(max_message_size)
        .on_upgrade(move |socket| run_connection(socket, connection_id, peer.ip(), Arc::new(state))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use flowgate_events::TranscriptStore;
    use flowgate_runtime::collaborator::{ExecuteRequest, MountPlan, SessionHandle, SessionSinks};
    use tower::ServiceExt;

    struct StubHandle;

    #[async_trait::async_trait]
    impl SessionHandle for StubHandle {
        async fn execute(&self, _request: ExecuteRequest) -> flowgate_runtime::errors::Result<()> {
            Ok(())
        }
        fn cancel(&self, _immediate: bool) {}
    }

    struct StubCollaborator;

    #[async_trait::async_trait]
    impl RuntimeCollaborator for StubCollaborator {
        async fn prepare(&self, bundle: &str, _behaviors: &[String], _provider_override: Option<serde_json::Value>) -> flowgate_runtime::errors::Result<MountPlan> {
            Ok(MountPlan::new(serde_json::json!({"bundle": bundle}), serde_json::json!({})))
        }

        async fn create_session(
            &self,
            _mount_plan: MountPlan,
            _sinks: SessionSinks,
            _cwd: Option<String>,
            _initial_transcript: Option<Vec<flowgate_events::TranscriptEntry>>,
        ) -> flowgate_runtime::errors::Result<Box<dyn SessionHandle>> {
            Ok(Box::new(StubHandle))
        }
    }

    fn make_server() -> GatewayServer {
        let dir = tempfile::tempdir().unwrap();
        let state_root = dir.path().to_path_buf();
        std::mem::forget(dir);
        let config = ServerConfig { state_root: state_root.clone(), ..ServerConfig::default() };
        let transcripts = Arc::new(TranscriptStore::new(state_root));
        let collaborator: Arc<dyn RuntimeCollaborator> = Arc::new(StubCollaborator);
        GatewayServer::new(config, collaborator, transcripts)
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert!(parsed["connections"].is_number());
        assert!(parsed["active_sessions"].is_number());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder().uri("/nonexistent").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn shutdown_coordinator_accessible() {
        let server = make_server();
        assert!(!server.shutdown().is_shutting_down());
    }

    #[tokio::test]
    async fn server_listen_binds_port() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();

        assert_ne!(addr.port(), 0);

        server.shutdown().shutdown();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn server_health_while_running() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();

        let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
        assert!(resp.status().is_success());

        server.shutdown().shutdown();
        let _ = handle.await;
    }
}
