//! `MirrorServer`: Axum HTTP + `WebSocket` host for sessions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use futures::StreamExt;
use metrics_exporter_prometheus::PrometheusHandle;
use mirror_core::{ErrorSink, ObjectGraph, TracingErrorSink};
use mirror_settings::{MirrorSettings, ServerSettings, SessionSettings};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::errors::{CloseReason, ServerError};
use crate::health::{self, HealthResponse};
use crate::registry::SessionRegistry;
use crate::session::Session;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::{WsConnection, ws_events};

/// Presentation hints from the connect URL (`/ws?w=1024&h=768`).
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Viewport width.
    pub w: Option<f64>,
    /// Viewport height.
    pub h: Option<f64>,
}

impl ConnectParams {
    /// Session settings with the viewport hints applied. Non-positive or
    /// non-finite hints are ignored.
    pub fn apply(&self, base: &SessionSettings) -> SessionSettings {
        let valid = |v: Option<f64>| v.filter(|x| x.is_finite() && *x > 0.0);
        let mut settings = base.clone();
        if let Some(w) = valid(self.w) {
            settings.initial_width = w;
        }
        if let Some(h) = valid(self.h) {
            settings.initial_height = h;
        }
        settings
    }
}

/// Builds the object graph a new connection will mirror.
pub type GraphFactory = Arc<dyn Fn(&ConnectParams) -> Arc<dyn ObjectGraph> + Send + Sync>;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    factory: GraphFactory,
    session: SessionSettings,
    registry: Arc<SessionRegistry>,
    shutdown: ShutdownCoordinator,
    errors: Arc<dyn ErrorSink>,
    metrics: Option<PrometheusHandle>,
    sessions: TaskTracker,
    start_time: Instant,
}

/// Hosts one [`Session`] per `WebSocket` connection.
pub struct MirrorServer {
    settings: ServerSettings,
    state: AppState,
}

impl MirrorServer {
    /// Create a server that builds each connection's graph with `factory`.
    pub fn new(settings: &MirrorSettings, factory: GraphFactory) -> Self {
        Self {
            settings: settings.server.clone(),
            state: AppState {
                factory,
                session: settings.session.clone(),
                registry: Arc::new(SessionRegistry::new()),
                shutdown: ShutdownCoordinator::new(),
                errors: Arc::new(TracingErrorSink),
                metrics: None,
                sessions: TaskTracker::new(),
                start_time: Instant::now(),
            },
        }
    }

    /// Route session error reports to `sink`.
    #[must_use]
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.state.errors = sink;
        self
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.state.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = format!("{}:{}", self.settings.host, self.settings.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "mirror server listening");

        let router = self.router();
        let token = self.state.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        });
        Ok((local_addr, handle))
    }

    /// Signal shutdown, then wait for the serve task and every session task
    /// to finish, up to the configured timeout.
    pub async fn stop(&self, server: JoinHandle<()>) {
        let timeout = Duration::from_secs(self.settings.shutdown_timeout_secs);
        let deadline = tokio::time::Instant::now() + timeout;
        self.state.shutdown.graceful_shutdown(vec![server], timeout).await;

        let sessions = &self.state.sessions;
        let _ = sessions.close();
        if tokio::time::timeout_at(deadline, sessions.wait()).await.is_err() {
            warn!(
                remaining = sessions.len(),
                "sessions still running after shutdown timeout"
            );
            return;
        }
        info!("all sessions closed");
    }

    /// The shutdown coordinator every session links to.
    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.state.shutdown
    }

    /// Live sessions.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.state.registry
    }

    /// Listener settings.
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }
}

/// GET /ws
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Response {
    if state.shutdown.is_shutting_down() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let sessions = state.sessions.clone();
    ws.on_upgrade(move |socket| sessions.track_future(handle_socket(socket, params, state)))
}

async fn handle_socket(socket: WebSocket, params: ConnectParams, state: AppState) {
    let (sink, stream) = socket.split();
    let connection = Arc::new(WsConnection::new(sink));
    let graph = (state.factory)(&params);

    let session = Session::new(
        graph,
        connection.clone(),
        params.apply(&state.session),
        &state.shutdown.token(),
    )
    .with_error_sink(Arc::clone(&state.errors));
    let handle = session.handle();
    state.registry.add(handle.clone()).await;

    let outcome = session.run(ws_events(stream)).await;

    let _ = state.registry.remove(handle.id()).await;
    if !matches!(outcome, Ok(CloseReason::PeerClosed)) {
        connection.close().await;
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let sessions = state.registry.session_count().await;
    Json(health::health_check(
        state.start_time,
        sessions,
        state.shutdown.is_shutting_down(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockGraph;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    fn factory() -> GraphFactory {
        Arc::new(|_: &ConnectParams| Arc::new(MockGraph::new("root")) as Arc<dyn ObjectGraph>)
    }

    fn make_server() -> MirrorServer {
        MirrorServer::new(&MirrorSettings::default(), factory())
    }

    async fn get_path(app: Router, uri: &str) -> Response {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(req).await.unwrap()
    }

    #[tokio::test]
    async fn health_reports_sessions() {
        let server = make_server();
        let resp = get_path(server.router(), "/health").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["active_sessions"], 0);
    }

    #[tokio::test]
    async fn health_reports_shutdown() {
        let server = make_server();
        server.shutdown().shutdown();
        let resp = get_path(server.router(), "/health").await;
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "shutting_down");
    }

    #[tokio::test]
    async fn metrics_absent_without_recorder() {
        let resp = get_path(make_server().router(), "/metrics").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_rendered_with_recorder() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let server = make_server().with_metrics(handle);
        let resp = get_path(server.router(), "/metrics").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(
            resp.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
    }

    #[tokio::test]
    async fn ws_requires_upgrade() {
        let resp = get_path(make_server().router(), "/ws").await;
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let resp = get_path(make_server().router(), "/nonexistent").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listen_on_ephemeral_port_and_stop() {
        let mut settings = MirrorSettings::default();
        settings.server.port = 0;
        settings.server.shutdown_timeout_secs = 5;
        let server = MirrorServer::new(&settings, factory());

        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);

        server.stop(handle).await;
        assert!(server.shutdown().is_shutting_down());
    }

    #[tokio::test]
    async fn stop_joins_session_tasks() {
        let mut settings = MirrorSettings::default();
        settings.server.port = 0;
        settings.server.shutdown_timeout_secs = 5;
        let server = MirrorServer::new(&settings, factory());
        let (_, handle) = server.listen().await.unwrap();

        let finished = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let token = server.shutdown().token();
        let done = Arc::clone(&finished);
        let _ = server.state.sessions.spawn(async move {
            token.cancelled().await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            done.store(true, std::sync::atomic::Ordering::SeqCst);
        });

        server.stop(handle).await;
        assert!(finished.load(std::sync::atomic::Ordering::SeqCst));
        assert!(server.state.sessions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_gives_up_on_stuck_sessions() {
        let mut settings = MirrorSettings::default();
        settings.server.shutdown_timeout_secs = 1;
        let server = MirrorServer::new(&settings, factory());
        let _ = server.state.sessions.spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let start = tokio::time::Instant::now();
        server.stop(tokio::spawn(async {})).await;
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(server.state.sessions.len(), 1);
    }

    #[test]
    fn connect_params_override_viewport() {
        let base = SessionSettings::default();
        let params = ConnectParams {
            w: Some(1024.0),
            h: Some(-1.0),
        };
        let applied = params.apply(&base);
        assert!((applied.initial_width - 1024.0).abs() < f64::EPSILON);
        assert!((applied.initial_height - base.initial_height).abs() < f64::EPSILON);
    }

    #[test]
    fn connect_params_default_keeps_settings() {
        let base = SessionSettings::default();
        let applied = ConnectParams::default().apply(&base);
        assert!((applied.initial_width - base.initial_width).abs() < f64::EPSILON);
    }
}
