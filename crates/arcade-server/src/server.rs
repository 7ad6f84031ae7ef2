//! Axum HTTP + WebSocket front end.

use std::sync::Arc;

use arcade_core::ids::UserId;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::connection;
use crate::pipeline::Pipeline;
use crate::session::Session;

/// Shared state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

/// Query string of the WebSocket upgrade request.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub handle: Option<String>,
}

/// Health check response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub name: String,
    pub uptime_secs: u64,
    pub sessions: usize,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the listener and serve in the background.
pub async fn start(pipeline: Arc<Pipeline>) -> Result<ServerHandle, std::io::Error> {
    let socket = &pipeline.services().config.socket;
    let addr = format!("{}:{}", socket.host, socket.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let router = build_router(AppState { pipeline });
    let shutdown = CancellationToken::new();
    let stop = shutdown.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(stop.cancelled_owned())
            .await
        {
            tracing::error!(error = %e, "server stopped with error");
        }
    });

    tracing::info!(addr = %local_addr, "arcade server started");
    Ok(ServerHandle {
        port: local_addr.port(),
        shutdown,
        server,
    })
}

/// Handle returned by [`start`]; keeps the server task alive.
pub struct ServerHandle {
    pub port: u16,
    shutdown: CancellationToken,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting connections and wait for the server task to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = self.server.await;
    }
}

/// GET /ws?user_id=..&handle=..
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Response {
    if params.user_id.is_empty() {
        return (StatusCode::BAD_REQUEST, "user_id is required").into_response();
    }
    let socket_config = &state.pipeline.services().config.socket;
    let queue_size = socket_config.outgoing_queue_size;
    let max_message_size = socket_config.max_message_size_bytes;
    let handle = params.handle.unwrap_or_else(|| params.user_id.clone());
    let user_id = UserId::from_raw(params.user_id);

    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| async move {
            let (tx, rx) = mpsc::channel(queue_size);
            let session = Arc::new(Session::new(user_id, handle, tx));
            state.pipeline.services().registry.add(Arc::clone(&session));
            connection::run(socket, session, rx, state.pipeline).await;
        })
        .into_response()
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let services = state.pipeline.services();
    Json(HealthResponse {
        status: "healthy".into(),
        name: services.config.name.clone(),
        uptime_secs: services.started_at.elapsed().as_secs(),
        sessions: services.registry.count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::build_table;
    use crate::handlers::test_helpers::make_services;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn make_router() -> Router {
        let pipeline = Pipeline::new(make_services(), build_table().unwrap());
        build_router(AppState {
            pipeline: Arc::new(pipeline),
        })
    }

    #[tokio::test]
    async fn health_endpoint_reports_sessions() {
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = make_router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000)
            .await
            .unwrap();
        let parsed: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.status, "healthy");
        assert_eq!(parsed.sessions, 0);
        assert_eq!(parsed.name, "arcade");
    }

    #[tokio::test]
    async fn ws_requires_upgrade() {
        let req = Request::builder()
            .uri("/ws?user_id=u1")
            .body(Body::empty())
            .unwrap();
        let resp = make_router().oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let req = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();
        let resp = make_router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
