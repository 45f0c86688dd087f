//! `PranaServer` — axum HTTP + WebSocket gateway.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::hub::Hub;
use crate::websocket::session::run_ws_session;

/// Errors starting the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding or inspecting the listener failed.
    #[error("failed to bind listener: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The broadcast hub.
    pub hub: Arc<Hub>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus render handle.
    pub metrics: PrometheusHandle,
    /// Server configuration.
    pub config: ServerConfig,
}

/// The Prana gateway server.
pub struct PranaServer {
    config: ServerConfig,
    hub: Arc<Hub>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: PrometheusHandle,
}

impl PranaServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, metrics: PrometheusHandle) -> Self {
        Self {
            config,
            hub: Arc::new(Hub::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics,
        }
    }

    /// Build the axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
            config: self.config.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .route("/internal/notify", post(notify_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (port 0 auto-assigns) and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
        });

        info!(addr = %local_addr, "prana gateway listening");
        Ok((local_addr, handle))
    }

    /// Get the broadcast hub, the handle mutation handlers call
    /// `broadcast` on.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
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

/// Body of `POST /internal/notify`.
#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    /// Event type to broadcast.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload.
    #[serde(default)]
    pub data: Value,
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.hub.connection_count().await;
    Json(health::health_check(state.start_time, connections))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    crate::metrics::render(&state.metrics)
}

/// GET /ws — WebSocket upgrade into a channel session.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let open = state.hub.connection_count().await;
    if open >= state.config.max_connections {
        warn!(open, "refusing connection, channel limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let channel_id = Uuid::now_v7().to_string();
    let hub = state.hub.clone();
    let probe_interval = Duration::from_secs(state.config.probe_interval_secs);
    let buffer = state.config.channel_buffer;
    let cancel = state.shutdown.token();

    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            run_ws_session(socket, channel_id, hub, probe_interval, buffer, cancel)
        })
}

/// POST /internal/notify — broadcast on behalf of an out-of-process
/// collaborator (the storefront's mutation handlers call this after a
/// successful write).
async fn notify_handler(
    State(state): State<AppState>,
    Json(req): Json<NotifyRequest>,
) -> StatusCode {
    info!(event_type = %req.event_type, "internal notification received, broadcasting");
    state.hub.broadcast(req.data, &req.event_type).await;
    StatusCode::OK
}
