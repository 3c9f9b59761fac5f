//! HTTP server for keystroke windows and scoring reports.
//!
//! # Routes
//!
//! ```text
//! GET  /health                 liveness
//! POST /keystrokes             store one TelemetryRecord
//! GET  /profile/:subject_id    the subject's windows, oldest first
//! GET  /report/:subject_id     the subject's ResultSeries
//! ```

use crate::core::{analyze, ResultSeries, ScoringError, ScoringPolicy, TelemetryRecord, WindowAggregate};
use crate::store::WindowStore;
use crate::transparency::SharedTransparencyLog;
use crate::transport::WindowSink;
use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Thresholds applied by `/report`
    pub policy: ScoringPolicy,
}

impl ServerConfig {
    pub fn new(port: u16, policy: ScoringPolicy) -> Self {
        Self { port, policy }
    }
}

/// Shared server state
pub struct ServerState {
    store: Arc<WindowStore>,
    policy: ScoringPolicy,
    transparency: SharedTransparencyLog,
}

impl ServerState {
    pub fn new(
        store: Arc<WindowStore>,
        policy: ScoringPolicy,
        transparency: SharedTransparencyLog,
    ) -> Self {
        Self {
            store,
            policy,
            transparency,
        }
    }
}

/// Response from the submission endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub status: String,
    pub windows_stored: usize,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.to_string(),
        }),
    )
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /keystrokes
async fn submit(
    State(state): State<Arc<ServerState>>,
    Json(mut record): Json<TelemetryRecord>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let subject_id = record.subject_id.trim();
    if subject_id.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "MISSING_IDENTITY",
            "subjectId must not be empty",
        ));
    }
    record.subject_id = subject_id.to_string();

    match state.store.submit_window(&record).await {
        Ok(()) => state.transparency.record_window_submitted(),
        Err(e) => {
            // The window is in memory even if the file write failed.
            tracing::error!("failed to persist keystroke window: {}", e);
            state.transparency.record_submission_failed();
        }
    }

    Ok(Json(SubmitResponse {
        status: "ok".to_string(),
        windows_stored: state.store.history(&record.subject_id).len(),
    }))
}

/// GET /profile/:subject_id
async fn profile(
    State(state): State<Arc<ServerState>>,
    Path(subject_id): Path<String>,
) -> Json<Vec<WindowAggregate>> {
    Json(state.store.history(subject_id.trim()))
}

/// GET /report/:subject_id
async fn report(
    State(state): State<Arc<ServerState>>,
    Path(subject_id): Path<String>,
) -> Result<Json<ResultSeries>, ApiError> {
    let subject_id = subject_id.trim();
    let windows = state.store.history(subject_id);
    analyze(subject_id, &windows, &state.policy)
        .map(Json)
        .map_err(|e| match e {
            ScoringError::MissingIdentity => {
                api_error(StatusCode::BAD_REQUEST, "MISSING_IDENTITY", e.to_string())
            }
            ScoringError::InsufficientHistory { .. } => {
                api_error(StatusCode::UNPROCESSABLE_ENTITY, "NOT_ENOUGH_DATA", e.to_string())
            }
        })
}

/// Build the router over `state`.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/keystrokes", post(submit))
        .route("/profile/:subject_id", get(profile))
        .route("/report/:subject_id", get(report))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    store: Arc<WindowStore>,
    transparency: SharedTransparencyLog,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(store, config.policy, transparency));
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Keystroke telemetry server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
