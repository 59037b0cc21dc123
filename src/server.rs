//! HTTP server for receiving wearable sensor batches.
//!
//! This module provides an HTTP server that:
//! - Accepts accelerometer/heart-rate batches via POST /data
//! - Runs them through the ingestion-to-inference pipeline
//! - Returns the trailing window of predicted sleep stages
//!
//! # Architecture
//!
//! ```text
//! Watch ──→ POST /data ──→ session logs ──→ [extract] ──→ table ──→ classifier
//!                                                                      ↓
//!                              {predictions: [...]} ←── trailing window
//! ```

use crate::clock::{session_id_for, Clock, SystemClock};
use crate::config::Config;
use crate::error::PipelineError;
use crate::extract::CommandExtractor;
use crate::model::Classifier;
use crate::pipeline::{Pipeline, PipelineConfig, PipelineOutcome, Stage};
use crate::session::{IngestRequest, SensorBatch, SessionStore};
use axum::{
    extract::rejection::JsonRejection,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Shared server state.
pub struct ServerState {
    pipeline: Pipeline,
    clock: Box<dyn Clock>,
}

impl ServerState {
    /// Build the state from configuration: load the classifier once and
    /// wire up the extraction command.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        Self::with_clock(config, Box::new(SystemClock))
    }

    pub fn with_clock(config: &Config, clock: Box<dyn Clock>) -> Result<Self, PipelineError> {
        let classifier = Arc::new(Classifier::load(&config.model_path)?);

        let command = config.extractor_command.clone().ok_or_else(|| {
            PipelineError::Configuration("no extractor command configured".to_string())
        })?;
        let extractor = Arc::new(CommandExtractor::new(
            command,
            Duration::from_secs(config.extraction_timeout_secs),
        ));

        let store = SessionStore::new(&config.data_dir);
        store.ensure_layout()?;

        let pipeline = Pipeline::new(
            store,
            extractor,
            classifier,
            PipelineConfig::from_config(config),
        );

        Ok(Self { pipeline, clock })
    }

    fn default_session_id(&self) -> String {
        session_id_for(self.clock.now())
    }
}

/// Response from the ingestion endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionsResponse {
    pub predictions: Vec<u8>,
}

/// Message-only response body.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

fn message(text: &str) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.to_string(),
    })
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /data
///
/// Accepts one sensor batch, runs the full pipeline, and returns the
/// trailing window of predicted stages.
async fn ingest(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<PredictionsResponse>, (StatusCode, Json<MessageResponse>)> {
    let Json(request) = body.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            message(&format!("Request was not JSON: {e}")),
        )
    })?;

    let request_id = uuid::Uuid::new_v4();
    let session_id = request
        .session_id
        .clone()
        .unwrap_or_else(|| state.default_session_id());
    let batch = SensorBatch::from(request);

    match state.pipeline.handle_batch(&session_id, &batch).await {
        Ok(PipelineOutcome::Predictions(predictions)) => {
            tracing::info!(
                %request_id,
                session_id,
                stage = Stage::Responded.as_str(),
                window = predictions.len(),
            );
            Ok(Json(PredictionsResponse { predictions }))
        }
        Ok(PipelineOutcome::InsufficientData { epochs, required }) => {
            // An expected outcome, but one the caller must be able to tell
            // apart from "predicted wake for all epochs".
            tracing::info!(%request_id, session_id, epochs, required, "not enough data");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                message("not enough data to make prediction"),
            ))
        }
        Err(e) => {
            tracing::error!(%request_id, session_id, "pipeline failed: {e}");
            Err((status_for(&e), message(&e.to_string())))
        }
    }
}

fn status_for(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// POST /sleep_data
///
/// Persists externally recorded sleep stages verbatim, for offline
/// comparison against the model's output.
async fn receive_sleep_data(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<MessageResponse>)> {
    let Json(data) = body.map_err(|_| {
        (StatusCode::BAD_REQUEST, message("Request was not JSON"))
    })?;

    let session_id = state.default_session_id();
    state
        .pipeline
        .store()
        .write_reference_data(&session_id, &data)
        .map_err(|e| {
            tracing::error!(session_id, "saving sleep data failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                message("Internal Server Error"),
            )
        })?;

    tracing::info!(session_id, "reference sleep data saved");
    Ok(message("Sleep data saved successfully"))
}

/// Run the HTTP server.
pub async fn run(
    config: Config,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::from_config(&config)?);
    run_with_state(state, config.port).await
}

/// Run the HTTP server with prebuilt state (used by tests to inject a
/// fixed clock).
pub async fn run_with_state(
    state: Arc<ServerState>,
    port: u16,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = Router::new()
        .route("/health", get(health))
        .route("/data", post(ingest))
        .route("/sleep_data", post(receive_sleep_data))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Sleep-stage agent listening on http://{}", actual_addr);

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
