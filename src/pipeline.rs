//! Request orchestration.
//!
//! One ingestion request walks a fixed sequence of stages:
//!
//! ```text
//! RECEIVED -> WRITTEN -> EXTRACTED -> TABLE_BUILT -> PREDICTED -> RESPONDED
//!                                  \-> INSUFFICIENT ------------^
//! ```
//!
//! Insufficient data short-circuits to the response with a distinct
//! sentinel outcome. Every other stage failure aborts the request; only
//! the extraction stage is retried, and only within its bounded policy.
//! The whole flow holds the session's lock so concurrent requests for the
//! same session id never interleave.

use crate::config::Config;
use crate::error::PipelineError;
use crate::extract::{extract_with_retry, FeatureExtractor, RetryPolicy};
use crate::features::{self, BuildOutcome, FeatureSeries};
use crate::model::{remap_stage, Classifier};
use crate::session::{SensorBatch, SessionLocks, SessionStore, SessionWriter};
use std::sync::Arc;
use std::time::Duration;

/// Stages of one request, in order. Used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Written,
    Extracted,
    TableBuilt,
    Insufficient,
    Predicted,
    Responded,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Written => "written",
            Stage::Extracted => "extracted",
            Stage::TableBuilt => "table_built",
            Stage::Insufficient => "insufficient",
            Stage::Predicted => "predicted",
            Stage::Responded => "responded",
        }
    }
}

/// Terminal result of a request that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Trailing window of external stage codes, most recent last.
    Predictions(Vec<u8>),
    /// The session does not yet have enough settled epochs.
    InsufficientData { epochs: usize, required: usize },
}

/// Tunables the pipeline needs from the agent configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub session_start_threshold_secs: f64,
    pub min_epochs: usize,
    pub settle_epochs: usize,
    pub response_window: usize,
    pub retry: RetryPolicy,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            session_start_threshold_secs: config.session_start_threshold_secs,
            min_epochs: config.min_epochs,
            settle_epochs: config.settle_epochs,
            response_window: config.response_window,
            retry: RetryPolicy {
                retries: config.extraction_retries,
                base_backoff: Duration::from_millis(config.extraction_backoff_ms),
            },
        }
    }
}

/// The stateful ingestion-to-inference pipeline.
pub struct Pipeline {
    store: SessionStore,
    extractor: Arc<dyn FeatureExtractor>,
    classifier: Arc<Classifier>,
    locks: SessionLocks,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        store: SessionStore,
        extractor: Arc<dyn FeatureExtractor>,
        classifier: Arc<Classifier>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            classifier,
            locks: SessionLocks::new(),
            config,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Full flow for one ingestion request: write the batch, re-extract
    /// the session's features, rebuild the table and predict.
    pub async fn handle_batch(
        &self,
        session_id: &str,
        batch: &SensorBatch,
    ) -> Result<PipelineOutcome, PipelineError> {
        batch.validate()?;
        tracing::debug!(session_id, stage = Stage::Received.as_str());

        let _guard = self.locks.acquire(session_id).await;

        let writer = SessionWriter::new(&self.store, self.config.session_start_threshold_secs);
        let phase = writer.ingest(session_id, batch)?;
        tracing::info!(
            session_id,
            stage = Stage::Written.as_str(),
            phase = ?phase,
            accel_samples = batch.accel.timestamp.len(),
            hr_samples = batch.heart_rate.timestamp.len(),
        );

        extract_with_retry(
            Arc::clone(&self.extractor),
            session_id,
            self.store.root(),
            self.config.retry,
        )
        .await?;
        tracing::debug!(session_id, stage = Stage::Extracted.as_str());

        self.predict_current(session_id).await
    }

    /// Rebuild the table and predict over the series already on disk.
    /// Used by the offline CLI; takes the session lock itself.
    pub async fn predict_existing(
        &self,
        session_id: &str,
    ) -> Result<PipelineOutcome, PipelineError> {
        let _guard = self.locks.acquire(session_id).await;
        self.predict_current(session_id).await
    }

    async fn predict_current(
        &self,
        session_id: &str,
    ) -> Result<PipelineOutcome, PipelineError> {
        let series = FeatureSeries::load(&self.store, session_id)?;

        let table = match features::build(
            &series,
            self.config.min_epochs,
            self.config.settle_epochs,
        )? {
            BuildOutcome::Table(table) => table,
            BuildOutcome::Insufficient { epochs, required } => {
                tracing::info!(
                    session_id,
                    stage = Stage::Insufficient.as_str(),
                    epochs,
                    required,
                );
                return Ok(PipelineOutcome::InsufficientData { epochs, required });
            }
        };
        tracing::debug!(
            session_id,
            stage = Stage::TableBuilt.as_str(),
            rows = table.len(),
        );

        let codes: Vec<u8> = self
            .classifier
            .predict(table.rows())
            .into_iter()
            .map(remap_stage)
            .collect();
        self.store.write_predictions(session_id, &codes)?;
        tracing::info!(
            session_id,
            stage = Stage::Predicted.as_str(),
            epochs = codes.len(),
        );

        let start = codes.len().saturating_sub(self.config.response_window);
        Ok(PipelineOutcome::Predictions(codes[start..].to_vec()))
    }
}
