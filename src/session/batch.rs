//! Sensor batch types and validation.
//!
//! A batch is the unit of ingestion: one POST from the watch carrying a few
//! minutes of accelerometer and heart-rate samples. Batches are ephemeral;
//! they exist only until their samples are written to the session logs.

use crate::error::PipelineError;
use serde::Deserialize;

/// Wire format of the ingestion endpoint body.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub accel_timestamp: Vec<f64>,
    #[serde(rename = "heartRate")]
    pub heart_rate: Vec<f64>,
    #[serde(rename = "heartRate_timestamp")]
    pub heart_rate_timestamp: Vec<f64>,
    #[serde(rename = "absoluteStartTime")]
    pub absolute_start_time: Option<f64>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Accelerometer samples, one reading per index across all four arrays.
#[derive(Debug, Clone)]
pub struct AccelBatch {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub timestamp: Vec<f64>,
}

/// Heart-rate samples, one reading per index across both arrays.
#[derive(Debug, Clone)]
pub struct HeartRateBatch {
    pub hr: Vec<f64>,
    pub timestamp: Vec<f64>,
}

/// One ingested sensor batch.
#[derive(Debug, Clone)]
pub struct SensorBatch {
    pub accel: AccelBatch,
    pub heart_rate: HeartRateBatch,
    /// Wall-clock start of the recording, epoch seconds. Used only by
    /// offline comparison tooling.
    pub absolute_start_time: Option<f64>,
}

/// Whether a batch opens a fresh session or continues an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// First batch of a recording: session logs are rewritten.
    Fresh,
    /// Later batch: samples are appended to the existing logs.
    Continuing,
}

impl From<IngestRequest> for SensorBatch {
    fn from(req: IngestRequest) -> Self {
        Self {
            accel: AccelBatch {
                x: req.x,
                y: req.y,
                z: req.z,
                timestamp: req.accel_timestamp,
            },
            heart_rate: HeartRateBatch {
                hr: req.heart_rate,
                timestamp: req.heart_rate_timestamp,
            },
            absolute_start_time: req.absolute_start_time,
        }
    }
}

impl SensorBatch {
    /// Check array shapes before any side effect.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let n = self.accel.timestamp.len();
        if self.accel.x.len() != n || self.accel.y.len() != n || self.accel.z.len() != n {
            return Err(PipelineError::Validation(format!(
                "accelerometer arrays have mismatched lengths (x: {}, y: {}, z: {}, timestamp: {})",
                self.accel.x.len(),
                self.accel.y.len(),
                self.accel.z.len(),
                n
            )));
        }
        if n == 0 {
            return Err(PipelineError::Validation(
                "accelerometer batch is empty".to_string(),
            ));
        }
        if self.heart_rate.hr.len() != self.heart_rate.timestamp.len() {
            return Err(PipelineError::Validation(format!(
                "heart-rate arrays have mismatched lengths (HR: {}, timestamp: {})",
                self.heart_rate.hr.len(),
                self.heart_rate.timestamp.len()
            )));
        }
        Ok(())
    }

    /// Decide whether this batch starts a fresh session.
    ///
    /// Batch timestamps are relative to the start of the recording, so a
    /// first timestamp close to zero means the watch just started a new
    /// recording and any logs left over from a prior one must be replaced.
    pub fn phase(&self, session_start_threshold_secs: f64) -> SessionPhase {
        if self.first_accel_timestamp() < session_start_threshold_secs {
            SessionPhase::Fresh
        } else {
            SessionPhase::Continuing
        }
    }

    /// First accelerometer timestamp. Callers must validate first.
    pub fn first_accel_timestamp(&self) -> f64 {
        self.accel.timestamp[0]
    }

    /// Last accelerometer timestamp. Callers must validate first.
    pub fn last_accel_timestamp(&self) -> f64 {
        self.accel.timestamp[self.accel.timestamp.len() - 1]
    }
}
