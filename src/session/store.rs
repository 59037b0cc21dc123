//! Durable per-session file layout.
//!
//! Every session id owns a fixed set of files under the data directory:
//! raw motion and heart-rate logs, a label stub for the extraction
//! collaborator, optional start-time metadata, four feature series written
//! by the extractor, and a prediction log. All full-file rewrites go
//! through an atomic write-to-temp-then-rename publish so readers never
//! observe a half-written file.

use crate::error::PipelineError;
use std::fs;
use std::path::{Path, PathBuf};

/// The four feature series produced by the extraction collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Cosine,
    Count,
    HeartRate,
    Time,
}

impl SeriesKind {
    fn file_suffix(&self) -> &'static str {
        match self {
            SeriesKind::Cosine => "cosine_feature.out",
            SeriesKind::Count => "count_feature.out",
            SeriesKind::HeartRate => "hr_feature.out",
            SeriesKind::Time => "time_feature.out",
        }
    }
}

/// Path layout and low-level persistence for session files.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the per-kind subdirectories if they do not exist yet.
    pub fn ensure_layout(&self) -> Result<(), PipelineError> {
        for dir in [
            "motion",
            "heart_rate",
            "labels",
            "features",
            "results",
            "sleep_logs",
        ] {
            fs::create_dir_all(self.root.join(dir))?;
        }
        Ok(())
    }

    pub fn motion_log(&self, session_id: &str) -> PathBuf {
        self.root
            .join("motion")
            .join(format!("{session_id}_acceleration.txt"))
    }

    pub fn heart_rate_log(&self, session_id: &str) -> PathBuf {
        self.root
            .join("heart_rate")
            .join(format!("{session_id}_heartrate.txt"))
    }

    pub fn label_stub(&self, session_id: &str) -> PathBuf {
        self.root
            .join("labels")
            .join(format!("{session_id}_labeled_sleep.txt"))
    }

    pub fn start_time_meta(&self, session_id: &str) -> PathBuf {
        self.root
            .join("sleep_logs")
            .join(format!("start_time_{session_id}.json"))
    }

    pub fn reference_data(&self, session_id: &str) -> PathBuf {
        self.root
            .join("sleep_logs")
            .join(format!("sleep_data_{session_id}.json"))
    }

    pub fn feature_series(&self, session_id: &str, kind: SeriesKind) -> PathBuf {
        self.root
            .join("features")
            .join(format!("{session_id}_{}", kind.file_suffix()))
    }

    pub fn prediction_log(&self, session_id: &str) -> PathBuf {
        self.root
            .join("results")
            .join(format!("{session_id}_model_results.txt"))
    }

    /// Overwrite the session's prediction log with the full remapped
    /// sequence, one external stage code per line.
    pub fn write_predictions(
        &self,
        session_id: &str,
        codes: &[u8],
    ) -> Result<(), PipelineError> {
        let mut contents = String::with_capacity(codes.len() * 2);
        for code in codes {
            contents.push_str(&code.to_string());
            contents.push('\n');
        }
        write_atomic(&self.prediction_log(session_id), &contents)
    }

    /// Read the session's prediction log back, one code per line.
    pub fn read_predictions(&self, session_id: &str) -> Result<Vec<u8>, PipelineError> {
        let contents = fs::read_to_string(self.prediction_log(session_id))?;
        contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| {
                l.trim().parse::<u8>().map_err(|e| {
                    PipelineError::Storage(format!("malformed prediction log line '{l}': {e}"))
                })
            })
            .collect()
    }

    /// Persist externally recorded sleep-stage intervals verbatim for
    /// offline comparison.
    pub fn write_reference_data(
        &self,
        session_id: &str,
        data: &serde_json::Value,
    ) -> Result<(), PipelineError> {
        let json = serde_json::to_string_pretty(data)
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        write_atomic(&self.reference_data(session_id), &json)
    }
}

/// Write a full file atomically: write to a sibling temp file, then rename
/// over the target.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), PipelineError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
