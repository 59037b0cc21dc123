//! Reading the per-epoch feature series written by the extraction step.
//!
//! Each series file carries one float per line at epoch granularity. The
//! heart-rate file is special: newer extractor versions write two
//! space-separated values per line (standard deviation, mean) while older
//! ones write the standard deviation alone. A missing mean defaults to 0.0.

use crate::error::PipelineError;
use crate::session::store::{SeriesKind, SessionStore};
use std::path::Path;

/// The five aligned per-epoch feature series for one session.
#[derive(Debug, Clone)]
pub struct FeatureSeries {
    pub cosine: Vec<f64>,
    pub count: Vec<f64>,
    pub hr_std: Vec<f64>,
    pub hr_mean: Vec<f64>,
    pub time: Vec<f64>,
}

impl FeatureSeries {
    /// Load all series for a session, enforcing that they are aligned.
    pub fn load(store: &SessionStore, session_id: &str) -> Result<Self, PipelineError> {
        let cosine = read_scalar_series(&store.feature_series(session_id, SeriesKind::Cosine))?;
        let count = read_scalar_series(&store.feature_series(session_id, SeriesKind::Count))?;
        let (hr_std, hr_mean) =
            read_heart_rate_series(&store.feature_series(session_id, SeriesKind::HeartRate))?;
        let time = read_scalar_series(&store.feature_series(session_id, SeriesKind::Time))?;

        let series = Self {
            cosine,
            count,
            hr_std,
            hr_mean,
            time,
        };
        series.check_aligned()?;
        Ok(series)
    }

    /// Number of epochs in the series.
    pub fn len(&self) -> usize {
        self.cosine.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cosine.is_empty()
    }

    fn check_aligned(&self) -> Result<(), PipelineError> {
        let n = self.cosine.len();
        if self.count.len() != n
            || self.hr_std.len() != n
            || self.hr_mean.len() != n
            || self.time.len() != n
        {
            return Err(PipelineError::Extraction(format!(
                "feature series lengths are misaligned \
                 (cosine: {}, count: {}, hr: {}, time: {})",
                n,
                self.count.len(),
                self.hr_std.len(),
                self.time.len()
            )));
        }
        Ok(())
    }
}

fn read_series_file(path: &Path) -> Result<String, PipelineError> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PipelineError::Extraction(format!("missing feature series file {path:?}"))
        } else {
            PipelineError::Storage(format!("reading {path:?}: {e}"))
        }
    })
}

fn parse_float(raw: &str, path: &Path) -> Result<f64, PipelineError> {
    raw.parse::<f64>().map_err(|e| {
        PipelineError::Extraction(format!("malformed value '{raw}' in {path:?}: {e}"))
    })
}

fn read_scalar_series(path: &Path) -> Result<Vec<f64>, PipelineError> {
    let contents = read_series_file(path)?;
    contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| parse_float(l, path))
        .collect()
}

fn read_heart_rate_series(path: &Path) -> Result<(Vec<f64>, Vec<f64>), PipelineError> {
    let contents = read_series_file(path)?;
    let mut hr_std = Vec::new();
    let mut hr_mean = Vec::new();

    for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut parts = line.split_whitespace();
        let std_part = parts.next().ok_or_else(|| {
            PipelineError::Extraction(format!("empty heart-rate line in {path:?}"))
        })?;
        hr_std.push(parse_float(std_part, path)?);
        // Legacy files carry only the standard deviation
        hr_mean.push(match parts.next() {
            Some(mean_part) => parse_float(mean_part, path)?,
            None => 0.0,
        });
    }

    Ok((hr_std, hr_mean))
}
