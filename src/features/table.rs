//! Model-ready feature table assembly.
//!
//! Turns the aligned feature series into the fixed 12-column row layout the
//! classifier was trained on: the five raw columns, six short-horizon lag
//! columns, and a per-table standardized heart-rate-mean delta.

use crate::error::PipelineError;
use crate::features::series::FeatureSeries;
use statrs::statistics::Statistics;

/// Number of columns in a model-ready row.
pub const COLUMN_COUNT: usize = 12;

/// Rows whose lag/delta columns would reach before the series start.
pub const LAG_WARMUP: usize = 2;

/// One model-ready row:
/// `[cosine, count, hr_std, hr_mean, time, count_lag1, count_lag2,
///   hr_std_lag1, hr_std_lag2, hr_mean_lag1, hr_mean_lag2, hr_mean_delta]`
pub type FeatureRow = [f64; COLUMN_COUNT];

/// A model-ready table for one session at one point in time.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Result of a build attempt. Not having enough data yet is an expected
/// outcome, not an error.
#[derive(Debug)]
pub enum BuildOutcome {
    Table(FeatureTable),
    Insufficient { epochs: usize, required: usize },
}

/// Build the feature table from a session's series.
///
/// The trailing `settle_epochs` epochs are dropped (the most recent epochs
/// are not yet settled), lag columns are derived over the trimmed series,
/// and the first `LAG_WARMUP` rows are removed because their lag and delta
/// columns are undefined. Row count is therefore
/// `len - settle_epochs - LAG_WARMUP`.
pub fn build(
    series: &FeatureSeries,
    min_epochs: usize,
    settle_epochs: usize,
) -> Result<BuildOutcome, PipelineError> {
    let raw_len = series.len();
    if raw_len < min_epochs {
        return Ok(BuildOutcome::Insufficient {
            epochs: raw_len,
            required: min_epochs,
        });
    }

    let trimmed = raw_len.saturating_sub(settle_epochs);
    if trimmed <= LAG_WARMUP {
        return Ok(BuildOutcome::Insufficient {
            epochs: raw_len,
            required: min_epochs.max(settle_epochs + LAG_WARMUP + 1),
        });
    }

    // hr_mean delta over two epochs, standardized against this table only.
    // The scale is refit per call, so values are not comparable across
    // sessions; the classifier was trained the same way.
    let deltas: Vec<f64> = (LAG_WARMUP..trimmed)
        .map(|i| series.hr_mean[i] - series.hr_mean[i - 2])
        .collect();
    let deltas = standardize(&deltas);

    let mut rows = Vec::with_capacity(trimmed - LAG_WARMUP);
    for i in LAG_WARMUP..trimmed {
        rows.push([
            series.cosine[i],
            series.count[i],
            series.hr_std[i],
            series.hr_mean[i],
            series.time[i],
            series.count[i - 1],
            series.count[i - 2],
            series.hr_std[i - 1],
            series.hr_std[i - 2],
            series.hr_mean[i - 1],
            series.hr_mean[i - 2],
            deltas[i - LAG_WARMUP],
        ]);
    }

    Ok(BuildOutcome::Table(FeatureTable { rows }))
}

/// Center to zero mean and scale to unit sample variance. A zero-variance
/// column is left centered but unscaled, matching the training pipeline.
fn standardize(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mean = values.iter().mean();
    let sd = values.iter().std_dev();
    let scale = if sd.is_finite() && sd > f64::EPSILON {
        sd
    } else {
        1.0
    };
    values.iter().map(|v| (v - mean) / scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series_of_len(n: usize) -> FeatureSeries {
        FeatureSeries {
            cosine: (0..n).map(|i| i as f64 * 0.01).collect(),
            count: (0..n).map(|i| i as f64).collect(),
            hr_std: (0..n).map(|i| 1.0 + i as f64 * 0.1).collect(),
            hr_mean: (0..n).map(|i| 60.0 + ((i * i) % 7) as f64).collect(),
            time: (0..n).map(|i| i as f64 * 30.0).collect(),
        }
    }

    #[test]
    fn test_minimum_epoch_gate() {
        let outcome = build(&series_of_len(19), 20, 10).unwrap();
        assert!(matches!(
            outcome,
            BuildOutcome::Insufficient {
                epochs: 19,
                required: 20
            }
        ));
    }

    #[test]
    fn test_row_count_at_gate() {
        // 20 raw epochs -> trim 10 -> drop 2 warmup rows -> 8 rows
        let outcome = build(&series_of_len(20), 20, 10).unwrap();
        let table = match outcome {
            BuildOutcome::Table(t) => t,
            BuildOutcome::Insufficient { .. } => panic!("expected a table"),
        };
        assert_eq!(table.len(), 8);
    }

    #[test]
    fn test_row_count_formula() {
        for n in [20, 25, 40, 100] {
            let outcome = build(&series_of_len(n), 20, 10).unwrap();
            match outcome {
                BuildOutcome::Table(t) => assert_eq!(t.len(), n - 10 - 2),
                BuildOutcome::Insufficient { .. } => panic!("expected a table for n={n}"),
            }
        }
    }

    #[test]
    fn test_column_order_and_lags() {
        let n = 30;
        let series = series_of_len(n);
        let table = match build(&series, 20, 10).unwrap() {
            BuildOutcome::Table(t) => t,
            BuildOutcome::Insufficient { .. } => panic!("expected a table"),
        };

        // First row corresponds to trimmed-series index 2
        let row = table.rows()[0];
        assert_eq!(row[0], series.cosine[2]);
        assert_eq!(row[1], series.count[2]);
        assert_eq!(row[2], series.hr_std[2]);
        assert_eq!(row[3], series.hr_mean[2]);
        assert_eq!(row[4], series.time[2]);
        assert_eq!(row[5], series.count[1]); // count_lag1
        assert_eq!(row[6], series.count[0]); // count_lag2
        assert_eq!(row[7], series.hr_std[1]); // hr_std_lag1
        assert_eq!(row[8], series.hr_std[0]); // hr_std_lag2
        assert_eq!(row[9], series.hr_mean[1]); // hr_mean_lag1
        assert_eq!(row[10], series.hr_mean[0]); // hr_mean_lag2

        // Last row corresponds to trimmed-series index n-10-1
        let last = table.rows()[table.len() - 1];
        let i = n - 10 - 1;
        assert_eq!(last[0], series.cosine[i]);
        assert_eq!(last[5], series.count[i - 1]);
        assert_eq!(last[6], series.count[i - 2]);
    }

    #[test]
    fn test_delta_column_is_standardized() {
        let table = match build(&series_of_len(60), 20, 10).unwrap() {
            BuildOutcome::Table(t) => t,
            BuildOutcome::Insufficient { .. } => panic!("expected a table"),
        };

        let deltas: Vec<f64> = table.rows().iter().map(|r| r[11]).collect();
        let n = deltas.len() as f64;
        let mean = deltas.iter().sum::<f64>() / n;
        let var = deltas.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n - 1.0);

        assert!(mean.abs() < 1e-9, "mean was {mean}");
        assert!((var.sqrt() - 1.0).abs() < 1e-9, "std was {}", var.sqrt());
    }

    #[test]
    fn test_constant_hr_mean_yields_zero_deltas() {
        // Legacy series where hr_mean defaulted to 0.0 everywhere
        let mut series = series_of_len(30);
        series.hr_mean = vec![0.0; 30];

        let table = match build(&series, 20, 10).unwrap() {
            BuildOutcome::Table(t) => t,
            BuildOutcome::Insufficient { .. } => panic!("expected a table"),
        };
        assert!(table.rows().iter().all(|r| r[11] == 0.0));
    }
}
