//! Classifier artifact loading and inference.
//!
//! The classifier is a pre-trained artifact: a JSON-serialized ensemble of
//! decision trees exported from the training pipeline. It is loaded once at
//! process start and shared read-only across requests; this module exposes
//! nothing of it beyond `predict`.
//!
//! The model emits internal stage codes in `{0,1,2,3,4}` (its training
//! labels are contiguous). Externally, REM is stage 5, so internal 4 is
//! remapped to 5 on the way out; all other codes pass through untouched.

use crate::error::PipelineError;
use crate::features::table::FeatureRow;
use serde::Deserialize;
use std::path::Path;

/// Internal code the model uses for REM sleep.
pub const INTERNAL_REM_CODE: u8 = 4;

/// External REM stage code expected by consumers.
pub const EXTERNAL_REM_CODE: u8 = 5;

/// A single decision tree in node-array form. Node 0 is the root; a
/// negative `feature` marks a leaf whose class is `value` at that index.
#[derive(Debug, Deserialize)]
struct DecisionTree {
    feature: Vec<i32>,
    threshold: Vec<f64>,
    left: Vec<i32>,
    right: Vec<i32>,
    value: Vec<u8>,
}

/// Pre-trained sleep-stage classifier.
#[derive(Debug, Deserialize)]
pub struct Classifier {
    /// Number of internal classes the ensemble votes over
    classes: usize,
    trees: Vec<DecisionTree>,
}

impl Classifier {
    /// Load the artifact from its configured path. A missing or malformed
    /// artifact is a configuration failure, never an insufficiency of data.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("classifier artifact at {path:?}: {e}"))
        })?;
        let classifier: Classifier = serde_json::from_str(&contents).map_err(|e| {
            PipelineError::Configuration(format!("parsing classifier artifact {path:?}: {e}"))
        })?;
        classifier.check_well_formed(path)?;
        Ok(classifier)
    }

    fn check_well_formed(&self, path: &Path) -> Result<(), PipelineError> {
        let malformed =
            |msg: String| PipelineError::Configuration(format!("classifier {path:?}: {msg}"));

        if self.classes == 0 || self.trees.is_empty() {
            return Err(malformed("no classes or no trees".to_string()));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            let n = tree.feature.len();
            if tree.threshold.len() != n
                || tree.left.len() != n
                || tree.right.len() != n
                || tree.value.len() != n
                || n == 0
            {
                return Err(malformed(format!("tree {t} has inconsistent node arrays")));
            }
            for i in 0..n {
                if tree.feature[i] >= 0 {
                    let f = tree.feature[i] as usize;
                    if f >= crate::features::COLUMN_COUNT {
                        return Err(malformed(format!(
                            "tree {t} node {i} splits on unknown column {f}"
                        )));
                    }
                    let (l, r) = (tree.left[i], tree.right[i]);
                    if l < 0 || r < 0 || l as usize >= n || r as usize >= n {
                        return Err(malformed(format!(
                            "tree {t} node {i} has out-of-range children"
                        )));
                    }
                }
                if usize::from(tree.value[i]) >= self.classes {
                    return Err(malformed(format!(
                        "tree {t} node {i} predicts unknown class {}",
                        tree.value[i]
                    )));
                }
            }
        }
        Ok(())
    }

    /// Predict one internal stage code per row.
    pub fn predict(&self, rows: &[FeatureRow]) -> Vec<u8> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    fn predict_row(&self, row: &FeatureRow) -> u8 {
        let mut votes = vec![0usize; self.classes];
        for tree in &self.trees {
            votes[usize::from(tree.classify(row))] += 1;
        }
        // Ties break toward the lowest stage code
        let class = votes
            .iter()
            .enumerate()
            .max_by_key(|(class, count)| (**count, std::cmp::Reverse(*class)))
            .map(|(class, _)| class)
            .unwrap_or(0);
        class as u8
    }
}

impl DecisionTree {
    fn classify(&self, row: &FeatureRow) -> u8 {
        let mut node = 0usize;
        // Well-formedness is checked at load; the step bound guards
        // against a cyclic node graph in a hand-edited artifact.
        for _ in 0..self.feature.len() {
            let f = self.feature[node];
            if f < 0 {
                return self.value[node];
            }
            node = if row[f as usize] <= self.threshold[node] {
                self.left[node] as usize
            } else {
                self.right[node] as usize
            };
        }
        self.value[node]
    }
}

/// Map an internal model code to the external stage label space.
pub fn remap_stage(code: u8) -> u8 {
    if code == INTERNAL_REM_CODE {
        EXTERNAL_REM_CODE
    } else {
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Single stump: cosine <= 0.5 -> class given by `low`, else `high`.
    fn stump_json(low: u8, high: u8) -> String {
        serde_json::json!({
            "classes": 5,
            "trees": [{
                "feature": [0, -1, -1],
                "threshold": [0.5, 0.0, 0.0],
                "left": [1, -1, -1],
                "right": [2, -1, -1],
                "value": [0, low, high]
            }]
        })
        .to_string()
    }

    fn write_artifact(json: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "sleepstage-model-{}.json",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, json).unwrap();
        path
    }

    fn row_with_cosine(c: f64) -> FeatureRow {
        let mut row = [0.0; crate::features::COLUMN_COUNT];
        row[0] = c;
        row
    }

    #[test]
    fn test_remap_law() {
        assert_eq!(remap_stage(0), 0);
        assert_eq!(remap_stage(1), 1);
        assert_eq!(remap_stage(2), 2);
        assert_eq!(remap_stage(3), 3);
        assert_eq!(remap_stage(4), 5);
    }

    #[test]
    fn test_missing_artifact_is_configuration_error() {
        let err = Classifier::load(Path::new("/nonexistent/classifier.json")).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_malformed_artifact_rejected() {
        let path = write_artifact(r#"{"classes": 5, "trees": []}"#);
        assert!(matches!(
            Classifier::load(&path),
            Err(PipelineError::Configuration(_))
        ));

        // Child index out of range
        let path = write_artifact(
            &serde_json::json!({
                "classes": 5,
                "trees": [{
                    "feature": [0],
                    "threshold": [0.5],
                    "left": [7],
                    "right": [8],
                    "value": [0]
                }]
            })
            .to_string(),
        );
        assert!(matches!(
            Classifier::load(&path),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn test_stump_prediction() {
        let path = write_artifact(&stump_json(1, 4));
        let model = Classifier::load(&path).unwrap();

        let rows = vec![row_with_cosine(0.2), row_with_cosine(0.9)];
        assert_eq!(model.predict(&rows), vec![1, 4]);
    }

    #[test]
    fn test_majority_vote() {
        // Two trees vote `high = 4`, one votes `high = 2`
        let json = serde_json::json!({
            "classes": 5,
            "trees": [
                {"feature": [0, -1, -1], "threshold": [0.5, 0.0, 0.0],
                 "left": [1, -1, -1], "right": [2, -1, -1], "value": [0, 1, 4]},
                {"feature": [0, -1, -1], "threshold": [0.5, 0.0, 0.0],
                 "left": [1, -1, -1], "right": [2, -1, -1], "value": [0, 1, 4]},
                {"feature": [0, -1, -1], "threshold": [0.5, 0.0, 0.0],
                 "left": [1, -1, -1], "right": [2, -1, -1], "value": [0, 1, 2]}
            ]
        })
        .to_string();
        let model = Classifier::load(&write_artifact(&json)).unwrap();
        assert_eq!(model.predict(&[row_with_cosine(0.9)]), vec![4]);
    }
}
