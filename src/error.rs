//! Error taxonomy for the inference pipeline.
//!
//! Every fatal failure maps onto one of these variants. Running out of data
//! is deliberately not represented here: it is an expected outcome and is
//! modeled as a typed absence (`features::BuildOutcome::Insufficient`).

/// Fatal pipeline failures.
#[derive(Debug)]
pub enum PipelineError {
    /// Malformed or length-mismatched sensor batch. Rejected before any write.
    Validation(String),
    /// The external feature-extraction collaborator failed.
    Extraction(String),
    /// The extraction call exceeded its deadline (seconds). Retryable.
    ExtractionTimeout(u64),
    /// Classifier artifact or extractor command missing or unreadable.
    Configuration(String),
    /// I/O failure on a session log read or write.
    Storage(String),
}

impl PipelineError {
    /// Whether a bounded retry is worth attempting.
    ///
    /// Only extraction failures are transient; everything else fails the
    /// request outright.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Extraction(_) | PipelineError::ExtractionTimeout(_)
        )
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Validation(e) => write!(f, "Invalid sensor batch: {e}"),
            PipelineError::Extraction(e) => write!(f, "Feature extraction failed: {e}"),
            PipelineError::ExtractionTimeout(secs) => {
                write!(f, "Feature extraction timed out after {secs}s")
            }
            PipelineError::Configuration(e) => write!(f, "Configuration error: {e}"),
            PipelineError::Storage(e) => write!(f, "Storage error: {e}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::Storage(e.to_string())
    }
}
