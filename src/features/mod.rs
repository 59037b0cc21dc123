//! Feature series reading and model-ready table assembly.
//!
//! This module contains:
//! - Reading the per-epoch series written by the extraction collaborator
//! - Lag/delta engineering and the minimum-epoch gate

pub mod series;
pub mod table;

// Re-export commonly used types
pub use series::FeatureSeries;
pub use table::{build, BuildOutcome, FeatureRow, FeatureTable, COLUMN_COUNT, LAG_WARMUP};
