//! Sleep-stage inference agent for wearable sensor data.
//!
//! This library ingests batches of accelerometer and heart-rate samples
//! keyed by a recording session, keeps durable per-session logs, invokes an
//! external feature-extraction step, assembles a model-ready feature table
//! with temporal lag/delta engineering, runs a pre-trained classifier, and
//! returns the most recent predicted sleep stages.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Sleep-Stage Agent                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌──────────┐  │
//! │  │ Session  │──▶│ Extractor │──▶│  Table   │──▶│Classifier│  │
//! │  │  Writer  │   │(external) │   │ Builder  │   │ (predict)│  │
//! │  └──────────┘   └───────────┘   └──────────┘   └──────────┘  │
//! │       │                                             │        │
//! │       ▼                                             ▼        │
//! │  ┌──────────┐                                  ┌──────────┐  │
//! │  │ Session  │                                  │Prediction│  │
//! │  │   Logs   │                                  │   Log    │  │
//! │  └──────────┘                                  └──────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sleepstage_agent::config::Config;
//! use sleepstage_agent::server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let (addr, _shutdown) = server::run(config).await?;
//!     println!("listening on {addr}");
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod extract;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod server;
pub mod session;

// Re-export key types at crate root for convenience
pub use clock::{session_id_for, Clock, SystemClock};
pub use config::{Config, ConfigError};
pub use error::PipelineError;
pub use extract::{CommandExtractor, FeatureExtractor, NoopExtractor, RetryPolicy};
pub use features::{BuildOutcome, FeatureSeries, FeatureTable};
pub use model::Classifier;
pub use pipeline::{Pipeline, PipelineConfig, PipelineOutcome};
pub use session::{IngestRequest, SensorBatch, SessionPhase, SessionStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
