//! Session ingestion and durable per-session storage.
//!
//! This module contains:
//! - Sensor batch types and validation
//! - The per-session file layout
//! - The session writer (append vs. reset, write transaction)
//! - Per-session write serialization

pub mod batch;
pub mod locks;
pub mod store;
pub mod writer;

// Re-export commonly used types
pub use batch::{AccelBatch, HeartRateBatch, IngestRequest, SensorBatch, SessionPhase};
pub use locks::SessionLocks;
pub use store::{SeriesKind, SessionStore};
pub use writer::{SessionWriter, EPOCH_SECS};
