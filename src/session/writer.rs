//! Session writer: durably records a sensor batch into per-session logs.
//!
//! One ingest call touches up to four files. The raw sample logs are
//! appended or rewritten depending on the batch's `SessionPhase`; the label
//! stub and start-time metadata are always fully rewritten. Appends run
//! inside a write transaction that records each log's prior length and
//! truncates back on failure, so a failed ingest never leaves half a batch
//! in the logs.

use crate::error::PipelineError;
use crate::session::batch::{SensorBatch, SessionPhase};
use crate::session::store::{write_atomic, SessionStore};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Seconds per scoring epoch.
pub const EPOCH_SECS: f64 = 30.0;

/// Writes sensor batches into a session's log files.
pub struct SessionWriter<'a> {
    store: &'a SessionStore,
    session_start_threshold_secs: f64,
}

impl<'a> SessionWriter<'a> {
    pub fn new(store: &'a SessionStore, session_start_threshold_secs: f64) -> Self {
        Self {
            store,
            session_start_threshold_secs,
        }
    }

    /// Record a validated batch. Returns the phase that was applied.
    pub fn ingest(
        &self,
        session_id: &str,
        batch: &SensorBatch,
    ) -> Result<SessionPhase, PipelineError> {
        batch.validate()?;
        self.store.ensure_layout()?;

        let phase = batch.phase(self.session_start_threshold_secs);

        let mut txn = WriteTxn::default();
        let result = self.write_logs(session_id, batch, phase, &mut txn);
        if result.is_err() {
            txn.rollback();
        }
        result?;

        Ok(phase)
    }

    fn write_logs(
        &self,
        session_id: &str,
        batch: &SensorBatch,
        phase: SessionPhase,
        txn: &mut WriteTxn,
    ) -> Result<(), PipelineError> {
        let mut motion_lines = String::new();
        for (i, ts) in batch.accel.timestamp.iter().enumerate() {
            motion_lines.push_str(&format!(
                "{} {} {} {}\n",
                ts, batch.accel.x[i], batch.accel.y[i], batch.accel.z[i]
            ));
        }

        let mut hr_lines = String::new();
        for (i, ts) in batch.heart_rate.timestamp.iter().enumerate() {
            hr_lines.push_str(&format!("{},{}\n", ts, batch.heart_rate.hr[i]));
        }

        match phase {
            SessionPhase::Fresh => {
                // Rewrites publish atomically, nothing to roll back.
                write_atomic(&self.store.motion_log(session_id), &motion_lines)?;
                write_atomic(&self.store.heart_rate_log(session_id), &hr_lines)?;
            }
            SessionPhase::Continuing => {
                txn.append(self.store.motion_log(session_id), &motion_lines)?;
                txn.append(self.store.heart_rate_log(session_id), &hr_lines)?;
            }
        }

        // The label stub is a structural placeholder for the extraction
        // collaborator: one zero-labeled line per epoch of the session so
        // far, regenerated on every batch to match the latest duration.
        let epochs = (batch.last_accel_timestamp() / EPOCH_SECS).floor() as i64 + 1;
        let mut stub = String::new();
        for i in 0..epochs {
            stub.push_str(&format!("{} 0\n", i as f64 * EPOCH_SECS));
        }
        write_atomic(&self.store.label_stub(session_id), &stub)?;

        if let Some(start_time) = batch.absolute_start_time {
            let meta = serde_json::json!({ "startTime": start_time });
            write_atomic(
                &self.store.start_time_meta(session_id),
                &serde_json::to_string(&meta)
                    .map_err(|e| PipelineError::Storage(e.to_string()))?,
            )?;
        }

        Ok(())
    }
}

/// Tracks appended files so a failed ingest can be undone.
#[derive(Default)]
struct WriteTxn {
    appended: Vec<(PathBuf, u64)>,
}

impl WriteTxn {
    fn append(&mut self, path: PathBuf, contents: &str) -> Result<(), PipelineError> {
        let prior_len = match std::fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };
        self.appended.push((path.clone(), prior_len));

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(contents.as_bytes())?;
        Ok(())
    }

    /// Best-effort truncate of every appended file back to its prior length.
    fn rollback(&self) {
        for (path, prior_len) in &self.appended {
            match File::options().write(true).open(path) {
                Ok(file) => {
                    if let Err(e) = file.set_len(*prior_len) {
                        tracing::warn!("rollback failed for {:?}: {e}", path);
                    }
                }
                Err(e) => tracing::warn!("rollback could not open {:?}: {e}", path),
            }
        }
    }
}
