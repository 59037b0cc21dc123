//! Feature-extraction collaborator boundary.
//!
//! The signal-processing step that turns raw motion/heart-rate logs into
//! per-epoch feature series lives outside this crate. It is modeled as a
//! trait so the pipeline depends only on the contract: given a session id,
//! recompute the four series files, synchronously, overwriting the prior
//! ones. The production implementation shells out to a configured command;
//! tests and the offline CLI use the no-op implementation against series
//! that already exist on disk.

use crate::error::PipelineError;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Recomputes a session's feature series from its raw logs.
///
/// Implementations must either fully rewrite all four series files or fail;
/// the table builder is only invoked after a successful return.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, session_id: &str, data_dir: &Path) -> Result<(), PipelineError>;
}

/// Runs an external extraction command as `<command> <session_id> <data_dir>`.
pub struct CommandExtractor {
    command: PathBuf,
    timeout: Duration,
}

/// Interval between child exit polls.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

impl CommandExtractor {
    pub fn new(command: PathBuf, timeout: Duration) -> Self {
        Self { command, timeout }
    }
}

impl FeatureExtractor for CommandExtractor {
    fn extract(&self, session_id: &str, data_dir: &Path) -> Result<(), PipelineError> {
        let mut child = Command::new(&self.command)
            .arg(session_id)
            .arg(data_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PipelineError::Configuration(format!(
                        "extractor command not found: {:?}",
                        self.command
                    ))
                } else {
                    PipelineError::Extraction(format!(
                        "could not spawn {:?}: {e}",
                        self.command
                    ))
                }
            })?;

        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if status.success() {
                        return Ok(());
                    }
                    return Err(PipelineError::Extraction(format!(
                        "extractor exited with {status} for session {session_id}"
                    )));
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(PipelineError::ExtractionTimeout(self.timeout.as_secs()));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(PipelineError::Extraction(format!(
                        "waiting on extractor: {e}"
                    )))
                }
            }
        }
    }
}

/// No-op extractor for flows that operate on already-extracted series
/// (offline re-prediction, tests).
pub struct NoopExtractor;

impl FeatureExtractor for NoopExtractor {
    fn extract(&self, _session_id: &str, _data_dir: &Path) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Bounded retry with exponential backoff. Applies only to extraction
/// failures and timeouts; all other error kinds surface immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            base_backoff: Duration::from_millis(0),
        }
    }
}

/// Run the extractor, retrying per the policy. The blocking call runs on
/// the tokio blocking pool so request handlers are not stalled.
pub async fn extract_with_retry(
    extractor: Arc<dyn FeatureExtractor>,
    session_id: &str,
    data_dir: &Path,
    policy: RetryPolicy,
) -> Result<(), PipelineError> {
    let mut backoff = policy.base_backoff;

    for attempt in 0..=policy.retries {
        let extractor = Arc::clone(&extractor);
        let session = session_id.to_string();
        let dir = data_dir.to_path_buf();

        let result = tokio::task::spawn_blocking(move || extractor.extract(&session, &dir))
            .await
            .map_err(|e| PipelineError::Extraction(format!("extractor task panicked: {e}")))?;

        match result {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() && attempt < policy.retries => {
                tracing::warn!(
                    session_id,
                    attempt,
                    "extraction attempt failed, retrying: {e}"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) => return Err(e),
        }
    }

    unreachable!("retry loop returns on the final attempt")
}
