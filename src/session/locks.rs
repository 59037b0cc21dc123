//! Per-session write serialization.
//!
//! Two concurrent requests for the same session id would otherwise race on
//! the append-vs-overwrite decision and interleave log lines. Each session
//! id gets its own async mutex, held for the full
//! write -> extract -> build -> predict flow of a request. Requests for
//! different sessions proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-session-id mutexes.
#[derive(Default)]
pub struct SessionLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a session id, waiting if another request for
    /// the same session is in flight.
    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().expect("session lock registry poisoned");
            Arc::clone(
                map.entry(session_id.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}
