//! Destinations for torn-down session state.

use crate::error::Result;
use crate::orchestrator::types::PersistedSessionState;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Receives the exported state of every session that is torn down.
///
/// Implementations must be thread-safe (`Send + Sync`) since teardown can
/// run from any task. A failed `persist` keeps the session live.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn persist(&self, state: &PersistedSessionState) -> Result<()>;
}

/// Sink that keeps persisted states in memory.
#[derive(Debug, Default)]
pub struct InMemorySnapshotSink {
    states: Mutex<Vec<PersistedSessionState>>,
}

impl InMemorySnapshotSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything persisted so far, oldest first.
    pub async fn persisted(&self) -> Vec<PersistedSessionState> {
        self.states.lock().await.clone()
    }
}

#[async_trait]
impl SnapshotSink for InMemorySnapshotSink {
    async fn persist(&self, state: &PersistedSessionState) -> Result<()> {
        self.states.lock().await.push(state.clone());
        Ok(())
    }
}
