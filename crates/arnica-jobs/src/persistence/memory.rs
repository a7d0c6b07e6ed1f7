//! In-memory handle store for tests and embedding.

use arnica_hal::JobId;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;

use crate::error::{JobsError, JobsResult};
use crate::persistence::{HandleStore, PersistedRecord};

/// Mutex-guarded map of records. Lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<FxHashMap<JobId, PersistedRecord>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HandleStore for MemoryStore {
    async fn save(&self, record: &PersistedRecord) -> JobsResult<()> {
        let mut records = self.records.lock().await;
        records.insert(record.job_id().clone(), record.clone());
        Ok(())
    }

    async fn restore(&self, job_id: &JobId, remove: bool) -> JobsResult<PersistedRecord> {
        let mut records = self.records.lock().await;
        let record = if remove {
            records.remove(job_id)
        } else {
            records.get(job_id).cloned()
        };
        record.ok_or_else(|| JobsError::HandleNotFound(job_id.to_string()))
    }

    async fn contains(&self, job_id: &JobId) -> JobsResult<bool> {
        Ok(self.records.lock().await.contains_key(job_id))
    }

    async fn list(&self) -> JobsResult<Vec<JobId>> {
        let mut ids: Vec<JobId> = self.records.lock().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
