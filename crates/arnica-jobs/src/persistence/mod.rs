//! Persistence of in-flight job handles.
//!
//! A handle is checkpointed on demand after submission and consumed by
//! `restore`, by default at most once: restoring with removal takes the record
//! out of the store in the same operation that reads it.

mod json_store;
mod memory;

pub use json_store::{JsonStore, STALE_SCRATCH_AGE};
pub use memory::MemoryStore;

use std::path::PathBuf;

use arnica_hal::{JobHandle, JobId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{JobsError, JobsResult};

/// Format version of [`PersistedRecord`].
pub const RECORD_VERSION: u32 = 1;

/// Environment variable holding the access token by default.
pub const DEFAULT_TOKEN_ENV: &str = "AQT_TOKEN";

/// Where the access token of a persisted job can be found. Never the token itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsRef {
    /// Name of the environment variable holding the token.
    pub token_env: String,
}

impl CredentialsRef {
    /// Reference a token variable.
    pub fn env(token_env: impl Into<String>) -> Self {
        Self {
            token_env: token_env.into(),
        }
    }
}

impl Default for CredentialsRef {
    fn default() -> Self {
        Self::env(DEFAULT_TOKEN_ENV)
    }
}

/// Durable form of a [`JobHandle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    /// Format version.
    pub version: u32,
    /// The handle, batch included.
    pub handle: JobHandle,
    /// Access credentials reference.
    pub credentials: CredentialsRef,
    /// When the record was written.
    pub saved_at: DateTime<Utc>,
}

impl PersistedRecord {
    /// Wrap a handle for storage.
    pub fn new(handle: JobHandle, credentials: CredentialsRef) -> Self {
        Self {
            version: RECORD_VERSION,
            handle,
            credentials,
            saved_at: Utc::now(),
        }
    }

    /// Key of the record.
    pub fn job_id(&self) -> &JobId {
        self.handle.job_id()
    }

    pub(crate) fn check_version(&self) -> JobsResult<()> {
        if self.version > RECORD_VERSION {
            return Err(JobsError::Config(format!(
                "record for job {} has format version {} (newest supported: {RECORD_VERSION})",
                self.job_id(),
                self.version
            )));
        }
        Ok(())
    }
}

/// Durable, at-most-once-retrievable storage of job handles keyed by job id.
#[async_trait]
pub trait HandleStore: Send + Sync {
    /// Write a record; overwrites an existing record with the same id.
    async fn save(&self, record: &PersistedRecord) -> JobsResult<()>;

    /// Read a record. With `remove`, the record is taken out of the store in
    /// the same operation; a second restore then fails.
    ///
    /// Fails with [`JobsError::HandleNotFound`] without side effects when no
    /// record exists.
    async fn restore(&self, job_id: &JobId, remove: bool) -> JobsResult<PersistedRecord>;

    /// Whether a record exists.
    async fn contains(&self, job_id: &JobId) -> JobsResult<bool>;

    /// Ids of the stored records, sorted.
    async fn list(&self) -> JobsResult<Vec<JobId>>;
}

/// Default directory of the JSON store: `<user cache dir>/arnica/<version>`.
pub fn default_store_path() -> JobsResult<PathBuf> {
    let cache = dirs::cache_dir()
        .ok_or_else(|| JobsError::Config("no user cache directory on this platform".into()))?;
    Ok(cache.join("arnica").join(env!("CARGO_PKG_VERSION")))
}
