//! JSON file-based handle store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use arnica_hal::JobId;
use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{JobsError, JobsResult};
use crate::persistence::{HandleStore, PersistedRecord, default_store_path};

const EXTENSION: &str = "json";

/// Scratch files older than this are left over from an interrupted save or
/// restore and are recovered when a store is opened.
pub const STALE_SCRATCH_AGE: Duration = Duration::from_secs(600);

/// One JSON file per job id in a directory.
///
/// Writes go to a temporary file that is then renamed over the record, so a
/// record is never observed half-written. Restoring with removal first
/// renames the record to a private claim path; only the caller that won the
/// rename reads it.
///
/// Job ids are opaque: every byte outside `[A-Za-z0-9_-]` is written as
/// `%XX` in the file name, so any id maps to exactly one file in the store
/// directory.
///
/// A crash between the two steps of a save or a restore leaves a hidden
/// `.<id>.<uuid>.tmp` or `.<id>.<uuid>.claim` file behind. Opening the store
/// deletes stale temporaries and puts stale claims back in place; see
/// [`JsonStore::recover_scratch`].
#[derive(Debug, Clone)]
pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    /// Open (and create if needed) a store in `base_dir`.
    pub async fn new(base_dir: impl AsRef<Path>) -> JobsResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).await?;
        let store = Self { base_dir };

        match store.recover_scratch(STALE_SCRATCH_AGE).await {
            Ok(0) => {}
            Ok(n) => info!(dir = %store.base_dir.display(), recovered = n, "Recovered stale scratch files"),
            Err(e) => warn!(dir = %store.base_dir.display(), "Scratch recovery failed: {}", e),
        }
        Ok(store)
    }

    /// Open the store in the default per-version cache directory.
    pub async fn open_default() -> JobsResult<Self> {
        Self::new(default_store_path()?).await
    }

    /// Directory holding the records.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Clean up scratch files last modified at least `older_than` ago.
    ///
    /// Temporaries of an unfinished save are deleted. A claim whose record
    /// slot is free is renamed back to a record, since its restore never
    /// completed; otherwise it is deleted. Returns the number of files handled.
    pub async fn recover_scratch(&self, older_than: Duration) -> JobsResult<usize> {
        let mut handled = 0;
        let mut entries = fs::read_dir(&self.base_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some((stem, kind)) = file_name.to_str().and_then(parse_scratch) else {
                continue;
            };
            let age = entry
                .metadata()
                .await?
                .modified()
                .ok()
                .and_then(|modified| modified.elapsed().ok());
            if !age.is_some_and(|age| age >= older_than) {
                continue;
            }

            let path = entry.path();
            match kind {
                ScratchKind::Tmp => {
                    fs::remove_file(&path).await?;
                    warn!(path = %path.display(), "Deleted unfinished record write");
                }
                ScratchKind::Claim => {
                    let record = self.base_dir.join(format!("{stem}.{EXTENSION}"));
                    if fs::try_exists(&record).await? {
                        fs::remove_file(&path).await?;
                        warn!(path = %path.display(), "Deleted superseded claim");
                    } else {
                        fs::rename(&path, &record).await?;
                        warn!(path = %record.display(), "Returned unfinished claim to the store");
                    }
                }
            }
            handled += 1;
        }
        Ok(handled)
    }

    /// Path of the record of `job_id`; `None` for the empty id.
    fn record_path(&self, job_id: &JobId) -> Option<PathBuf> {
        let id = job_id.as_str();
        if id.is_empty() {
            return None;
        }
        Some(self.base_dir.join(format!("{}.{EXTENSION}", encode_id(id))))
    }

    fn scratch_path(&self, job_id: &JobId, kind: ScratchKind) -> PathBuf {
        self.base_dir.join(format!(
            ".{}.{}.{}",
            encode_id(job_id.as_str()),
            uuid::Uuid::new_v4(),
            kind.suffix()
        ))
    }

    async fn read_record(path: &Path) -> JobsResult<PersistedRecord> {
        let content = fs::read_to_string(path).await?;
        let record: PersistedRecord = serde_json::from_str(&content)?;
        record.check_version()?;
        Ok(record)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScratchKind {
    Tmp,
    Claim,
}

impl ScratchKind {
    fn suffix(self) -> &'static str {
        match self {
            ScratchKind::Tmp => "tmp",
            ScratchKind::Claim => "claim",
        }
    }
}

/// Split `.<stem>.<uuid>.<kind>` into the encoded id and the kind.
fn parse_scratch(name: &str) -> Option<(&str, ScratchKind)> {
    let (rest, suffix) = name.strip_prefix('.')?.rsplit_once('.')?;
    let kind = match suffix {
        "tmp" => ScratchKind::Tmp,
        "claim" => ScratchKind::Claim,
        _ => return None,
    };
    let (stem, _uuid) = rest.rsplit_once('.')?;
    (!stem.is_empty()).then_some((stem, kind))
}

fn encode_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn decode_id(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = std::str::from_utf8(bytes.get(i + 1..i + 3)?).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[async_trait]
impl HandleStore for JsonStore {
    async fn save(&self, record: &PersistedRecord) -> JobsResult<()> {
        let path = self
            .record_path(record.job_id())
            .ok_or_else(|| JobsError::Config("cannot persist a handle with an empty job id".into()))?;
        let tmp = self.scratch_path(record.job_id(), ScratchKind::Tmp);
        let json = serde_json::to_string_pretty(record)?;

        fs::write(&tmp, json).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        info!(job_id = %record.job_id(), path = %path.display(), "Persisted job handle");
        Ok(())
    }

    async fn restore(&self, job_id: &JobId, remove: bool) -> JobsResult<PersistedRecord> {
        let not_found = || JobsError::HandleNotFound(job_id.to_string());
        let path = self.record_path(job_id).ok_or_else(not_found)?;

        if !remove {
            return match Self::read_record(&path).await {
                Err(JobsError::Io(e)) if e.kind() == ErrorKind::NotFound => Err(not_found()),
                other => other,
            };
        }

        let claim = self.scratch_path(job_id, ScratchKind::Claim);
        match fs::rename(&path, &claim).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        }

        match Self::read_record(&claim).await {
            Ok(record) => {
                if let Err(e) = fs::remove_file(&claim).await {
                    warn!(path = %claim.display(), "Failed to delete claimed record: {}", e);
                }
                info!(%job_id, "Restored job handle");
                Ok(record)
            }
            Err(e) => {
                // put the record back so it is not lost
                if let Err(rename_err) = fs::rename(&claim, &path).await {
                    warn!(
                        path = %claim.display(),
                        "Failed to return unreadable record: {}", rename_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn contains(&self, job_id: &JobId) -> JobsResult<bool> {
        match self.record_path(job_id) {
            Some(path) => Ok(fs::try_exists(&path).await?),
            None => Ok(false),
        }
    }

    async fn list(&self) -> JobsResult<Vec<JobId>> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.base_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != EXTENSION) {
                continue;
            }
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|stem| !stem.starts_with('.'))
                .and_then(decode_id);
            match id {
                Some(id) => ids.push(JobId::new(id)),
                None => debug!(path = %path.display(), "Skipping non-record file"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}
