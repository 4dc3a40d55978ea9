//! Directory-backed blob store for transient conversion payloads.
//!
//! Two payload classes exist per job — the uploaded source and the converted
//! result — each keyed by the job id within its own [`Slot`]. The store is a
//! flat directory tree (`<root>/source/<key>`, `<root>/result/<key>`), opened
//! lazily: every operation ensures the directories exist before touching
//! them, so `open` is idempotent and safe to race with itself.
//!
//! Writes are atomic from a reader's perspective: the payload is written to a
//! temp path in the same directory and renamed into place, so a concurrent
//! `get` sees either the old payload or the new one in full, never a partial
//! file. Reads of a missing key are an ordinary `Ok(None)` — only the store
//! failing to open at all is an error.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StageError;

/// The two payload roles a job owns in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// The acquired file, staged before submission.
    Source,
    /// The converted artifact, staged until delivery.
    Result,
}

impl Slot {
    /// Directory name under the store root.
    fn dir_name(self) -> &'static str {
        match self {
            Slot::Source => "source",
            Slot::Result => "result",
        }
    }
}

/// A keyed store for binary payloads, scoped to one root directory.
///
/// Cheap to clone; clones share the same root and therefore the same entries.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Create a handle on `root`. No I/O happens until the first operation.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory this store lives in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Idempotently establish the storage directories.
    ///
    /// Called implicitly by every operation; callable directly to surface a
    /// [`StageError::StorageUnavailable`] early (e.g. at startup).
    pub async fn open(&self) -> Result<(), StageError> {
        for slot in [Slot::Source, Slot::Result] {
            let dir = self.root.join(slot.dir_name());
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| StageError::StorageUnavailable {
                    path: self.root.clone(),
                    detail: e.to_string(),
                })?;
        }
        Ok(())
    }

    /// Store `payload` under `(slot, key)`, replacing any prior value.
    ///
    /// Atomic write: temp file in the slot directory, then rename. Readers
    /// never observe partial bytes.
    pub async fn put(&self, slot: Slot, key: &str, payload: &[u8]) -> Result<(), StageError> {
        self.open().await?;
        let path = self.entry_path(slot, key)?;
        let tmp = self.root.join(slot.dir_name()).join(format!(".{key}.tmp"));

        tokio::fs::write(&tmp, payload)
            .await
            .map_err(|e| self.io_error("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| self.io_error("rename", &path, e))?;

        debug!(
            slot = slot.dir_name(),
            key,
            bytes = payload.len(),
            "stored blob"
        );
        Ok(())
    }

    /// Fetch the payload under `(slot, key)`, or `None` if absent.
    ///
    /// A missing key is never an error; only a store that cannot be read is.
    pub async fn get(&self, slot: Slot, key: &str) -> Result<Option<Vec<u8>>, StageError> {
        self.open().await?;
        let path = self.entry_path(slot, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error("read", &path, e)),
        }
    }

    /// Remove the entry under `(slot, key)`. A no-op if absent.
    pub async fn delete(&self, slot: Slot, key: &str) -> Result<(), StageError> {
        self.open().await?;
        let path = self.entry_path(slot, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error("delete", &path, e)),
        }
    }

    /// Remove the entries for `key` in both slots as one unit of work.
    ///
    /// Best-effort against external failure: both deletions are attempted
    /// regardless of the other's outcome, and the first error (if any) is
    /// returned so the caller knows cleanup may be incomplete.
    pub async fn delete_all(&self, key: &str) -> Result<(), StageError> {
        let mut first_err = None;
        for slot in [Slot::Source, Slot::Result] {
            if let Err(e) = self.delete(slot, key).await {
                warn!(slot = slot.dir_name(), key, error = %e, "blob cleanup failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Resolve the on-disk path for `(slot, key)`.
    ///
    /// Keys are caller-chosen opaque ids; anything that would escape the slot
    /// directory is rejected rather than sanitised.
    fn entry_path(&self, slot: Slot, key: &str) -> Result<PathBuf, StageError> {
        if key.is_empty()
            || key == "."
            || key == ".."
            || key.contains('/')
            || key.contains('\\')
        {
            return Err(StageError::Internal(format!("invalid blob key: '{key}'")));
        }
        Ok(self.root.join(slot.dir_name()).join(key))
    }

    fn io_error(&self, op: &str, path: &Path, e: std::io::Error) -> StageError {
        StageError::Internal(format!("storage {op} failed for '{}': {e}", path.display()))
    }
}
