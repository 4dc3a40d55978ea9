//! The session descriptor: which job is active, cheap to read at startup.
//!
//! The descriptor is a small JSON record kept *outside* the blob store in its
//! own file, so the navigation checkpoint can be derived synchronously at
//! load time without opening the store at all — the process may have been
//! restarted between any two steps of the flow. Exactly one descriptor
//! exists at a time; writing a new one supersedes the previous job, though
//! the previous job's blob entries are not removed (disposal after delivery
//! is the only cleanup path; see `dispose`).

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::StageError;
use crate::job::{Job, JobStatus, SourceMeta};

/// File name of the descriptor within the state directory.
const DESCRIPTOR_FILE: &str = "session.json";

/// Metadata of the single active job, serialised to `session.json`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionDescriptor {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub status: JobStatus,
    /// User-visible message when `status` is `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionDescriptor {
    /// Snapshot a job into its descriptor form.
    pub fn from_job(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            name: job.source.name.clone(),
            size: job.source.size,
            mime_type: job.source.mime_type.clone(),
            status: job.status,
            error: job.error.clone(),
        }
    }

    /// Rebuild a job from a persisted descriptor (after a restart).
    pub fn into_job(self) -> Job {
        Job {
            id: self.id,
            source: SourceMeta {
                name: self.name,
                size: self.size,
                mime_type: self.mime_type,
            },
            status: self.status,
            error: self.error,
        }
    }
}

/// The externally observable checkpoint, derivable from persisted state
/// alone. UI navigation hangs off this and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// No usable job: acquire a file.
    Acquire,
    /// A job is staged or submitted: show progress.
    Processing,
    /// The job completed: offer the download.
    Deliver,
}

/// Derive the checkpoint from whatever descriptor survived a reload.
pub fn checkpoint(descriptor: Option<&SessionDescriptor>) -> Checkpoint {
    match descriptor.map(|d| d.status) {
        None | Some(JobStatus::Failed) => Checkpoint::Acquire,
        Some(JobStatus::Completed) => Checkpoint::Deliver,
        Some(JobStatus::Created) | Some(JobStatus::Staged) | Some(JobStatus::Submitted) => {
            Checkpoint::Processing
        }
    }
}

/// Persist `descriptor` to `<state_dir>/session.json`, superseding any prior
/// descriptor. Atomic (temp + rename) so a reader never sees half a record.
pub fn save(state_dir: &Path, descriptor: &SessionDescriptor) -> Result<(), StageError> {
    std::fs::create_dir_all(state_dir).map_err(|e| StageError::StorageUnavailable {
        path: state_dir.to_path_buf(),
        detail: e.to_string(),
    })?;

    let path = descriptor_path(state_dir);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_vec_pretty(descriptor)
        .map_err(|e| StageError::Internal(format!("descriptor encode: {e}")))?;

    std::fs::write(&tmp, json)
        .map_err(|e| StageError::Internal(format!("descriptor write: {e}")))?;
    std::fs::rename(&tmp, &path)
        .map_err(|e| StageError::Internal(format!("descriptor rename: {e}")))?;

    debug!(id = %descriptor.id, status = ?descriptor.status, "session descriptor saved");
    Ok(())
}

/// Read the current descriptor, if any. Synchronous on purpose: this is the
/// page-load path and must stay cheap.
///
/// A corrupt descriptor counts as absent — the flow restarts at acquisition
/// rather than wedging on unparseable state.
pub fn load(state_dir: &Path) -> Result<Option<SessionDescriptor>, StageError> {
    let path = descriptor_path(state_dir);
    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StageError::StorageUnavailable {
                path,
                detail: e.to_string(),
            })
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(d) => Ok(Some(d)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "discarding corrupt session descriptor");
            Ok(None)
        }
    }
}

/// Remove the descriptor. A no-op if none exists. Blob entries stay put.
pub fn clear(state_dir: &Path) -> Result<(), StageError> {
    let path = descriptor_path(state_dir);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StageError::Internal(format!("descriptor clear: {e}"))),
    }
}

fn descriptor_path(state_dir: &Path) -> PathBuf {
    state_dir.join(DESCRIPTOR_FILE)
}
