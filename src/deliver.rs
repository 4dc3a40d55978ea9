//! Result delivery: hand the artifact to the host, then clean up.
//!
//! Delivery is best-effort and never corrupts stored state: a failed write
//! to the destination leaves the result entry intact so the user can retry.
//! Disposal runs *after* delivery, behind a short grace delay, so a retry of
//! the download inside that window still finds the payload. Cleanup failures
//! are logged and never surfaced — they must not block the success path.

use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::StageError;
use crate::orchestrate::JobContext;
use crate::store::Slot;

/// Read the result payload for `job_id`.
///
/// `Ok(None)` is a normal, user-actionable outcome (the flow returns to
/// acquisition), not an exceptional one.
pub async fn fetch_result(ctx: &JobContext, job_id: &str) -> Result<Option<Vec<u8>>, StageError> {
    ctx.store().get(Slot::Result, job_id).await
}

/// Write `bytes` to `<dir>/<name>` — the host environment's "download".
///
/// Atomic (temp + rename) so an interrupted write never leaves a partial
/// artifact at the destination. Returns the final path.
pub async fn save_to(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, StageError> {
    let path = dir.join(name);
    let failed = |e: std::io::Error| StageError::DeliveryFailed {
        path: path.clone(),
        source: e,
    };

    tokio::fs::create_dir_all(dir).await.map_err(failed)?;
    let tmp = dir.join(format!(".{name}.part"));
    tokio::fs::write(&tmp, bytes).await.map_err(failed)?;
    tokio::fs::rename(&tmp, &path).await.map_err(failed)?;

    info!(path = %path.display(), bytes = bytes.len(), "artifact delivered");
    Ok(path)
}

/// Schedule removal of both blob entries for `job_id` after the configured
/// grace delay.
///
/// Fire-and-forget: failures are logged, never returned — cleanup must not
/// block anything user-visible. The handle is returned so callers that need
/// determinism (tests, process shutdown) can await it.
pub fn dispose(ctx: &JobContext, job_id: &str) -> JoinHandle<()> {
    let store = ctx.store().clone();
    let grace = ctx.config().dispose_grace;
    let job_id = job_id.to_string();

    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        match store.delete_all(&job_id).await {
            Ok(()) => debug!(job_id = %job_id, "blob entries disposed"),
            Err(e) => warn!(job_id = %job_id, error = %e, "disposal failed"),
        }
    })
}
