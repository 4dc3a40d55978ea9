//! End-to-end flow tests for docstage.
//!
//! These run entirely locally: the remote conversion service is replaced by
//! in-memory fakes behind the `RemoteConverter` trait, and the blob store
//! lives in a `TempDir`. No network, no external processes.

use async_trait::async_trait;
use docstage::{
    deliver, Checkpoint, JobContext, JobStatus, RemoteConverter, Slot, SourceMeta, StageConfig,
    StageError, SyntheticProgress,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Succeeds with a fixed artifact, counting invocations.
struct FixedArtifact {
    artifact: Vec<u8>,
    calls: AtomicUsize,
}

impl FixedArtifact {
    fn new(artifact: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            artifact: artifact.to_vec(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl RemoteConverter for FixedArtifact {
    async fn convert(
        &self,
        _name: &str,
        _mime: &str,
        _payload: Vec<u8>,
    ) -> Result<Vec<u8>, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.artifact.clone())
    }
}

/// Fails every call with a fixed error.
struct FailingRemote(fn() -> StageError);

#[async_trait]
impl RemoteConverter for FailingRemote {
    async fn convert(
        &self,
        _name: &str,
        _mime: &str,
        _payload: Vec<u8>,
    ) -> Result<Vec<u8>, StageError> {
        Err((self.0)())
    }
}

/// Succeeds after a simulated processing delay.
struct SlowRemote {
    delay: Duration,
    artifact: Vec<u8>,
}

#[async_trait]
impl RemoteConverter for SlowRemote {
    async fn convert(
        &self,
        _name: &str,
        _mime: &str,
        _payload: Vec<u8>,
    ) -> Result<Vec<u8>, StageError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.artifact.clone())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn context_with(dir: &TempDir, remote: Arc<dyn RemoteConverter>) -> JobContext {
    let config = StageConfig::builder()
        .remote(remote)
        .state_dir(dir.path())
        .dispose_grace(Duration::ZERO)
        .build()
        .expect("valid config");
    JobContext::new(config).expect("context")
}

fn meta(name: &str) -> SourceMeta {
    SourceMeta {
        name: name.into(),
        size: 10,
        mime_type: "application/pdf".into(),
    }
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_flow_stages_converts_and_delivers() {
    let dir = TempDir::new().unwrap();
    let remote = FixedArtifact::new(b"converted artifact");
    let ctx = context_with(&dir, remote.clone());

    let result = ctx
        .convert_file(meta("report.pdf"), b"0123456789")
        .await
        .expect("conversion succeeds");

    assert_eq!(result.suggested_name, "report.docx");
    assert_eq!(remote.calls.load(Ordering::SeqCst), 1);

    // Result is durable before completion was signalled.
    let artifact = deliver::fetch_result(&ctx, &result.job_id)
        .await
        .unwrap()
        .expect("result present");
    assert_eq!(artifact, b"converted artifact");

    // Checkpoint after completion: deliver.
    assert_eq!(ctx.checkpoint().unwrap(), Checkpoint::Deliver);

    // Disposal removes both entries as a unit.
    deliver::dispose(&ctx, &result.job_id).await.unwrap();
    assert_eq!(
        ctx.store().get(Slot::Source, &result.job_id).await.unwrap(),
        None
    );
    assert_eq!(
        ctx.store().get(Slot::Result, &result.job_id).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn descriptor_tracks_every_transition() {
    let dir = TempDir::new().unwrap();
    let ctx = context_with(&dir, FixedArtifact::new(b"out"));

    assert_eq!(ctx.checkpoint().unwrap(), Checkpoint::Acquire);

    let mut job = ctx.stage(meta("a.pdf"), b"payload").await.unwrap();
    assert_eq!(job.status, JobStatus::Staged);
    assert_eq!(ctx.checkpoint().unwrap(), Checkpoint::Processing);

    ctx.convert(&mut job).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    let persisted = ctx.active_job().unwrap().expect("descriptor present");
    assert_eq!(persisted.id, job.id);
    assert_eq!(persisted.status, JobStatus::Completed);
}

#[tokio::test]
async fn restart_between_stage_and_convert_resumes() {
    let dir = TempDir::new().unwrap();

    // First "process": stage only, then drop the context.
    {
        let ctx = context_with(&dir, FixedArtifact::new(b"out"));
        ctx.stage(meta("resume.pdf"), b"bytes").await.unwrap();
    }

    // Second "process": rebuild everything from persisted state.
    let ctx = context_with(&dir, FixedArtifact::new(b"out"));
    assert_eq!(ctx.checkpoint().unwrap(), Checkpoint::Processing);

    let mut job = ctx.active_job().unwrap().expect("job survives restart");
    assert_eq!(job.status, JobStatus::Staged);

    let result = ctx.convert(&mut job).await.expect("resumed conversion");
    assert_eq!(result.suggested_name, "resume.docx");
}

// ── Failure paths ────────────────────────────────────────────────────────────

#[tokio::test]
async fn remote_rejection_surfaces_the_server_message() {
    let dir = TempDir::new().unwrap();
    // The remote rejects with a structured message.
    let ctx = context_with(
        &dir,
        Arc::new(FailingRemote(|| StageError::RemoteRejected {
            message: "unsupported file type".into(),
        })),
    );

    let err = ctx
        .convert_file(meta("weird.xyz"), b"???")
        .await
        .expect_err("conversion fails");
    assert_eq!(err.user_message(), "unsupported file type");

    let job = ctx.active_job().unwrap().expect("descriptor present");
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("unsupported file type"));
    assert_eq!(ctx.checkpoint().unwrap(), Checkpoint::Acquire);
}

#[tokio::test]
async fn failure_keeps_source_and_leaves_no_result() {
    let dir = TempDir::new().unwrap();
    let ctx = context_with(
        &dir,
        Arc::new(FailingRemote(|| StageError::RemoteUnreachable {
            url: "http://conv:9000/process".into(),
        })),
    );

    let mut job = ctx.stage(meta("keep.pdf"), b"source bytes").await.unwrap();
    ctx.convert(&mut job).await.expect_err("remote is down");

    // Source stays for a retry without re-upload; result slot stays empty.
    assert_eq!(
        ctx.store().get(Slot::Source, &job.id).await.unwrap().unwrap(),
        b"source bytes"
    );
    assert_eq!(ctx.store().get(Slot::Result, &job.id).await.unwrap(), None);
}

#[tokio::test]
async fn timeout_is_distinct_from_rejection() {
    let dir = TempDir::new().unwrap();
    let ctx = context_with(
        &dir,
        Arc::new(FailingRemote(|| StageError::RemoteTimeout { secs: 300 })),
    );

    let err = ctx
        .convert_file(meta("big.pdf"), b"huge")
        .await
        .expect_err("times out");
    assert!(matches!(err, StageError::RemoteTimeout { secs: 300 }));
}

#[tokio::test]
async fn missing_source_fails_with_reupload_guidance() {
    let dir = TempDir::new().unwrap();
    let ctx = context_with(&dir, FixedArtifact::new(b"out"));

    let mut job = ctx.stage(meta("gone.pdf"), b"bytes").await.unwrap();
    // Storage cleared externally between staging and submission.
    ctx.store().delete(Slot::Source, &job.id).await.unwrap();

    let err = ctx.convert(&mut job).await.expect_err("source is gone");
    assert!(matches!(err, StageError::SourceNotFound { .. }));
    assert_eq!(job.status, JobStatus::Failed);
}

#[tokio::test]
async fn failed_job_does_not_move_backwards() {
    let dir = TempDir::new().unwrap();
    let ctx = context_with(
        &dir,
        Arc::new(FailingRemote(|| StageError::RemoteRejected {
            message: "nope".into(),
        })),
    );

    let mut job = ctx.stage(meta("x.pdf"), b"p").await.unwrap();
    ctx.convert(&mut job).await.expect_err("fails");
    assert_eq!(job.status, JobStatus::Failed);

    // A second convert attempt on the same failed job is an invalid
    // transition, not a silent re-submission.
    let err = ctx.convert(&mut job).await.expect_err("terminal job");
    assert!(matches!(err, StageError::InvalidTransition { .. }));
}

// ── Session semantics ────────────────────────────────────────────────────────

#[tokio::test]
async fn staging_a_new_job_supersedes_but_keeps_old_blobs() {
    let dir = TempDir::new().unwrap();
    let ctx = context_with(&dir, FixedArtifact::new(b"out"));

    let first = ctx.convert_file(meta("first.pdf"), b"one").await.unwrap();
    let second = ctx.stage(meta("second.pdf"), b"two").await.unwrap();

    // The descriptor now names the second job...
    assert_eq!(ctx.active_job().unwrap().unwrap().id, second.id);

    // ...while the first job's entries remain until explicit disposal.
    assert!(ctx
        .store()
        .get(Slot::Result, &first.job_id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn reset_clears_descriptor_only() {
    let dir = TempDir::new().unwrap();
    let ctx = context_with(&dir, FixedArtifact::new(b"out"));

    let result = ctx.convert_file(meta("r.pdf"), b"p").await.unwrap();
    ctx.reset().unwrap();

    assert_eq!(ctx.checkpoint().unwrap(), Checkpoint::Acquire);
    // Payloads outlive the descriptor; only dispose removes them.
    assert!(deliver::fetch_result(&ctx, &result.job_id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn fetch_result_for_unknown_job_is_absent() {
    let dir = TempDir::new().unwrap();
    let ctx = context_with(&dir, FixedArtifact::new(b"out"));
    assert_eq!(
        deliver::fetch_result(&ctx, "no-such-job").await.unwrap(),
        None
    );
}

// ── Progress alongside the real call ─────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn progress_finishes_when_the_remote_returns() {
    let dir = TempDir::new().unwrap();
    // Remote returns after 3.5 step intervals; 5 steps configured.
    let ctx = Arc::new(context_with(
        &dir,
        Arc::new(SlowRemote {
            delay: Duration::from_millis(350),
            artifact: b"out".to_vec(),
        }),
    ));

    let progress = Arc::new(SyntheticProgress::start(
        ctx.config().steps.clone(),
        Duration::from_millis(100),
    ));

    let worker = {
        let ctx = Arc::clone(&ctx);
        let progress = Arc::clone(&progress);
        tokio::spawn(async move {
            let result = ctx.convert_file(meta("slow.pdf"), b"payload").await;
            progress.finish();
            result
        })
    };

    let result = worker.await.unwrap().expect("conversion succeeds");

    // The timer had advanced 3 of 5 steps when the call came back; the
    // displayed index must be the final one, not 3.
    assert_eq!(progress.current(), progress.total());
    assert!(progress.is_done());

    assert!(deliver::fetch_result(&ctx, &result.job_id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test(start_paused = true)]
async fn progress_parks_at_last_step_while_remote_hangs() {
    let dir = TempDir::new().unwrap();
    let ctx = Arc::new(context_with(
        &dir,
        Arc::new(SlowRemote {
            delay: Duration::from_secs(120),
            artifact: b"out".to_vec(),
        }),
    ));

    let progress = Arc::new(SyntheticProgress::start(
        ctx.config().steps.clone(),
        Duration::from_millis(100),
    ));

    let worker = {
        let ctx = Arc::clone(&ctx);
        let progress = Arc::clone(&progress);
        tokio::spawn(async move {
            let result = ctx.convert_file(meta("hang.pdf"), b"payload").await;
            progress.finish();
            result
        })
    };

    // Well past all five intervals, the call is still in flight: the index
    // must be parked one short of the final value.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(progress.current(), progress.total() - 1);
    assert!(!progress.is_done());

    worker.await.unwrap().expect("eventually succeeds");
    assert!(progress.is_done());
}
