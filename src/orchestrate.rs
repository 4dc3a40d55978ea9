//! The conversion orchestrator: acquire → stage → submit → complete.
//!
//! All orchestration happens through an explicit [`JobContext`] — there is no
//! ambient "current job" anywhere in this crate. The context owns the blob
//! store handle and the remote converter; the caller threads it (and the job)
//! through every call, and the persisted session descriptor is what survives
//! a process restart.
//!
//! Ordering guarantees, per job: the source payload is durable before the
//! remote call is dispatched, and the result payload is durable before
//! `Completed` is observable anywhere (including by the checkpoint logic).
//! Exactly one remote call is made per submission; a retry after failure is
//! a new user-initiated attempt. On failure the source entry is deliberately
//! left in place so that retry does not require a re-upload.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::StageConfig;
use crate::error::StageError;
use crate::job::{Job, JobStatus, SourceMeta};
use crate::remote::{HttpConverter, RemoteConverter};
use crate::session::{self, Checkpoint, SessionDescriptor};
use crate::store::{BlobStore, Slot};

/// A reference sufficient to fetch and deliver a completed result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRef {
    pub job_id: String,
    /// Filename to suggest when delivering (source name, new extension).
    pub suggested_name: String,
}

/// Everything one staging flow needs, passed explicitly to every call.
pub struct JobContext {
    config: StageConfig,
    store: BlobStore,
    remote: Arc<dyn RemoteConverter>,
}

impl JobContext {
    /// Build a context from `config`.
    ///
    /// A pre-built converter injected via
    /// [`StageConfigBuilder::remote`](crate::config::StageConfigBuilder::remote)
    /// takes precedence; otherwise an HTTP client is constructed for the
    /// configured endpoint. No storage I/O happens here — the store opens
    /// lazily on first use.
    pub fn new(config: StageConfig) -> Result<Self, StageError> {
        let remote: Arc<dyn RemoteConverter> = match config.remote {
            Some(ref injected) => Arc::clone(injected),
            None => Arc::new(HttpConverter::new(
                config.endpoint.clone(),
                config.remote_timeout_secs,
            )?),
        };
        let store = BlobStore::new(config.state_dir.join("blobs"));
        Ok(Self {
            config,
            store,
            remote,
        })
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    pub fn store(&self) -> &BlobStore {
        &self.store
    }

    /// The navigation checkpoint, derived from the persisted descriptor
    /// alone. This is the page-load decision point after a restart.
    pub fn checkpoint(&self) -> Result<Checkpoint, StageError> {
        let descriptor = session::load(&self.config.state_dir)?;
        Ok(session::checkpoint(descriptor.as_ref()))
    }

    /// The active job reconstructed from the persisted descriptor, if any.
    pub fn active_job(&self) -> Result<Option<Job>, StageError> {
        Ok(session::load(&self.config.state_dir)?.map(SessionDescriptor::into_job))
    }

    /// Forget the active job. Its blob entries are not touched; disposal
    /// after delivery is the only path that removes payloads.
    pub fn reset(&self) -> Result<(), StageError> {
        session::clear(&self.config.state_dir)
    }

    /// Stage an acquired file: mint a job, persist its descriptor, and make
    /// the source payload durable.
    ///
    /// On success the job is `Staged` and ready for [`convert`](Self::convert).
    /// Staging a new job supersedes any previous descriptor; the previous
    /// job's blob entries are left behind (see DESIGN notes).
    pub async fn stage(&self, source: SourceMeta, payload: &[u8]) -> Result<Job, StageError> {
        let mut job = Job::new(source);
        info!(job_id = %job.id, file = %job.source.name, size = job.source.size, "staging job");
        self.persist(&job)?;

        if let Err(e) = self.store.put(Slot::Source, &job.id, payload).await {
            self.record_failure(&mut job, &e);
            return Err(e);
        }

        job.advance(JobStatus::Staged)?;
        self.persist(&job)?;
        Ok(job)
    }

    /// Run the remote conversion for a staged job.
    ///
    /// Reads the source payload back from the store, dispatches exactly one
    /// remote call, and makes the result durable before `Completed` is
    /// persisted. On any error the job moves to `Failed` with the
    /// user-facing message recorded, no partial result is left in the
    /// result slot, and the source entry stays put for retry.
    pub async fn convert(&self, job: &mut Job) -> Result<ResultRef, StageError> {
        let payload = match self.store.get(Slot::Source, &job.id).await? {
            Some(bytes) => bytes,
            None => {
                let e = StageError::SourceNotFound {
                    job_id: job.id.clone(),
                };
                self.record_failure(job, &e);
                return Err(e);
            }
        };

        job.advance(JobStatus::Submitted)?;
        self.persist(job)?;
        info!(job_id = %job.id, "job submitted");

        let artifact = match self
            .remote
            .convert(&job.source.name, &job.source.mime_type, payload)
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                self.record_failure(job, &e);
                return Err(e);
            }
        };

        // The result must be durable before Completed is observable. A
        // failed put leaves nothing in the result slot: the atomic write
        // either lands in full or not at all.
        if let Err(e) = self.store.put(Slot::Result, &job.id, &artifact).await {
            self.record_failure(job, &e);
            return Err(e);
        }

        job.advance(JobStatus::Completed)?;
        self.persist(job)?;
        info!(job_id = %job.id, bytes = artifact.len(), "job completed");

        Ok(ResultRef {
            job_id: job.id.clone(),
            suggested_name: job.suggested_output_name(&self.config.output_extension),
        })
    }

    /// Stage and convert in one go: the end-to-end `convert(file)` operation.
    pub async fn convert_file(
        &self,
        source: SourceMeta,
        payload: &[u8],
    ) -> Result<ResultRef, StageError> {
        let mut job = self.stage(source, payload).await?;
        self.convert(&mut job).await
    }

    /// Persist the job's descriptor snapshot.
    fn persist(&self, job: &Job) -> Result<(), StageError> {
        session::save(&self.config.state_dir, &SessionDescriptor::from_job(job))
    }

    /// Move `job` to `Failed` with the error's user message and persist it.
    ///
    /// Best-effort by design: the primary error is already on its way to the
    /// caller, so bookkeeping failures are logged rather than stacked on top.
    fn record_failure(&self, job: &mut Job, error: &StageError) {
        if let Err(e) = job.fail(error.user_message()) {
            warn!(job_id = %job.id, error = %e, "could not mark job failed");
            return;
        }
        if let Err(e) = self.persist(job) {
            warn!(job_id = %job.id, error = %e, "could not persist failed descriptor");
        }
    }
}
