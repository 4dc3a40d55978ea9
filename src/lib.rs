//! # docstage
//!
//! Local staging and orchestration for a document-conversion workflow.
//!
//! ## Why this crate?
//!
//! Remote document conversion (OCR, layout detection, reconstruction) is a
//! single opaque call of unbounded duration. Everything around that call is
//! the hard part: the acquired file must be held durably before submission,
//! the result must be held until downloaded, the flow must survive a process
//! restart at any step, the user needs progress feedback for work whose real
//! progress is unobservable, and transient payloads must be neither lost
//! before use nor retained after it. docstage is that staging layer.
//!
//! ## Flow Overview
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Stage     payload → blob store (source slot), descriptor persisted
//!  ├─ 2. Submit    one multipart POST to the conversion service
//!  │                 └─ synthetic progress ticks concurrently
//!  ├─ 3. Complete  artifact → blob store (result slot), then observable
//!  ├─ 4. Deliver   artifact saved to the host's download location
//!  └─ 5. Dispose   both blob entries removed after a short grace delay
//! ```
//!
//! At any restart the flow resumes from the persisted session descriptor:
//! no job → acquire, staged/submitted → progress, completed → deliver.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docstage::{deliver, JobContext, SourceMeta, StageConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StageConfig::builder()
//!         .endpoint("http://localhost:8000/process")
//!         .state_dir("/tmp/docstage")
//!         .build()?;
//!     let ctx = JobContext::new(config)?;
//!
//!     let payload = std::fs::read("scan.pdf")?;
//!     let meta = SourceMeta {
//!         name: "scan.pdf".into(),
//!         size: payload.len() as u64,
//!         mime_type: "application/pdf".into(),
//!     };
//!
//!     let result = ctx.convert_file(meta, &payload).await?;
//!     let bytes = deliver::fetch_result(&ctx, &result.job_id)
//!         .await?
//!         .expect("result just completed");
//!     deliver::save_to("downloads".as_ref(), &result.suggested_name, &bytes).await?;
//!     deliver::dispose(&ctx, &result.job_id);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docstage` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docstage = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod deliver;
pub mod error;
pub mod job;
pub mod orchestrate;
pub mod progress;
pub mod remote;
pub mod session;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{StageConfig, StageConfigBuilder};
pub use error::{NextAction, StageError};
pub use job::{Job, JobStatus, SourceMeta};
pub use orchestrate::{JobContext, ResultRef};
pub use progress::{default_steps, ProgressStep, SyntheticProgress, DEFAULT_STEP_INTERVAL};
pub use remote::{HttpConverter, RemoteConverter, DEFAULT_TIMEOUT_SECS};
pub use session::{checkpoint, Checkpoint, SessionDescriptor};
pub use store::{BlobStore, Slot};
