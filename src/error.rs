//! Error types for the docstage library.
//!
//! Every failure the staging flow can hit is a variant of [`StageError`].
//! The variants deliberately mirror what a *user* can do about them: storage
//! that refuses to open is fatal, a missing source payload means "re-upload",
//! a remote rejection carries the server's own message verbatim. The
//! orchestration boundary never lets one of these escape raw — it pairs the
//! error with a [`NextAction`] so the caller always knows where to send the
//! user next.

use std::path::PathBuf;
use thiserror::Error;

use crate::job::JobStatus;

/// All errors returned by the docstage library.
#[derive(Debug, Error)]
pub enum StageError {
    // ── Storage errors ────────────────────────────────────────────────────
    /// The local store could not be opened at all. Fatal to the whole flow;
    /// distinct from "entry not found", which is a normal `Ok(None)`.
    #[error("Local storage could not be opened at '{path}': {detail}")]
    StorageUnavailable { path: PathBuf, detail: String },

    /// A job references a source payload that is absent (storage was cleared
    /// externally, or the key never existed).
    #[error("Source file for job '{job_id}' was not found. Please upload the file again.")]
    SourceNotFound { job_id: String },

    /// Delivery was requested but no result payload exists for the job.
    #[error("No converted document found for job '{job_id}'. Please run the conversion again.")]
    ResultNotFound { job_id: String },

    // ── Remote errors ─────────────────────────────────────────────────────
    /// The remote call exceeded its time bound.
    #[error("The conversion service did not respond within {secs}s. The document may be too large; try again later.")]
    RemoteTimeout { secs: u64 },

    /// The remote collaborator returned a structured error. The message is
    /// the server's own text, surfaced verbatim.
    #[error("{message}")]
    RemoteRejected { message: String },

    /// No response at all (connection refused, DNS failure, dropped socket).
    #[error("Unable to reach the conversion service at '{url}'. Check that the service is running and reachable.")]
    RemoteUnreachable { url: String },

    // ── State errors ──────────────────────────────────────────────────────
    /// A job status was asked to move backwards or skip a required step.
    /// Statuses only ever move forward in the lifecycle.
    #[error("Invalid job transition: {from:?} → {to:?}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    // ── Delivery errors ───────────────────────────────────────────────────
    /// The artifact could not be written to its destination. Stored state is
    /// unaffected; the user may retry the delivery.
    #[error("Failed to save the converted document to '{path}': {source}")]
    DeliveryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// What the user should do after an error, decided at the orchestration
/// boundary. The UI layer maps these to navigation, not to error pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Return to file acquisition and start a new job.
    Reacquire,
    /// The stored result is intact; retry the download.
    RetryDelivery,
    /// Storage itself is broken; nothing short of a restart helps.
    Restart,
}

impl StageError {
    /// The recommended next action for this error kind.
    pub fn next_action(&self) -> NextAction {
        match self {
            StageError::StorageUnavailable { .. } => NextAction::Restart,
            StageError::DeliveryFailed { .. } => NextAction::RetryDelivery,
            _ => NextAction::Reacquire,
        }
    }

    /// The single user-facing message for this error.
    ///
    /// For [`StageError::RemoteRejected`] this is the remote service's own
    /// message, untouched; every other variant renders its `Display` text.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}
