//! The Job: one logical request to convert a source payload into a result.
//!
//! A job's status only ever moves forward:
//!
//! ```text
//! created → staged → submitted → completed
//!    └────────┴─────────┴──────→ failed
//! ```
//!
//! `completed` and `failed` are terminal. A retry after failure is a new
//! user-initiated attempt, not a backwards transition — the source payload is
//! kept in the store precisely so that retry does not need a re-upload.

use serde::{Deserialize, Serialize};

use crate::error::StageError;

/// Lifecycle status of a [`Job`]. Forward-only; see [`Job::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job id minted, descriptor written, nothing durable yet.
    Created,
    /// Source payload durable in the blob store.
    Staged,
    /// Remote call in flight.
    Submitted,
    /// Result payload durable. Terminal; eligible for disposal.
    Completed,
    /// Error recorded. Terminal; the user may start over.
    Failed,
}

impl JobStatus {
    /// Position in the forward sequence. `Failed` sits alongside `Completed`
    /// as a terminal rank so neither can be left once entered.
    fn rank(self) -> u8 {
        match self {
            JobStatus::Created => 0,
            JobStatus::Staged => 1,
            JobStatus::Submitted => 2,
            JobStatus::Completed | JobStatus::Failed => 3,
        }
    }

    /// Whether a transition `self → to` is legal.
    ///
    /// Any non-terminal status may fail; otherwise only the immediate next
    /// step in the sequence is allowed — no skipping, no going back.
    pub fn can_advance(self, to: JobStatus) -> bool {
        if self.rank() >= JobStatus::Completed.rank() {
            return false;
        }
        match to {
            JobStatus::Failed => true,
            JobStatus::Completed => self == JobStatus::Submitted,
            _ => to.rank() == self.rank() + 1,
        }
    }

    /// True for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Descriptive metadata of the acquired file, immutable once set.
///
/// No size or type validation happens here — the acquisition side hands over
/// whatever it has, and the remote service is the one that rejects input it
/// cannot handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

/// The unit of work for one conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Opaque unique id, minted at creation, never reused.
    pub id: String,
    pub source: SourceMeta,
    pub status: JobStatus,
    /// User-visible message recorded on the `Failed` transition.
    pub error: Option<String>,
}

impl Job {
    /// Mint a new job in `Created` with a fresh v4 UUID id.
    pub fn new(source: SourceMeta) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source,
            status: JobStatus::Created,
            error: None,
        }
    }

    /// Move the job to `next`, enforcing the forward-only lifecycle.
    pub fn advance(&mut self, next: JobStatus) -> Result<(), StageError> {
        if !self.status.can_advance(next) {
            return Err(StageError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Record a failure: move to `Failed` and keep the user-facing message.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), StageError> {
        self.advance(JobStatus::Failed)?;
        self.error = Some(message.into());
        Ok(())
    }

    /// The filename the delivered artifact should suggest: the source name
    /// with its extension replaced (`report.pdf` → `report.docx`).
    pub fn suggested_output_name(&self, extension: &str) -> String {
        let stem = match self.source.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => self.source.name.as_str(),
        };
        format!("{stem}.{extension}")
    }
}
