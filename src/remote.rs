//! The remote conversion collaborator: one multipart POST, one artifact back.
//!
//! The service is an opaque request/response call — no streaming, no
//! observable progress. The payload goes up as a multipart form field named
//! `file`; on success the full response body is the converted artifact with
//! no extra framing, and on failure the body is a structured JSON error with
//! a human-readable message (`detail` or `message`). Success and failure are
//! told apart by HTTP status, never by sniffing the payload.
//!
//! [`RemoteConverter`] is the seam: orchestration and tests depend on the
//! trait, and [`HttpConverter`] is the one production implementation.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::StageError;

/// Default upper bound on waiting for the conversion response.
///
/// Conversion of a large scanned document can legitimately take minutes;
/// five of them is the point where we stop assuming the server is alive.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// The opaque remote conversion call.
///
/// Implementations must make exactly one request per invocation — retry
/// policy belongs to the user, not to this layer.
#[async_trait]
pub trait RemoteConverter: Send + Sync {
    /// Convert `payload` and return the artifact bytes.
    async fn convert(
        &self,
        file_name: &str,
        mime_type: &str,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, StageError>;
}

/// HTTP implementation of [`RemoteConverter`].
pub struct HttpConverter {
    client: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
}

impl HttpConverter {
    /// Build a client for `endpoint` with the request timeout applied at
    /// the `reqwest::Client` level, so the bound covers the whole exchange.
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self, StageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StageError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout_secs,
        })
    }
}

#[async_trait]
impl RemoteConverter for HttpConverter {
    async fn convert(
        &self,
        file_name: &str,
        mime_type: &str,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, StageError> {
        info!(
            endpoint = %self.endpoint,
            file = file_name,
            bytes = payload.len(),
            "dispatching conversion request"
        );

        let part = reqwest::multipart::Part::bytes(payload)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| StageError::Internal(format!("invalid MIME type '{mime_type}': {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.triage_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(rejection_from_body(
                status,
                response.bytes().await.ok().map(|b| b.to_vec()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.triage_transport(e))?;
        debug!(bytes = bytes.len(), "conversion artifact received");
        Ok(bytes.to_vec())
    }
}

impl HttpConverter {
    /// Map transport-level failures onto the timeout / unreachable split.
    fn triage_transport(&self, e: reqwest::Error) -> StageError {
        if e.is_timeout() {
            StageError::RemoteTimeout {
                secs: self.timeout_secs,
            }
        } else {
            StageError::RemoteUnreachable {
                url: self.endpoint.clone(),
            }
        }
    }
}

/// Extract the server's message from a non-success response body.
///
/// The service reports errors as JSON with a `detail` field (FastAPI style)
/// or `message`; plain-text bodies are used as-is, and anything unusable
/// falls back to a generic status line.
fn rejection_from_body(status: reqwest::StatusCode, body: Option<Vec<u8>>) -> StageError {
    let message = body
        .as_deref()
        .and_then(extract_error_message)
        .unwrap_or_else(|| format!("Conversion failed with server error {status}"));
    StageError::RemoteRejected { message }
}

fn extract_error_message(body: &[u8]) -> Option<String> {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        for field in ["detail", "message"] {
            if let Some(s) = value.get(field).and_then(|v| v.as_str()) {
                if !s.is_empty() {
                    return Some(s.to_string());
                }
            }
        }
        return None;
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    (!text.is_empty()).then_some(text)
}
