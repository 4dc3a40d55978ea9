//! Configuration for the staging flow.
//!
//! Everything tunable lives in [`StageConfig`], built through its builder so
//! callers set only what they care about. The remote collaborator resolves
//! like the rest of the flow's dependencies: a pre-built
//! [`RemoteConverter`](crate::remote::RemoteConverter) injected by the caller
//! (tests, custom middleware) takes precedence over an endpoint URL from
//! which the HTTP client is constructed.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::StageError;
use crate::progress::{self, ProgressStep};
use crate::remote::{self, RemoteConverter};

/// Configuration for one staging context.
///
/// # Example
/// ```rust
/// use docstage::StageConfig;
///
/// let config = StageConfig::builder()
///     .endpoint("http://localhost:8000/process")
///     .state_dir("/tmp/docstage-demo")
///     .remote_timeout_secs(120)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct StageConfig {
    /// URL of the remote conversion endpoint. Ignored when `remote` is set.
    pub endpoint: String,

    /// Pre-constructed remote converter. Takes precedence over `endpoint`.
    pub remote: Option<Arc<dyn RemoteConverter>>,

    /// Upper bound on waiting for the conversion response. Default: 300.
    ///
    /// Exceeding it surfaces as [`StageError::RemoteTimeout`], distinct from
    /// a server-reported rejection.
    pub remote_timeout_secs: u64,

    /// Directory holding the blob store and the session descriptor.
    pub state_dir: PathBuf,

    /// The named steps the synthetic progress reporter walks through.
    pub steps: Vec<ProgressStep>,

    /// Per-step display interval. Default: 1500 ms.
    pub step_interval: Duration,

    /// Grace delay before disposal after a successful delivery, so an
    /// immediate download retry still finds the result. Default: 1000 ms.
    pub dispose_grace: Duration,

    /// Extension of the delivered artifact. Default: "docx".
    pub output_extension: String,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/process".to_string(),
            remote: None,
            remote_timeout_secs: remote::DEFAULT_TIMEOUT_SECS,
            state_dir: std::env::temp_dir().join("docstage"),
            steps: progress::default_steps(),
            step_interval: progress::DEFAULT_STEP_INTERVAL,
            dispose_grace: Duration::from_millis(1000),
            output_extension: "docx".to_string(),
        }
    }
}

impl fmt::Debug for StageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageConfig")
            .field("endpoint", &self.endpoint)
            .field("remote", &self.remote.as_ref().map(|_| "<dyn RemoteConverter>"))
            .field("remote_timeout_secs", &self.remote_timeout_secs)
            .field("state_dir", &self.state_dir)
            .field("steps", &self.steps.len())
            .field("step_interval", &self.step_interval)
            .field("dispose_grace", &self.dispose_grace)
            .field("output_extension", &self.output_extension)
            .finish()
    }
}

impl StageConfig {
    /// Create a new builder for `StageConfig`.
    pub fn builder() -> StageConfigBuilder {
        StageConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`StageConfig`].
#[derive(Debug)]
pub struct StageConfigBuilder {
    config: StageConfig,
}

impl StageConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn remote(mut self, remote: Arc<dyn RemoteConverter>) -> Self {
        self.config.remote = Some(remote);
        self
    }

    pub fn remote_timeout_secs(mut self, secs: u64) -> Self {
        self.config.remote_timeout_secs = secs.max(1);
        self
    }

    pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.state_dir = dir.into();
        self
    }

    pub fn steps(mut self, steps: Vec<ProgressStep>) -> Self {
        self.config.steps = steps;
        self
    }

    pub fn step_interval(mut self, interval: Duration) -> Self {
        self.config.step_interval = interval;
        self
    }

    pub fn dispose_grace(mut self, grace: Duration) -> Self {
        self.config.dispose_grace = grace;
        self
    }

    pub fn output_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.output_extension = ext.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<StageConfig, StageError> {
        let c = &self.config;
        if c.remote.is_none() && c.endpoint.trim().is_empty() {
            return Err(StageError::InvalidConfig(
                "either an endpoint URL or a pre-built remote converter is required".into(),
            ));
        }
        if c.steps.is_empty() {
            return Err(StageError::InvalidConfig(
                "at least one progress step is required".into(),
            ));
        }
        if c.step_interval.is_zero() {
            return Err(StageError::InvalidConfig(
                "step interval must be non-zero".into(),
            ));
        }
        Ok(self.config)
    }
}
