//! Scheduler and per-job error types.

use std::time::Duration;

use crate::credentials::PoolError;
use crate::downloader::DownloadError;
use crate::project::TransitionError;
use crate::retry::ClientError;

/// Why a single job ended FAILED. Its `Display` text becomes `Job::error_reason`.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Transient network errors on every attempt.
    #[error("network error after {attempts} attempts: {last}")]
    TransientNetwork { attempts: u32, last: ClientError },
    /// The provider reported that generation failed; reason is verbatim.
    #[error("{0}")]
    RemoteGenerationFailed(String),
    /// Non-retryable request failure (4xx, malformed response).
    #[error("provider request failed: {0}")]
    Client(ClientError),
    #[error("no result after polling for {0:?}")]
    PollTimeout(Duration),
    #[error("download failed")]
    Download(#[source] DownloadError),
}

impl JobError {
    /// Map a non-retried client error: provider rejections keep their message.
    pub(crate) fn from_fatal(e: ClientError) -> Self {
        match e {
            ClientError::Rejected(reason) => JobError::RemoteGenerationFailed(reason),
            other => JobError::Client(other),
        }
    }
}

/// Errors that abort a whole run (as opposed to failing one job).
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("no credentials configured; add at least one to `credentials` in config.toml")]
    NoCredentials,
    #[error("unknown project: {0}")]
    UnknownProject(String),
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error("project store: {0:#}")]
    Store(anyhow::Error),
}

impl From<PoolError> for SchedulerError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::NoCredentials => SchedulerError::NoCredentials,
        }
    }
}
