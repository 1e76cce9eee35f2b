//! Remote generation provider boundary.
//!
//! The scheduler only depends on the `GenerationClient` trait: submit a prompt,
//! then poll the returned operation until it is ready or failed. Calls are
//! blocking; the scheduler runs them on tokio's blocking pool.

pub mod extract;
mod http;
mod labs;

pub use http::{post_json, HttpResponse};
pub use labs::LabsClient;
pub(crate) use labs::status_payload;

use std::path::PathBuf;

use crate::credentials::Credential;
use crate::project::JobKind;
use crate::retry::ClientError;

/// Everything the provider needs to start one generation.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub prompt: String,
    pub reference_image: Option<PathBuf>,
    pub model: String,
    pub aspect_ratio: String,
    pub kind: JobKind,
}

/// Remote status of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Pending,
    Ready,
    Failed,
}

/// Result of one poll call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult {
    pub status: RemoteStatus,
    pub artifact_url: Option<String>,
    pub error: Option<String>,
}

impl PollResult {
    pub fn pending() -> Self {
        Self {
            status: RemoteStatus::Pending,
            artifact_url: None,
            error: None,
        }
    }

    pub fn ready(url: impl Into<String>) -> Self {
        Self {
            status: RemoteStatus::Ready,
            artifact_url: Some(url.into()),
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: RemoteStatus::Failed,
            artifact_url: None,
            error: Some(reason.into()),
        }
    }
}

/// Submits and polls remote generation operations.
pub trait GenerationClient: Send + Sync {
    /// Start a generation; returns the provider's operation id.
    fn submit(&self, request: &SubmitRequest, credential: &Credential) -> Result<String, ClientError>;

    /// Check an operation started with the same credential.
    fn poll(&self, operation_id: &str, credential: &Credential) -> Result<PollResult, ClientError>;
}
