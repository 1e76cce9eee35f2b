//! Events sent from the run worker to the controlling side.

use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

use super::run::RunSummary;
use crate::project::{Job, JobKind};

/// A job status change, sent after the change has been persisted.
#[derive(Debug, Clone)]
pub struct JobEvent {
    /// Snapshot of the job after the transition.
    pub job: Job,
    /// 1-based poll iteration for POLLING events, 0 otherwise.
    pub poll_attempt: u32,
}

#[derive(Debug, Clone)]
pub enum RunEvent {
    ProjectStarted {
        project: String,
        queued: usize,
        skipped: u32,
    },
    /// The next request must wait out the credential spacing.
    Waiting {
        project: String,
        scene_index: u32,
        copy_index: u32,
        wait: Duration,
    },
    /// A submit request is starting at the reserved instant `at`.
    RequestStarted {
        project: String,
        scene_index: u32,
        copy_index: u32,
        kind: JobKind,
        credential_id: String,
        at: Instant,
    },
    Job(JobEvent),
    /// Cumulative bytes written for the artifact at `path`. Best effort; may be dropped.
    DownloadProgress {
        project: String,
        scene_index: u32,
        copy_index: u32,
        path: PathBuf,
        bytes: u64,
    },
    ProjectFinished {
        project: String,
        summary: RunSummary,
    },
}
