//! Job status state machine.

/// Lifecycle of one generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Submitted,
    Polling,
    Ready,
    Downloading,
    Downloaded,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid job transition {from} -> {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Submitted => "SUBMITTED",
            JobStatus::Polling => "POLLING",
            JobStatus::Ready => "READY",
            JobStatus::Downloading => "DOWNLOADING",
            JobStatus::Downloaded => "DOWNLOADED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    /// Parse a stored status. Unknown strings map to `Failed` so a corrupt row is never re-run as done.
    pub fn from_str(s: &str) -> Self {
        match s {
            "PENDING" => JobStatus::Pending,
            "SUBMITTED" => JobStatus::Submitted,
            "POLLING" => JobStatus::Polling,
            "READY" => JobStatus::Ready,
            "DOWNLOADING" => JobStatus::Downloading,
            "DOWNLOADED" => JobStatus::Downloaded,
            "CANCELLED" => JobStatus::Cancelled,
            _ => JobStatus::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Downloaded | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// True if `self -> next` is an edge of the job state machine.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        if next == Cancelled {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Pending, Submitted)
                | (Pending, Failed)
                | (Submitted, Polling)
                | (Submitted, Failed)
                | (Polling, Polling)
                | (Polling, Ready)
                | (Polling, Failed)
                | (Ready, Downloading)
                | (Downloading, Downloaded)
                | (Downloading, Failed)
        )
    }

    pub fn transition(self, next: JobStatus) -> Result<JobStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError { from: self, to: next })
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
