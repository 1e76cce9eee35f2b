//! Types returned by the project state store.

use crate::project::JobStatus;

/// Summary view used by `mgen project list` and `mgen status`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSummary {
    pub name: String,
    pub scene_count: u32,
    /// Job counts per status, in status order; statuses with no jobs are omitted.
    pub job_counts: Vec<(JobStatus, u64)>,
    pub created_at: i64,
}

impl ProjectSummary {
    pub fn count(&self, status: JobStatus) -> u64 {
        self.job_counts
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn total_jobs(&self) -> u64 {
        self.job_counts.iter().map(|(_, n)| n).sum()
    }
}
