//! Run one project or all projects in order.

use std::sync::Arc;
use tokio::sync::mpsc;

use super::error::SchedulerError;
use super::events::{JobEvent, RunEvent};
use super::plan::{build_queue, RunRequest};
use super::settings::SchedulerSettings;
use crate::control::RunControl;
use crate::credentials::CredentialPool;
use crate::downloader::Downloader;
use crate::generation::GenerationClient;
use crate::project::{project_root, Job, JobStatus};
use crate::state_db::ProjectStateStore;

/// Outcome counts for one project run.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunSummary {
    pub downloaded: u32,
    pub failed: u32,
    pub cancelled: u32,
    /// Slots already DOWNLOADED before the run.
    pub skipped: u32,
    /// Queued jobs left PENDING because the run was cancelled first.
    pub not_started: u32,
}

impl RunSummary {
    fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Downloaded => self.downloaded += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
            _ => self.not_started += 1,
        }
    }
}

/// Drives generation jobs for one worker. Owns the credential pool, so spacing
/// holds across every project this scheduler runs.
pub struct Scheduler {
    pub(super) client: Arc<dyn GenerationClient>,
    pub(super) downloader: Downloader,
    pub(super) store: ProjectStateStore,
    pub(super) pool: CredentialPool,
    pub(super) control: RunControl,
    pub(super) events: Option<mpsc::Sender<RunEvent>>,
    pub(super) settings: SchedulerSettings,
}

impl Scheduler {
    /// Fails with `NoCredentials` before anything touches the network.
    pub fn new(
        client: Arc<dyn GenerationClient>,
        downloader: Downloader,
        store: ProjectStateStore,
        settings: SchedulerSettings,
    ) -> Result<Self, SchedulerError> {
        let pool = CredentialPool::new(&settings.credentials, settings.min_spacing)?;
        Ok(Self {
            client,
            downloader,
            store,
            pool,
            control: RunControl::new(),
            events: None,
            settings,
        })
    }

    /// Send `RunEvent`s to `tx` for the rest of this scheduler's life.
    pub fn with_events(mut self, tx: mpsc::Sender<RunEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Use an externally owned cancel flag (e.g. shared with a Ctrl-C handler).
    pub fn with_control(mut self, control: RunControl) -> Self {
        self.control = control;
        self
    }

    /// Handle for cancelling the run from another task.
    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    /// Run every queued job of one project, in queue order.
    ///
    /// Job failures are recorded on the job and never abort the run; only
    /// store errors and an unknown project do.
    pub async fn run_project(&mut self, request: &RunRequest) -> Result<RunSummary, SchedulerError> {
        self.store
            .recover_interrupted(&request.project)
            .await
            .map_err(SchedulerError::Store)?;
        let mut project = self
            .store
            .load_project(&request.project)
            .await
            .map_err(SchedulerError::Store)?
            .ok_or_else(|| SchedulerError::UnknownProject(request.project.clone()))?;

        let (queue, skipped) = build_queue(&mut project, request.kind, request.copies);
        for queued in &queue {
            self.store
                .save_job(&queued.job)
                .await
                .map_err(SchedulerError::Store)?;
        }

        tracing::info!(
            project = %project.name,
            queued = queue.len(),
            skipped,
            kind = %request.kind,
            "project run started"
        );
        self.emit(RunEvent::ProjectStarted {
            project: project.name.clone(),
            queued: queue.len(),
            skipped,
        })
        .await;

        let root = project_root(&self.settings.download_root, &project.name);
        let mut summary = RunSummary {
            skipped,
            ..RunSummary::default()
        };
        for queued in queue {
            if self.control.is_cancelled() {
                summary.record(JobStatus::Pending);
                continue;
            }
            let job = self.execute_job(queued, request, &root).await?;
            summary.record(job.status);
        }

        tracing::info!(project = %project.name, ?summary, "project run finished");
        self.emit(RunEvent::ProjectFinished {
            project: project.name.clone(),
            summary: summary.clone(),
        })
        .await;
        Ok(summary)
    }

    /// Run projects strictly one after another. Stops starting new projects once
    /// cancelled. Every project must exist before the first one starts.
    pub async fn run_all(
        &mut self,
        requests: &[RunRequest],
    ) -> Result<Vec<(String, RunSummary)>, SchedulerError> {
        let known = self.store.project_names().await.map_err(SchedulerError::Store)?;
        if let Some(missing) = requests.iter().find(|r| !known.contains(&r.project)) {
            return Err(SchedulerError::UnknownProject(missing.project.clone()));
        }

        let mut out = Vec::with_capacity(requests.len());
        for request in requests {
            if self.control.is_cancelled() {
                tracing::info!(project = %request.project, "run cancelled; project not started");
                break;
            }
            let summary = self.run_project(request).await?;
            out.push((request.project.clone(), summary));
        }
        Ok(out)
    }

    /// Persist the job, then tell the controller about it.
    pub(super) async fn record(&self, job: &Job, poll_attempt: u32) -> Result<(), SchedulerError> {
        self.store.save_job(job).await.map_err(SchedulerError::Store)?;
        tracing::debug!(
            project = %job.project_id,
            scene = job.scene_index,
            copy = job.copy_index,
            status = %job.status,
            poll_attempt,
            "job status"
        );
        self.emit(RunEvent::Job(JobEvent {
            job: job.clone(),
            poll_attempt,
        }))
        .await;
        Ok(())
    }

    pub(super) async fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event).await;
        }
    }
}
