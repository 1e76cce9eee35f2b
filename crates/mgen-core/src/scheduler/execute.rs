//! Per-job execution: submit (through the credential pool), poll, download.

use std::path::Path;
use std::sync::Arc;
use tokio::time::Instant;

use super::error::{JobError, SchedulerError};
use super::events::RunEvent;
use super::plan::{QueuedJob, RunRequest};
use super::run::Scheduler;
use crate::credentials::Credential;
use crate::generation::{PollResult, RemoteStatus, SubmitRequest};
use crate::project::{artifact_path, Job, JobStatus};
use crate::retry::{classify, run_with_retry, ClientError, RetryDecision, RetryFailure};
use crate::state_db::unix_timestamp;

/// How a phase ended when it did not hand the job on to the next one.
enum Stop {
    Failed(JobError),
    Cancelled,
}

impl From<RetryFailure> for Stop {
    fn from(f: RetryFailure) -> Self {
        match f {
            RetryFailure::Exhausted { attempts, last } => {
                Stop::Failed(JobError::TransientNetwork { attempts, last })
            }
            RetryFailure::Fatal(e) => Stop::Failed(JobError::from_fatal(e)),
            RetryFailure::Cancelled => Stop::Cancelled,
        }
    }
}

fn join_error(what: &str, e: tokio::task::JoinError) -> ClientError {
    ClientError::Transport(format!("{} task: {}", what, e))
}

impl Scheduler {
    /// Run one job to a terminal state. Job-level failures end as FAILED on the
    /// returned job; only store errors and state-machine violations are `Err`.
    pub(super) async fn execute_job(
        &mut self,
        queued: QueuedJob,
        request: &RunRequest,
        project_root: &Path,
    ) -> Result<Job, SchedulerError> {
        let QueuedJob {
            mut job,
            prompt,
            reference_image,
        } = queued;

        let submit = SubmitRequest {
            prompt,
            reference_image,
            model: request.model.clone(),
            aspect_ratio: request.aspect_ratio.clone(),
            kind: job.kind,
        };

        let credential = match self.submit(&job, &submit).await {
            Ok((operation_id, credential)) => {
                job.remote_operation_id = Some(operation_id);
                job.transition(JobStatus::Submitted)?;
                self.record(&job, 0).await?;
                credential
            }
            Err(stop) => return self.finish(job, stop).await,
        };

        match self.poll_until_done(&mut job, &credential).await? {
            Ok(url) => {
                job.remote_url = Some(url);
                job.transition(JobStatus::Ready)?;
                self.record(&job, 0).await?;
            }
            Err(stop) => return self.finish(job, stop).await,
        }

        job.transition(JobStatus::Downloading)?;
        self.record(&job, 0).await?;
        let dest = artifact_path(project_root, job.kind, job.scene_index, job.copy_index);
        match self.download(&job, &dest).await {
            Ok(path) => {
                job.local_path = Some(path);
                job.completed_at = Some(unix_timestamp());
                job.transition(JobStatus::Downloaded)?;
                self.record(&job, 0).await?;
                tracing::info!(job = %job.label(), "job downloaded");
                Ok(job)
            }
            Err(e) => self.finish(job, Stop::Failed(e)).await,
        }
    }

    /// Wait out the spacing for the next request. `None` if cancelled while waiting.
    async fn acquire(&self, job: &Job) -> Option<Credential> {
        let acquisition = self.pool.acquire(self.settings.spacing_policy);
        if !acquisition.wait.is_zero() {
            tracing::debug!(
                job = %job.label(),
                wait_ms = acquisition.wait.as_millis() as u64,
                "waiting for request spacing"
            );
            self.emit(RunEvent::Waiting {
                project: job.project_id.clone(),
                scene_index: job.scene_index,
                copy_index: job.copy_index,
                wait: acquisition.wait,
            })
            .await;
            if !self.control.sleep(acquisition.wait).await {
                return None;
            }
        }
        Some(acquisition.credential)
    }

    /// Submit through the credential pool. Every attempt, retries included,
    /// waits out the spacing, takes the least-recently-used credential and
    /// stamps the pool with the instant the request actually went out.
    /// Returns the operation id and the credential that created it.
    async fn submit(
        &mut self,
        job: &Job,
        request: &SubmitRequest,
    ) -> Result<(String, Credential), Stop> {
        let mut attempt = 1u32;
        loop {
            let Some(credential) = self.acquire(job).await else {
                return Err(Stop::Cancelled);
            };
            self.emit(RunEvent::RequestStarted {
                project: job.project_id.clone(),
                scene_index: job.scene_index,
                copy_index: job.copy_index,
                kind: job.kind,
                credential_id: credential.id.clone(),
                at: Instant::now(),
            })
            .await;
            tracing::debug!(
                job = %job.label(),
                attempt,
                credential = %credential.id,
                secret = %credential.masked(),
                "submitting"
            );

            let client = Arc::clone(&self.client);
            let (req, cred) = (request.clone(), credential.clone());
            let (started, result) = tokio::task::spawn_blocking(move || {
                let started = Instant::now();
                (started, client.submit(&req, &cred))
            })
            .await
            .unwrap_or_else(|e| (Instant::now(), Err(join_error("submit", e))));
            self.pool.mark_started(&credential.id, started);

            let err = match result {
                Ok(operation_id) => return Ok((operation_id, credential)),
                Err(e) => e,
            };
            match self.settings.retry.decide(attempt, classify(&err)) {
                RetryDecision::GiveUp => return Err(RetryFailure::give_up(attempt, err).into()),
                RetryDecision::NextCredential => {
                    tracing::warn!(
                        job = %job.label(),
                        attempt,
                        credential = %credential.id,
                        error = %err,
                        "submit throttled, rotating credential"
                    );
                }
                RetryDecision::Backoff(delay) => {
                    tracing::warn!(
                        job = %job.label(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "submit failed, retrying"
                    );
                    if !self.control.sleep(delay).await {
                        return Err(Stop::Cancelled);
                    }
                }
            }
            attempt += 1;
        }
    }

    /// Poll until the operation is ready (returns the artifact URL) or stops.
    /// Each pending answer is one POLLING transition.
    async fn poll_until_done(
        &self,
        job: &mut Job,
        credential: &Credential,
    ) -> Result<Result<String, Stop>, SchedulerError> {
        let Some(operation_id) = job.remote_operation_id.clone() else {
            return Ok(Err(Stop::Failed(JobError::Client(ClientError::Malformed(
                "no operation id".into(),
            )))));
        };
        let started = Instant::now();
        let mut delay = self.settings.poll_interval;
        let mut attempt = 0u32;

        loop {
            let elapsed = started.elapsed();
            if elapsed >= self.settings.poll_timeout {
                return Ok(Err(Stop::Failed(JobError::PollTimeout(
                    self.settings.poll_timeout,
                ))));
            }
            let remaining = self.settings.poll_timeout - elapsed;
            if !self.control.sleep(delay.min(remaining)).await {
                return Ok(Err(Stop::Cancelled));
            }
            if self.control.is_cancelled() {
                return Ok(Err(Stop::Cancelled));
            }

            attempt += 1;
            let result = match self.poll_once(&operation_id, credential).await {
                Ok(r) => r,
                Err(stop) => return Ok(Err(stop)),
            };
            match result.status {
                RemoteStatus::Pending => {
                    job.transition(JobStatus::Polling)?;
                    self.record(job, attempt).await?;
                    delay = self.settings.next_poll_delay(delay);
                }
                RemoteStatus::Ready => {
                    // READY is only reachable from POLLING.
                    job.transition(JobStatus::Polling)?;
                    self.record(job, attempt).await?;
                    return Ok(match result.artifact_url {
                        Some(url) => Ok(url),
                        None => Err(Stop::Failed(JobError::RemoteGenerationFailed(
                            "operation succeeded but no artifact URL was returned".into(),
                        ))),
                    });
                }
                RemoteStatus::Failed => {
                    let reason = result
                        .error
                        .unwrap_or_else(|| "generation failed".to_string());
                    return Ok(Err(Stop::Failed(JobError::RemoteGenerationFailed(reason))));
                }
            }
        }
    }

    async fn poll_once(&self, operation_id: &str, credential: &Credential) -> Result<PollResult, Stop> {
        let client = Arc::clone(&self.client);
        let out = run_with_retry(&self.settings.retry, &self.control, || {
            let client = Arc::clone(&client);
            let operation_id = operation_id.to_string();
            let credential = credential.clone();
            async move {
                tokio::task::spawn_blocking(move || client.poll(&operation_id, &credential))
                    .await
                    .unwrap_or_else(|e| Err(join_error("poll", e)))
            }
        })
        .await?;
        Ok(out)
    }

    /// Download on the blocking pool; progress goes out as best-effort events.
    async fn download(&self, job: &Job, dest: &Path) -> Result<std::path::PathBuf, JobError> {
        let Some(url) = job.remote_url.clone() else {
            return Err(JobError::RemoteGenerationFailed("no artifact URL".into()));
        };
        let downloader = self.downloader.clone();
        let dest = dest.to_path_buf();
        let events = self.events.clone();
        let (project, scene_index, copy_index) =
            (job.project_id.clone(), job.scene_index, job.copy_index);

        let result = tokio::task::spawn_blocking(move || {
            let path = dest.clone();
            downloader.download(&url, &dest, &mut |bytes: u64| {
                if let Some(tx) = &events {
                    let _ = tx.try_send(RunEvent::DownloadProgress {
                        project: project.clone(),
                        scene_index,
                        copy_index,
                        path: path.clone(),
                        bytes,
                    });
                }
            })
        })
        .await;

        match result {
            Ok(Ok(path)) => Ok(path),
            Ok(Err(e)) => {
                tracing::warn!(job = %job.label(), error = %e, "download failed");
                Err(JobError::Download(e))
            }
            Err(e) => {
                tracing::warn!(job = %job.label(), error = %e, "download task failed");
                Err(JobError::Download(crate::downloader::DownloadError::Transfer(
                    e.to_string(),
                )))
            }
        }
    }

    /// Move the job to FAILED or CANCELLED, persist, and return it.
    async fn finish(&self, mut job: Job, stop: Stop) -> Result<Job, SchedulerError> {
        match stop {
            Stop::Failed(e) => {
                tracing::warn!(job = %job.label(), error = %e, "job failed");
                job.error_reason = Some(e.to_string());
                job.transition(JobStatus::Failed)?;
            }
            Stop::Cancelled => {
                tracing::info!(job = %job.label(), "job cancelled");
                job.transition(JobStatus::Cancelled)?;
            }
        }
        job.completed_at = Some(unix_timestamp());
        self.record(&job, 0).await?;
        Ok(job)
    }
}
