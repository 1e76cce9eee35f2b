//! Scheduler tests with a scripted provider and in-memory artifact source.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::*;
use crate::control::RunControl;
use crate::credentials::{Credential, SpacingPolicy};
use crate::downloader::{ArtifactSource, ChunkSink, DownloadError, Downloader};
use crate::generation::{GenerationClient, PollResult, SubmitRequest};
use crate::project::{artifact_path, project_root, JobKind, JobStatus, Project};
use crate::retry::{ClientError, RetryPolicy};
use crate::state_db::ProjectStateStore;

const SPACING: Duration = Duration::from_millis(30);

/// Behaviour of the provider for one scene (selected by the prompt, which is the scene's 0-based position).
#[derive(Clone, Copy)]
enum Script {
    Ready { pending_polls: u32 },
    /// Submit answers 503 (rate limited) this many times first.
    FlakySubmit { failures: u32 },
    /// Submit answers 500 this many times first.
    ServerErrorSubmit { failures: u32 },
    RejectSubmit,
    RemoteFailure,
    CancelWhilePolling,
    EmptyArtifact,
}

#[derive(Default)]
struct Calls {
    submits: HashMap<usize, u32>,
    polls: HashMap<usize, u32>,
}

struct FakeClient {
    scripts: Vec<Script>,
    control: RunControl,
    calls: Mutex<Calls>,
    /// When each submit call actually ran, and with which credential.
    submit_log: Mutex<Vec<(Instant, String)>>,
}

impl FakeClient {
    fn new(scripts: Vec<Script>, control: RunControl) -> Self {
        Self {
            scripts,
            control,
            calls: Mutex::new(Calls::default()),
            submit_log: Mutex::new(Vec::new()),
        }
    }

    fn submit_log(&self) -> Vec<(Instant, String)> {
        self.submit_log.lock().unwrap().clone()
    }

    fn submits(&self, idx: usize) -> u32 {
        self.calls.lock().unwrap().submits.get(&idx).copied().unwrap_or(0)
    }

    fn polls(&self, idx: usize) -> u32 {
        self.calls.lock().unwrap().polls.get(&idx).copied().unwrap_or(0)
    }

    fn total_calls(&self) -> u32 {
        let calls = self.calls.lock().unwrap();
        calls.submits.values().sum::<u32>() + calls.polls.values().sum::<u32>()
    }
}

impl GenerationClient for FakeClient {
    fn submit(&self, request: &SubmitRequest, credential: &Credential) -> Result<String, ClientError> {
        let now = Instant::now();
        self.submit_log
            .lock()
            .unwrap()
            .push((now, credential.id.clone()));
        let idx: usize = request.prompt.parse().unwrap();
        let n = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.submits.entry(idx).or_default();
            *n += 1;
            *n
        };
        match self.scripts[idx] {
            Script::FlakySubmit { failures } if n <= failures => Err(ClientError::Http(503)),
            Script::ServerErrorSubmit { failures } if n <= failures => Err(ClientError::Http(500)),
            Script::RejectSubmit => Err(ClientError::Rejected("PUBLIC_ERROR_MINOR_UPLOAD".into())),
            _ => Ok(format!("op-{}", idx)),
        }
    }

    fn poll(&self, operation_id: &str, _credential: &Credential) -> Result<PollResult, ClientError> {
        let idx: usize = operation_id.trim_start_matches("op-").parse().unwrap();
        let n = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.polls.entry(idx).or_default();
            *n += 1;
            *n
        };
        let url = format!("mem://artifact/{}", idx);
        Ok(match self.scripts[idx] {
            Script::Ready { pending_polls } if n <= pending_polls => PollResult::pending(),
            Script::RemoteFailure => PollResult::failed("PUBLIC_ERROR_UNSAFE_GENERATION"),
            Script::CancelWhilePolling => {
                self.control.cancel();
                PollResult::pending()
            }
            Script::EmptyArtifact => PollResult::ready("mem://empty"),
            _ => PollResult::ready(url),
        })
    }
}

struct MemorySource;

impl ArtifactSource for MemorySource {
    fn fetch(&self, url: &str, sink: &mut ChunkSink<'_>) -> Result<u64, DownloadError> {
        if url.contains("empty") {
            return Ok(0);
        }
        let body = b"\x00\x00\x00\x18ftypmp42\x00\x00\x00\x00";
        sink(body)?;
        Ok(body.len() as u64)
    }
}

struct Harness {
    scheduler: Scheduler,
    client: Arc<FakeClient>,
    store: ProjectStateStore,
    events: mpsc::Receiver<RunEvent>,
    download_root: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

fn settings(download_root: &std::path::Path) -> SchedulerSettings {
    SchedulerSettings {
        credentials: vec!["tok-a".into(), "tok-b".into(), "tok-c".into()],
        min_spacing: SPACING,
        spacing_policy: SpacingPolicy::ExemptFirst,
        poll_interval: Duration::from_millis(5),
        poll_backoff_factor: 1.0,
        max_poll_interval: Duration::from_millis(5),
        poll_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        },
        download_root: download_root.to_path_buf(),
    }
}

async fn harness(projects: &[&str], scripts: Vec<Script>, tweak: impl FnOnce(&mut SchedulerSettings)) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = ProjectStateStore::open_at(dir.path().join("projects.db"))
        .await
        .unwrap();
    let prompts: Vec<String> = (0..scripts.len()).map(|i| i.to_string()).collect();
    for name in projects {
        store
            .create_project(&Project::from_prompts(name, prompts.clone()))
            .await
            .unwrap();
    }

    let control = RunControl::new();
    let client = Arc::new(FakeClient::new(scripts, control.clone()));
    let download_root = dir.path().join("out");
    let mut s = settings(&download_root);
    tweak(&mut s);
    let (tx, rx) = mpsc::channel(4096);
    let scheduler = Scheduler::new(
        client.clone(),
        Downloader::new(Arc::new(MemorySource)),
        store.clone(),
        s,
    )
    .unwrap()
    .with_control(control)
    .with_events(tx);

    Harness {
        scheduler,
        client,
        store,
        events: rx,
        download_root,
        _dir: dir,
    }
}

fn request(project: &str) -> RunRequest {
    RunRequest {
        project: project.to_string(),
        kind: JobKind::Video,
        copies: 1,
        model: "veo_3_fast".into(),
        aspect_ratio: "16:9".into(),
    }
}

fn drain(rx: &mut mpsc::Receiver<RunEvent>) -> Vec<RunEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

fn statuses_for(events: &[RunEvent], scene: u32) -> Vec<JobStatus> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Job(j) if j.job.scene_index == scene => Some(j.job.status),
            _ => None,
        })
        .collect()
}

async fn stored_status(store: &ProjectStateStore, project: &str, scene: u32) -> JobStatus {
    store
        .load_project(project)
        .await
        .unwrap()
        .unwrap()
        .scene(scene)
        .unwrap()
        .job(JobKind::Video, 1)
        .unwrap()
        .status
}

const READY: Script = Script::Ready { pending_polls: 0 };

/// Every pair of consecutive submit calls, as seen by the provider, is at least `SPACING` apart.
fn assert_spaced(log: &[(Instant, String)]) {
    for w in log.windows(2) {
        let gap = w[1].0 - w[0].0;
        assert!(gap >= SPACING, "submits only {:?} apart", gap);
    }
}

#[tokio::test]
async fn runs_queue_in_order_with_global_spacing() {
    let mut h = harness(&["demo"], vec![Script::Ready { pending_polls: 1 }; 5], |_| {}).await;
    let summary = h.scheduler.run_project(&request("demo")).await.unwrap();
    assert_eq!(summary.downloaded, 5);
    assert_eq!(summary.failed + summary.cancelled + summary.not_started, 0);

    let events = drain(&mut h.events);
    let scenes: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::RequestStarted { scene_index, .. } => Some(*scene_index),
            _ => None,
        })
        .collect();
    assert_eq!(scenes, vec![1, 2, 3, 4, 5]);

    let log = h.client.submit_log();
    assert_eq!(
        log.iter().map(|(_, id)| id.as_str()).collect::<Vec<_>>(),
        vec!["cred-1", "cred-2", "cred-3", "cred-1", "cred-2"]
    );
    assert_spaced(&log);

    assert_eq!(
        statuses_for(&events, 1),
        vec![
            JobStatus::Submitted,
            JobStatus::Polling,
            JobStatus::Polling,
            JobStatus::Ready,
            JobStatus::Downloading,
            JobStatus::Downloaded,
        ]
    );
    for scene in 1..=5 {
        let mut prev = JobStatus::Pending;
        for s in statuses_for(&events, scene) {
            assert!(prev.can_transition_to(s), "{} -> {}", prev, s);
            prev = s;
        }
        let path = artifact_path(
            &project_root(&h.download_root, "demo"),
            JobKind::Video,
            scene,
            1,
        );
        assert!(path.exists(), "{}", path.display());
        assert_eq!(stored_status(&h.store, "demo", scene).await, JobStatus::Downloaded);
    }
    assert!(matches!(events.first(), Some(RunEvent::ProjectStarted { queued: 5, .. })));
    assert!(matches!(events.last(), Some(RunEvent::ProjectFinished { .. })));
}

#[tokio::test]
async fn cancel_while_polling_stops_the_run() {
    let scripts = vec![READY, READY, READY, Script::CancelWhilePolling, READY];
    let mut h = harness(&["demo"], scripts, |_| {}).await;
    let summary = h.scheduler.run_project(&request("demo")).await.unwrap();
    assert_eq!(
        summary,
        RunSummary {
            downloaded: 3,
            failed: 0,
            cancelled: 1,
            skipped: 0,
            not_started: 1,
        }
    );
    for scene in 1..=3 {
        assert_eq!(stored_status(&h.store, "demo", scene).await, JobStatus::Downloaded);
    }
    assert_eq!(stored_status(&h.store, "demo", 4).await, JobStatus::Cancelled);
    assert_eq!(stored_status(&h.store, "demo", 5).await, JobStatus::Pending);
    assert_eq!(h.client.submits(4), 0);

    let events = drain(&mut h.events);
    assert_eq!(
        statuses_for(&events, 4),
        vec![JobStatus::Submitted, JobStatus::Polling, JobStatus::Cancelled]
    );
    assert!(statuses_for(&events, 5).is_empty());
}

#[tokio::test]
async fn throttled_submits_go_back_through_the_pool() {
    let scripts = vec![Script::FlakySubmit { failures: 2 }, READY];
    let mut h = harness(&["demo"], scripts, |_| {}).await;
    let summary = h.scheduler.run_project(&request("demo")).await.unwrap();
    assert_eq!(summary.downloaded, 2);
    assert_eq!(h.client.submits(0), 3);

    let log = h.client.submit_log();
    assert_eq!(
        log.iter().map(|(_, id)| id.as_str()).collect::<Vec<_>>(),
        vec!["cred-1", "cred-2", "cred-3", "cred-1"]
    );
    assert_spaced(&log);
}

#[tokio::test]
async fn server_errors_are_retried_with_spacing_kept() {
    let scripts = vec![Script::ServerErrorSubmit { failures: 1 }, READY];
    let mut h = harness(&["demo"], scripts, |s| {
        s.retry.base_delay = Duration::from_millis(5);
    })
    .await;
    let summary = h.scheduler.run_project(&request("demo")).await.unwrap();
    assert_eq!(summary.downloaded, 2);
    assert_eq!(h.client.submits(0), 2);
    assert_spaced(&h.client.submit_log());
}

#[tokio::test]
async fn exhausted_retries_fail_the_job_but_not_the_run() {
    let scripts = vec![Script::FlakySubmit { failures: 100 }, READY];
    let mut h = harness(&["demo"], scripts, |_| {}).await;
    let summary = h.scheduler.run_project(&request("demo")).await.unwrap();
    assert_eq!((summary.failed, summary.downloaded), (1, 1));
    assert_eq!(h.client.submits(0), 3);

    let project = h.store.load_project("demo").await.unwrap().unwrap();
    let job = project.scene(1).unwrap().job(JobKind::Video, 1).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error_reason.as_deref(),
        Some("network error after 3 attempts: HTTP 503")
    );
    assert!(job.completed_at.is_some());
}

#[tokio::test]
async fn provider_failure_is_recorded_verbatim_and_not_retried() {
    let mut h = harness(&["demo"], vec![Script::RemoteFailure, READY], |_| {}).await;
    let summary = h.scheduler.run_project(&request("demo")).await.unwrap();
    assert_eq!((summary.failed, summary.downloaded), (1, 1));
    assert_eq!(h.client.polls(0), 1);

    let project = h.store.load_project("demo").await.unwrap().unwrap();
    let job = project.scene(1).unwrap().job(JobKind::Video, 1).unwrap();
    assert_eq!(job.error_reason.as_deref(), Some("PUBLIC_ERROR_UNSAFE_GENERATION"));

    let events = drain(&mut h.events);
    assert_eq!(
        statuses_for(&events, 1),
        vec![JobStatus::Submitted, JobStatus::Failed]
    );
}

#[tokio::test]
async fn rejected_submit_is_not_retried() {
    let mut h = harness(&["demo"], vec![Script::RejectSubmit], |_| {}).await;
    let summary = h.scheduler.run_project(&request("demo")).await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(h.client.submits(0), 1);
    let project = h.store.load_project("demo").await.unwrap().unwrap();
    let job = project.scene(1).unwrap().job(JobKind::Video, 1).unwrap();
    assert_eq!(job.error_reason.as_deref(), Some("PUBLIC_ERROR_MINOR_UPLOAD"));
}

#[tokio::test]
async fn zero_byte_download_fails_the_job() {
    let mut h = harness(&["demo"], vec![Script::EmptyArtifact], |_| {}).await;
    let summary = h.scheduler.run_project(&request("demo")).await.unwrap();
    assert_eq!(summary.failed, 1);

    let project = h.store.load_project("demo").await.unwrap().unwrap();
    let job = project.scene(1).unwrap().job(JobKind::Video, 1).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_reason.as_deref(), Some("download failed"));
    assert_eq!(job.local_path, None);
    let path = artifact_path(&project_root(&h.download_root, "demo"), JobKind::Video, 1, 1);
    assert!(!path.exists());

    let events = drain(&mut h.events);
    assert_eq!(
        statuses_for(&events, 1),
        vec![
            JobStatus::Submitted,
            JobStatus::Polling,
            JobStatus::Ready,
            JobStatus::Downloading,
            JobStatus::Failed,
        ]
    );
}

#[tokio::test]
async fn poll_timeout_fails_the_job() {
    let scripts = vec![Script::Ready {
        pending_polls: u32::MAX,
    }];
    let mut h = harness(&["demo"], scripts, |s| {
        s.poll_timeout = Duration::from_millis(40);
    })
    .await;
    let summary = h.scheduler.run_project(&request("demo")).await.unwrap();
    assert_eq!(summary.failed, 1);
    let project = h.store.load_project("demo").await.unwrap().unwrap();
    let job = project.scene(1).unwrap().job(JobKind::Video, 1).unwrap();
    assert_eq!(job.error_reason.as_deref(), Some("no result after polling for 40ms"));
    assert!(h.client.polls(0) >= 1);
}

#[tokio::test]
async fn rerun_skips_downloaded_slots() {
    let mut h = harness(&["demo"], vec![READY, Script::RemoteFailure], |_| {}).await;
    let first = h.scheduler.run_project(&request("demo")).await.unwrap();
    assert_eq!((first.downloaded, first.failed), (1, 1));

    let second = h.scheduler.run_project(&request("demo")).await.unwrap();
    assert_eq!(second.skipped, 1);
    assert_eq!(second.failed, 1);
    assert_eq!(h.client.submits(0), 1);
    assert_eq!(h.client.submits(1), 2);
    assert_eq!(stored_status(&h.store, "demo", 1).await, JobStatus::Downloaded);
}

#[tokio::test]
async fn run_all_is_sequential_and_shares_spacing() {
    let mut h = harness(&["first", "second"], vec![READY, READY], |_| {}).await;
    let results = h
        .scheduler
        .run_all(&[request("first"), request("second")])
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|(_, s)| s.downloaded == 2));

    let events = drain(&mut h.events);
    let projects: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::RequestStarted { project, .. } => Some(project.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(projects, vec!["first", "first", "second", "second"]);
    let log = h.client.submit_log();
    assert_eq!(log.len(), 4);
    assert_spaced(&log);
}

#[tokio::test]
async fn missing_credentials_abort_before_any_call() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProjectStateStore::open_at(dir.path().join("projects.db"))
        .await
        .unwrap();
    let client = Arc::new(FakeClient::new(vec![READY], RunControl::new()));
    let mut s = settings(dir.path());
    s.credentials = vec!["   ".into()];
    let err = Scheduler::new(
        client.clone(),
        Downloader::new(Arc::new(MemorySource)),
        store,
        s,
    )
    .err()
    .unwrap();
    assert!(matches!(err, SchedulerError::NoCredentials));
    assert_eq!(client.total_calls(), 0);
}

#[tokio::test]
async fn unknown_project_is_rejected() {
    let mut h = harness(&["demo"], vec![READY], |_| {}).await;
    let err = h.scheduler.run_project(&request("nope")).await.unwrap_err();
    assert!(matches!(err, SchedulerError::UnknownProject(ref p) if p == "nope"));
    let err = h
        .scheduler
        .run_all(&[request("demo"), request("nope")])
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulerError::UnknownProject(_)));
    assert_eq!(h.client.total_calls(), 0);
}

#[tokio::test]
async fn spawned_worker_stops_when_cancelled_from_another_task() {
    let mut h = harness(&["demo"], vec![READY, READY], |s| {
        s.min_spacing = Duration::from_secs(30)
    })
    .await;
    let control = h.scheduler.control();
    let mut scheduler = h.scheduler;
    let worker = tokio::spawn(async move { scheduler.run_all(&[request("demo")]).await });

    // Scene 2 sits in the spacing wait until cancelled.
    while let Some(ev) = h.events.recv().await {
        if matches!(ev, RunEvent::Waiting { scene_index: 2, .. }) {
            control.cancel();
            break;
        }
    }
    let results = tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .expect("worker did not stop after cancel")
        .unwrap()
        .unwrap();

    let summary = &results[0].1;
    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.cancelled + summary.not_started, 1);
    assert_eq!(h.client.submits(1), 0);
    assert_eq!(stored_status(&h.store, "demo", 1).await, JobStatus::Downloaded);
    assert_ne!(stored_status(&h.store, "demo", 2).await, JobStatus::Downloaded);
}

#[tokio::test]
async fn cancel_before_start_leaves_jobs_pending() {
    let mut h = harness(&["demo"], vec![READY, READY], |_| {}).await;
    h.scheduler.control().cancel();
    let summary = h.scheduler.run_project(&request("demo")).await.unwrap();
    assert_eq!(summary.not_started, 2);
    assert_eq!(h.client.total_calls(), 0);
    assert_eq!(stored_status(&h.store, "demo", 1).await, JobStatus::Pending);
}
