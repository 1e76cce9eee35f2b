//! `mgen run <project>` and `mgen run-all` – drive generation jobs to completion.

use anyhow::Result;
use mgen_core::config::MgenConfig;
use mgen_core::downloader::{CurlSource, Downloader};
use mgen_core::generation::LabsClient;
use mgen_core::project::JobStatus;
use mgen_core::scheduler::{RunEvent, RunRequest, RunSummary, Scheduler, SchedulerSettings};
use mgen_core::state_db::ProjectStateStore;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::RunOpts;

const PROGRESS_INTERVAL_MS: u64 = 500;

/// Run one project (`Some(name)`) or every project in creation order (`None`).
/// Exit code is 1 if any job failed, 130 if the run was interrupted.
pub async fn run_projects(
    store: &ProjectStateStore,
    cfg: &MgenConfig,
    project: Option<String>,
    opts: &RunOpts,
) -> Result<i32> {
    let names = match project {
        Some(name) => vec![name],
        None => store.project_names().await?,
    };
    if names.is_empty() {
        println!("No projects in database.");
        return Ok(0);
    }
    let requests: Vec<RunRequest> = names
        .into_iter()
        .map(|name| RunRequest {
            project: name,
            kind: opts.kind,
            copies: opts.copies.max(1),
            model: opts.model.clone().unwrap_or_else(|| cfg.default_model.clone()),
            aspect_ratio: opts
                .aspect_ratio
                .clone()
                .unwrap_or_else(|| cfg.default_aspect_ratio.clone()),
        })
        .collect();

    let client = Arc::new(LabsClient::from_config(cfg));
    let downloader = Downloader::new(Arc::new(CurlSource::new(cfg.download_timeout())));
    let (event_tx, event_rx) = tokio::sync::mpsc::channel::<RunEvent>(256);
    let mut scheduler = Scheduler::new(
        client,
        downloader,
        store.clone(),
        SchedulerSettings::from_config(cfg),
    )?
    .with_events(event_tx);

    let control = scheduler.control();
    let watcher = control.clone();
    let signal_handle = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ninterrupt received; cancelling after the current step");
            watcher.cancel();
        }
    });
    let printer = tokio::spawn(print_events(event_rx));

    // The worker owns the scheduler (and with it the event sender), so the
    // printer ends once the worker is done.
    let worker = tokio::spawn(async move { scheduler.run_all(&requests).await });
    let result = worker.await?;
    let _ = printer.await;
    signal_handle.abort();
    let interrupted = control.is_cancelled();

    let summaries = result?;
    let mut any_failed = false;
    for (name, summary) in &summaries {
        print_summary(name, summary);
        any_failed |= summary.failed > 0;
    }
    Ok(if interrupted {
        130
    } else if any_failed {
        1
    } else {
        0
    })
}

async fn print_events(mut rx: tokio::sync::mpsc::Receiver<RunEvent>) {
    let mut last_progress = Instant::now();
    while let Some(event) = rx.recv().await {
        match event {
            RunEvent::ProjectStarted {
                project,
                queued,
                skipped,
            } => println!(
                "== {}: {} job(s) queued, {} already downloaded",
                project, queued, skipped
            ),
            RunEvent::Waiting {
                scene_index,
                copy_index,
                wait,
                ..
            } => println!(
                "  scene {:02} copy {}: waiting {:.1}s for credential spacing",
                scene_index,
                copy_index,
                wait.as_secs_f64()
            ),
            RunEvent::RequestStarted {
                scene_index,
                copy_index,
                credential_id,
                ..
            } => println!(
                "  scene {:02} copy {}: submitting with {}",
                scene_index, copy_index, credential_id
            ),
            RunEvent::Job(ev) => {
                let job = &ev.job;
                match job.status {
                    JobStatus::Polling if ev.poll_attempt > 1 => {}
                    JobStatus::Failed => println!(
                        "  {}: FAILED: {}",
                        job.label(),
                        job.error_reason.as_deref().unwrap_or("unknown error")
                    ),
                    JobStatus::Downloaded => println!(
                        "  {}: DOWNLOADED -> {}",
                        job.label(),
                        job.local_path
                            .as_ref()
                            .map(|p| p.display().to_string())
                            .unwrap_or_default()
                    ),
                    status => println!("  {}: {}", job.label(), status),
                }
            }
            RunEvent::DownloadProgress {
                scene_index,
                copy_index,
                bytes,
                ..
            } => {
                if last_progress.elapsed() >= Duration::from_millis(PROGRESS_INTERVAL_MS) {
                    println!(
                        "  scene {:02} copy {}: {:.1} MiB",
                        scene_index,
                        copy_index,
                        bytes as f64 / 1_048_576.0
                    );
                    last_progress = Instant::now();
                }
            }
            RunEvent::ProjectFinished { project, .. } => println!("== {}: finished", project),
        }
    }
}

fn print_summary(name: &str, s: &RunSummary) {
    println!(
        "{}: {} downloaded, {} failed, {} cancelled, {} skipped, {} not started",
        name, s.downloaded, s.failed, s.cancelled, s.skipped, s.not_started
    );
}
