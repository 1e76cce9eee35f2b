//! Queue expansion: scenes × copies → ordered jobs.

use std::path::PathBuf;

use crate::project::{Job, JobKind, JobStatus, Project};

/// What to generate for one project in one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub project: String,
    pub kind: JobKind,
    /// Copies per scene (at least 1).
    pub copies: u32,
    pub model: String,
    pub aspect_ratio: String,
}

/// A job ready to execute plus the scene data its submit request needs.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub job: Job,
    pub prompt: String,
    pub reference_image: Option<PathBuf>,
}

/// Expand `project` into an ordered queue: scene index ascending, then copy ascending.
///
/// Slots already DOWNLOADED are skipped (second return value). Every other slot
/// gets a fresh PENDING job, which also replaces the slot in `project`.
pub fn build_queue(project: &mut Project, kind: JobKind, copies: u32) -> (Vec<QueuedJob>, u32) {
    let mut scenes: Vec<(u32, String, Option<PathBuf>)> = project
        .scenes
        .iter()
        .map(|s| (s.index, s.prompt_text.clone(), s.reference_image.clone()))
        .collect();
    scenes.sort_by_key(|(index, _, _)| *index);

    let mut queue = Vec::new();
    let mut skipped = 0u32;
    for (scene_index, prompt, reference_image) in scenes {
        for copy_index in 1..=copies.max(1) {
            let done = project
                .scene(scene_index)
                .and_then(|s| s.job(kind, copy_index))
                .map(|j| j.status == JobStatus::Downloaded)
                .unwrap_or(false);
            if done {
                skipped += 1;
                continue;
            }
            let job = Job::new(&project.name, scene_index, copy_index, kind);
            project.put_job(job.clone());
            queue.push(QueuedJob {
                job,
                prompt: prompt.clone(),
                reference_image: reference_image.clone(),
            });
        }
    }
    (queue, skipped)
}
