//! Project, scene, and job records.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::status::{JobStatus, TransitionError};

/// Kind of artifact a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Image,
    Video,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Image => "image",
            JobKind::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Some(JobKind::Image),
            "video" => Some(JobKind::Video),
            _ => None,
        }
    }

    /// Stage directory under the project root.
    pub fn stage_dir(self) -> &'static str {
        match self {
            JobKind::Image => "01_Images",
            JobKind::Video => "03_Videos",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            JobKind::Image => "png",
            JobKind::Video => "mp4",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a job inside its scene. Orders images before videos, then by copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobSlot {
    pub kind: JobKind,
    pub copy_index: u32,
}

/// One generation attempt for a (scene, kind, copy) slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub project_id: String,
    pub scene_index: u32,
    pub copy_index: u32,
    pub kind: JobKind,
    pub status: JobStatus,
    pub remote_operation_id: Option<String>,
    pub remote_url: Option<String>,
    pub local_path: Option<PathBuf>,
    pub error_reason: Option<String>,
    /// Unix seconds when the job reached a terminal state.
    pub completed_at: Option<i64>,
}

impl Job {
    /// Fresh PENDING job for a slot.
    pub fn new(project_id: &str, scene_index: u32, copy_index: u32, kind: JobKind) -> Self {
        Self {
            project_id: project_id.to_string(),
            scene_index,
            copy_index,
            kind,
            status: JobStatus::Pending,
            remote_operation_id: None,
            remote_url: None,
            local_path: None,
            error_reason: None,
            completed_at: None,
        }
    }

    pub fn slot(&self) -> JobSlot {
        JobSlot {
            kind: self.kind,
            copy_index: self.copy_index,
        }
    }

    /// Move to `next`, rejecting anything that is not a state-machine edge.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        self.status = self.status.transition(next)?;
        Ok(())
    }

    /// Short label for logs and events, e.g. `scene 02 copy 1 (video)`.
    pub fn label(&self) -> String {
        format!(
            "scene {:02} copy {} ({})",
            self.scene_index, self.copy_index, self.kind
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// 1-based position within the project.
    pub index: u32,
    pub prompt_text: String,
    pub reference_image: Option<PathBuf>,
    pub jobs: BTreeMap<JobSlot, Job>,
}

impl Scene {
    pub fn new(index: u32, prompt_text: impl Into<String>) -> Self {
        Self {
            index,
            prompt_text: prompt_text.into(),
            reference_image: None,
            jobs: BTreeMap::new(),
        }
    }

    pub fn job(&self, kind: JobKind, copy_index: u32) -> Option<&Job> {
        self.jobs.get(&JobSlot { kind, copy_index })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub name: String,
    pub scenes: Vec<Scene>,
}

impl Project {
    /// Build a project from prompts in order; scenes are numbered from 1.
    pub fn from_prompts<I, S>(name: &str, prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scenes = prompts
            .into_iter()
            .enumerate()
            .map(|(i, p)| Scene::new(i as u32 + 1, p))
            .collect();
        Self {
            name: name.to_string(),
            scenes,
        }
    }

    pub fn scene(&self, index: u32) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.index == index)
    }

    pub fn scene_mut(&mut self, index: u32) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|s| s.index == index)
    }

    /// All jobs in queue order: scene ascending, then kind, then copy ascending.
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.scenes.iter().flat_map(|s| s.jobs.values())
    }

    /// Insert or replace the job in its scene's slot. Ignored if the scene does not exist.
    pub fn put_job(&mut self, job: Job) {
        if let Some(scene) = self.scene_mut(job.scene_index) {
            scene.jobs.insert(job.slot(), job);
        }
    }
}
