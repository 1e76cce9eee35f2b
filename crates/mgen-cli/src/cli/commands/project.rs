//! `mgen project create|list`.

use anyhow::{Context, Result};
use mgen_core::project::{load_scenes, JobStatus, Project};
use mgen_core::state_db::ProjectStateStore;
use std::path::Path;

pub async fn run_project_create(store: &ProjectStateStore, name: &str, scenes: &Path) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("project name must not be empty");
    }
    let inputs = load_scenes(scenes)
        .with_context(|| format!("loading scenes from {}", scenes.display()))?;
    let project = Project::from_scene_inputs(name, inputs);
    store.create_project(&project).await?;
    println!("Created project {} with {} scene(s).", name, project.scenes.len());
    Ok(())
}

pub async fn run_project_list(store: &ProjectStateStore) -> Result<()> {
    let projects = store.list_projects().await?;
    if projects.is_empty() {
        println!("No projects in database.");
        return Ok(());
    }
    println!(
        "{:<24} {:>6} {:>6} {:>10} {:>6} {:>9}",
        "PROJECT", "SCENES", "JOBS", "DOWNLOADED", "FAILED", "CANCELLED"
    );
    for p in projects {
        println!(
            "{:<24} {:>6} {:>6} {:>10} {:>6} {:>9}",
            p.name,
            p.scene_count,
            p.total_jobs(),
            p.count(JobStatus::Downloaded),
            p.count(JobStatus::Failed),
            p.count(JobStatus::Cancelled),
        );
    }
    Ok(())
}
