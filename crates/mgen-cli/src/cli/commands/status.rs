//! `mgen status <project>` – per-scene job table.

use anyhow::Result;
use mgen_core::state_db::ProjectStateStore;

pub async fn run_status(store: &ProjectStateStore, project: &str) -> Result<()> {
    let Some(project) = store.load_project(project).await? else {
        anyhow::bail!("unknown project {:?}", project);
    };
    println!("Project {} ({} scene(s))", project.name, project.scenes.len());
    println!("{:<6} {:<6} {:<5} {:<12} {}", "SCENE", "COPY", "KIND", "STATUS", "DETAIL");
    for scene in &project.scenes {
        if scene.jobs.is_empty() {
            println!("{:<6} {:<6} {:<5} {:<12} {}", scene.index, "-", "-", "-", "not run");
            continue;
        }
        for job in scene.jobs.values() {
            let detail = job
                .error_reason
                .clone()
                .or_else(|| job.local_path.as_ref().map(|p| p.display().to_string()))
                .or_else(|| job.remote_operation_id.clone())
                .unwrap_or_default();
            println!(
                "{:<6} {:<6} {:<5} {:<12} {}",
                job.scene_index, job.copy_index, job.kind, job.status, detail
            );
        }
    }
    Ok(())
}
