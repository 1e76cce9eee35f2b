//! `mgen clear <project>` – forget project state; files on disk are kept.

use anyhow::Result;
use mgen_core::state_db::ProjectStateStore;

pub async fn run_clear(store: &ProjectStateStore, project: &str) -> Result<()> {
    if store.clear_project(project).await? {
        println!("Cleared project {}.", project);
    } else {
        anyhow::bail!("unknown project {:?}", project);
    }
    Ok(())
}
