//! Deterministic on-disk locations for artifacts.
//!
//! `<download_root>/<project>/<stage>/scene_<NN>_copy_<C>.<ext>`

use std::path::{Path, PathBuf};

use super::types::JobKind;

/// Project directory name derived from the project name, safe for Linux filesystems.
pub fn project_root(download_root: &Path, project_name: &str) -> PathBuf {
    download_root.join(project_dir_name(project_name))
}

/// Final path of the artifact for one (scene, copy, kind).
pub fn artifact_path(project_root: &Path, kind: JobKind, scene_index: u32, copy_index: u32) -> PathBuf {
    project_root.join(kind.stage_dir()).join(format!(
        "scene_{:02}_copy_{}.{}",
        scene_index,
        copy_index,
        kind.extension()
    ))
}

/// Directory name for a project: path separators and control characters become
/// `_`; never "", "." or "..". Distinct names can map to the same directory
/// (`a/b` and `a_b`), so project creation rejects such pairs.
pub fn project_dir_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "Project".to_string()
    } else {
        cleaned
    }
}
