//! Scenes file loading for `mgen project create`.
//!
//! Accepted JSON shapes: an array of `{prompt, reference_image?}`, an object
//! `{"scenes": [...]}` with the same entries, or a single `{prompt}` object.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::types::{Project, Scene};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SceneInput {
    pub prompt: String,
    #[serde(default)]
    pub reference_image: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScenesFile {
    List(Vec<SceneInput>),
    Wrapped { scenes: Vec<SceneInput> },
    Single(SceneInput),
}

/// Parse scenes JSON. Every prompt must be non-blank and there must be at least one scene.
pub fn parse_scenes(json: &str) -> Result<Vec<SceneInput>> {
    let file: ScenesFile = serde_json::from_str(json)
        .context("scenes file must be a list of {prompt}, {\"scenes\": [...]}, or {prompt}")?;
    let scenes = match file {
        ScenesFile::List(s) | ScenesFile::Wrapped { scenes: s } => s,
        ScenesFile::Single(s) => vec![s],
    };
    if scenes.is_empty() {
        bail!("scenes file has no scenes");
    }
    if let Some(i) = scenes.iter().position(|s| s.prompt.trim().is_empty()) {
        bail!("scene {} has an empty prompt", i + 1);
    }
    Ok(scenes)
}

/// Load a scenes file. Relative reference image paths resolve against the file's directory.
pub fn load_scenes(path: &Path) -> Result<Vec<SceneInput>> {
    let data =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut scenes = parse_scenes(&data).with_context(|| format!("parse {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for scene in &mut scenes {
        if let Some(img) = &scene.reference_image {
            if img.is_relative() {
                scene.reference_image = Some(base.join(img));
            }
        }
    }
    Ok(scenes)
}

impl Project {
    /// Build a project from loaded scene inputs; scenes are numbered from 1.
    pub fn from_scene_inputs(name: &str, inputs: Vec<SceneInput>) -> Self {
        let scenes = inputs
            .into_iter()
            .enumerate()
            .map(|(i, input)| {
                let mut scene = Scene::new(i as u32 + 1, input.prompt.trim());
                scene.reference_image = input.reference_image;
                scene
            })
            .collect();
        Project {
            name: name.to_string(),
            scenes,
        }
    }
}
