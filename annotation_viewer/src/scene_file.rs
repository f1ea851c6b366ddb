//! JSON scene descriptions for headless runs: camera, viewport, an optional
//! stand-in mesh, the anchors to attach, and a per-frame lifecycle script.

use std::{fs, path::Path};

use annotation_overlay::{Anchor, Camera, MeshDescription, ViewportRect};
use anyhow::{Context, Result, ensure};
use glam::DVec3;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SceneFile {
    pub camera: Camera,
    pub viewport: ViewportRect,
    #[serde(default)]
    pub mesh: Option<MeshEntry>,
    #[serde(default)]
    pub anchors: Vec<Anchor>,
    #[serde(default)]
    pub script: Vec<ScriptStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeshEntry {
    #[serde(default = "default_mesh_name")]
    pub name: String,
    #[serde(flatten)]
    pub shape: MeshDescription,
}

fn default_mesh_name() -> String {
    "mesh".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptStep {
    /// Applied before this frame renders (frames count from 1).
    pub frame: u64,
    #[serde(flatten)]
    pub action: ScriptAction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptAction {
    MoveAnchor {
        id: u32,
        position: DVec3,
    },
    Attach {
        id: u32,
        position: DVec3,
        #[serde(default)]
        text: Option<String>,
    },
    Detach {
        id: u32,
    },
    ReloadMesh,
}

pub fn load_scene(path: &Path) -> Result<SceneFile> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading scene {}", path.display()))?;
    let scene = parse_scene(&data).with_context(|| format!("parsing scene {}", path.display()))?;
    Ok(scene)
}

pub fn parse_scene(data: &str) -> Result<SceneFile> {
    let scene: SceneFile = serde_json::from_str(data)?;
    let mut ids: Vec<u32> = scene.anchors.iter().map(|anchor| anchor.id).collect();
    ids.sort_unstable();
    let before = ids.len();
    ids.dedup();
    ensure!(ids.len() == before, "scene lists the same anchor id more than once");
    Ok(scene)
}
