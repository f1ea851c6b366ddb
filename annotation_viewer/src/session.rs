//! Drives an overlay controller frame by frame the way a host renderer would:
//! apply any scripted lifecycle events for the frame, render the scene graph
//! (which runs every marker's pre-draw hook), then record what each marker's
//! surface looks like.

use std::{
    cell::RefCell,
    collections::{BTreeMap, btree_map::Entry},
    rc::Rc,
};

use annotation_overlay::{
    Anchor, AnnotationCard, AnnotationEvents, Camera, InlineStyle, MarkerHandle, MarkerState, MeshProvider, OverlayConfig,
    OverlayController, SceneGraph, SceneObject, SharedAnchor, StyleProperty, ViewportRect,
};
use anyhow::{Context, Result, bail};
use glam::DVec3;
use serde::Serialize;

use crate::scene_file::{MeshEntry, SceneFile, ScriptAction, ScriptStep};

struct Marker {
    anchor: SharedAnchor,
    surface: Rc<RefCell<InlineStyle>>,
    handle: MarkerHandle,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkerRecord {
    pub name: String,
    /// One-based number shown in the marker glyph.
    pub label: String,
    pub text: String,
    pub state: &'static str,
    pub position: [f64; 3],
    pub style: BTreeMap<StyleProperty, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameRecord {
    pub frame: u64,
    pub drawn: usize,
    pub hooks_run: usize,
    pub objects: Vec<String>,
    pub markers: BTreeMap<u32, MarkerRecord>,
}

pub struct Session {
    scene: Rc<RefCell<SceneGraph>>,
    meshes: MeshProvider,
    mesh: Option<SceneObject>,
    controller: OverlayController<InlineStyle>,
    camera: Camera,
    viewport: ViewportRect,
    markers: BTreeMap<u32, Marker>,
    script: Vec<ScriptStep>,
}

impl Session {
    pub fn new(scene_file: SceneFile, config: OverlayConfig) -> Result<Self> {
        let SceneFile {
            mut camera,
            viewport,
            mesh,
            anchors,
            script,
        } = scene_file;
        if let Some(aspect) = viewport.aspect_ratio() {
            camera.set_aspect(aspect);
        } else {
            log::warn!(
                "[viewer] viewport {}x{} is degenerate; markers will stay hidden",
                viewport.width,
                viewport.height
            );
        }

        let scene = Rc::new(RefCell::new(SceneGraph::new()));
        let meshes = MeshProvider::new();
        let mesh = mesh.map(build_mesh_object);
        if let Some(mesh) = mesh.as_ref() {
            scene
                .borrow_mut()
                .add(mesh.clone())
                .with_context(|| format!("adding mesh {} to the scene", mesh.name))?;
            meshes.load(mesh.clone());
        }

        let controller =
            OverlayController::with_software_canvas(Rc::clone(&scene), meshes.clone(), config);
        let mut session = Self {
            scene,
            meshes,
            mesh,
            controller,
            camera,
            viewport,
            markers: BTreeMap::new(),
            script,
        };
        for anchor in anchors {
            session.attach(anchor)?;
        }
        Ok(session)
    }

    pub fn run(&mut self, frames: u64) -> Result<Vec<FrameRecord>> {
        let mut records = Vec::new();
        for _ in 0..frames {
            let frame = self.scene.borrow().frame() + 1;
            let steps: Vec<ScriptAction> = self
                .script
                .iter()
                .filter(|step| step.frame == frame)
                .map(|step| step.action.clone())
                .collect();
            for action in steps {
                self.apply(action)
                    .with_context(|| format!("applying script step for frame {frame}"))?;
            }

            let stats = self.scene.borrow_mut().render(&self.camera, self.viewport);
            records.push(self.record(stats.frame, stats.drawn, stats.hooks_run));
        }
        Ok(records)
    }

    pub fn viewport(&self) -> ViewportRect {
        self.viewport
    }

    pub fn marker_styles(&self) -> impl Iterator<Item = (u32, InlineStyle)> + '_ {
        self.markers
            .iter()
            .map(|(id, marker)| (*id, marker.surface.borrow().clone()))
    }

    fn apply(&mut self, action: ScriptAction) -> Result<()> {
        match action {
            ScriptAction::MoveAnchor { id, position } => {
                let Some(marker) = self.markers.get(&id) else {
                    bail!("anchor {id} is not attached");
                };
                match self.controller.state(&marker.handle) {
                    MarkerState::Attached => self.controller.move_anchor(&marker.handle, position)?,
                    // No primitive yet; the next rebuild picks the new position up.
                    MarkerState::Unattached => marker.anchor.borrow_mut().position = position,
                }
                log::debug!("[viewer] moved anchor {id} to {position}");
            }
            ScriptAction::Attach { id, position, text } => {
                let mut anchor = Anchor::new(id, position);
                anchor.text = text;
                self.attach(anchor)?;
            }
            ScriptAction::Detach { id } => {
                let Some(marker) = self.markers.remove(&id) else {
                    bail!("anchor {id} is not attached");
                };
                self.controller.detach(marker.handle);
                log::debug!("[viewer] detached anchor {id}");
            }
            ScriptAction::ReloadMesh => match self.mesh.as_ref() {
                Some(mesh) => self.meshes.load(mesh.clone()),
                None => log::warn!("[viewer] reload_mesh requested but the scene has no mesh"),
            },
        }
        Ok(())
    }

    fn attach(&mut self, anchor: Anchor) -> Result<()> {
        let id = anchor.id;
        let Entry::Vacant(slot) = self.markers.entry(id) else {
            bail!("anchor {id} is already attached");
        };
        let anchor = anchor.shared();
        let surface = Rc::new(RefCell::new(InlineStyle::new()));
        let handle = self
            .controller
            .attach(&anchor, Rc::clone(&surface))
            .with_context(|| format!("attaching anchor {id}"))?;
        slot.insert(Marker {
            anchor,
            surface,
            handle,
        });
        Ok(())
    }

    fn record(&self, frame: u64, drawn: usize, hooks_run: usize) -> FrameRecord {
        let markers = self
            .markers
            .iter()
            .enumerate()
            .map(|(index, (id, marker))| {
                let anchor = marker.anchor.borrow();
                let card = AnnotationCard::new(index, &anchor, false, AnnotationEvents::new());
                let state = match self.controller.state(&marker.handle) {
                    MarkerState::Attached => "attached",
                    MarkerState::Unattached => "unattached",
                };
                let position: DVec3 = anchor.position;
                let record = MarkerRecord {
                    name: annotation_overlay::marker_name(*id),
                    label: card.label(),
                    text: card.display_text(&anchor).to_string(),
                    state,
                    position: position.to_array(),
                    style: marker.surface.borrow().properties().clone(),
                };
                (*id, record)
            })
            .collect();
        FrameRecord {
            frame,
            drawn,
            hooks_run,
            objects: self.scene.borrow().names().map(str::to_owned).collect(),
            markers,
        }
    }
}

fn build_mesh_object(entry: MeshEntry) -> SceneObject {
    let mesh = entry.shape.build();
    log::info!(
        "[viewer] mesh {} built with {} triangles",
        entry.name,
        mesh.triangle_count()
    );
    SceneObject::mesh(entry.name, Rc::new(mesh))
}
