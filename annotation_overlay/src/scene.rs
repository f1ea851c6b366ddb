//! Minimal scene graph standing in for the host renderer: named objects in
//! draw order, per-object pre-draw hooks, and a `render` pass that runs each
//! hook immediately before its object is drawn.

use std::{collections::HashMap, fmt, rc::Rc};

use glam::DVec3;

use crate::camera::Camera;
use crate::error::{OverlayError, Result};
use crate::geometry::{Ray, Sprite, TriangleMesh};
use crate::projector::ViewportRect;
use crate::texture::MarkerTexture;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum Shape {
    Mesh(Rc<TriangleMesh>),
    Sprite(Sprite),
}

#[derive(Debug, Clone)]
pub struct Material {
    pub opacity: f64,
    pub texture: Option<MarkerTexture>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            texture: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SceneObject {
    /// Identity used for self-exclusion during ray tests; unique per graph.
    pub name: String,
    pub shape: Shape,
    pub material: Material,
}

impl SceneObject {
    pub fn mesh(name: impl Into<String>, mesh: Rc<TriangleMesh>) -> Self {
        Self {
            name: name.into(),
            shape: Shape::Mesh(mesh),
            material: Material::default(),
        }
    }

    pub fn sprite(name: impl Into<String>, sprite: Sprite, material: Material) -> Self {
        Self {
            name: name.into(),
            shape: Shape::Sprite(sprite),
            material,
        }
    }

    pub fn position(&self) -> Option<DVec3> {
        match &self.shape {
            Shape::Sprite(sprite) => Some(sprite.center),
            Shape::Mesh(_) => None,
        }
    }

    pub fn set_position(&mut self, position: DVec3) {
        if let Shape::Sprite(sprite) = &mut self.shape {
            sprite.center = position;
        }
    }
}

/// One ray hit. `object` carries the hit object's name by value so callers
/// compare identities without holding a reference into the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Intersection {
    pub distance: f64,
    pub point: DVec3,
    pub object: String,
}

pub trait Raycast {
    fn raycast(&self, ray: &Ray, camera: &Camera, hits: &mut Vec<Intersection>);
}

impl Raycast for SceneObject {
    fn raycast(&self, ray: &Ray, camera: &Camera, hits: &mut Vec<Intersection>) {
        let mut push = |t: f64| {
            let point = ray.at(t);
            hits.push(Intersection {
                distance: ray.origin.distance(point),
                point,
                object: self.name.clone(),
            });
        };
        match &self.shape {
            Shape::Mesh(mesh) => mesh.raycast(ray).into_iter().for_each(&mut push),
            Shape::Sprite(sprite) => {
                let (Some((right, up)), Some(facing)) = (camera.billboard_axes(), camera.forward())
                else {
                    return;
                };
                if let Some(t) = sprite.raycast(ray, right, up, facing) {
                    push(t);
                }
            }
        }
    }
}

/// Per-frame inputs handed to pre-draw hooks.
pub struct FrameContext<'a> {
    pub camera: &'a Camera,
    pub viewport: ViewportRect,
    pub frame: u64,
}

pub trait PreDrawHook {
    fn before_draw(&mut self, frame: &FrameContext<'_>, object: &mut SceneObject);
}

impl<F> PreDrawHook for F
where
    F: FnMut(&FrameContext<'_>, &mut SceneObject),
{
    fn before_draw(&mut self, frame: &FrameContext<'_>, object: &mut SceneObject) {
        self(frame, object)
    }
}

struct SceneNode {
    id: ObjectId,
    object: SceneObject,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    pub drawn: usize,
    pub hooks_run: usize,
}

#[derive(Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
    hooks: HashMap<ObjectId, Box<dyn PreDrawHook>>,
    next_id: u64,
    frame: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: SceneObject) -> Result<ObjectId> {
        if self.find(&object.name).is_some() {
            return Err(OverlayError::DuplicateObjectName(object.name));
        }
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        log::debug!("[scene] add {} as {}", object.name, id);
        self.nodes.push(SceneNode { id, object });
        Ok(id)
    }

    /// Removes the object and any hook registered for it.
    pub fn remove(&mut self, id: ObjectId) -> Option<SceneObject> {
        self.hooks.remove(&id);
        let index = self.nodes.iter().position(|node| node.id == id)?;
        let node = self.nodes.remove(index);
        log::debug!("[scene] remove {} ({})", node.object.name, id);
        Some(node.object)
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.nodes
            .iter()
            .find(|node| node.id == id)
            .map(|node| &node.object)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.nodes
            .iter_mut()
            .find(|node| node.id == id)
            .map(|node| &mut node.object)
    }

    pub fn find(&self, name: &str) -> Option<ObjectId> {
        self.nodes
            .iter()
            .find(|node| node.object.name == name)
            .map(|node| node.id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.object.name.as_str())
    }

    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.nodes.iter().map(|node| &node.object)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns false when `id` is not in the graph; the hook is dropped.
    pub fn set_pre_draw_hook(&mut self, id: ObjectId, hook: Box<dyn PreDrawHook>) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.hooks.insert(id, hook);
        true
    }

    pub fn clear_pre_draw_hook(&mut self, id: ObjectId) -> bool {
        self.hooks.remove(&id).is_some()
    }

    pub fn has_pre_draw_hook(&self, id: ObjectId) -> bool {
        self.hooks.contains_key(&id)
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Draws every object in insertion order, running its pre-draw hook first.
    pub fn render(&mut self, camera: &Camera, viewport: ViewportRect) -> FrameStats {
        self.frame += 1;
        let context = FrameContext {
            camera,
            viewport,
            frame: self.frame,
        };
        let mut stats = FrameStats {
            frame: self.frame,
            ..FrameStats::default()
        };
        for node in self.nodes.iter_mut() {
            if let Some(hook) = self.hooks.get_mut(&node.id) {
                hook.before_draw(&context, &mut node.object);
                stats.hooks_run += 1;
            }
            stats.drawn += 1;
        }
        stats
    }
}
