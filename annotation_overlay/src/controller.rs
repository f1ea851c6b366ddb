//! Marker lifecycle. Each attached anchor gets exactly one sprite primitive in
//! the scene graph plus a pre-draw hook that keeps its screen-space surface in
//! step with the anchor. Primitives are rebuilt whenever the mesh provider
//! announces a (re)load, and removed synchronously on detach.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    rc::{Rc, Weak},
};

use glam::{DVec2, DVec3};

use crate::anchor::{Anchor, SharedAnchor};
use crate::camera::Camera;
use crate::config::OverlayConfig;
use crate::error::{OverlayError, Result};
use crate::frame_sync::FrameSynchronizer;
use crate::geometry::Sprite;
use crate::mesh_provider::{MeshProvider, MeshSubscription, WeakMeshProvider};
use crate::occlusion::OcclusionTester;
use crate::projector::{ViewportRect, project};
use crate::scene::{Material, ObjectId, Raycast, SceneGraph, SceneObject};
use crate::surface::DisplaySurface;
use crate::texture::{CanvasProvider, SoftwareCanvas, build_marker_texture};

pub fn marker_name(anchor_id: u32) -> String {
    format!("Annotation {anchor_id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    /// Registered, but no primitive yet (no mesh loaded, or creation failed).
    Unattached,
    Attached,
}

/// Proof of attachment. Not `Clone`: `detach` consumes it, so a detached
/// marker cannot be queried.
#[derive(Debug, PartialEq, Eq)]
pub struct MarkerHandle {
    anchor_id: u32,
}

impl MarkerHandle {
    pub fn anchor_id(&self) -> u32 {
        self.anchor_id
    }
}

struct MarkerSlot<S> {
    anchor: Weak<RefCell<Anchor>>,
    name: String,
    surface: Rc<RefCell<S>>,
    object: Option<ObjectId>,
}

struct Attachment<S> {
    slot: Rc<RefCell<MarkerSlot<S>>>,
    _subscription: MeshSubscription,
}

/// Everything needed to (re)create a primitive, held weakly where the
/// provider's listener list would otherwise keep the scene alive.
#[derive(Clone)]
struct PrimitiveBuilder {
    scene: Weak<RefCell<SceneGraph>>,
    meshes: WeakMeshProvider,
    canvas: Rc<RefCell<dyn CanvasProvider>>,
    config: OverlayConfig,
}

impl PrimitiveBuilder {
    fn rebuild<S: DisplaySurface + 'static>(&self, slot: &mut MarkerSlot<S>) -> Result<()> {
        let (Some(scene), Some(meshes)) = (self.scene.upgrade(), self.meshes.upgrade()) else {
            return Ok(());
        };
        let mut scene = scene.borrow_mut();
        if let Some(previous) = slot.object.take() {
            scene.remove(previous);
        }
        if !meshes.is_loaded() {
            return Ok(());
        }
        let Some(anchor) = slot.anchor.upgrade() else {
            return Ok(());
        };

        let texture = build_marker_texture(
            &mut *self.canvas.borrow_mut(),
            self.config.marker_texture_side,
            &slot.name,
        )?;
        let position = anchor.borrow().position;
        let object = SceneObject::sprite(
            slot.name.clone(),
            Sprite::new(position, self.config.marker_world_size),
            Material {
                opacity: 0.0,
                texture: Some(texture),
            },
        );
        let id = scene.add(object)?;
        let hook = FrameSynchronizer::new(
            slot.anchor.clone(),
            meshes,
            Rc::clone(&slot.surface),
            &self.config,
        );
        scene.set_pre_draw_hook(id, Box::new(hook));
        slot.object = Some(id);
        log::debug!("[overlay] {} attached as {}", slot.name, id);
        Ok(())
    }
}

pub struct OverlayController<S: DisplaySurface + 'static> {
    scene: Rc<RefCell<SceneGraph>>,
    meshes: MeshProvider,
    builder: PrimitiveBuilder,
    markers: BTreeMap<u32, Attachment<S>>,
}

impl<S: DisplaySurface + 'static> OverlayController<S> {
    pub fn new(
        scene: Rc<RefCell<SceneGraph>>,
        meshes: MeshProvider,
        canvas: Rc<RefCell<dyn CanvasProvider>>,
        config: OverlayConfig,
    ) -> Self {
        let builder = PrimitiveBuilder {
            scene: Rc::downgrade(&scene),
            meshes: meshes.downgrade(),
            canvas,
            config,
        };
        Self {
            scene,
            meshes,
            builder,
            markers: BTreeMap::new(),
        }
    }

    pub fn with_software_canvas(
        scene: Rc<RefCell<SceneGraph>>,
        meshes: MeshProvider,
        config: OverlayConfig,
    ) -> Self {
        Self::new(scene, meshes, Rc::new(RefCell::new(SoftwareCanvas)), config)
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.builder.config
    }

    pub fn scene(&self) -> &Rc<RefCell<SceneGraph>> {
        &self.scene
    }

    pub fn meshes(&self) -> &MeshProvider {
        &self.meshes
    }

    /// Registers `anchor` and, if a mesh is already loaded, creates its
    /// primitive. The mesh-reload subscription is released again if creation
    /// fails.
    pub fn attach(&mut self, anchor: &SharedAnchor, surface: Rc<RefCell<S>>) -> Result<MarkerHandle> {
        let anchor_id = anchor.borrow().id;
        if self.markers.contains_key(&anchor_id) {
            return Err(OverlayError::DuplicateAnchor(anchor_id));
        }

        let slot = Rc::new(RefCell::new(MarkerSlot {
            anchor: Rc::downgrade(anchor),
            name: marker_name(anchor_id),
            surface,
            object: None,
        }));
        let subscription = {
            let slot = Rc::downgrade(&slot);
            let builder = self.builder.clone();
            self.meshes.subscribe(move || {
                let Some(slot) = slot.upgrade() else {
                    return;
                };
                let mut slot = slot.borrow_mut();
                if let Err(err) = builder.rebuild(&mut *slot) {
                    log::error!("[overlay] rebuilding {} after mesh reload: {err}", slot.name);
                }
            })
        };

        self.builder.rebuild(&mut *slot.borrow_mut())?;
        if slot.borrow().object.is_none() {
            log::info!("[overlay] anchor {anchor_id} waiting for a mesh");
        }
        self.markers.insert(
            anchor_id,
            Attachment {
                slot,
                _subscription: subscription,
            },
        );
        Ok(MarkerHandle { anchor_id })
    }

    /// Removes the primitive and its hook from the scene graph and drops the
    /// mesh subscription. No frame callback runs for this marker afterwards.
    pub fn detach(&mut self, handle: MarkerHandle) {
        let Some(attachment) = self.markers.remove(&handle.anchor_id) else {
            return;
        };
        let object = attachment.slot.borrow_mut().object.take();
        if let Some(id) = object {
            self.scene.borrow_mut().remove(id);
        }
        log::debug!("[overlay] anchor {} detached", handle.anchor_id);
    }

    /// Rebuilds every primitive against the current mesh.
    pub fn on_mesh_reloaded(&self) {
        for attachment in self.markers.values() {
            let mut slot = attachment.slot.borrow_mut();
            if let Err(err) = self.builder.rebuild(&mut *slot) {
                log::error!("[overlay] rebuilding {}: {err}", slot.name);
            }
        }
    }

    pub fn move_anchor(&self, handle: &MarkerHandle, position: DVec3) -> Result<()> {
        let slot = self.slot(handle)?.borrow();
        let id = slot.object.ok_or(OverlayError::NotInitialized {
            anchor: handle.anchor_id,
        })?;
        if let Some(anchor) = slot.anchor.upgrade() {
            anchor.borrow_mut().position = position;
        }
        if let Some(object) = self.scene.borrow_mut().get_mut(id) {
            object.set_position(position);
        }
        Ok(())
    }

    pub fn state(&self, handle: &MarkerHandle) -> MarkerState {
        match self.slot(handle).map(|slot| slot.borrow().object) {
            Ok(Some(_)) => MarkerState::Attached,
            _ => MarkerState::Unattached,
        }
    }

    pub fn object_id(&self, handle: &MarkerHandle) -> Option<ObjectId> {
        self.slot(handle).ok().and_then(|slot| slot.borrow().object)
    }

    pub fn world_position(&self, handle: &MarkerHandle) -> Result<DVec3> {
        let not_initialized = || OverlayError::NotInitialized {
            anchor: handle.anchor_id,
        };
        let id = self.slot(handle)?.borrow().object.ok_or_else(not_initialized)?;
        self.scene
            .borrow()
            .get(id)
            .and_then(SceneObject::position)
            .ok_or_else(not_initialized)
    }

    /// `Ok(None)` when the camera cannot project the marker this frame.
    pub fn device_position(&self, handle: &MarkerHandle, camera: &Camera) -> Result<Option<DVec2>> {
        let world = self.world_position(handle)?;
        Ok(camera.project(world).map(|ndc| ndc.truncate()))
    }

    pub fn screen_position(
        &self,
        handle: &MarkerHandle,
        camera: &Camera,
        viewport: ViewportRect,
    ) -> Result<Option<DVec2>> {
        let world = self.world_position(handle)?;
        Ok(project(world, camera, viewport).map(|projection| projection.pixel))
    }

    /// Inside the visibility window and not hidden behind the mesh.
    pub fn is_visible(
        &self,
        handle: &MarkerHandle,
        camera: &Camera,
        viewport: ViewportRect,
    ) -> Result<bool> {
        let world = self.world_position(handle)?;
        let Some(projection) = project(world, camera, viewport) else {
            return Ok(false);
        };
        let slot = self.slot(handle)?.borrow();
        let scene = self.scene.borrow();
        let Some(marker) = slot.object.and_then(|id| scene.get(id)) else {
            return Err(OverlayError::NotInitialized {
                anchor: handle.anchor_id,
            });
        };
        let mesh = self.meshes.current();
        let mut targets: Vec<&dyn Raycast> = Vec::with_capacity(2);
        if let Some(mesh) = mesh.as_deref() {
            targets.push(mesh);
        }
        targets.push(marker);
        Ok(OcclusionTester::from_config(&self.builder.config).is_visible(
            world,
            projection.device,
            camera,
            &targets,
            &slot.name,
        ))
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn anchor_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.markers.keys().copied()
    }

    fn slot(&self, handle: &MarkerHandle) -> Result<&Rc<RefCell<MarkerSlot<S>>>> {
        self.markers
            .get(&handle.anchor_id)
            .map(|attachment| &attachment.slot)
            .ok_or(OverlayError::NotInitialized {
                anchor: handle.anchor_id,
            })
    }
}

impl<S: DisplaySurface + 'static> Drop for OverlayController<S> {
    fn drop(&mut self) {
        let Ok(mut scene) = self.scene.try_borrow_mut() else {
            log::warn!("[overlay] scene busy while dropping controller; markers left in place");
            return;
        };
        for attachment in self.markers.values() {
            if let Some(id) = attachment.slot.borrow_mut().object.take() {
                scene.remove(id);
            }
        }
    }
}

#[cfg(test)]
mod controller_tests {
    use image::RgbaImage;

    use super::*;
    use crate::geometry::TriangleMesh;
    use crate::surface::{InlineStyle, StyleProperty};

    struct NoCanvas;

    impl CanvasProvider for NoCanvas {
        fn canvas(&mut self, _width: u32, _height: u32) -> Option<RgbaImage> {
            None
        }
    }

    struct Fixture {
        scene: Rc<RefCell<SceneGraph>>,
        meshes: MeshProvider,
        controller: OverlayController<InlineStyle>,
        camera: Camera,
        viewport: ViewportRect,
    }

    impl Fixture {
        fn new() -> Self {
            let scene = Rc::new(RefCell::new(SceneGraph::new()));
            let meshes = MeshProvider::new();
            let controller = OverlayController::with_software_canvas(
                Rc::clone(&scene),
                meshes.clone(),
                OverlayConfig::default(),
            );
            Self {
                scene,
                meshes,
                controller,
                camera: Camera::perspective(
                    DVec3::new(0.0, 0.0, 10.0),
                    DVec3::ZERO,
                    50.0,
                    800.0 / 600.0,
                ),
                viewport: ViewportRect::new(800.0, 600.0),
            }
        }

        /// Wall off to the side so it never sits between camera and origin.
        fn load_side_mesh(&self) {
            self.meshes.load(SceneObject::mesh(
                "part.stl",
                Rc::new(TriangleMesh::quad(DVec3::new(3.0, 0.0, -1.0), 1.0, 1.0)),
            ));
        }

        fn render(&self) {
            self.scene.borrow_mut().render(&self.camera, self.viewport);
        }
    }

    fn surface() -> Rc<RefCell<InlineStyle>> {
        Rc::new(RefCell::new(InlineStyle::new()))
    }

    #[test]
    fn attach_with_loaded_mesh_creates_one_primitive() {
        let mut fx = Fixture::new();
        fx.load_side_mesh();
        let anchor = Anchor::new(1, DVec3::ZERO).shared();
        let handle = fx.controller.attach(&anchor, surface()).expect("attach");

        assert_eq!(fx.controller.state(&handle), MarkerState::Attached);
        let scene = fx.scene.borrow();
        assert!(scene.contains("Annotation 1"));
        assert_eq!(scene.len(), 1);
        let id = fx.controller.object_id(&handle).expect("object");
        assert!(scene.has_pre_draw_hook(id));
    }

    #[test]
    fn centred_anchor_renders_mid_viewport() {
        let mut fx = Fixture::new();
        fx.load_side_mesh();
        let anchor = Anchor::new(1, DVec3::ZERO).shared();
        let style = surface();
        let handle = fx.controller.attach(&anchor, Rc::clone(&style)).expect("attach");

        fx.render();
        let pixel = fx
            .controller
            .screen_position(&handle, &fx.camera, fx.viewport)
            .expect("attached")
            .expect("projection");
        assert_eq!(pixel, DVec2::new(400.0, 300.0));
        assert!(fx.controller.is_visible(&handle, &fx.camera, fx.viewport).expect("attached"));
        let style = style.borrow();
        assert_eq!(style.get(StyleProperty::Visibility), Some("visible"));
        assert_eq!(style.get(StyleProperty::Opacity), Some("1"));
        assert_eq!(style.get(StyleProperty::Left), Some("384px"));
        assert_eq!(style.get(StyleProperty::Top), Some("284px"));
    }

    #[test]
    fn anchor_past_the_window_is_hidden() {
        let mut fx = Fixture::new();
        fx.load_side_mesh();
        let mut x = 0.0;
        while fx.camera.project(DVec3::new(x, 0.0, 0.0)).expect("projection").x < 0.95 {
            x += 0.01;
        }
        let anchor = Anchor::new(1, DVec3::new(x, 0.0, 0.0)).shared();
        let style = surface();
        let handle = fx.controller.attach(&anchor, Rc::clone(&style)).expect("attach");

        fx.render();
        assert!(style.borrow().is_hidden());
        assert!(!fx.controller.is_visible(&handle, &fx.camera, fx.viewport).expect("attached"));
    }

    #[test]
    fn queries_before_mesh_load_fail_fast() {
        let mut fx = Fixture::new();
        let anchor = Anchor::new(5, DVec3::ZERO).shared();
        let handle = fx.controller.attach(&anchor, surface()).expect("attach");

        assert_eq!(fx.controller.state(&handle), MarkerState::Unattached);
        assert!(matches!(
            fx.controller.device_position(&handle, &fx.camera),
            Err(OverlayError::NotInitialized { anchor: 5 })
        ));
        assert!(matches!(
            fx.controller.move_anchor(&handle, DVec3::ONE),
            Err(OverlayError::NotInitialized { anchor: 5 })
        ));

        fx.load_side_mesh();
        assert_eq!(fx.controller.state(&handle), MarkerState::Attached);
        let device = fx
            .controller
            .device_position(&handle, &fx.camera)
            .expect("attached")
            .expect("projection");
        assert!(device.length() < 1e-9);
    }

    #[test]
    fn duplicate_anchor_is_rejected_without_leaking_a_subscription() {
        let mut fx = Fixture::new();
        fx.load_side_mesh();
        let anchor = Anchor::new(2, DVec3::ZERO).shared();
        let _handle = fx.controller.attach(&anchor, surface()).expect("attach");
        let err = fx.controller.attach(&anchor, surface()).expect_err("duplicate");
        assert!(matches!(err, OverlayError::DuplicateAnchor(2)));
        assert_eq!(fx.meshes.subscriber_count(), 1);
        assert_eq!(fx.controller.len(), 1);
    }

    #[test]
    fn missing_canvas_fails_attach_and_releases_subscription() {
        let scene = Rc::new(RefCell::new(SceneGraph::new()));
        let meshes = MeshProvider::new();
        meshes.load(SceneObject::mesh("part.stl", Rc::new(TriangleMesh::default())));
        let mut controller: OverlayController<InlineStyle> = OverlayController::new(
            Rc::clone(&scene),
            meshes.clone(),
            Rc::new(RefCell::new(NoCanvas)),
            OverlayConfig::default(),
        );
        let anchor = Anchor::new(3, DVec3::ZERO).shared();
        let err = controller.attach(&anchor, surface()).expect_err("no canvas");
        assert!(matches!(err, OverlayError::MissingRenderContext { .. }));
        assert_eq!(meshes.subscriber_count(), 0);
        assert!(scene.borrow().is_empty());
        assert!(controller.is_empty());
    }

    #[test]
    fn detach_removes_primitive_and_stops_frame_writes() {
        let mut fx = Fixture::new();
        fx.load_side_mesh();
        let anchor = Anchor::new(1, DVec3::ZERO).shared();
        let style = surface();
        let handle = fx.controller.attach(&anchor, Rc::clone(&style)).expect("attach");

        fx.render();
        fx.render();
        let writes = style.borrow().writes();
        assert!(writes > 0);

        fx.controller.detach(handle);
        assert!(!fx.scene.borrow().contains("Annotation 1"));
        assert_eq!(fx.meshes.subscriber_count(), 0);

        fx.render();
        fx.render();
        fx.load_side_mesh();
        fx.render();
        assert_eq!(style.borrow().writes(), writes);
        assert!(fx.scene.borrow().is_empty());
    }

    #[test]
    fn mesh_reload_replaces_the_primitive() {
        let mut fx = Fixture::new();
        fx.load_side_mesh();
        let anchor = Anchor::new(1, DVec3::ZERO).shared();
        let handle = fx.controller.attach(&anchor, surface()).expect("attach");
        let before = fx.controller.object_id(&handle).expect("object");

        fx.load_side_mesh();
        let after = fx.controller.object_id(&handle).expect("object");
        assert_ne!(before, after);
        let scene = fx.scene.borrow();
        assert_eq!(scene.names().filter(|name| *name == "Annotation 1").count(), 1);
        assert!(scene.get(before).is_none());
        assert!(scene.has_pre_draw_hook(after));
    }

    #[test]
    fn explicit_reload_keeps_one_primitive_per_anchor() {
        let mut fx = Fixture::new();
        fx.load_side_mesh();
        let first = Anchor::new(1, DVec3::ZERO).shared();
        let second = Anchor::new(2, DVec3::new(0.5, 0.5, 0.0)).shared();
        let _a = fx.controller.attach(&first, surface()).expect("attach");
        let _b = fx.controller.attach(&second, surface()).expect("attach");
        fx.controller.on_mesh_reloaded();
        assert_eq!(fx.scene.borrow().len(), 2);
        assert_eq!(fx.controller.anchor_ids().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn move_anchor_updates_anchor_and_primitive() {
        let mut fx = Fixture::new();
        fx.load_side_mesh();
        let anchor = Anchor::new(1, DVec3::ZERO).shared();
        let handle = fx.controller.attach(&anchor, surface()).expect("attach");
        let target = DVec3::new(0.25, -0.5, 0.0);
        fx.controller.move_anchor(&handle, target).expect("move");
        assert_eq!(anchor.borrow().position, target);
        assert_eq!(fx.controller.world_position(&handle).expect("attached"), target);
    }

    #[test]
    fn dropping_controller_clears_markers() {
        let mut fx = Fixture::new();
        fx.load_side_mesh();
        let anchor = Anchor::new(1, DVec3::ZERO).shared();
        let _handle = fx.controller.attach(&anchor, surface()).expect("attach");
        let Fixture { scene, meshes, controller, .. } = fx;
        drop(controller);
        assert!(scene.borrow().is_empty());
        assert_eq!(meshes.subscriber_count(), 0);
    }
}
