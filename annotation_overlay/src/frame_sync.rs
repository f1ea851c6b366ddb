//! Per-frame marker update, run as the marker primitive's pre-draw hook.
//!
//! Order within a frame is fixed: project the anchor, test occlusion, write
//! the surface. The write happens before the scene graph draws the primitive,
//! so the marker never lags its anchor by a frame.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use glam::DVec2;

use crate::anchor::Anchor;
use crate::config::OverlayConfig;
use crate::mesh_provider::MeshProvider;
use crate::occlusion::OcclusionTester;
use crate::projector::project;
use crate::scene::{FrameContext, PreDrawHook, Raycast, SceneObject};
use crate::surface::{DisplaySurface, StyleProperty};

/// Outcome of one frame for one marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerFrame {
    Hidden,
    Shown { pixel: DVec2, visible: bool },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerStyle {
    pub half_size_px: f64,
    pub occluded_opacity: f64,
}

impl MarkerStyle {
    pub fn from_config(config: &OverlayConfig) -> Self {
        Self {
            half_size_px: config.marker_half_size_px,
            occluded_opacity: config.occluded_opacity,
        }
    }
}

impl MarkerFrame {
    pub fn apply(&self, style: &MarkerStyle, surface: &mut dyn DisplaySurface) {
        match *self {
            MarkerFrame::Hidden => surface.set_style(StyleProperty::Visibility, "hidden".into()),
            MarkerFrame::Shown { pixel, visible } => {
                surface.set_style(StyleProperty::Visibility, "visible".into());
                surface.set_style(
                    StyleProperty::Left,
                    format!("{}px", pixel.x - style.half_size_px),
                );
                surface.set_style(
                    StyleProperty::Top,
                    format!("{}px", pixel.y - style.half_size_px),
                );
                let opacity = if visible { 1.0 } else { style.occluded_opacity };
                surface.set_style(StyleProperty::Opacity, opacity.to_string());
                surface.set_style(
                    StyleProperty::ZIndex,
                    if visible { "1" } else { "0" }.into(),
                );
            }
        }
    }
}

pub struct FrameSynchronizer<S> {
    anchor: Weak<RefCell<Anchor>>,
    meshes: MeshProvider,
    surface: Rc<RefCell<S>>,
    tester: OcclusionTester,
    style: MarkerStyle,
}

impl<S: DisplaySurface> FrameSynchronizer<S> {
    pub fn new(
        anchor: Weak<RefCell<Anchor>>,
        meshes: MeshProvider,
        surface: Rc<RefCell<S>>,
        config: &OverlayConfig,
    ) -> Self {
        Self {
            anchor,
            meshes,
            surface,
            tester: OcclusionTester::from_config(config),
            style: MarkerStyle::from_config(config),
        }
    }

    /// Projection and occlusion for this frame. Also moves the primitive onto
    /// the anchor's current position so the ray test sees it there.
    pub fn evaluate(&self, frame: &FrameContext<'_>, object: &mut SceneObject) -> MarkerFrame {
        let Some(anchor) = self.anchor.upgrade() else {
            return MarkerFrame::Hidden;
        };
        let position = anchor.borrow().position;
        object.set_position(position);

        let Some(projection) = project(position, frame.camera, frame.viewport) else {
            log::trace!("[overlay] {} skipped: degenerate projection", object.name);
            return MarkerFrame::Hidden;
        };
        if !self.tester.in_window(projection.device) {
            return MarkerFrame::Hidden;
        }

        let mesh = self.meshes.current();
        let marker: &SceneObject = object;
        let mut targets: Vec<&dyn Raycast> = Vec::with_capacity(2);
        if let Some(mesh) = mesh.as_deref() {
            targets.push(mesh);
        }
        targets.push(marker);
        let visible = self.tester.is_visible(
            position,
            projection.device,
            frame.camera,
            &targets,
            &marker.name,
        );
        MarkerFrame::Shown {
            pixel: projection.pixel,
            visible,
        }
    }
}

impl<S: DisplaySurface> PreDrawHook for FrameSynchronizer<S> {
    fn before_draw(&mut self, frame: &FrameContext<'_>, object: &mut SceneObject) {
        let outcome = self.evaluate(frame, object);
        outcome.apply(&self.style, &mut *self.surface.borrow_mut());
    }
}
