//! Decides whether a marker is hidden behind the mesh.
//!
//! A ray is cast from the camera through the anchor's device position and the
//! hits are ordered by distance. The marker is visible when nothing is hit,
//! when its own sprite is hit first, or when the first two hits sit at the
//! same distance once rounded to `distance_precision` decimals. The rounding
//! keeps markers placed exactly on the surface from flickering as the sprite
//! and mesh hits jitter past each other. Only the first two hits take part in
//! that comparison.

use glam::{DVec2, DVec3};

use crate::camera::Camera;
use crate::config::OverlayConfig;
use crate::projector::within_window;
use crate::scene::{Intersection, Raycast};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcclusionTester {
    pub visibility_margin: f64,
    pub distance_precision: u32,
}

impl Default for OcclusionTester {
    fn default() -> Self {
        Self::from_config(&OverlayConfig::default())
    }
}

impl OcclusionTester {
    pub fn from_config(config: &OverlayConfig) -> Self {
        Self {
            visibility_margin: config.visibility_margin,
            distance_precision: config.distance_precision,
        }
    }

    pub fn in_window(&self, device: DVec2) -> bool {
        within_window(device, self.visibility_margin)
    }

    pub fn is_visible(
        &self,
        anchor: DVec3,
        device: DVec2,
        camera: &Camera,
        targets: &[&dyn Raycast],
        self_name: &str,
    ) -> bool {
        if !anchor.is_finite() || !device.is_finite() || !self.in_window(device) {
            return false;
        }
        let Some(ray) = camera.ray_through(device) else {
            return false;
        };

        let mut hits = Vec::new();
        for target in targets {
            target.raycast(&ray, camera, &mut hits);
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        self.classify(&hits, self_name)
    }

    /// `hits` must already be sorted nearest first. Repeated hits on one
    /// object at the same rounded distance (a ray crossing a shared triangle
    /// edge or vertex) count once, so only two different objects can tie.
    pub fn classify(&self, hits: &[Intersection], self_name: &str) -> bool {
        let Some(first) = hits.first() else {
            return true;
        };
        if first.object == self_name {
            return true;
        }
        let first_distance = quantize(first.distance, self.distance_precision);
        let second = hits[1..].iter().find(|hit| {
            hit.object != first.object
                || quantize(hit.distance, self.distance_precision) != first_distance
        });
        match second {
            Some(second) => quantize(second.distance, self.distance_precision) == first_distance,
            None => false,
        }
    }
}

/// Distance in units of `10^-precision`, rounded half away from zero.
fn quantize(distance: f64, precision: u32) -> i64 {
    let scale = 10f64.powi(precision.min(12) as i32);
    (distance * scale).round() as i64
}

/// Convenience wrapper with default tuning.
pub fn is_visible(
    anchor: DVec3,
    device: DVec2,
    camera: &Camera,
    targets: &[&dyn Raycast],
    self_name: &str,
) -> bool {
    OcclusionTester::default().is_visible(anchor, device, camera, targets, self_name)
}
