//! World → device → pixel conversion for marker placement.

use glam::{DVec2, DVec3};
use serde::Deserialize;

use crate::camera::Camera;

/// Pixel bounds of the element the overlay is positioned inside.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ViewportRect {
    pub width: f64,
    pub height: f64,
}

impl ViewportRect {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_degenerate(&self) -> bool {
        !self.width.is_finite() || !self.height.is_finite() || self.width <= 0.0 || self.height <= 0.0
    }

    pub fn aspect_ratio(&self) -> Option<f64> {
        (!self.is_degenerate()).then(|| self.width / self.height)
    }

    /// Device space has +Y up, the viewport has +Y down.
    pub fn device_to_pixel(&self, device: DVec2) -> DVec2 {
        let half_width = self.width / 2.0;
        let half_height = self.height / 2.0;
        DVec2::new(
            device.x * half_width + half_width,
            -device.y * half_height + half_height,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub device: DVec2,
    pub pixel: DVec2,
}

impl Projection {
    /// True when both device coordinates lie inside `[-margin, margin]`.
    pub fn within_window(&self, margin: f64) -> bool {
        within_window(self.device, margin)
    }
}

pub fn within_window(device: DVec2, margin: f64) -> bool {
    (-margin..=margin).contains(&device.x) && (-margin..=margin).contains(&device.y)
}

/// `None` means the inputs were degenerate for this frame and nothing should
/// be written from the result.
pub fn project(world: DVec3, camera: &Camera, viewport: ViewportRect) -> Option<Projection> {
    if viewport.is_degenerate() {
        return None;
    }
    let device = camera.project(world)?.truncate();
    Some(Projection {
        device,
        pixel: viewport.device_to_pixel(device),
    })
}
