//! Marker textures. The sprite never shows on screen (its material is fully
//! transparent) but it still needs a filled texture so the renderer treats it
//! as a solid quad for depth and picking.

use image::{Rgba, RgbaImage};

use crate::error::{OverlayError, Result};

/// Source of 2D drawing surfaces. Returning `None` means no 2D context is
/// available on this host.
pub trait CanvasProvider {
    fn canvas(&mut self, width: u32, height: u32) -> Option<RgbaImage>;
}

/// CPU canvas backed by `image`; always available.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareCanvas;

impl CanvasProvider for SoftwareCanvas {
    fn canvas(&mut self, width: u32, height: u32) -> Option<RgbaImage> {
        Some(RgbaImage::new(width, height))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerTexture {
    pub image: RgbaImage,
}

impl MarkerTexture {
    pub fn side(&self) -> u32 {
        self.image.width()
    }
}

const FILL: Rgba<u8> = Rgba([0, 0, 0, 255]);

pub fn build_marker_texture(
    canvas: &mut dyn CanvasProvider,
    side: u32,
    name: &str,
) -> Result<MarkerTexture> {
    let side = side.max(1);
    let mut image = canvas
        .canvas(side, side)
        .ok_or_else(|| OverlayError::MissingRenderContext {
            name: name.to_string(),
        })?;
    for pixel in image.pixels_mut() {
        *pixel = FILL;
    }
    Ok(MarkerTexture { image })
}
