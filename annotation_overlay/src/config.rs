//! Tunables for the marker overlay. Every field has a default so a preset file
//! only needs to name the values it overrides.

use std::{fs, path::Path};

use serde::Deserialize;

use crate::error::{OverlayError, Result};

pub const DEFAULT_VISIBILITY_MARGIN: f64 = 0.90;
pub const DEFAULT_DISTANCE_PRECISION: u32 = 4;
pub const DEFAULT_MARKER_HALF_SIZE_PX: f64 = 16.0;
pub const DEFAULT_OCCLUDED_OPACITY: f64 = 0.2;
pub const DEFAULT_MARKER_WORLD_SIZE: f64 = 1.0;
pub const DEFAULT_MARKER_TEXTURE_SIDE: u32 = 64;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Half-width of the device-space window in which markers are shown.
    pub visibility_margin: f64,
    /// Decimal places used when comparing hit distances for the tie-break.
    pub distance_precision: u32,
    /// Offset applied to the projected pixel so the glyph is centred.
    pub marker_half_size_px: f64,
    pub occluded_opacity: f64,
    /// Edge length of the sprite used for ray tests, in world units.
    pub marker_world_size: f64,
    pub marker_texture_side: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            visibility_margin: DEFAULT_VISIBILITY_MARGIN,
            distance_precision: DEFAULT_DISTANCE_PRECISION,
            marker_half_size_px: DEFAULT_MARKER_HALF_SIZE_PX,
            occluded_opacity: DEFAULT_OCCLUDED_OPACITY,
            marker_world_size: DEFAULT_MARKER_WORLD_SIZE,
            marker_texture_side: DEFAULT_MARKER_TEXTURE_SIDE,
        }
    }
}

impl OverlayConfig {
    pub fn from_json_str(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|source| OverlayError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&data).map_err(|source| OverlayError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}
