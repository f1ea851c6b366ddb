use std::path::PathBuf;

use thiserror::Error;

/// Faults surfaced by the overlay. Degenerate geometry never shows up here;
/// the frame path absorbs it by hiding the marker for that frame.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("marker for anchor {anchor} was queried before its primitive was created")]
    NotInitialized { anchor: u32 },
    #[error("no 2D canvas available to build the texture for marker {name}")]
    MissingRenderContext { name: String },
    #[error("anchor {0} is already attached")]
    DuplicateAnchor(u32),
    #[error("scene already contains an object named {0:?}")]
    DuplicateObjectName(String),
    #[error("reading overlay config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing overlay config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = OverlayError> = std::result::Result<T, E>;
