use std::path::PathBuf;

use annotation_overlay::OverlayConfig;
use anyhow::{Context, Result, ensure};
use clap::Parser;

/// Every frame's record is kept for the frame log.
pub const MAX_FRAMES: u64 = 1_000_000;

#[derive(Parser, Debug)]
#[command(
    about = "Headless driver that renders annotation markers over a mesh scene",
    version
)]
pub struct Args {
    /// Scene description JSON (camera, viewport, mesh, anchors, script)
    #[arg(long)]
    pub scene: PathBuf,

    /// Number of frames to render
    #[arg(long, default_value_t = 1)]
    pub frames: u64,

    /// Optional overlay preset JSON overriding window margin, opacity, sizes
    #[arg(long)]
    pub overlay_preset: Option<PathBuf>,

    /// Path to write the per-frame marker style log as JSON
    #[arg(long)]
    pub frames_json: Option<PathBuf>,

    /// When set, rasterise the final frame's markers to a PNG
    #[arg(long)]
    pub dump_frame: Option<PathBuf>,

    /// Print every frame instead of only the last one
    #[arg(long)]
    pub verbose: bool,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.frames > 0, "--frames must be at least 1");
        ensure!(
            self.frames <= MAX_FRAMES,
            "--frames must be at most {MAX_FRAMES}, got {}",
            self.frames
        );
        Ok(())
    }

    pub fn overlay_config(&self) -> Result<OverlayConfig> {
        match self.overlay_preset.as_ref() {
            Some(path) => OverlayConfig::load(path)
                .with_context(|| format!("loading overlay preset {}", path.display())),
            None => Ok(OverlayConfig::default()),
        }
    }
}
