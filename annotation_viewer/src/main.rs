mod cli;
mod scene_file;
mod session;
mod snapshot;

use std::fs;

use anyhow::{Context, Result};
use clap::Parser;

use crate::cli::Args;
use crate::session::{FrameRecord, Session};

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::init();

    args.validate()?;
    let config = args.overlay_config()?;
    let marker_side = config.marker_half_size_px * 2.0;
    let scene = scene_file::load_scene(&args.scene)?;
    let mut session = Session::new(scene, config).context("building overlay session")?;

    let records = session.run(args.frames)?;
    if args.verbose {
        records.iter().for_each(print_frame);
    } else if let Some(last) = records.last() {
        print_frame(last);
    }

    if let Some(path) = args.frames_json.as_ref() {
        let json = serde_json::to_string_pretty(&records).context("serializing frame log")?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("Frame log written to {}", path.display());
    }

    if let Some(path) = args.dump_frame.as_ref() {
        let styles = session.marker_styles().map(|(_, style)| style);
        let (image, stats) = snapshot::render_overlay(session.viewport(), marker_side, styles)?;
        snapshot::write_png(&image, path)?;
        println!(
            "Overlay snapshot exported to {} ({} drawn, {} hidden)",
            path.display(),
            stats.drawn,
            stats.hidden
        );
    }

    Ok(())
}

fn print_frame(record: &FrameRecord) {
    println!(
        "frame {}: {} objects drawn, {} marker hooks",
        record.frame, record.drawn, record.hooks_run
    );
    for (id, marker) in &record.markers {
        let style = marker
            .style
            .iter()
            .map(|(property, value)| format!("{property}={value}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "  [{id}] {} #{} \"{}\" ({}) {}",
            marker.name, marker.label, marker.text, marker.state, style
        );
    }
}
