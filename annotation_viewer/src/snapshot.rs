//! Rasterises the marker surfaces of the last rendered frame into a PNG so a
//! headless run can be eyeballed without a browser.

use std::{fs::File, path::Path};

use annotation_overlay::{InlineStyle, StyleProperty, ViewportRect};
use anyhow::{Context, Result, ensure};
use image::{ColorType, ImageEncoder, Rgba, RgbaImage, codecs::png::PngEncoder};

const BACKGROUND: Rgba<u8> = Rgba([24, 24, 28, 255]);
const MARKER_FILL: [u8; 3] = [238, 238, 238];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotStats {
    pub drawn: usize,
    pub hidden: usize,
}

fn parse_px(value: &str) -> Option<f64> {
    value.strip_suffix("px")?.parse().ok()
}

pub fn render_overlay(
    viewport: ViewportRect,
    marker_side: f64,
    styles: impl IntoIterator<Item = InlineStyle>,
) -> Result<(RgbaImage, SnapshotStats)> {
    ensure!(
        !viewport.is_degenerate(),
        "cannot snapshot a {}x{} viewport",
        viewport.width,
        viewport.height
    );
    let width = viewport.width.round() as u32;
    let height = viewport.height.round() as u32;
    let mut image = RgbaImage::from_pixel(width, height, BACKGROUND);
    let mut stats = SnapshotStats::default();

    for style in styles {
        if style.is_hidden() {
            stats.hidden += 1;
            continue;
        }
        let (Some(left), Some(top)) = (
            style.get(StyleProperty::Left).and_then(parse_px),
            style.get(StyleProperty::Top).and_then(parse_px),
        ) else {
            continue;
        };
        let opacity = style
            .get(StyleProperty::Opacity)
            .and_then(|value| value.parse::<f64>().ok())
            .unwrap_or(1.0)
            .clamp(0.0, 1.0);
        blend_square(&mut image, left, top, marker_side, opacity);
        stats.drawn += 1;
    }
    Ok((image, stats))
}

fn blend_square(image: &mut RgbaImage, left: f64, top: f64, side: f64, opacity: f64) {
    let x0 = left.floor().max(0.0) as u32;
    let y0 = top.floor().max(0.0) as u32;
    let x1 = ((left + side).ceil().max(0.0) as u32).min(image.width());
    let y1 = ((top + side).ceil().max(0.0) as u32).min(image.height());
    for y in y0..y1 {
        for x in x0..x1 {
            let pixel = image.get_pixel_mut(x, y);
            for channel in 0..3 {
                let base = pixel.0[channel] as f64;
                let blended = base + (MARKER_FILL[channel] as f64 - base) * opacity;
                pixel.0[channel] = blended.round() as u8;
            }
        }
    }
}

pub fn write_png(image: &RgbaImage, destination: &Path) -> Result<()> {
    let file = File::create(destination)
        .with_context(|| format!("creating {}", destination.display()))?;
    let encoder = PngEncoder::new(file);
    encoder
        .write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgba8)
        .with_context(|| format!("encoding PNG {}", destination.display()))?;
    Ok(())
}

#[cfg(test)]
mod snapshot_tests {
    use annotation_overlay::DisplaySurface;

    use super::*;

    fn style(pairs: &[(StyleProperty, &str)]) -> InlineStyle {
        let mut style = InlineStyle::new();
        for (property, value) in pairs {
            style.set_style(*property, value.to_string());
        }
        style
    }

    #[test]
    fn visible_marker_is_blended_at_its_offset() {
        let shown = style(&[
            (StyleProperty::Visibility, "visible"),
            (StyleProperty::Left, "384px"),
            (StyleProperty::Top, "284px"),
            (StyleProperty::Opacity, "1"),
        ]);
        let hidden = style(&[(StyleProperty::Visibility, "hidden")]);
        let (image, stats) =
            render_overlay(ViewportRect::new(800.0, 600.0), 32.0, [shown, hidden]).expect("render");
        assert_eq!(stats, SnapshotStats { drawn: 1, hidden: 1 });
        assert_eq!(image.get_pixel(400, 300).0[..3], MARKER_FILL);
        assert_eq!(*image.get_pixel(10, 10), BACKGROUND);
    }

    #[test]
    fn marker_at_edge_is_clipped() {
        let shown = style(&[
            (StyleProperty::Visibility, "visible"),
            (StyleProperty::Left, "-10px"),
            (StyleProperty::Top, "590px"),
        ]);
        let (image, stats) =
            render_overlay(ViewportRect::new(100.0, 600.0), 32.0, [shown]).expect("render");
        assert_eq!(stats.drawn, 1);
        assert_eq!(image.get_pixel(0, 599).0[..3], MARKER_FILL);
    }

    #[test]
    fn parses_pixel_values() {
        assert_eq!(parse_px("384px"), Some(384.0));
        assert_eq!(parse_px("-2.5px"), Some(-2.5));
        assert_eq!(parse_px("12"), None);
    }
}
