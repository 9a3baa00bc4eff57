//! Max-projection PNG with the annotated points drawn on top.

use std::path::Path;

use image::{Rgb, RgbImage};

use super::AnnotationSet;
use crate::error::{Error, Result};
use crate::volume::Volume;

const MARKER_COLOR: Rgb<u8> = Rgb([255, 64, 64]);
const MARKER_SIZE: i64 = 3;

/// Render a contrast-stretched max projection of `volume` with a cross at
/// every annotation and save it as PNG.
pub fn save_overlay(volume: &Volume, annotations: &AnnotationSet, path: &Path) -> Result<()> {
    let image = render_overlay(volume, annotations);
    image.save(path).map_err(|e| Error::Image {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), points = annotations.len(), "Saved peak overlay");
    Ok(())
}

pub(super) fn render_overlay(volume: &Volume, annotations: &AnnotationSet) -> RgbImage {
    let (width, height) = (volume.width(), volume.height());
    let projection = volume.max_projection();

    let (lo, hi) = projection
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let scale = if hi > lo { 255.0 / (hi - lo) } else { 0.0 };

    let mut image = RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let v = projection[y as usize * width + x as usize];
        let g = ((v - lo) * scale).round().clamp(0.0, 255.0) as u8;
        Rgb([g, g, g])
    });

    for point in annotations {
        draw_cross(
            &mut image,
            point.x.round() as i64,
            point.y.round() as i64,
            MARKER_SIZE,
        );
    }
    image
}

fn draw_cross(image: &mut RgbImage, cx: i64, cy: i64, half: i64) {
    let (w, h) = (image.width() as i64, image.height() as i64);
    for d in -half..=half {
        for (x, y) in [(cx + d, cy), (cx, cy + d)] {
            if x >= 0 && x < w && y >= 0 && y < h {
                image.put_pixel(x as u32, y as u32, MARKER_COLOR);
            }
        }
    }
}
