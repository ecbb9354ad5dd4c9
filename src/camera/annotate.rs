//! Bounding-box annotation of camera images.
//!
//! Each analyzed image gets a resized copy (fitting within 960x346,
//! aspect ratio preserved) with a red rectangle per detection, saved
//! under the camera's annotated-images subfolder.

use crate::models::Detection;
use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};

/// Maximum width of an annotated copy.
pub const MAX_WIDTH: u32 = 960;
/// Maximum height of an annotated copy.
pub const MAX_HEIGHT: u32 = 346;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: u32 = 3;

/// Compute the target dimensions fitting within `max_w` x `max_h` while
/// preserving aspect ratio. Images already inside the box are not
/// enlarged.
pub fn fit_within(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if width <= max_w && height <= max_h {
        return (width, height);
    }

    let scale = f64::min(max_w as f64 / width as f64, max_h as f64 / height as f64);
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    (w, h)
}

/// Annotate one image with its detection rectangles and save the copy
/// under `output_dir`, keeping the original filename.
///
/// Returns the path of the saved copy.
pub fn annotate_image(
    image_path: &Path,
    detections: &[Detection],
    output_dir: &Path,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).with_context(|| {
        format!(
            "Failed to create annotated-images folder: {}",
            output_dir.display()
        )
    })?;

    let source: RgbImage = image::open(image_path)
        .with_context(|| format!("Failed to open image: {}", image_path.display()))?
        .to_rgb8();

    let (src_w, src_h) = source.dimensions();
    let (w, h) = fit_within(src_w, src_h, MAX_WIDTH, MAX_HEIGHT);
    let mut resized = if (w, h) == (src_w, src_h) {
        source
    } else {
        image::imageops::resize(&source, w, h, FilterType::Lanczos3)
    };

    for detection in detections {
        let x1 = (detection.bounding_box_start_x * w as f64) as i64;
        let y1 = (detection.bounding_box_start_y * h as f64) as i64;
        let x2 = (detection.bounding_box_end_x * w as f64) as i64;
        let y2 = (detection.bounding_box_end_y * h as f64) as i64;
        draw_rect(&mut resized, x1, y1, x2, y2);
    }

    let file_name = image_path
        .file_name()
        .with_context(|| format!("Image path has no filename: {}", image_path.display()))?;
    let output_path = output_dir.join(file_name);

    resized
        .save(&output_path)
        .with_context(|| format!("Failed to save annotated image: {}", output_path.display()))?;

    Ok(output_path)
}

/// Draw a rectangle outline, clamped to the image bounds.
fn draw_rect(image: &mut RgbImage, x1: i64, y1: i64, x2: i64, y2: i64) {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let (left, right) = (x1.min(x2), x1.max(x2));
    let (top, bottom) = (y1.min(y2), y1.max(y2));

    for t in 0..BOX_THICKNESS as i64 {
        // Horizontal edges
        for x in left..=right {
            put_pixel_clamped(image, x, top + t, width, height);
            put_pixel_clamped(image, x, bottom - t, width, height);
        }
        // Vertical edges
        for y in top..=bottom {
            put_pixel_clamped(image, left + t, y, width, height);
            put_pixel_clamped(image, right - t, y, width, height);
        }
    }
}

fn put_pixel_clamped(image: &mut RgbImage, x: i64, y: i64, width: i64, height: i64) {
    if x >= 0 && x < width && y >= 0 && y < height {
        image.put_pixel(x as u32, y as u32, BOX_COLOR);
    }
}
