//! PNG sprite normalization: composite onto an opaque background and re-encode as JPEG.

use crate::codec::{open_image, write_jpeg};
use crate::config::NormalizeConfig;
use crate::error::PrepError;
use crate::layout::Layout;
use image::{DynamicImage, Rgba, RgbaImage, imageops};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of normalizing a list of items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub converted: usize,
    pub skipped: usize,
}

/// Flatten an image with alpha onto an opaque `background` of the same size.
pub fn flatten_onto(img: &DynamicImage, background: [u8; 3]) -> DynamicImage {
    let src = img.to_rgba8();
    let [r, g, b] = background;
    let mut canvas = RgbaImage::from_pixel(src.width(), src.height(), Rgba([r, g, b, 255]));
    imageops::overlay(&mut canvas, &src, 0, 0);
    DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
}

/// Convert `<images>/<name>.png` to `<images>/<name>.jpg`.
///
/// Returns `Ok(None)` when the item has no source image; that is not an error.
/// The source file is left in place.
pub fn normalize_item(
    layout: &Layout,
    name: &str,
    opts: &NormalizeConfig,
) -> Result<Option<PathBuf>, PrepError> {
    let source = layout.source_image(name);
    if !source.is_file() {
        tracing::debug!(name, "No source image, skipping");
        return Ok(None);
    }

    let flattened = flatten_onto(&open_image(&source)?, opts.background);
    let target = layout.normalized_image(name);
    write_jpeg(&target, &flattened, opts.jpeg_quality)?;
    tracing::debug!(name, path = %target.display(), "Normalized image");
    Ok(Some(target))
}

/// Normalize every named item, skipping names without a source image.
pub fn normalize_all<'a, I>(
    layout: &Layout,
    names: I,
    opts: &NormalizeConfig,
) -> Result<NormalizeReport, PrepError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut report = NormalizeReport::default();
    for name in names {
        match normalize_item(layout, name, opts)? {
            Some(_) => report.converted += 1,
            None => report.skipped += 1,
        }
    }
    tracing::info!(
        converted = report.converted,
        skipped = report.skipped,
        "Normalized source images"
    );
    Ok(report)
}
