//! Thin wrappers over the `image` codecs with path-carrying errors.

use crate::error::{FileOp, PrepError};
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use std::path::Path;

/// Decode any supported image file.
pub fn open_image(path: &Path) -> Result<DynamicImage, PrepError> {
    image::open(path).map_err(|e| PrepError::image(path, e))
}

/// Encode an image as baseline RGB JPEG at `quality`.
///
/// Output bytes depend only on the pixels, the quality and the codec version.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;
    Ok(buf)
}

/// Encode `img` as JPEG and write it to `path`.
pub fn write_jpeg(path: &Path, img: &DynamicImage, quality: u8) -> Result<(), PrepError> {
    let bytes = encode_jpeg(img, quality).map_err(|e| PrepError::image(path, e))?;
    std::fs::write(path, bytes).map_err(|e| PrepError::file_op(FileOp::Write, path, e))
}
