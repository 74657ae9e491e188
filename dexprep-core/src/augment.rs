//! Deterministic geometric augmentation of the training tree.
//!
//! Every training image yields seven derivatives written next to it:
//!
//! | suffix | derivation |
//! |--------|------------|
//! | `_f`   | vertical flip of the original |
//! | `_m`   | horizontal mirror of the original |
//! | `_fm`  | mirror of `_f` |
//! | `_r`   | 90° counter-clockwise rotation of the original |
//! | `_rf`  | flip of `_r` |
//! | `_rm`  | mirror of `_r` |
//! | `_rfm` | mirror of `_rf` |

use crate::codec::{open_image, write_jpeg};
use crate::config::AugmentConfig;
use crate::error::PrepError;
use crate::layout::{Layout, NORMALIZED_EXT, Variant, has_extension, is_derivative};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// The eight variants of one source image.
#[derive(Debug, Clone)]
pub struct VariantSet {
    pub original: DynamicImage,
    pub flip: DynamicImage,
    pub mirror: DynamicImage,
    pub flip_mirror: DynamicImage,
    pub rot: DynamicImage,
    pub rot_flip: DynamicImage,
    pub rot_mirror: DynamicImage,
    pub rot_flip_mirror: DynamicImage,
}

impl VariantSet {
    /// Derive all variants. The call graph is fixed: compound variants are
    /// built from the intermediate images, never from a fresh decode.
    ///
    /// Rotation swaps width and height instead of cropping to the source
    /// canvas; for square sprites both give the same pixels.
    pub fn derive(original: DynamicImage) -> Self {
        let flip = original.flipv();
        let mirror = original.fliph();
        let flip_mirror = flip.fliph();
        let rot = original.rotate270();
        let rot_flip = rot.flipv();
        let rot_mirror = rot.fliph();
        let rot_flip_mirror = rot_flip.fliph();
        Self {
            original,
            flip,
            mirror,
            flip_mirror,
            rot,
            rot_flip,
            rot_mirror,
            rot_flip_mirror,
        }
    }

    pub fn get(&self, variant: Variant) -> &DynamicImage {
        match variant {
            Variant::Identity => &self.original,
            Variant::Flip => &self.flip,
            Variant::Mirror => &self.mirror,
            Variant::FlipMirror => &self.flip_mirror,
            Variant::Rot => &self.rot,
            Variant::RotFlip => &self.rot_flip,
            Variant::RotMirror => &self.rot_mirror,
            Variant::RotFlipMirror => &self.rot_flip_mirror,
        }
    }

    /// The seven derived variants in write order.
    pub fn derived(&self) -> impl Iterator<Item = (Variant, &DynamicImage)> {
        Variant::DERIVED.into_iter().map(|v| (v, self.get(v)))
    }
}

/// Outcome of augmenting the training tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AugmentReport {
    pub sources: usize,
    pub written: usize,
}

/// Every `train/<label>/*.jpg`, sorted.
pub fn list_training_images(layout: &Layout) -> Result<Vec<PathBuf>, PrepError> {
    let train = layout.train_dir();
    if !train.is_dir() {
        return Err(PrepError::missing("training directory", train));
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(train).min_depth(2).max_depth(2) {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if entry.file_type().is_file() && has_extension(path, NORMALIZED_EXT) {
            images.push(path.to_path_buf());
        }
    }
    images.sort();
    Ok(images)
}

fn file_stem(path: &Path) -> Result<&str, PrepError> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| PrepError::missing("UTF-8 file stem", path))
}

/// Write the seven derivatives of `source` next to it.
pub fn augment_image(source: &Path, quality: u8) -> Result<usize, PrepError> {
    let stem = file_stem(source)?;
    let dir = source
        .parent()
        .ok_or_else(|| PrepError::missing("parent directory", source))?;

    let variants = VariantSet::derive(open_image(source)?);
    let mut written = 0;
    for (variant, img) in variants.derived() {
        write_jpeg(&variant.path_in(dir, stem), img, quality)?;
        written += 1;
    }
    tracing::debug!(path = %source.display(), written, "Augmented image");
    Ok(written)
}

/// Augment every image in the training tree.
///
/// With `reject_augmented` set, a tree that already holds a derivative (see
/// [`is_derivative`]) is refused before anything is written.
pub fn augment_train_tree(
    layout: &Layout,
    opts: &AugmentConfig,
    quality: u8,
) -> Result<AugmentReport, PrepError> {
    let sources = list_training_images(layout)?;

    if opts.reject_augmented {
        for path in &sources {
            let dir = path
                .parent()
                .ok_or_else(|| PrepError::missing("parent directory", path))?;
            if is_derivative(dir, file_stem(path)?) {
                return Err(PrepError::AlreadyAugmented { path: path.clone() });
            }
        }
    }

    let mut report = AugmentReport::default();
    for source in &sources {
        report.written += augment_image(source, quality)?;
        report.sources += 1;
    }
    tracing::info!(
        sources = report.sources,
        written = report.written,
        "Augmented training images"
    );
    Ok(report)
}
