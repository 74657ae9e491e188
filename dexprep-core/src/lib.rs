//! # dexprep-core: Sprite Dataset Preparation
//!
//! Turns a flat directory of transparent PNG sprites plus a wide
//! `Name, Type1, Type2` table into a class-bucketed, train/test-split JPEG
//! dataset with deterministic geometric augmentation.
//!
//! ## Stages
//!
//! 1. **Preflight**: working context, required inputs, already-processed marker
//! 2. **Normalize**: PNG with alpha → opaque JPEG on a white background
//! 3. **Reshape**: wide item table → long `(name, label, slot)` rows
//! 4. **Partition**: `train/<label>/` and `test/<label>/` trees, flat-dir cleanup
//! 5. **Augment**: seven flip/mirror/rotate derivatives per training image
//! 6. **Remove leakage**: originals leave `train/`, stay in `test/`
//! 7. **Update labels**: optional variant-expanded label table

pub mod augment;
pub mod codec;
pub mod config;
pub mod error;
pub mod labels;
pub mod layout;
pub mod leakage;
pub mod manifest;
pub mod normalize;
pub mod partition;
pub mod pipeline;
pub mod preflight;

// Re-exports
pub use config::{PrepConfig, load_config};
pub use error::{FileOp, PrepError};
pub use labels::{ItemRecord, LabelRow, TypeSlot};
pub use layout::{Layout, Variant};
pub use manifest::{RunManifest, Stage};
pub use pipeline::{Pipeline, RunSummary};
