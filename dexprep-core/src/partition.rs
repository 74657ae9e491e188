//! Class/split directory tree construction and image placement.

use crate::config::PartitionConfig;
use crate::error::{FileOp, PrepError};
use crate::labels::{LabelRow, distinct_labels};
use crate::layout::{Layout, NORMALIZED_EXT, SOURCE_EXT, has_extension};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A file the best-effort cleanup could not remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of partitioning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionReport {
    pub classes: usize,
    pub train_copies: usize,
    pub test_copies: usize,
    pub skipped: usize,
    pub removed: usize,
    pub cleanup_failures: Vec<CleanupFailure>,
}

/// Create `path` as a directory, treating an existing directory as success.
pub fn ensure_dir(path: &Path) -> Result<bool, PrepError> {
    match std::fs::create_dir(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(false),
        Err(source) => Err(PrepError::DirectoryCreation {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Create the split roots and one class directory per label under each.
pub fn create_class_dirs(layout: &Layout, labels: &[String]) -> Result<usize, PrepError> {
    let mut created = 0;
    for root in [layout.train_dir(), layout.test_dir()] {
        created += usize::from(ensure_dir(root)?);
    }
    for label in labels {
        created += usize::from(ensure_dir(&layout.train_class_dir(label))?);
        created += usize::from(ensure_dir(&layout.test_class_dir(label))?);
    }
    tracing::debug!(classes = labels.len(), created, "Class directories ready");
    Ok(created)
}

/// Copy each row's normalized image into its class directories.
///
/// Every row goes to `train/<label>/`; primary-slot rows also go to
/// `test/<label>/`. Rows without a normalized image are skipped.
pub fn place_images(
    layout: &Layout,
    rows: &[LabelRow],
    report: &mut PartitionReport,
) -> Result<(), PrepError> {
    for row in rows {
        let source = layout.normalized_image(&row.name);
        if !source.is_file() {
            tracing::debug!(name = %row.name, "No normalized image, skipping row");
            report.skipped += 1;
            continue;
        }

        copy_into(&source, &layout.train_class_dir(&row.label))?;
        report.train_copies += 1;

        if row.slot.is_test_eligible() {
            copy_into(&source, &layout.test_class_dir(&row.label))?;
            report.test_copies += 1;
        }
    }
    Ok(())
}

fn copy_into(source: &Path, dir: &Path) -> Result<(), PrepError> {
    let file_name = source
        .file_name()
        .ok_or_else(|| PrepError::missing("file name", source))?;
    let target = dir.join(file_name);
    std::fs::copy(source, &target).map_err(|e| PrepError::file_op(FileOp::Copy, &target, e))?;
    Ok(())
}

/// Remove flat-layout images and known debris from the images directory.
///
/// Only files directly in the images directory are considered; the split
/// trees are never touched. Failures are collected, not raised.
pub fn cleanup_flat_dir(
    layout: &Layout,
    stray_files: &[String],
    report: &mut PartitionReport,
) -> Result<(), PrepError> {
    let mut targets = Vec::new();
    for entry in std::fs::read_dir(layout.images_dir())? {
        let path = entry?.path();
        if path.is_file() && (has_extension(&path, SOURCE_EXT) || has_extension(&path, NORMALIZED_EXT))
        {
            targets.push(path);
        }
    }
    targets.extend(
        stray_files
            .iter()
            .map(|name| layout.images_dir().join(name))
            .filter(|path| path.is_file()),
    );
    targets.sort();
    targets.dedup();

    remove_best_effort(targets, report);
    Ok(())
}

/// Remove every target, collecting failures instead of stopping at the first.
fn remove_best_effort(targets: Vec<PathBuf>, report: &mut PartitionReport) {
    for path in targets {
        match std::fs::remove_file(&path) {
            Ok(()) => report.removed += 1,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove file");
                report.cleanup_failures.push(CleanupFailure {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Build the class/split tree, place images, then clean the flat directory.
pub fn partition(
    layout: &Layout,
    rows: &[LabelRow],
    opts: &PartitionConfig,
) -> Result<PartitionReport, PrepError> {
    let labels = distinct_labels(rows);
    create_class_dirs(layout, &labels)?;

    let mut report = PartitionReport {
        classes: labels.len(),
        ..PartitionReport::default()
    };
    place_images(layout, rows, &mut report)?;
    cleanup_flat_dir(layout, &opts.stray_files, &mut report)?;

    tracing::info!(
        classes = report.classes,
        train = report.train_copies,
        test = report.test_copies,
        skipped = report.skipped,
        removed = report.removed,
        failures = report.cleanup_failures.len(),
        "Partitioned dataset"
    );
    Ok(report)
}
