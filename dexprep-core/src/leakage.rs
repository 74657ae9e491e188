//! Removal of un-augmented originals from the training tree.
//!
//! After this stage `train/` holds only derivatives while `test/` keeps only
//! pristine originals.

use crate::augment::list_training_images;
use crate::error::{FileOp, PrepError};
use crate::layout::{Layout, Variant, is_derivative};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Outcome of removing originals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakageReport {
    pub removed: usize,
}

/// Training images that are not derivatives.
pub fn find_originals(layout: &Layout) -> Result<Vec<PathBuf>, PrepError> {
    Ok(list_training_images(layout)?
        .into_iter()
        .filter(|path| {
            let stem = path.file_stem().and_then(|s| s.to_str());
            match (path.parent(), stem) {
                (Some(dir), Some(stem)) => !is_derivative(dir, stem),
                _ => false,
            }
        })
        .collect())
}

fn missing_derivative(original: &Path) -> Option<PathBuf> {
    let stem = original.file_stem()?.to_str()?;
    let dir = original.parent()?;
    Variant::DERIVED
        .into_iter()
        .map(|v| v.path_in(dir, stem))
        .find(|p| !p.is_file())
}

/// Delete every original from `train/`.
///
/// Nothing is deleted unless every original already has all of its
/// derivatives; running before augmentation would otherwise empty the tree.
pub fn remove_originals(layout: &Layout) -> Result<LeakageReport, PrepError> {
    let originals = find_originals(layout)?;

    for original in &originals {
        if let Some(missing) = missing_derivative(original) {
            return Err(PrepError::NotAugmented {
                original: original.clone(),
                missing,
            });
        }
    }

    let mut report = LeakageReport::default();
    for original in &originals {
        std::fs::remove_file(original)
            .map_err(|e| PrepError::file_op(FileOp::Remove, original, e))?;
        tracing::debug!(path = %original.display(), "Removed original from training tree");
        report.removed += 1;
    }
    tracing::info!(removed = report.removed, "Removed originals from training tree");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree_with(files: &[&str]) -> (tempfile::TempDir, Layout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::with_root(dir.path());
        let class_dir = layout.train_class_dir("Water");
        fs::create_dir_all(&class_dir).unwrap();
        fs::create_dir_all(layout.test_class_dir("Water")).unwrap();
        for f in files {
            fs::write(class_dir.join(f), b"jpeg").unwrap();
        }
        fs::write(layout.test_class_dir("Water").join("squirtle.jpg"), b"jpeg").unwrap();
        (dir, layout)
    }

    fn full_set(stem: &str) -> Vec<String> {
        Variant::ALL
            .iter()
            .map(|v| format!("{}.jpg", v.apply(stem)))
            .collect()
    }

    #[test]
    fn test_removes_only_originals() {
        let names = full_set("squirtle");
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (_dir, layout) = tree_with(&refs);

        let report = remove_originals(&layout).unwrap();
        assert_eq!(report, LeakageReport { removed: 1 });

        let class_dir = layout.train_class_dir("Water");
        assert!(!class_dir.join("squirtle.jpg").exists());
        assert_eq!(fs::read_dir(&class_dir).unwrap().count(), 7);
        assert!(layout.test_class_dir("Water").join("squirtle.jpg").is_file());
    }

    #[test]
    fn test_refuses_before_augmentation() {
        let (_dir, layout) = tree_with(&["squirtle.jpg", "wartortle.jpg"]);
        let err = remove_originals(&layout).unwrap_err();
        assert!(matches!(err, PrepError::NotAugmented { .. }));
        assert!(layout.train_class_dir("Water").join("squirtle.jpg").is_file());
        assert!(layout.train_class_dir("Water").join("wartortle.jpg").is_file());
    }

    #[test]
    fn test_partial_derivatives_block_all_deletions() {
        let mut names = full_set("squirtle");
        names.push("wartortle.jpg".into());
        names.push("wartortle_f.jpg".into());
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (_dir, layout) = tree_with(&refs);

        match remove_originals(&layout).unwrap_err() {
            PrepError::NotAugmented { missing, .. } => {
                assert!(missing.ends_with("wartortle_m.jpg"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(layout.train_class_dir("Water").join("squirtle.jpg").is_file());
    }

    #[test]
    fn test_underscore_item_is_an_original() {
        let names = full_set("mr_mime");
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (_dir, layout) = tree_with(&refs);

        assert_eq!(
            find_originals(&layout).unwrap(),
            vec![layout.train_class_dir("Water").join("mr_mime.jpg")]
        );
        assert_eq!(remove_originals(&layout).unwrap().removed, 1);
        assert_eq!(fs::read_dir(layout.train_class_dir("Water")).unwrap().count(), 7);
    }

    #[test]
    fn test_already_clean_tree_is_noop() {
        let names: Vec<String> = full_set("squirtle").into_iter().skip(1).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (_dir, layout) = tree_with(&refs);
        assert_eq!(remove_originals(&layout).unwrap().removed, 0);
    }
}
