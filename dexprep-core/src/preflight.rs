//! Preflight validation run before any file is touched.

use crate::config::PathsConfig;
use crate::error::PrepError;
use crate::layout::{Layout, NORMALIZED_EXT, has_extension};
use std::path::Path;

/// Require the working directory to be named `anchor`.
pub fn check_working_context(cwd: &Path, anchor: &str) -> Result<(), PrepError> {
    if cwd.file_name().is_some_and(|name| name == anchor) {
        Ok(())
    } else {
        Err(PrepError::InvalidWorkingContext {
            expected: anchor.to_string(),
            actual: cwd.to_path_buf(),
        })
    }
}

/// Require the data root, images directory and label file to exist.
pub fn check_inputs(layout: &Layout) -> Result<(), PrepError> {
    let required = [
        ("data directory", layout.data_root(), true),
        ("images directory", layout.images_dir(), true),
        ("label file", layout.labels_file(), false),
    ];
    for (resource, path, is_dir) in required {
        let present = if is_dir { path.is_dir() } else { path.is_file() };
        if !present {
            return Err(PrepError::missing(resource, path));
        }
    }
    Ok(())
}

/// Refuse to run against a dataset that has already been transformed.
///
/// Two signals: the run manifest, and the legacy heuristic of normalized
/// images sitting in the flat images directory. The heuristic is imprecise
/// (a crash mid-normalization also trips it) and is kept as-is.
pub fn check_not_processed(layout: &Layout) -> Result<(), PrepError> {
    let manifest = layout.manifest_path();
    if manifest.exists() {
        return Err(PrepError::AlreadyProcessed {
            reason: format!("run manifest present at {}", manifest.display()),
        });
    }

    let normalized = count_normalized(layout.images_dir())?;
    if normalized > 0 {
        return Err(PrepError::AlreadyProcessed {
            reason: format!(
                "{normalized} .{NORMALIZED_EXT} file(s) found in {}",
                layout.images_dir().display()
            ),
        });
    }
    Ok(())
}

/// Run every preflight check in order; the first failure aborts.
pub fn run_preflight(paths: &PathsConfig, layout: &Layout, cwd: &Path) -> Result<(), PrepError> {
    if paths.enforce_anchor {
        check_working_context(cwd, &paths.anchor_dir)?;
    }
    check_inputs(layout)?;
    check_not_processed(layout)?;
    tracing::debug!(root = %layout.data_root().display(), "Preflight checks passed");
    Ok(())
}

fn count_normalized(dir: &Path) -> Result<usize, PrepError> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, NORMALIZED_EXT) {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::RunManifest;
    use std::fs;

    fn dataset() -> (tempfile::TempDir, Layout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::with_root(dir.path().join("data"));
        fs::create_dir_all(layout.images_dir()).unwrap();
        fs::write(layout.labels_file(), "Name,Type1,Type2\n").unwrap();
        (dir, layout)
    }

    #[test]
    fn test_working_context() {
        assert!(check_working_context(Path::new("/repo/manipulate"), "manipulate").is_ok());
        let err = check_working_context(Path::new("/repo/src"), "manipulate").unwrap_err();
        assert!(matches!(err, PrepError::InvalidWorkingContext { .. }));
        // Only the final component counts.
        assert!(check_working_context(Path::new("/repo/manipulate/sub"), "manipulate").is_err());
    }

    #[test]
    fn test_inputs_present() {
        let (_dir, layout) = dataset();
        check_inputs(&layout).unwrap();
    }

    #[test]
    fn test_each_missing_input_names_its_target() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::with_root(dir.path().join("data"));
        match check_inputs(&layout).unwrap_err() {
            PrepError::MissingInput { resource, .. } => assert_eq!(resource, "data directory"),
            other => panic!("unexpected error: {other}"),
        }

        fs::create_dir_all(layout.data_root()).unwrap();
        match check_inputs(&layout).unwrap_err() {
            PrepError::MissingInput { resource, path } => {
                assert_eq!(resource, "images directory");
                assert_eq!(path, layout.images_dir());
            }
            other => panic!("unexpected error: {other}"),
        }

        fs::create_dir_all(layout.images_dir()).unwrap();
        match check_inputs(&layout).unwrap_err() {
            PrepError::MissingInput { resource, path } => {
                assert_eq!(resource, "label file");
                assert_eq!(path, layout.labels_file());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fresh_dataset_is_not_processed() {
        let (_dir, layout) = dataset();
        fs::write(layout.source_image("Bulbasaur"), b"png").unwrap();
        check_not_processed(&layout).unwrap();
    }

    #[test]
    fn test_normalized_files_trip_heuristic() {
        let (_dir, layout) = dataset();
        fs::write(layout.normalized_image("Bulbasaur"), b"jpg").unwrap();
        let err = check_not_processed(&layout).unwrap_err();
        assert!(matches!(err, PrepError::AlreadyProcessed { .. }));
    }

    #[test]
    fn test_manifest_marks_processed() {
        let (_dir, layout) = dataset();
        RunManifest::new(layout.data_root())
            .save(&layout.manifest_path())
            .unwrap();
        let err = check_not_processed(&layout).unwrap_err();
        assert!(err.to_string().contains("manifest"));
    }

    #[test]
    fn test_wrong_directory_fails_before_input_checks() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().join("elsewhere");
        let layout = Layout::with_root(dir.path().join("missing"));
        let err = run_preflight(&PathsConfig::default(), &layout, &cwd).unwrap_err();
        assert!(matches!(err, PrepError::InvalidWorkingContext { .. }));
    }

    #[test]
    fn test_anchor_not_enforced_with_explicit_root() {
        let (_dir, layout) = dataset();
        let paths = PathsConfig {
            enforce_anchor: false,
            ..PathsConfig::default()
        };
        run_preflight(&paths, &layout, Path::new("/anywhere")).unwrap();
    }
}
