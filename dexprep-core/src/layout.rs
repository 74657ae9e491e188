//! On-disk dataset layout and the augmentation variant set.

use crate::config::PathsConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Extension of source sprites.
pub const SOURCE_EXT: &str = "png";
/// Extension of normalized (opaque) images.
pub const NORMALIZED_EXT: &str = "jpg";
/// Separates an item name from its variant suffix.
pub const VARIANT_DELIMITER: char = '_';

/// Resolved paths of one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    data_root: PathBuf,
    images_dir: PathBuf,
    labels_file: PathBuf,
    train_dir: PathBuf,
    test_dir: PathBuf,
}

impl Layout {
    /// Build a layout from the paths config, resolving a relative data root against `cwd`.
    pub fn new(paths: &PathsConfig, cwd: &Path) -> Self {
        let data_root = if paths.data_root.is_absolute() {
            paths.data_root.clone()
        } else {
            cwd.join(&paths.data_root)
        };
        let images_dir = data_root.join(&paths.images_dir);
        Self {
            labels_file: data_root.join(&paths.labels_file),
            train_dir: images_dir.join(&paths.train_dir),
            test_dir: images_dir.join(&paths.test_dir),
            images_dir,
            data_root,
        }
    }

    /// Layout with the default directory names under `data_root`.
    pub fn with_root(data_root: impl Into<PathBuf>) -> Self {
        let paths = PathsConfig {
            data_root: data_root.into(),
            ..PathsConfig::default()
        };
        Self::new(&paths, Path::new("."))
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn labels_file(&self) -> &Path {
        &self.labels_file
    }

    pub fn train_dir(&self) -> &Path {
        &self.train_dir
    }

    pub fn test_dir(&self) -> &Path {
        &self.test_dir
    }

    /// `<images>/<name>.png`
    pub fn source_image(&self, name: &str) -> PathBuf {
        self.images_dir.join(format!("{name}.{SOURCE_EXT}"))
    }

    /// `<images>/<name>.jpg`
    pub fn normalized_image(&self, name: &str) -> PathBuf {
        self.images_dir.join(format!("{name}.{NORMALIZED_EXT}"))
    }

    pub fn train_class_dir(&self, label: &str) -> PathBuf {
        self.train_dir.join(label)
    }

    pub fn test_class_dir(&self, label: &str) -> PathBuf {
        self.test_dir.join(label)
    }

    /// Where the run manifest is stored.
    pub fn manifest_path(&self) -> PathBuf {
        self.data_root.join(".dexprep").join("manifest.json")
    }

    /// Output path of a label table written under the data root.
    pub fn label_output(&self, file_name: &str) -> PathBuf {
        self.data_root.join(file_name)
    }
}

/// One of the eight geometric variants of a training image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Identity,
    Flip,
    Mirror,
    FlipMirror,
    Rot,
    RotFlip,
    RotMirror,
    RotFlipMirror,
}

impl Variant {
    /// All variants, identity first.
    pub const ALL: [Variant; 8] = [
        Variant::Identity,
        Variant::Flip,
        Variant::Mirror,
        Variant::FlipMirror,
        Variant::Rot,
        Variant::RotFlip,
        Variant::RotMirror,
        Variant::RotFlipMirror,
    ];

    /// The seven variants written by the augmenter, in write order.
    pub const DERIVED: [Variant; 7] = [
        Variant::Flip,
        Variant::Mirror,
        Variant::FlipMirror,
        Variant::Rot,
        Variant::RotFlip,
        Variant::RotMirror,
        Variant::RotFlipMirror,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            Variant::Identity => "",
            Variant::Flip => "_f",
            Variant::Mirror => "_m",
            Variant::FlipMirror => "_fm",
            Variant::Rot => "_r",
            Variant::RotFlip => "_rf",
            Variant::RotMirror => "_rm",
            Variant::RotFlipMirror => "_rfm",
        }
    }

    /// Append this variant's suffix to a stem.
    pub fn apply(self, stem: &str) -> String {
        format!("{stem}{}", self.suffix())
    }

    /// `<stem><suffix>.jpg` inside `dir`.
    pub fn path_in(self, dir: &Path, stem: &str) -> PathBuf {
        dir.join(format!("{}.{NORMALIZED_EXT}", self.apply(stem)))
    }

    /// Split a file stem into its item name and variant.
    ///
    /// Stems with no delimiter, or whose trailing token is not a known suffix,
    /// are reported as `Identity`.
    pub fn parse_stem(stem: &str) -> (&str, Variant) {
        Self::DERIVED
            .iter()
            .rev()
            .find_map(|v| stem.strip_suffix(v.suffix()).map(|base| (base, *v)))
            .unwrap_or((stem, Variant::Identity))
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Identity => write!(f, "identity"),
            Variant::Flip => write!(f, "flip"),
            Variant::Mirror => write!(f, "mirror"),
            Variant::FlipMirror => write!(f, "flip+mirror"),
            Variant::Rot => write!(f, "rot90"),
            Variant::RotFlip => write!(f, "rot90+flip"),
            Variant::RotMirror => write!(f, "rot90+mirror"),
            Variant::RotFlipMirror => write!(f, "rot90+flip+mirror"),
        }
    }
}

/// Whether `<stem>.jpg` in `dir` is a derivative written by the augmenter.
///
/// The stem has to end in a known suffix, and a sibling with the same base
/// (the original or another derivative) has to sit in `dir`. Item names that
/// merely contain the delimiter, such as `mr_mime`, are originals.
pub fn is_derivative(dir: &Path, stem: &str) -> bool {
    let (base, variant) = Variant::parse_stem(stem);
    variant != Variant::Identity
        && Variant::ALL
            .into_iter()
            .filter(|v| *v != variant)
            .any(|v| v.path_in(dir, base).is_file())
}

/// Whether `path` is a regular file with the given extension (case-sensitive).
pub(crate) fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().is_some_and(|e| e == ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_layout_resolves_relative_root() {
        let layout = Layout::new(&PathsConfig::default(), Path::new("/work/manipulate"));
        assert_eq!(layout.data_root(), Path::new("/work/manipulate/../data"));
        assert_eq!(
            layout.labels_file(),
            Path::new("/work/manipulate/../data/pokemon.csv")
        );
        assert_eq!(
            layout.train_class_dir("Grass"),
            Path::new("/work/manipulate/../data/images/train/Grass")
        );
    }

    #[test]
    fn test_layout_keeps_absolute_root() {
        let layout = Layout::with_root("/srv/dex");
        assert_eq!(layout.images_dir(), Path::new("/srv/dex/images"));
        assert_eq!(
            layout.normalized_image("Bulbasaur"),
            Path::new("/srv/dex/images/Bulbasaur.jpg")
        );
        assert_eq!(
            layout.source_image("Bulbasaur"),
            Path::new("/srv/dex/images/Bulbasaur.png")
        );
        assert_eq!(
            layout.manifest_path(),
            Path::new("/srv/dex/.dexprep/manifest.json")
        );
    }

    #[test]
    fn test_suffix_set() {
        let suffixes: HashSet<&str> = Variant::ALL.iter().map(|v| v.suffix()).collect();
        let expected: HashSet<&str> = ["", "_f", "_m", "_fm", "_r", "_rf", "_rm", "_rfm"]
            .into_iter()
            .collect();
        assert_eq!(suffixes, expected);
        assert!(
            Variant::DERIVED
                .iter()
                .all(|v| v.suffix().starts_with(VARIANT_DELIMITER))
        );
    }

    #[test]
    fn test_parse_stem() {
        assert_eq!(Variant::parse_stem("Bulbasaur"), ("Bulbasaur", Variant::Identity));
        assert_eq!(Variant::parse_stem("Bulbasaur_f"), ("Bulbasaur", Variant::Flip));
        assert_eq!(Variant::parse_stem("Bulbasaur_fm"), ("Bulbasaur", Variant::FlipMirror));
        assert_eq!(
            Variant::parse_stem("Bulbasaur_rfm"),
            ("Bulbasaur", Variant::RotFlipMirror)
        );
        assert_eq!(Variant::parse_stem("Bulbasaur_rm"), ("Bulbasaur", Variant::RotMirror));
        assert_eq!(Variant::parse_stem("Bulbasaur_r"), ("Bulbasaur", Variant::Rot));
    }

    #[test]
    fn test_derivative_needs_a_sibling() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mr_mime.jpg"), b"jpeg").unwrap();
        std::fs::write(dir.path().join("porygon_m.jpg"), b"jpeg").unwrap();

        // Underscore in the item name, no suffix.
        assert!(!is_derivative(dir.path(), "mr_mime"));
        // Looks suffixed but nothing else shares its base.
        assert!(!is_derivative(dir.path(), "porygon_m"));

        std::fs::write(dir.path().join("mr_mime_f.jpg"), b"jpeg").unwrap();
        assert!(is_derivative(dir.path(), "mr_mime_f"));
        assert!(!is_derivative(dir.path(), "mr_mime"));

        // Originals already pruned: derivatives still recognise each other.
        std::fs::remove_file(dir.path().join("mr_mime.jpg")).unwrap();
        std::fs::write(dir.path().join("mr_mime_rfm.jpg"), b"jpeg").unwrap();
        assert!(is_derivative(dir.path(), "mr_mime_f"));
        assert!(is_derivative(dir.path(), "mr_mime_rfm"));
    }

    #[test]
    fn test_variant_path() {
        let dir = Path::new("/d/train/Fire");
        assert_eq!(
            Variant::RotFlip.path_in(dir, "Charmander"),
            Path::new("/d/train/Fire/Charmander_rf.jpg")
        );
        assert_eq!(
            Variant::Identity.path_in(dir, "Charmander"),
            Path::new("/d/train/Fire/Charmander.jpg")
        );
    }
}
