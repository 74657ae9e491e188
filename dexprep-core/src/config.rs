//! Configuration system for dexprep.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/dexprep/config.toml` and/or `.dexprep/config.toml`
//! in the working directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for a preparation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrepConfig {
    /// Dataset locations.
    #[serde(default)]
    pub paths: PathsConfig,
    /// PNG to JPEG conversion.
    #[serde(default)]
    pub normalize: NormalizeConfig,
    /// Class/split tree construction.
    #[serde(default)]
    pub partition: PartitionConfig,
    /// Geometric augmentation.
    #[serde(default)]
    pub augment: AugmentConfig,
    /// Long label table output.
    #[serde(default)]
    pub labels: LabelsConfig,
}

/// Dataset locations, all relative to `data_root` except `data_root` itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the dataset. Relative paths resolve against the working directory.
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    /// Flat directory holding `<Name>.png` sources.
    #[serde(default = "default_images_dir")]
    pub images_dir: String,
    /// Wide item table with `Name, Type1, Type2` columns.
    #[serde(default = "default_labels_file")]
    pub labels_file: String,
    /// Training split directory, under `images_dir`.
    #[serde(default = "default_train_dir")]
    pub train_dir: String,
    /// Held-out split directory, under `images_dir`.
    #[serde(default = "default_test_dir")]
    pub test_dir: String,
    /// Name the working directory must have when `enforce_anchor` is set.
    #[serde(default = "default_anchor_dir")]
    pub anchor_dir: String,
    /// Require the process to run from `anchor_dir`.
    #[serde(default = "default_true")]
    pub enforce_anchor: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            images_dir: default_images_dir(),
            labels_file: default_labels_file(),
            train_dir: default_train_dir(),
            test_dir: default_test_dir(),
            anchor_dir: default_anchor_dir(),
            enforce_anchor: true,
        }
    }
}

fn default_data_root() -> PathBuf {
    PathBuf::from("../data")
}

fn default_images_dir() -> String {
    "images".to_string()
}

fn default_labels_file() -> String {
    "pokemon.csv".to_string()
}

fn default_train_dir() -> String {
    "train".to_string()
}

fn default_test_dir() -> String {
    "test".to_string()
}

fn default_anchor_dir() -> String {
    "manipulate".to_string()
}

/// PNG to JPEG conversion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Opaque RGB background the transparent sprite is composited onto.
    #[serde(default = "default_background")]
    pub background: [u8; 3],
    /// JPEG quality (1-100) used for every encoded image.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            background: default_background(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

fn default_background() -> [u8; 3] {
    [255, 255, 255]
}

fn default_jpeg_quality() -> u8 {
    75
}

/// Class/split tree construction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Known non-image debris removed from the flat images directory by exact name.
    #[serde(default = "default_stray_files")]
    pub stray_files: Vec<String>,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            stray_files: default_stray_files(),
        }
    }
}

fn default_stray_files() -> Vec<String> {
    vec!["fletchling.png.rsrc".to_string()]
}

/// Geometric augmentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentConfig {
    /// Refuse to augment a training tree that already holds suffixed variants.
    #[serde(default = "default_true")]
    pub reject_augmented: bool,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            reject_augmented: true,
        }
    }
}

/// Long label table output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelsConfig {
    /// Write the variant-expanded label table at the end of `run`.
    #[serde(default)]
    pub update: bool,
    /// File name of the expanded table, under `data_root`.
    #[serde(default = "default_output_file")]
    pub output_file: String,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            update: false,
            output_file: default_output_file(),
        }
    }
}

fn default_output_file() -> String {
    "pokemon_alpha.csv".to_string()
}

fn default_true() -> bool {
    true
}

/// Directory (relative to the working directory) holding the local config file.
pub const CONFIG_DIR: &str = ".dexprep";

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `DEXPREP_`)
/// 3. Workspace-local config (`.dexprep/config.toml`)
/// 4. User config (`~/.config/dexprep/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&PrepConfig>,
) -> Result<PrepConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(PrepConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws_config) = workspace.map(|ws| ws.join(CONFIG_DIR).join("config.toml"))
        && ws_config.exists()
    {
        figment = figment.merge(Toml::file(&ws_config));
    }

    // DEXPREP_PATHS__DATA_ROOT, DEXPREP_NORMALIZE__JPEG_QUALITY, ...
    figment = figment.merge(Env::prefixed("DEXPREP_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Load configuration from a single explicit file on top of the defaults.
pub fn load_config_file(path: &Path) -> Result<PrepConfig, Box<figment::Error>> {
    Figment::from(Serialized::defaults(PrepConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("DEXPREP_").split("__"))
        .extract()
        .map_err(Box::new)
}

/// Check whether any dexprep configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| ws.join(CONFIG_DIR).join("config.toml").exists())
}

/// Write the default configuration to `<workspace>/.dexprep/config.toml`.
///
/// Returns `Ok(None)` without touching the file when one already exists.
pub fn init_config(workspace: &Path) -> std::io::Result<Option<PathBuf>> {
    let config_dir = workspace.join(CONFIG_DIR);
    std::fs::create_dir_all(&config_dir)?;
    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        return Ok(None);
    }
    let toml_str = toml::to_string_pretty(&PrepConfig::default())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(&config_path, toml_str)?;
    Ok(Some(config_path))
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "dexprep", "dexprep")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
