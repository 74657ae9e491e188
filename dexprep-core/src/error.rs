//! Error types for the dexprep pipeline.
//!
//! Uses `thiserror` for a single structured error enum covering preflight,
//! file-system, codec and label-table failures. Every variant carries the path
//! or resource that triggered it so the CLI can print one descriptive line.

use std::fmt;
use std::path::PathBuf;

/// The file-system operation that failed on a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Copy,
    Remove,
    Read,
    Write,
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOp::Copy => write!(f, "copy"),
            FileOp::Remove => write!(f, "remove"),
            FileOp::Read => write!(f, "read"),
            FileOp::Write => write!(f, "write"),
        }
    }
}

/// Top-level error type for dataset preparation.
#[derive(Debug, thiserror::Error)]
pub enum PrepError {
    #[error("must be run from a '{expected}' directory (current: {})", actual.display())]
    InvalidWorkingContext { expected: String, actual: PathBuf },

    #[error("missing {resource}: {}", path.display())]
    MissingInput { resource: String, path: PathBuf },

    #[error("dataset has already been processed: {reason}")]
    AlreadyProcessed { reason: String },

    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to {op} {}: {source}", path.display())]
    FileOperation {
        op: FileOp,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("training tree is already augmented ({} carries a variant suffix)", path.display())]
    AlreadyAugmented { path: PathBuf },

    #[error("refusing to remove {}: derivative {} does not exist", original.display(), missing.display())]
    NotAugmented { original: PathBuf, missing: PathBuf },

    #[error("image codec error for {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("label table error in {}: {source}", path.display())]
    LabelTable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PrepError {
    pub fn missing(resource: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingInput {
            resource: resource.into(),
            path: path.into(),
        }
    }

    pub fn file_op(op: FileOp, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileOperation {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Image {
            path: path.into(),
            source,
        }
    }

    /// Stable short name of the error kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidWorkingContext { .. } => "invalid_working_context",
            Self::MissingInput { .. } => "missing_input",
            Self::AlreadyProcessed { .. } => "already_processed",
            Self::DirectoryCreation { .. } => "directory_creation",
            Self::FileOperation { .. } => "file_operation",
            Self::AlreadyAugmented { .. } => "already_augmented",
            Self::NotAugmented { .. } => "not_augmented",
            Self::Image { .. } => "image",
            Self::LabelTable { .. } => "label_table",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }

    /// Process exit code for this error kind.
    ///
    /// 1 is left for unclassified failures and 2 for usage errors; 11 is
    /// taken by configuration errors, which are raised outside this enum.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidWorkingContext { .. } => 3,
            Self::MissingInput { .. } => 4,
            Self::AlreadyProcessed { .. } => 5,
            Self::DirectoryCreation { .. } => 6,
            Self::FileOperation { .. } => 7,
            Self::AlreadyAugmented { .. } | Self::NotAugmented { .. } => 8,
            Self::Image { .. } => 9,
            Self::LabelTable { .. } => 10,
            Self::Io(_) | Self::Serialization(_) => 12,
        }
    }
}

/// Exit code used by the CLI for configuration failures.
pub const CONFIG_EXIT_CODE: u8 = 11;
