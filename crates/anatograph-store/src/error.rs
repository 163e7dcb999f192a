//! Error types for document I/O and loading.

use std::path::{Path, PathBuf};

/// Failure of a single document operation (read, parse, edit, write).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_yaml::Error),
    #[error("{} is not a YAML mapping", path.display())]
    NotAMapping { path: PathBuf },
    #[error("document {} does not exist", path.display())]
    MissingDocument { path: PathBuf },
    #[error("structure {id} not found in any structures document")]
    StructureNotFound { id: String },
    #[error("record {id} not found in {}", path.display())]
    RecordNotFound { id: String, path: PathBuf },
    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// How much a load problem matters to a consistency audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSeverity {
    Error,
    Warning,
}

/// A problem encountered while loading a collection.
///
/// Loading never aborts on one of these: the offending document or record is
/// left out of the in-memory view and the error is collected.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("collection directory not found: {}", path.display())]
    MissingDirectory { path: PathBuf, required: bool },
    #[error("skipped document: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: StoreError,
    },
    #[error("no '{key}' key in {}", file_label(path))]
    MissingCollection { path: PathBuf, key: &'static str },
    #[error("invalid record #{index} in {}: {message}", file_label(path))]
    InvalidRecord {
        path: PathBuf,
        index: usize,
        message: String,
    },
    #[error("duplicate structure ID: {id} (first in {}, again in {})", file_label(first), file_label(duplicate))]
    DuplicateId {
        id: String,
        first: PathBuf,
        duplicate: PathBuf,
    },
}

impl LoadError {
    pub fn severity(&self) -> LoadSeverity {
        match self {
            LoadError::MissingDirectory { required: false, .. }
            | LoadError::MissingCollection { .. } => LoadSeverity::Warning,
            _ => LoadSeverity::Error,
        }
    }

    /// The document the problem was found in, if any.
    pub fn path(&self) -> &Path {
        match self {
            LoadError::MissingDirectory { path, .. }
            | LoadError::Document { path, .. }
            | LoadError::MissingCollection { path, .. }
            | LoadError::InvalidRecord { path, .. } => path,
            LoadError::DuplicateId { duplicate, .. } => duplicate,
        }
    }
}

/// Short display form of a document path (its file name).
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
