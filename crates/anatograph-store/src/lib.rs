//! Anatograph document store
//!
//! The ontology lives on disk as two collections of YAML documents:
//!
//! ```text
//! <root>/
//! ├── anatograph.yaml          (optional StoreConfig)
//! ├── structures/              id-keyed hierarchy records, partitioned by kind
//! │   ├── body_regions.yaml
//! │   ├── muscles.yaml
//! │   └── ...
//! └── relationships/           subject/predicate/object records, by family
//!     ├── innervation.yaml
//!     └── ...
//! ```
//!
//! [`Store`] is the explicit handle every component receives: it knows the
//! layout, loads whole collections (collecting, never throwing, per-document
//! problems) and performs read-modify-write edits on single documents.
//!
//! There is no locking. One writer at a time is assumed; concurrent runs
//! against the same root are last-writer-wins.

pub mod config;
pub mod document;
pub mod edits;
pub mod error;
pub mod ids;
pub mod loader;
pub mod model;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

pub use config::StoreConfig;
pub use document::{
    check_document_name, Document, DocumentNameError, DocumentStore, YamlDocuments,
    RELATIONSHIPS_KEY, STRUCTURES_KEY,
};
pub use edits::RetargetReport;
pub use error::{file_label, LoadError, LoadSeverity, StoreError};
pub use ids::{next_structure_id, IdAllocator, IdScheme};
pub use loader::LoadReport;
pub use model::{
    Predicate, PredicateFamily, Relationship, Structure, StructureId, StructureKind,
    StructurePatch,
};

// ============================================================================
// Store handle
// ============================================================================

/// A rooted, configured set of ontology documents.
#[derive(Debug, Clone)]
pub struct Store<D = YamlDocuments> {
    root: PathBuf,
    config: StoreConfig,
    documents: D,
}

impl Store<YamlDocuments> {
    /// Open the store at `root`, reading `anatograph.yaml` when present.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let config = StoreConfig::discover(&root)?;
        Ok(Self::with_config(root, config))
    }

    pub fn with_config(root: impl Into<PathBuf>, config: StoreConfig) -> Self {
        Self::with_documents(root, config, YamlDocuments)
    }
}

impl<D: DocumentStore> Store<D> {
    pub fn with_documents(root: impl Into<PathBuf>, config: StoreConfig, documents: D) -> Self {
        Self {
            root: root.into(),
            config,
            documents,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn id_scheme(&self) -> IdScheme {
        IdScheme::from_config(&self.config)
    }

    pub fn structures_dir(&self) -> PathBuf {
        self.root.join(&self.config.structures_dir)
    }

    pub fn relationships_dir(&self) -> PathBuf {
        self.root.join(&self.config.relationships_dir)
    }

    /// Path of a structures document given its file name.
    pub fn structure_document(&self, file_name: &str) -> PathBuf {
        self.structures_dir().join(file_name)
    }

    pub fn relationship_document(&self, file_name: &str) -> PathBuf {
        self.relationships_dir().join(file_name)
    }

    /// Every `*.yaml`/`*.yml` document in the structures collection, by name.
    pub fn structure_documents(&self) -> Vec<PathBuf> {
        list_documents(&self.structures_dir())
    }

    pub fn relationship_documents(&self) -> Vec<PathBuf> {
        list_documents(&self.relationships_dir())
    }

    pub fn load_document(&self, path: &Path) -> Result<Document, StoreError> {
        if !path.is_file() {
            return Err(StoreError::MissingDocument {
                path: path.to_path_buf(),
            });
        }
        self.documents.load(path)
    }

    pub fn save_document(&self, path: &Path, document: &Document) -> Result<(), StoreError> {
        self.documents.save(path, document)
    }
}

fn list_documents(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(dir = %dir.display(), error = %err, "failed to list document");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .map_or(false, |ext| ext == "yaml" || ext == "yml")
        })
        .collect()
}
