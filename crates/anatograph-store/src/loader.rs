//! Collection loading.
//!
//! Loading is partial by contract: a bad document or record is reported in the
//! [`LoadReport`] and left out, and everything else still loads.

use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::document::{DocumentStore, RELATIONSHIPS_KEY, STRUCTURES_KEY};
use crate::error::{LoadError, LoadSeverity};
use crate::model::{Relationship, Structure, StructureId};
use crate::Store;

/// Records loaded from a collection plus every problem met on the way.
#[derive(Debug)]
pub struct LoadReport<T> {
    pub records: T,
    pub errors: Vec<LoadError>,
}

impl<T> LoadReport<T> {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors that should fail an audit (warnings excluded).
    pub fn hard_errors(&self) -> impl Iterator<Item = &LoadError> {
        self.errors
            .iter()
            .filter(|e| e.severity() == LoadSeverity::Error)
    }
}

impl<D: DocumentStore> Store<D> {
    /// Load every structure, keyed by id. The first record seen for an id
    /// wins; later ones are reported as [`LoadError::DuplicateId`].
    pub fn load_structures(&self) -> LoadReport<BTreeMap<StructureId, Structure>> {
        let mut records: BTreeMap<StructureId, Structure> = BTreeMap::new();
        let mut errors = Vec::new();

        let dir = self.structures_dir();
        if !dir.is_dir() {
            errors.push(LoadError::MissingDirectory {
                path: dir,
                required: true,
            });
            return LoadReport { records, errors };
        }

        for path in self.structure_documents() {
            let Some(raw) = self.collection_records(&path, STRUCTURES_KEY, true, &mut errors)
            else {
                continue;
            };
            for (index, value) in raw.into_iter().enumerate() {
                let mut structure: Structure = match decode(value, &path, index, &mut errors) {
                    Some(s) => s,
                    None => continue,
                };
                structure.source_file = Some(path.clone());

                if let Some(first) = records.get(&structure.id) {
                    let first = first.source_file.clone().unwrap_or_default();
                    tracing::warn!(
                        id = %structure.id,
                        first = %first.display(),
                        duplicate = %path.display(),
                        "duplicate structure id"
                    );
                    errors.push(LoadError::DuplicateId {
                        id: structure.id,
                        first,
                        duplicate: path.clone(),
                    });
                    continue;
                }
                records.insert(structure.id.clone(), structure);
            }
        }

        tracing::debug!(count = records.len(), errors = errors.len(), "loaded structures");
        LoadReport { records, errors }
    }

    /// Load every relationship in document order. A missing collection
    /// directory yields an empty list plus a warning.
    pub fn load_relationships(&self) -> LoadReport<Vec<Relationship>> {
        let mut records = Vec::new();
        let mut errors = Vec::new();

        let dir = self.relationships_dir();
        if !dir.is_dir() {
            errors.push(LoadError::MissingDirectory {
                path: dir,
                required: false,
            });
            return LoadReport { records, errors };
        }

        for path in self.relationship_documents() {
            let Some(raw) = self.collection_records(&path, RELATIONSHIPS_KEY, false, &mut errors)
            else {
                continue;
            };
            for (index, value) in raw.into_iter().enumerate() {
                if let Some(mut rel) = decode::<Relationship>(value, &path, index, &mut errors) {
                    rel.source_file = Some(path.clone());
                    records.push(rel);
                }
            }
        }

        tracing::debug!(count = records.len(), errors = errors.len(), "loaded relationships");
        LoadReport { records, errors }
    }

    /// Id → owning document for every structure record, scanning all
    /// documents. Duplicates keep the first document, like the loader.
    pub fn structure_index(&self) -> BTreeMap<StructureId, PathBuf> {
        self.load_structures()
            .records
            .into_iter()
            .filter_map(|(id, s)| s.source_file.map(|path| (id, path)))
            .collect()
    }

    fn collection_records(
        &self,
        path: &Path,
        key: &'static str,
        key_required: bool,
        errors: &mut Vec<LoadError>,
    ) -> Option<Vec<Value>> {
        let document = match self.load_document(path) {
            Ok(doc) => doc,
            Err(source) => {
                tracing::warn!(path = %path.display(), error = %source, "skipping document");
                errors.push(LoadError::Document {
                    path: path.to_path_buf(),
                    source,
                });
                return None;
            }
        };
        if key_required && !document.has_collection(key) {
            errors.push(LoadError::MissingCollection {
                path: path.to_path_buf(),
                key,
            });
            return None;
        }
        Some(document.records(key).to_vec())
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    value: Value,
    path: &Path,
    index: usize,
    errors: &mut Vec<LoadError>,
) -> Option<T> {
    match serde_yaml::from_value(value) {
        Ok(record) => Some(record),
        Err(err) => {
            tracing::warn!(path = %path.display(), index, error = %err, "skipping record");
            errors.push(LoadError::InvalidRecord {
                path: path.to_path_buf(),
                index,
                message: err.to_string(),
            });
            None
        }
    }
}
