//! Documents and the `DocumentStore` seam.
//!
//! A document is a YAML mapping holding free-form metadata plus one record
//! list (`structures:` or `relationships:`). Edits go through the raw YAML
//! tree so keys the model does not know about are written back untouched.
//!
//! Serialization fidelity is pluggable: [`YamlDocuments`] is a plain
//! `serde_yaml` round trip (key order kept, comments dropped). A
//! comment-preserving backend only has to implement [`DocumentStore`].

use serde_yaml::{Mapping, Sequence, Value};
use std::path::Path;

use crate::error::StoreError;

pub const STRUCTURES_KEY: &str = "structures";
pub const RELATIONSHIPS_KEY: &str = "relationships";

/// Read/write access to whole documents.
pub trait DocumentStore {
    fn load(&self, path: &Path) -> Result<Document, StoreError>;
    fn save(&self, path: &Path, document: &Document) -> Result<(), StoreError>;
}

/// Plain `serde_yaml` document backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlDocuments;

impl DocumentStore for YamlDocuments {
    fn load(&self, path: &Path) -> Result<Document, StoreError> {
        let contents = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if contents.trim().is_empty() {
            return Ok(Document::default());
        }
        let value: Value = serde_yaml::from_str(&contents).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Document::from_value(value).ok_or_else(|| StoreError::NotAMapping {
            path: path.to_path_buf(),
        })
    }

    fn save(&self, path: &Path, document: &Document) -> Result<(), StoreError> {
        let text = serde_yaml::to_string(&document.root).map_err(StoreError::Encode)?;
        std::fs::write(path, text).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    root: Mapping,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a parsed YAML value; `None` unless it is a mapping (or null).
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Mapping(root) => Some(Self { root }),
            Value::Null => Some(Self::default()),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Mapping(self.root)
    }

    pub fn metadata(&self) -> Option<&Value> {
        self.root.get("metadata")
    }

    /// Whether the document declares `key` at all (a null list counts).
    pub fn has_collection(&self, key: &str) -> bool {
        self.root.contains_key(key)
    }

    /// Records under `key`; empty when the key is missing or null.
    pub fn records(&self, key: &str) -> &[Value] {
        match self.root.get(key) {
            Some(Value::Sequence(seq)) => seq,
            _ => &[],
        }
    }

    /// Mutable record list under `key`, created if missing or null.
    pub fn records_mut(&mut self, key: &str) -> &mut Sequence {
        let slot = self
            .root
            .entry(Value::String(key.to_string()))
            .or_insert(Value::Null);
        if !slot.is_sequence() {
            *slot = Value::Sequence(Sequence::new());
        }
        match slot {
            Value::Sequence(seq) => seq,
            _ => unreachable!("collection slot was just set to a sequence"),
        }
    }

    /// Index of the record under `key` whose `id` equals `id`.
    pub fn position_of(&self, key: &str, id: &str) -> Option<usize> {
        self.records(key).iter().position(|r| record_id(r) == Some(id))
    }

    pub fn record_mut(&mut self, key: &str, id: &str) -> Option<&mut Mapping> {
        self.records_mut(key)
            .iter_mut()
            .find(|r| record_id(r) == Some(id))
            .and_then(Value::as_mapping_mut)
    }
}

/// The `id` of a raw record, if it has a string one.
pub fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// Why a plan-supplied document name cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DocumentNameError {
    #[error("document name is empty")]
    Empty,
    #[error("document name must not be an absolute path")]
    Absolute,
    #[error("document name must be a bare file name inside its collection")]
    Nested,
    #[error("document name must end in .yaml or .yml")]
    NotYaml,
}

/// A document name is a bare `*.yaml`/`*.yml` file name: no directories, no
/// `..`, nothing absolute.
pub fn check_document_name(name: &str) -> Result<(), DocumentNameError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DocumentNameError::Empty);
    }
    if name.starts_with(['/', '\\']) || Path::new(name).is_absolute() {
        return Err(DocumentNameError::Absolute);
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(DocumentNameError::Nested);
    }
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => Ok(()),
        _ => Err(DocumentNameError::NotYaml),
    }
}
