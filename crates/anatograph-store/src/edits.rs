//! In-place document edits.
//!
//! Every edit reads one whole document, changes the targeted record(s) in the
//! raw YAML tree and writes the document back. Records that are not touched,
//! metadata and unknown keys are written back unchanged.

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::document::{record_id, DocumentStore, RELATIONSHIPS_KEY, STRUCTURES_KEY};
use crate::error::StoreError;
use crate::model::{Relationship, Structure, StructurePatch};
use crate::Store;

/// Outcome of [`Store::retarget_relationships`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetargetReport {
    pub retargeted: usize,
    pub self_references_dropped: usize,
    pub duplicates_dropped: usize,
}

impl RetargetReport {
    pub fn dropped(&self) -> usize {
        self.self_references_dropped + self.duplicates_dropped
    }
}

impl<D: DocumentStore> Store<D> {
    /// Scan every structures document for the record with `id`.
    ///
    /// Unreadable documents are skipped; the loader reports them.
    pub fn find_structure_file(&self, id: &str) -> Result<PathBuf, StoreError> {
        for path in self.structure_documents() {
            match self.load_document(&path) {
                Ok(doc) if doc.position_of(STRUCTURES_KEY, id).is_some() => return Ok(path),
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "skipped while locating structure");
                }
            }
        }
        Err(StoreError::StructureNotFound { id: id.to_string() })
    }

    /// Append a structure record to an existing structures document.
    pub fn append_structure(&self, path: &Path, structure: &Structure) -> Result<(), StoreError> {
        let mut doc = self.load_document(path)?;
        let value = serde_yaml::to_value(structure).map_err(StoreError::Encode)?;
        doc.records_mut(STRUCTURES_KEY).push(value);
        self.save_document(path, &doc)?;
        tracing::info!(id = %structure.id, path = %path.display(), "appended structure");
        Ok(())
    }

    /// Point `id` at a new parent (`None` makes it a root).
    pub fn set_parent(&self, id: &str, parent: Option<&str>) -> Result<PathBuf, StoreError> {
        self.edit_structure(id, |record| {
            record.insert(
                Value::from("parent"),
                parent.map_or(Value::Null, Value::from),
            );
        })
    }

    /// Merge the fields a patch sets into the record.
    pub fn update_structure(&self, id: &str, patch: &StructurePatch) -> Result<PathBuf, StoreError> {
        self.edit_structure(id, |record| {
            for (key, value) in patch.entries() {
                record.insert(Value::from(key), Value::from(value));
            }
        })
    }

    /// Soft delete: sets the deprecation triple with today's date.
    pub fn deprecate_structure(&self, id: &str, reason: &str) -> Result<PathBuf, StoreError> {
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        self.edit_structure(id, |record| {
            record.insert(Value::from("deprecated"), Value::Bool(true));
            record.insert(Value::from("deprecated_date"), Value::from(today));
            record.insert(Value::from("deprecation_reason"), Value::from(reason));
        })
    }

    /// Physically remove the structure record.
    pub fn remove_structure(&self, id: &str) -> Result<PathBuf, StoreError> {
        let path = self.find_structure_file(id)?;
        let mut doc = self.load_document(&path)?;
        let records = doc.records_mut(STRUCTURES_KEY);
        let before = records.len();
        records.retain(|r| record_id(r) != Some(id));
        if records.len() == before {
            return Err(StoreError::RecordNotFound {
                id: id.to_string(),
                path,
            });
        }
        self.save_document(&path, &doc)?;
        tracing::info!(id, path = %path.display(), "removed structure");
        Ok(path)
    }

    /// Re-point every direct child of `from` at `to`. Returns the count moved.
    pub fn reparent_children(&self, from: &str, to: &str) -> Result<usize, StoreError> {
        let mut moved = 0;
        for path in self.structure_documents() {
            let mut doc = self.load_document(&path)?;
            let mut changed = 0;
            for record in doc.records_mut(STRUCTURES_KEY).iter_mut() {
                if record.get("parent").and_then(Value::as_str) == Some(from) {
                    if let Some(map) = record.as_mapping_mut() {
                        map.insert(Value::from("parent"), Value::from(to));
                        changed += 1;
                    }
                }
            }
            if changed > 0 {
                self.save_document(&path, &doc)?;
                moved += changed;
            }
        }
        Ok(moved)
    }

    /// Append a relationship record to an existing relationships document.
    pub fn append_relationship(&self, path: &Path, rel: &Relationship) -> Result<(), StoreError> {
        let mut doc = self.load_document(path)?;
        let value = serde_yaml::to_value(rel).map_err(StoreError::Encode)?;
        doc.records_mut(RELATIONSHIPS_KEY).push(value);
        self.save_document(path, &doc)?;
        tracing::info!(
            subject = %rel.subject,
            predicate = %rel.predicate,
            object = %rel.object,
            path = %path.display(),
            "appended relationship"
        );
        Ok(())
    }

    /// Drop every relationship with `id` as subject or object.
    pub fn remove_relationships_involving(&self, id: &str) -> Result<usize, StoreError> {
        let mut removed = 0;
        for path in self.relationship_documents() {
            let mut doc = self.load_document(&path)?;
            if doc.records(RELATIONSHIPS_KEY).is_empty() {
                continue;
            }
            let records = doc.records_mut(RELATIONSHIPS_KEY);
            let before = records.len();
            records.retain(|r| !endpoint_is(r, "subject", id) && !endpoint_is(r, "object", id));
            let dropped = before - records.len();
            if dropped > 0 {
                self.save_document(&path, &doc)?;
                removed += dropped;
            }
        }
        Ok(removed)
    }

    /// Rewrite endpoints equal to `from` to `to`, recording `merged_from`.
    ///
    /// A rewritten record that would point at itself, or repeat a triple the
    /// collection already holds, is dropped instead.
    pub fn retarget_relationships(&self, from: &str, to: &str) -> Result<RetargetReport, StoreError> {
        let documents = self.relationship_documents();
        let mut seen = BTreeSet::new();
        for path in &documents {
            let doc = self.load_document(path)?;
            seen.extend(
                doc.records(RELATIONSHIPS_KEY)
                    .iter()
                    .filter(|r| !endpoint_is(r, "subject", from) && !endpoint_is(r, "object", from))
                    .filter_map(|r| triple(r, None)),
            );
        }

        let mut report = RetargetReport::default();
        for path in &documents {
            let mut doc = self.load_document(path)?;
            let before = report;
            doc.records_mut(RELATIONSHIPS_KEY).retain_mut(|record| {
                if !endpoint_is(record, "subject", from) && !endpoint_is(record, "object", from) {
                    return true;
                }
                let Some((subject, predicate, object)) = triple(record, Some((from, to))) else {
                    return true;
                };
                if subject == object {
                    tracing::debug!(%subject, %predicate, "dropped self-referencing relationship");
                    report.self_references_dropped += 1;
                    return false;
                }
                if !seen.insert((subject.clone(), predicate.clone(), object.clone())) {
                    tracing::debug!(%subject, %predicate, %object, "dropped duplicate relationship");
                    report.duplicates_dropped += 1;
                    return false;
                }
                if let Some(map) = record.as_mapping_mut() {
                    map.insert(Value::from("subject"), Value::from(subject));
                    map.insert(Value::from("object"), Value::from(object));
                    map.insert(Value::from("merged_from"), Value::from(from));
                }
                report.retargeted += 1;
                true
            });
            if report != before {
                self.save_document(path, &doc)?;
            }
        }
        Ok(report)
    }

    fn edit_structure(
        &self,
        id: &str,
        edit: impl FnOnce(&mut Mapping),
    ) -> Result<PathBuf, StoreError> {
        let path = self.find_structure_file(id)?;
        let mut doc = self.load_document(&path)?;
        let record = doc
            .record_mut(STRUCTURES_KEY, id)
            .ok_or_else(|| StoreError::RecordNotFound {
                id: id.to_string(),
                path: path.clone(),
            })?;
        edit(record);
        self.save_document(&path, &doc)?;
        tracing::debug!(id, path = %path.display(), "edited structure");
        Ok(path)
    }
}

fn endpoint_is(record: &Value, key: &str, id: &str) -> bool {
    record.get(key).and_then(Value::as_str) == Some(id)
}

/// `(subject, predicate, object)` of a raw record, with an optional endpoint
/// substitution applied.
fn triple(record: &Value, rename: Option<(&str, &str)>) -> Option<(String, String, String)> {
    let field = |key: &str| {
        let value = record.get(key).and_then(Value::as_str)?;
        Some(match rename {
            Some((from, to)) if value == from => to.to_string(),
            _ => value.to_string(),
        })
    };
    Some((field("subject")?, field("predicate")?, field("object")?))
}
