//! Retiring structures: soft deprecation and merging into another structure.

use serde::Serialize;

use anatograph_store::{DocumentStore, Store, StoreError, StructureId};

use crate::snapshot::Snapshot;

#[derive(Debug, thiserror::Error)]
pub enum RetireError {
    #[error("structure '{0}' not found")]
    NotFound(String),
    #[error("cannot merge '{0}' into itself")]
    SameStructure(String),
    #[error("cannot merge '{source_name}' into its own descendant '{target_name}'")]
    TargetIsDescendant {
        source_name: String,
        target_name: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deprecation {
    pub id: StructureId,
    pub name: String,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeReport {
    pub source: StructureId,
    pub target: StructureId,
    pub relationships_retargeted: usize,
    /// Relationships that would have become self-references or duplicates.
    pub relationships_dropped: usize,
    pub children_moved: usize,
}

fn resolve(snapshot: &Snapshot, reference: &str) -> Result<StructureId, RetireError> {
    snapshot
        .context
        .lookup(reference)
        .cloned()
        .ok_or_else(|| RetireError::NotFound(reference.to_string()))
}

/// Mark a structure deprecated without removing it.
pub fn deprecate<D: DocumentStore>(
    store: &Store<D>,
    reference: &str,
    reason: &str,
) -> Result<Deprecation, RetireError> {
    let snapshot = Snapshot::load(store);
    let id = resolve(&snapshot, reference)?;
    if snapshot.structures.get(&id).is_some_and(|s| s.deprecated) {
        tracing::warn!(id = %id, "structure is already deprecated; refreshing the marker");
    }
    let path = store.deprecate_structure(&id, reason)?;
    Ok(Deprecation {
        name: snapshot.context.display_name(&id).to_string(),
        file: anatograph_store::file_label(&path),
        id,
    })
}

/// Fold `source` into `target`: relationships and children move over, then
/// `source` is removed.
pub fn merge<D: DocumentStore>(
    store: &Store<D>,
    source: &str,
    target: &str,
) -> Result<MergeReport, RetireError> {
    let snapshot = Snapshot::load(store);
    let source_id = resolve(&snapshot, source)?;
    let target_id = resolve(&snapshot, target)?;
    let ctx = &snapshot.context;

    if source_id == target_id {
        return Err(RetireError::SameStructure(ctx.display_name(&source_id).to_string()));
    }
    if ctx.is_descendant(&target_id, &source_id) {
        return Err(RetireError::TargetIsDescendant {
            source_name: ctx.display_name(&source_id).to_string(),
            target_name: ctx.display_name(&target_id).to_string(),
        });
    }

    let retargeted = store.retarget_relationships(&source_id, &target_id)?;
    let children_moved = store.reparent_children(&source_id, &target_id)?;
    store.remove_structure(&source_id)?;

    tracing::info!(
        source = %source_id,
        target = %target_id,
        relationships_retargeted = retargeted.retargeted,
        relationships_dropped = retargeted.dropped(),
        children_moved,
        "merged structure"
    );
    Ok(MergeReport {
        source: source_id,
        target: target_id,
        relationships_retargeted: retargeted.retargeted,
        relationships_dropped: retargeted.dropped(),
        children_moved,
    })
}
