//! A point-in-time view of the store.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anatograph_store::{
    DocumentStore, LoadError, Predicate, Relationship, Store, StoreConfig, Structure, StructureId,
};

use crate::context::HierarchyContext;

/// Structures, relationships and the derived context, loaded together.
#[derive(Debug)]
pub struct Snapshot {
    pub structures: BTreeMap<StructureId, Structure>,
    pub relationships: Vec<Relationship>,
    pub context: HierarchyContext,
    /// Problems met while loading both collections.
    pub load_errors: Vec<LoadError>,
    /// Routing and existing documents; `None` for in-memory snapshots.
    pub layout: Option<Layout>,
}

/// Where new records would be written, captured alongside the records.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub config: StoreConfig,
    pub structure_documents: BTreeSet<String>,
    pub relationship_documents: BTreeSet<String>,
}

impl Layout {
    pub fn of<D: DocumentStore>(store: &Store<D>) -> Self {
        let names = |paths: Vec<PathBuf>| {
            paths
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect()
        };
        Self {
            config: store.config().clone(),
            structure_documents: names(store.structure_documents()),
            relationship_documents: names(store.relationship_documents()),
        }
    }
}

impl Snapshot {
    pub fn load<D: DocumentStore>(store: &Store<D>) -> Self {
        let structures = store.load_structures();
        let relationships = store.load_relationships();
        let context = HierarchyContext::build(&structures.records);

        let mut load_errors = structures.errors;
        load_errors.extend(relationships.errors);

        Self {
            structures: structures.records,
            relationships: relationships.records,
            context,
            load_errors,
            layout: Some(Layout::of(store)),
        }
    }

    /// Build from in-memory records (no load errors).
    pub fn from_records(
        structures: BTreeMap<StructureId, Structure>,
        relationships: Vec<Relationship>,
    ) -> Self {
        let context = HierarchyContext::build(&structures);
        Self {
            structures,
            relationships,
            context,
            load_errors: Vec::new(),
            layout: None,
        }
    }

    /// Owning document of a loaded structure.
    pub fn source_of(&self, id: &str) -> Option<&PathBuf> {
        self.structures.get(id).and_then(|s| s.source_file.as_ref())
    }

    pub fn relationships_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.relationships.iter().filter(move |r| r.involves(id))
    }

    pub fn has_relationship(&self, subject: &str, predicate: &Predicate, object: &str) -> bool {
        self.relationships
            .iter()
            .any(|r| r.same_triple(subject, predicate, object))
    }
}
