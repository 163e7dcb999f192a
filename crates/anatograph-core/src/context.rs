//! Hierarchy context: the derived, queryable view of the structure forest.
//!
//! A context is built once from a structures map and never updated. It does
//! not see later edits; anything that needs current answers rebuilds it (the
//! executor does so before every action).

use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;

use anatograph_store::{Structure, StructureId, StructureKind};

use crate::classify::classify;

/// Distance from a root, or `Cyclic` when the parent chain loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Depth {
    Finite(usize),
    Cyclic,
}

impl Depth {
    pub fn finite(self) -> Option<usize> {
        match self {
            Depth::Finite(n) => Some(n),
            Depth::Cyclic => None,
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Depth::Finite(n) => write!(f, "{n}"),
            Depth::Cyclic => f.write_str("cyclic"),
        }
    }
}

impl Serialize for Depth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Depth::Finite(n) => serializer.serialize_u64(*n as u64),
            Depth::Cyclic => serializer.serialize_str("cyclic"),
        }
    }
}

/// Compact description of one structure, for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureSummary {
    pub id: StructureId,
    pub name: String,
    pub kind: StructureKind,
    pub depth: Depth,
    pub parent: Option<StructureId>,
    pub children: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    name: String,
    parent: Option<StructureId>,
    kind: StructureKind,
}

/// Parent/children index, depths, kinds and a case-insensitive name index.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyContext {
    nodes: BTreeMap<StructureId, Node>,
    children: BTreeMap<StructureId, Vec<StructureId>>,
    depths: BTreeMap<StructureId, Depth>,
    name_index: HashMap<String, StructureId>,
}

impl HierarchyContext {
    pub fn build(structures: &BTreeMap<StructureId, Structure>) -> Self {
        let nodes: BTreeMap<StructureId, Node> = structures
            .iter()
            .map(|(id, s)| {
                let node = Node {
                    name: s.name.clone(),
                    parent: s.parent.clone().filter(|p| !p.trim().is_empty()),
                    kind: classify(s),
                };
                (id.clone(), node)
            })
            .collect();

        let mut children: BTreeMap<StructureId, Vec<StructureId>> = BTreeMap::new();
        for (id, node) in &nodes {
            if let Some(parent) = &node.parent {
                children.entry(parent.clone()).or_default().push(id.clone());
            }
        }
        for list in children.values_mut() {
            list.sort_by_cached_key(|id| {
                let name = nodes.get(id).map(|n| n.name.to_lowercase()).unwrap_or_default();
                (name, id.clone())
            });
        }

        // BTreeMap iteration is id-ordered, so the first id wins on duplicates.
        let mut name_index = HashMap::new();
        for (id, node) in &nodes {
            name_index
                .entry(node.name.to_lowercase())
                .or_insert_with(|| id.clone());
        }

        let depths = nodes
            .keys()
            .map(|id| (id.clone(), walk_depth(&nodes, id)))
            .collect();

        Self {
            nodes,
            children,
            depths,
            name_index,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &StructureId> {
        self.nodes.keys()
    }

    /// Direct children, sorted by lower-cased name then id.
    pub fn children_of(&self, id: &str) -> &[StructureId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_leaf(&self, id: &str) -> bool {
        self.children_of(id).is_empty()
    }

    /// Depth of a known structure (`None` for unknown ids).
    pub fn depth_of(&self, id: &str) -> Option<Depth> {
        self.depths.get(id).copied()
    }

    /// Every structure below `id`, breadth first. `id` itself is excluded even
    /// when a cycle leads back to it.
    pub fn descendants_of(&self, id: &str) -> Vec<StructureId> {
        let mut seen: BTreeSet<&StructureId> = BTreeSet::new();
        let mut out = Vec::new();
        let mut queue: VecDeque<&StructureId> = self.children_of(id).iter().collect();
        while let Some(current) = queue.pop_front() {
            if current == id || !seen.insert(current) {
                continue;
            }
            out.push(current.clone());
            queue.extend(self.children_of(current));
        }
        out
    }

    /// True iff `a` is somewhere below `b`.
    pub fn is_descendant(&self, a: &str, b: &str) -> bool {
        self.descendants_of(b).iter().any(|d| d == a)
    }

    /// Case-insensitive exact name lookup.
    pub fn find_id_by_name(&self, name: &str) -> Option<&StructureId> {
        self.name_index.get(&name.trim().to_lowercase())
    }

    /// Free-form reference from a user: an exact id, else a name.
    pub fn lookup(&self, reference: &str) -> Option<&StructureId> {
        let reference = reference.trim();
        self.nodes
            .get_key_value(reference)
            .map(|(id, _)| id)
            .or_else(|| self.find_id_by_name(reference))
    }

    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).map(|n| n.name.as_str())
    }

    /// Name if known, else the id itself.
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.name_of(id).unwrap_or(id)
    }

    pub fn parent_of(&self, id: &str) -> Option<&StructureId> {
        self.nodes.get(id).and_then(|n| n.parent.as_ref())
    }

    pub fn kind_of(&self, id: &str) -> Option<StructureKind> {
        self.nodes.get(id).map(|n| n.kind)
    }

    pub fn ids_of_kind(&self, kind: StructureKind) -> Vec<&StructureId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.kind == kind)
            .map(|(id, _)| id)
            .collect()
    }

    /// Structures without a parent.
    pub fn roots(&self) -> Vec<&StructureId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.parent.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn summary(&self, id: &str) -> Option<StructureSummary> {
        let node = self.nodes.get(id)?;
        Some(StructureSummary {
            id: id.to_string(),
            name: node.name.clone(),
            kind: node.kind,
            depth: self.depth_of(id).unwrap_or(Depth::Cyclic),
            parent: node.parent.clone(),
            children: self.children_of(id).len(),
        })
    }
}

/// Count parent steps to a root (or to a dangling parent). Revisiting a node
/// in the same walk means the chain loops.
fn walk_depth<'a>(nodes: &'a BTreeMap<StructureId, Node>, start: &'a str) -> Depth {
    let mut visited: BTreeSet<&str> = BTreeSet::new();
    let mut current = start;
    let mut depth = 0;
    loop {
        if !visited.insert(current) {
            return Depth::Cyclic;
        }
        match nodes.get(current).and_then(|n| n.parent.as_deref()) {
            Some(parent) if nodes.contains_key(parent) => {
                depth += 1;
                current = parent;
            }
            _ => return Depth::Finite(depth),
        }
    }
}
