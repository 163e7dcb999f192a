//! Record types for the two collections: structures and relationships.
//!
//! Records keep any keys they do not model in `extra`, so a load/edit/save
//! cycle never drops data written by other tooling.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Opaque, globally unique structure identifier (e.g. `BAP_0000102`).
pub type StructureId = String;

/// One anatomical entity in the hierarchy forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub id: StructureId,
    pub name: String,
    /// `None` marks a root of the forest.
    #[serde(default)]
    pub parent: Option<StructureId>,
    #[serde(
        default,
        deserialize_with = "opt_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub definition: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub abbreviation: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deprecated: bool,
    #[serde(
        default,
        deserialize_with = "opt_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub deprecated_date: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub deprecation_reason: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
    /// Document this record was loaded from. Not part of the logical model.
    #[serde(skip)]
    pub source_file: Option<PathBuf>,
}

impl Structure {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parent: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent,
            definition: None,
            abbreviation: None,
            external_id: None,
            deprecated: false,
            deprecated_date: None,
            deprecation_reason: None,
            extra: BTreeMap::new(),
            source_file: None,
        }
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    /// Definition text, treating blank strings as absent.
    pub fn definition_text(&self) -> Option<&str> {
        self.definition
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

/// Coarse category of a structure, used for partition routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    Muscle,
    Bone,
    Nerve,
    Vessel,
    Cavity,
    Category,
    Organ,
}

impl StructureKind {
    pub const ALL: [StructureKind; 7] = [
        StructureKind::Muscle,
        StructureKind::Bone,
        StructureKind::Nerve,
        StructureKind::Vessel,
        StructureKind::Cavity,
        StructureKind::Category,
        StructureKind::Organ,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StructureKind::Muscle => "muscle",
            StructureKind::Bone => "bone",
            StructureKind::Nerve => "nerve",
            StructureKind::Vessel => "vessel",
            StructureKind::Cavity => "cavity",
            StructureKind::Category => "category",
            StructureKind::Organ => "organ",
        }
    }
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relation kind of a [`Relationship`].
///
/// The known predicates are closed variants; anything else round-trips
/// through `Other` and is stored with the developmental family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Predicate {
    InnervatedBy,
    SuppliedBy,
    DevelopsFrom,
    PartOf,
    AdjacentTo,
    Other(String),
}

impl Predicate {
    pub fn as_str(&self) -> &str {
        match self {
            Predicate::InnervatedBy => "innervated_by",
            Predicate::SuppliedBy => "supplied_by",
            Predicate::DevelopsFrom => "develops_from",
            Predicate::PartOf => "part_of",
            Predicate::AdjacentTo => "adjacent_to",
            Predicate::Other(other) => other,
        }
    }

    /// Storage partition this predicate is routed to.
    pub fn family(&self) -> PredicateFamily {
        match self {
            Predicate::InnervatedBy => PredicateFamily::Innervation,
            Predicate::SuppliedBy => PredicateFamily::BloodSupply,
            _ => PredicateFamily::Developmental,
        }
    }
}

impl From<String> for Predicate {
    fn from(value: String) -> Self {
        match value.as_str() {
            "innervated_by" => Predicate::InnervatedBy,
            "supplied_by" => Predicate::SuppliedBy,
            "develops_from" => Predicate::DevelopsFrom,
            "part_of" => Predicate::PartOf,
            "adjacent_to" => Predicate::AdjacentTo,
            _ => Predicate::Other(value),
        }
    }
}

impl From<&str> for Predicate {
    fn from(value: &str) -> Self {
        Predicate::from(value.to_string())
    }
}

impl From<Predicate> for String {
    fn from(value: Predicate) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateFamily {
    Innervation,
    BloodSupply,
    Developmental,
}

/// A typed directed edge between two structures, independent of the hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub subject: StructureId,
    pub predicate: Predicate,
    pub object: StructureId,
    #[serde(
        default,
        deserialize_with = "opt_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub confidence: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub references: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
    #[serde(skip)]
    pub source_file: Option<PathBuf>,
}

impl Relationship {
    pub fn new(
        subject: impl Into<String>,
        predicate: Predicate,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate,
            object: object.into(),
            confidence: None,
            references: None,
            notes: None,
            extra: BTreeMap::new(),
            source_file: None,
        }
    }

    pub fn involves(&self, id: &str) -> bool {
        self.subject == id || self.object == id
    }

    /// Identity of the edge for duplicate detection.
    pub fn same_triple(&self, subject: &str, predicate: &Predicate, object: &str) -> bool {
        self.subject == subject && &self.predicate == predicate && self.object == object
    }
}

/// Field updates accepted by an update action.
///
/// Unknown keys (including `parent` and `id`) are rejected: reparenting goes
/// through a move so the hierarchy checks apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructurePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abbreviation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl StructurePatch {
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// The fields this patch sets, in record key order.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("name", self.name.as_deref()),
            ("definition", self.definition.as_deref()),
            ("abbreviation", self.abbreviation.as_deref()),
            ("external_id", self.external_id.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Accept any YAML scalar for a free-text field (`confidence: 0.9` as well as
/// `confidence: high`).
fn opt_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => Some(
            serde_yaml::to_string(&other)
                .map_err(D::Error::custom)?
                .trim_end()
                .to_string(),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_survive_a_round_trip() {
        let yaml = "id: BAP_0000001\nname: Eye\nparent: null\nsynonyms: [oculus]\n";
        let s: Structure = serde_yaml::from_str(yaml).unwrap();
        assert!(s.extra.contains_key("synonyms"));
        let back = serde_yaml::to_string(&s).unwrap();
        assert!(back.contains("synonyms"));
        assert!(back.contains("parent: null"));
    }

    #[test]
    fn numeric_confidence_is_read_as_text() {
        let yaml = "subject: A\npredicate: innervated_by\nobject: B\nconfidence: 0.9\n";
        let r: Relationship = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(r.confidence.as_deref(), Some("0.9"));
        assert_eq!(r.predicate, Predicate::InnervatedBy);
    }

    #[test]
    fn unknown_predicates_route_to_developmental() {
        let p = Predicate::from("drains_to");
        assert_eq!(p.as_str(), "drains_to");
        assert_eq!(p.family(), PredicateFamily::Developmental);
        assert_eq!(Predicate::SuppliedBy.family(), PredicateFamily::BloodSupply);
    }

    #[test]
    fn patch_rejects_parent_changes() {
        let err = serde_json::from_str::<StructurePatch>(r#"{"parent": "BAP_0000001"}"#);
        assert!(err.is_err());
        let patch: StructurePatch = serde_json::from_str(r#"{"name": "Iris"}"#).unwrap();
        assert_eq!(patch.entries(), vec![("name", "Iris")]);
    }
}
