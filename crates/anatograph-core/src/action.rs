//! Proposed mutations and action-plan files.
//!
//! Actions arrive as untrusted JSON (typically from a natural-language front
//! end). Each variant carries only the fields it needs; targets may be given
//! by id, by name, or both, and are resolved against a live context when the
//! plan is validated or executed, never cached across actions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use anatograph_store::{Predicate, StoreConfig, StructureId, StructurePatch};

use crate::classify::classify_text;
use crate::context::HierarchyContext;

/// One proposed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    CreateStructure(CreateStructure),
    MoveStructure(MoveStructure),
    DeleteStructure(DeleteStructure),
    UpdateStructure(UpdateStructure),
    AddRelationship(AddRelationship),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateStructure {
    pub id: StructureId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<StructureId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    /// Explicit structures document; otherwise routed by classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveStructure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure_id: Option<StructureId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_parent_id: Option<StructureId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_parent_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteStructure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure_id: Option<StructureId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStructure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure_id: Option<StructureId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure_name: Option<String>,
    #[serde(default)]
    pub changes: StructurePatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddRelationship {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<StructureId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    pub predicate: Predicate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<StructureId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A structure reference: by id if one is given, else by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target<'a> {
    pub id: Option<&'a str>,
    pub name: Option<&'a str>,
}

impl<'a> Target<'a> {
    pub fn new(id: Option<&'a str>, name: Option<&'a str>) -> Self {
        let present = |s: &&str| !s.trim().is_empty();
        Self {
            id: id.filter(present),
            name: name.filter(present),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none()
    }

    /// Resolve against `context`. An id is authoritative: it is never
    /// overridden by a name match.
    pub fn resolve(&self, context: &HierarchyContext) -> Option<StructureId> {
        match (self.id, self.name) {
            (Some(id), _) => context.contains(id).then(|| id.to_string()),
            (None, Some(name)) => context.find_id_by_name(name).cloned(),
            (None, None) => None,
        }
    }

    /// Human label: the name when present, else the id.
    pub fn label(&self) -> &'a str {
        self.name.or(self.id).unwrap_or("<unspecified>")
    }
}

impl fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl CreateStructure {
    pub fn parent(&self) -> Target<'_> {
        Target::new(self.parent_id.as_deref(), self.parent_name.as_deref())
    }

    /// Structures document the new record goes to: the explicit `file`, or
    /// the partition for its classified kind.
    pub fn document(&self, config: &StoreConfig) -> String {
        match self.file.as_deref().map(str::trim) {
            Some(file) => file.to_string(),
            None => {
                let kind = classify_text(&self.name, self.definition.as_deref());
                config.structure_partition(kind).to_string()
            }
        }
    }
}

impl MoveStructure {
    pub fn target(&self) -> Target<'_> {
        Target::new(self.structure_id.as_deref(), self.structure_name.as_deref())
    }

    pub fn new_parent(&self) -> Target<'_> {
        Target::new(self.new_parent_id.as_deref(), self.new_parent_name.as_deref())
    }
}

impl DeleteStructure {
    pub fn target(&self) -> Target<'_> {
        Target::new(self.structure_id.as_deref(), self.structure_name.as_deref())
    }
}

impl UpdateStructure {
    pub fn target(&self) -> Target<'_> {
        Target::new(self.structure_id.as_deref(), self.structure_name.as_deref())
    }
}

impl AddRelationship {
    pub fn subject(&self) -> Target<'_> {
        Target::new(self.subject_id.as_deref(), self.subject_name.as_deref())
    }

    pub fn object(&self) -> Target<'_> {
        Target::new(self.object_id.as_deref(), self.object_name.as_deref())
    }

    pub fn document<'c>(&self, config: &'c StoreConfig) -> &'c str {
        config.relationship_partition(self.predicate.family())
    }
}

impl Action {
    /// Convenience constructor for the common id-to-id move.
    pub fn move_to(structure_id: impl Into<String>, new_parent_id: impl Into<String>) -> Self {
        Action::MoveStructure(MoveStructure {
            structure_id: Some(structure_id.into()),
            structure_name: None,
            new_parent_id: Some(new_parent_id.into()),
            new_parent_name: None,
        })
    }

    pub fn delete(structure_id: impl Into<String>) -> Self {
        Action::DeleteStructure(DeleteStructure {
            structure_id: Some(structure_id.into()),
            structure_name: None,
            reason: None,
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Action::CreateStructure(_) => "create_structure",
            Action::MoveStructure(_) => "move_structure",
            Action::DeleteStructure(_) => "delete_structure",
            Action::UpdateStructure(_) => "update_structure",
            Action::AddRelationship(_) => "add_relationship",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::CreateStructure(a) => {
                write!(f, "CREATE '{}' ({})", a.name, a.id)?;
                if !a.parent().is_empty() {
                    write!(f, " under '{}'", a.parent())?;
                }
                Ok(())
            }
            Action::MoveStructure(a) => {
                write!(f, "MOVE '{}' to '{}'", a.target(), a.new_parent())
            }
            Action::DeleteStructure(a) => write!(f, "DELETE '{}'", a.target()),
            Action::UpdateStructure(a) => {
                let keys: Vec<&str> = a.changes.entries().iter().map(|(k, _)| *k).collect();
                write!(f, "UPDATE '{}' ({})", a.target(), keys.join(", "))
            }
            Action::AddRelationship(a) => write!(
                f,
                "RELATE '{}' {} '{}'",
                a.subject(),
                a.predicate,
                a.object()
            ),
        }
    }
}

// ============================================================================
// Plan files
// ============================================================================

/// An action list plus the producer's own notes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub understood: Option<String>,
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PlanFormatError {
    #[error("invalid plan JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unrecognized plan shape: expected an action array or an object with `actions` (or legacy `structures`/`relationships`)")]
    UnrecognizedShape,
}

/// Legacy structure proposal (`is_new: false` entries reference existing
/// structures and produce no action).
#[derive(Debug, Deserialize)]
struct LegacyStructure {
    id: StructureId,
    name: String,
    #[serde(default)]
    parent_id: Option<StructureId>,
    #[serde(default)]
    parent_name: Option<String>,
    #[serde(default)]
    definition: Option<String>,
    #[serde(default)]
    is_new: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct LegacyPlan {
    #[serde(default)]
    understood: Option<String>,
    #[serde(default)]
    structures: Vec<LegacyStructure>,
    #[serde(default)]
    relationships: Vec<AddRelationship>,
    #[serde(default)]
    warnings: Vec<String>,
}

impl From<LegacyPlan> for ActionPlan {
    fn from(legacy: LegacyPlan) -> Self {
        let creates = legacy
            .structures
            .into_iter()
            .filter(|s| s.is_new != Some(false))
            .map(|s| {
                Action::CreateStructure(CreateStructure {
                    id: s.id,
                    name: s.name,
                    parent_id: s.parent_id,
                    parent_name: s.parent_name,
                    definition: s.definition,
                    file: None,
                })
            });
        let relates = legacy.relationships.into_iter().map(Action::AddRelationship);
        ActionPlan {
            understood: legacy.understood,
            actions: creates.chain(relates).collect(),
            warnings: legacy.warnings,
        }
    }
}

impl ActionPlan {
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            actions,
            ..Self::default()
        }
    }

    /// Parse any accepted plan shape: an envelope with `actions`, a bare
    /// action array, or the legacy `structures`/`relationships` object.
    pub fn from_json(text: &str) -> Result<Self, PlanFormatError> {
        let value: Value = serde_json::from_str(text)?;
        match &value {
            Value::Array(_) => Ok(Self::new(serde_json::from_value(value)?)),
            Value::Object(map) if map.contains_key("actions") => {
                Ok(serde_json::from_value(value)?)
            }
            Value::Object(map)
                if map.contains_key("structures") || map.contains_key("relationships") =>
            {
                let legacy: LegacyPlan = serde_json::from_value(value)?;
                Ok(legacy.into())
            }
            _ => Err(PlanFormatError::UnrecognizedShape),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anatograph_store::Structure;
    use std::collections::BTreeMap;

    #[test]
    fn tagged_json_round_trips() {
        let json = r#"[
            {"type": "create_structure", "id": "BAP_0000050", "name": "Eye Muscles", "parent_id": "BAP_0000001"},
            {"type": "move_structure", "structure_name": "LPS", "new_parent_id": "BAP_0000050"},
            {"type": "update_structure", "structure_id": "BAP_0000002", "changes": {"definition": "x"}},
            {"type": "add_relationship", "subject_name": "LPS", "predicate": "innervated_by", "object_name": "Oculomotor nerve"}
        ]"#;
        let plan = ActionPlan::from_json(json).unwrap();
        assert_eq!(plan.actions.len(), 4);
        assert_eq!(plan.actions[1].type_name(), "move_structure");
        let back = serde_json::to_value(&plan.actions[0]).unwrap();
        assert_eq!(back["type"], "create_structure");
        assert!(back.get("file").is_none());
    }

    #[test]
    fn update_cannot_reparent() {
        let json = r#"{"actions": [{"type": "update_structure", "structure_id": "A", "changes": {"parent": "B"}}]}"#;
        assert!(matches!(
            ActionPlan::from_json(json),
            Err(PlanFormatError::Json(_))
        ));
    }

    #[test]
    fn legacy_envelope_is_converted() {
        let json = r#"{
            "understood": "add a muscle",
            "structures": [
                {"id": "BAP_0000090", "name": "Orbit", "is_new": false},
                {"id": "BAP_0000091", "name": "Superior rectus", "parent_name": "Orbit", "is_new": true}
            ],
            "relationships": [
                {"subject_name": "Superior rectus", "predicate": "innervated_by", "object_name": "Oculomotor nerve"}
            ],
            "warnings": ["guessed parent"]
        }"#;
        let plan = ActionPlan::from_json(json).unwrap();
        assert_eq!(plan.actions.len(), 2);
        assert!(matches!(&plan.actions[0], Action::CreateStructure(c) if c.id == "BAP_0000091"));
        assert!(matches!(&plan.actions[1], Action::AddRelationship(_)));
        assert_eq!(plan.warnings, ["guessed parent"]);
    }

    #[test]
    fn other_shapes_are_rejected() {
        assert!(matches!(
            ActionPlan::from_json(r#"{"foo": 1}"#),
            Err(PlanFormatError::UnrecognizedShape)
        ));
    }

    #[test]
    fn ids_take_precedence_over_names() {
        let structures: BTreeMap<_, _> = [
            Structure::new("A", "Eye", None),
            Structure::new("B", "Ear", None),
        ]
        .into_iter()
        .map(|s| (s.id.clone(), s))
        .collect();
        let ctx = HierarchyContext::build(&structures);

        assert_eq!(Target::new(Some("A"), Some("Ear")).resolve(&ctx).as_deref(), Some("A"));
        assert_eq!(Target::new(Some("Z"), Some("Ear")).resolve(&ctx), None);
        assert_eq!(Target::new(Some("  "), Some("ear")).resolve(&ctx).as_deref(), Some("B"));
        assert!(Target::new(None, Some("")).is_empty());
    }
}
