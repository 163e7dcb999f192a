//! Action-plan validation.
//!
//! Plans are applied to a live, file-backed store with no cross-file
//! transaction, so every unsafe intermediate state has to be caught before the
//! first write. Validation runs in two passes:
//!
//! 1. a per-action pass against the pre-plan context, with references to
//!    structures created anywhere in the same plan accepted as pending;
//! 2. a plan pass that walks the actions in order over a simulated parent map
//!    and rejects anything that is only unsafe because of its position
//!    (references before the creating action, deletes before the children are
//!    moved away, cycles formed across several moves).
//!
//! A [`ValidatedPlan`] can only be obtained from a validation with no errors.

use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use anatograph_store::{check_document_name, DocumentNameError, IdScheme, Predicate, StructureId};

use crate::action::{Action, Target};
use crate::snapshot::Snapshot;

/// How many names an error message lists before eliding the rest.
pub const DISPLAY_CAP: usize = 3;

/// Integrity error raised by a single action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("Cannot delete '{name}' - has {count} children: {}", capped(children))]
    HasChildren {
        id: StructureId,
        name: String,
        count: usize,
        children: Vec<String>,
    },
    #[error("Circular reference: Cannot move '{target}' under its own descendant '{descendant}'")]
    CircularReference { target: String, descendant: String },
    #[error("Circular reference: Cannot move '{target}' under itself")]
    SelfParent { target: String },
    #[error("Structure '{target}' not found")]
    TargetNotFound { target: String },
    #[error("Parent structure '{parent}' not found")]
    ParentNotFound { parent: String },
    #[error("No target structure given")]
    MissingTarget,
    #[error("No new parent given for '{target}'")]
    MissingNewParent { target: String },
    #[error("Structure ID {id} already exists ('{name}')")]
    IdExists { id: StructureId, name: String },
    #[error("Structure ID must not be blank")]
    BlankId,
    #[error("Relationship {role} '{target}' not found")]
    EndpointNotFound { role: &'static str, target: String },
    #[error("Relationship {role} not given")]
    MissingEndpoint { role: &'static str },
    #[error("Document '{file}' cannot be used: {reason}")]
    InvalidDocument {
        file: String,
        reason: DocumentNameError,
    },
    #[error("Document '{file}' does not exist in the {collection} collection")]
    MissingDocument {
        file: String,
        collection: &'static str,
    },
}

/// Advisory condition; never blocks a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionWarning {
    PendingReference {
        role: &'static str,
        target: String,
        created_by: usize,
    },
    NewParentMissing { parent: String },
    DuplicateName { name: String, existing: StructureId },
    NonConformingId { id: StructureId },
    MissingDefinition { name: String },
    AlreadyUnderParent { target: String, parent: String },
    EmptyUpdate { target: String },
    DuplicateRelationship {
        subject: String,
        predicate: Predicate,
        object: String,
    },
}

impl fmt::Display for ActionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionWarning::PendingReference {
                role,
                target,
                created_by,
            } => write!(
                f,
                "{role} '{target}' does not exist yet (created by action {created_by})"
            ),
            ActionWarning::NewParentMissing { parent } => {
                write!(f, "New parent '{parent}' not found - should be created first")
            }
            ActionWarning::DuplicateName { name, existing } => {
                write!(f, "A structure named '{name}' already exists ({existing})")
            }
            ActionWarning::NonConformingId { id } => {
                write!(f, "Structure ID '{id}' does not follow the configured ID format")
            }
            ActionWarning::MissingDefinition { name } => {
                write!(f, "New structure '{name}' has no definition")
            }
            ActionWarning::AlreadyUnderParent { target, parent } => {
                write!(f, "'{target}' is already under '{parent}'")
            }
            ActionWarning::EmptyUpdate { target } => {
                write!(f, "Update of '{target}' changes nothing")
            }
            ActionWarning::DuplicateRelationship {
                subject,
                predicate,
                object,
            } => write!(
                f,
                "Relationship already exists: '{subject}' {predicate} '{object}'"
            ),
        }
    }
}

/// Error that only exists because of where an action sits in the plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("Action {index}: duplicate CREATE of {id} (first created by action {first})")]
    DuplicateCreate {
        index: usize,
        id: StructureId,
        first: usize,
    },
    #[error("Action {index}: MOVE before CREATE - '{target}' is moved to '{parent}' which is created later (action {created_by})")]
    MoveBeforeCreate {
        index: usize,
        target: String,
        parent: String,
        created_by: usize,
    },
    #[error("Action {index}: {action} references '{reference}' before it is created (action {created_by})")]
    ReferenceBeforeCreate {
        index: usize,
        action: &'static str,
        reference: String,
        created_by: usize,
    },
    #[error("Action {index}: DELETE '{target}' before moving {} children: {}", children.len(), capped(children))]
    DeleteBeforeMove {
        index: usize,
        target: String,
        children: Vec<String>,
    },
    #[error("Action {index}: moving '{target}' under '{parent}' forms a cycle with earlier moves")]
    CycleAfterEarlierMoves {
        index: usize,
        target: String,
        parent: String,
    },
    #[error("Action {index}: {action} references '{reference}' after it is deleted (action {deleted_by})")]
    ReferenceAfterDelete {
        index: usize,
        action: &'static str,
        reference: String,
        deleted_by: usize,
    },
}

/// Result of the per-action pass (after plan-level repair).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionCheck {
    pub index: usize,
    pub action: Action,
    pub safe: bool,
    #[serde(serialize_with = "display_all")]
    pub errors: Vec<ActionError>,
    #[serde(serialize_with = "display_all")]
    pub warnings: Vec<ActionWarning>,
}

impl ActionCheck {
    fn new(index: usize, action: &Action) -> Self {
        Self {
            index,
            action: action.clone(),
            safe: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn error(&mut self, err: ActionError) {
        self.errors.push(err);
        self.safe = false;
    }

    fn warn(&mut self, warning: ActionWarning) {
        self.warnings.push(warning);
    }
}

/// Whole-plan verdict. Serializes as
/// `{valid, errors, warnings, perAction: [{index, action, safe, errors, warnings}]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanValidation {
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
    per_action: Vec<ActionCheck>,
    #[serde(skip)]
    plan_errors: Vec<PlanError>,
}

impl PlanValidation {
    fn new(per_action: Vec<ActionCheck>, plan_errors: Vec<PlanError>, plan_warnings: Vec<String>) -> Self {
        let mut errors: Vec<String> = per_action
            .iter()
            .flat_map(|c| c.errors.iter().map(ToString::to_string))
            .collect();
        errors.extend(plan_errors.iter().map(ToString::to_string));

        let mut warnings: Vec<String> = per_action
            .iter()
            .flat_map(|c| c.warnings.iter().map(ToString::to_string))
            .collect();
        warnings.extend(plan_warnings);

        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
            per_action,
            plan_errors,
        }
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Every error, per-action ones first, as display strings.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn per_action(&self) -> &[ActionCheck] {
        &self.per_action
    }

    pub fn plan_errors(&self) -> &[PlanError] {
        &self.plan_errors
    }

    /// The gate between validation and execution.
    pub fn into_validated(self) -> Result<ValidatedPlan, PlanValidation> {
        let clean = self.plan_errors.is_empty()
            && self.per_action.iter().all(|c| c.safe && c.errors.is_empty());
        if !self.valid || !clean {
            return Err(self);
        }
        Ok(ValidatedPlan {
            actions: self.per_action.into_iter().map(|c| c.action).collect(),
            warnings: self.warnings,
        })
    }
}

/// An action list that passed validation. Only [`PlanValidation`] builds one.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPlan {
    actions: Vec<Action>,
    warnings: Vec<String>,
}

impl ValidatedPlan {
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn into_actions(self) -> Vec<Action> {
        self.actions
    }
}

// ============================================================================
// Validator
// ============================================================================

/// Creates anywhere in the plan, looked up by id or lower-cased name.
struct PendingCreates<'p> {
    by_id: BTreeMap<&'p str, usize>,
    by_name: BTreeMap<String, usize>,
    duplicates: Vec<PlanError>,
}

impl<'p> PendingCreates<'p> {
    fn collect(actions: &'p [Action]) -> Self {
        let mut pending = Self {
            by_id: BTreeMap::new(),
            by_name: BTreeMap::new(),
            duplicates: Vec::new(),
        };
        for (index, action) in actions.iter().enumerate() {
            let Action::CreateStructure(create) = action else {
                continue;
            };
            let id = create.id.trim();
            if id.is_empty() {
                continue;
            }
            if let Some(&first) = pending.by_id.get(id) {
                pending.duplicates.push(PlanError::DuplicateCreate {
                    index,
                    id: id.to_string(),
                    first,
                });
                continue;
            }
            pending.by_id.insert(id, index);
            pending
                .by_name
                .entry(create.name.trim().to_lowercase())
                .or_insert(index);
        }
        pending
    }

    /// Creating action index and created id for a reference.
    fn find(&self, target: Target<'_>, actions: &'p [Action]) -> Option<(usize, &'p str)> {
        let index = match (target.id, target.name) {
            (Some(id), _) => self.by_id.get(id).copied(),
            (None, Some(name)) => self.by_name.get(&name.trim().to_lowercase()).copied(),
            (None, None) => None,
        }?;
        match &actions[index] {
            Action::CreateStructure(create) => Some((index, create.id.trim())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolved<'p> {
    Existing(StructureId),
    Pending { created_by: usize, id: &'p str },
    Missing,
}

impl Resolved<'_> {
    fn key(&self) -> Option<&str> {
        match self {
            Resolved::Existing(id) => Some(id.as_str()),
            Resolved::Pending { id, .. } => Some(*id),
            Resolved::Missing => None,
        }
    }
}

/// Validates plans against one snapshot.
pub struct Validator<'a> {
    snapshot: &'a Snapshot,
    scheme: IdScheme,
}

impl<'a> Validator<'a> {
    pub fn new(snapshot: &'a Snapshot, scheme: IdScheme) -> Self {
        Self { snapshot, scheme }
    }

    pub fn validate(&self, actions: &[Action]) -> PlanValidation {
        let pending = PendingCreates::collect(actions);

        let mut checks: Vec<ActionCheck> = actions
            .iter()
            .enumerate()
            .map(|(index, action)| self.check_action(index, action, actions, &pending))
            .collect();

        let mut plan_errors = pending.duplicates.clone();
        self.check_ordering(actions, &pending, &mut plan_errors);
        self.simulate(actions, &pending, &mut checks, &mut plan_errors);
        let plan_warnings = self.duplicate_relationships_in_plan(actions, &pending);

        let validation = PlanValidation::new(checks, plan_errors, plan_warnings);
        tracing::debug!(
            actions = actions.len(),
            valid = validation.valid,
            errors = validation.errors.len(),
            warnings = validation.warnings.len(),
            "validated plan"
        );
        validation
    }

    fn resolve<'p>(
        &self,
        target: Target<'_>,
        actions: &'p [Action],
        pending: &PendingCreates<'p>,
    ) -> Resolved<'p> {
        if let Some(id) = target.resolve(&self.snapshot.context) {
            return Resolved::Existing(id);
        }
        match pending.find(target, actions) {
            Some((created_by, id)) => Resolved::Pending { created_by, id },
            None => Resolved::Missing,
        }
    }

    fn check_action<'p>(
        &self,
        index: usize,
        action: &'p Action,
        actions: &'p [Action],
        pending: &PendingCreates<'p>,
    ) -> ActionCheck {
        let ctx = &self.snapshot.context;
        let mut check = ActionCheck::new(index, action);

        match action {
            Action::CreateStructure(create) => {
                let id = create.id.trim();
                if id.is_empty() {
                    check.error(ActionError::BlankId);
                } else if ctx.contains(id) {
                    check.error(ActionError::IdExists {
                        id: id.to_string(),
                        name: ctx.display_name(id).to_string(),
                    });
                } else if !self.scheme.is_conforming(id) {
                    check.warn(ActionWarning::NonConformingId { id: id.to_string() });
                }
                if let Some(existing) = ctx.find_id_by_name(&create.name) {
                    check.warn(ActionWarning::DuplicateName {
                        name: create.name.clone(),
                        existing: existing.clone(),
                    });
                }
                if create.definition.as_deref().map_or(true, |d| d.trim().is_empty()) {
                    check.warn(ActionWarning::MissingDefinition {
                        name: create.name.clone(),
                    });
                }
                match create.file.as_deref().map(check_document_name) {
                    Some(Err(reason)) => check.error(ActionError::InvalidDocument {
                        file: create.file.clone().unwrap_or_default(),
                        reason,
                    }),
                    _ => {
                        if let Some(layout) = &self.snapshot.layout {
                            let file = create.document(&layout.config);
                            if !layout.structure_documents.contains(&file) {
                                check.error(ActionError::MissingDocument {
                                    file,
                                    collection: "structures",
                                });
                            }
                        }
                    }
                }
                let parent = create.parent();
                if !parent.is_empty() {
                    match self.resolve(parent, actions, pending) {
                        Resolved::Existing(_) => {}
                        Resolved::Pending { created_by, .. } => {
                            check.warn(ActionWarning::PendingReference {
                                role: "Parent",
                                target: parent.label().to_string(),
                                created_by,
                            })
                        }
                        Resolved::Missing => check.error(ActionError::ParentNotFound {
                            parent: parent.label().to_string(),
                        }),
                    }
                }
            }

            Action::MoveStructure(mv) => {
                let target = mv.target();
                let new_parent = mv.new_parent();
                let resolved_target = self.required(&mut check, target, "Structure", actions, pending);

                if new_parent.is_empty() {
                    check.error(ActionError::MissingNewParent {
                        target: target.label().to_string(),
                    });
                    return check;
                }
                let resolved_parent = self.resolve(new_parent, actions, pending);
                match &resolved_parent {
                    Resolved::Existing(_) => {}
                    Resolved::Pending { created_by, .. } => {
                        check.warn(ActionWarning::PendingReference {
                            role: "New parent",
                            target: new_parent.label().to_string(),
                            created_by: *created_by,
                        })
                    }
                    Resolved::Missing => check.warn(ActionWarning::NewParentMissing {
                        parent: new_parent.label().to_string(),
                    }),
                }

                if let (Some(tid), Some(pid)) = (resolved_target.key(), resolved_parent.key()) {
                    if tid == pid {
                        check.error(ActionError::SelfParent {
                            target: target.label().to_string(),
                        });
                    } else if ctx.is_descendant(pid, tid) {
                        check.error(ActionError::CircularReference {
                            target: target.label().to_string(),
                            descendant: new_parent.label().to_string(),
                        });
                    } else if ctx.parent_of(tid).map(String::as_str) == Some(pid) {
                        check.warn(ActionWarning::AlreadyUnderParent {
                            target: target.label().to_string(),
                            parent: new_parent.label().to_string(),
                        });
                    }
                }
            }

            Action::DeleteStructure(delete) => {
                let target = delete.target();
                if let Resolved::Existing(id) = self.required(&mut check, target, "Structure", actions, pending) {
                    let children = ctx.children_of(&id);
                    if !children.is_empty() {
                        check.error(ActionError::HasChildren {
                            name: target.label().to_string(),
                            count: children.len(),
                            children: children
                                .iter()
                                .map(|c| ctx.display_name(c).to_string())
                                .collect(),
                            id,
                        });
                    }
                }
            }

            Action::UpdateStructure(update) => {
                let target = update.target();
                let resolved = self.required(&mut check, target, "Structure", actions, pending);
                if update.changes.is_empty() {
                    check.warn(ActionWarning::EmptyUpdate {
                        target: target.label().to_string(),
                    });
                }
                if let Some(new_name) = &update.changes.name {
                    match ctx.find_id_by_name(new_name) {
                        Some(existing) if Some(existing.as_str()) != resolved.key() => {
                            check.warn(ActionWarning::DuplicateName {
                                name: new_name.clone(),
                                existing: existing.clone(),
                            })
                        }
                        _ => {}
                    }
                }
            }

            Action::AddRelationship(rel) => {
                let subject = self.endpoint(&mut check, rel.subject(), "subject", actions, pending);
                let object = self.endpoint(&mut check, rel.object(), "object", actions, pending);
                let mut already_present = false;
                if let (Resolved::Existing(s), Resolved::Existing(o)) = (&subject, &object) {
                    if self.snapshot.has_relationship(s, &rel.predicate, o) {
                        already_present = true;
                        check.warn(ActionWarning::DuplicateRelationship {
                            subject: rel.subject().label().to_string(),
                            predicate: rel.predicate.clone(),
                            object: rel.object().label().to_string(),
                        });
                    }
                }
                if let Some(layout) = self.snapshot.layout.as_ref().filter(|_| !already_present) {
                    let file = rel.document(&layout.config);
                    if !layout.relationship_documents.contains(file) {
                        check.error(ActionError::MissingDocument {
                            file: file.to_string(),
                            collection: "relationships",
                        });
                    }
                }
            }
        }
        check
    }

    /// Resolve a target that must exist (now or by a create in this plan).
    fn required<'p>(
        &self,
        check: &mut ActionCheck,
        target: Target<'_>,
        role: &'static str,
        actions: &'p [Action],
        pending: &PendingCreates<'p>,
    ) -> Resolved<'p> {
        if target.is_empty() {
            check.error(ActionError::MissingTarget);
            return Resolved::Missing;
        }
        let resolved = self.resolve(target, actions, pending);
        match &resolved {
            Resolved::Existing(_) => {}
            Resolved::Pending { created_by, .. } => check.warn(ActionWarning::PendingReference {
                role,
                target: target.label().to_string(),
                created_by: *created_by,
            }),
            Resolved::Missing => check.error(ActionError::TargetNotFound {
                target: target.label().to_string(),
            }),
        }
        resolved
    }

    fn endpoint<'p>(
        &self,
        check: &mut ActionCheck,
        target: Target<'_>,
        role: &'static str,
        actions: &'p [Action],
        pending: &PendingCreates<'p>,
    ) -> Resolved<'p> {
        if target.is_empty() {
            check.error(ActionError::MissingEndpoint { role });
            return Resolved::Missing;
        }
        let resolved = self.resolve(target, actions, pending);
        match &resolved {
            Resolved::Existing(_) => {}
            Resolved::Pending { created_by, .. } => check.warn(ActionWarning::PendingReference {
                role: if role == "subject" { "Subject" } else { "Object" },
                target: target.label().to_string(),
                created_by: *created_by,
            }),
            Resolved::Missing => check.error(ActionError::EndpointNotFound {
                role,
                target: target.label().to_string(),
            }),
        }
        resolved
    }

    /// Any reference to a structure created at the same or a later index.
    fn check_ordering<'p>(
        &self,
        actions: &'p [Action],
        pending: &PendingCreates<'p>,
        plan_errors: &mut Vec<PlanError>,
    ) {
        for (index, action) in actions.iter().enumerate() {
            for (role, target) in references(action) {
                let Resolved::Pending { created_by, .. } = self.resolve(target, actions, pending)
                else {
                    continue;
                };
                if created_by < index {
                    continue;
                }
                let err = match (action, role) {
                    (Action::MoveStructure(mv), Role::NewParent) => PlanError::MoveBeforeCreate {
                        index,
                        target: mv.target().label().to_string(),
                        parent: target.label().to_string(),
                        created_by,
                    },
                    _ => PlanError::ReferenceBeforeCreate {
                        index,
                        action: action_label(action),
                        reference: target.label().to_string(),
                        created_by,
                    },
                };
                plan_errors.push(err);
            }
        }
    }

    /// Walk the plan over a simulated parent map: deletes must find their
    /// target empty at that point, moves must not close a cycle, and nothing
    /// may reference a structure an earlier action deleted.
    fn simulate<'p>(
        &self,
        actions: &'p [Action],
        pending: &PendingCreates<'p>,
        checks: &mut [ActionCheck],
        plan_errors: &mut Vec<PlanError>,
    ) {
        let ctx = &self.snapshot.context;
        let mut parents: BTreeMap<String, Option<String>> = ctx
            .ids()
            .map(|id| (id.clone(), ctx.parent_of(id).cloned()))
            .collect();
        let mut names: BTreeMap<String, String> = ctx
            .ids()
            .map(|id| (id.clone(), ctx.display_name(id).to_string()))
            .collect();

        let mut deleted: BTreeMap<String, usize> = BTreeMap::new();

        for (index, action) in actions.iter().enumerate() {
            let mut stale = false;
            for (_, target) in references(action) {
                let resolved = self.resolve(target, actions, pending);
                let Some(&deleted_by) = resolved.key().and_then(|id| deleted.get(id)) else {
                    continue;
                };
                plan_errors.push(PlanError::ReferenceAfterDelete {
                    index,
                    action: action_label(action),
                    reference: target.label().to_string(),
                    deleted_by,
                });
                stale = true;
            }
            if stale {
                continue;
            }

            match action {
                Action::CreateStructure(create) => {
                    let id = create.id.trim();
                    if id.is_empty() || parents.contains_key(id) {
                        continue;
                    }
                    let parent = self.resolve(create.parent(), actions, pending);
                    parents.insert(id.to_string(), parent.key().map(str::to_string));
                    names.insert(id.to_string(), create.name.clone());
                }
                Action::MoveStructure(mv) => {
                    let target = self.resolve(mv.target(), actions, pending);
                    let parent = self.resolve(mv.new_parent(), actions, pending);
                    let (Some(tid), Some(pid)) = (target.key(), parent.key()) else {
                        continue;
                    };
                    if tid == pid || ancestor_chain_contains(&parents, pid, tid) {
                        let already_reported = checks[index].errors.iter().any(|e| {
                            matches!(
                                e,
                                ActionError::SelfParent { .. } | ActionError::CircularReference { .. }
                            )
                        });
                        if !already_reported {
                            plan_errors.push(PlanError::CycleAfterEarlierMoves {
                                index,
                                target: mv.target().label().to_string(),
                                parent: mv.new_parent().label().to_string(),
                            });
                        }
                        continue;
                    }
                    parents.insert(tid.to_string(), Some(pid.to_string()));
                }
                Action::DeleteStructure(delete) => {
                    let resolved = self.resolve(delete.target(), actions, pending);
                    let Some(id) = resolved.key() else {
                        continue;
                    };
                    let mut remaining: Vec<&String> = parents
                        .iter()
                        .filter(|(_, p)| p.as_deref() == Some(id))
                        .map(|(child, _)| child)
                        .collect();
                    if remaining.is_empty() {
                        // Every child was moved away earlier in the plan.
                        checks[index]
                            .errors
                            .retain(|e| !matches!(e, ActionError::HasChildren { .. }));
                        checks[index].safe = checks[index].errors.is_empty();
                        parents.remove(id);
                        deleted.insert(id.to_string(), index);
                        continue;
                    }
                    remaining.sort_by_cached_key(|c| {
                        (names.get(*c).map(|n| n.to_lowercase()).unwrap_or_default(), (*c).clone())
                    });
                    plan_errors.push(PlanError::DeleteBeforeMove {
                        index,
                        target: delete.target().label().to_string(),
                        children: remaining
                            .iter()
                            .map(|c| names.get(*c).cloned().unwrap_or_else(|| (*c).clone()))
                            .collect(),
                    });
                }
                Action::UpdateStructure(_) | Action::AddRelationship(_) => {}
            }
        }
    }

    fn duplicate_relationships_in_plan<'p>(
        &self,
        actions: &'p [Action],
        pending: &PendingCreates<'p>,
    ) -> Vec<String> {
        let mut seen: BTreeMap<(String, Predicate, String), usize> = BTreeMap::new();
        let mut warnings = Vec::new();
        for (index, action) in actions.iter().enumerate() {
            let Action::AddRelationship(rel) = action else {
                continue;
            };
            let subject = self.resolve(rel.subject(), actions, pending);
            let object = self.resolve(rel.object(), actions, pending);
            let (Some(s), Some(o)) = (subject.key(), object.key()) else {
                continue;
            };
            let key = (s.to_string(), rel.predicate.clone(), o.to_string());
            if let Some(first) = seen.get(&key) {
                warnings.push(format!(
                    "Action {index}: relationship '{}' {} '{}' is already added by action {first}",
                    rel.subject(),
                    rel.predicate,
                    rel.object()
                ));
            } else {
                seen.insert(key, index);
            }
        }
        warnings
    }
}

/// Validate `actions` against `snapshot` with the given id scheme.
pub fn validate_plan(actions: &[Action], snapshot: &Snapshot, scheme: IdScheme) -> PlanValidation {
    Validator::new(snapshot, scheme).validate(actions)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Parent,
    Target,
    NewParent,
    Endpoint,
}

fn references(action: &Action) -> Vec<(Role, Target<'_>)> {
    let refs = match action {
        Action::CreateStructure(c) => vec![(Role::Parent, c.parent())],
        Action::MoveStructure(m) => vec![(Role::Target, m.target()), (Role::NewParent, m.new_parent())],
        Action::DeleteStructure(d) => vec![(Role::Target, d.target())],
        Action::UpdateStructure(u) => vec![(Role::Target, u.target())],
        Action::AddRelationship(r) => vec![(Role::Endpoint, r.subject()), (Role::Endpoint, r.object())],
    };
    refs.into_iter().filter(|(_, t)| !t.is_empty()).collect()
}

fn action_label(action: &Action) -> &'static str {
    match action {
        Action::CreateStructure(_) => "CREATE",
        Action::MoveStructure(_) => "MOVE",
        Action::DeleteStructure(_) => "DELETE",
        Action::UpdateStructure(_) => "UPDATE",
        Action::AddRelationship(_) => "ADD_RELATIONSHIP",
    }
}

/// Does walking up from `start` reach `needle`? Stops on loops.
fn ancestor_chain_contains(parents: &BTreeMap<String, Option<String>>, start: &str, needle: &str) -> bool {
    let mut seen = BTreeSet::new();
    let mut current = Some(start);
    while let Some(id) = current {
        if id == needle {
            return true;
        }
        if !seen.insert(id) {
            return false;
        }
        current = parents.get(id).and_then(|p| p.as_deref());
    }
    false
}

fn capped(names: &[String]) -> String {
    let mut out = names
        .iter()
        .take(DISPLAY_CAP)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if names.len() > DISPLAY_CAP {
        out.push_str("...");
    }
    out
}

#[allow(clippy::ptr_arg)]
fn display_all<S, T>(items: &Vec<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: fmt::Display,
{
    serializer.collect_seq(items.iter().map(ToString::to_string))
}
