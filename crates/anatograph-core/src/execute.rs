//! Action execution against the on-disk store.
//!
//! Execution is best effort: actions run strictly in plan order, each one
//! against a snapshot reloaded from disk just before it runs, and a failing
//! action is recorded and skipped without stopping the rest. Nothing is
//! retried or rolled back.

use serde::Serialize;

use anatograph_store::{
    check_document_name, DocumentNameError, DocumentStore, Relationship, Store, StoreError,
    Structure,
};

use crate::action::{
    Action, AddRelationship, CreateStructure, DeleteStructure, MoveStructure, Target,
    UpdateStructure,
};
use crate::snapshot::Snapshot;
use crate::validate::{validate_plan, PlanValidation, ValidatedPlan};

/// Why a single action could not be applied.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("{role} '{target}' not found")]
    Unresolved { role: &'static str, target: String },
    #[error("structure {id} already exists")]
    AlreadyExists { id: String },
    #[error("refusing to delete '{name}': it currently has {count} children")]
    DeleteBlocked { name: String, count: usize },
    #[error("moving '{target}' under '{parent}' would create a cycle")]
    WouldCycle { target: String, parent: String },
    #[error("refusing to write to document '{file}': {reason}")]
    InvalidDocument {
        file: String,
        reason: DocumentNameError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ExecuteError {
    /// The point in an action's lifecycle where this error stops it.
    pub fn stage(&self) -> Stage {
        match self {
            ExecuteError::Unresolved { .. } => Stage::ResolvingRefs,
            ExecuteError::Store(StoreError::Write { .. }) => Stage::Persisting,
            _ => Stage::Applying,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ResolvingRefs,
    Applying,
    Persisting,
}

/// Terminal state of one action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionStatus {
    Persisted { detail: String },
    Failed { stage: Stage, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub index: usize,
    pub action: Action,
    #[serde(flatten)]
    pub status: ActionStatus,
}

impl ActionOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, ActionStatus::Persisted { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub success_count: usize,
    pub failure_count: usize,
    pub outcomes: Vec<ActionOutcome>,
}

impl ExecutionSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failure_count == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ActionOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }
}

/// Plan rejected before anything was written.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("plan is invalid ({} error(s)); nothing was applied", .0.errors().len())]
    Invalid(Box<PlanValidation>),
}

/// Applies validated plans to a store.
pub struct Executor<'s, D: DocumentStore> {
    store: &'s Store<D>,
}

impl<'s, D: DocumentStore> Executor<'s, D> {
    pub fn new(store: &'s Store<D>) -> Self {
        Self { store }
    }

    pub fn execute(&self, plan: &ValidatedPlan) -> ExecutionSummary {
        let mut summary = ExecutionSummary::default();
        for (index, action) in plan.actions().iter().enumerate() {
            let status = match self.execute_one(action) {
                Ok(detail) => {
                    tracing::info!(index, action = %action, %detail, "action persisted");
                    summary.success_count += 1;
                    ActionStatus::Persisted { detail }
                }
                Err(err) => {
                    let stage = err.stage();
                    tracing::warn!(index, action = %action, ?stage, error = %err, "action failed");
                    summary.failure_count += 1;
                    ActionStatus::Failed {
                        stage,
                        reason: err.to_string(),
                    }
                }
            };
            summary.outcomes.push(ActionOutcome {
                index,
                action: action.clone(),
                status,
            });
        }
        summary
    }

    /// Run one action against a snapshot reloaded from disk for it alone.
    pub fn execute_one(&self, action: &Action) -> Result<String, ExecuteError> {
        let snapshot = Snapshot::load(self.store);
        match action {
            Action::CreateStructure(create) => self.create(create, &snapshot),
            Action::MoveStructure(mv) => self.move_structure(mv, &snapshot),
            Action::DeleteStructure(delete) => self.delete(delete, &snapshot),
            Action::UpdateStructure(update) => self.update(update, &snapshot),
            Action::AddRelationship(rel) => self.relate(rel, &snapshot),
        }
    }

    fn create(&self, create: &CreateStructure, snap: &Snapshot) -> Result<String, ExecuteError> {
        let id = create.id.trim();
        if snap.context.contains(id) {
            return Err(ExecuteError::AlreadyExists { id: id.to_string() });
        }
        let parent = create.parent();
        let parent_id = if parent.is_empty() {
            None
        } else {
            Some(resolve(parent, "parent", snap)?)
        };

        let file = create.document(self.store.config());
        check_document_name(&file).map_err(|reason| ExecuteError::InvalidDocument {
            file: file.clone(),
            reason,
        })?;
        let path = self.store.structure_document(&file);

        let mut structure = Structure::new(id, create.name.trim(), parent_id);
        structure.definition = create
            .definition
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        self.store.append_structure(&path, &structure)?;
        Ok(format!("created '{}' ({}) in {}", structure.name, id, file))
    }

    fn move_structure(&self, mv: &MoveStructure, snap: &Snapshot) -> Result<String, ExecuteError> {
        let target = resolve(mv.target(), "structure", snap)?;
        let parent = resolve(mv.new_parent(), "new parent", snap)?;
        let ctx = &snap.context;
        if target == parent || ctx.is_descendant(&parent, &target) {
            return Err(ExecuteError::WouldCycle {
                target: ctx.display_name(&target).to_string(),
                parent: ctx.display_name(&parent).to_string(),
            });
        }
        let old_parent = ctx.parent_of(&target).cloned();
        self.store.set_parent(&target, Some(&parent))?;
        Ok(format!(
            "moved '{}' from {} to '{}'",
            ctx.display_name(&target),
            old_parent
                .map(|p| format!("'{}'", ctx.display_name(&p)))
                .unwrap_or_else(|| "root".to_string()),
            ctx.display_name(&parent)
        ))
    }

    fn delete(&self, delete: &DeleteStructure, fresh: &Snapshot) -> Result<String, ExecuteError> {
        // Children may have changed since validation: the check below runs on
        // the snapshot loaded for this action, not the plan's.
        let target = resolve(delete.target(), "structure", fresh)?;
        tracing::debug!(id = %target, structures = fresh.structures.len(), "re-checking children before delete");
        let name = fresh.context.display_name(&target).to_string();
        let children = fresh.context.children_of(&target);
        if !children.is_empty() {
            return Err(ExecuteError::DeleteBlocked {
                name,
                count: children.len(),
            });
        }

        self.store.remove_structure(&target)?;
        let mut detail = format!("deleted '{name}' ({target})");
        if self.store.config().cascade_relationship_delete {
            let removed = self.store.remove_relationships_involving(&target)?;
            if removed > 0 {
                detail.push_str(&format!("; removed {removed} relationship(s)"));
            }
        }
        if let Some(reason) = delete.reason.as_deref().filter(|r| !r.trim().is_empty()) {
            detail.push_str(&format!("; reason: {reason}"));
        }
        Ok(detail)
    }

    fn update(&self, update: &UpdateStructure, snap: &Snapshot) -> Result<String, ExecuteError> {
        let target = resolve(update.target(), "structure", snap)?;
        if update.changes.is_empty() {
            return Ok(format!("nothing to update on '{}'", snap.context.display_name(&target)));
        }
        self.store.update_structure(&target, &update.changes)?;
        let fields: Vec<&str> = update.changes.entries().iter().map(|(k, _)| *k).collect();
        Ok(format!(
            "updated '{}' ({})",
            snap.context.display_name(&target),
            fields.join(", ")
        ))
    }

    fn relate(&self, rel: &AddRelationship, snap: &Snapshot) -> Result<String, ExecuteError> {
        let subject = resolve(rel.subject(), "subject", snap)?;
        let object = resolve(rel.object(), "object", snap)?;
        let label = format!(
            "'{}' {} '{}'",
            snap.context.display_name(&subject),
            rel.predicate,
            snap.context.display_name(&object)
        );
        if snap.has_relationship(&subject, &rel.predicate, &object) {
            return Ok(format!("relationship {label} already present"));
        }

        let file = rel.document(self.store.config()).to_string();
        check_document_name(&file).map_err(|reason| ExecuteError::InvalidDocument {
            file: file.clone(),
            reason,
        })?;
        let path = self.store.relationship_document(&file);
        let mut record = Relationship::new(subject, rel.predicate.clone(), object);
        record.confidence = rel.confidence.clone();
        record.references = rel.references.clone();
        record.notes = rel.notes.clone();
        self.store.append_relationship(&path, &record)?;
        Ok(format!("added relationship {label} to {file}"))
    }
}

fn resolve(target: Target<'_>, role: &'static str, snap: &Snapshot) -> Result<String, ExecuteError> {
    target
        .resolve(&snap.context)
        .ok_or_else(|| ExecuteError::Unresolved {
            role,
            target: target.label().to_string(),
        })
}

/// Validate `actions` against the current store and, only if the plan is
/// valid, execute it.
pub fn apply_plan<D: DocumentStore>(
    store: &Store<D>,
    actions: Vec<Action>,
) -> Result<ExecutionSummary, ApplyError> {
    let snapshot = Snapshot::load(store);
    let validation = validate_plan(&actions, &snapshot, store.id_scheme());
    let plan = validation
        .into_validated()
        .map_err(|v| ApplyError::Invalid(Box::new(v)))?;
    Ok(Executor::new(store).execute(&plan))
}
