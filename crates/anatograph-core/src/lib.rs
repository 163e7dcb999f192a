//! Anatograph core: hierarchy reasoning and safe edits over a document store.
//!
//! The pieces, in the order a change flows through them:
//!
//! - [`snapshot`] / [`context`]: load the store and derive parent/children
//!   maps, depths, kinds and a name index. Derived views are rebuilt on
//!   demand and never cached across writes.
//! - [`action`]: the proposed mutations and the JSON plan formats.
//! - [`validate`]: per-action and plan-level integrity checks. A plan that
//!   passes becomes a [`ValidatedPlan`], the only thing the executor accepts.
//! - [`execute`]: applies a validated plan in order, best effort, with a fresh
//!   snapshot per action.
//! - [`checks`]: whole-store consistency audit, independent of any plan.
//! - [`lateralize`] and [`retire`]: higher-level operations built on the above.

pub mod action;
pub mod checks;
pub mod classify;
pub mod context;
pub mod execute;
pub mod lateralize;
pub mod retire;
pub mod snapshot;
pub mod validate;

#[cfg(test)]
mod test_support;

pub use action::{
    Action, ActionPlan, AddRelationship, CreateStructure, DeleteStructure, MoveStructure,
    PlanFormatError, Target, UpdateStructure,
};
pub use checks::{run_checks, CheckName, ConsistencyReport, Issue, ReportStats, Severity};
pub use classify::{classify, classify_text};
pub use context::{Depth, HierarchyContext, StructureSummary};
pub use execute::{
    apply_plan, ActionOutcome, ActionStatus, ApplyError, ExecuteError, ExecutionSummary, Executor,
    Stage,
};
pub use lateralize::{plan_lateralization, LateralizationPolicy, Lateralizer};
pub use retire::{deprecate, merge, Deprecation, MergeReport, RetireError};
pub use snapshot::{Layout, Snapshot};
pub use validate::{
    validate_plan, ActionCheck, ActionError, ActionWarning, PlanError, PlanValidation,
    ValidatedPlan, Validator,
};

use anatograph_store::{DocumentStore, Store};
use std::collections::BTreeSet;

/// Load `store` and run the selected consistency checks (all when `None`).
pub fn audit<D: DocumentStore>(
    store: &Store<D>,
    selected: Option<&BTreeSet<CheckName>>,
) -> ConsistencyReport {
    let snapshot = Snapshot::load(store);
    let report = run_checks(&snapshot, selected, &store.id_scheme());
    tracing::info!(
        structures = report.stats.total_structures,
        relationships = report.stats.total_relationships,
        errors = report.stats.errors,
        warnings = report.stats.warnings,
        "audit finished"
    );
    report
}

/// Validate `actions` against the current contents of `store`.
pub fn validate_against<D: DocumentStore>(store: &Store<D>, actions: &[Action]) -> PlanValidation {
    let snapshot = Snapshot::load(store);
    for err in &snapshot.load_errors {
        tracing::warn!(error = %err, "load problem while validating plan");
    }
    validate_plan(actions, &snapshot, store.id_scheme())
}
