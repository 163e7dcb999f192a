//! Plan commands: validate, apply, single moves and lateralization plans.

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

use anatograph_core::{
    audit, plan_lateralization, validate_against, Action, ActionPlan, ActionStatus,
    ExecutionSummary, Executor, LateralizationPolicy, MoveStructure, PlanValidation, Snapshot,
};
use anatograph_store::Store;

use crate::check::print_verdict;

fn read_plan(input: &Path) -> Result<ActionPlan> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("reading plan {}", input.display()))?;
    let plan = ActionPlan::from_json(&text).with_context(|| format!("parsing plan {}", input.display()))?;
    tracing::info!(path = %input.display(), actions = plan.actions.len(), "loaded plan");
    Ok(plan)
}

fn check_format(format: &str) -> Result<String> {
    let format = format.trim().to_ascii_lowercase();
    match format.as_str() {
        "json" | "text" => Ok(format),
        other => Err(anyhow!("unknown --format `{other}` (expected json|text)")),
    }
}

pub fn cmd_validate(store: &Store, input: &PathBuf, format: &str) -> Result<()> {
    let format = check_format(format)?;
    let plan = read_plan(input)?;
    let validation = validate_against(store, &plan.actions);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&validation)?);
    } else {
        print_plan_header(&plan);
        print_validation(&validation);
    }
    if !validation.valid() {
        return Err(anyhow!("plan has {} error(s)", validation.errors().len()));
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyOutput<'a> {
    validation: &'a PlanValidation,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution: Option<&'a ExecutionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audit: Option<&'a anatograph_core::ConsistencyReport>,
}

pub fn cmd_apply(store: &Store, input: &PathBuf, format: &str, skip_audit: bool) -> Result<()> {
    let format = check_format(format)?;
    let plan = read_plan(input)?;
    let text = format == "text";

    if text {
        print_plan_header(&plan);
    }
    let validation = validate_against(store, &plan.actions);
    if text {
        print_validation(&validation);
    }
    let validated = match validation.clone().into_validated() {
        Ok(validated) => validated,
        Err(rejected) => {
            if !text {
                let output = ApplyOutput {
                    validation: &rejected,
                    execution: None,
                    audit: None,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            return Err(anyhow!(
                "plan has {} error(s); nothing was applied",
                rejected.errors().len()
            ));
        }
    };

    let summary = Executor::new(store).execute(&validated);
    if text {
        print_summary(&summary);
    }

    let report = (!skip_audit).then(|| audit(store, None));
    if text {
        if let Some(report) = &report {
            println!();
            print_verdict(report, false);
        }
    } else {
        let output = ApplyOutput {
            validation: &validation,
            execution: Some(&summary),
            audit: report.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    if !summary.all_succeeded() {
        return Err(anyhow!(
            "{} of {} action(s) failed",
            summary.failure_count,
            summary.outcomes.len()
        ));
    }
    Ok(())
}

pub fn cmd_move(store: &Store, structure: &str, new_parent: &str, dry_run: bool) -> Result<()> {
    let snapshot = Snapshot::load(store);
    let action = Action::MoveStructure(reference_move(&snapshot, structure, new_parent));
    let validation = validate_against(store, std::slice::from_ref(&action));
    print_validation(&validation);

    let validated = validation
        .into_validated()
        .map_err(|v| anyhow!("move rejected: {}", v.errors().join("; ")))?;
    if dry_run {
        println!("{}", "dry run: nothing written".dimmed());
        return Ok(());
    }
    let summary = Executor::new(store).execute(&validated);
    print_summary(&summary);
    if !summary.all_succeeded() {
        return Err(anyhow!("move failed"));
    }
    Ok(())
}

/// Free-form arguments become ids when they match one, names otherwise.
fn reference_move(snapshot: &Snapshot, structure: &str, new_parent: &str) -> MoveStructure {
    let split = |reference: &str| match snapshot.context.lookup(reference) {
        Some(id) => (Some(id.clone()), None),
        None => (None, Some(reference.trim().to_string())),
    };
    let (structure_id, structure_name) = split(structure);
    let (new_parent_id, new_parent_name) = split(new_parent);
    MoveStructure {
        structure_id,
        structure_name,
        new_parent_id,
        new_parent_name,
    }
}

pub fn cmd_lateralize(store: &Store, out: &PathBuf, policy: LateralizationPolicy) -> Result<()> {
    let snapshot = Snapshot::load(store);
    let plan = plan_lateralization(&snapshot, store.config(), policy);
    let validation = anatograph_core::validate_plan(&plan.actions, &snapshot, store.id_scheme());
    if !validation.valid() {
        for err in validation.errors() {
            eprintln!("  {} {err}", "✗".red());
        }
        return Err(anyhow!("generated lateralization plan does not validate"));
    }

    std::fs::write(out, serde_json::to_string_pretty(&plan)?)
        .with_context(|| format!("writing {}", out.display()))?;
    println!(
        "{} {} action(s) ({}) to {}",
        "✓ wrote".green().bold(),
        plan.actions.len(),
        plan.understood.as_deref().unwrap_or("lateralization"),
        out.display()
    );
    for warning in &plan.warnings {
        println!("  {} {warning}", "⚠".yellow());
    }
    println!("apply with: anatograph plan apply {}", out.display());
    Ok(())
}

// ============================================================================
// Rendering
// ============================================================================

fn print_plan_header(plan: &ActionPlan) {
    if let Some(understood) = &plan.understood {
        println!("{} {understood}", "Plan:".bold());
    }
    for warning in &plan.warnings {
        println!("  {} {warning}", "note:".yellow());
    }
}

fn print_validation(validation: &PlanValidation) {
    println!("Validating {} action(s)...", validation.per_action().len());
    let mut per_action_warnings = 0;
    for check in validation.per_action() {
        let mark = if check.safe { "✓".green() } else { "✗".red() };
        println!("  [{}] {mark} {}", check.index, check.action);
        for err in &check.errors {
            println!("        {} {err}", "error:".red());
        }
        for warning in &check.warnings {
            println!("        {} {warning}", "warning:".yellow());
        }
        per_action_warnings += check.warnings.len();
    }
    for err in validation.plan_errors() {
        println!("  {} {err}", "✗".red());
    }
    for warning in validation.warnings().iter().skip(per_action_warnings) {
        println!("  {} {warning}", "⚠".yellow());
    }

    if validation.valid() {
        println!(
            "{} ({} warning(s))",
            "✓ plan is valid".green().bold(),
            validation.warnings().len()
        );
    } else {
        println!(
            "{} {} error(s), {} warning(s)",
            "✗ plan is invalid:".red().bold(),
            validation.errors().len(),
            validation.warnings().len()
        );
    }
}

fn print_summary(summary: &ExecutionSummary) {
    println!();
    for outcome in &summary.outcomes {
        match &outcome.status {
            ActionStatus::Persisted { detail } => {
                println!("  [{}] {} {detail}", outcome.index, "✓".green());
            }
            ActionStatus::Failed { stage, reason } => {
                println!(
                    "  [{}] {} {} ({stage:?}): {reason}",
                    outcome.index,
                    "✗".red(),
                    outcome.action
                );
            }
        }
    }
    let line = format!(
        "{} succeeded, {} failed",
        summary.success_count, summary.failure_count
    );
    if summary.all_succeeded() {
        println!("{}", line.green().bold());
    } else {
        println!("{}", line.red().bold());
    }
}
