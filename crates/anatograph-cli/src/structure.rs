//! Single-structure commands: `show`, `deprecate`, `merge`.

use anyhow::{anyhow, Result};
use colored::Colorize;
use serde::Serialize;

use anatograph_core::{deprecate, merge, Depth, Snapshot, StructureSummary};
use anatograph_store::{file_label, Store};

#[derive(Serialize)]
struct ShowOutput<'a> {
    #[serde(flatten)]
    summary: StructureSummary,
    parent_name: Option<&'a str>,
    child_names: Vec<&'a str>,
    relationships: usize,
    file: Option<String>,
    deprecated: bool,
}

pub fn cmd_show(store: &Store, reference: &str, format: &str) -> Result<()> {
    let snapshot = Snapshot::load(store);
    let ctx = &snapshot.context;
    let id = ctx
        .lookup(reference)
        .ok_or_else(|| anyhow!("structure '{reference}' not found"))?;
    let summary = ctx
        .summary(id)
        .ok_or_else(|| anyhow!("structure '{reference}' not found"))?;

    let output = ShowOutput {
        parent_name: ctx.parent_of(id).and_then(|p| ctx.name_of(p)),
        child_names: ctx.children_of(id).iter().map(|c| ctx.display_name(c)).collect(),
        relationships: snapshot.relationships_of(id).count(),
        file: snapshot.source_of(id).map(|p| file_label(p)),
        deprecated: snapshot.structures.get(id).is_some_and(|s| s.deprecated),
        summary,
    };

    match format.trim().to_ascii_lowercase().as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&output)?),
        "text" => print_show(&output),
        other => return Err(anyhow!("unknown --format `{other}` (expected json|text)")),
    }
    Ok(())
}

fn print_show(output: &ShowOutput<'_>) {
    let s = &output.summary;
    println!("{} ({})", s.name.bold(), s.id);
    if output.deprecated {
        println!("  {}", "deprecated".yellow());
    }
    println!("  kind:     {}", s.kind);
    match s.depth {
        Depth::Finite(d) => println!("  depth:    {d}"),
        Depth::Cyclic => println!("  depth:    {}", "cyclic".red()),
    }
    match (&s.parent, output.parent_name) {
        (Some(id), Some(name)) => println!("  parent:   {name} ({id})"),
        (Some(id), None) => println!("  parent:   {} ({id})", "missing".red()),
        (None, _) => println!("  parent:   (root)"),
    }
    println!("  children: {}", s.children);
    for child in &output.child_names {
        println!("    - {child}");
    }
    println!("  relationships: {}", output.relationships);
    if let Some(file) = &output.file {
        println!("  file:     {file}");
    }
}

pub fn cmd_deprecate(store: &Store, reference: &str, reason: &str) -> Result<()> {
    if reason.trim().is_empty() {
        return Err(anyhow!("--reason must not be empty"));
    }
    let done = deprecate(store, reference, reason)?;
    println!(
        "{} '{}' ({}) in {}",
        "✓ deprecated".green().bold(),
        done.name,
        done.id,
        done.file
    );
    Ok(())
}

pub fn cmd_merge(store: &Store, source: &str, target: &str) -> Result<()> {
    let report = merge(store, source, target)?;
    println!(
        "{} {} into {}: {} child(ren) moved, {} relationship(s) retargeted",
        "✓ merged".green().bold(),
        report.source,
        report.target,
        report.children_moved,
        report.relationships_retargeted
    );
    if report.relationships_dropped > 0 {
        println!(
            "  {} {} relationship(s) dropped as self-references or duplicates",
            "⚠".yellow(),
            report.relationships_dropped
        );
    }
    Ok(())
}
