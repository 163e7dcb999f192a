//! `anatograph check`: whole-store consistency audit.

use anyhow::{anyhow, Result};
use colored::Colorize;
use std::collections::BTreeSet;
use std::path::PathBuf;

use anatograph_core::{audit, CheckName, ConsistencyReport};
use anatograph_store::Store;

/// Issues listed per check in text output.
const TEXT_LIMIT: usize = 20;

pub fn cmd_check(
    store: &Store,
    only: &[CheckName],
    format: &str,
    out: Option<&PathBuf>,
    strict: bool,
    no_fail: bool,
) -> Result<()> {
    let format = format.trim().to_ascii_lowercase();
    if !matches!(format.as_str(), "json" | "text") {
        return Err(anyhow!("unknown --format `{format}` (expected json|text)"));
    }

    let selected: BTreeSet<CheckName> = only.iter().copied().collect();
    let report = audit(store, (!selected.is_empty()).then_some(&selected));

    let rendered = match format.as_str() {
        "json" => serde_json::to_string_pretty(&report)?,
        _ => report.render_text(TEXT_LIMIT),
    };
    match out {
        Some(path) => {
            std::fs::write(path, &rendered)?;
            println!("wrote {}", path.display());
        }
        None => println!("{rendered}"),
    }
    if format == "text" || out.is_some() {
        print_verdict(&report, strict);
    }

    if !report.passes(strict) && !no_fail {
        return Err(anyhow!(
            "consistency checks found {} error(s) and {} warning(s)",
            report.stats.errors,
            report.stats.warnings
        ));
    }
    Ok(())
}

/// One coloured status line for humans.
pub fn print_verdict(report: &ConsistencyReport, strict: bool) {
    let s = &report.stats;
    if report.passes(strict) {
        println!(
            "{} {} structures, {} relationships ({} warning(s), {} info)",
            "✓ consistent:".green().bold(),
            s.total_structures,
            s.total_relationships,
            s.warnings,
            s.info
        );
    } else {
        println!(
            "{} {} error(s), {} warning(s){}",
            "✗ inconsistent:".red().bold(),
            s.errors,
            s.warnings,
            if strict { " (strict)" } else { "" }
        );
    }
}
