//! Anatograph CLI
//!
//! Command-line interface for an anatomy ontology stored as YAML documents:
//! - Auditing the store for hierarchy and reference problems (`check`)
//! - Validating and applying JSON action plans (`plan validate|apply`, `move`)
//! - Generating lateralization plans (`lateralize`)
//! - Retiring structures (`deprecate`, `merge`) and inspecting them (`show`)
//!
//! Every write goes through the same validate-then-apply gate; nothing is
//! written when a plan has errors.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use anatograph_core::{CheckName, LateralizationPolicy};
use anatograph_store::{Store, StoreConfig};

mod check;
mod plan;
mod structure;

#[derive(Parser)]
#[command(name = "anatograph")]
#[command(author, version, about = "Anatograph: safe edits and audits for an anatomy ontology")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Store root (contains `structures/` and `relationships/`).
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// Store config file (defaults to `<root>/anatograph.yaml` when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// More log output on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run consistency checks over the whole store.
    ///
    /// Exits non-zero when errors are found (or warnings, with `--strict`)
    /// unless `--no-fail` is set.
    Check {
        /// Only run these checks (repeatable).
        #[arg(long = "only")]
        only: Vec<CheckName>,
        /// Output format: text|json
        #[arg(long, default_value = "text")]
        format: String,
        /// Output report path (defaults to stdout).
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Treat warnings as failures.
        #[arg(long)]
        strict: bool,
        /// Always exit 0.
        #[arg(long)]
        no_fail: bool,
    },

    /// Validate or apply an action plan.
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },

    /// Move a structure under a new parent.
    Move {
        /// Structure id or name.
        structure: String,
        /// New parent id or name.
        new_parent: String,
        /// Validate only; do not write.
        #[arg(long)]
        dry_run: bool,
    },

    /// Write a plan that splits bilateral leaf structures into (L)/(R).
    Lateralize {
        /// Plan output path.
        #[arg(short, long)]
        out: PathBuf,
        /// keep-as-parent|replace|by-relationships
        #[arg(long, default_value = "by-relationships")]
        policy: LateralizationPolicy,
    },

    /// Soft-delete a structure (keeps the record, marks it deprecated).
    Deprecate {
        /// Structure id or name.
        structure: String,
        #[arg(long)]
        reason: String,
    },

    /// Merge one structure into another, moving its children and relationships.
    Merge {
        /// Structure to remove.
        source: String,
        /// Structure that absorbs it.
        target: String,
    },

    /// Show a structure's place in the hierarchy.
    Show {
        /// Structure id or name.
        structure: String,
        /// Output format: text|json
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Check a plan against the current store without writing.
    Validate {
        /// Plan JSON file.
        input: PathBuf,
        /// Output format: text|json
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Validate, then apply a plan and audit the result.
    Apply {
        /// Plan JSON file.
        input: PathBuf,
        /// Output format: text|json
        #[arg(long, default_value = "text")]
        format: String,
        /// Skip the post-apply consistency audit.
        #[arg(long)]
        skip_audit: bool,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(global: &GlobalArgs) -> Result<Store> {
    let store = match &global.config {
        Some(path) => {
            let config = StoreConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            Store::with_config(&global.root, config)
        }
        None => Store::open(&global.root)
            .with_context(|| format!("opening store at {}", global.root.display()))?,
    };
    tracing::debug!(root = %store.root().display(), "opened store");
    Ok(store)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);
    let store = open_store(&cli.global)?;

    match cli.command {
        Commands::Check {
            only,
            format,
            out,
            strict,
            no_fail,
        } => check::cmd_check(&store, &only, &format, out.as_ref(), strict, no_fail),
        Commands::Plan { command } => match command {
            PlanCommands::Validate { input, format } => plan::cmd_validate(&store, &input, &format),
            PlanCommands::Apply {
                input,
                format,
                skip_audit,
            } => plan::cmd_apply(&store, &input, &format, skip_audit),
        },
        Commands::Move {
            structure,
            new_parent,
            dry_run,
        } => plan::cmd_move(&store, &structure, &new_parent, dry_run),
        Commands::Lateralize { out, policy } => plan::cmd_lateralize(&store, &out, policy),
        Commands::Deprecate { structure, reason } => {
            structure::cmd_deprecate(&store, &structure, &reason)
        }
        Commands::Merge { source, target } => structure::cmd_merge(&store, &source, &target),
        Commands::Show { structure, format } => structure::cmd_show(&store, &structure, &format),
    }
}
