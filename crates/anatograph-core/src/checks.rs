//! Global consistency checks over a store snapshot.
//!
//! This is the batch auditor: it is not tied to any plan, it never writes, and
//! running it twice on the same snapshot yields the same report. Each check is
//! an independent function over the snapshot; callers pick which ones run.
//!
//! Load problems are folded into the report under the `load` check so a
//! broken document fails an audit the same way a broken record does.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use anatograph_store::{file_label, IdScheme, LoadSeverity, Structure};

use crate::snapshot::Snapshot;

/// Check name used for issues that come from loading, not from a check.
pub const LOAD_CHECK: &str = "load";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    Orphan,
    CircularReference,
    DuplicateName,
    BrokenRelationship,
    MissingDefinition,
    Unused,
    NoRelationships,
    DuplicateRelationship,
    DataQuality,
}

impl CheckName {
    pub const ALL: [CheckName; 9] = [
        CheckName::Orphan,
        CheckName::CircularReference,
        CheckName::DuplicateName,
        CheckName::BrokenRelationship,
        CheckName::MissingDefinition,
        CheckName::Unused,
        CheckName::NoRelationships,
        CheckName::DuplicateRelationship,
        CheckName::DataQuality,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CheckName::Orphan => "orphan",
            CheckName::CircularReference => "circular_reference",
            CheckName::DuplicateName => "duplicate_name",
            CheckName::BrokenRelationship => "broken_relationship",
            CheckName::MissingDefinition => "missing_definition",
            CheckName::Unused => "unused",
            CheckName::NoRelationships => "no_relationships",
            CheckName::DuplicateRelationship => "duplicate_relationship",
            CheckName::DataQuality => "data_quality",
        }
    }
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        CheckName::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = CheckName::ALL.iter().map(|c| c.as_str()).collect();
                format!("unknown check `{s}` (expected one of: {})", known.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl From<LoadSeverity> for Severity {
    fn from(value: LoadSeverity) -> Self {
        match value {
            LoadSeverity::Error => Severity::Error,
            LoadSeverity::Warning => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub check: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Issue {
    fn new(severity: Severity, check: CheckName, message: impl Into<String>) -> Self {
        Self {
            severity,
            check: check.as_str().to_string(),
            structure: None,
            id: None,
            message: message.into(),
            file: None,
        }
    }

    fn about(mut self, structure: &Structure) -> Self {
        self.structure = Some(structure.name.clone());
        self.id = Some(structure.id.clone());
        self.file = structure.source_file.as_deref().map(file_label);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportStats {
    pub total_structures: usize,
    pub total_relationships: usize,
    pub root_structures: usize,
    pub total_issues: usize,
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub issues: Vec<Issue>,
    pub stats: ReportStats,
}

impl ConsistencyReport {
    /// No errors (warnings and info allowed).
    pub fn valid(&self) -> bool {
        self.stats.errors == 0
    }

    /// In strict mode warnings fail too.
    pub fn passes(&self, strict: bool) -> bool {
        self.valid() && (!strict || self.stats.warnings == 0)
    }

    pub fn issues_of(&self, check: CheckName) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.check == check.as_str())
    }

    /// Plain-text rendering, grouped by check, at most `per_check` lines each.
    pub fn render_text(&self, per_check: usize) -> String {
        let s = &self.stats;
        let mut out = String::new();
        out.push_str("Consistency report\n");
        out.push_str(&format!(
            "Scanned: {} structures ({} roots), {} relationships\n",
            s.total_structures, s.root_structures, s.total_relationships
        ));
        if s.total_issues == 0 {
            out.push_str("No issues found.\n");
            return out;
        }
        out.push_str(&format!(
            "Found {} issues: {} error(s), {} warning(s), {} info\n",
            s.total_issues, s.errors, s.warnings, s.info
        ));

        let mut groups: BTreeMap<&str, Vec<&Issue>> = BTreeMap::new();
        for issue in &self.issues {
            groups.entry(issue.check.as_str()).or_default().push(issue);
        }
        for (check, issues) in groups {
            out.push_str(&format!("\n{} ({})\n", check, issues.len()));
            for issue in issues.iter().take(per_check) {
                out.push_str(&format!("  [{}] ", issue.severity.as_str()));
                if let (Some(name), Some(id)) = (&issue.structure, &issue.id) {
                    out.push_str(&format!("{name} ({id}): "));
                }
                out.push_str(&issue.message);
                if let Some(file) = &issue.file {
                    out.push_str(&format!("  [{file}]"));
                }
                out.push('\n');
            }
            if issues.len() > per_check {
                out.push_str(&format!("  ...and {} more\n", issues.len() - per_check));
            }
        }
        out
    }
}

// ============================================================================
// Checks
// ============================================================================

/// Run the selected checks (all when `selected` is `None`) over `snapshot`.
pub fn run_checks(
    snapshot: &Snapshot,
    selected: Option<&BTreeSet<CheckName>>,
    scheme: &IdScheme,
) -> ConsistencyReport {
    let mut issues: Vec<Issue> = snapshot
        .load_errors
        .iter()
        .map(|err| Issue {
            severity: err.severity().into(),
            check: LOAD_CHECK.to_string(),
            structure: None,
            id: None,
            message: err.to_string(),
            file: Some(file_label(err.path())),
        })
        .collect();

    for check in CheckName::ALL {
        if selected.map_or(true, |s| s.contains(&check)) {
            let found = run_check(check, snapshot, scheme);
            tracing::debug!(check = %check, issues = found.len(), "check finished");
            issues.extend(found);
        }
    }

    let count = |sev: Severity| issues.iter().filter(|i| i.severity == sev).count();
    let stats = ReportStats {
        total_structures: snapshot.structures.len(),
        total_relationships: snapshot.relationships.len(),
        root_structures: snapshot.context.roots().len(),
        total_issues: issues.len(),
        errors: count(Severity::Error),
        warnings: count(Severity::Warning),
        info: count(Severity::Info),
    };
    ConsistencyReport { issues, stats }
}

pub fn run_check(check: CheckName, snapshot: &Snapshot, scheme: &IdScheme) -> Vec<Issue> {
    match check {
        CheckName::Orphan => orphans(snapshot),
        CheckName::CircularReference => cycles(snapshot),
        CheckName::DuplicateName => duplicate_names(snapshot),
        CheckName::BrokenRelationship => broken_relationships(snapshot),
        CheckName::MissingDefinition => missing_definitions(snapshot),
        CheckName::Unused => unused(snapshot),
        CheckName::NoRelationships => no_relationships(snapshot),
        CheckName::DuplicateRelationship => duplicate_relationships(snapshot),
        CheckName::DataQuality => data_quality(snapshot, scheme),
    }
}

fn orphans(snap: &Snapshot) -> Vec<Issue> {
    snap.structures
        .values()
        .filter_map(|s| {
            let parent = s.parent.as_deref().filter(|p| !p.trim().is_empty())?;
            (!snap.structures.contains_key(parent)).then(|| {
                Issue::new(
                    Severity::Error,
                    CheckName::Orphan,
                    format!("Parent '{parent}' not found"),
                )
                .about(s)
            })
        })
        .collect()
}

/// Each distinct cycle once, as the full path by name.
fn cycles(snap: &Snapshot) -> Vec<Issue> {
    let ctx = &snap.context;
    let mut seen: BTreeSet<Vec<String>> = BTreeSet::new();
    let mut issues = Vec::new();

    for start in ctx.ids() {
        let mut path: Vec<&str> = Vec::new();
        let mut position: BTreeMap<&str, usize> = BTreeMap::new();
        let mut current = Some(start.as_str());
        while let Some(id) = current {
            if let Some(&at) = position.get(id) {
                let cycle = &path[at..];
                // Rotate to the smallest id so every entry point agrees.
                let pivot = cycle
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, id)| **id)
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                let canonical: Vec<String> = cycle[pivot..]
                    .iter()
                    .chain(&cycle[..pivot])
                    .map(|id| id.to_string())
                    .collect();
                if seen.insert(canonical.clone()) {
                    let mut names: Vec<&str> = canonical.iter().map(|id| ctx.display_name(id)).collect();
                    names.push(ctx.display_name(&canonical[0]));
                    let mut issue = Issue::new(
                        Severity::Error,
                        CheckName::CircularReference,
                        format!("Cycle detected: {}", names.join(" -> ")),
                    );
                    if let Some(s) = snap.structures.get(&canonical[0]) {
                        issue = issue.about(s);
                    }
                    issues.push(issue);
                }
                break;
            }
            position.insert(id, path.len());
            path.push(id);
            current = ctx.parent_of(id).map(String::as_str).filter(|p| ctx.contains(p));
        }
    }
    issues
}

fn duplicate_names(snap: &Snapshot) -> Vec<Issue> {
    let mut by_name: BTreeMap<String, Vec<&Structure>> = BTreeMap::new();
    for s in snap.structures.values() {
        if !s.name.trim().is_empty() {
            by_name.entry(s.name.trim().to_lowercase()).or_default().push(s);
        }
    }
    by_name
        .values()
        .filter(|group| group.len() > 1)
        .map(|group| {
            let ids: Vec<&str> = group.iter().map(|s| s.id.as_str()).collect();
            Issue::new(
                Severity::Warning,
                CheckName::DuplicateName,
                format!("Name appears {} times: {}", group.len(), ids.join(", ")),
            )
            .about(group[0])
        })
        .collect()
}

fn broken_relationships(snap: &Snapshot) -> Vec<Issue> {
    let mut issues = Vec::new();
    for rel in &snap.relationships {
        for (role, id) in [("Subject", &rel.subject), ("Object", &rel.object)] {
            if !snap.structures.contains_key(id) {
                let mut issue = Issue::new(
                    Severity::Error,
                    CheckName::BrokenRelationship,
                    format!("{role} '{id}' not found in structures ({} {} {})", rel.subject, rel.predicate, rel.object),
                );
                issue.id = Some(id.clone());
                issue.file = rel.source_file.as_deref().map(file_label);
                issues.push(issue);
            }
        }
    }
    issues
}

fn missing_definitions(snap: &Snapshot) -> Vec<Issue> {
    snap.structures
        .values()
        .filter(|s| !s.deprecated && s.definition_text().is_none())
        .map(|s| Issue::new(Severity::Warning, CheckName::MissingDefinition, "No definition provided").about(s))
        .collect()
}

fn related_ids(snap: &Snapshot) -> BTreeSet<&str> {
    snap.relationships
        .iter()
        .flat_map(|r| [r.subject.as_str(), r.object.as_str()])
        .collect()
}

fn unused(snap: &Snapshot) -> Vec<Issue> {
    let related = related_ids(snap);
    snap.structures
        .values()
        .filter(|s| !s.deprecated && snap.context.is_leaf(&s.id) && !related.contains(s.id.as_str()))
        .map(|s| {
            Issue::new(
                Severity::Info,
                CheckName::Unused,
                "Structure has no children and no relationships",
            )
            .about(s)
        })
        .collect()
}

fn no_relationships(snap: &Snapshot) -> Vec<Issue> {
    let related = related_ids(snap);
    snap.structures
        .values()
        .filter(|s| !s.deprecated && !related.contains(s.id.as_str()))
        .map(|s| Issue::new(Severity::Info, CheckName::NoRelationships, "Structure has no relationships").about(s))
        .collect()
}

fn duplicate_relationships(snap: &Snapshot) -> Vec<Issue> {
    let mut seen = BTreeSet::new();
    let mut issues = Vec::new();
    for rel in &snap.relationships {
        if !seen.insert((&rel.subject, &rel.predicate, &rel.object)) {
            let mut issue = Issue::new(
                Severity::Warning,
                CheckName::DuplicateRelationship,
                format!("Duplicate relationship: {} {} {}", rel.subject, rel.predicate, rel.object),
            );
            issue.file = rel.source_file.as_deref().map(file_label);
            issues.push(issue);
        }
    }
    issues
}

const SHORT_NAME: usize = 3;
const LONG_ABBREVIATION: usize = 15;

fn data_quality(snap: &Snapshot, scheme: &IdScheme) -> Vec<Issue> {
    let mut issues = Vec::new();
    for s in snap.structures.values() {
        let name = s.name.trim();
        if name.is_empty() {
            issues.push(
                Issue::new(
                    Severity::Error,
                    CheckName::DataQuality,
                    format!("Structure {} is missing a name", s.id),
                )
                .about(s),
            );
        } else if name.chars().count() < SHORT_NAME {
            issues.push(
                Issue::new(Severity::Warning, CheckName::DataQuality, format!("Very short name: '{name}'")).about(s),
            );
        }
        if let Some(abbrev) = s.abbreviation.as_deref() {
            let len = abbrev.chars().count();
            if len > LONG_ABBREVIATION {
                issues.push(
                    Issue::new(
                        Severity::Warning,
                        CheckName::DataQuality,
                        format!("Long abbreviation ({len} chars)"),
                    )
                    .about(s),
                );
            }
        }
        if !scheme.is_conforming(&s.id) {
            issues.push(
                Issue::new(Severity::Warning, CheckName::DataQuality, format!("Non-standard ID format: {}", s.id))
                    .about(s),
            );
        }
    }
    issues
}
