//! Integration tests for the complete Anatograph pipeline
//!
//! These tests drive a real on-disk store across crates:
//! - Loader → Hierarchy context
//! - Plan JSON → Validator → Executor → reload
//! - Edits → Consistency audit
//!
//! Run with: cargo test --test integration_tests

use std::fs;
use std::path::Path;

use anatograph_core::{
    apply_plan, audit, validate_against, Action, ActionPlan, ApplyError, CheckName, Depth,
    HierarchyContext, Snapshot,
};
use anatograph_store::{LoadError, Store, Structure};
use tempfile::{tempdir, TempDir};

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, body).unwrap();
}

/// A store with every default partition present, plus `regions` in
/// `structures/body_regions.yaml`.
fn store(regions: &str) -> (Store, TempDir) {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "structures/body_regions.yaml", regions);
    for name in ["muscles", "skeletal", "nerves", "vessels"] {
        write(root, &format!("structures/{name}.yaml"), "structures: []\n");
    }
    for name in ["innervation", "blood_supply", "developmental"] {
        write(root, &format!("relationships/{name}.yaml"), "relationships: []\n");
    }
    (Store::open(root).unwrap(), dir)
}

fn plan(json: &str) -> Vec<Action> {
    ActionPlan::from_json(json).unwrap().actions
}

const EYE: &str = "\
metadata:
  version: 2.1.0
structures:
  - id: BAP_0000010
    name: Eye
    parent: null
  - id: BAP_0000011
    name: Levator palpebrae superioris
    abbreviation: LPS
    parent: BAP_0000010
";

const EAR: &str = "\
structures:
  - id: BAP_0000020
    name: Ear
    parent: null
  - id: BAP_0000021
    name: Stapedius
    parent: BAP_0000020
  - id: BAP_0000022
    name: Tensor tympani
    parent: BAP_0000020
";

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_duplicate_ids_are_reported_and_first_wins() {
    let (store, dir) = store(EAR);
    write(
        dir.path(),
        "structures/zz_extra.yaml",
        "structures:\n  - id: BAP_0000021\n    name: Impostor\n    parent: null\n",
    );

    let loaded = store.load_structures();
    assert_eq!(loaded.records.len(), 3);
    assert_eq!(loaded.records["BAP_0000021"].name, "Stapedius");
    assert!(loaded
        .errors
        .iter()
        .any(|e| matches!(e, LoadError::DuplicateId { id, .. } if id == "BAP_0000021")));

    let report = audit(&store, None);
    assert!(!report.valid());
    assert!(report.issues.iter().any(|i| i.check == "load"));
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_scenario_valid_reorganization() {
    let (store, _dir) = store(EYE);
    let actions = plan(
        r#"{
            "understood": "Group the eye muscles",
            "actions": [
                {"type": "create_structure", "name": "Eye Muscles", "id": "BAP_0000012",
                 "parent_id": "BAP_0000010", "definition": "Extraocular muscle group"},
                {"type": "move_structure", "structure_name": "LPS", "structure_id": "BAP_0000011",
                 "new_parent_id": "BAP_0000012"}
            ],
            "warnings": []
        }"#,
    );

    let validation = validate_against(&store, &actions);
    assert!(validation.valid(), "{:?}", validation.errors());
    assert!(validation
        .warnings()
        .iter()
        .any(|w| w.contains("BAP_0000012")));

    let summary = apply_plan(&store, actions).unwrap();
    assert!(summary.all_succeeded(), "{:?}", summary.outcomes);

    let snap = Snapshot::load(&store);
    assert_eq!(snap.structures["BAP_0000011"].parent.as_deref(), Some("BAP_0000012"));
    assert_eq!(snap.structures["BAP_0000012"].parent.as_deref(), Some("BAP_0000010"));
    assert_eq!(snap.context.depth_of("BAP_0000011"), Some(Depth::Finite(2)));
    // Untouched keys survive the rewrite.
    assert_eq!(snap.structures["BAP_0000011"].abbreviation.as_deref(), Some("LPS"));
}

#[test]
fn test_scenario_blocked_delete() {
    let (store, _dir) = store(EAR);
    let validation = validate_against(&store, &[Action::delete("BAP_0000020")]);
    assert!(!validation.valid());
    let err = &validation.errors()[0];
    assert!(err.contains("Stapedius") && err.contains("Tensor tympani"), "{err}");

    match apply_plan(&store, vec![Action::delete("BAP_0000020")]) {
        Err(ApplyError::Invalid(rejected)) => assert!(!rejected.valid()),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(Snapshot::load(&store).structures.len(), 3);
}

#[test]
fn test_scenario_cycle_rejection() {
    let (store, _dir) = store(
        "structures:\n  - id: BAP_0000001\n    name: A\n    parent: null\n  - id: BAP_0000002\n    name: B\n    parent: BAP_0000001\n",
    );
    let validation = validate_against(&store, &[Action::move_to("BAP_0000001", "BAP_0000002")]);
    assert!(!validation.valid());
    assert!(validation.errors()[0].contains("Circular reference"));
    assert!(validation.errors()[0].contains("'BAP_0000001'"));
}

#[test]
fn test_move_before_create_is_an_ordering_error() {
    let (store, _dir) = store(EYE);
    let create = r#"{"type": "create_structure", "id": "BAP_0000012", "name": "Eye Muscles", "parent_id": "BAP_0000010"}"#;
    let mv = r#"{"type": "move_structure", "structure_id": "BAP_0000011", "new_parent_name": "Eye Muscles"}"#;

    let wrong = validate_against(&store, &plan(&format!("[{mv}, {create}]")));
    assert!(!wrong.valid());
    assert!(wrong.errors().iter().any(|e| e.contains("MOVE before CREATE")));

    let right = validate_against(&store, &plan(&format!("[{create}, {mv}]")));
    assert!(right.valid(), "{:?}", right.errors());
}

#[test]
fn test_delete_after_relocating_children() {
    let (store, _dir) = store(EAR);
    let actions = plan(
        r#"[
            {"type": "create_structure", "id": "BAP_0000023", "name": "Middle ear muscles", "definition": "Muscles of the tympanic cavity"},
            {"type": "move_structure", "structure_name": "Stapedius", "new_parent_id": "BAP_0000023"},
            {"type": "move_structure", "structure_name": "Tensor tympani", "new_parent_id": "BAP_0000023"},
            {"type": "delete_structure", "structure_id": "BAP_0000020", "reason": "regrouped"}
        ]"#,
    );
    let validation = validate_against(&store, &actions);
    assert!(validation.valid(), "{:?}", validation.errors());

    let summary = apply_plan(&store, actions).unwrap();
    assert_eq!(summary.success_count, 4);
    let snap = Snapshot::load(&store);
    assert!(!snap.structures.contains_key("BAP_0000020"));
    assert_eq!(snap.context.roots(), [&"BAP_0000023".to_string()]);
}

#[test]
fn test_cycles_across_several_moves() {
    let (store, _dir) = store(EAR);
    let actions = plan(
        r#"[
            {"type": "create_structure", "id": "BAP_0000023", "name": "Middle ear muscles", "parent_id": "BAP_0000020"},
            {"type": "move_structure", "structure_name": "Stapedius", "new_parent_id": "BAP_0000023"},
            {"type": "move_structure", "structure_id": "BAP_0000023", "new_parent_name": "Stapedius"}
        ]"#,
    );
    // Each move is fine against the stored tree; together they close a loop.
    let validation = validate_against(&store, &actions);
    assert!(!validation.valid());
    assert!(validation.per_action().iter().all(|c| c.safe));
}

#[test]
fn test_reference_after_delete_is_refused_before_writing() {
    let (store, dir) = store(EAR);
    let actions = plan(
        r#"[
            {"type": "delete_structure", "structure_name": "Tensor tympani", "reason": "merged"},
            {"type": "move_structure", "structure_name": "Stapedius", "new_parent_id": "BAP_0000022"}
        ]"#,
    );
    let before = fs::read_to_string(dir.path().join("structures/body_regions.yaml")).unwrap();

    let validation = validate_against(&store, &actions);
    assert!(!validation.valid());
    assert!(validation.errors()[0].contains("after it is deleted (action 0)"));

    assert!(matches!(apply_plan(&store, actions), Err(ApplyError::Invalid(_))));
    let after = fs::read_to_string(dir.path().join("structures/body_regions.yaml")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_plan_cannot_write_outside_the_collection() {
    let (store, dir) = store(EYE);
    let actions = plan(
        r#"[{"type": "create_structure", "id": "BAP_0000012", "name": "Iris", "parent_id": "BAP_0000010",
              "definition": "Pigmented ring", "file": "../relationships/innervation.yaml"}]"#,
    );
    let before = fs::read_to_string(dir.path().join("relationships/innervation.yaml")).unwrap();
    assert!(matches!(apply_plan(&store, actions), Err(ApplyError::Invalid(_))));
    let after = fs::read_to_string(dir.path().join("relationships/innervation.yaml")).unwrap();
    assert_eq!(before, after);
}

// ============================================================================
// Round trip and audit
// ============================================================================

#[test]
fn test_created_structure_round_trips() {
    let (store, _dir) = store(EYE);
    let summary = apply_plan(
        &store,
        plan(
            r#"[{"type": "create_structure", "id": "BAP_0000013", "name": "Oculomotor nerve",
                 "parent_id": "BAP_0000010", "definition": "Third cranial nerve"}]"#,
        ),
    )
    .unwrap();
    assert!(summary.all_succeeded());

    let snap = Snapshot::load(&store);
    let mut expected = Structure::new("BAP_0000013", "Oculomotor nerve", Some("BAP_0000010".into()))
        .with_definition("Third cranial nerve");
    let created = snap.structures["BAP_0000013"].clone();
    expected.source_file = created.source_file.clone();
    assert_eq!(created, expected);
    assert!(created
        .source_file
        .as_deref()
        .is_some_and(|p| p.ends_with("nerves.yaml")));
}

#[test]
fn test_context_is_rebuilt_identically_after_edits() {
    let (store, _dir) = store(EAR);
    apply_plan(&store, vec![Action::move_to("BAP_0000022", "BAP_0000021")]).unwrap();

    let snap = Snapshot::load(&store);
    assert_eq!(HierarchyContext::build(&snap.structures), snap.context);
    assert_eq!(snap.context.descendants_of("BAP_0000020"), ["BAP_0000021", "BAP_0000022"]);

    let report = audit(&store, Some(&[CheckName::CircularReference, CheckName::Orphan].into()));
    assert!(report.valid());
    assert!(report.passes(true));
}
