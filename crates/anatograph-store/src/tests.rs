//! End-to-end tests for the document store

use super::*;
use std::fs;
use tempfile::tempdir;

/// Helper to create a store with the given documents
fn test_store(structures: &[(&str, &str)], relationships: &[(&str, &str)]) -> (Store, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let sdir = dir.path().join("structures");
    let rdir = dir.path().join("relationships");
    fs::create_dir_all(&sdir).unwrap();
    fs::create_dir_all(&rdir).unwrap();
    for (name, body) in structures {
        fs::write(sdir.join(name), body).unwrap();
    }
    for (name, body) in relationships {
        fs::write(rdir.join(name), body).unwrap();
    }
    let store = Store::open(dir.path()).unwrap();
    (store, dir)
}

const REGIONS: &str = "\
metadata:
  version: 1.0.0
  description: Body regions
structures:
  - id: BAP_0000001
    name: Head
    parent: null
    definition: Anterior region of the body
  - id: BAP_0000002
    name: Ear
    parent: BAP_0000001
    synonyms: [auris]
";

const MUSCLES: &str = "\
structures:
  - id: BAP_0000010
    name: Stapedius
    parent: BAP_0000002
  - id: BAP_0000011
    name: Tensor tympani
    parent: BAP_0000002
";

const INNERVATION: &str = "\
metadata:
  version: 1.0.0
relationships:
  - subject: BAP_0000010
    predicate: innervated_by
    object: BAP_0000020
    confidence: high
  - subject: BAP_0000011
    predicate: innervated_by
    object: BAP_0000020
";

#[test]
fn test_loads_all_documents_with_provenance() {
    let (store, dir) = test_store(
        &[("body_regions.yaml", REGIONS), ("muscles.yaml", MUSCLES)],
        &[("innervation.yaml", INNERVATION)],
    );

    let structures = store.load_structures();
    assert!(structures.is_clean(), "{:?}", structures.errors);
    assert_eq!(structures.records.len(), 4);
    let stapedius = &structures.records["BAP_0000010"];
    assert_eq!(stapedius.parent.as_deref(), Some("BAP_0000002"));
    assert_eq!(
        stapedius.source_file.as_deref(),
        Some(dir.path().join("structures/muscles.yaml").as_path())
    );

    let rels = store.load_relationships();
    assert!(rels.is_clean());
    assert_eq!(rels.records.len(), 2);
    assert_eq!(rels.records[0].confidence.as_deref(), Some("high"));
}

#[test]
fn test_duplicate_id_keeps_first_and_reports() {
    let dup = "structures:\n  - id: BAP_0000001\n    name: Skull\n    parent: null\n";
    let (store, _dir) = test_store(&[("a.yaml", REGIONS), ("b.yaml", dup)], &[]);

    let report = store.load_structures();
    assert_eq!(report.records["BAP_0000001"].name, "Head");
    assert_eq!(report.errors.len(), 1);
    match &report.errors[0] {
        LoadError::DuplicateId { id, first, duplicate } => {
            assert_eq!(id, "BAP_0000001");
            assert!(first.ends_with("a.yaml"));
            assert!(duplicate.ends_with("b.yaml"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_bad_documents_and_records_are_skipped() {
    let broken = "structures:\n  - id: [unterminated\n";
    let no_key = "metadata:\n  version: 1.0.0\n";
    let bad_record = "structures:\n  - name: No id here\n  - id: BAP_0000050\n    name: Fine\n";
    let (store, _dir) = test_store(
        &[
            ("a.yaml", REGIONS),
            ("broken.yaml", broken),
            ("empty.yaml", no_key),
            ("partial.yaml", bad_record),
        ],
        &[],
    );

    let report = store.load_structures();
    assert_eq!(report.records.len(), 3);
    assert!(report.records.contains_key("BAP_0000050"));
    assert_eq!(report.errors.len(), 3);
    assert_eq!(report.hard_errors().count(), 2);
    assert!(report
        .errors
        .iter()
        .any(|e| matches!(e, LoadError::MissingCollection { .. })));
}

#[test]
fn test_missing_relationships_directory_is_a_warning() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("structures")).unwrap();
    let store = Store::open(dir.path()).unwrap();

    let rels = store.load_relationships();
    assert!(rels.records.is_empty());
    assert_eq!(rels.errors.len(), 1);
    assert_eq!(rels.errors[0].severity(), LoadSeverity::Warning);

    fs::remove_dir(dir.path().join("structures")).unwrap();
    let structures = store.load_structures();
    assert_eq!(structures.errors[0].severity(), LoadSeverity::Error);
}

#[test]
fn test_edits_preserve_unrelated_content() {
    let (store, dir) = test_store(&[("body_regions.yaml", REGIONS)], &[]);

    let path = store.set_parent("BAP_0000002", None).unwrap();
    assert!(path.ends_with("body_regions.yaml"));

    let patch = StructurePatch {
        definition: Some("Organ of hearing".to_string()),
        ..StructurePatch::default()
    };
    store.update_structure("BAP_0000002", &patch).unwrap();

    let text = fs::read_to_string(dir.path().join("structures/body_regions.yaml")).unwrap();
    assert!(text.contains("description: Body regions"));
    assert!(text.contains("auris"));

    let ear = &store.load_structures().records["BAP_0000002"];
    assert_eq!(ear.parent, None);
    assert_eq!(ear.definition.as_deref(), Some("Organ of hearing"));
    assert!(ear.extra.contains_key("synonyms"));
}

#[test]
fn test_append_and_remove_structure() {
    let (store, _dir) = test_store(&[("body_regions.yaml", REGIONS), ("muscles.yaml", MUSCLES)], &[]);

    let target = store.structure_document("muscles.yaml");
    let new = Structure::new("BAP_0000012", "Posterior auricular", Some("BAP_0000002".into()))
        .with_definition("Muscle behind the ear");
    store.append_structure(&target, &new).unwrap();
    assert_eq!(store.find_structure_file("BAP_0000012").unwrap(), target);

    store.remove_structure("BAP_0000010").unwrap();
    let records = store.load_structures().records;
    assert!(!records.contains_key("BAP_0000010"));
    assert_eq!(records["BAP_0000012"].definition.as_deref(), Some("Muscle behind the ear"));

    assert!(matches!(
        store.remove_structure("BAP_0000010"),
        Err(StoreError::StructureNotFound { .. })
    ));
}

#[test]
fn test_append_to_missing_document_fails() {
    let (store, _dir) = test_store(&[("body_regions.yaml", REGIONS)], &[]);
    let err = store
        .append_structure(&store.structure_document("nerves.yaml"), &Structure::new("BAP_0000099", "Vagus", None))
        .unwrap_err();
    assert!(matches!(err, StoreError::MissingDocument { .. }));
}

#[test]
fn test_deprecation_writes_the_triple() {
    let (store, _dir) = test_store(&[("body_regions.yaml", REGIONS)], &[]);
    store.deprecate_structure("BAP_0000002", "Superseded").unwrap();

    let ear = &store.load_structures().records["BAP_0000002"];
    assert!(ear.deprecated);
    assert_eq!(ear.deprecation_reason.as_deref(), Some("Superseded"));
    let date = ear.deprecated_date.as_deref().unwrap();
    assert!(chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok());
}

#[test]
fn test_relationship_edits() {
    let (store, _dir) = test_store(
        &[("body_regions.yaml", REGIONS), ("muscles.yaml", MUSCLES)],
        &[("innervation.yaml", INNERVATION), ("developmental.yaml", "relationships: null\n")],
    );

    let dev = store.relationship_document("developmental.yaml");
    let rel = Relationship::new("BAP_0000010", Predicate::DevelopsFrom, "BAP_0000001");
    store.append_relationship(&dev, &rel).unwrap();
    assert_eq!(store.load_relationships().records.len(), 3);

    assert_eq!(store.retarget_relationships("BAP_0000020", "BAP_0000021").unwrap().retargeted, 2);
    let rels = store.load_relationships().records;
    assert!(rels.iter().filter(|r| r.object == "BAP_0000021").count() == 2);
    assert!(rels[0].extra.contains_key("merged_from"));

    assert_eq!(store.remove_relationships_involving("BAP_0000010").unwrap(), 2);
    assert_eq!(store.load_relationships().records.len(), 1);
}

#[test]
fn test_retarget_drops_self_references_and_duplicates() {
    let innervation = "\
relationships:
  - subject: BAP_0000010
    predicate: innervated_by
    object: BAP_0000020
  - subject: BAP_0000010
    predicate: innervated_by
    object: BAP_0000021
  - subject: BAP_0000021
    predicate: adjacent_to
    object: BAP_0000020
  - subject: BAP_0000011
    predicate: innervated_by
    object: BAP_0000020
";
    let (store, _dir) = test_store(&[("body_regions.yaml", REGIONS)], &[("innervation.yaml", innervation)]);

    let report = store.retarget_relationships("BAP_0000020", "BAP_0000021").unwrap();
    assert_eq!(report.retargeted, 1);
    assert_eq!(report.duplicates_dropped, 1);
    assert_eq!(report.self_references_dropped, 1);
    assert_eq!(report.dropped(), 2);

    let rels = store.load_relationships().records;
    assert_eq!(rels.len(), 2);
    assert!(rels.iter().all(|r| r.subject != r.object));
    assert_eq!(rels[1].subject, "BAP_0000011");
    assert_eq!(rels[1].object, "BAP_0000021");
}

#[test]
fn test_reparent_children_across_documents() {
    let (store, _dir) = test_store(&[("body_regions.yaml", REGIONS), ("muscles.yaml", MUSCLES)], &[]);
    assert_eq!(store.reparent_children("BAP_0000002", "BAP_0000001").unwrap(), 2);
    let records = store.load_structures().records;
    assert_eq!(records["BAP_0000011"].parent.as_deref(), Some("BAP_0000001"));
}

#[test]
fn test_config_file_changes_layout() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(config::CONFIG_FILE_NAME), "structures_dir: data/s\nid_floor: 100\n").unwrap();
    fs::create_dir_all(dir.path().join("data/s")).unwrap();
    fs::write(dir.path().join("data/s/x.yml"), "structures:\n  - id: BAP_0000005\n    name: Tail\n").unwrap();

    let store = Store::open(dir.path()).unwrap();
    assert_eq!(store.structure_documents().len(), 1);
    let ids: Vec<String> = store.load_structures().records.into_keys().collect();
    assert_eq!(
        next_structure_id(store.config(), ids.iter().map(String::as_str)),
        "BAP_0000101"
    );
}
