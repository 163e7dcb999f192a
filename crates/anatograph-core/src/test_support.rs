//! On-disk store fixtures for unit tests.

use std::fs;

use anatograph_store::Store;
use tempfile::TempDir;

/// A temp store with the default layout and the given documents.
pub(crate) fn store_with(
    structures: &[(&str, &str)],
    relationships: &[(&str, &str)],
) -> (Store, TempDir) {
    let dir = tempfile::tempdir().unwrap();
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

/// Every default partition, empty.
pub(crate) const EMPTY_PARTITIONS: &[(&str, &str)] = &[
    ("muscles.yaml", "structures: []\n"),
    ("skeletal.yaml", "structures: []\n"),
    ("nerves.yaml", "structures: []\n"),
    ("vessels.yaml", "structures: []\n"),
];

pub(crate) const RELATIONSHIP_PARTITIONS: &[(&str, &str)] = &[
    ("innervation.yaml", "relationships: []\n"),
    ("blood_supply.yaml", "relationships: []\n"),
    ("developmental.yaml", "relationships: []\n"),
];

/// Head > Ear > {Stapedius, Tensor tympani}; Eye > Levator palpebrae superioris.
pub(crate) const HEAD: &str = "\
metadata:
  version: 1.0.0
structures:
  - id: BAP_0000001
    name: Head
    parent: null
  - id: BAP_0000002
    name: Ear
    parent: BAP_0000001
    definition: Organ of hearing
  - id: BAP_0000003
    name: Stapedius
    parent: BAP_0000002
  - id: BAP_0000004
    name: Tensor tympani
    parent: BAP_0000002
  - id: BAP_0000005
    name: Eye
    parent: BAP_0000001
  - id: BAP_0000006
    name: Levator palpebrae superioris
    parent: BAP_0000005
  - id: BAP_0000007
    name: Facial nerve
    parent: BAP_0000001
";

/// A full store around [`HEAD`] with every partition present.
pub(crate) fn head_store() -> (Store, TempDir) {
    let mut structures = vec![("body_regions.yaml", HEAD)];
    structures.extend_from_slice(EMPTY_PARTITIONS);
    store_with(&structures, RELATIONSHIP_PARTITIONS)
}
