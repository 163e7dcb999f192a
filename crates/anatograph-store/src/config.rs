//! Store layout and routing configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::model::{PredicateFamily, StructureKind};

/// Name of the optional config file at the store root.
pub const CONFIG_FILE_NAME: &str = "anatograph.yaml";

/// Configuration for a document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Structures collection, relative to the store root.
    pub structures_dir: PathBuf,
    /// Relationships collection, relative to the store root.
    pub relationships_dir: PathBuf,
    /// Document new structures of a given kind are appended to.
    pub structure_partitions: BTreeMap<StructureKind, String>,
    /// Document for kinds without an explicit partition.
    pub default_structure_partition: String,
    /// Document new relationships of a given family are appended to.
    pub relationship_partitions: BTreeMap<PredicateFamily, String>,
    pub id_prefix: String,
    pub id_width: usize,
    /// Id allocation never hands out numbers at or below this value.
    pub id_floor: u64,
    /// Names never split into left/right variants.
    pub midline_structures: Vec<String>,
    /// Remove relationships touching a structure when it is deleted.
    pub cascade_relationship_delete: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let structure_partitions = BTreeMap::from([
            (StructureKind::Muscle, "muscles.yaml".to_string()),
            (StructureKind::Bone, "skeletal.yaml".to_string()),
            (StructureKind::Nerve, "nerves.yaml".to_string()),
            (StructureKind::Vessel, "vessels.yaml".to_string()),
        ]);
        let relationship_partitions = BTreeMap::from([
            (PredicateFamily::Innervation, "innervation.yaml".to_string()),
            (PredicateFamily::BloodSupply, "blood_supply.yaml".to_string()),
            (
                PredicateFamily::Developmental,
                "developmental.yaml".to_string(),
            ),
        ]);
        let midline_structures = [
            "Tail",
            "Nasal cavity",
            "Oral cavity",
            "Orbicularis oris",
            "frontal",
            "occipital",
            "sphenoid",
            "vomer",
            "Brain",
            "Larynx",
            "epiglottis",
            "thyroid cartilage",
            "Esophagus",
            "hyoid bone",
            "Thyroid gland",
            "cervical vertebra",
            "Spinal Cord",
            "Central nervous system",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            structures_dir: PathBuf::from("structures"),
            relationships_dir: PathBuf::from("relationships"),
            structure_partitions,
            default_structure_partition: "body_regions.yaml".to_string(),
            relationship_partitions,
            id_prefix: "BAP_".to_string(),
            id_width: 7,
            id_floor: 0,
            midline_structures,
            cascade_relationship_delete: true,
        }
    }
}

impl StoreConfig {
    /// Read a YAML config file. Missing keys take their default values.
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let contents = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| StoreError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `anatograph.yaml` from `root` if present, else the defaults.
    pub fn discover(root: &Path) -> Result<Self, StoreError> {
        let path = root.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn structure_partition(&self, kind: StructureKind) -> &str {
        self.structure_partitions
            .get(&kind)
            .map(String::as_str)
            .unwrap_or(&self.default_structure_partition)
    }

    pub fn relationship_partition(&self, family: PredicateFamily) -> &str {
        self.relationship_partitions
            .get(&family)
            .map(String::as_str)
            .unwrap_or("developmental.yaml")
    }

    pub fn is_midline(&self, name: &str) -> bool {
        self.midline_structures
            .iter()
            .any(|m| m.eq_ignore_ascii_case(name.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: StoreConfig =
            serde_yaml::from_str("id_prefix: MAR_\nstructure_partitions:\n  cavity: cavities.yaml\n")
                .unwrap();
        assert_eq!(cfg.id_prefix, "MAR_");
        assert_eq!(cfg.id_width, 7);
        assert_eq!(cfg.structure_partition(StructureKind::Cavity), "cavities.yaml");
        assert_eq!(cfg.structure_partition(StructureKind::Muscle), "body_regions.yaml");
    }

    #[test]
    fn midline_lookup_ignores_case() {
        let cfg = StoreConfig::default();
        assert!(cfg.is_midline("brain"));
        assert!(cfg.is_midline("Spinal cord"));
        assert!(!cfg.is_midline("Stapedius"));
    }
}
