//! Left/right splitting of bilateral leaf structures.
//!
//! The planner only produces an [`ActionPlan`]; applying it goes through the
//! same validate-then-execute gate as any other plan.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use anatograph_store::{IdAllocator, IdScheme, StoreConfig, Structure};

use crate::action::{Action, ActionPlan, CreateStructure, DeleteStructure};
use crate::snapshot::Snapshot;

/// What happens to the original structure when it gains L/R variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LateralizationPolicy {
    /// L/R become children of the original.
    KeepAsParent,
    /// L/R become siblings under the original parent; the original is deleted.
    Replace,
    /// `KeepAsParent` when the structure has relationships, else `Replace`.
    #[default]
    ByRelationships,
}

impl LateralizationPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            LateralizationPolicy::KeepAsParent => "keep-as-parent",
            LateralizationPolicy::Replace => "replace",
            LateralizationPolicy::ByRelationships => "by-relationships",
        }
    }
}

impl fmt::Display for LateralizationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LateralizationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "keep-as-parent" => Ok(Self::KeepAsParent),
            "replace" => Ok(Self::Replace),
            "by-relationships" => Ok(Self::ByRelationships),
            other => Err(format!(
                "unknown policy `{other}` (expected keep-as-parent, replace or by-relationships)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn suffix(self) -> &'static str {
        match self {
            Side::Left => "(L)",
            Side::Right => "(R)",
        }
    }

    pub fn lateral_name(self, base: &str) -> String {
        format!("{} {}", base.trim(), self.suffix())
    }
}

/// Name already carries a side suffix.
pub fn is_lateral(name: &str) -> bool {
    let name = name.trim_end();
    [Side::Left, Side::Right].iter().any(|s| name.ends_with(s.suffix()))
}

pub struct Lateralizer<'a> {
    snapshot: &'a Snapshot,
    config: &'a StoreConfig,
    policy: LateralizationPolicy,
}

impl<'a> Lateralizer<'a> {
    pub fn new(snapshot: &'a Snapshot, config: &'a StoreConfig, policy: LateralizationPolicy) -> Self {
        Self {
            snapshot,
            config,
            policy,
        }
    }

    /// Leaves eligible for splitting, in id order.
    pub fn candidates(&self) -> Vec<&'a Structure> {
        let ctx = &self.snapshot.context;
        self.snapshot
            .structures
            .values()
            .filter(|s| {
                let name = s.name.trim();
                !name.is_empty()
                    && !s.deprecated
                    && ctx.is_leaf(&s.id)
                    && !is_lateral(name)
                    && !self.config.is_midline(name)
                    && ctx.find_id_by_name(&Side::Left.lateral_name(name)).is_none()
                    && ctx.find_id_by_name(&Side::Right.lateral_name(name)).is_none()
            })
            .collect()
    }

    pub fn plan(&self) -> ActionPlan {
        let candidates = self.candidates();
        let mut ids = IdAllocator::after(
            IdScheme::from_config(self.config),
            self.snapshot.structures.keys().map(String::as_str),
            self.config.id_floor,
        );

        let mut actions = Vec::with_capacity(candidates.len() * 3);
        let mut replaced = 0;
        let mut warnings = Vec::new();
        for structure in &candidates {
            let keep = match self.policy {
                LateralizationPolicy::KeepAsParent => true,
                LateralizationPolicy::Replace => false,
                LateralizationPolicy::ByRelationships => {
                    self.snapshot.relationships_of(&structure.id).next().is_some()
                }
            };
            let parent_id = if keep {
                Some(structure.id.clone())
            } else {
                structure.parent.clone().filter(|p| !p.trim().is_empty())
            };
            for side in [Side::Left, Side::Right] {
                actions.push(Action::CreateStructure(CreateStructure {
                    id: ids.allocate(),
                    name: side.lateral_name(&structure.name),
                    parent_id: parent_id.clone(),
                    parent_name: None,
                    definition: structure.definition_text().map(str::to_string),
                    file: None,
                }));
            }
            if !keep {
                let related = self.snapshot.relationships_of(&structure.id).count();
                if related > 0 {
                    let fate = if self.config.cascade_relationship_delete {
                        "removed with it"
                    } else {
                        "left pointing at the deleted id"
                    };
                    warnings.push(format!(
                        "'{}' ({}) has {related} relationship(s) that are {fate}; they are not copied to the (L)/(R) versions",
                        structure.name, structure.id
                    ));
                }
                replaced += 1;
                actions.push(Action::DeleteStructure(DeleteStructure {
                    structure_id: Some(structure.id.clone()),
                    structure_name: Some(structure.name.clone()),
                    reason: Some("replaced with lateralized (L) and (R) versions".to_string()),
                }));
            }
        }

        tracing::info!(
            candidates = candidates.len(),
            replaced,
            warnings = warnings.len(),
            policy = %self.policy,
            "planned lateralization"
        );
        ActionPlan {
            understood: Some(format!(
                "Lateralize {} leaf structures ({})",
                candidates.len(),
                self.policy
            )),
            actions,
            warnings,
        }
    }
}

pub fn plan_lateralization(
    snapshot: &Snapshot,
    config: &StoreConfig,
    policy: LateralizationPolicy,
) -> ActionPlan {
    Lateralizer::new(snapshot, config, policy).plan()
}
