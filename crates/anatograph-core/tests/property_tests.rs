use std::collections::BTreeMap;

use anatograph_core::{validate_plan, Action, Depth, HierarchyContext, Snapshot};
use anatograph_store::{IdScheme, Structure, StructureId};
use proptest::prelude::*;

const MAX_STRUCTURES: usize = 24;

fn id(n: usize) -> StructureId {
    format!("BAP_{:07}", n + 1)
}

/// An acyclic forest: each node's parent, if any, has a smaller index.
fn forest_strategy() -> impl Strategy<Value = BTreeMap<StructureId, Structure>> {
    (1usize..=MAX_STRUCTURES)
        .prop_flat_map(|n| {
            (0..n)
                .map(|i| {
                    if i == 0 {
                        Just(None).boxed()
                    } else {
                        prop::option::weighted(0.8, 0..i).boxed()
                    }
                })
                .collect::<Vec<_>>()
        })
        .prop_map(|parents| {
            parents
                .into_iter()
                .enumerate()
                .map(|(i, parent)| {
                    let s = Structure::new(id(i), format!("Structure {i}"), parent.map(id));
                    (id(i), s)
                })
                .collect()
        })
}

fn scheme() -> IdScheme {
    IdScheme::new("BAP_", 7)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn context_derivation_is_deterministic(structures in forest_strategy()) {
        let a = HierarchyContext::build(&structures);
        let b = HierarchyContext::build(&structures);
        prop_assert_eq!(&a, &b);

        for (child, s) in &structures {
            match &s.parent {
                Some(parent) => {
                    prop_assert!(a.children_of(parent).contains(child));
                    let d_parent = a.depth_of(parent).and_then(Depth::finite).unwrap();
                    prop_assert_eq!(a.depth_of(child), Some(Depth::Finite(d_parent + 1)));
                }
                None => prop_assert_eq!(a.depth_of(child), Some(Depth::Finite(0))),
            }
        }
    }

    #[test]
    fn moving_under_a_descendant_is_rejected(structures in forest_strategy(), pick in any::<prop::sample::Index>()) {
        let snapshot = Snapshot::from_records(structures, Vec::new());
        let ctx = &snapshot.context;
        let ids: Vec<&StructureId> = ctx.ids().collect();
        let target = ids[pick.index(ids.len())].clone();
        let descendants = ctx.descendants_of(&target);

        for d in &descendants {
            let result = validate_plan(&[Action::move_to(target.clone(), d.clone())], &snapshot, scheme());
            prop_assert!(!result.valid());
            prop_assert!(result.errors()[0].starts_with("Circular reference"));
        }
        let self_move = validate_plan(&[Action::move_to(target.clone(), target.clone())], &snapshot, scheme());
        prop_assert!(!self_move.valid());

        for other in ids.iter().filter(|o| ***o != target && !descendants.contains(**o)) {
            let result = validate_plan(&[Action::move_to(target.clone(), (*other).clone())], &snapshot, scheme());
            prop_assert!(result.valid(), "{:?}", result.errors());
        }
    }

    #[test]
    fn delete_requires_an_empty_structure(structures in forest_strategy(), pick in any::<prop::sample::Index>()) {
        let snapshot = Snapshot::from_records(structures, Vec::new());
        let ctx = &snapshot.context;
        let ids: Vec<&StructureId> = ctx.ids().collect();
        let target = ids[pick.index(ids.len())].clone();
        let children = ctx.children_of(&target).to_vec();

        let alone = validate_plan(&[Action::delete(target.clone())], &snapshot, scheme());
        prop_assert_eq!(alone.valid(), children.is_empty());

        // Relocating every child first makes the same delete acceptable.
        let subtree = ctx.descendants_of(&target);
        let refuge = ids
            .iter()
            .find(|i| ***i != target && !subtree.contains(**i))
            .map(|i| (*i).clone());
        prop_assume!(refuge.is_some() && !children.is_empty());
        let refuge = refuge.unwrap();

        let mut actions: Vec<Action> = children.iter().map(|c| Action::move_to(c.clone(), refuge.clone())).collect();
        actions.push(Action::delete(target.clone()));
        let result = validate_plan(&actions, &snapshot, scheme());
        prop_assert!(result.valid(), "{:?}", result.errors());

        // Deleting before the moves is refused.
        actions.rotate_right(1);
        prop_assert!(!validate_plan(&actions, &snapshot, scheme()).valid());
    }
}
