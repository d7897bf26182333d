//! Collision-index properties over arbitrary lookups.

use proptest::prelude::*;

use muster_hierarchy::Hierarchy;

fn arb_level() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "sector".to_owned(),
        "division".to_owned(),
        "regiment".to_owned(),
        "squadron".to_owned(),
        "troop".to_owned(),
        "unheard-of".to_owned(),
    ])
}

fn arb_value() -> impl Strategy<Value = String> {
    prop_oneof![
        (0u32..40).prop_map(|n| n.to_string()),
        prop::sample::select(vec!["A".to_owned(), "D".to_owned(), "Z".to_owned()]),
    ]
}

proptest! {
    #[test]
    fn prop_collision_flag_agrees_with_sharing_set(level in arb_level(), value in arb_value()) {
        let hierarchy = Hierarchy::builtin().expect("builtin");
        let sharing = hierarchy.branches_sharing(&level, &value);
        prop_assert_eq!(hierarchy.is_colliding_pair(&level, &value), sharing.len() >= 2);
        for branch in sharing {
            prop_assert!(hierarchy.branch(branch).is_some(), "index names only real branches");
        }
    }

    #[test]
    fn prop_sharing_set_matches_validity(level in arb_level(), value in arb_value()) {
        let hierarchy = Hierarchy::builtin().expect("builtin");
        let sharing = hierarchy.branches_sharing(&level, &value);
        for branch in hierarchy.branches() {
            let valid = branch.level_index(&level).is_some_and(|idx| {
                branch.designators_at(idx).iter().any(|d| d.as_text() == value)
            });
            prop_assert_eq!(valid, sharing.contains(branch.name()));
        }
    }
}
