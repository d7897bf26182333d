//! Property coverage for the difficulty computer over arbitrary signal
//! mixes: scores stay in range and assessment is a pure function.

use std::collections::BTreeMap;

use proptest::prelude::*;

use muster_difficulty::{DifficultyComputer, DifficultyTier, ExtractionRow};
use muster_hierarchy::Hierarchy;
use muster_types::SoldierId;

fn arb_level() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "sector".to_owned(),
        "division".to_owned(),
        "regiment".to_owned(),
        "company".to_owned(),
        "battery".to_owned(),
        "squadron".to_owned(),
        "flotilla".to_owned(),
        "troop".to_owned(),
        "bogus".to_owned(),
    ])
}

fn arb_value() -> impl Strategy<Value = String> {
    prop_oneof![
        (0u32..40).prop_map(|n| n.to_string()),
        prop::sample::select(vec![
            "A".to_owned(),
            "C".to_owned(),
            "H".to_owned(),
            "Z".to_owned(),
        ]),
    ]
}

fn arb_row() -> impl Strategy<Value = ExtractionRow> {
    (
        prop::collection::vec((arb_level(), arb_value()), 0..5),
        prop::collection::vec(arb_value(), 0..4),
    )
        .prop_map(|(pairs, bare)| {
            let mut characterized = BTreeMap::new();
            if !pairs.is_empty() {
                characterized.insert(
                    "prop-family".to_owned(),
                    pairs.into_iter().map(|(l, v)| format!("{l}:{v}")).collect(),
                );
            }
            let (bare_alpha, bare_numeric): (Vec<String>, Vec<String>) = bare
                .into_iter()
                .partition(|v| v.chars().all(char::is_alphabetic));
            ExtractionRow {
                characterized,
                bare_alpha,
                bare_numeric,
            }
        })
}

proptest! {
    #[test]
    fn prop_complementarity_stays_in_unit_interval(rows in prop::collection::vec(arb_row(), 1..6)) {
        let hierarchy = Hierarchy::builtin().expect("builtin");
        let computer = DifficultyComputer::new(&hierarchy);
        let refs: Vec<&ExtractionRow> = rows.iter().collect();
        let assessment = computer.assess(SoldierId(1), &refs);
        prop_assert!((0.0..=1.0).contains(&assessment.complementarity_score));
    }

    #[test]
    fn prop_assessment_is_deterministic(rows in prop::collection::vec(arb_row(), 1..6)) {
        let hierarchy = Hierarchy::builtin().expect("builtin");
        let computer = DifficultyComputer::new(&hierarchy);
        let refs: Vec<&ExtractionRow> = rows.iter().collect();
        let first = computer.assess(SoldierId(7), &refs);
        let second = computer.assess(SoldierId(7), &refs);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_tier_follows_the_strict_rules(rows in prop::collection::vec(arb_row(), 1..6)) {
        let hierarchy = Hierarchy::builtin().expect("builtin");
        let computer = DifficultyComputer::new(&hierarchy);
        let refs: Vec<&ExtractionRow> = rows.iter().collect();
        let a = computer.assess(SoldierId(3), &refs);
        match a.difficulty_tier {
            DifficultyTier::Easy => prop_assert!(!a.collision_position),
            DifficultyTier::Moderate => prop_assert!(
                a.collision_position
                    && (a.structural_resolvability || a.complementarity_score >= 0.7)
            ),
            DifficultyTier::Hard => prop_assert!(
                a.collision_position
                    && !a.structural_resolvability
                    && a.complementarity_score >= 0.4
                    && a.complementarity_score < 0.7
            ),
            DifficultyTier::Extreme => prop_assert!(
                !a.collision_position && a.complementarity_score == 0.0
                    || (a.collision_position
                        && !a.structural_resolvability
                        && a.complementarity_score < 0.4)
            ),
        }
    }
}
