//! Per-soldier difficulty assessment.
//!
//! # Pipeline
//!
//! 1. Aggregate extracted signals across all of the soldier's records.
//! 2. Eliminate candidate branches via designator invalidity, branch-unique
//!    terms, and depth mismatch.
//! 3. Score complementarity per surviving candidate branch; keep the max.
//! 4. Decide collision position from the extracted pairs alone (the shared
//!    top level is exempt: it collides trivially and carries no signal).
//! 5. Map (collision, resolvability, complementarity) onto a tier with
//!    fixed thresholds.
//!
//! When every branch is eliminated (mutually inconsistent evidence, e.g. a
//! cross-branch soldier), scoring falls back to the branches supported by at
//! least one signal and resolvability stays false. When no branch is
//! supported at all the soldier is maximally ambiguous and lands in the
//! extreme tier with complementarity zero.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use muster_hierarchy::{Branch, Hierarchy};
use muster_types::SoldierId;

use crate::signals::{ExtractionRow, ExtractionTable};

/// Complementarity at or above this keeps a colliding soldier moderate.
pub const MODERATE_THRESHOLD: f64 = 0.7;
/// Complementarity below this makes a colliding soldier extreme.
pub const HARD_THRESHOLD: f64 = 0.4;
/// Denominator cap: deep branches are not penalized for levels that rarely
/// surface in records.
pub const COMPLEMENTARITY_DEPTH_CAP: usize = 4;

/// The exported difficulty label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyTier {
    Easy,
    Moderate,
    Hard,
    Extreme,
}

impl DifficultyTier {
    pub const ALL: [Self; 4] = [Self::Easy, Self::Moderate, Self::Hard, Self::Extreme];
}

impl fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Easy => f.write_str("easy"),
            Self::Moderate => f.write_str("moderate"),
            Self::Hard => f.write_str("hard"),
            Self::Extreme => f.write_str("extreme"),
        }
    }
}

/// Per-level diagnostic confidence for the winning candidate branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelConfidence {
    pub level: String,
    pub confidence: f64,
}

/// The assessment record written to the difficulty artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub soldier_id: SoldierId,
    pub collision_position: bool,
    pub complementarity_score: f64,
    pub structural_resolvability: bool,
    pub difficulty_tier: DifficultyTier,
    /// Candidate branches remaining after elimination (or the supported
    /// fallback set when elimination was contradictory).
    pub candidate_branches: Vec<String>,
    /// Per-level max confidence under the winning branch.
    pub level_confidences: Vec<LevelConfidence>,
    /// Constraints that eliminated at least one branch.
    pub eliminating_constraints: Vec<String>,
}

impl Assessment {
    /// Distance of the complementarity score from the nearest tier
    /// threshold. The rebalancer prefers regenerating soldiers whose
    /// assessment would not flip under small perturbations.
    #[must_use]
    pub fn threshold_margin(&self) -> f64 {
        let to_moderate = (self.complementarity_score - MODERATE_THRESHOLD).abs();
        let to_hard = (self.complementarity_score - HARD_THRESHOLD).abs();
        to_moderate.min(to_hard)
    }
}

/// Aggregated signals for one soldier.
#[derive(Debug, Default)]
struct SignalSet {
    /// Distinct characterized (level, value) pairs.
    pairs: BTreeSet<(String, String)>,
    /// Distinct uncharacterized fragments.
    bare: BTreeSet<String>,
}

impl SignalSet {
    fn collect(rows: &[&ExtractionRow]) -> Self {
        let mut set = Self::default();
        for row in rows {
            for (level, value) in row.characterized_pairs() {
                set.pairs.insert((level.to_owned(), value.to_owned()));
            }
            for fragment in row.uncharacterized() {
                set.bare.insert(fragment.to_owned());
            }
        }
        set
    }

    fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.bare.is_empty()
    }
}

/// The ground-truth difficulty computer. Pure and shardable per soldier.
pub struct DifficultyComputer<'a> {
    hierarchy: &'a Hierarchy,
}

impl<'a> DifficultyComputer<'a> {
    #[must_use]
    pub fn new(hierarchy: &'a Hierarchy) -> Self {
        Self { hierarchy }
    }

    /// Assess every soldier appearing in the table.
    #[must_use]
    pub fn assess_table(&self, table: &ExtractionTable) -> BTreeMap<SoldierId, Assessment> {
        table
            .by_soldier()
            .into_iter()
            .map(|(soldier_id, rows)| (soldier_id, self.assess(soldier_id, &rows)))
            .collect()
    }

    /// Assess one soldier from its extraction rows alone. No corpus-global
    /// state is consulted, so subset runs agree with full runs.
    #[must_use]
    pub fn assess(&self, soldier_id: SoldierId, rows: &[&ExtractionRow]) -> Assessment {
        let signals = SignalSet::collect(rows);
        let all_branches: BTreeSet<String> =
            self.hierarchy.branches().map(|b| b.name().to_owned()).collect();

        let (candidates, constraints, eliminated_any) = self.eliminate(&signals, &all_branches);
        let supported = self.supported_branches(&signals);

        let (scoring_set, structural) = if candidates.is_empty() {
            // Mutually inconsistent evidence: no single branch explains all
            // signals. Score over whatever is individually supported.
            (supported.clone(), false)
        } else {
            let structural = candidates.len() == 1 && eliminated_any && all_branches.len() > 1;
            (candidates.clone(), structural)
        };

        let no_evidence = signals.is_empty() || supported.is_empty();

        let mut best_score = 0.0;
        let mut best_branch: Option<&Branch> = None;
        let mut best_confidences: Vec<LevelConfidence> = Vec::new();
        if !no_evidence {
            for name in &scoring_set {
                let Some(branch) = self.hierarchy.branch(name) else { continue };
                let confidences = self.score_branch(branch, &signals);
                let sum: f64 = confidences.iter().map(|c| c.confidence).sum();
                let denominator = branch.depth().min(COMPLEMENTARITY_DEPTH_CAP) as f64;
                let score = (sum / denominator).min(1.0);
                if best_branch.is_none() || score > best_score {
                    best_score = score;
                    best_branch = Some(branch);
                    best_confidences = confidences;
                }
            }
        }

        let collision_position = self.in_collision_position(&signals);
        let difficulty_tier =
            assign_tier(collision_position, structural, best_score, no_evidence);

        Assessment {
            soldier_id,
            collision_position,
            complementarity_score: best_score,
            structural_resolvability: structural,
            difficulty_tier,
            candidate_branches: scoring_set.into_iter().collect(),
            level_confidences: best_confidences,
            eliminating_constraints: constraints,
        }
    }

    /// Apply the three eliminating-constraint families. Returns the
    /// surviving candidates, the human-readable constraints that eliminated
    /// at least one branch, and whether anything was eliminated at all.
    fn eliminate(
        &self,
        signals: &SignalSet,
        all_branches: &BTreeSet<String>,
    ) -> (BTreeSet<String>, Vec<String>, bool) {
        let mut candidates = all_branches.clone();
        let mut constraints = Vec::new();
        let mut eliminated_any = false;

        // (a) Designator validity: a characterized pair must be valid in a
        // surviving branch (a level the branch lacks counts as invalid too).
        for (level, value) in &signals.pairs {
            let survivors: BTreeSet<String> = candidates
                .iter()
                .filter(|name| {
                    self.hierarchy
                        .branch(name)
                        .is_some_and(|b| pair_valid_in(b, level, value))
                })
                .cloned()
                .collect();
            if survivors.len() < candidates.len() && !survivors.is_empty() {
                constraints.push(format!("designator_validity:{level}={value}"));
                eliminated_any = true;
                candidates = survivors;
            } else if survivors.is_empty() {
                // Contradiction against the current survivor set; resolved
                // by the caller's supported-branch fallback.
                constraints.push(format!("designator_validity:{level}={value}"));
                eliminated_any = true;
                candidates = survivors;
                break;
            }
        }

        // (b) Branch-unique terms, whether characterized levels or bare
        // tokens that happen to be level names.
        let mut unique_owners: BTreeSet<(String, String)> = BTreeSet::new();
        for (level, _) in &signals.pairs {
            if let Some(owner) = self.hierarchy.unique_term_branch(level) {
                unique_owners.insert((level.clone(), owner.to_owned()));
            }
        }
        for token in &signals.bare {
            if let Some(owner) = self.hierarchy.unique_term_branch(token) {
                unique_owners.insert((token.clone(), owner.to_owned()));
            }
        }
        for (term, owner) in unique_owners {
            let survivors: BTreeSet<String> =
                candidates.iter().filter(|name| **name == owner).cloned().collect();
            if survivors.len() < candidates.len() {
                constraints.push(format!("unique_term:{term}->{owner}"));
                eliminated_any = true;
                candidates = survivors;
            }
            if candidates.is_empty() {
                break;
            }
        }

        // (c) Depth mismatch: more distinct characterized levels than a
        // branch has room for.
        let observed_levels: BTreeSet<&str> =
            signals.pairs.iter().map(|(level, _)| level.as_str()).collect();
        if !observed_levels.is_empty() {
            let survivors: BTreeSet<String> = candidates
                .iter()
                .filter(|name| {
                    self.hierarchy
                        .branch(name)
                        .is_some_and(|b| b.depth() >= observed_levels.len())
                })
                .cloned()
                .collect();
            if survivors.len() < candidates.len() {
                constraints.push(format!("depth_mismatch:{}_levels_observed", observed_levels.len()));
                eliminated_any = true;
                candidates = survivors;
            }
        }

        (candidates, constraints, eliminated_any)
    }

    /// Branches with at least one supporting signal.
    fn supported_branches(&self, signals: &SignalSet) -> BTreeSet<String> {
        self.hierarchy
            .branches()
            .filter(|branch| {
                signals
                    .pairs
                    .iter()
                    .any(|(level, value)| pair_valid_in(branch, level, value))
                    || signals
                        .bare
                        .iter()
                        .any(|value| branch.levels_matching_text(value) > 0)
            })
            .map(|b| b.name().to_owned())
            .collect()
    }

    /// Per-level max confidence under one candidate branch.
    ///
    /// Characterized pairs pin their level at confidence 1.0. An
    /// uncharacterized value contributes 0.75 when it fits exactly one level
    /// of the branch and that (level, value) pair is unambiguous across the
    /// hierarchy; a value that fits several levels, or whose unique slot is
    /// a colliding pair, is weak evidence at 0.25. Values fitting no level
    /// are excluded.
    fn score_branch(&self, branch: &Branch, signals: &SignalSet) -> Vec<LevelConfidence> {
        let mut confidences: Vec<f64> = vec![0.0; branch.depth()];

        for (level, value) in &signals.pairs {
            if let Some(idx) = branch.level_index(level) {
                if pair_valid_in(branch, level, value) {
                    confidences[idx] = confidences[idx].max(1.0);
                }
            }
        }

        for value in &signals.bare {
            let matching: Vec<usize> = (0..branch.depth())
                .filter(|idx| {
                    branch
                        .designators_at(*idx)
                        .iter()
                        .any(|d| d.as_text() == *value)
                })
                .collect();
            match matching.as_slice() {
                [] => {}
                [only] => {
                    let level = &branch.levels()[*only];
                    let ambiguous_across = self.hierarchy.is_colliding_pair(level, value);
                    let confidence = if ambiguous_across { 0.25 } else { 0.75 };
                    confidences[*only] = confidences[*only].max(confidence);
                }
                several => {
                    for idx in several {
                        confidences[*idx] = confidences[*idx].max(0.25);
                    }
                }
            }
        }

        branch
            .levels()
            .iter()
            .zip(confidences)
            .map(|(level, confidence)| LevelConfidence {
                level: level.clone(),
                confidence,
            })
            .collect()
    }

    /// Extraction-based collision check. The shared top level is exempt; a
    /// colliding post whose records only ever surface branch-unique terms
    /// never enters collision position because those pairs are not in the
    /// collision index with cardinality >= 2.
    fn in_collision_position(&self, signals: &SignalSet) -> bool {
        let top = self.hierarchy.top_level();
        for (level, value) in &signals.pairs {
            if level != top && self.hierarchy.is_colliding_pair(level, value) {
                return true;
            }
        }
        for value in &signals.bare {
            for branch in self.hierarchy.branches() {
                for level in branch.levels().iter().skip(1) {
                    if self.hierarchy.is_colliding_pair(level, value) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

fn pair_valid_in(branch: &Branch, level: &str, value: &str) -> bool {
    branch.level_index(level).is_some_and(|idx| {
        branch
            .designators_at(idx)
            .iter()
            .any(|d| d.as_text() == value)
    })
}

/// The strict tier function. `no_evidence` marks soldiers with no usable
/// signal at all; they are maximally ambiguous.
fn assign_tier(
    collision_position: bool,
    structural_resolvability: bool,
    complementarity: f64,
    no_evidence: bool,
) -> DifficultyTier {
    if no_evidence {
        return DifficultyTier::Extreme;
    }
    if !collision_position {
        return DifficultyTier::Easy;
    }
    if structural_resolvability || complementarity >= MODERATE_THRESHOLD {
        return DifficultyTier::Moderate;
    }
    if complementarity >= HARD_THRESHOLD {
        DifficultyTier::Hard
    } else {
        DifficultyTier::Extreme
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::ExtractionRow;

    fn hierarchy() -> Hierarchy {
        Hierarchy::builtin().expect("builtin")
    }

    fn row_with_pairs(pairs: &[(&str, &str)]) -> ExtractionRow {
        let mut row = ExtractionRow::default();
        row.characterized.insert(
            "test-family".to_owned(),
            pairs.iter().map(|(l, v)| format!("{l}:{v}")).collect(),
        );
        row
    }

    fn row_with_bare(alpha: &[&str], numeric: &[&str]) -> ExtractionRow {
        ExtractionRow {
            characterized: BTreeMap::new(),
            bare_alpha: alpha.iter().map(|s| (*s).to_owned()).collect(),
            bare_numeric: numeric.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    #[test]
    fn test_characterized_unique_level_resolves_structurally() {
        let h = hierarchy();
        let computer = DifficultyComputer::new(&h);
        let row = row_with_pairs(&[("regiment", "4")]);
        let assessment = computer.assess(SoldierId(1), &[&row]);
        assert!(assessment.structural_resolvability);
        assert_eq!(assessment.candidate_branches, vec!["infantry".to_owned()]);
        assert!(
            assessment
                .eliminating_constraints
                .iter()
                .any(|c| c.contains("regiment")),
            "constraints: {:?}",
            assessment.eliminating_constraints
        );
        // Tier is at most moderate regardless of complementarity.
        assert!(matches!(
            assessment.difficulty_tier,
            DifficultyTier::Easy | DifficultyTier::Moderate
        ));
    }

    #[test]
    fn test_colliding_bare_digit_is_weak_evidence() {
        let h = hierarchy();
        let computer = DifficultyComputer::new(&h);
        // "3" fits division (colliding) and regiment within infantry.
        let row = row_with_bare(&[], &["3"]);
        let assessment = computer.assess(SoldierId(2), &[&row]);
        assert!(assessment.collision_position, "division 3 collides");
        assert!(!assessment.structural_resolvability);
        assert!(assessment.complementarity_score < HARD_THRESHOLD);
        assert_eq!(assessment.difficulty_tier, DifficultyTier::Extreme);
    }

    #[test]
    fn test_no_usable_signal_is_extreme() {
        let h = hierarchy();
        let computer = DifficultyComputer::new(&h);
        // "999" and "ZZ" are valid designators nowhere.
        let row = row_with_bare(&["ZZ"], &["999"]);
        let assessment = computer.assess(SoldierId(3), &[&row]);
        assert_eq!(assessment.complementarity_score, 0.0);
        assert_eq!(assessment.difficulty_tier, DifficultyTier::Extreme);
        assert!(assessment.candidate_branches.is_empty() || assessment.complementarity_score == 0.0);
    }

    #[test]
    fn test_depth_cap_keeps_deep_branches_scoreable() {
        let h = hierarchy();
        let computer = DifficultyComputer::new(&h);
        // Three characterized naval levels out of five: 3.0 / min(5,4) = 0.75.
        let row = row_with_pairs(&[("flotilla", "2"), ("squadron", "4"), ("vessel", "17")]);
        let assessment = computer.assess(SoldierId(4), &[&row]);
        assert!((assessment.complementarity_score - 0.75).abs() < 1e-9);
        assert_eq!(assessment.candidate_branches, vec!["naval".to_owned()]);
    }

    #[test]
    fn test_score_is_clamped_to_one() {
        let h = hierarchy();
        let computer = DifficultyComputer::new(&h);
        // All five naval levels characterized: 5.0 / 4 clamps to 1.0.
        let row = row_with_pairs(&[
            ("sector", "1"),
            ("flotilla", "2"),
            ("squadron", "4"),
            ("vessel", "17"),
            ("station", "B"),
        ]);
        let assessment = computer.assess(SoldierId(5), &[&row]);
        assert_eq!(assessment.complementarity_score, 1.0);
    }

    #[test]
    fn test_cross_branch_signals_fall_back_to_supported_max() {
        let h = hierarchy();
        let computer = DifficultyComputer::new(&h);
        // Unique terms of two different branches: no single branch survives.
        let infantry = row_with_pairs(&[("regiment", "4"), ("company", "B")]);
        let naval = row_with_pairs(&[("flotilla", "2")]);
        let assessment = computer.assess(SoldierId(6), &[&infantry, &naval]);
        assert!(!assessment.structural_resolvability);
        assert!(assessment.candidate_branches.contains(&"infantry".to_owned()));
        assert!(assessment.candidate_branches.contains(&"naval".to_owned()));
        // Infantry supports two of four levels: 2.0 / 4 = 0.5 wins over
        // naval's 1.0 / 4 = 0.25.
        assert!((assessment.complementarity_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_assessment_is_idempotent() {
        let h = hierarchy();
        let computer = DifficultyComputer::new(&h);
        let row = row_with_pairs(&[("division", "3")]);
        let a = computer.assess(SoldierId(7), &[&row]);
        let b = computer.assess(SoldierId(7), &[&row]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_tier_function_matrix() {
        assert_eq!(assign_tier(false, false, 0.0, false), DifficultyTier::Easy);
        assert_eq!(assign_tier(true, true, 0.0, false), DifficultyTier::Moderate);
        assert_eq!(assign_tier(true, false, 0.8, false), DifficultyTier::Moderate);
        assert_eq!(assign_tier(true, false, 0.5, false), DifficultyTier::Hard);
        assert_eq!(assign_tier(true, false, 0.2, false), DifficultyTier::Extreme);
        assert_eq!(assign_tier(false, false, 0.9, true), DifficultyTier::Extreme);
    }

    #[test]
    fn test_unique_bare_token_clears_collision_and_resolves() {
        let h = hierarchy();
        let computer = DifficultyComputer::new(&h);
        // A colliding post whose records only surface the unique level-name
        // token and the shared sector: not in collision position.
        let row = ExtractionRow {
            characterized: {
                let mut map = BTreeMap::new();
                map.insert("sector-family".to_owned(), vec!["sector:2".to_owned()]);
                map
            },
            bare_alpha: vec!["troop".to_owned()],
            bare_numeric: Vec::new(),
        };
        let assessment = computer.assess(SoldierId(8), &[&row]);
        assert!(!assessment.collision_position, "top level is exempt");
        assert!(assessment.structural_resolvability);
        assert_eq!(assessment.candidate_branches, vec!["cavalry".to_owned()]);
        assert_eq!(assessment.difficulty_tier, DifficultyTier::Easy);
    }
}
