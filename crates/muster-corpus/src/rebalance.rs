//! Difficulty rebalancer: regenerate robust soldiers from over-represented
//! tiers until the tier distribution meets the target, within a bounded
//! number of passes.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use serde::Deserialize;
use tracing::info;

use muster_difficulty::{
    Assessment, DifficultyComputer, DifficultyTier, ExtractionProvider,
};
use muster_error::{MusterError, Result};
use muster_gen::{CrossBranchTally, Pairing, SoldierFactory};
use muster_types::{Familiarity, SeedPlan, SoldierId, SourceId, TemporalAnchor};

use crate::pipeline::{validate_corpus, Corpus, Pipeline};

/// Rebalancing targets. Fractions are over all assessed soldiers and should
/// sum to roughly one; the tolerance is in absolute percentage points.
#[derive(Debug, Clone, Deserialize)]
pub struct RebalanceConfig {
    pub target: BTreeMap<DifficultyTier, f64>,
    pub tolerance: f64,
    pub max_passes: u32,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        let mut target = BTreeMap::new();
        target.insert(DifficultyTier::Easy, 0.30);
        target.insert(DifficultyTier::Moderate, 0.40);
        target.insert(DifficultyTier::Hard, 0.20);
        target.insert(DifficultyTier::Extreme, 0.10);
        Self {
            target,
            tolerance: 0.03,
            max_passes: 3,
        }
    }
}

/// Outcome of a rebalancing loop: final assessments plus pass count.
#[derive(Debug)]
pub struct RebalanceOutcome {
    pub assessments: BTreeMap<SoldierId, Assessment>,
    pub passes: u32,
    pub regenerated: usize,
}

/// Run assessment passes, regenerating surplus-tier soldiers in between,
/// until the empirical tier distribution is within tolerance of the target
/// or the pass budget is spent. Exceeding the budget is `InfeasibleTargets`;
/// the caller must write no artifacts in that case.
pub fn rebalance(
    pipeline: &Pipeline,
    corpus: &mut Corpus,
    provider: &dyn ExtractionProvider,
    config: &RebalanceConfig,
) -> Result<RebalanceOutcome> {
    let plan = SeedPlan::new(pipeline.config().root_seed);
    let computer = DifficultyComputer::new(pipeline.hierarchy());
    let mut regenerated_total = 0usize;

    for pass in 1..=config.max_passes {
        let table = provider.extract(&corpus.records);
        let assessments = computer.assess_table(&table);
        let surplus = surplus_by_tier(&assessments, config);

        if surplus.values().all(|count| *count == 0) {
            info!(pass, regenerated = regenerated_total, "tier targets met");
            return Ok(RebalanceOutcome {
                assessments,
                passes: pass,
                regenerated: regenerated_total,
            });
        }
        if pass == config.max_passes {
            break;
        }

        let victims = pick_robust(&assessments, &surplus);
        info!(pass, victims = victims.len(), "regenerating surplus-tier soldiers");
        regenerated_total += victims.len();
        regenerate(pipeline, corpus, plan, &victims, pass)?;

        let violations = validate_corpus(corpus, pipeline.hierarchy());
        if !violations.is_empty() {
            return Err(MusterError::InfeasibleTargets {
                detail: format!("rebalanced corpus failed self-check: {}", violations.join("; ")),
            });
        }
    }

    Err(MusterError::InfeasibleTargets {
        detail: format!(
            "tier distribution still outside tolerance after {} passes",
            config.max_passes
        ),
    })
}

/// How many soldiers each tier holds beyond its tolerated share.
fn surplus_by_tier(
    assessments: &BTreeMap<SoldierId, Assessment>,
    config: &RebalanceConfig,
) -> BTreeMap<DifficultyTier, usize> {
    let total = assessments.len().max(1) as f64;
    let mut counts: BTreeMap<DifficultyTier, usize> = BTreeMap::new();
    for assessment in assessments.values() {
        *counts.entry(assessment.difficulty_tier).or_default() += 1;
    }
    let mut surplus = BTreeMap::new();
    for tier in DifficultyTier::ALL {
        let fraction = *counts.get(&tier).unwrap_or(&0) as f64 / total;
        let target = config.target.get(&tier).copied().unwrap_or(0.0);
        let excess = fraction - target - config.tolerance;
        // The epsilon guard keeps float residue from inflating the ceil.
        let count = if excess > 1e-9 {
            ((excess * total) - 1e-6).ceil() as usize
        } else {
            0
        };
        surplus.insert(tier, count);
    }
    surplus
}

/// Choose the soldiers to regenerate: per surplus tier, the ones whose
/// complementarity sits farthest from a tier threshold (their assessment
/// would not flip under small perturbations, so they are safe to discard).
fn pick_robust(
    assessments: &BTreeMap<SoldierId, Assessment>,
    surplus: &BTreeMap<DifficultyTier, usize>,
) -> Vec<SoldierId> {
    let mut victims = Vec::new();
    for (tier, count) in surplus {
        if *count == 0 {
            continue;
        }
        let mut tier_members: Vec<&Assessment> = assessments
            .values()
            .filter(|a| a.difficulty_tier == *tier)
            .collect();
        tier_members.sort_by(|a, b| {
            b.threshold_margin()
                .partial_cmp(&a.threshold_margin())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.soldier_id.cmp(&b.soldier_id))
        });
        victims.extend(tier_members.iter().take(*count).map(|a| a.soldier_id));
    }
    victims
}

/// Regenerate the victims: new states under rebalance-derived seeds, new
/// co-occurrences, full re-render. Unchanged (source, soldier) pairs render
/// bit-identically because record seeds derive from those ids alone.
fn regenerate(
    pipeline: &Pipeline,
    corpus: &mut Corpus,
    plan: SeedPlan,
    victims: &[SoldierId],
    pass: u32,
) -> Result<()> {
    let victim_set: BTreeSet<SoldierId> = victims.iter().copied().collect();
    let factory = SoldierFactory::new(pipeline.hierarchy(), pipeline.config());

    // Rebuild the cross-branch tally without the victims' transitions, then
    // let the regenerated soldiers re-enter the accounting.
    let mut tally = CrossBranchTally::default();
    for soldier in &corpus.soldiers {
        if victim_set.contains(&soldier.id) {
            continue;
        }
        for state in &soldier.states {
            if let Some(kind) = state.transfer {
                tally.record(kind);
            }
        }
    }

    let mut next_state_id = corpus
        .soldiers
        .iter()
        .flat_map(|s| s.states.iter())
        .map(|s| s.state_id.0)
        .max()
        .unwrap_or(0);

    for soldier in &mut corpus.soldiers {
        if !victim_set.contains(&soldier.id) {
            continue;
        }
        *soldier = factory.build_soldier(
            soldier.id,
            plan.rebalance(soldier.id, pass),
            &mut next_state_id,
            &mut tally,
        );
    }

    // Drop the victims' old pairings, re-anchor them afresh, and restore
    // dense per-source positions in the surviving emission order.
    corpus
        .pairings
        .pairings
        .retain(|pairing| !victim_set.contains(&pairing.soldier_id));

    let mut rng = StdRng::seed_from_u64(plan.pairing(pass));
    let soldier_index: BTreeMap<SoldierId, usize> = corpus
        .soldiers
        .iter()
        .enumerate()
        .map(|(idx, s)| (s.id, idx))
        .collect();
    let mut used: BTreeMap<SourceId, BTreeSet<SoldierId>> = BTreeMap::new();
    for pairing in &corpus.pairings.pairings {
        used.entry(pairing.source_id).or_default().insert(pairing.soldier_id);
    }

    for victim in victims {
        let soldier = &corpus.soldiers[soldier_index[victim]];
        let per_soldier = 1 + rng.gen_range(0..3u32);
        let mut placed = 0;
        for _ in 0..pipeline.config().assigner_retry_budget {
            if placed >= per_soldier {
                break;
            }
            let source = &corpus.sources[rng.gen_range(0..corpus.sources.len())];
            let source_used = used.entry(source.id).or_default();
            if source_used.contains(victim) {
                continue;
            }
            source_used.insert(*victim);
            let state = match source.anchor {
                TemporalAnchor::Ordinal(ordinal) => soldier.state_at_clipped(ordinal),
                TemporalAnchor::Any => &soldier.states[rng.gen_range(0..soldier.states.len())],
            };
            corpus.pairings.pairings.push(Pairing {
                source_id: source.id,
                soldier_id: *victim,
                state_id: state.state_id,
                familiarity: Familiarity::classify(&state.post, &source.home_unit),
                position_in_source: u32::MAX, // re-normalized below
            });
            placed += 1;
        }
        if placed == 0 {
            return Err(MusterError::AssignerConflict {
                attempts: pipeline.config().assigner_retry_budget,
                detail: format!("cannot re-place {victim} after regeneration"),
            });
        }
    }

    renumber_positions(corpus);

    let (records, metadata) = pipeline.render_all(
        plan,
        &corpus.soldiers,
        &corpus.sources,
        &corpus.clerks,
        &corpus.pairings,
    )?;
    corpus.records = records;
    corpus.metadata = metadata;
    Ok(())
}

/// Restore dense 0..n positions per source, preserving relative order (with
/// re-placed soldiers appended at the end of their sources).
fn renumber_positions(corpus: &mut Corpus) {
    let mut by_source: BTreeMap<SourceId, Vec<usize>> = BTreeMap::new();
    for (idx, pairing) in corpus.pairings.pairings.iter().enumerate() {
        by_source.entry(pairing.source_id).or_default().push(idx);
    }
    for indices in by_source.values() {
        let mut ordered = indices.clone();
        ordered.sort_by_key(|idx| corpus.pairings.pairings[*idx].position_in_source);
        for (position, idx) in ordered.into_iter().enumerate() {
            corpus.pairings.pairings[idx].position_in_source = position as u32;
        }
    }
}
