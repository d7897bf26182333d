//! The pipeline orchestrator: hierarchy -> clerks -> situations -> soldiers
//! -> sources -> pairings -> records, with a corpus self-check before any
//! artifact leaves the process.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::info;

use muster_catalog::{ArchetypeRegistry, ClerkInstance, SituationRegistry};
use muster_error::{MusterError, Result};
use muster_gen::{
    assign_pairings, CrossBranchTally, PairingTable, RunConfig, SoldierFactory, SourceFactory,
};
use muster_hierarchy::Hierarchy;
use muster_render::{render_record, RenderRequest, SourceVocabState, VocabularyInjector};
use muster_types::{
    Record, RecordMeta, SeedPlan, Soldier, Source, SourceId, TransferKind,
};

/// Everything one generation pass produces, prior to difficulty scoring.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub soldiers: Vec<Soldier>,
    pub sources: Vec<Source>,
    pub clerks: Vec<ClerkInstance>,
    pub pairings: PairingTable,
    pub records: Vec<Record>,
    pub metadata: Vec<RecordMeta>,
}

/// Tidy counts reported on success and written to `summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub root_seed: u64,
    pub soldier_count: usize,
    pub source_count: usize,
    pub record_count: usize,
    pub state_count_histogram: [usize; 3],
    pub transition_histogram: BTreeMap<String, usize>,
    pub cross_branch_fraction: f64,
    pub collision_coverage: f64,
    pub tier_counts: BTreeMap<String, usize>,
}

/// The staged generator. Registries are loaded once and shared read-only;
/// the pipeline owns nothing mutable between runs.
pub struct Pipeline {
    hierarchy: Hierarchy,
    archetypes: ArchetypeRegistry,
    situations: SituationRegistry,
    config: RunConfig,
}

impl Pipeline {
    pub fn new(
        hierarchy: Hierarchy,
        archetypes: ArchetypeRegistry,
        situations: SituationRegistry,
        config: RunConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            hierarchy,
            archetypes,
            situations,
            config,
        })
    }

    /// Built-in catalogs, custom run shape.
    pub fn builtin(config: RunConfig) -> Result<Self> {
        let hierarchy = Hierarchy::builtin()?;
        let archetypes = ArchetypeRegistry::builtin(&hierarchy)?;
        let situations = SituationRegistry::builtin(&hierarchy)?;
        Self::new(hierarchy, archetypes, situations, config)
    }

    #[must_use]
    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run phases A through J once.
    pub fn generate(&self) -> Result<Corpus> {
        let plan = SeedPlan::new(self.config.root_seed);

        info!(soldiers = self.config.soldier_count, "phase: soldiers");
        let soldier_factory = SoldierFactory::new(&self.hierarchy, &self.config);
        let mut next_state_id = 0;
        let mut tally = CrossBranchTally::default();
        let soldiers = soldier_factory.build_all(plan, &mut next_state_id, &mut tally);

        info!(sources = self.config.source_count, "phase: sources");
        let source_factory =
            SourceFactory::new(&self.hierarchy, &self.archetypes, &self.situations, &self.config);
        let clerks = source_factory.build_clerk_pool(plan)?;
        let sources = source_factory.build_all(plan, &clerks)?;

        info!("phase: state-anchor assignment");
        let pairings = assign_pairings(&soldiers, &sources, &self.config, plan.pairing(0))?;

        info!(pairings = pairings.len(), "phase: rendering");
        let (records, metadata) =
            self.render_all(plan, &soldiers, &sources, &clerks, &pairings)?;

        let corpus = Corpus {
            soldiers,
            sources,
            clerks,
            pairings,
            records,
            metadata,
        };
        let violations = validate_corpus(&corpus, &self.hierarchy);
        if violations.is_empty() {
            Ok(corpus)
        } else {
            Err(MusterError::InfeasibleTargets {
                detail: format!("corpus self-check failed: {}", violations.join("; ")),
            })
        }
    }

    /// Render every pairing, source by source in id order so fatigue sees
    /// positions in emission order. Each record draws from its own derived
    /// seed; the per-source vocabulary state carries term persistence.
    pub fn render_all(
        &self,
        plan: SeedPlan,
        soldiers: &[Soldier],
        sources: &[Source],
        clerks: &[ClerkInstance],
        pairings: &PairingTable,
    ) -> Result<(Vec<Record>, Vec<RecordMeta>)> {
        let soldier_index: BTreeMap<_, _> = soldiers.iter().map(|s| (s.id, s)).collect();
        let clerk_index: BTreeMap<_, _> = clerks.iter().map(|c| (c.clerk_id, c)).collect();
        let injector = VocabularyInjector::new(&self.hierarchy);

        let mut records = Vec::with_capacity(pairings.len());
        let mut metadata = Vec::with_capacity(pairings.len());
        for source in sources {
            let clerk = clerk_index.get(&source.clerk_id).copied().ok_or_else(|| {
                MusterError::AssignerConflict {
                    attempts: 0,
                    detail: format!("source {} references unknown clerk", source.id),
                }
            })?;
            let situation = self.situations.get(&source.situation_id).ok_or_else(|| {
                MusterError::situation(&source.situation_id, "referenced by source but not loaded")
            })?;
            let mut vocab_state = SourceVocabState::default();
            for pairing in pairings.for_source(source.id) {
                let soldier = soldier_index.get(&pairing.soldier_id).copied().ok_or_else(|| {
                    MusterError::AssignerConflict {
                        attempts: 0,
                        detail: format!("pairing references unknown {}", pairing.soldier_id),
                    }
                })?;
                let state = soldier.state_by_id(pairing.state_id).ok_or_else(|| {
                    MusterError::AssignerConflict {
                        attempts: 0,
                        detail: format!("pairing references foreign state of {}", soldier.id),
                    }
                })?;
                let request = RenderRequest {
                    clerk,
                    soldier,
                    state,
                    familiarity: pairing.familiarity,
                    situation,
                    quality: source.quality,
                    position_in_source: pairing.position_in_source,
                };
                let mut rng =
                    StdRng::seed_from_u64(plan.render(source.id, soldier.id));
                let raw_text = render_record(&request, &injector, &mut vocab_state, &mut rng)?;
                records.push(Record {
                    source_id: source.id,
                    soldier_id: soldier.id,
                    state_id: state.state_id,
                    raw_text,
                });
                metadata.push(RecordMeta {
                    source_id: source.id,
                    soldier_id: soldier.id,
                    state_id: state.state_id,
                    clerk_id: source.clerk_id,
                    situation_id: source.situation_id.clone(),
                    quality_tier: source.quality,
                    familiarity: pairing.familiarity,
                    position_in_source: pairing.position_in_source,
                });
            }
        }
        Ok((records, metadata))
    }

    /// Summarize a finished corpus (tier counts filled in by the caller when
    /// difficulty was computed).
    #[must_use]
    pub fn summarize(&self, corpus: &Corpus, tier_counts: BTreeMap<String, usize>) -> RunSummary {
        let mut state_count_histogram = [0usize; 3];
        let mut transition_histogram: BTreeMap<String, usize> = BTreeMap::new();
        let mut cross = 0usize;
        let mut transitions = 0usize;
        let mut colliding = 0usize;
        for soldier in &corpus.soldiers {
            let bucket = soldier.states.len().clamp(1, 3) - 1;
            state_count_histogram[bucket] += 1;
            if self.hierarchy.post_in_collision_position(&soldier.states[0].post) {
                colliding += 1;
            }
            for state in &soldier.states {
                if let Some(kind) = state.transfer {
                    transitions += 1;
                    *transition_histogram.entry(kind.to_string()).or_default() += 1;
                    if kind == TransferKind::CrossBranch {
                        cross += 1;
                    }
                }
            }
        }
        RunSummary {
            root_seed: self.config.root_seed,
            soldier_count: corpus.soldiers.len(),
            source_count: corpus.sources.len(),
            record_count: corpus.records.len(),
            state_count_histogram,
            transition_histogram,
            cross_branch_fraction: if transitions == 0 {
                0.0
            } else {
                cross as f64 / transitions as f64
            },
            collision_coverage: colliding as f64 / corpus.soldiers.len().max(1) as f64,
            tier_counts,
        }
    }
}

/// Structural corpus invariants, checked before any artifact is written and
/// re-checked after every rebalancer pass. Returns human-readable
/// violations; an empty list means the corpus is sound.
#[must_use]
pub fn validate_corpus(corpus: &Corpus, hierarchy: &Hierarchy) -> Vec<String> {
    let mut violations = Vec::new();

    let soldier_ids: BTreeSet<_> = corpus.soldiers.iter().map(|s| s.id).collect();
    let source_ids: BTreeSet<_> = corpus.sources.iter().map(|s| s.id).collect();
    let soldier_index: BTreeMap<_, _> = corpus.soldiers.iter().map(|s| (s.id, s)).collect();

    // Every record references a known soldier, one of its states, and a
    // known source; no soldier appears twice in one source.
    let mut seen: BTreeSet<(SourceId, muster_types::SoldierId)> = BTreeSet::new();
    for record in &corpus.records {
        if !source_ids.contains(&record.source_id) {
            violations.push(format!("record references unknown {}", record.source_id));
        }
        match soldier_index.get(&record.soldier_id) {
            None => violations.push(format!("record references unknown {}", record.soldier_id)),
            Some(soldier) => {
                if soldier.state_by_id(record.state_id).is_none() {
                    violations.push(format!(
                        "record state {} not owned by {}",
                        record.state_id, record.soldier_id
                    ));
                }
            }
        }
        if !seen.insert((record.source_id, record.soldier_id)) {
            violations.push(format!(
                "{} appears twice in {}",
                record.soldier_id, record.source_id
            ));
        }
    }

    // Soldier states: 1..=3, valid in the hierarchy, pairwise distinct.
    let mut cross = 0usize;
    let mut transitions = 0usize;
    for soldier in &corpus.soldiers {
        if soldier.states.is_empty() || soldier.states.len() > 3 {
            violations.push(format!("{} has {} states", soldier.id, soldier.states.len()));
            continue;
        }
        for state in &soldier.states {
            let Some(branch) = hierarchy.branch(&state.post.branch) else {
                violations.push(format!("{} in unknown branch {}", soldier.id, state.post.branch));
                continue;
            };
            if state.post.depth() != branch.depth() {
                violations.push(format!("{} post depth mismatch", soldier.id));
            }
            for (idx, seg) in state.post.segments.iter().enumerate() {
                if !branch.is_valid_at(idx, &seg.designator) {
                    violations.push(format!(
                        "{} carries invalid designator {} at {}",
                        soldier.id, seg.designator, seg.level
                    ));
                }
            }
            if let Some(kind) = state.transfer {
                transitions += 1;
                if kind == TransferKind::CrossBranch {
                    cross += 1;
                }
            }
        }
        for i in 0..soldier.states.len() {
            for j in (i + 1)..soldier.states.len() {
                if soldier.states[i].post == soldier.states[j].post {
                    violations.push(format!("{} repeats a post across states", soldier.id));
                }
            }
        }
    }

    // Cross-branch cap over the whole corpus.
    if transitions > 0 && cross as f64 / transitions as f64 > 0.05 + 1e-9 {
        violations.push(format!(
            "cross-branch transitions {cross}/{transitions} exceed the 5% cap"
        ));
    }

    // Every soldier contributes at least one record.
    let covered: BTreeSet<_> = corpus.records.iter().map(|r| r.soldier_id).collect();
    for id in soldier_ids.difference(&covered) {
        violations.push(format!("{id} has no records"));
    }

    violations
}
