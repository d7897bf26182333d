//! State-anchor assigner: which soldiers co-occur in which sources, and
//! which state each source captures.
//!
//! The co-occurrence is a bipartite relation built source by source. Slots
//! are filled home-first according to the source kind's bias; a trailing
//! pass guarantees every soldier contributes at least one record. The hard
//! constraint throughout: a soldier appears at most once per source.
//! Conflicts are resolved by re-drawing, never by splitting a soldier into
//! two records in one source.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use tracing::warn;

use muster_error::{MusterError, Result};
use muster_types::{
    Designator, Familiarity, SoldierId, Soldier, Source, SourceId, StateId, TemporalAnchor,
};

use crate::config::RunConfig;
use crate::sampling::geometric_count;

/// One (source, soldier) co-occurrence with its resolved state anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub source_id: SourceId,
    pub soldier_id: SoldierId,
    pub state_id: StateId,
    pub familiarity: Familiarity,
    /// 0-based position within the source; record emission follows it.
    pub position_in_source: u32,
}

/// The full pairing relation, ordered by (source, position).
#[derive(Debug, Clone, Default)]
pub struct PairingTable {
    pub pairings: Vec<Pairing>,
}

impl PairingTable {
    /// Pairings of one source, in emission order.
    #[must_use]
    pub fn for_source(&self, source_id: SourceId) -> Vec<&Pairing> {
        let mut rows: Vec<&Pairing> =
            self.pairings.iter().filter(|p| p.source_id == source_id).collect();
        rows.sort_by_key(|p| p.position_in_source);
        rows
    }

    /// Pairings of one soldier across all sources.
    #[must_use]
    pub fn for_soldier(&self, soldier_id: SoldierId) -> Vec<&Pairing> {
        self.pairings.iter().filter(|p| p.soldier_id == soldier_id).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairings.is_empty()
    }
}

type HomeKey = (String, Designator, Designator);

fn home_key_of_post(post: &muster_types::Post) -> Option<HomeKey> {
    Some((
        post.branch.clone(),
        post.designator_at(0)?.clone(),
        post.designator_at(1)?.clone(),
    ))
}

/// Build the pairing table for a soldier and source set.
pub fn assign_pairings(
    soldiers: &[Soldier],
    sources: &[Source],
    config: &RunConfig,
    seed: u64,
) -> Result<PairingTable> {
    let mut rng = StdRng::seed_from_u64(seed);

    // Per-soldier record targets, geometric-like around the configured mean,
    // never above the number of sources (one record per source at most).
    let cap = config.max_records_per_soldier.min(sources.len() as u32);
    let mut remaining: BTreeMap<SoldierId, u32> = soldiers
        .iter()
        .map(|s| (s.id, geometric_count(&mut rng, config.mean_records_per_soldier, cap)))
        .collect();
    let total_slots: u64 = remaining.values().map(|r| u64::from(*r)).sum();

    // Soldiers indexed by the home units their states occupy.
    let mut by_home: BTreeMap<HomeKey, Vec<SoldierId>> = BTreeMap::new();
    for soldier in soldiers {
        for state in &soldier.states {
            if let Some(key) = home_key_of_post(&state.post) {
                let bucket = by_home.entry(key).or_default();
                if bucket.last() != Some(&soldier.id) {
                    bucket.push(soldier.id);
                }
            }
        }
    }
    let soldier_index: BTreeMap<SoldierId, &Soldier> =
        soldiers.iter().map(|s| (s.id, s)).collect();
    let all_ids: Vec<SoldierId> = soldiers.iter().map(|s| s.id).collect();

    let mut used: BTreeMap<SourceId, BTreeSet<SoldierId>> = BTreeMap::new();
    let mut positions: BTreeMap<SourceId, u32> = BTreeMap::new();
    let mut pairings = Vec::with_capacity(total_slots as usize);

    // Primary fill: spread the aggregate slot count across sources.
    let base = (total_slots / sources.len().max(1) as u64) as u32;
    let extra = (total_slots % sources.len().max(1) as u64) as usize;
    for (idx, source) in sources.iter().enumerate() {
        let capacity = base + u32::from(idx < extra);
        let home_candidates = home_key_for_source(source)
            .and_then(|key| by_home.get(&key))
            .cloned()
            .unwrap_or_default();
        let source_used = used.entry(source.id).or_default();

        for _ in 0..capacity {
            let pick = draw_soldier(
                &mut rng,
                source,
                &home_candidates,
                &all_ids,
                &remaining,
                source_used,
                config.assigner_retry_budget,
            );
            let Some(soldier_id) = pick else { continue };
            let soldier = soldier_index[&soldier_id];
            *remaining.entry(soldier_id).or_default() -= 1;
            source_used.insert(soldier_id);
            let position = next_position(&mut positions, source.id);
            pairings.push(make_pairing(&mut rng, source, soldier, position));
        }
    }

    // Coverage pass: place soldiers the primary fill missed entirely, so
    // every soldier has at least one record.
    let uncovered: Vec<SoldierId> = {
        let covered: BTreeSet<SoldierId> = pairings.iter().map(|p| p.soldier_id).collect();
        all_ids.iter().copied().filter(|id| !covered.contains(id)).collect()
    };
    for soldier_id in uncovered {
        let soldier = soldier_index[&soldier_id];
        let mut placed = false;
        for _ in 0..config.assigner_retry_budget {
            let source = &sources[rng.gen_range(0..sources.len())];
            let source_used = used.entry(source.id).or_default();
            if source_used.contains(&soldier_id) {
                continue;
            }
            source_used.insert(soldier_id);
            let position = next_position(&mut positions, source.id);
            pairings.push(make_pairing(&mut rng, source, soldier, position));
            placed = true;
            break;
        }
        if !placed {
            warn!(soldier = %soldier_id, "retry budget exhausted during coverage pass");
            return Err(MusterError::AssignerConflict {
                attempts: config.assigner_retry_budget,
                detail: format!("cannot place {soldier_id} in any source without a duplicate"),
            });
        }
    }

    Ok(PairingTable { pairings })
}

fn home_key_for_source(source: &Source) -> Option<HomeKey> {
    Some((
        source.home_unit.branch.clone(),
        source.home_unit.sector.clone(),
        source.home_unit.mid.clone(),
    ))
}

fn next_position(positions: &mut BTreeMap<SourceId, u32>, source_id: SourceId) -> u32 {
    let slot = positions.entry(source_id).or_default();
    let position = *slot;
    *slot += 1;
    position
}

/// Draw one soldier for a slot: home-biased first, falling back to the
/// global pool, re-drawing on duplicates until the retry budget runs out.
fn draw_soldier(
    rng: &mut StdRng,
    source: &Source,
    home_candidates: &[SoldierId],
    all_ids: &[SoldierId],
    remaining: &BTreeMap<SoldierId, u32>,
    source_used: &BTreeSet<SoldierId>,
    retry_budget: u32,
) -> Option<SoldierId> {
    let want_home = !home_candidates.is_empty() && rng.gen::<f64>() < source.kind.home_bias();
    let pool: &[SoldierId] = if want_home { home_candidates } else { all_ids };
    for _ in 0..retry_budget {
        let candidate = pool[rng.gen_range(0..pool.len())];
        if source_used.contains(&candidate) {
            continue;
        }
        if remaining.get(&candidate).copied().unwrap_or(0) == 0 {
            continue;
        }
        return Some(candidate);
    }
    // The home pool may be tiny and exhausted; give the global pool one
    // bounded chance before leaving the slot unfilled.
    if want_home {
        for _ in 0..retry_budget {
            let candidate = all_ids[rng.gen_range(0..all_ids.len())];
            if !source_used.contains(&candidate)
                && remaining.get(&candidate).copied().unwrap_or(0) > 0
            {
                return Some(candidate);
            }
        }
    }
    None
}

fn make_pairing(rng: &mut StdRng, source: &Source, soldier: &Soldier, position: u32) -> Pairing {
    let state = match source.anchor {
        TemporalAnchor::Ordinal(ordinal) => soldier.state_at_clipped(ordinal),
        TemporalAnchor::Any => &soldier.states[rng.gen_range(0..soldier.states.len())],
    };
    Pairing {
        source_id: source.id,
        soldier_id: soldier.id,
        state_id: state.state_id,
        familiarity: Familiarity::classify(&state.post, &source.home_unit),
        position_in_source: position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soldier::{CrossBranchTally, SoldierFactory};
    use crate::source::SourceFactory;
    use muster_catalog::{ArchetypeRegistry, SituationRegistry};
    use muster_hierarchy::Hierarchy;
    use muster_types::SeedPlan;

    fn build_world(config: &RunConfig) -> (Vec<Soldier>, Vec<Source>) {
        let hierarchy = Hierarchy::builtin().expect("builtin");
        let archetypes = ArchetypeRegistry::builtin(&hierarchy).expect("archetypes");
        let situations = SituationRegistry::builtin(&hierarchy).expect("situations");
        let plan = SeedPlan::new(config.root_seed);

        let soldier_factory = SoldierFactory::new(&hierarchy, config);
        let mut next_state_id = 0;
        let mut tally = CrossBranchTally::default();
        let soldiers = soldier_factory.build_all(plan, &mut next_state_id, &mut tally);

        let source_factory = SourceFactory::new(&hierarchy, &archetypes, &situations, config);
        let clerks = source_factory.build_clerk_pool(plan).expect("clerks");
        let sources = source_factory.build_all(plan, &clerks).expect("sources");
        (soldiers, sources)
    }

    #[test]
    fn test_soldier_at_most_once_per_source() {
        let config = RunConfig::default();
        let (soldiers, sources) = build_world(&config);
        let table =
            assign_pairings(&soldiers, &sources, &config, 99).expect("assignment succeeds");
        let mut seen: BTreeSet<(SourceId, SoldierId)> = BTreeSet::new();
        for pairing in &table.pairings {
            assert!(
                seen.insert((pairing.source_id, pairing.soldier_id)),
                "{} duplicated in {}",
                pairing.soldier_id,
                pairing.source_id
            );
        }
    }

    #[test]
    fn test_every_soldier_is_covered() {
        let config = RunConfig::default();
        let (soldiers, sources) = build_world(&config);
        let table = assign_pairings(&soldiers, &sources, &config, 99).expect("assignment");
        let covered: BTreeSet<SoldierId> = table.pairings.iter().map(|p| p.soldier_id).collect();
        assert_eq!(covered.len(), soldiers.len());
    }

    #[test]
    fn test_anchored_states_belong_to_their_soldier() {
        let config = RunConfig::default();
        let (soldiers, sources) = build_world(&config);
        let table = assign_pairings(&soldiers, &sources, &config, 99).expect("assignment");
        let by_id: BTreeMap<SoldierId, &Soldier> = soldiers.iter().map(|s| (s.id, s)).collect();
        for pairing in &table.pairings {
            let soldier = by_id[&pairing.soldier_id];
            assert!(
                soldier.state_by_id(pairing.state_id).is_some(),
                "state not owned by soldier"
            );
        }
    }

    #[test]
    fn test_ordinal_anchor_is_honored_with_clipping() {
        let config = RunConfig::default();
        let (soldiers, sources) = build_world(&config);
        let table = assign_pairings(&soldiers, &sources, &config, 99).expect("assignment");
        let by_id: BTreeMap<SoldierId, &Soldier> = soldiers.iter().map(|s| (s.id, s)).collect();
        let source_by_id: BTreeMap<SourceId, &Source> = sources.iter().map(|s| (s.id, s)).collect();
        for pairing in &table.pairings {
            if let TemporalAnchor::Ordinal(ordinal) = source_by_id[&pairing.source_id].anchor {
                let soldier = by_id[&pairing.soldier_id];
                let expected = soldier.state_at_clipped(ordinal).state_id;
                assert_eq!(pairing.state_id, expected);
            }
        }
    }

    #[test]
    fn test_positions_are_dense_per_source() {
        let config = RunConfig::default();
        let (soldiers, sources) = build_world(&config);
        let table = assign_pairings(&soldiers, &sources, &config, 99).expect("assignment");
        for source in &sources {
            let rows = table.for_source(source.id);
            for (expected, row) in rows.iter().enumerate() {
                assert_eq!(row.position_in_source as usize, expected);
            }
        }
    }

    #[test]
    fn test_assignment_is_reproducible() {
        let config = RunConfig::default();
        let (soldiers, sources) = build_world(&config);
        let a = assign_pairings(&soldiers, &sources, &config, 7).expect("a");
        let b = assign_pairings(&soldiers, &sources, &config, 7).expect("b");
        assert_eq!(a.pairings, b.pairings);
    }

    #[test]
    fn test_home_bias_shapes_local_sources() {
        use muster_types::{
            ClerkId, HomeUnit, PathSegment, Post, QualityTier, Rank, SourceKind, State,
        };

        let infantry_post = |sector: u32, division: u32| {
            Post::new(
                "infantry",
                [
                    PathSegment::new("sector", sector),
                    PathSegment::new("division", division),
                    PathSegment::new("regiment", 3u32),
                    PathSegment::new("company", "B"),
                ],
            )
        };
        // Half the soldiers live in home unit (1, 1), half in (2, 2).
        let soldiers: Vec<Soldier> = (0..400u32)
            .map(|n| Soldier {
                id: SoldierId(n + 1),
                surname: "Fenwick".to_owned(),
                initial: 'A',
                rank: Rank::Private,
                states: vec![State {
                    state_id: StateId(n + 1),
                    order: 1,
                    post: if n < 200 { infantry_post(1, 1) } else { infantry_post(2, 2) },
                    transfer: None,
                }],
            })
            .collect();
        let home = HomeUnit {
            branch: "infantry".to_owned(),
            sector: 1u32.into(),
            mid: 1u32.into(),
        };
        let source = |id: u32, kind: SourceKind| Source {
            id: SourceId(id),
            clerk_id: ClerkId(1),
            situation_id: "field-exercise".to_owned(),
            kind,
            home_unit: home.clone(),
            anchor: TemporalAnchor::Any,
            quality: QualityTier::new(2),
        };
        let sources: Vec<Source> = (1..=4)
            .map(|id| source(id, SourceKind::LocalAdministrative))
            .chain((5..=8).map(|id| source(id, SourceKind::DepotIntake)))
            .collect();

        let config = RunConfig {
            mean_records_per_soldier: 1.0,
            ..RunConfig::default()
        };
        let table = assign_pairings(&soldiers, &sources, &config, 5).expect("assignment");

        let home_rate = |kind: SourceKind| {
            let rows: Vec<&Pairing> = table
                .pairings
                .iter()
                .filter(|p| sources[(p.source_id.0 - 1) as usize].kind == kind)
                .collect();
            let home_hits = rows.iter().filter(|p| p.soldier_id.0 <= 200).count();
            home_hits as f64 / rows.len().max(1) as f64
        };
        let local = home_rate(SourceKind::LocalAdministrative);
        let depot = home_rate(SourceKind::DepotIntake);
        assert!(
            local > depot + 0.15,
            "local sources must skew home ({local:.2} vs {depot:.2})"
        );
    }
}
