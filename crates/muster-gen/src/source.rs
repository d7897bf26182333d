//! Source factory: clerks, situations, home units, anchors, quality tiers.

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use muster_catalog::{ArchetypeRegistry, ClerkInstance, SituationRegistry};
use muster_error::{MusterError, Result};
use muster_hierarchy::Hierarchy;
use muster_types::{
    ClerkId, Designator, HomeUnit, QualityTier, SeedPlan, Source, SourceId, SourceKind,
    TemporalAnchor,
};

use crate::config::RunConfig;
use crate::sampling::pick_weighted;

/// Builds the clerk pool and the source set. Clerk instances are reused
/// across many sources; the pool guarantees at least one clerk per source
/// kind so every drawn kind can be served.
pub struct SourceFactory<'a> {
    hierarchy: &'a Hierarchy,
    archetypes: &'a ArchetypeRegistry,
    situations: &'a SituationRegistry,
    config: &'a RunConfig,
}

impl<'a> SourceFactory<'a> {
    #[must_use]
    pub fn new(
        hierarchy: &'a Hierarchy,
        archetypes: &'a ArchetypeRegistry,
        situations: &'a SituationRegistry,
        config: &'a RunConfig,
    ) -> Self {
        Self {
            hierarchy,
            archetypes,
            situations,
            config,
        }
    }

    /// Instantiate the clerk pool. The first pass walks the source kinds the
    /// run can actually draw (positive weight) so each gets coverage; the
    /// rest of the pool is drawn from the full catalog.
    pub fn build_clerk_pool(&self, plan: SeedPlan) -> Result<Vec<ClerkInstance>> {
        let mut rng = StdRng::seed_from_u64(plan.clerks());
        let mut pool = Vec::with_capacity(usize::from(self.config.clerk_count));
        let all: Vec<_> = self.archetypes.iter().collect();

        for (idx, kind) in SourceKind::ALL.into_iter().enumerate() {
            if self.config.source_kind_weights[idx] <= 0.0 {
                continue;
            }
            let serving = self.archetypes.for_source_kind(kind);
            let Some(archetype) = serving.get(rng.gen_range(0..serving.len().max(1))) else {
                return Err(MusterError::archetype(
                    "<catalog>",
                    format!("no archetype serves source kind {kind}"),
                ));
            };
            pool.push(ClerkInstance {
                clerk_id: ClerkId(pool.len() as u16 + 1),
                archetype: (*archetype).clone(),
            });
            if pool.len() >= usize::from(self.config.clerk_count) {
                break;
            }
        }
        while pool.len() < usize::from(self.config.clerk_count) {
            let archetype = all[rng.gen_range(0..all.len())];
            pool.push(ClerkInstance {
                clerk_id: ClerkId(pool.len() as u16 + 1),
                archetype: archetype.clone(),
            });
        }
        Ok(pool)
    }

    /// Build the source set. Each source owns a derived seed, so the set is
    /// reproducible regardless of construction order.
    pub fn build_all(&self, plan: SeedPlan, clerks: &[ClerkInstance]) -> Result<Vec<Source>> {
        (0..self.config.source_count)
            .map(|n| {
                let id = SourceId(n + 1);
                self.build_source(id, plan.source(id), clerks)
            })
            .collect()
    }

    fn build_source(&self, id: SourceId, seed: u64, clerks: &[ClerkInstance]) -> Result<Source> {
        let mut rng = StdRng::seed_from_u64(seed);

        let kind = SourceKind::ALL[pick_weighted(&mut rng, &self.config.source_kind_weights)];
        let serving: Vec<&ClerkInstance> = clerks
            .iter()
            .filter(|c| c.archetype.work_env.source_kind() == kind)
            .collect();
        let Some(clerk) = serving.get(rng.gen_range(0..serving.len().max(1))) else {
            return Err(MusterError::archetype(
                "<pool>",
                format!("clerk pool has no clerk for source kind {kind}"),
            ));
        };

        let home_unit = self.sample_home_unit(&mut rng)?;
        let compatible = self.situations.compatible_with(&home_unit.branch);
        let Some(situation) = compatible.get(rng.gen_range(0..compatible.len().max(1))) else {
            return Err(MusterError::situation(
                "<catalog>",
                format!("no situation allows branch `{}`", home_unit.branch),
            ));
        };

        let anchor = if rng.gen::<f64>() < self.config.anchor_any_fraction {
            TemporalAnchor::Any
        } else {
            let ordinal = pick_weighted(&mut rng, &self.config.anchor_ordinal_weights) + 1;
            TemporalAnchor::Ordinal(ordinal as u8)
        };
        let quality =
            QualityTier::new(pick_weighted(&mut rng, &self.config.quality_tier_weights) as u8 + 1);

        Ok(Source {
            id,
            clerk_id: clerk.clerk_id,
            situation_id: situation.id.clone(),
            kind,
            home_unit,
            anchor,
            quality,
        })
    }

    fn sample_home_unit(&self, rng: &mut StdRng) -> Result<HomeUnit> {
        let names = self.hierarchy.branch_names();
        let name = names[rng.gen_range(0..names.len())];
        let branch = self.hierarchy.branch(name).ok_or_else(|| {
            MusterError::hierarchy(name, "branch disappeared between queries")
        })?;
        let pick = |set: &[Designator], rng: &mut StdRng| set[rng.gen_range(0..set.len())].clone();
        Ok(HomeUnit {
            branch: name.to_owned(),
            sector: pick(branch.designators_at(0), rng),
            mid: pick(branch.designators_at(1), rng),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        hierarchy: Hierarchy,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                hierarchy: Hierarchy::builtin().expect("builtin"),
            }
        }
    }

    fn build_sources(config: &RunConfig) -> (Vec<ClerkInstance>, Vec<Source>) {
        let fixture = Fixture::new();
        let archetypes = ArchetypeRegistry::builtin(&fixture.hierarchy).expect("archetypes");
        let situations = SituationRegistry::builtin(&fixture.hierarchy).expect("situations");
        let factory = SourceFactory::new(&fixture.hierarchy, &archetypes, &situations, config);
        let plan = SeedPlan::new(config.root_seed);
        let clerks = factory.build_clerk_pool(plan).expect("clerk pool");
        let sources = factory.build_all(plan, &clerks).expect("sources");
        (clerks, sources)
    }

    #[test]
    fn test_sources_reference_pool_clerks_and_compatible_situations() {
        let config = RunConfig { source_count: 200, ..RunConfig::default() };
        let fixture = Fixture::new();
        let situations = SituationRegistry::builtin(&fixture.hierarchy).expect("situations");
        let (clerks, sources) = build_sources(&config);
        for source in &sources {
            let clerk = clerks
                .iter()
                .find(|c| c.clerk_id == source.clerk_id)
                .expect("clerk in pool");
            assert_eq!(clerk.archetype.work_env.source_kind(), source.kind);
            let situation = situations.get(&source.situation_id).expect("known situation");
            assert!(
                situation
                    .allowed_branches
                    .iter()
                    .any(|b| *b == source.home_unit.branch),
                "situation must allow the home branch"
            );
            assert!((1..=5).contains(&source.quality.get()));
        }
    }

    #[test]
    fn test_clerk_pool_reuse_across_sources() {
        let config = RunConfig { source_count: 200, clerk_count: 10, ..RunConfig::default() };
        let (clerks, sources) = build_sources(&config);
        assert_eq!(clerks.len(), 10);
        // With far more sources than clerks, some clerk serves many sources.
        let busiest = clerks
            .iter()
            .map(|c| sources.iter().filter(|s| s.clerk_id == c.clerk_id).count())
            .max()
            .unwrap_or(0);
        assert!(busiest >= 10, "expected clerk reuse, busiest served {busiest}");
    }

    #[test]
    fn test_source_build_is_reproducible() {
        let config = RunConfig::default();
        let (_, a) = build_sources(&config);
        let (_, b) = build_sources(&config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_home_units_are_valid_prefixes() {
        let config = RunConfig::default();
        let fixture = Fixture::new();
        let (_, sources) = build_sources(&config);
        for source in &sources {
            let branch = fixture
                .hierarchy
                .branch(&source.home_unit.branch)
                .expect("known branch");
            assert!(branch.is_valid_at(0, &source.home_unit.sector));
            assert!(branch.is_valid_at(1, &source.home_unit.mid));
        }
    }
}
