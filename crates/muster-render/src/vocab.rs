//! The three vocabulary layers.
//!
//! 1. Situational terms carry signal about the operational context and are
//!    sticky: once a term appears in a source it keeps appearing (>= 0.95
//!    persistence), and term novelty within a source only decreases.
//! 2. Contextual clutter comes from the clerk's working environment and is
//!    unrelated to the soldier's post.
//! 3. Confounders are deliberately ambiguous designator-lookalikes. They
//!    never come from the true post and never resemble a branch-unique
//!    level name.

use rand::rngs::StdRng;
use rand::Rng;

use muster_catalog::{Archetype, Situation};
use muster_hierarchy::Hierarchy;
use muster_types::Post;

/// Fraction of records that carry situational content at all. Near-universal
/// within a source so that an established term is shared by almost every
/// record.
const SITUATIONAL_RATE: f64 = 0.97;
/// Re-draw probability for each already-active situational term. Sits above
/// the 0.95 persistence floor with margin for sampling noise.
const PERSISTENCE: f64 = 0.98;
/// Tier weights: primary, secondary, rare.
const TIER_WEIGHTS: [f64; 3] = [0.70, 0.25, 0.05];
/// Clutter token rate.
const CLUTTER_RATE: f64 = 0.35;

/// Mutable per-source injector memory; resets with every new source.
#[derive(Debug, Clone, Default)]
pub struct SourceVocabState {
    active_terms: Vec<String>,
    records_seen: u32,
}

/// Tokens chosen for one record, not yet placed in the line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabInjection {
    pub situational: Vec<String>,
    pub clutter: Vec<String>,
    pub confounders: Vec<String>,
}

impl VocabInjection {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.situational.is_empty() && self.clutter.is_empty() && self.confounders.is_empty()
    }

    /// All tokens in placement order.
    #[must_use]
    pub fn tokens(&self) -> Vec<&str> {
        self.situational
            .iter()
            .chain(&self.clutter)
            .chain(&self.confounders)
            .map(String::as_str)
            .collect()
    }
}

/// Stateless draw logic over the per-source state.
pub struct VocabularyInjector<'a> {
    hierarchy: &'a Hierarchy,
}

impl<'a> VocabularyInjector<'a> {
    #[must_use]
    pub fn new(hierarchy: &'a Hierarchy) -> Self {
        Self { hierarchy }
    }

    /// Compose the three layers for one record.
    pub fn inject(
        &self,
        rng: &mut StdRng,
        archetype: &Archetype,
        situation: &Situation,
        true_post: &Post,
        state: &mut SourceVocabState,
    ) -> VocabInjection {
        let mut injection = VocabInjection::default();

        if rng.gen::<f64>() < SITUATIONAL_RATE {
            for term in &state.active_terms {
                if rng.gen::<f64>() < PERSISTENCE {
                    injection.situational.push(term.clone());
                }
            }
            // Novelty decays with source length; early records establish the
            // situational vocabulary, later ones mostly repeat it.
            let novelty = (0.8 - 0.15 * f64::from(state.records_seen)).max(0.05);
            if rng.gen::<f64>() < novelty {
                if let Some(term) = draw_tiered_term(rng, situation, &state.active_terms) {
                    injection.situational.push(term.clone());
                    state.active_terms.push(term);
                }
            }
        }

        if rng.gen::<f64>() < CLUTTER_RATE {
            let pool = archetype.work_env.clutter_pool();
            injection
                .clutter
                .push(pool[rng.gen_range(0..pool.len())].to_owned());
        }

        if rng.gen::<f64>() < archetype.confounder_rate {
            if let Some(token) = self.draw_confounder(rng, true_post) {
                injection.confounders.push(token);
            }
        }

        state.records_seen += 1;
        injection
    }

    /// A short token that looks like a unit designator but is not one of the
    /// true post's designators and is not a branch-unique level name.
    fn draw_confounder(&self, rng: &mut StdRng, true_post: &Post) -> Option<String> {
        for _ in 0..8 {
            let candidate = match rng.gen_range(0..4u8) {
                0 => char::from(b'A' + rng.gen_range(0..8u8)).to_string(),
                1 => rng.gen_range(1..=12u32).to_string(),
                2 => format!("{}-{}", rng.gen_range(1..=9u32), rng.gen_range(1..=9u32)),
                _ => format!("{}..?", char::from(b'K' + rng.gen_range(0..6u8))),
            };
            let clashes_truth = true_post
                .segments
                .iter()
                .any(|seg| seg.designator.as_text() == candidate);
            if clashes_truth || self.hierarchy.unique_term_branch(&candidate).is_some() {
                continue;
            }
            return Some(candidate);
        }
        None
    }
}

fn draw_tiered_term(rng: &mut StdRng, situation: &Situation, active: &[String]) -> Option<String> {
    let tier_roll = rng.gen::<f64>() * TIER_WEIGHTS.iter().sum::<f64>();
    let pool = if tier_roll < TIER_WEIGHTS[0] {
        &situation.vocabulary.primary
    } else if tier_roll < TIER_WEIGHTS[0] + TIER_WEIGHTS[1] {
        &situation.vocabulary.secondary
    } else {
        &situation.vocabulary.rare
    };
    let fresh: Vec<&String> = pool.iter().filter(|t| !active.contains(t)).collect();
    if fresh.is_empty() {
        None
    } else {
        Some(fresh[rng.gen_range(0..fresh.len())].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muster_catalog::{ArchetypeRegistry, SituationRegistry};
    use muster_types::PathSegment;
    use rand::SeedableRng;

    fn fixtures() -> (Hierarchy, Archetype, Situation, Post) {
        let hierarchy = Hierarchy::builtin().expect("builtin");
        let archetype = ArchetypeRegistry::builtin(&hierarchy)
            .expect("archetypes")
            .get("rushed-local")
            .expect("rushed-local")
            .clone();
        let situation = SituationRegistry::builtin(&hierarchy)
            .expect("situations")
            .get("field-exercise")
            .expect("field-exercise")
            .clone();
        let post = Post::new(
            "infantry",
            [
                PathSegment::new("sector", 1u32),
                PathSegment::new("division", 7u32),
                PathSegment::new("regiment", 4u32),
                PathSegment::new("company", "B"),
            ],
        );
        (hierarchy, archetype, situation, post)
    }

    #[test]
    fn test_situational_terms_persist_within_source() {
        let (hierarchy, archetype, situation, post) = fixtures();
        let injector = VocabularyInjector::new(&hierarchy);
        let mut rng = StdRng::seed_from_u64(41);
        let mut state = SourceVocabState::default();

        let mut appearances = 0usize;
        let mut opportunities = 0usize;
        let mut first_term: Option<String> = None;
        for _ in 0..400 {
            let injection = injector.inject(&mut rng, &archetype, &situation, &post, &mut state);
            if let Some(term) = &first_term {
                if !injection.situational.is_empty() {
                    opportunities += 1;
                    appearances += usize::from(injection.situational.contains(term));
                }
            } else {
                first_term = injection.situational.first().cloned();
            }
        }
        assert!(opportunities > 20, "need situational records to measure");
        let rate = appearances as f64 / opportunities as f64;
        assert!(rate >= 0.95, "persistence {rate:.3} below 0.95");
    }

    #[test]
    fn test_confounders_avoid_truth_and_unique_terms() {
        let (hierarchy, mut archetype, situation, post) = fixtures();
        archetype.confounder_rate = 1.0;
        let injector = VocabularyInjector::new(&hierarchy);
        let mut rng = StdRng::seed_from_u64(17);
        let mut state = SourceVocabState::default();
        for _ in 0..500 {
            let injection = injector.inject(&mut rng, &archetype, &situation, &post, &mut state);
            for token in &injection.confounders {
                assert!(
                    post.segments.iter().all(|seg| seg.designator.as_text() != *token),
                    "confounder `{token}` leaked a true designator"
                );
                assert!(
                    hierarchy.unique_term_branch(token).is_none(),
                    "confounder `{token}` resembles a unique level name"
                );
            }
        }
    }

    #[test]
    fn test_clutter_comes_from_the_clerks_environment() {
        let (hierarchy, archetype, situation, post) = fixtures();
        let injector = VocabularyInjector::new(&hierarchy);
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = SourceVocabState::default();
        let pool = archetype.work_env.clutter_pool();
        for _ in 0..300 {
            let injection = injector.inject(&mut rng, &archetype, &situation, &post, &mut state);
            for token in &injection.clutter {
                assert!(pool.contains(&token.as_str()), "clutter `{token}` not in pool");
            }
        }
    }

    #[test]
    fn test_situational_terms_come_from_the_situation_pool() {
        let (hierarchy, archetype, situation, post) = fixtures();
        let injector = VocabularyInjector::new(&hierarchy);
        let mut rng = StdRng::seed_from_u64(29);
        let mut state = SourceVocabState::default();
        for _ in 0..300 {
            let injection = injector.inject(&mut rng, &archetype, &situation, &post, &mut state);
            for term in &injection.situational {
                assert!(
                    situation.vocabulary.iter_all().any(|t| t == term),
                    "situational term `{term}` not in the pool"
                );
            }
        }
    }
}
