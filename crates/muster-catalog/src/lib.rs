//! Read-only catalogs: clerk archetypes and situations.
//!
//! Both registries are loaded (or built in) once per run and never mutated
//! afterwards. Clerks are persistent characters: an archetype fixes every
//! structural habit (template, separator, casing, abbreviation policy) for
//! the lifetime of each clerk instance; per-record randomness touches only
//! imperfections.

mod clerk;
mod situation;

pub use clerk::{
    Archetype, ArchetypeRegistry, Casing, ClerkInstance, DesignatorPolicy, FatigueCurve,
    NameTemplate, RankStyle, TokenOrder, UnitTemplate, VocabPlacement, WorkEnv,
    level_abbreviation,
};
pub use situation::{Situation, SituationRegistry, VocabularyPool};
