//! Core type definitions for the muster corpus generator.
//!
//! Everything here is a plain data carrier: opaque identifiers, posts (full
//! hierarchy paths), soldiers and their latent states, document-like sources,
//! rendered records, and the deterministic per-entity seed plan. Hierarchy
//! semantics, rendering, and difficulty scoring live in their own crates.

mod ids;
mod post;
mod record;
mod seed;
mod soldier;
mod source;

pub use ids::{ClerkId, SoldierId, SourceId, StateId};
pub use post::{Designator, Familiarity, HomeUnit, PathSegment, Post};
pub use record::{Record, RecordMeta};
pub use seed::SeedPlan;
pub use soldier::{Rank, Soldier, State, TransferKind};
pub use source::{QualityTier, Source, SourceKind, TemporalAnchor};
