//! Entity generation: soldiers, sources, and the state-anchor pairing.
//!
//! All sampling is deterministic: each soldier and each source owns a seed
//! derived from the run's root seed, so regenerating a single entity
//! reproduces bit-identical output. The familiarity calculator is the
//! prefix comparison on [`muster_types::Familiarity`]; this crate re-exports
//! it at the seam where the renderer consumes it.

mod assigner;
mod config;
mod sampling;
mod soldier;
mod source;

pub use assigner::{Pairing, PairingTable, assign_pairings};
pub use config::RunConfig;
pub use sampling::pick_weighted;
pub use soldier::{CrossBranchTally, SoldierFactory};
pub use source::SourceFactory;

pub use muster_types::Familiarity;
