//! Deterministic per-entity seed derivation.
//!
//! A single root seed is threaded through the orchestrator; every soldier,
//! source, pairing pass, and render call draws from its own derived seed
//! `H(root || purpose_tag || scope_id)` (xxh3_64), so regenerating one
//! soldier reproduces bit-identical output without replaying the whole run.

use xxhash_rust::xxh3::xxh3_64;

use crate::ids::{SoldierId, SourceId};

const TAG_SOLDIER: &[u8] = b"soldier";
const TAG_CLERKS: &[u8] = b"clerks";
const TAG_SOURCE: &[u8] = b"source";
const TAG_PAIRING: &[u8] = b"pairing";
const TAG_RENDER: &[u8] = b"render";
const TAG_REBALANCE: &[u8] = b"rebalance";

/// Purpose-specific seed derivation rooted at one run seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedPlan {
    root: u64,
}

impl SeedPlan {
    #[must_use]
    pub fn new(root: u64) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(self) -> u64 {
        self.root
    }

    /// Seed governing one soldier's states, name, and rank.
    #[must_use]
    pub fn soldier(self, id: SoldierId) -> u64 {
        derive(self.root, TAG_SOLDIER, &id.to_string())
    }

    /// Seed governing clerk-pool instantiation.
    #[must_use]
    pub fn clerks(self) -> u64 {
        derive(self.root, TAG_CLERKS, "pool")
    }

    /// Seed governing one source's clerk, situation, home unit, and tier.
    #[must_use]
    pub fn source(self, id: SourceId) -> u64 {
        derive(self.root, TAG_SOURCE, &id.to_string())
    }

    /// Seed for the state-anchor pairing pass.
    #[must_use]
    pub fn pairing(self, pass: u32) -> u64 {
        derive(self.root, TAG_PAIRING, &pass.to_string())
    }

    /// Seed for rendering one (source, soldier) pairing's imperfections.
    #[must_use]
    pub fn render(self, source: SourceId, soldier: SoldierId) -> u64 {
        derive(self.root, TAG_RENDER, &format!("{source}/{soldier}"))
    }

    /// Seed for regenerating one soldier during a rebalancer pass.
    #[must_use]
    pub fn rebalance(self, id: SoldierId, pass: u32) -> u64 {
        derive(self.root, TAG_REBALANCE, &format!("{id}/{pass}"))
    }
}

/// `H(root_bytes || purpose_tag || scope_id)`.
fn derive(root: u64, purpose_tag: &[u8], scope_id: &str) -> u64 {
    let mut buf = Vec::with_capacity(8 + purpose_tag.len() + scope_id.len());
    buf.extend_from_slice(&root.to_le_bytes());
    buf.extend_from_slice(purpose_tag);
    buf.extend_from_slice(scope_id.as_bytes());
    xxh3_64(&buf)
}
