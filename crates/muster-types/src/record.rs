//! Rendered records and their synthetic metadata.

use serde::{Deserialize, Serialize};

use crate::ids::{ClerkId, SoldierId, SourceId, StateId};
use crate::post::Familiarity;
use crate::source::QualityTier;

/// The terminal unit of the corpus: one line of clerical shorthand.
/// Created by the renderer, immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub source_id: SourceId,
    pub soldier_id: SoldierId,
    pub state_id: StateId,
    pub raw_text: String,
}

/// Ground-truth metadata accompanying each record. Never exposed to the
/// disambiguation side; written to its own artifact table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub source_id: SourceId,
    pub soldier_id: SoldierId,
    pub state_id: StateId,
    pub clerk_id: ClerkId,
    pub situation_id: String,
    pub quality_tier: QualityTier,
    pub familiarity: Familiarity,
    /// 0-based position within the source; fatigue depends on it.
    pub position_in_source: u32,
}
