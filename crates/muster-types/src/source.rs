//! Document-like sources.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{ClerkId, SourceId};
use crate::post::HomeUnit;

/// Where along a soldier's state sequence this source sits. Sources either
/// pin a specific state ordinal (clipped to the soldier's state count) or
/// capture any state uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalAnchor {
    Ordinal(u8),
    Any,
}

impl fmt::Display for TemporalAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ordinal(n) => write!(f, "ordinal_{n}"),
            Self::Any => f.write_str("any"),
        }
    }
}

/// Clerical quality, 1 (explicit, complete paths) to 5 (fragmentary
/// compression). Construction clamps into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityTier(u8);

impl QualityTier {
    #[must_use]
    pub fn new(tier: u8) -> Self {
        Self(tier.clamp(1, 5))
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

/// The document families a source can belong to. Drives the home-unit bias
/// used when the assigner fills the source with soldiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    LocalAdministrative,
    SectorHq,
    Transit,
    Medical,
    DepotIntake,
}

impl SourceKind {
    pub const ALL: [Self; 5] = [
        Self::LocalAdministrative,
        Self::SectorHq,
        Self::Transit,
        Self::Medical,
        Self::DepotIntake,
    ];

    /// Probability that a slot in this source is filled from the home unit
    /// rather than a foreign one.
    #[must_use]
    pub fn home_bias(self) -> f64 {
        match self {
            Self::LocalAdministrative => 0.90,
            Self::SectorHq => 0.70,
            Self::Transit => 0.30,
            Self::Medical => 0.25,
            Self::DepotIntake => 0.10,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalAdministrative => f.write_str("local_administrative"),
            Self::SectorHq => f.write_str("sector_hq"),
            Self::Transit => f.write_str("transit"),
            Self::Medical => f.write_str("medical"),
            Self::DepotIntake => f.write_str("depot_intake"),
        }
    }
}

/// A document-like container. Mutated only by appending records, then frozen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub clerk_id: ClerkId,
    pub situation_id: String,
    pub kind: SourceKind,
    pub home_unit: HomeUnit,
    pub anchor: TemporalAnchor,
    pub quality: QualityTier,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_tier_clamps() {
        assert_eq!(QualityTier::new(0).get(), 1);
        assert_eq!(QualityTier::new(3).get(), 3);
        assert_eq!(QualityTier::new(9).get(), 5);
    }

    #[test]
    fn test_home_bias_ordering_matches_source_locality() {
        // Local sources are the most home-biased, depot intake the least.
        let biases: Vec<f64> = SourceKind::ALL.iter().map(|k| k.home_bias()).collect();
        assert!(biases.windows(2).all(|w| w[0] >= w[1]));
    }
}
