//! Generation run configuration.

use serde::Deserialize;

use muster_error::{MusterError, Result};

/// Knobs shaping one generation run. All fields have defaults tuned for the
/// built-in catalogs; configuration documents may override any subset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub root_seed: u64,
    pub soldier_count: u32,
    pub source_count: u32,
    pub clerk_count: u16,
    /// Target fractions for 1/2/3-state soldiers.
    pub state_count_weights: [f64; 3],
    /// Target fractions for within-lowest / different-mid / different-top /
    /// cross-branch transitions.
    pub transition_weights: [f64; 4],
    /// Hard ceiling on the cross-branch share of transitions.
    pub cross_branch_cap: f64,
    /// Fraction of soldiers whose first post must sit on a colliding pair.
    pub collision_coverage: f64,
    pub mean_records_per_soldier: f64,
    pub max_records_per_soldier: u32,
    /// Weights over quality tiers 1..=5.
    pub quality_tier_weights: [f64; 5],
    /// Weights over source kinds, in `SourceKind::ALL` order.
    pub source_kind_weights: [f64; 5],
    /// Probability a source anchors "any" state rather than an ordinal.
    pub anchor_any_fraction: f64,
    /// Weights over anchored state ordinals 1..=3.
    pub anchor_ordinal_weights: [f64; 3],
    pub assigner_retry_budget: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            root_seed: 0x4D55_5354_4552_0001,
            soldier_count: 200,
            source_count: 120,
            clerk_count: 24,
            state_count_weights: [0.65, 0.28, 0.07],
            transition_weights: [0.50, 0.35, 0.10, 0.05],
            cross_branch_cap: 0.05,
            collision_coverage: 0.45,
            mean_records_per_soldier: 12.0,
            max_records_per_soldier: 64,
            quality_tier_weights: [0.15, 0.30, 0.30, 0.15, 0.10],
            source_kind_weights: [0.35, 0.20, 0.15, 0.15, 0.15],
            anchor_any_fraction: 0.40,
            anchor_ordinal_weights: [0.40, 0.35, 0.25],
            assigner_retry_budget: 64,
        }
    }
}

impl RunConfig {
    /// Reject configurations that cannot produce a corpus.
    pub fn validate(&self) -> Result<()> {
        if self.soldier_count == 0 || self.source_count == 0 || self.clerk_count == 0 {
            return Err(MusterError::InfeasibleTargets {
                detail: "soldier, source, and clerk counts must all be positive".to_owned(),
            });
        }
        for (name, weights) in [
            ("state_count_weights", &self.state_count_weights[..]),
            ("transition_weights", &self.transition_weights[..]),
            ("quality_tier_weights", &self.quality_tier_weights[..]),
            ("source_kind_weights", &self.source_kind_weights[..]),
            ("anchor_ordinal_weights", &self.anchor_ordinal_weights[..]),
        ] {
            if weights.iter().any(|w| *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
                return Err(MusterError::InfeasibleTargets {
                    detail: format!("{name} must be non-negative with a positive sum"),
                });
            }
        }
        for (name, fraction) in [
            ("cross_branch_cap", self.cross_branch_cap),
            ("collision_coverage", self.collision_coverage),
            ("anchor_any_fraction", self.anchor_any_fraction),
        ] {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(MusterError::InfeasibleTargets {
                    detail: format!("{name} {fraction} outside [0, 1]"),
                });
            }
        }
        if self.mean_records_per_soldier < 1.0
            || f64::from(self.max_records_per_soldier) < self.mean_records_per_soldier
        {
            return Err(MusterError::InfeasibleTargets {
                detail: "records-per-soldier mean must be >= 1 and <= the cap".to_owned(),
            });
        }
        if self.assigner_retry_budget == 0 {
            return Err(MusterError::InfeasibleTargets {
                detail: "assigner retry budget must be positive".to_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        RunConfig::default().validate().expect("default is feasible");
    }

    #[test]
    fn test_zero_counts_are_infeasible() {
        let config = RunConfig { soldier_count: 0, ..RunConfig::default() };
        let err = config.validate().expect_err("zero soldiers");
        assert_eq!(err.kind(), "infeasible_targets");
    }

    #[test]
    fn test_negative_weight_is_infeasible() {
        let config = RunConfig {
            transition_weights: [0.5, 0.35, 0.2, -0.05],
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
