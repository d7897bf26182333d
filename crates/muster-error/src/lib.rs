//! Unified error type for the muster corpus generator.
//!
//! Every failure in the generator is a configuration or feasibility problem
//! detected at setup time; there are no recoverable runtime errors. All
//! variants carry the offending component and identifier so the orchestrator
//! can emit a single structured diagnostic before exiting non-zero.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used across all muster crates.
pub type Result<T, E = MusterError> = std::result::Result<T, E>;

/// All error kinds surfaced by the generator.
#[derive(Debug, Error)]
pub enum MusterError {
    /// A branch definition is missing levels, has inconsistent depth, or an
    /// empty designator set.
    #[error("malformed hierarchy: branch `{branch}`: {detail}")]
    HierarchyMalformed { branch: String, detail: String },

    /// A clerk archetype references an unknown segment or carries a policy
    /// value out of range.
    #[error("invalid clerk archetype `{archetype}`: {detail}")]
    ArchetypeInvalid { archetype: String, detail: String },

    /// A situation has an empty vocabulary layer or names an unknown branch.
    #[error("invalid situation `{situation}`: {detail}")]
    SituationInvalid { situation: String, detail: String },

    /// The configured distribution targets cannot be met with the given
    /// soldier count, even after the rebalancer retry budget.
    #[error("infeasible targets: {detail}")]
    InfeasibleTargets { detail: String },

    /// A clerk template cannot render a particular post. This is a
    /// configuration bug, not a runtime condition.
    #[error("clerk `{clerk}` cannot render designator `{designator}`: {detail}")]
    RenderIncompatible {
        clerk: String,
        designator: String,
        detail: String,
    },

    /// The state-anchor assigner exceeded its retry budget while honoring
    /// the soldier-at-most-once-per-source constraint.
    #[error("assigner conflict after {attempts} attempts: {detail}")]
    AssignerConflict { attempts: u32, detail: String },

    /// A configuration document failed to parse.
    #[error("cannot parse config `{path:?}`: {detail}")]
    ConfigParse { path: PathBuf, detail: String },

    /// Artifact persistence failed.
    #[error("artifact io at `{path:?}`: {source}")]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MusterError {
    /// Short stable kind tag used in the orchestrator's failure diagnostic.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HierarchyMalformed { .. } => "hierarchy_malformed",
            Self::ArchetypeInvalid { .. } => "archetype_invalid",
            Self::SituationInvalid { .. } => "situation_invalid",
            Self::InfeasibleTargets { .. } => "infeasible_targets",
            Self::RenderIncompatible { .. } => "render_incompatible",
            Self::AssignerConflict { .. } => "assigner_conflict",
            Self::ConfigParse { .. } => "config_parse",
            Self::ArtifactIo { .. } => "artifact_io",
        }
    }

    /// Component that raised the error, for the failure diagnostic.
    #[must_use]
    pub fn component(&self) -> &'static str {
        match self {
            Self::HierarchyMalformed { .. } => "hierarchy",
            Self::ArchetypeInvalid { .. } | Self::SituationInvalid { .. } => "catalog",
            Self::InfeasibleTargets { .. } => "rebalancer",
            Self::RenderIncompatible { .. } => "renderer",
            Self::AssignerConflict { .. } => "assigner",
            Self::ConfigParse { .. } => "config",
            Self::ArtifactIo { .. } => "artifacts",
        }
    }

    /// Helper for hierarchy validation failures.
    pub fn hierarchy(branch: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::HierarchyMalformed {
            branch: branch.into(),
            detail: detail.into(),
        }
    }

    /// Helper for archetype validation failures.
    pub fn archetype(archetype: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ArchetypeInvalid {
            archetype: archetype.into(),
            detail: detail.into(),
        }
    }

    /// Helper for situation validation failures.
    pub fn situation(situation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::SituationInvalid {
            situation: situation.into(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_component_are_stable() {
        let err = MusterError::hierarchy("infantry", "missing level set");
        assert_eq!(err.kind(), "hierarchy_malformed");
        assert_eq!(err.component(), "hierarchy");

        let err = MusterError::AssignerConflict {
            attempts: 64,
            detail: "no source accepts sld-000004".to_owned(),
        };
        assert_eq!(err.kind(), "assigner_conflict");
        assert_eq!(err.component(), "assigner");
    }

    #[test]
    fn test_display_carries_offending_identifier() {
        let err = MusterError::archetype("formal-hq", "separator must be one of / - , space");
        let text = err.to_string();
        assert!(text.contains("formal-hq"), "display must name the archetype: {text}");
    }
}
