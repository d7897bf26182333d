//! Posts: full paths through one branch's hierarchy.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A designator value at one hierarchy level. Branch definitions may use
/// integers or strings, so both are first-class.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Designator {
    Num(u32),
    Alpha(String),
}

impl Designator {
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Num(_))
    }

    /// Canonical text form used for collision lookups and rendering.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Num(n) => n.to_string(),
            Self::Alpha(s) => s.clone(),
        }
    }
}

impl fmt::Display for Designator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Alpha(s) => f.write_str(s),
        }
    }
}

impl From<u32> for Designator {
    fn from(n: u32) -> Self {
        Self::Num(n)
    }
}

impl From<&str> for Designator {
    fn from(s: &str) -> Self {
        Self::Alpha(s.to_owned())
    }
}

/// One (level-name, designator) pair along a post path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathSegment {
    pub level: String,
    pub designator: Designator,
}

impl PathSegment {
    pub fn new(level: impl Into<String>, designator: impl Into<Designator>) -> Self {
        Self {
            level: level.into(),
            designator: designator.into(),
        }
    }
}

/// A complete path through exactly one branch: one designator per level,
/// ordered from the shared top level down. Path length always equals the
/// branch depth.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Post {
    pub branch: String,
    pub segments: SmallVec<[PathSegment; 5]>,
}

impl Post {
    pub fn new(branch: impl Into<String>, segments: impl IntoIterator<Item = PathSegment>) -> Self {
        Self {
            branch: branch.into(),
            segments: segments.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Designator at the given level index, top-down.
    #[must_use]
    pub fn designator_at(&self, level_index: usize) -> Option<&Designator> {
        self.segments.get(level_index).map(|s| &s.designator)
    }

    /// The deepest (most specific) segment, if the post is non-empty.
    /// Hierarchy validation guarantees depth >= 3 for every built post.
    #[must_use]
    pub fn deepest(&self) -> Option<&PathSegment> {
        self.segments.last()
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.branch)?;
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", seg.designator)?;
        }
        Ok(())
    }
}

/// The mid-level unit a source's writer belongs to: a two-segment prefix
/// (shared top level plus the level directly beneath it) within one branch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HomeUnit {
    pub branch: String,
    pub sector: Designator,
    pub mid: Designator,
}

impl fmt::Display for HomeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.branch, self.sector, self.mid)
    }
}

/// Nested-prefix relation between a soldier's active post and a source's
/// home unit. Drives how many path segments the clerk writes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Familiarity {
    /// Post sits inside the source's own mid-level unit.
    SameMidUnit,
    /// Same branch and sector, different mid-level unit.
    SameBranchDifferentMid,
    /// Same branch, different sector.
    SameBranchDifferentTop,
    /// Post belongs to another branch entirely.
    DifferentBranch,
}

impl Familiarity {
    /// Compare a post against a home unit by path prefix.
    #[must_use]
    pub fn classify(post: &Post, home: &HomeUnit) -> Self {
        if post.branch != home.branch {
            return Self::DifferentBranch;
        }
        let sector_matches = post.designator_at(0) == Some(&home.sector);
        if !sector_matches {
            return Self::SameBranchDifferentTop;
        }
        if post.designator_at(1) == Some(&home.mid) {
            Self::SameMidUnit
        } else {
            Self::SameBranchDifferentMid
        }
    }
}

impl fmt::Display for Familiarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SameMidUnit => f.write_str("same_mid_unit"),
            Self::SameBranchDifferentMid => f.write_str("same_branch_different_mid"),
            Self::SameBranchDifferentTop => f.write_str("same_branch_different_top"),
            Self::DifferentBranch => f.write_str("different_branch"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(branch: &str, designators: &[(&str, u32)]) -> Post {
        Post::new(
            branch,
            designators
                .iter()
                .map(|(level, n)| PathSegment::new(*level, *n)),
        )
    }

    fn home(branch: &str, sector: u32, mid: u32) -> HomeUnit {
        HomeUnit {
            branch: branch.to_owned(),
            sector: Designator::Num(sector),
            mid: Designator::Num(mid),
        }
    }

    #[test]
    fn test_familiarity_prefix_ladder() {
        let p = post(
            "infantry",
            &[("sector", 2), ("division", 4), ("regiment", 9), ("company", 1)],
        );
        assert_eq!(
            Familiarity::classify(&p, &home("infantry", 2, 4)),
            Familiarity::SameMidUnit
        );
        assert_eq!(
            Familiarity::classify(&p, &home("infantry", 2, 5)),
            Familiarity::SameBranchDifferentMid
        );
        assert_eq!(
            Familiarity::classify(&p, &home("infantry", 3, 4)),
            Familiarity::SameBranchDifferentTop
        );
        assert_eq!(
            Familiarity::classify(&p, &home("naval", 2, 4)),
            Familiarity::DifferentBranch
        );
    }

    #[test]
    fn test_designator_text_forms() {
        assert_eq!(Designator::Num(12).as_text(), "12");
        assert_eq!(Designator::from("B").as_text(), "B");
        assert!(!Designator::from("B").is_numeric());
    }

    #[test]
    fn test_post_display_is_compact() {
        let p = post("infantry", &[("sector", 1), ("division", 2), ("regiment", 3), ("company", 4)]);
        assert_eq!(p.to_string(), "infantry:1/2/3/4");
    }
}
