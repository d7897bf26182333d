//! Collision index derived from the branch definitions.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use crate::Branch;

/// Mapping from (level-name, canonical designator text) to the branches in
/// which that pair is valid. Built once, immutable afterwards. Keys use the
/// canonical text form so that the integer designator `7` and the string
/// designator `"7"` land on the same entry.
#[derive(Debug, Clone, Default)]
pub struct CollisionIndex {
    map: BTreeMap<(String, String), BTreeSet<String>>,
}

impl CollisionIndex {
    /// Scan every (level, designator) pair across all branches.
    #[must_use]
    pub fn build(branches: &BTreeMap<String, Branch>) -> Self {
        let mut map: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();
        for branch in branches.values() {
            for (idx, level) in branch.levels().iter().enumerate() {
                for value in branch.designators_at(idx) {
                    map.entry((level.clone(), value.as_text()))
                        .or_default()
                        .insert(branch.name().to_owned());
                }
            }
        }
        Self { map }
    }

    /// Branches for which (level, value) is valid. Empty set when the pair
    /// is valid nowhere.
    #[must_use]
    pub fn branches_for(&self, level: &str, value: &str) -> &BTreeSet<String> {
        static EMPTY: OnceLock<BTreeSet<String>> = OnceLock::new();
        self.map
            .get(&(level.to_owned(), value.to_owned()))
            .unwrap_or_else(|| EMPTY.get_or_init(BTreeSet::new))
    }

    /// A pair is colliding when it is valid in two or more branches.
    #[must_use]
    pub fn is_colliding(&self, level: &str, value: &str) -> bool {
        self.branches_for(level, value).len() >= 2
    }

    /// Total number of distinct (level, value) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate all colliding pairs.
    pub fn colliding_pairs(&self) -> impl Iterator<Item = (&str, &str, &BTreeSet<String>)> {
        self.map
            .iter()
            .filter(|(_, branches)| branches.len() >= 2)
            .map(|((level, value), branches)| (level.as_str(), value.as_str(), branches))
    }
}
