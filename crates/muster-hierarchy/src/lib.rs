//! Branch hierarchy model and collision index.
//!
//! Loads branch definitions (depth, ordered level names, per-level valid
//! designator sets, branch-unique terms), validates them, and derives the
//! collision index: a mapping from (level-name, designator-value) to the set
//! of branches in which that pair is valid. A pair valid in two or more
//! branches is a *colliding* pair.
//!
//! The hierarchy is loaded once and read-only for the remainder of a run.

mod builtin;
mod collision;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;

use muster_error::{MusterError, Result};
use muster_types::{Designator, PathSegment, Post};

pub use builtin::BUILTIN_HIERARCHY_TOML;
pub use collision::CollisionIndex;

/// On-disk shape of the hierarchy definition document.
#[derive(Debug, Clone, Deserialize)]
pub struct HierarchyConfig {
    pub branches: BTreeMap<String, BranchConfig>,
}

/// One branch as configured.
#[derive(Debug, Clone, Deserialize)]
pub struct BranchConfig {
    pub depth: usize,
    pub levels: Vec<String>,
    pub valid_designators: BTreeMap<String, Vec<Designator>>,
    #[serde(default)]
    pub branch_unique_terms: Vec<String>,
}

/// A validated branch: ordered levels with per-level designator sets.
#[derive(Debug, Clone)]
pub struct Branch {
    name: String,
    levels: Vec<String>,
    /// Indexed by level position, parallel to `levels`.
    designators: Vec<Vec<Designator>>,
}

impl Branch {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    #[must_use]
    pub fn level_index(&self, level: &str) -> Option<usize> {
        self.levels.iter().position(|l| l == level)
    }

    #[must_use]
    pub fn designators_at(&self, level_index: usize) -> &[Designator] {
        self.designators
            .get(level_index)
            .map_or(&[], Vec::as_slice)
    }

    /// Is `value` a valid designator at `level_index`?
    #[must_use]
    pub fn is_valid_at(&self, level_index: usize, value: &Designator) -> bool {
        self.designators_at(level_index).contains(value)
    }

    /// Number of distinct levels at which the canonical text `value` is a
    /// valid designator.
    #[must_use]
    pub fn levels_matching_text(&self, value: &str) -> usize {
        self.designators
            .iter()
            .filter(|set| set.iter().any(|d| d.as_text() == value))
            .count()
    }
}

/// The loaded, validated hierarchy plus its derived collision index.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    branches: BTreeMap<String, Branch>,
    collision: CollisionIndex,
    /// Lowercased branch-unique level-name token -> owning branch.
    unique_terms: BTreeMap<String, String>,
    top_level: String,
}

impl Hierarchy {
    /// Validate a configuration and derive the collision index.
    pub fn from_config(config: &HierarchyConfig) -> Result<Self> {
        if config.branches.is_empty() {
            return Err(MusterError::hierarchy("<none>", "no branches defined"));
        }

        let mut branches = BTreeMap::new();
        let mut top_level: Option<String> = None;

        for (name, branch_cfg) in &config.branches {
            let branch = validate_branch(name, branch_cfg)?;
            match &top_level {
                None => top_level = Some(branch.levels[0].clone()),
                Some(top) if *top != branch.levels[0] => {
                    return Err(MusterError::hierarchy(
                        name,
                        format!(
                            "top level `{}` differs from shared top level `{top}`",
                            branch.levels[0]
                        ),
                    ));
                }
                Some(_) => {}
            }
            branches.insert(name.clone(), branch);
        }
        let top_level = top_level.unwrap_or_default();

        let unique_terms = derive_unique_terms(&branches);
        for (name, branch_cfg) in &config.branches {
            for term in &branch_cfg.branch_unique_terms {
                let owner = unique_terms.get(&term.to_lowercase());
                if owner.map(String::as_str) != Some(name.as_str()) {
                    return Err(MusterError::hierarchy(
                        name,
                        format!("configured unique term `{term}` is not unique to this branch"),
                    ));
                }
            }
        }

        let collision = CollisionIndex::build(&branches);
        Ok(Self {
            branches,
            collision,
            unique_terms,
            top_level,
        })
    }

    /// Parse a TOML hierarchy document and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: HierarchyConfig =
            toml::from_str(text).map_err(|e| MusterError::ConfigParse {
                path: "<inline>".into(),
                detail: e.to_string(),
            })?;
        Self::from_config(&config)
    }

    /// Load a TOML hierarchy document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| MusterError::ArtifactIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config: HierarchyConfig =
            toml::from_str(&text).map_err(|e| MusterError::ConfigParse {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        Self::from_config(&config)
    }

    /// The built-in five-branch catalog used by tests and the CLI default.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_HIERARCHY_TOML)
    }

    #[must_use]
    pub fn branch(&self, name: &str) -> Option<&Branch> {
        self.branches.get(name)
    }

    pub fn branches(&self) -> impl Iterator<Item = &Branch> {
        self.branches.values()
    }

    #[must_use]
    pub fn branch_names(&self) -> Vec<&str> {
        self.branches.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    /// The level name every branch shares at the top.
    #[must_use]
    pub fn top_level(&self) -> &str {
        &self.top_level
    }

    /// Is (level, value) valid in the named branch?
    #[must_use]
    pub fn is_valid(&self, branch: &str, level: &str, value: &Designator) -> bool {
        self.branches.get(branch).is_some_and(|b| {
            b.level_index(level)
                .is_some_and(|idx| b.is_valid_at(idx, value))
        })
    }

    /// Which branches share this (level, value) pair?
    #[must_use]
    pub fn branches_sharing(&self, level: &str, value: &str) -> &BTreeSet<String> {
        self.collision.branches_for(level, value)
    }

    /// Is this pair valid in two or more branches?
    #[must_use]
    pub fn is_colliding_pair(&self, level: &str, value: &str) -> bool {
        self.collision.is_colliding(level, value)
    }

    /// Branches with exactly the requested depth.
    #[must_use]
    pub fn branches_with_depth(&self, depth: usize) -> Vec<&Branch> {
        self.branches.values().filter(|b| b.depth() == depth).collect()
    }

    /// The branch owning a unique level-name token, if any. Matching is
    /// lowercased and whole-token.
    #[must_use]
    pub fn unique_term_branch(&self, token: &str) -> Option<&str> {
        self.unique_terms.get(&token.to_lowercase()).map(String::as_str)
    }

    /// All colliding (level-index, designator) pairs inside one branch,
    /// excluding the shared top level. Used to bias soldier placement onto
    /// collision positions.
    #[must_use]
    pub fn colliding_pairs_in(&self, branch: &str) -> Vec<(usize, Designator)> {
        let Some(b) = self.branches.get(branch) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (idx, level) in b.levels.iter().enumerate().skip(1) {
            for value in b.designators_at(idx) {
                if self.collision.is_colliding(level, &value.as_text()) {
                    out.push((idx, value.clone()));
                }
            }
        }
        out
    }

    /// Enumerate every post in a branch (cartesian product over levels).
    /// Intended for tests and the small built-in catalog.
    #[must_use]
    pub fn enumerate_posts(&self, branch: &str) -> Vec<Post> {
        let Some(b) = self.branches.get(branch) else {
            return Vec::new();
        };
        let mut posts: Vec<Vec<PathSegment>> = vec![Vec::new()];
        for (idx, level) in b.levels.iter().enumerate() {
            let mut next = Vec::with_capacity(posts.len() * b.designators_at(idx).len());
            for prefix in &posts {
                for value in b.designators_at(idx) {
                    let mut path = prefix.clone();
                    path.push(PathSegment::new(level.clone(), value.clone()));
                    next.push(path);
                }
            }
            posts = next;
        }
        posts
            .into_iter()
            .map(|segments| Post::new(b.name.clone(), segments))
            .collect()
    }

    /// Does the given post pass through at least one colliding pair below
    /// the shared top level?
    #[must_use]
    pub fn post_in_collision_position(&self, post: &Post) -> bool {
        post.segments
            .iter()
            .skip(1)
            .any(|seg| self.collision.is_colliding(&seg.level, &seg.designator.as_text()))
    }
}

fn validate_branch(name: &str, cfg: &BranchConfig) -> Result<Branch> {
    if cfg.levels.is_empty() {
        return Err(MusterError::hierarchy(name, "no levels defined"));
    }
    if cfg.depth != cfg.levels.len() {
        return Err(MusterError::hierarchy(
            name,
            format!("depth {} disagrees with {} level names", cfg.depth, cfg.levels.len()),
        ));
    }
    if !(3..=5).contains(&cfg.depth) {
        return Err(MusterError::hierarchy(
            name,
            format!("depth {} outside the supported 3..=5 range", cfg.depth),
        ));
    }
    let mut designators = Vec::with_capacity(cfg.levels.len());
    for level in &cfg.levels {
        let Some(values) = cfg.valid_designators.get(level) else {
            return Err(MusterError::hierarchy(
                name,
                format!("level `{level}` lacks a valid designator set"),
            ));
        };
        if values.is_empty() {
            return Err(MusterError::hierarchy(
                name,
                format!("level `{level}` has an empty designator set"),
            ));
        }
        designators.push(values.clone());
    }
    for configured in cfg.valid_designators.keys() {
        if !cfg.levels.contains(configured) {
            return Err(MusterError::hierarchy(
                name,
                format!("designator set for unknown level `{configured}`"),
            ));
        }
    }
    Ok(Branch {
        name: name.to_owned(),
        levels: cfg.levels.clone(),
        designators,
    })
}

/// Level names appearing in exactly one branch, lowercased.
fn derive_unique_terms(branches: &BTreeMap<String, Branch>) -> BTreeMap<String, String> {
    let mut owners: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for branch in branches.values() {
        for level in &branch.levels {
            owners
                .entry(level.to_lowercase())
                .or_default()
                .insert(branch.name.as_str());
        }
    }
    owners
        .into_iter()
        .filter_map(|(term, set)| {
            (set.len() == 1).then(|| {
                let owner = set.into_iter().next().unwrap_or_default();
                (term, owner.to_owned())
            })
        })
        .collect()
}
