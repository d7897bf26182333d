//! Situations: operational contexts bundling a three-tier vocabulary pool.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use muster_error::{MusterError, Result};
use muster_hierarchy::Hierarchy;

/// Vocabulary pool partitioned by draw priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyPool {
    pub primary: Vec<String>,
    pub secondary: Vec<String>,
    pub rare: Vec<String>,
}

impl VocabularyPool {
    pub fn iter_all(&self) -> impl Iterator<Item = &str> {
        self.primary
            .iter()
            .chain(&self.secondary)
            .chain(&self.rare)
            .map(String::as_str)
    }
}

/// A named operational context. Fixed at source creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Situation {
    pub id: String,
    pub allowed_branches: Vec<String>,
    pub vocabulary: VocabularyPool,
}

impl Situation {
    pub fn validate(&self, hierarchy: &Hierarchy) -> Result<()> {
        if self.vocabulary.primary.is_empty()
            || self.vocabulary.secondary.is_empty()
            || self.vocabulary.rare.is_empty()
        {
            return Err(MusterError::situation(&self.id, "a vocabulary layer is empty"));
        }
        if self.allowed_branches.is_empty() {
            return Err(MusterError::situation(&self.id, "no allowed branches"));
        }
        for branch in &self.allowed_branches {
            if hierarchy.branch(branch).is_none() {
                return Err(MusterError::situation(
                    &self.id,
                    format!("allowed branch `{branch}` is unknown"),
                ));
            }
        }
        // Situational terms are signal about the operational context only;
        // a term that doubles as a branch-unique level name would leak
        // branch identity through the vocabulary layer.
        for term in self.vocabulary.iter_all() {
            if let Some(owner) = hierarchy.unique_term_branch(term) {
                return Err(MusterError::situation(
                    &self.id,
                    format!("vocabulary term `{term}` is a unique level name of `{owner}`"),
                ));
            }
        }
        Ok(())
    }
}

/// The catalog of situations.
#[derive(Debug, Clone)]
pub struct SituationRegistry {
    by_id: BTreeMap<String, Situation>,
}

impl SituationRegistry {
    pub fn new(situations: Vec<Situation>, hierarchy: &Hierarchy) -> Result<Self> {
        let mut by_id = BTreeMap::new();
        for situation in situations {
            situation.validate(hierarchy)?;
            if by_id.insert(situation.id.clone(), situation.clone()).is_some() {
                return Err(MusterError::situation(&situation.id, "duplicate situation id"));
            }
        }
        if by_id.is_empty() {
            return Err(MusterError::situation("<none>", "situation catalog is empty"));
        }
        Ok(Self { by_id })
    }

    pub fn builtin(hierarchy: &Hierarchy) -> Result<Self> {
        Self::new(builtin_situations(), hierarchy)
    }

    /// Load a situation catalog document (`[[situations]]` TOML list).
    pub fn load(path: &std::path::Path, hierarchy: &Hierarchy) -> Result<Self> {
        #[derive(serde::Deserialize)]
        struct Doc {
            situations: Vec<Situation>,
        }
        let text = std::fs::read_to_string(path).map_err(|source| MusterError::ArtifactIo {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: Doc = toml::from_str(&text).map_err(|e| MusterError::ConfigParse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Self::new(doc.situations, hierarchy)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Situation> {
        self.by_id.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Situation> {
        self.by_id.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Situations whose allowed branches include `branch`.
    #[must_use]
    pub fn compatible_with(&self, branch: &str) -> Vec<&Situation> {
        self.by_id
            .values()
            .filter(|s| s.allowed_branches.iter().any(|b| b == branch))
            .collect()
    }
}

fn situation(id: &str, branches: &[&str], primary: &[&str], secondary: &[&str], rare: &[&str]) -> Situation {
    let own = |words: &[&str]| words.iter().map(|w| (*w).to_owned()).collect();
    Situation {
        id: id.to_owned(),
        allowed_branches: own(branches),
        vocabulary: VocabularyPool {
            primary: own(primary),
            secondary: own(secondary),
            rare: own(rare),
        },
    }
}

fn builtin_situations() -> Vec<Situation> {
    vec![
        situation(
            "convoy-escort",
            &["naval", "air"],
            &["convoy", "escort", "lanes"],
            &["lookout", "signalled"],
            &["stragglers"],
        ),
        situation(
            "winter-quarters",
            &["infantry", "artillery", "cavalry"],
            &["quarters", "billet", "fuel"],
            &["forage", "drill"],
            &["frostbite"],
        ),
        situation(
            "field-exercise",
            &["infantry", "artillery", "cavalry", "naval", "air"],
            &["exercise", "umpire", "scheme"],
            &["withdrawal", "night-march"],
            &["misfire"],
        ),
        situation(
            "embarkation",
            &["naval", "infantry"],
            &["embarked", "gangway", "tide"],
            &["baggage", "tally"],
            &["seasick"],
        ),
        situation(
            "epidemic-response",
            &["infantry", "artillery", "cavalry", "naval", "air"],
            &["quarantine", "inoculation", "fever"],
            &["isolation", "sanitary"],
            &["delousing"],
        ),
        situation(
            "frontier-patrol",
            &["infantry", "cavalry", "air"],
            &["patrol", "picquet", "frontier"],
            &["remounts", "waterhole"],
            &["sandstorm"],
        ),
    ]
}
