//! Shared fixtures for the end-to-end scenario tests.
#![allow(dead_code)]

use std::collections::BTreeMap;

use muster_corpus::Corpus;
use muster_difficulty::{ExtractionProvider, ExtractionRow, ExtractionTable};
use muster_hierarchy::Hierarchy;
use muster_types::{Post, Record, StateId};

/// An idealized preprocessor: every path segment of the captured state is
/// extracted as a characterized pair. Stands in for the external regex
/// extractor in tests that need clean signals.
pub struct TruthfulExtractor {
    posts: BTreeMap<StateId, Post>,
}

impl TruthfulExtractor {
    pub fn new(corpus: &Corpus) -> Self {
        Self {
            posts: state_posts(corpus),
        }
    }
}

impl ExtractionProvider for TruthfulExtractor {
    fn extract(&self, records: &[Record]) -> ExtractionTable {
        let mut table = ExtractionTable::new();
        for record in records {
            let mut row = ExtractionRow::default();
            if let Some(post) = self.posts.get(&record.state_id) {
                row.characterized.insert(
                    "labeled-units".to_owned(),
                    post.segments
                        .iter()
                        .map(|seg| format!("{}:{}", seg.level, seg.designator.as_text()))
                        .collect(),
                );
            }
            table.insert((record.source_id, record.soldier_id), row);
        }
        table
    }
}

/// A lossy preprocessor whose completeness depends on the captured post:
/// non-colliding posts are extracted in full, colliding posts degrade to a
/// bare mid-level fragment plus a state-dependent amount of characterized
/// context. Produces a spread of difficulty tiers for rebalancer tests.
pub struct CoverageExtractor {
    posts: BTreeMap<StateId, Post>,
    hierarchy: Hierarchy,
}

impl CoverageExtractor {
    pub fn new(corpus: &Corpus, hierarchy: Hierarchy) -> Self {
        Self {
            posts: state_posts(corpus),
            hierarchy,
        }
    }

}

impl ExtractionProvider for CoverageExtractor {
    fn extract(&self, records: &[Record]) -> ExtractionTable {
        let mut table = ExtractionTable::new();
        for record in records {
            let Some(post) = self.posts.get(&record.state_id) else {
                table.insert((record.source_id, record.soldier_id), ExtractionRow::default());
                continue;
            };
            let mut row = ExtractionRow::default();
            if self.hierarchy.post_in_collision_position(post) {
                push_bare(&mut row, post, 1);
                let mut pairs = Vec::new();
                match record.state_id.0 % 3 {
                    0 => {}
                    1 => {
                        // Shared levels only: keeps the branch ambiguous but
                        // lifts complementarity into the middle band.
                        for idx in [0usize, 1] {
                            if let Some(seg) = post.segments.get(idx) {
                                pairs.push(format!("{}:{}", seg.level, seg.designator.as_text()));
                            }
                        }
                    }
                    _ => {
                        // The deepest level is branch-unique in the built-in
                        // catalog, so this rescues the soldier structurally.
                        if let Some(seg) = post.deepest() {
                            pairs.push(format!("{}:{}", seg.level, seg.designator.as_text()));
                        }
                    }
                }
                if !pairs.is_empty() {
                    row.characterized.insert("partial".to_owned(), pairs);
                }
            } else {
                row.characterized.insert(
                    "labeled-units".to_owned(),
                    post.segments
                        .iter()
                        .map(|seg| format!("{}:{}", seg.level, seg.designator.as_text()))
                        .collect(),
                );
            }
            table.insert((record.source_id, record.soldier_id), row);
        }
        table
    }
}

/// A small stand-in for the external regex preprocessor that actually reads
/// the raw text: `Division 3` / `3 Div` shapes become characterized pairs,
/// leftover digit runs and single letters become uncharacterized fragments.
/// Because it works from text alone it stays valid across rebalancer
/// regeneration.
pub struct TextExtractor {
    /// Lowercased label token -> canonical level name.
    labels: BTreeMap<String, String>,
}

impl TextExtractor {
    pub fn new(hierarchy: &Hierarchy) -> Self {
        let mut labels = BTreeMap::new();
        for branch in hierarchy.branches() {
            for level in branch.levels() {
                labels.insert(level.to_lowercase(), level.clone());
                labels.insert(
                    muster_catalog::level_abbreviation(level).to_lowercase(),
                    level.clone(),
                );
            }
        }
        Self { labels }
    }

    fn row_for(&self, text: &str) -> ExtractionRow {
        let tokens: Vec<String> = text
            .split(|c: char| c.is_whitespace() || ",/;-".contains(c))
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_owned())
            .filter(|t| !t.is_empty())
            .collect();

        let mut row = ExtractionRow::default();
        let mut pairs = Vec::new();
        let mut consumed = vec![false; tokens.len()];
        for idx in 0..tokens.len().saturating_sub(1) {
            if consumed[idx] || consumed[idx + 1] {
                continue;
            }
            let (a, b) = (&tokens[idx], &tokens[idx + 1]);
            if let (Some(level), true) = (self.labels.get(&a.to_lowercase()), is_designator(b)) {
                pairs.push(format!("{level}:{}", b.to_uppercase()));
                consumed[idx] = true;
                consumed[idx + 1] = true;
            } else if let (true, Some(level)) = (is_designator(a), self.labels.get(&b.to_lowercase()))
            {
                pairs.push(format!("{level}:{}", a.to_uppercase()));
                consumed[idx] = true;
                consumed[idx + 1] = true;
            }
        }
        if !pairs.is_empty() {
            row.characterized.insert("unit-shapes".to_owned(), pairs);
        }
        for (idx, token) in tokens.iter().enumerate() {
            if consumed[idx] {
                continue;
            }
            if token.chars().all(|c| c.is_ascii_digit()) {
                row.bare_numeric.push(token.clone());
            } else if token.len() == 1 && token.chars().all(char::is_alphabetic) {
                row.bare_alpha.push(token.to_uppercase());
            }
        }
        row
    }
}

fn is_designator(token: &str) -> bool {
    token.chars().all(|c| c.is_ascii_digit())
        || (token.len() == 1 && token.chars().all(char::is_alphabetic))
}

impl ExtractionProvider for TextExtractor {
    fn extract(&self, records: &[Record]) -> ExtractionTable {
        let mut table = ExtractionTable::new();
        for record in records {
            table.insert(
                (record.source_id, record.soldier_id),
                self.row_for(&record.raw_text),
            );
        }
        table
    }
}

fn push_bare(row: &mut ExtractionRow, post: &Post, level_index: usize) {
    if let Some(designator) = post.designator_at(level_index) {
        let text = designator.as_text();
        if text.chars().all(|c| c.is_ascii_digit()) {
            row.bare_numeric.push(text);
        } else {
            row.bare_alpha.push(text);
        }
    }
}

fn state_posts(corpus: &Corpus) -> BTreeMap<StateId, Post> {
    corpus
        .soldiers
        .iter()
        .flat_map(|s| s.states.iter())
        .map(|state| (state.state_id, state.post.clone()))
        .collect()
}

/// Two depth-4 branches sharing the pair (division, 7) and nothing else
/// below the top level. "7" is valid at exactly one level per branch, and
/// the non-shared levels are branch-unique terms.
pub const TWO_BRANCH_COLLISION_TOML: &str = r#"
[branches.alpha]
depth = 4
levels = ["sector", "division", "regiment", "company"]

[branches.alpha.valid_designators]
sector = [1, 2, 3]
division = [5, 6, 7, 8]
regiment = [20, 21, 22, 23, 24, 25]
company = ["A", "B", "C"]

[branches.beta]
depth = 4
levels = ["sector", "division", "battery", "gun"]

[branches.beta.valid_designators]
sector = [1, 2, 3]
division = [7, 9, 10, 11]
battery = [40, 41, 42, 43]
gun = ["X", "Y", "Z"]
"#;

/// One lone branch of depth 4; no collisions exist anywhere.
pub const SINGLE_BRANCH_TOML: &str = r#"
[branches.infantry]
depth = 4
levels = ["sector", "division", "regiment", "company"]

[branches.infantry.valid_designators]
sector = [1, 2, 3]
division = [1, 2, 3, 4, 5]
regiment = [1, 2, 3, 4, 5, 6, 7, 8]
company = ["A", "B", "C", "D"]
"#;
