//! Soldier factory: state sequences over valid posts.

use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use muster_hierarchy::Hierarchy;
use muster_types::{
    Designator, PathSegment, Post, Rank, SeedPlan, Soldier, SoldierId, State, StateId,
    TransferKind,
};

use crate::config::RunConfig;
use crate::sampling::pick_weighted;

const SURNAMES: &[&str] = &[
    "Harker", "Whitcombe", "Ashdown", "Pellew", "Mercer", "Quill", "Standish", "Braddock",
    "Fenwick", "Osgood", "Tremaine", "Caldwell", "Iremonger", "Loxley", "Varnham", "Dunmore",
    "Ketteridge", "Alcott", "Severn", "Pomeroy", "Garrow", "Nethersole", "Birkett", "Stroud",
    "Halloran", "Maybrick", "Chivers", "Rampling", "Eastoe", "Woodrow", "Tansley", "Grimshaw",
    "Paxton", "Ludlow", "Crace", "Winterbourne", "Oake", "Verity", "Saxby", "Holloway",
];

const INITIALS: &[char] = &[
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'R', 'S', 'T', 'V',
    'W',
];

const RANK_WEIGHTS: [f64; 5] = [0.45, 0.20, 0.20, 0.10, 0.05];

/// Running cross-branch accounting shared across the whole soldier set.
/// A drawn cross-branch transition is downgraded whenever taking it would
/// push the cross-branch share above the cap.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossBranchTally {
    cross: u32,
    total: u32,
}

impl CrossBranchTally {
    /// Would one more cross-branch transition stay under `cap`?
    #[must_use]
    pub fn allows_cross(&self, cap: f64) -> bool {
        f64::from(self.cross + 1) <= cap * f64::from(self.total + 1)
    }

    pub fn record(&mut self, kind: TransferKind) {
        self.total += 1;
        if kind == TransferKind::CrossBranch {
            self.cross += 1;
        }
    }

    /// Remove a soldier's transitions before regeneration.
    pub fn remove(&mut self, kind: TransferKind) {
        self.total = self.total.saturating_sub(1);
        if kind == TransferKind::CrossBranch {
            self.cross = self.cross.saturating_sub(1);
        }
    }

    #[must_use]
    pub fn cross_fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.cross) / f64::from(self.total)
        }
    }
}

/// Builds soldiers: 1-3 states each, first post biased onto colliding pairs
/// per the configured coverage, transitions drawn from the configured
/// categorical with the cross-branch cap enforced.
pub struct SoldierFactory<'a> {
    hierarchy: &'a Hierarchy,
    config: &'a RunConfig,
    branch_names: Vec<String>,
    /// Branches that own at least one colliding (level, designator) pair
    /// below the top level, with those pairs.
    colliding: Vec<(String, Vec<(usize, Designator)>)>,
}

impl<'a> SoldierFactory<'a> {
    #[must_use]
    pub fn new(hierarchy: &'a Hierarchy, config: &'a RunConfig) -> Self {
        let branch_names: Vec<String> =
            hierarchy.branch_names().iter().map(|&s| s.to_owned()).collect();
        let colliding = branch_names
            .iter()
            .filter_map(|name| {
                let pairs = hierarchy.colliding_pairs_in(name);
                (!pairs.is_empty()).then(|| (name.clone(), pairs))
            })
            .collect();
        Self {
            hierarchy,
            config,
            branch_names,
            colliding,
        }
    }

    /// Build the full soldier set under the seed plan.
    pub fn build_all(
        &self,
        plan: SeedPlan,
        next_state_id: &mut u32,
        tally: &mut CrossBranchTally,
    ) -> Vec<Soldier> {
        (0..self.config.soldier_count)
            .map(|n| {
                let id = SoldierId(n + 1);
                self.build_soldier(id, plan.soldier(id), next_state_id, tally)
            })
            .collect()
    }

    /// Build one soldier from its derived seed. Used both for the initial
    /// pass and for rebalancer regeneration (with a rebalance-derived seed).
    pub fn build_soldier(
        &self,
        id: SoldierId,
        seed: u64,
        next_state_id: &mut u32,
        tally: &mut CrossBranchTally,
    ) -> Soldier {
        let mut rng = StdRng::seed_from_u64(seed);

        let surname = (*SURNAMES.choose(&mut rng).unwrap_or(&"Marsh")).to_owned();
        let initial = *INITIALS.choose(&mut rng).unwrap_or(&'M');
        let rank = Rank::ALL[pick_weighted(&mut rng, &RANK_WEIGHTS)];

        let state_count = pick_weighted(&mut rng, &self.config.state_count_weights) + 1;
        let first_post = if rng.gen::<f64>() < self.config.collision_coverage {
            self.sample_colliding_post(&mut rng)
        } else {
            self.sample_post(&mut rng, None)
        };

        let mut states = Vec::with_capacity(state_count);
        let mut alloc_state = |post: Post, order: u8, transfer: Option<TransferKind>| {
            *next_state_id += 1;
            State {
                state_id: StateId(*next_state_id),
                order,
                post,
                transfer,
            }
        };
        states.push(alloc_state(first_post, 1, None));

        for order in 2..=state_count as u8 {
            let Some((post, kind)) = self.sample_transition(&mut rng, &states, tally) else {
                debug!(soldier = %id, order, "no distinct transition post found; truncating");
                break;
            };
            tally.record(kind);
            states.push(alloc_state(post, order, Some(kind)));
        }

        Soldier {
            id,
            surname,
            initial,
            rank,
            states,
        }
    }

    /// Sample a full post; `branch` pins the branch when given.
    fn sample_post(&self, rng: &mut StdRng, branch: Option<&str>) -> Post {
        let name = branch.map_or_else(
            || {
                self.branch_names[rng.gen_range(0..self.branch_names.len())].clone()
            },
            str::to_owned,
        );
        self.sample_post_fixing(rng, &name, None)
    }

    /// Sample a post passing through a colliding pair, when any branch has
    /// one; falls back to an unbiased draw otherwise.
    fn sample_colliding_post(&self, rng: &mut StdRng) -> Post {
        if self.colliding.is_empty() {
            return self.sample_post(rng, None);
        }
        let (branch, pairs) = &self.colliding[rng.gen_range(0..self.colliding.len())];
        let (level_index, designator) = &pairs[rng.gen_range(0..pairs.len())];
        self.sample_post_fixing(rng, branch, Some((*level_index, designator.clone())))
    }

    fn sample_post_fixing(
        &self,
        rng: &mut StdRng,
        branch: &str,
        fixed: Option<(usize, Designator)>,
    ) -> Post {
        let Some(b) = self.hierarchy.branch(branch) else {
            // Factory construction only enumerates known branches.
            return Post::new(branch, std::iter::empty());
        };
        let segments = (0..b.depth()).map(|idx| {
            let designator = match &fixed {
                Some((fixed_idx, value)) if *fixed_idx == idx => value.clone(),
                _ => {
                    let set = b.designators_at(idx);
                    set[rng.gen_range(0..set.len())].clone()
                }
            };
            PathSegment::new(b.levels()[idx].clone(), designator)
        });
        Post::new(branch, segments)
    }

    /// Draw a transition type and a consistent, distinct post. Falls through
    /// weaker transition kinds when the drawn one cannot produce a distinct
    /// post, and downgrades cross-branch draws that would breach the cap.
    fn sample_transition(
        &self,
        rng: &mut StdRng,
        states: &[State],
        tally: &CrossBranchTally,
    ) -> Option<(Post, TransferKind)> {
        let prev = &states[states.len() - 1].post;
        let mut kind = match pick_weighted(rng, &self.config.transition_weights) {
            0 => TransferKind::WithinLowestUnit,
            1 => TransferKind::SameBranchDifferentMid,
            2 => TransferKind::SameBranchDifferentTop,
            _ => TransferKind::CrossBranch,
        };
        if kind == TransferKind::CrossBranch && !tally.allows_cross(self.config.cross_branch_cap) {
            kind = TransferKind::SameBranchDifferentTop;
        }

        let fallback_order = [
            kind,
            TransferKind::SameBranchDifferentMid,
            TransferKind::SameBranchDifferentTop,
            TransferKind::WithinLowestUnit,
        ];
        for candidate in fallback_order {
            for _ in 0..8 {
                let Some(post) = self.transition_post(rng, prev, candidate) else {
                    break;
                };
                if states.iter().all(|s| s.post != post) {
                    return Some((post, candidate));
                }
            }
        }
        None
    }

    fn transition_post(&self, rng: &mut StdRng, prev: &Post, kind: TransferKind) -> Option<Post> {
        let branch = self.hierarchy.branch(&prev.branch)?;
        match kind {
            TransferKind::WithinLowestUnit => {
                let deepest = branch.depth() - 1;
                let set = branch.designators_at(deepest);
                let current = prev.designator_at(deepest)?;
                if !set.iter().any(|c| c != current) {
                    return None;
                }
                let replacement = loop {
                    let candidate = &set[rng.gen_range(0..set.len())];
                    if candidate != current {
                        break candidate.clone();
                    }
                };
                let mut segments: Vec<PathSegment> = prev.segments.to_vec();
                segments[deepest].designator = replacement;
                Some(Post::new(prev.branch.clone(), segments))
            }
            TransferKind::SameBranchDifferentMid => {
                let set = branch.designators_at(1);
                let current = prev.designator_at(1)?;
                if !set.iter().any(|c| c != current) {
                    return None;
                }
                let mid = loop {
                    let candidate = &set[rng.gen_range(0..set.len())];
                    if candidate != current {
                        break candidate.clone();
                    }
                };
                let segments = (0..branch.depth()).map(|idx| {
                    let designator = match idx {
                        0 => prev.designator_at(0).cloned().unwrap_or_else(|| mid.clone()),
                        1 => mid.clone(),
                        _ => {
                            let deep = branch.designators_at(idx);
                            deep[rng.gen_range(0..deep.len())].clone()
                        }
                    };
                    PathSegment::new(branch.levels()[idx].clone(), designator)
                });
                Some(Post::new(prev.branch.clone(), segments))
            }
            TransferKind::SameBranchDifferentTop => {
                let set = branch.designators_at(0);
                let current = prev.designator_at(0)?;
                if !set.iter().any(|c| c != current) {
                    return None;
                }
                let top = loop {
                    let candidate = &set[rng.gen_range(0..set.len())];
                    if candidate != current {
                        break candidate.clone();
                    }
                };
                let segments = (0..branch.depth()).map(|idx| {
                    let designator = if idx == 0 {
                        top.clone()
                    } else {
                        let deep = branch.designators_at(idx);
                        deep[rng.gen_range(0..deep.len())].clone()
                    };
                    PathSegment::new(branch.levels()[idx].clone(), designator)
                });
                Some(Post::new(prev.branch.clone(), segments))
            }
            TransferKind::CrossBranch => {
                if self.branch_names.len() < 2 {
                    return None;
                }
                let target = loop {
                    let candidate = &self.branch_names[rng.gen_range(0..self.branch_names.len())];
                    if *candidate != prev.branch {
                        break candidate.clone();
                    }
                };
                Some(self.sample_post_fixing(rng, &target, None))
            }
        }
    }
}
