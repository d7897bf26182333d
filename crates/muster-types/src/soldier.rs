//! Soldiers and their latent state sequences.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{SoldierId, StateId};
use crate::post::Post;

/// Classification of the transition between two consecutive states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    /// Only the deepest designator changes.
    WithinLowestUnit,
    /// Same branch and sector, different mid-level unit.
    SameBranchDifferentMid,
    /// Same branch, different sector.
    SameBranchDifferentTop,
    /// The new post lies in a different branch. Rare by construction.
    CrossBranch,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WithinLowestUnit => f.write_str("within_lowest_unit"),
            Self::SameBranchDifferentMid => f.write_str("same_branch_different_mid"),
            Self::SameBranchDifferentTop => f.write_str("same_branch_different_top"),
            Self::CrossBranch => f.write_str("cross_branch"),
        }
    }
}

/// Soldier rank, rendered by clerks according to their rank style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    Private,
    Corporal,
    Sergeant,
    Lieutenant,
    Captain,
}

impl Rank {
    pub const ALL: [Self; 5] = [
        Self::Private,
        Self::Corporal,
        Self::Sergeant,
        Self::Lieutenant,
        Self::Captain,
    ];

    #[must_use]
    pub fn full(self) -> &'static str {
        match self {
            Self::Private => "Private",
            Self::Corporal => "Corporal",
            Self::Sergeant => "Sergeant",
            Self::Lieutenant => "Lieutenant",
            Self::Captain => "Captain",
        }
    }

    #[must_use]
    pub fn abbreviated(self) -> &'static str {
        match self {
            Self::Private => "Pvt",
            Self::Corporal => "Cpl",
            Self::Sergeant => "Sgt",
            Self::Lieutenant => "Lt",
            Self::Captain => "Capt",
        }
    }
}

/// One latent segment of a soldier's service: a reference to exactly one
/// post. States are total-ordered by `order` but carry no dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub state_id: StateId,
    /// 1-based position within the soldier's sequence.
    pub order: u8,
    pub post: Post,
    /// How this state was reached from its predecessor; `None` for the first.
    pub transfer: Option<TransferKind>,
}

/// A stable identity plus an ordered list of one to three states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Soldier {
    pub id: SoldierId,
    pub surname: String,
    pub initial: char,
    pub rank: Rank,
    pub states: Vec<State>,
}

impl Soldier {
    /// State at a 1-based ordinal, clipped to the soldier's state count.
    #[must_use]
    pub fn state_at_clipped(&self, ordinal: u8) -> &State {
        let idx = usize::from(ordinal.max(1) - 1).min(self.states.len() - 1);
        &self.states[idx]
    }

    #[must_use]
    pub fn state_by_id(&self, id: StateId) -> Option<&State> {
        self.states.iter().find(|s| s.state_id == id)
    }
}
