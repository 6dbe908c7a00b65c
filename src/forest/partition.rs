//! Space-filling-curve partition of a forest across ranks.
//!
//! Rank `r` owns every quadrant whose position `(tree, morton key)` lies in
//! `[first[r], first[r + 1])`. A rank without quadrants repeats the position of
//! the next rank. The table always ends with `(num_trees, 0)`.

use serde::{Deserialize, Serialize};

use crate::forest::quadrant::{MAX_LEVEL, QMAX_LEVEL, Quadrant};
use crate::mesh_error::MeshForestError;

/// A point on the global space-filling curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct GlobalPosition {
    pub tree: usize,
    pub key: u64,
}

impl GlobalPosition {
    pub fn new(tree: usize, key: u64) -> Self {
        Self { tree, key }
    }

    /// Position of a quadrant's anchor in `tree`.
    pub fn of(tree: usize, q: &Quadrant) -> Self {
        Self::new(tree, q.morton_key())
    }
}

/// First positions of all ranks, plus the end marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionTable {
    first: Vec<GlobalPosition>,
}

impl PartitionTable {
    /// Validate a table of `num_procs + 1` first positions.
    pub fn new(first: Vec<GlobalPosition>, num_trees: usize) -> Result<Self, MeshForestError> {
        if first.len() < 2 {
            return Err(MeshForestError::InvalidPartition(format!(
                "need at least two positions, got {}",
                first.len()
            )));
        }
        if first[0] != GlobalPosition::default() {
            return Err(MeshForestError::InvalidPartition(format!(
                "first position is {:?}, expected the start of tree 0",
                first[0]
            )));
        }
        let end = GlobalPosition::new(num_trees, 0);
        if first[first.len() - 1] != end {
            return Err(MeshForestError::InvalidPartition(format!(
                "last position is {:?}, expected {end:?}",
                first[first.len() - 1]
            )));
        }
        if let Some(r) = first.windows(2).position(|w| w[0] > w[1]) {
            return Err(MeshForestError::InvalidPartition(format!(
                "positions of ranks {r} and {} are out of order",
                r + 1
            )));
        }
        if first[..first.len() - 1]
            .iter()
            .any(|p| p.key >= 1u64 << (3 * MAX_LEVEL as u32))
        {
            return Err(MeshForestError::InvalidPartition(
                "morton key outside of the tree".into(),
            ));
        }
        Ok(Self { first })
    }

    /// Split a uniform refinement of `num_trees` trees at `level` evenly over `size` ranks.
    pub fn uniform(num_trees: usize, level: u8, size: usize) -> Result<Self, MeshForestError> {
        if size == 0 {
            return Err(MeshForestError::InvalidPartition("zero ranks".into()));
        }
        if level > QMAX_LEVEL {
            return Err(MeshForestError::InvalidQuadrant(format!(
                "level {level} exceeds {QMAX_LEVEL}"
            )));
        }
        let per_tree = 1u128 << (3 * level as u32);
        let total = num_trees as u128 * per_tree;
        let first = (0..=size)
            .map(|r| {
                let g = total * r as u128 / size as u128;
                let tree = (g / per_tree) as usize;
                if tree == num_trees {
                    GlobalPosition::new(num_trees, 0)
                } else {
                    GlobalPosition::of(tree, &Quadrant::from_morton(level, (g % per_tree) as u64))
                }
            })
            .collect();
        Self::new(first, num_trees)
    }

    /// Number of ranks.
    #[inline]
    pub fn num_procs(&self) -> usize {
        self.first.len() - 1
    }

    pub fn first_positions(&self) -> &[GlobalPosition] {
        &self.first
    }

    /// `[first, next)` of `rank`.
    pub fn range(&self, rank: usize) -> (GlobalPosition, GlobalPosition) {
        (self.first[rank], self.first[rank + 1])
    }

    /// Rank without quadrants.
    pub fn is_empty(&self, rank: usize) -> bool {
        self.first[rank] == self.first[rank + 1]
    }

    /// Owner of a curve position: the last rank whose first position is `<= pos`.
    pub fn owner_of_position(&self, pos: GlobalPosition) -> usize {
        let idx = self.first.partition_point(|p| *p <= pos);
        idx.saturating_sub(1).min(self.num_procs() - 1)
    }

    /// Owner of an inside-root quadrant of `tree`.
    #[inline]
    pub fn owner_of(&self, tree: usize, q: &Quadrant) -> usize {
        self.owner_of_position(GlobalPosition::of(tree, q))
    }

    /// Ranks owning any part of the curve segment `[lo, hi]`, in order.
    pub fn owner_range(&self, lo: GlobalPosition, hi: GlobalPosition) -> std::ops::RangeInclusive<usize> {
        self.owner_of_position(lo)..=self.owner_of_position(hi)
    }
}
