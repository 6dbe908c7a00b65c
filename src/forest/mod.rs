//! The local part of a distributed forest of octrees.
//!
//! A [`Forest`] pairs the shared [`ConnectivityGraph`] with the partition table
//! and the quadrants this rank owns, stored per tree in Morton order.

pub mod partition;
pub mod quadrant;

use std::sync::Arc;

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshForestError;
use crate::topology::connectivity::ConnectivityGraph;

pub use partition::{GlobalPosition, PartitionTable};
pub use quadrant::{Contact, MAX_LEVEL, QMAX_LEVEL, Quadrant, ROOT_LEN, quadrant_len};

/// Quadrants owned by one rank, with their connectivity and partition.
#[derive(Debug, Clone)]
pub struct Forest {
    connectivity: Arc<ConnectivityGraph>,
    partition: PartitionTable,
    rank: usize,
    trees: Vec<Vec<Quadrant>>,
    /// Local index of the first quadrant of each tree, plus the total.
    offsets: Vec<usize>,
}

fn tree_offsets(trees: &[Vec<Quadrant>]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(trees.len() + 1);
    let mut acc = 0;
    offsets.push(0);
    for t in trees {
        acc += t.len();
        offsets.push(acc);
    }
    offsets
}

impl Forest {
    /// The part of a uniform refinement at `level` owned by `rank` of `size`.
    pub fn new_uniform(
        connectivity: Arc<ConnectivityGraph>,
        level: u8,
        rank: usize,
        size: usize,
    ) -> Result<Self, MeshForestError> {
        let num_trees = connectivity.num_trees();
        let partition = PartitionTable::uniform(num_trees, level, size)?;
        if rank >= size {
            return Err(MeshForestError::InvalidPartition(format!(
                "rank {rank} out of range for {size} ranks"
            )));
        }
        let per_tree = 1u128 << (3 * level as u32);
        let total = num_trees as u128 * per_tree;
        let begin = total * rank as u128 / size as u128;
        let end = total * (rank as u128 + 1) / size as u128;

        let mut trees = vec![Vec::new(); num_trees];
        if end > begin {
            trees[(begin / per_tree) as usize].reserve((end - begin).min(per_tree) as usize);
        }
        for g in begin..end {
            let tree = (g / per_tree) as usize;
            trees[tree].push(Quadrant::from_morton(level, (g % per_tree) as u64));
        }
        let offsets = tree_offsets(&trees);
        log::debug!(
            "[rank {rank}] uniform forest at level {level}: {} local quadrants",
            offsets[num_trees]
        );
        Ok(Self {
            connectivity,
            partition,
            rank,
            trees,
            offsets,
        })
    }

    /// Assemble a forest from explicit per-tree quadrant lists and validate it.
    pub fn from_parts(
        connectivity: Arc<ConnectivityGraph>,
        partition: PartitionTable,
        rank: usize,
        trees: Vec<Vec<Quadrant>>,
    ) -> Result<Self, MeshForestError> {
        let offsets = tree_offsets(&trees);
        let forest = Self {
            connectivity,
            partition,
            rank,
            trees,
            offsets,
        };
        forest.validate_invariants()?;
        Ok(forest)
    }

    /// Replace every quadrant selected by `refine` with its eight children.
    ///
    /// Quadrants at [`QMAX_LEVEL`] are never refined. Returns the number of
    /// refined quadrants. The partition stays valid since children keep their
    /// parent's position on the curve.
    pub fn refine_by<F>(&mut self, mut refine: F) -> usize
    where
        F: FnMut(usize, &Quadrant) -> bool,
    {
        let mut refined = 0;
        for (tree, quadrants) in self.trees.iter_mut().enumerate() {
            let mut next = Vec::with_capacity(quadrants.len());
            for q in quadrants.iter() {
                if q.level < QMAX_LEVEL && refine(tree, q) {
                    next.extend(q.children());
                    refined += 1;
                } else {
                    next.push(*q);
                }
            }
            *quadrants = next;
        }
        self.offsets = tree_offsets(&self.trees);
        log::debug!(
            "[rank {}] refined {refined} quadrants, now {} local",
            self.rank,
            self.local_num_quadrants()
        );
        refined
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityGraph> {
        &self.connectivity
    }

    pub fn partition(&self) -> &PartitionTable {
        &self.partition
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    pub fn num_procs(&self) -> usize {
        self.partition.num_procs()
    }

    #[inline]
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn local_num_quadrants(&self) -> usize {
        self.offsets[self.trees.len()]
    }

    /// Local quadrants of `tree` in Morton order (empty for foreign trees).
    pub fn tree_quadrants(&self, tree: usize) -> &[Quadrant] {
        self.trees.get(tree).map_or(&[], Vec::as_slice)
    }

    /// Local index of the first quadrant of `tree`.
    pub fn tree_offset(&self, tree: usize) -> usize {
        self.offsets[tree.min(self.trees.len())]
    }

    /// `(tree, local index, quadrant)` for all local quadrants.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &Quadrant)> + '_ {
        self.trees.iter().enumerate().flat_map(move |(tree, qs)| {
            let base = self.offsets[tree];
            qs.iter().enumerate().map(move |(i, q)| (tree, base + i, q))
        })
    }

    /// Local index of exactly `q` in `tree`, if present.
    pub fn find_local(&self, tree: usize, q: &Quadrant) -> Option<usize> {
        let quadrants = self.trees.get(tree)?;
        quadrants
            .binary_search(q)
            .ok()
            .map(|i| self.offsets[tree] + i)
    }
}

impl DebugInvariants for Forest {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Forest");
    }

    fn validate_invariants(&self) -> Result<(), MeshForestError> {
        let num_trees = self.connectivity.num_trees();
        if self.trees.len() != num_trees {
            return Err(MeshForestError::InvalidForest(format!(
                "{} quadrant lists for {num_trees} trees",
                self.trees.len()
            )));
        }
        if self.rank >= self.partition.num_procs() {
            return Err(MeshForestError::InvalidPartition(format!(
                "rank {} out of range for {} ranks",
                self.rank,
                self.partition.num_procs()
            )));
        }
        let end = self.partition.first_positions()[self.partition.num_procs()];
        if end != GlobalPosition::new(num_trees, 0) {
            return Err(MeshForestError::InvalidPartition(format!(
                "partition ends at {end:?} but the forest has {num_trees} trees"
            )));
        }
        for (tree, quadrants) in self.trees.iter().enumerate() {
            for q in quadrants {
                if !q.is_valid() || !q.is_inside_root() {
                    return Err(MeshForestError::InvalidQuadrant(format!(
                        "{q} in tree {tree}"
                    )));
                }
                let owner = self.partition.owner_of(tree, q);
                if owner != self.rank {
                    return Err(MeshForestError::InvalidForest(format!(
                        "{q} in tree {tree} belongs to rank {owner}, not {}",
                        self.rank
                    )));
                }
            }
            for w in quadrants.windows(2) {
                if w[0] >= w[1] || w[0].is_ancestor_of(&w[1]) {
                    return Err(MeshForestError::InvalidForest(format!(
                        "tree {tree}: {} and {} are unordered or overlap",
                        w[0], w[1]
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::builtin;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn uniform_forest_splits_trees() {
        let conn = Arc::new(builtin::two_cubes().unwrap());
        let f0 = Forest::new_uniform(conn.clone(), 2, 0, 2).unwrap();
        let f1 = Forest::new_uniform(conn, 2, 1, 2).unwrap();
        assert_eq!(f0.tree_quadrants(0).len(), 64);
        assert!(f0.tree_quadrants(1).is_empty());
        assert_eq!(f1.tree_quadrants(1).len(), 64);
        assert_eq!(f1.tree_offset(1), 0);
        f0.validate_invariants().unwrap();
        f1.validate_invariants().unwrap();
    }

    #[test]
    fn refine_keeps_order_and_ownership() {
        let conn = Arc::new(builtin::brick([2, 1, 1], [false; 3]).unwrap());
        let mut forest = Forest::new_uniform(conn, 1, 1, 3).unwrap();
        let before = forest.local_num_quadrants();
        let mut rng = SmallRng::seed_from_u64(42);
        let refined = forest.refine_by(|_, _| rng.gen_bool(0.3));
        assert_eq!(forest.local_num_quadrants(), before + 7 * refined);
        forest.validate_invariants().unwrap();
        for (tree, index, q) in forest.iter() {
            assert_eq!(forest.find_local(tree, q), Some(index));
        }
    }

    #[test]
    fn from_parts_rejects_foreign_quadrants() {
        let conn = Arc::new(builtin::two_cubes().unwrap());
        let partition = PartitionTable::uniform(2, 0, 2).unwrap();
        let ok = Forest::from_parts(conn.clone(), partition.clone(), 0, vec![vec![Quadrant::root()], vec![]]);
        assert!(ok.is_ok());
        let foreign = Forest::from_parts(conn.clone(), partition.clone(), 0, vec![vec![], vec![Quadrant::root()]]);
        assert!(matches!(foreign, Err(MeshForestError::InvalidForest(_))));
        let overlap = Forest::from_parts(
            conn,
            partition,
            0,
            vec![vec![Quadrant::root(), Quadrant::root().child(1)], vec![]],
        );
        assert!(overlap.is_err());
    }
}
