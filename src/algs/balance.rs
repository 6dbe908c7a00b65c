//! 2:1 balance check across faces, edges and corners.
//!
//! A forest is balanced for a neighbor class when no two leaves touching
//! through a contact of that class differ by more than one level. Each rank
//! checks its own quadrants against their smaller neighbors; the larger side
//! of every violating pair sees it. The per-rank verdicts are then shared so
//! all ranks return the same answer.

use itertools::iproduct;

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::exchange::exchange_counts_or_abandon;
use crate::algs::ghost::{FrameCache, GhostCommTags, GhostLayer, NeighborClass, ghost_new_with_tags};
use crate::forest::Forest;
use crate::forest::quadrant::{Contact, QMAX_LEVEL, Quadrant, quadrant_len};
use crate::mesh_error::MeshForestError;

/// Level of the leaf containing the finest cell `cell` of `tree`, if it is
/// local or a ghost.
fn covering_level(forest: &Forest, ghost: &GhostLayer, tree: usize, cell: &Quadrant) -> Option<u8> {
    let leaf = if forest.partition().owner_of(tree, cell) == forest.rank() {
        let leaves = forest.tree_quadrants(tree);
        let idx = leaves.partition_point(|l| l <= cell);
        *leaves.get(idx.checked_sub(1)?)?
    } else {
        let ghosts = ghost.tree_ghosts(tree);
        let idx = ghosts.partition_point(|g| g.quadrant <= *cell);
        ghosts.get(idx.checked_sub(1)?)?.quadrant
    };
    (leaf == *cell || leaf.is_ancestor_of(cell)).then_some(leaf.level)
}

/// Cells two levels finer than `q` inside its same-size neighbor `n` that touch `q`.
fn quarter_cells(q: &Quadrant, n: &Quadrant) -> Vec<Quadrant> {
    let level = q.level + 2;
    let hq = quadrant_len(level);
    let (qc, nc) = (q.coords(), n.coords());
    let range = |axis: usize| -> std::ops::RangeInclusive<i32> {
        if nc[axis] < qc[axis] {
            3..=3
        } else if nc[axis] > qc[axis] {
            0..=0
        } else {
            0..=3
        }
    };
    iproduct!(range(2), range(1), range(0))
        .map(|(k, j, i)| Quadrant::new(nc[0] + i * hq, nc[1] + j * hq, nc[2] + k * hq, level))
        .collect()
}

/// First local quadrant with a neighbor more than one level finer.
fn first_violation(
    forest: &Forest,
    ghost: &GhostLayer,
    class: NeighborClass,
) -> Result<Option<(usize, Quadrant, Contact)>, MeshForestError> {
    let mut cache = FrameCache::new(forest.connectivity());
    for (tree, _, q) in forest.iter() {
        if q.level + 2 > QMAX_LEVEL {
            continue;
        }
        for contact in class.contacts() {
            let n = contact.neighbor(q);
            let frames = cache.get(tree, n.outside_sides())?;
            if frames.is_empty() {
                continue;
            }
            for c in quarter_cells(q, &n) {
                let cell = c.corner_descendant(0, QMAX_LEVEL);
                for frame in frames {
                    let (ntree, ncell) = frame.apply(tree, &cell);
                    if covering_level(forest, ghost, ntree, &ncell).is_some_and(|l| l >= q.level + 2) {
                        return Ok(Some((tree, *q, contact)));
                    }
                }
            }
        }
    }
    Ok(None)
}

/// Whether the forest is 2:1 balanced for `class` (collective).
///
/// Builds a ghost layer for `class` and drops it before returning.
pub fn is_balanced<C>(forest: &Forest, comm: &C, class: NeighborClass) -> Result<bool, MeshForestError>
where
    C: Communicator,
{
    is_balanced_with_tags(forest, comm, class, GhostCommTags::from_base(CommTag::new(0x6200)))
}

/// [`is_balanced`] with explicit tags; the verdicts travel on the tag after `tags.ghosts`.
pub fn is_balanced_with_tags<C>(
    forest: &Forest,
    comm: &C,
    class: NeighborClass,
    tags: GhostCommTags,
) -> Result<bool, MeshForestError>
where
    C: Communicator,
{
    let ghost = ghost_new_with_tags(forest, comm, class, tags)?;
    let violation = first_violation(forest, &ghost, class);
    ghost.destroy();

    if let Ok(Some((tree, q, contact))) = &violation {
        log::debug!(
            "[rank {}] {q} in tree {tree} has a neighbor two levels finer through {contact:?}",
            forest.rank()
        );
    }
    let ballot = violation
        .as_ref()
        .map(|v| vec![usize::from(v.is_none()); comm.size()]);
    let votes = exchange_counts_or_abandon(
        comm,
        ballot.as_ref().map(Vec::as_slice).map_err(|&e| e),
        tags.ghosts.offset(1),
    )?;
    let me = comm.rank();
    let local = matches!(violation, Ok(None));
    Ok(local && votes.iter().enumerate().all(|(p, &v)| p == me || v == 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::topology::builtin;
    use std::sync::Arc;

    #[test]
    fn uniform_forests_are_balanced() {
        let conn = Arc::new(builtin::rot_cubes().unwrap());
        let forest = Forest::new_uniform(conn, 2, 0, 1).unwrap();
        assert_eq!(is_balanced(&forest, &NoComm, NeighborClass::Full), Ok(true));
    }

    #[test]
    fn corner_only_jump_is_detected() {
        let conn = Arc::new(builtin::unit_cube().unwrap());
        let mut forest = Forest::new_uniform(conn, 1, 0, 1).unwrap();
        let coarse = Quadrant::root().child(7);
        forest.refine_by(|_, q| *q != coarse);
        // the finest leaves meet `coarse` only at the center point of the cube
        let deep = Quadrant::root().child(0).child(7);
        forest.refine_by(|_, q| *q == deep);
        assert_eq!(is_balanced(&forest, &NoComm, NeighborClass::Face), Ok(true));
        assert_eq!(is_balanced(&forest, &NoComm, NeighborClass::FaceEdge), Ok(true));
        assert_eq!(is_balanced(&forest, &NoComm, NeighborClass::FaceCorner), Ok(false));
        assert_eq!(is_balanced(&forest, &NoComm, NeighborClass::Full), Ok(false));
    }

    #[test]
    fn face_jump_is_detected() {
        let conn = Arc::new(builtin::unit_cube().unwrap());
        let mut forest = Forest::new_uniform(conn, 1, 0, 1).unwrap();
        forest.refine_by(|_, q| *q == Quadrant::root().child(0));
        let deep = Quadrant::root().child(0).child(1);
        forest.refine_by(|_, q| *q == deep);
        assert_eq!(is_balanced(&forest, &NoComm, NeighborClass::Face), Ok(false));
    }

    #[test]
    fn quarter_cells_touch_the_contact() {
        let h = quadrant_len(1);
        let q = Quadrant::new(0, 0, 0, 1);
        assert_eq!(quarter_cells(&q, &q.face_neighbor(1)).len(), 16);
        assert_eq!(quarter_cells(&q, &q.edge_neighbor(11)).len(), 4);
        let corner = quarter_cells(&q, &q.corner_neighbor(7));
        assert_eq!(corner, vec![Quadrant::new(h, h, h, 3)]);
    }
}
