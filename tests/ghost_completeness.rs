//! Ghost layers of randomly refined forests checked against brute-force
//! geometric adjacency.

mod util;

use std::collections::BTreeSet;
use std::sync::Arc;

use mesh_forest::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use util::{brick_box, class_admits, contact_dim, physical_corners, run_ranks, uniform_forests};

const DIMS: [usize; 3] = [2, 2, 1];
const PERIODIC: [bool; 3] = [true, false, false];

fn random_forests(size: usize, seed: u64) -> Vec<Forest> {
    let conn = Arc::new(builtin::brick(DIMS, PERIODIC).unwrap());
    let mut forests = uniform_forests(&conn, 1, size);
    for (rank, forest) in forests.iter_mut().enumerate() {
        let mut rng = SmallRng::seed_from_u64(seed ^ (rank as u64 * 0x9E37_79B9));
        for _ in 0..2 {
            forest.refine_by(|_, _| rng.gen_bool(0.3));
        }
        forest.validate_invariants().unwrap();
    }
    forests
}

fn check_layer(forests: &[Forest], rank: usize, ghost: &GhostLayer, class: NeighborClass) {
    ghost.validate_invariants().unwrap();
    let forest = &forests[rank];
    let local: Vec<_> = forest.iter().map(|(t, _, q)| brick_box(DIMS, t, q)).collect();

    for (owner, other) in forests.iter().enumerate() {
        if owner == rank {
            continue;
        }
        for (tree, idx, q) in other.iter() {
            let b = brick_box(DIMS, tree, q);
            let adjacent = local
                .iter()
                .any(|&l| contact_dim(l, b, DIMS, PERIODIC).is_some_and(|d| class_admits(class, d)));
            if !adjacent {
                continue;
            }
            let Some(i) = ghost.bsearch(Some(owner), Some(tree), q) else {
                panic!("rank {rank} is missing {q} of tree {tree} from rank {owner} ({class:?})");
            };
            let g = ghost.ghosts()[i];
            assert_eq!(g.piggy.owner_local, idx);
            assert_eq!(g.piggy.owner_rank, owner);
        }
    }
    // every ghost is a real leaf of its owner
    for g in ghost.ghosts() {
        assert_eq!(
            forests[g.rank()].find_local(g.tree(), &g.quadrant),
            Some(g.piggy.owner_local)
        );
    }
}

#[test]
fn random_refinements_have_complete_layers() {
    for seed in [7u64, 42, 2024] {
        let forests = random_forests(3, seed);
        for class in [
            NeighborClass::Face,
            NeighborClass::FaceEdge,
            NeighborClass::FaceCorner,
            NeighborClass::Full,
        ] {
            let layers = run_ranks(3, |comm| ghost_new(&forests[comm.rank()], &comm, class).unwrap());
            for (rank, ghost) in layers.iter().enumerate() {
                check_layer(&forests, rank, ghost, class);
            }
        }
    }
}

/// Contact dimension of two equal-size leaves of a conforming mesh from the
/// number of corners they share.
fn shared_corner_dim(a: &[[i64; 3]], b: &[[i64; 3]]) -> Option<usize> {
    match a.iter().filter(|&p| b.contains(p)).count() {
        0 => None,
        1 => Some(0),
        2 => Some(1),
        4 => Some(2),
        n => panic!("distinct leaves share {n} corners"),
    }
}

#[test]
fn rotated_trees_match_vertex_adjacency() {
    const SIZE: usize = 4;
    let conn = Arc::new(builtin::rot_cubes().unwrap());
    let forests = uniform_forests(&conn, 2, SIZE);
    let corners: Vec<Vec<_>> = forests
        .iter()
        .map(|f| {
            f.iter()
                .map(|(t, i, q)| (t, i, *q, physical_corners(&conn, t, q)))
                .collect()
        })
        .collect();

    for class in [
        NeighborClass::Face,
        NeighborClass::FaceEdge,
        NeighborClass::FaceCorner,
        NeighborClass::Full,
    ] {
        let layers = run_ranks(SIZE, |comm| ghost_new(&forests[comm.rank()], &comm, class).unwrap());
        for (rank, ghost) in layers.iter().enumerate() {
            ghost.validate_invariants().unwrap();
            let mut expected = BTreeSet::new();
            for (owner, leaves) in corners.iter().enumerate() {
                if owner == rank {
                    continue;
                }
                for (tree, _, q, pts) in leaves {
                    let adjacent = corners[rank]
                        .iter()
                        .any(|(_, _, _, mine)| shared_corner_dim(mine, pts).is_some_and(|d| class_admits(class, d)));
                    if adjacent {
                        expected.insert((owner, *tree, *q));
                    }
                }
            }
            let actual: BTreeSet<_> = ghost
                .ghosts()
                .iter()
                .map(|g| (g.rank(), g.tree(), g.quadrant))
                .collect();
            assert!(!expected.is_empty(), "rank {rank} ({class:?})");
            if class == NeighborClass::FaceCorner {
                // the corner class is only required to be complete here
                assert!(expected.is_subset(&actual), "rank {rank} ({class:?})");
            } else {
                assert_eq!(actual, expected, "rank {rank} ({class:?})");
            }
            for g in ghost.ghosts() {
                assert_eq!(
                    forests[g.rank()].find_local(g.tree(), &g.quadrant),
                    Some(g.piggy.owner_local)
                );
            }
        }
    }
}

#[test]
fn finer_classes_contain_coarser_ones() {
    let forests = random_forests(3, 99);
    let layers = run_ranks(3, |comm| {
        let forest = &forests[comm.rank()];
        let face = ghost_new(forest, &comm, NeighborClass::Face).unwrap();
        let full = ghost_new(forest, &comm, NeighborClass::Full).unwrap();
        (face, full)
    });
    for (face, full) in &layers {
        for g in face.ghosts() {
            assert!(full.bsearch(Some(g.rank()), Some(g.tree()), &g.quadrant).is_some());
        }
        assert!(full.len() >= face.len());
    }
}

#[test]
fn empty_ranks_take_part() {
    // more ranks than level-0 quadrants: ranks 0, 1 and 3 own nothing
    let conn = Arc::new(builtin::two_cubes().unwrap());
    let forests = uniform_forests(&conn, 0, 5);
    let layers = run_ranks(5, |comm| {
        ghost_new(&forests[comm.rank()], &comm, NeighborClass::Full).unwrap()
    });
    for (rank, ghost) in layers.iter().enumerate() {
        let owns = forests[rank].local_num_quadrants() > 0;
        assert_eq!(ghost.len(), usize::from(owns), "rank {rank}");
        ghost.validate_invariants().unwrap();
    }
}
