//! Resolution of the trees sharing a face, edge or corner of a given tree.
//!
//! These are pure queries on a validated [`ConnectivityGraph`]. Face neighbors
//! are unique; edge and corner queries return only the *diagonal* neighbors,
//! i.e. those not already reachable through one of the faces (or, for corners,
//! edges) that bracket the entity.

use crate::mesh_error::MeshForestError;
use crate::topology::connectivity::ConnectivityGraph;
use crate::topology::cube::{
    CORNER_EDGES, CORNER_FACES, EDGE_CORNERS, EDGE_FACES, EDGES, FACE_CORNERS, FACES,
    corner_face_corner, edge_corner_end, edge_face_corners,
};
use crate::topology::orientation::{FaceAxes, face_permutation};

/// A resolved across-face neighbor together with its axis mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceTransform {
    pub ntree: usize,
    pub nface: u8,
    pub orientation: u8,
    pub axes: FaceAxes,
}

/// A tree sharing an edge diagonally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeTransform {
    pub ntree: usize,
    pub nedge: u8,
    /// Axis along the neighbor edge, then the two axes its index bits select.
    pub naxis: [u8; 3],
    /// The neighbor traverses the edge in the opposite direction.
    pub nflip: bool,
    /// Index of `nedge` within its group of four parallel edges.
    pub corners: u8,
}

impl EdgeTransform {
    fn new(ntree: usize, nedge: usize, nflip: bool) -> Self {
        let axis = nedge / 4;
        Self {
            ntree,
            nedge: nedge as u8,
            naxis: [
                axis as u8,
                if axis == 0 { 1 } else { 0 },
                if axis == 2 { 1 } else { 2 },
            ],
            nflip,
            corners: (nedge % 4) as u8,
        }
    }
}

/// A tree sharing a corner diagonally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CornerTransform {
    pub ntree: usize,
    pub ncorner: u8,
}

impl ConnectivityGraph {
    /// The neighbor across `face` of `tree`, or `None` on the domain boundary.
    pub fn resolve_face(&self, tree: usize, face: usize) -> Result<Option<FaceTransform>, MeshForestError> {
        Ok(self.face_neighbor(tree, face)?.map(|link| FaceTransform {
            ntree: link.tree,
            nface: link.face,
            orientation: link.orientation,
            axes: FaceAxes::expand(face, link.face as usize, link.orientation as usize),
        }))
    }

    /// Trees touching `edge` of `tree` only through that edge.
    ///
    /// Entries reachable across one of the two faces bracketing the edge are
    /// skipped. Flips are reported relative to the calling tree.
    pub fn resolve_edge(&self, tree: usize, edge: usize) -> Result<Vec<EdgeTransform>, MeshForestError> {
        let Some(global) = self.tree_edge(tree, edge)? else {
            return Ok(Vec::new());
        };
        let inconsistent = |reason: String| MeshForestError::InconsistentTransform {
            kind: "edge",
            tree,
            local: edge,
            reason,
        };

        // (neighbor tree, neighbor face, permuted face corners of this edge)
        let mut bracket: [Option<(usize, usize, [u8; 2])>; 2] = [None; 2];
        for (slot, &face) in bracket.iter_mut().zip(&EDGE_FACES[edge]) {
            let face = face as usize;
            if let Some(link) = self.face_neighbor(tree, face)? {
                let fc = edge_face_corners(edge, face)
                    .ok_or_else(|| inconsistent(format!("edge does not lie on face {face}")))?;
                let perm = face_permutation(face, link.face as usize, link.orientation as usize);
                *slot = Some((
                    link.tree,
                    link.face as usize,
                    [perm[fc[0] as usize], perm[fc[1] as usize]],
                ));
            }
        }

        let entries = self.edge_entries(global);
        let own = entries
            .iter()
            .position(|e| e.tree == tree && e.edge as usize == edge)
            .ok_or_else(|| inconsistent(format!("missing from global edge {global}")))?;
        let iflip = entries[own].flip;

        let mut out = Vec::new();
        let mut found = [false; 2];
        let mut flipped = 0usize;
        for (i, entry) in entries.iter().enumerate() {
            if i == own {
                continue;
            }
            let nedge = entry.edge as usize;
            let nflip = entry.flip ^ iflip;
            let mut now = [false; 2];
            for (k, b) in bracket.iter().enumerate() {
                let Some((ntree, nface, fc)) = *b else { continue };
                if ntree != entry.tree {
                    continue;
                }
                let Some(nfc) = edge_face_corners(nedge, nface) else {
                    continue;
                };
                let (lo, hi) = if nflip { (nfc[1], nfc[0]) } else { (nfc[0], nfc[1]) };
                if fc == [lo, hi] {
                    if found[k] || now[1 - k] {
                        return Err(inconsistent(format!(
                            "tree {} edge {nedge} matches a bracketing face twice",
                            entry.tree
                        )));
                    }
                    found[k] = true;
                    now[k] = true;
                } else if fc == [hi, lo] {
                    flipped += 1;
                }
            }
            if now[0] || now[1] {
                continue;
            }
            out.push(EdgeTransform::new(entry.tree, nedge, nflip));
        }

        let connected = bracket.iter().filter(|b| b.is_some()).count();
        if entries.len() + flipped != out.len() + 1 + connected {
            return Err(inconsistent(format!(
                "{} entries do not account for {} diagonal, {connected} face and {flipped} flipped neighbors",
                entries.len(),
                out.len()
            )));
        }
        Ok(out)
    }

    /// Trees touching `corner` of `tree` only through that corner.
    ///
    /// Entries reachable across one of the three faces or three edges meeting
    /// at the corner are skipped, as is the calling tree corner itself.
    pub fn resolve_corner(&self, tree: usize, corner: usize) -> Result<Vec<CornerTransform>, MeshForestError> {
        let Some(global) = self.tree_corner(tree, corner)? else {
            return Ok(Vec::new());
        };

        let mut reachable: Vec<(usize, usize)> = Vec::with_capacity(FACES + EDGES);
        for &face in &CORNER_FACES[corner] {
            let face = face as usize;
            let Some(link) = self.face_neighbor(tree, face)? else {
                continue;
            };
            let Some(fc) = corner_face_corner(corner, face) else {
                continue;
            };
            let perm = face_permutation(face, link.face as usize, link.orientation as usize);
            let ncorner = FACE_CORNERS[link.face as usize][perm[fc as usize] as usize];
            reachable.push((link.tree, ncorner as usize));
        }
        for &edge in &CORNER_EDGES[corner] {
            let edge = edge as usize;
            let Some(end) = edge_corner_end(edge, corner) else {
                continue;
            };
            for et in self.resolve_edge(tree, edge)? {
                let nend = end ^ usize::from(et.nflip);
                reachable.push((et.ntree, EDGE_CORNERS[et.nedge as usize][nend] as usize));
            }
        }

        let out = self
            .corner_entries(global)
            .iter()
            .map(|c| (c.tree, c.corner as usize))
            .filter(|&(ntree, ncorner)| {
                !(ntree == tree && ncorner == corner) && !reachable.contains(&(ntree, ncorner))
            })
            .map(|(ntree, ncorner)| CornerTransform {
                ntree,
                ncorner: ncorner as u8,
            })
            .collect();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::quadrant::{Quadrant, ROOT_LEN, quadrant_len};
    use crate::topology::builtin;
    use crate::topology::cube::CORNERS;
    use proptest::prelude::*;

    #[test]
    fn boundary_edge_has_no_transforms() {
        let conn = builtin::unit_cube().unwrap();
        for edge in 0..EDGES {
            assert!(conn.resolve_edge(0, edge).unwrap().is_empty());
        }
        for corner in 0..CORNERS {
            assert!(conn.resolve_corner(0, corner).unwrap().is_empty());
        }
        assert_eq!(conn.resolve_face(0, 3).unwrap(), None);
    }

    #[test]
    fn periodic_edge_sees_the_opposite_edge() {
        let conn = builtin::periodic().unwrap();
        let et = conn.resolve_edge(0, 0).unwrap();
        assert_eq!(et, vec![EdgeTransform::new(0, 3, false)]);
        assert_eq!(et[0].naxis, [0, 1, 2]);
        assert_eq!(et[0].corners, 3);

        let ct = conn.resolve_corner(0, 0).unwrap();
        assert_eq!(ct, vec![CornerTransform { ntree: 0, ncorner: 7 }]);
    }

    #[test]
    fn out_of_range_entities_are_errors() {
        let conn = builtin::periodic().unwrap();
        assert!(matches!(
            conn.resolve_edge(0, 12),
            Err(MeshForestError::EntityOutOfRange { kind: "edge", .. })
        ));
        assert!(matches!(
            conn.resolve_corner(1, 0),
            Err(MeshForestError::TreeOutOfRange { .. })
        ));
    }

    #[test]
    fn brick_interior_edge_has_one_diagonal() {
        let conn = builtin::brick([2, 2, 1], [false; 3]).unwrap();
        // tree 0 edge 11 (x = 1, y = 1) is the center line of the brick
        let et = conn.resolve_edge(0, 11).unwrap();
        assert_eq!(et, vec![EdgeTransform::new(3, 8, false)]);
    }

    /// Two cubes whose only edge record is tree 0's edge 5, on the glued face.
    fn two_cubes_with_lonely_edge() -> ConnectivityGraph {
        let mut arrays = builtin::two_cubes().unwrap().to_arrays();
        arrays.tree_to_edge = vec![-1; 2 * EDGES];
        arrays.tree_to_edge[5] = 0;
        arrays.ett_offset = vec![0, 1];
        arrays.edge_to_tree = vec![0];
        arrays.edge_to_edge = vec![5];
        ConnectivityGraph::from_arrays(&arrays).unwrap()
    }

    #[test]
    fn unaccounted_face_neighbor_breaks_the_edge_count() {
        let conn = two_cubes_with_lonely_edge();
        // tree 1 is reached across face 1 but has no entry on the edge
        assert!(matches!(
            conn.resolve_edge(0, 5),
            Err(MeshForestError::InconsistentTransform {
                kind: "edge",
                tree: 0,
                local: 5,
                ..
            })
        ));
        assert_eq!(conn.resolve_edge(0, 4).unwrap(), vec![]);
    }

    #[test]
    fn edge_matching_both_bracketing_faces_is_rejected() {
        // tree 0 faces 1 and 4 both glue onto tree 1, half-turned, so tree 1's
        // edge 6 is the image of tree 0's edge 5 across either face
        let mut arrays = builtin::two_cubes().unwrap().to_arrays();
        arrays.tree_to_tree = vec![0, 1, 0, 0, 1, 0, 0, 1, 1, 1, 1, 0];
        arrays.tree_to_face = vec![0, 18, 2, 3, 23, 5, 19, 1, 2, 3, 4, 22];
        arrays.tree_to_edge = vec![-1; 2 * EDGES];
        arrays.tree_to_edge[5] = 0;
        arrays.tree_to_edge[EDGES + 6] = 0;
        arrays.ett_offset = vec![0, 2];
        arrays.edge_to_tree = vec![0, 1];
        arrays.edge_to_edge = vec![5, 6 + EDGES as i8];
        let conn = ConnectivityGraph::from_arrays(&arrays).unwrap();
        let Err(MeshForestError::InconsistentTransform { kind, tree, local, reason }) =
            conn.resolve_edge(0, 5)
        else {
            panic!("edge 5 of tree 0 should not resolve");
        };
        assert_eq!((kind, tree, local), ("edge", 0, 5));
        assert!(reason.contains("twice"), "{reason}");
    }

    #[test]
    fn ghost_build_reports_inconsistent_edges() {
        use crate::algs::communicator::NoComm;
        use crate::algs::ghost::{NeighborClass, ghost_new};
        use crate::forest::Forest;
        use std::sync::Arc;

        let forest = Forest::new_uniform(Arc::new(two_cubes_with_lonely_edge()), 1, 0, 1).unwrap();
        assert!(ghost_new(&forest, &NoComm, NeighborClass::Face).is_ok());
        for class in [NeighborClass::FaceEdge, NeighborClass::Full] {
            assert!(matches!(
                ghost_new(&forest, &NoComm, class),
                Err(MeshForestError::InconsistentTransform { kind: "edge", .. })
            ));
        }
    }

    #[test]
    fn face_transform_moves_across_two_cubes() {
        let conn = builtin::two_cubes().unwrap();
        let ft = conn.resolve_face(0, 1).unwrap().unwrap();
        assert_eq!((ft.ntree, ft.nface, ft.orientation), (1, 0, 0));
        let h = quadrant_len(3);
        let q = Quadrant::new(ROOT_LEN - h, 2 * h, 5 * h, 3);
        let moved = q.face_neighbor(1).transform_face(&ft);
        assert_eq!(moved, Quadrant::new(0, 2 * h, 5 * h, 3));
    }

    #[test]
    fn edge_transforms_are_reciprocal() {
        let fixtures = [
            builtin::periodic(),
            builtin::rot_wrap(),
            builtin::rot_cubes(),
            builtin::shell(),
            builtin::sphere(),
            builtin::brick([2, 3, 2], [true, false, true]),
        ];
        for conn in fixtures {
            let conn = conn.unwrap();
            for tree in 0..conn.num_trees() {
                for edge in 0..EDGES {
                    for et in conn.resolve_edge(tree, edge).unwrap() {
                        let back = conn.resolve_edge(et.ntree, et.nedge as usize).unwrap();
                        assert!(
                            back.iter().any(|b| b.ntree == tree
                                && b.nedge as usize == edge
                                && b.nflip == et.nflip),
                            "tree {tree} edge {edge} -> {et:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn corner_transforms_are_reciprocal() {
        for conn in [builtin::rot_cubes(), builtin::brick([2, 2, 2], [false; 3])] {
            let conn = conn.unwrap();
            for tree in 0..conn.num_trees() {
                for corner in 0..CORNERS {
                    for ct in conn.resolve_corner(tree, corner).unwrap() {
                        let back = conn.resolve_corner(ct.ntree, ct.ncorner as usize).unwrap();
                        assert!(back.contains(&CornerTransform {
                            ntree: tree,
                            ncorner: corner as u8
                        }));
                    }
                }
            }
        }
    }

    fn fixture(index: usize) -> ConnectivityGraph {
        match index {
            0 => builtin::periodic(),
            1 => builtin::rot_wrap(),
            2 => builtin::two_wrap(),
            3 => builtin::rot_cubes(),
            4 => builtin::shell(),
            _ => builtin::sphere(),
        }
        .unwrap()
    }

    proptest! {
        #[test]
        fn face_link_is_an_involution(which in 0usize..6, tree_seed in 0usize..64, face in 0usize..6,
                                     level in 1u8..6, a in 0i32..32, b in 0i32..32, c in 0i32..32) {
            let conn = fixture(which);
            let tree = tree_seed % conn.num_trees();
            let Some(ft) = conn.resolve_face(tree, face).unwrap() else { return Ok(()); };
            let per = 1i32 << level;
            let h = quadrant_len(level);
            let mut coords = [a % per * h, b % per * h, c % per * h];
            // push the quadrant against the face
            coords[face / 2] = if face % 2 == 1 { ROOT_LEN - h } else { 0 };
            let q = Quadrant::with_coords(coords, level);

            let there = q.face_neighbor(face).transform_face(&ft);
            prop_assert!(there.is_inside_root());
            let back_ft = conn.resolve_face(ft.ntree, ft.nface as usize).unwrap().unwrap();
            prop_assert_eq!((back_ft.ntree, back_ft.nface as usize), (tree, face));
            prop_assert_eq!(back_ft.orientation, ft.orientation);
            let back = there.face_neighbor(ft.nface as usize).transform_face(&back_ft);
            prop_assert_eq!(back, q);
        }
    }
}
