//! Face orientation algebra for glued octree faces.
//!
//! Two faces glued together see each other's four face corners in one of
//! eight relative orders ([`FACE_PERMUTATIONS`]). A connectivity stores, per
//! face link, an orientation code `0..4`; together with the pair of local face
//! numbers it selects one of the eight permutations through
//! [`FACE_PERMUTATION_REFS`] and [`FACE_PERMUTATION_SETS`]. The code is
//! measured from the face with the lower reference, so both sides of a link
//! store the same code.

use crate::topology::cube::FACES;

/// Number of distinct orientation codes per face link.
pub const ORIENTATIONS: usize = 4;

/// The eight admissible permutations of a face's four corners.
pub const FACE_PERMUTATIONS: [[u8; 4]; 8] = [
    [0, 1, 2, 3],
    [0, 2, 1, 3],
    [1, 0, 3, 2],
    [1, 3, 0, 2],
    [2, 0, 3, 1],
    [2, 3, 0, 1],
    [3, 1, 2, 0],
    [3, 2, 1, 0],
];

/// Permutation indices per reference class and orientation code.
pub const FACE_PERMUTATION_SETS: [[u8; 4]; 3] = [[1, 2, 5, 6], [0, 3, 4, 7], [0, 4, 3, 7]];

/// Reference class per pair of glued local faces.
pub const FACE_PERMUTATION_REFS: [[u8; 6]; 6] = [
    [0, 1, 1, 0, 0, 1],
    [2, 0, 0, 1, 1, 0],
    [2, 0, 0, 1, 1, 0],
    [0, 2, 2, 0, 0, 1],
    [0, 2, 2, 0, 0, 1],
    [2, 0, 0, 2, 2, 0],
];

/// Index into [`FACE_PERMUTATIONS`] for a face glued to `nface` with `orientation`.
#[inline]
pub fn face_permutation_index(face: usize, nface: usize, orientation: usize) -> usize {
    let pref = FACE_PERMUTATION_REFS[face][nface] as usize;
    FACE_PERMUTATION_SETS[pref][orientation] as usize
}

/// Maps face-corner numbers of `face` to face-corner numbers of `nface`.
#[inline]
pub fn face_permutation(face: usize, nface: usize, orientation: usize) -> &'static [u8; 4] {
    &FACE_PERMUTATIONS[face_permutation_index(face, nface, orientation)]
}

/// Split a stored face code into `(neighbor face, orientation)`.
#[inline]
pub const fn split_face_code(code: u8) -> (usize, usize) {
    ((code as usize) % FACES, (code as usize) / FACES)
}

/// Combine a neighbor face and orientation into a stored face code.
#[inline]
pub const fn face_code(nface: usize, orientation: usize) -> u8 {
    (nface + FACES * orientation) as u8
}

/// Axis mapping between two glued faces.
///
/// `my_axis[0..2]` are the tangential axes of the local face and `my_axis[2]`
/// its normal; `target_axis` lists the corresponding axes of the neighbor face.
/// `edge_reverse[0..2]` flag reversed tangential axes and `edge_reverse[2]`
/// encodes the lower/upper combination of the two normals (`2 * my_upper +
/// target_upper`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceAxes {
    pub my_axis: [u8; 3],
    pub target_axis: [u8; 3],
    pub edge_reverse: [u8; 3],
}

impl FaceAxes {
    /// Expand a face link `(face → nface, orientation)` into its axis mapping.
    pub fn expand(face: usize, nface: usize, orientation: usize) -> Self {
        let mut my_axis = [0u8; 3];
        let mut target_axis = [0u8; 3];
        let mut edge_reverse = [0u8; 3];

        my_axis[0] = if face < 2 { 1 } else { 0 };
        my_axis[1] = if face < 4 { 2 } else { 1 };
        my_axis[2] = (face / 2) as u8;

        let reverse = (FACE_PERMUTATION_REFS[0][face]
            ^ FACE_PERMUTATION_REFS[0][nface]
            ^ u8::from(orientation == 0 || orientation == 3)) as usize;
        target_axis[reverse] = if nface < 2 { 1 } else { 0 };
        target_axis[1 - reverse] = if nface < 4 { 2 } else { 1 };
        target_axis[2] = (nface / 2) as u8;

        let reverse = usize::from(FACE_PERMUTATION_REFS[face][nface] == 1);
        edge_reverse[reverse] = (orientation & 1) as u8;
        edge_reverse[1 - reverse] = (orientation >> 1) as u8;
        edge_reverse[2] = (2 * (face & 1) + (nface & 1)) as u8;

        Self {
            my_axis,
            target_axis,
            edge_reverse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::cube::FACE_DUAL;

    #[test]
    fn permutations_are_bijections() {
        for p in FACE_PERMUTATIONS {
            let mut seen = [false; 4];
            for v in p {
                assert!(!seen[v as usize]);
                seen[v as usize] = true;
            }
        }
    }

    #[test]
    fn sets_pick_distinct_permutations() {
        for set in FACE_PERMUTATION_SETS {
            let mut s = set.to_vec();
            s.sort_unstable();
            s.dedup();
            assert_eq!(s.len(), 4);
            assert!(s.iter().all(|&i| (i as usize) < FACE_PERMUTATIONS.len()));
        }
    }

    #[test]
    fn opposite_faces_with_zero_orientation_map_identically() {
        // a brick-style gluing x+ -> x- keeps the face corner numbering
        for face in 0..FACES {
            let nface = FACE_DUAL[face] as usize;
            assert_eq!(face_permutation(face, nface, 0), &[0, 1, 2, 3]);
        }
    }

    #[test]
    fn reciprocal_permutations_are_inverse() {
        // both sides of a link store the same code; their permutations compose to the identity
        for face in 0..FACES {
            for nface in 0..FACES {
                for o in 0..ORIENTATIONS {
                    let fwd = face_permutation(face, nface, o);
                    let back = face_permutation(nface, face, o);
                    for fc in 0..4 {
                        assert_eq!(back[fwd[fc] as usize] as usize, fc, "{face} {nface} {o}");
                    }
                }
            }
        }
    }

    #[test]
    fn expand_identity_link() {
        let axes = FaceAxes::expand(1, 0, 0);
        assert_eq!(axes.my_axis, [1, 2, 0]);
        assert_eq!(axes.target_axis, [1, 2, 0]);
        assert_eq!(axes.edge_reverse, [0, 0, 2]);
    }

    #[test]
    fn face_codes_round_trip() {
        for nface in 0..FACES {
            for o in 0..ORIENTATIONS {
                assert_eq!(split_face_code(face_code(nface, o)), (nface, o));
            }
        }
    }
}
