//! Incidence tables of the unit cube.
//!
//! Faces are numbered `-x, +x, -y, +y, -z, +z`; corners by their `(z, y, x)`
//! bits; edges in three groups of four parallel to the x, y and z axes. A
//! face's four corners are listed in increasing order, which defines the local
//! "face corner" numbering used by the orientation tables.
//!
//! Negative entries mean "not incident".

/// Faces of a tree.
pub const FACES: usize = 6;
/// Edges of a tree.
pub const EDGES: usize = 12;
/// Corners (and children) of a tree or quadrant.
pub const CORNERS: usize = 8;

/// Corners bounding each face, in face-corner order.
pub const FACE_CORNERS: [[u8; 4]; 6] = [
    [0, 2, 4, 6],
    [1, 3, 5, 7],
    [0, 1, 4, 5],
    [2, 3, 6, 7],
    [0, 1, 2, 3],
    [4, 5, 6, 7],
];

/// Edges bounding each face.
pub const FACE_EDGES: [[u8; 4]; 6] = [
    [4, 6, 8, 10],
    [5, 7, 9, 11],
    [0, 2, 8, 9],
    [1, 3, 10, 11],
    [0, 1, 4, 5],
    [2, 3, 6, 7],
];

/// The face opposite to each face.
pub const FACE_DUAL: [u8; 6] = [1, 0, 3, 2, 5, 4];

/// The two faces meeting at each edge.
pub const EDGE_FACES: [[u8; 2]; 12] = [
    [2, 4],
    [3, 4],
    [2, 5],
    [3, 5],
    [0, 4],
    [1, 4],
    [0, 5],
    [1, 5],
    [0, 2],
    [1, 2],
    [0, 3],
    [1, 3],
];

/// The two corners bounding each edge.
pub const EDGE_CORNERS: [[u8; 2]; 12] = [
    [0, 1],
    [2, 3],
    [4, 5],
    [6, 7],
    [0, 2],
    [1, 3],
    [4, 6],
    [5, 7],
    [0, 4],
    [1, 5],
    [2, 6],
    [3, 7],
];

/// For an edge and a face, the face-corner numbers of the edge's endpoints.
pub const EDGE_FACE_CORNERS: [[[i8; 2]; 6]; 12] = [
    [[-1, -1], [-1, -1], [0, 1], [-1, -1], [0, 1], [-1, -1]],
    [[-1, -1], [-1, -1], [-1, -1], [0, 1], [2, 3], [-1, -1]],
    [[-1, -1], [-1, -1], [2, 3], [-1, -1], [-1, -1], [0, 1]],
    [[-1, -1], [-1, -1], [-1, -1], [2, 3], [-1, -1], [2, 3]],
    [[0, 1], [-1, -1], [-1, -1], [-1, -1], [0, 2], [-1, -1]],
    [[-1, -1], [0, 1], [-1, -1], [-1, -1], [1, 3], [-1, -1]],
    [[2, 3], [-1, -1], [-1, -1], [-1, -1], [-1, -1], [0, 2]],
    [[-1, -1], [2, 3], [-1, -1], [-1, -1], [-1, -1], [1, 3]],
    [[0, 2], [-1, -1], [0, 2], [-1, -1], [-1, -1], [-1, -1]],
    [[-1, -1], [0, 2], [1, 3], [-1, -1], [-1, -1], [-1, -1]],
    [[1, 3], [-1, -1], [-1, -1], [0, 2], [-1, -1], [-1, -1]],
    [[-1, -1], [1, 3], [-1, -1], [1, 3], [-1, -1], [-1, -1]],
];

/// The three faces meeting at each corner.
pub const CORNER_FACES: [[u8; 3]; 8] = [
    [0, 2, 4],
    [1, 2, 4],
    [0, 3, 4],
    [1, 3, 4],
    [0, 2, 5],
    [1, 2, 5],
    [0, 3, 5],
    [1, 3, 5],
];

/// The three edges meeting at each corner.
pub const CORNER_EDGES: [[u8; 3]; 8] = [
    [0, 4, 8],
    [0, 5, 9],
    [1, 4, 10],
    [1, 5, 11],
    [2, 6, 8],
    [2, 7, 9],
    [3, 6, 10],
    [3, 7, 11],
];

/// For a corner and a face, the face-corner number of the corner.
pub const CORNER_FACE_CORNERS: [[i8; 6]; 8] = [
    [0, -1, 0, -1, 0, -1],
    [-1, 0, 1, -1, 1, -1],
    [1, -1, -1, 0, 2, -1],
    [-1, 1, -1, 1, 3, -1],
    [2, -1, 2, -1, -1, 0],
    [-1, 2, 3, -1, -1, 1],
    [3, -1, -1, 2, -1, 2],
    [-1, 3, -1, 3, -1, 3],
];

/// For a child and an edge of the parent, the parent face the child's edge lies on.
pub const CHILD_EDGE_FACES: [[i8; 12]; 8] = [
    [-1, 4, 2, -1, -1, 4, 0, -1, -1, 2, 0, -1],
    [-1, 4, 2, -1, 4, -1, -1, 1, 2, -1, -1, 1],
    [4, -1, -1, 3, -1, 4, 0, -1, 0, -1, -1, 3],
    [4, -1, -1, 3, 4, -1, -1, 1, -1, 1, 3, -1],
    [2, -1, -1, 5, 0, -1, -1, 5, -1, 2, 0, -1],
    [2, -1, -1, 5, -1, 1, 5, -1, 2, -1, -1, 1],
    [-1, 3, 5, -1, 0, -1, -1, 5, 0, -1, -1, 3],
    [-1, 3, 5, -1, -1, 1, 5, -1, -1, 1, 3, -1],
];

/// For a child and a corner, the parent face containing the child's corner.
pub const CHILD_CORNER_FACES: [[i8; 8]; 8] = [
    [-1, -1, -1, 4, -1, 2, 0, -1],
    [-1, -1, 4, -1, 2, -1, -1, 1],
    [-1, 4, -1, -1, 0, -1, -1, 3],
    [4, -1, -1, -1, -1, 1, 3, -1],
    [-1, 2, 0, -1, -1, -1, -1, 5],
    [2, -1, -1, 1, -1, -1, 5, -1],
    [0, -1, -1, 3, -1, 5, -1, -1],
    [-1, 1, 3, -1, 5, -1, -1, -1],
];

/// For a child and a corner, the parent edge containing the child's corner.
pub const CHILD_CORNER_EDGES: [[i8; 8]; 8] = [
    [-1, 0, 4, -1, 8, -1, -1, -1],
    [0, -1, -1, 5, -1, 9, -1, -1],
    [4, -1, -1, 1, -1, -1, 10, -1],
    [-1, 5, 1, -1, -1, -1, -1, 11],
    [8, -1, -1, -1, -1, 2, 6, -1],
    [-1, 9, -1, -1, 2, -1, -1, 7],
    [-1, -1, 10, -1, 6, -1, -1, 3],
    [-1, -1, -1, 11, -1, 7, 3, -1],
];

/// Axis (0 = x, 1 = y, 2 = z) an edge is parallel to.
#[inline]
pub const fn edge_axis(edge: usize) -> usize {
    edge / 4
}

/// The edge parallel to `edge` on the diagonally opposite side of the cube.
#[inline]
pub const fn opposite_edge(edge: usize) -> usize {
    4 * (edge / 4) + (3 - edge % 4)
}

/// Face-corner numbers of an edge's endpoints on a face, if the edge lies on it.
#[inline]
pub fn edge_face_corners(edge: usize, face: usize) -> Option<[u8; 2]> {
    let fc = EDGE_FACE_CORNERS[edge][face];
    if fc[0] < 0 {
        None
    } else {
        Some([fc[0] as u8, fc[1] as u8])
    }
}

/// Face-corner number of a corner on a face, if the corner lies on it.
#[inline]
pub fn corner_face_corner(corner: usize, face: usize) -> Option<u8> {
    let fc = CORNER_FACE_CORNERS[corner][face];
    (fc >= 0).then_some(fc as u8)
}

/// Which end (0 or 1) of `edge` the corner is, if it bounds the edge.
#[inline]
pub fn edge_corner_end(edge: usize, corner: usize) -> Option<usize> {
    EDGE_CORNERS[edge]
        .iter()
        .position(|&c| c as usize == corner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_corners_agree_with_corner_faces() {
        for face in 0..FACES {
            for (fc, &corner) in FACE_CORNERS[face].iter().enumerate() {
                assert!(CORNER_FACES[corner as usize].contains(&(face as u8)));
                assert_eq!(corner_face_corner(corner as usize, face), Some(fc as u8));
            }
        }
    }

    #[test]
    fn edges_lie_on_their_faces() {
        for edge in 0..EDGES {
            for &face in &EDGE_FACES[edge] {
                assert!(FACE_EDGES[face as usize].contains(&(edge as u8)));
                let fc = edge_face_corners(edge, face as usize).unwrap();
                for end in 0..2 {
                    let corner = EDGE_CORNERS[edge][end];
                    assert_eq!(FACE_CORNERS[face as usize][fc[end] as usize], corner);
                }
            }
            let incident = (0..FACES)
                .filter(|&f| edge_face_corners(edge, f).is_some())
                .count();
            assert_eq!(incident, 2);
        }
    }

    #[test]
    fn corner_edges_contain_corner() {
        for corner in 0..CORNERS {
            for &edge in &CORNER_EDGES[corner] {
                assert!(edge_corner_end(edge as usize, corner).is_some());
            }
        }
    }

    #[test]
    fn opposite_edges_share_axis_and_no_corner() {
        for edge in 0..EDGES {
            let opp = opposite_edge(edge);
            assert_eq!(edge_axis(edge), edge_axis(opp));
            assert_eq!(opposite_edge(opp), edge);
            for c in EDGE_CORNERS[edge] {
                assert!(!EDGE_CORNERS[opp].contains(&c));
            }
        }
    }

    #[test]
    fn child_corner_tables_are_symmetric() {
        for a in 0..CORNERS {
            for b in 0..CORNERS {
                assert_eq!(CHILD_CORNER_FACES[a][b], CHILD_CORNER_FACES[b][a]);
                assert_eq!(CHILD_CORNER_EDGES[a][b], CHILD_CORNER_EDGES[b][a]);
            }
        }
    }
}
