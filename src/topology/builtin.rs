//! Canonical connectivities used by tests, benches and demos.
//!
//! The fixed topologies are stored as flat arrays and validated like any user
//! input, so every constructor returns a `Result`.

use std::collections::HashMap;

use itertools::iproduct;

use crate::forest::quadrant::edge_normal_axes;
use crate::mesh_error::MeshForestError;
use crate::topology::connectivity::{ConnectivityArrays, ConnectivityGraph};
use crate::topology::cube::{CORNERS, EDGES, FACES, edge_axis};

const UNIT_VERTICES: [f64; 24] = [
    0., 0., 0., //
    1., 0., 0., //
    0., 1., 0., //
    1., 1., 0., //
    0., 0., 1., //
    1., 0., 1., //
    0., 1., 1., //
    1., 1., 1.,
];

const TWO_VERTICES: [f64; 36] = [
    0., 0., 0., //
    1., 0., 0., //
    2., 0., 0., //
    0., 1., 0., //
    1., 1., 0., //
    2., 1., 0., //
    0., 0., 1., //
    1., 0., 1., //
    2., 0., 1., //
    0., 1., 1., //
    1., 1., 1., //
    2., 1., 1.,
];

/// Edge tables: `tree_to_edge`, `ett_offset`, `edge_to_tree`, `edge_to_edge`.
type EdgeTables<'a> = (&'a [i64], &'a [i64], &'a [i64], &'a [i8]);
/// Corner tables: `tree_to_corner`, `ctt_offset`, `corner_to_tree`, `corner_to_corner`.
type CornerTables<'a> = (&'a [i64], &'a [i64], &'a [i64], &'a [i8]);

fn build(
    num_trees: usize,
    vertices: &[f64],
    tree_to_vertex: &[i64],
    tree_to_tree: &[i64],
    tree_to_face: &[i8],
    edges: Option<EdgeTables<'_>>,
    corners: Option<CornerTables<'_>>,
) -> Result<ConnectivityGraph, MeshForestError> {
    let mut arrays = ConnectivityArrays {
        num_trees,
        vertices: vertices.to_vec(),
        tree_to_vertex: tree_to_vertex.to_vec(),
        tree_to_tree: tree_to_tree.to_vec(),
        tree_to_face: tree_to_face.to_vec(),
        ..Default::default()
    };
    if let Some((tte, off, ett, ete)) = edges {
        arrays.tree_to_edge = tte.to_vec();
        arrays.ett_offset = off.to_vec();
        arrays.edge_to_tree = ett.to_vec();
        arrays.edge_to_edge = ete.to_vec();
    }
    if let Some((ttc, off, ctt, ctc)) = corners {
        arrays.tree_to_corner = ttc.to_vec();
        arrays.ctt_offset = off.to_vec();
        arrays.corner_to_tree = ctt.to_vec();
        arrays.corner_to_corner = ctc.to_vec();
    }
    ConnectivityGraph::from_arrays(&arrays)
}

/// A single tree with all faces on the domain boundary.
pub fn unit_cube() -> Result<ConnectivityGraph, MeshForestError> {
    build(
        1,
        &UNIT_VERTICES,
        &[0, 1, 2, 3, 4, 5, 6, 7],
        &[0; 6],
        &[0, 1, 2, 3, 4, 5],
        None,
        None,
    )
}

/// A single tree periodic in all three directions.
pub fn periodic() -> Result<ConnectivityGraph, MeshForestError> {
    build(
        1,
        &UNIT_VERTICES,
        &[0, 1, 2, 3, 4, 5, 6, 7],
        &[0; 6],
        &[1, 0, 3, 2, 5, 4],
        Some((
            &[0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2],
            &[0, 4, 8, 12],
            &[0; 12],
            &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        )),
        Some((&[0; 8], &[0, 8], &[0; 8], &[0, 1, 2, 3, 4, 5, 6, 7])),
    )
}

/// A single tree, periodic in x and z, with the z faces glued under rotation.
pub fn rot_wrap() -> Result<ConnectivityGraph, MeshForestError> {
    build(
        1,
        &UNIT_VERTICES,
        &[0, 1, 2, 3, 4, 5, 6, 7],
        &[0; 6],
        &[1, 0, 2, 3, 11, 10],
        Some((
            &[0, 0, 1, 1, 1, 1, 0, 0, 2, 2, 3, 3],
            &[0, 4, 8, 10, 12],
            &[0; 12],
            &[0, 7, 1, 6, 2, 16, 3, 17, 8, 9, 10, 11],
        )),
        Some((&[0; 8], &[0, 8], &[0; 8], &[0, 1, 2, 3, 4, 5, 6, 7])),
    )
}

/// Two trees glued along the x direction.
pub fn two_cubes() -> Result<ConnectivityGraph, MeshForestError> {
    build(
        2,
        &TWO_VERTICES,
        &[0, 1, 3, 4, 6, 7, 9, 10, 1, 2, 4, 5, 7, 8, 10, 11],
        &[0, 1, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1],
        &[0, 0, 2, 3, 4, 5, 1, 1, 2, 3, 4, 5],
        None,
        None,
    )
}

/// Two rotated trees glued twice, with twisted z faces.
pub fn two_wrap() -> Result<ConnectivityGraph, MeshForestError> {
    build(
        2,
        &TWO_VERTICES,
        &[3, 9, 0, 6, 4, 10, 1, 7, 8, 2, 7, 1, 11, 5, 10, 4],
        &[0, 0, 0, 0, 1, 1, 1, 1, 0, 0, 1, 1],
        &[0, 1, 2, 3, 20, 21, 0, 1, 22, 23, 4, 5],
        None,
        None,
    )
}

/// Six trees glued with various rotations around a shared corner.
pub fn rot_cubes() -> Result<ConnectivityGraph, MeshForestError> {
    const VERTICES: [f64; 78] = [
        0., 0., 0., 1., 0., 2., 2., 0., 0., 0., 1., 0., 1., 1., 0., 2., 1., 0., 1., -1., 0.,
        2., -1., 0., 1., -1., 1., 2., -1., 1., 2., 1., 1., 1., 0., 1., 2., 0., 1., 0., 1., 1.,
        1., 1., 1., 0., 0., 1., 0., 0., 2., 1., 0., 0., 1., 1., 2., 0., 1., 2., 2.5, 1.5, 2.,
        2., 1.5, 2., 2., 1.5, 2.5, 2., 0.5, 2.5, 2.5, 0.5, 2., 2., 0.5, 2.,
    ];
    #[rustfmt::skip]
    const TREE_TO_VERTEX: [i64; 48] = [
        0, 17, 3, 4, 15, 11, 13, 14,
        7, 2, 6, 17, 9, 12, 8, 11,
        2, 12, 5, 10, 17, 11, 4, 14,
        19, 13, 18, 14, 16, 15, 1, 11,
        14, 11, 21, 25, 18, 1, 22, 23,
        21, 20, 25, 24, 14, 10, 11, 12,
    ];
    #[rustfmt::skip]
    const TREE_TO_TREE: [i64; 36] = [
        0, 2, 0, 0, 0, 3,
        1, 2, 1, 1, 1, 1,
        2, 5, 1, 2, 2, 0,
        3, 0, 3, 4, 3, 3,
        4, 4, 3, 4, 5, 4,
        4, 5, 5, 5, 5, 2,
    ];
    #[rustfmt::skip]
    const TREE_TO_FACE: [i8; 36] = [
        0, 5, 2, 3, 4, 13,
        0, 2, 2, 3, 4, 5,
        0, 23, 1, 3, 4, 1,
        0, 17, 2, 8, 4, 5,
        0, 1, 9, 3, 12, 5,
        16, 1, 2, 3, 4, 19,
    ];
    #[rustfmt::skip]
    const TREE_TO_EDGE: [i64; 72] = [
        -1, -1, -1, -1, -1, -1, -1, 0, -1, 2, -1, -1,
        -1, -1, -1, -1, -1, -1, -1, 1, -1, -1, -1, 2,
        -1, -1, 2, -1, -1, -1, -1, 0, -1, 1, -1, -1,
        -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, 0,
        0, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
        -1, -1, -1, 1, -1, -1, 0, -1, -1, -1, -1, -1,
    ];
    #[rustfmt::skip]
    const TREE_TO_CORNER: [i64; 48] = [
        -1, -1, -1, -1, -1, 0, -1, -1,
        -1, -1, -1, -1, -1, -1, -1, 0,
        -1, -1, -1, -1, -1, 0, -1, -1,
        -1, -1, -1, -1, -1, -1, -1, 0,
        -1, 0, -1, -1, -1, -1, -1, -1,
        -1, -1, -1, -1, -1, -1, 0, -1,
    ];
    build(
        6,
        &VERTICES,
        &TREE_TO_VERTEX,
        &TREE_TO_TREE,
        &TREE_TO_FACE,
        Some((
            &TREE_TO_EDGE,
            &[0, 5, 8, 11],
            &[0, 2, 3, 4, 5, 1, 2, 5, 0, 1, 2],
            &[7, 7, 23, 12, 18, 7, 9, 15, 9, 11, 2],
        )),
        Some((
            &TREE_TO_CORNER,
            &[0, 6],
            &[0, 1, 2, 3, 4, 5],
            &[5, 7, 5, 7, 1, 6],
        )),
    )
}

/// A spherical shell: the six faces of a cube, each split into two-by-two trees.
pub fn shell() -> Result<ConnectivityGraph, MeshForestError> {
    const VERTICES: [f64; 54] = [
        -1., -1., 1., 0., -1., 1., 1., -1., 1., -1., 0., 1., 0., 0., 1., 1., 0., 1., -1., 1.,
        1., 0., 1., 1., 1., 1., 1., -1., -1., 2., 0., -1., 2., 1., -1., 2., -1., 0., 2., 0.,
        0., 2., 1., 0., 2., -1., 1., 2., 0., 1., 2., 1., 1., 2.,
    ];
    const BLOCK: [i64; 32] = [
        0, 1, 3, 4, 9, 10, 12, 13, //
        1, 2, 4, 5, 10, 11, 13, 14, //
        3, 4, 6, 7, 12, 13, 15, 16, //
        4, 5, 7, 8, 13, 14, 16, 17,
    ];
    #[rustfmt::skip]
    const TREE_TO_TREE: [i64; 144] = [
        18, 1, 14, 2, 0, 0,
        0, 23, 15, 3, 1, 1,
        16, 3, 0, 4, 2, 2,
        2, 21, 1, 5, 3, 3,
        16, 5, 2, 6, 4, 4,
        4, 21, 3, 7, 5, 5,
        17, 7, 4, 8, 6, 6,
        6, 20, 5, 9, 7, 7,
        17, 9, 6, 10, 8, 8,
        8, 20, 7, 11, 9, 9,
        19, 11, 8, 12, 10, 10,
        10, 22, 9, 13, 11, 11,
        19, 13, 10, 14, 12, 12,
        12, 22, 11, 15, 13, 13,
        18, 15, 12, 0, 14, 14,
        14, 23, 13, 1, 15, 15,
        2, 17, 4, 18, 16, 16,
        16, 8, 6, 19, 17, 17,
        0, 19, 16, 14, 18, 18,
        18, 10, 17, 12, 19, 19,
        9, 21, 7, 22, 20, 20,
        20, 3, 5, 23, 21, 21,
        11, 23, 20, 13, 22, 22,
        22, 1, 21, 15, 23, 23,
    ];
    #[rustfmt::skip]
    const TREE_TO_FACE: [i8; 144] = [
        6, 0, 3, 2, 4, 5,
        1, 7, 3, 2, 4, 5,
        6, 0, 3, 2, 4, 5,
        1, 7, 3, 2, 4, 5,
        2, 0, 3, 2, 4, 5,
        1, 8, 3, 2, 4, 5,
        2, 0, 3, 2, 4, 5,
        1, 8, 3, 2, 4, 5,
        1, 0, 3, 2, 4, 5,
        1, 0, 3, 2, 4, 5,
        1, 0, 3, 2, 4, 5,
        1, 0, 3, 2, 4, 5,
        9, 0, 3, 2, 4, 5,
        1, 3, 3, 2, 4, 5,
        9, 0, 3, 2, 4, 5,
        1, 3, 3, 2, 4, 5,
        6, 0, 0, 2, 4, 5,
        1, 0, 0, 2, 4, 5,
        6, 0, 3, 6, 4, 5,
        1, 0, 3, 6, 4, 5,
        1, 0, 7, 2, 4, 5,
        1, 7, 7, 2, 4, 5,
        1, 0, 3, 1, 4, 5,
        1, 7, 3, 1, 4, 5,
    ];
    // only the z-parallel edges (8..12) are shared
    #[rustfmt::skip]
    const Z_EDGES: [i64; 96] = [
        -1, 8, 6, 0,
        8, -1, 0, 7,
        6, 0, -1, 9,
        0, 7, 9, -1,
        -1, 9, 10, 1,
        9, -1, 1, 11,
        10, 1, -1, 12,
        1, 11, 12, -1,
        -1, 12, 13, 2,
        12, -1, 2, 14,
        13, 2, -1, 15,
        2, 14, 15, -1,
        -1, 15, 16, 3,
        15, -1, 3, 17,
        16, 3, -1, 8,
        3, 17, 8, -1,
        -1, 10, 6, 4,
        10, -1, 4, 13,
        6, 4, -1, 16,
        4, 13, 16, -1,
        -1, 11, 14, 5,
        11, -1, 5, 7,
        14, 5, -1, 17,
        5, 7, 17, -1,
    ];
    #[rustfmt::skip]
    const EDGE_TO_TREE: [i64; 72] = [
        0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11,
        12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23,
        0, 2, 16, 18, 1, 3, 21, 23, 0, 1, 14, 15,
        2, 3, 4, 5, 4, 6, 16, 17, 5, 7, 20, 21,
        6, 7, 8, 9, 8, 10, 17, 19, 9, 11, 20, 22,
        10, 11, 12, 13, 12, 14, 18, 19, 13, 15, 22, 23,
    ];
    #[rustfmt::skip]
    const EDGE_TO_EDGE: [i8; 72] = [
        11, 10, 9, 8, 11, 10, 9, 8, 11, 10, 9, 8,
        11, 10, 9, 8, 11, 10, 9, 8, 11, 10, 9, 8,
        10, 8, 10, 8, 11, 9, 11, 9, 9, 8, 11, 10,
        11, 10, 9, 8, 10, 8, 9, 8, 11, 9, 9, 8,
        11, 10, 9, 8, 10, 8, 11, 9, 11, 9, 10, 8,
        11, 10, 9, 8, 10, 8, 11, 10, 11, 9, 11, 10,
    ];

    let tree_to_vertex: Vec<i64> = BLOCK.iter().copied().cycle().take(24 * CORNERS).collect();
    let mut tree_to_edge = vec![-1i64; 24 * EDGES];
    for (tree, ids) in Z_EDGES.chunks_exact(4).enumerate() {
        tree_to_edge[tree * EDGES + 8..tree * EDGES + 12].copy_from_slice(ids);
    }
    let ett_offset: Vec<i64> = (0..=18).map(|e| 4 * e).collect();
    build(
        24,
        &VERTICES,
        &tree_to_vertex,
        &TREE_TO_TREE,
        &TREE_TO_FACE,
        Some((&tree_to_edge, &ett_offset, &EDGE_TO_TREE, &EDGE_TO_EDGE)),
        None,
    )
}

/// A solid sphere: an inner cube surrounded by two layers of six blocks.
pub fn sphere() -> Result<ConnectivityGraph, MeshForestError> {
    const VERTICES: [f64; 48] = [
        -1., -1., 1., 1., -1., 1., -1., 1., 1., 1., 1., 1., -1., -1., 2., 1., -1., 2., -1., 1.,
        2., 1., 1., 2., -1., -1., -1., 1., -1., -1., -1., 1., -1., 1., 1., -1., -1., -1., 1.,
        1., -1., 1., -1., 1., 1., 1., 1., 1.,
    ];
    #[rustfmt::skip]
    const TREE_TO_TREE: [i64; 78] = [
        5, 3, 4, 1, 6, 0,
        5, 3, 0, 2, 7, 1,
        5, 3, 1, 4, 8, 2,
        2, 0, 1, 4, 9, 3,
        2, 0, 3, 5, 10, 4,
        2, 0, 4, 1, 11, 5,
        11, 9, 10, 7, 12, 0,
        11, 9, 6, 8, 12, 1,
        11, 9, 7, 10, 12, 2,
        8, 6, 7, 10, 12, 3,
        8, 6, 9, 11, 12, 4,
        8, 6, 10, 7, 12, 5,
        11, 9, 6, 8, 10, 7,
    ];
    #[rustfmt::skip]
    const TREE_TO_FACE: [i8; 78] = [
        1, 7, 7, 2, 5, 5,
        9, 8, 3, 2, 5, 5,
        6, 0, 3, 6, 5, 5,
        1, 7, 7, 2, 5, 5,
        9, 8, 3, 2, 5, 5,
        6, 0, 3, 6, 5, 5,
        1, 7, 7, 2, 2, 4,
        9, 8, 3, 2, 5, 4,
        6, 0, 3, 6, 15, 4,
        1, 7, 7, 2, 19, 4,
        9, 8, 3, 2, 22, 4,
        6, 0, 3, 6, 6, 4,
        10, 22, 4, 16, 22, 4,
    ];
    // trees 0..6 share their local edges 0, 1, 4, 5; trees 6..12 the edges 2, 3, 6, 7
    #[rustfmt::skip]
    const LAYER_EDGES: [i64; 24] = [
        0, 2, 8, 9,
        2, 3, 6, 7,
        3, 1, 10, 11,
        7, 5, 11, 9,
        5, 4, 1, 0,
        4, 6, 10, 8,
    ];
    #[rustfmt::skip]
    const EDGE_TO_TREE: [i64; 48] = [
        0, 4, 6, 10, 2, 4, 8, 10, 0, 1, 6, 7,
        1, 2, 7, 8, 4, 5, 10, 11, 3, 4, 9, 10,
        1, 5, 7, 11, 1, 3, 7, 9, 0, 5, 6, 11,
        0, 3, 6, 9, 2, 5, 8, 11, 2, 3, 8, 9,
    ];
    #[rustfmt::skip]
    const EDGE_TO_EDGE: [i8; 48] = [
        0, 17, 2, 19, 1, 16, 3, 18, 1, 0, 3, 2,
        1, 0, 3, 2, 13, 12, 15, 14, 13, 12, 15, 14,
        4, 13, 6, 15, 5, 12, 7, 14, 4, 5, 6, 7,
        5, 17, 7, 19, 16, 4, 18, 6, 17, 16, 19, 18,
    ];

    let mut tree_to_vertex: Vec<i64> = (0..12).flat_map(|_| 0..8).collect();
    tree_to_vertex.extend(8..16);
    let mut tree_to_edge = vec![-1i64; 13 * EDGES];
    for (block, ids) in LAYER_EDGES.chunks_exact(4).enumerate() {
        let outer = block * EDGES;
        let inner = (block + 6) * EDGES;
        for (slot, &local) in [0usize, 1, 4, 5].iter().enumerate() {
            tree_to_edge[outer + local] = ids[slot];
            tree_to_edge[inner + local + 2] = ids[slot];
        }
    }
    let ett_offset: Vec<i64> = (0..=12).map(|e| 4 * e).collect();
    build(
        13,
        &VERTICES,
        &tree_to_vertex,
        &TREE_TO_TREE,
        &TREE_TO_FACE,
        Some((&tree_to_edge, &ett_offset, &EDGE_TO_TREE, &EDGE_TO_EDGE)),
        None,
    )
}

/// An `m × n × p` brick of aligned trees, optionally periodic per axis.
///
/// Trees are numbered with x fastest. Every gluing has orientation 0 and no
/// edge flips.
pub fn brick(dims: [usize; 3], periodic: [bool; 3]) -> Result<ConnectivityGraph, MeshForestError> {
    if dims.contains(&0) {
        return Err(MeshForestError::InvalidForest(format!(
            "brick dimensions must be positive, got {dims:?}"
        )));
    }
    let [m, n, p] = dims;
    let num_trees = m * n * p;
    let tree_id = |c: [usize; 3]| c[0] + m * (c[1] + n * c[2]);
    let vertex_id = |c: [usize; 3]| (c[0] + (m + 1) * (c[1] + (n + 1) * c[2])) as i64;

    // Lattice line index `l` in `0..=dim` along an axis, wrapped when periodic.
    let lattice = |axis: usize, l: usize| -> Option<usize> {
        if periodic[axis] {
            Some(l % dims[axis])
        } else if l > 0 && l < dims[axis] {
            Some(l)
        } else {
            None
        }
    };

    let mut vertices = Vec::with_capacity(3 * (m + 1) * (n + 1) * (p + 1));
    for (k, j, i) in iproduct!(0..=p, 0..=n, 0..=m) {
        vertices.extend([i as f64, j as f64, k as f64]);
    }

    let mut arrays = ConnectivityArrays {
        num_trees,
        vertices,
        ..Default::default()
    };
    let mut edge_ids: HashMap<(usize, usize, usize, usize), usize> = HashMap::new();
    let mut edge_lists: Vec<Vec<(usize, usize)>> = Vec::new();
    let mut corner_ids: HashMap<[usize; 3], usize> = HashMap::new();
    let mut corner_lists: Vec<Vec<(usize, usize)>> = Vec::new();

    for (k, j, i) in iproduct!(0..p, 0..n, 0..m) {
        let c = [i, j, k];
        let tree = tree_id(c);
        for corner in 0..CORNERS {
            let v = std::array::from_fn(|a| c[a] + (corner >> a & 1));
            arrays.tree_to_vertex.push(vertex_id(v));
        }
        for face in 0..FACES {
            let axis = face / 2;
            let mut nc = c;
            let across = if face % 2 == 1 {
                (c[axis] + 1 < dims[axis]).then(|| c[axis] + 1)
            } else {
                c[axis].checked_sub(1)
            };
            let neighbor = match across {
                Some(v) => Some(v),
                None if periodic[axis] => Some(if face % 2 == 1 { 0 } else { dims[axis] - 1 }),
                None => None,
            };
            match neighbor {
                Some(v) => {
                    nc[axis] = v;
                    arrays.tree_to_tree.push(tree_id(nc) as i64);
                    arrays.tree_to_face.push((face ^ 1) as i8);
                }
                None => {
                    arrays.tree_to_tree.push(tree as i64);
                    arrays.tree_to_face.push(face as i8);
                }
            }
        }
        for edge in 0..EDGES {
            let axis = edge_axis(edge);
            let (b1, b2) = edge_normal_axes(edge);
            let l1 = lattice(b1, c[b1] + (edge & 1));
            let l2 = lattice(b2, c[b2] + (edge >> 1 & 1));
            let id = match (l1, l2) {
                (Some(l1), Some(l2)) => {
                    let next = edge_lists.len();
                    let id = *edge_ids.entry((axis, c[axis], l1, l2)).or_insert(next);
                    if id == next {
                        edge_lists.push(Vec::with_capacity(4));
                    }
                    edge_lists[id].push((tree, edge));
                    id as i64
                }
                _ => -1,
            };
            arrays.tree_to_edge.push(id);
        }
        for corner in 0..CORNERS {
            let l: [Option<usize>; 3] =
                std::array::from_fn(|a| lattice(a, c[a] + (corner >> a & 1)));
            let id = match l {
                [Some(x), Some(y), Some(z)] => {
                    let next = corner_lists.len();
                    let id = *corner_ids.entry([x, y, z]).or_insert(next);
                    if id == next {
                        corner_lists.push(Vec::with_capacity(8));
                    }
                    corner_lists[id].push((tree, corner));
                    id as i64
                }
                _ => -1,
            };
            arrays.tree_to_corner.push(id);
        }
    }

    arrays.ett_offset.push(0);
    for list in &edge_lists {
        for &(tree, edge) in list {
            arrays.edge_to_tree.push(tree as i64);
            arrays.edge_to_edge.push(edge as i8);
        }
        arrays.ett_offset.push(arrays.edge_to_tree.len() as i64);
    }
    arrays.ctt_offset.push(0);
    for list in &corner_lists {
        for &(tree, corner) in list {
            arrays.corner_to_tree.push(tree as i64);
            arrays.corner_to_corner.push(corner as i8);
        }
        arrays.ctt_offset.push(arrays.corner_to_tree.len() as i64);
    }
    if edge_lists.is_empty() {
        arrays.tree_to_edge.clear();
    }
    if corner_lists.is_empty() {
        arrays.tree_to_corner.clear();
    }
    ConnectivityGraph::from_arrays(&arrays)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_invariants::DebugInvariants;

    #[test]
    fn fixtures_validate() {
        let all = [
            ("unit_cube", unit_cube()),
            ("periodic", periodic()),
            ("rot_wrap", rot_wrap()),
            ("two_cubes", two_cubes()),
            ("two_wrap", two_wrap()),
            ("rot_cubes", rot_cubes()),
            ("shell", shell()),
            ("sphere", sphere()),
        ];
        for (name, conn) in all {
            let conn = conn.unwrap_or_else(|e| panic!("{name}: {e}"));
            conn.validate_invariants().unwrap();
        }
    }

    #[test]
    fn fixture_sizes() {
        let shell = shell().unwrap();
        assert_eq!(shell.num_trees(), 24);
        assert_eq!(shell.num_edges(), 18);
        assert_eq!(shell.num_corners(), 0);
        let sphere = sphere().unwrap();
        assert_eq!(sphere.num_trees(), 13);
        assert_eq!(sphere.num_edges(), 12);
        let rot = rot_cubes().unwrap();
        assert_eq!(rot.corner_entries(0).len(), 6);
    }

    #[test]
    fn brick_counts_match_lattice() {
        for (dims, periodic) in [
            ([2, 3, 1], [false, false, false]),
            ([2, 2, 2], [false, false, false]),
            ([3, 2, 2], [true, false, true]),
            ([1, 1, 1], [true, true, true]),
        ] {
            let conn = brick(dims, periodic).unwrap();
            let [m, n, p] = dims;
            let inner = |axis: usize| if periodic[axis] { dims[axis] } else { dims[axis] - 1 };
            let (mc, nc, pc) = (inner(0), inner(1), inner(2));
            assert_eq!(conn.num_trees(), m * n * p);
            assert_eq!(conn.num_edges(), m * nc * pc + mc * n * pc + mc * nc * p, "{dims:?}");
            assert_eq!(conn.num_corners(), mc * nc * pc, "{dims:?}");
            for e in 0..conn.num_edges() {
                assert_eq!(conn.edge_entries(e).len(), 4);
            }
        }
    }

    #[test]
    fn brick_faces_link_across_x() {
        let conn = brick([2, 1, 1], [false; 3]).unwrap();
        let link = conn.face_neighbor(0, 1).unwrap().unwrap();
        assert_eq!((link.tree, link.face, link.orientation), (1, 0, 0));
        assert_eq!(conn.face_neighbor(0, 0).unwrap(), None);
        assert!(brick([0, 1, 1], [false; 3]).is_err());
    }
}
