#![allow(dead_code)]
use std::sync::Arc;

use mesh_forest::prelude::*;

/// Run `f` once per rank of a fresh in-process world; results in rank order.
pub fn run_ranks<T, F>(size: usize, f: F) -> Vec<T>
where
    F: Fn(RayonComm) -> T + Sync,
    T: Send,
{
    let world = RayonComm::world(size);
    std::thread::scope(|s| {
        let handles: Vec<_> = world
            .into_iter()
            .map(|comm| {
                let f = &f;
                s.spawn(move || f(comm))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank panicked"))
            .collect()
    })
}

/// Uniform forests of all ranks.
pub fn uniform_forests(conn: &Arc<ConnectivityGraph>, level: u8, size: usize) -> Vec<Forest> {
    (0..size)
        .map(|rank| Forest::new_uniform(conn.clone(), level, rank, size).unwrap())
        .collect()
}

/// Integer box `[lo, hi)` of a quadrant of a brick tree in brick coordinates.
pub fn brick_box(dims: [usize; 3], tree: usize, q: &Quadrant) -> ([i64; 3], [i64; 3]) {
    let root = mesh_forest::forest::ROOT_LEN as i64;
    let t = [tree % dims[0], tree / dims[0] % dims[1], tree / (dims[0] * dims[1])];
    let h = q.len() as i64;
    let lo: [i64; 3] = std::array::from_fn(|a| t[a] as i64 * root + q.coords()[a] as i64);
    (lo, lo.map(|v| v + h))
}

/// Dimension of the contact between two boxes (`None` if apart), with
/// periodic wrap along the flagged axes of a brick of `dims`.
pub fn contact_dim(
    a: ([i64; 3], [i64; 3]),
    b: ([i64; 3], [i64; 3]),
    dims: [usize; 3],
    periodic: [bool; 3],
) -> Option<usize> {
    let root = mesh_forest::forest::ROOT_LEN as i64;
    let mut dim = 0;
    for axis in 0..3 {
        let len = dims[axis] as i64 * root;
        let shifts: &[i64] = if periodic[axis] { &[-len, 0, len] } else { &[0] };
        let best = shifts
            .iter()
            .map(|s| a.1[axis].min(b.1[axis] + s) - a.0[axis].max(b.0[axis] + s))
            .max()?;
        if best < 0 {
            return None;
        }
        dim += usize::from(best > 0);
    }
    Some(dim)
}

pub fn class_admits(class: NeighborClass, dim: usize) -> bool {
    match class {
        NeighborClass::Face => dim == 2,
        NeighborClass::FaceEdge => dim >= 1,
        NeighborClass::FaceCorner => dim == 2 || dim == 0,
        NeighborClass::Full => true,
    }
}

/// Corners of `q` mapped trilinearly through its tree's vertices, snapped to
/// an integer grid so equal points compare equal.
pub fn physical_corners(conn: &ConnectivityGraph, tree: usize, q: &Quadrant) -> Vec<[i64; 3]> {
    let verts = conn
        .tree_vertex_coordinates(tree)
        .unwrap()
        .expect("tree carries vertices");
    let root = mesh_forest::forest::ROOT_LEN as f64;
    (0..8usize)
        .map(|c| {
            let p: [f64; 3] = std::array::from_fn(|a| {
                f64::from(q.coords()[a] + q.len() * ((c >> a) & 1) as i32) / root
            });
            let mut x = [0.0f64; 3];
            for (k, v) in verts.iter().enumerate() {
                let w: f64 = (0..3)
                    .map(|a| if (k >> a) & 1 == 1 { p[a] } else { 1.0 - p[a] })
                    .product();
                for a in 0..3 {
                    x[a] += w * v[a];
                }
            }
            x.map(|v| (v * 4096.0).round() as i64)
        })
        .collect()
}
