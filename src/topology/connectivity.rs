//! The connectivity graph of a forest: trees glued along faces, edges and corners.
//!
//! Trees live in an arena of [`TreeRecord`]s. Each record owns typed slots for
//! its eight vertices, six face links, twelve edge ids and eight corner ids.
//! Global edges and corners keep compressed reverse tables listing every
//! `(tree, local entity)` that touches them.
//!
//! The persisted form is [`ConnectivityArrays`], a set of flat arrays in the
//! traditional `tree_to_tree` / `ett_offset` layout. A graph is only ever
//! created by validating such arrays (or by the fixtures in
//! [`crate::topology::builtin`]), and is immutable afterwards.

use serde::{Deserialize, Serialize};

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshForestError;
use crate::topology::cube::{CORNERS, EDGES, FACES};
use crate::topology::orientation::{ORIENTATIONS, face_code, split_face_code};

/// Across-face link of one tree face.
///
/// A face glued to itself (same tree, same face, orientation 0) is a domain boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaceLink {
    pub tree: usize,
    pub face: u8,
    pub orientation: u8,
}

impl FaceLink {
    /// The stored code `face + 6 * orientation`.
    #[inline]
    pub fn code(&self) -> u8 {
        face_code(self.face as usize, self.orientation as usize)
    }
}

/// One tree edge listed under a global edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeEntry {
    pub tree: usize,
    pub edge: u8,
    /// Whether the tree traverses the edge against the global direction.
    pub flip: bool,
}

/// One tree corner listed under a global corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CornerEntry {
    pub tree: usize,
    pub corner: u8,
}

/// Per-tree slot arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeRecord {
    pub vertices: Option<[usize; CORNERS]>,
    pub faces: [FaceLink; FACES],
    pub edges: [Option<usize>; EDGES],
    pub corners: [Option<usize>; CORNERS],
}

/// Flat-array representation of a connectivity, as persisted.
///
/// Per-tree arrays are indexed `tree * slots + local`. `-1` marks a missing
/// vertex/edge/corner id. Empty `tree_to_edge` / `tree_to_corner` arrays mean
/// no edge or corner information at all.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConnectivityArrays {
    pub num_trees: usize,
    /// Vertex coordinates, three per vertex.
    pub vertices: Vec<f64>,
    pub tree_to_vertex: Vec<i64>,
    pub tree_to_tree: Vec<i64>,
    pub tree_to_face: Vec<i8>,
    pub tree_to_edge: Vec<i64>,
    pub ett_offset: Vec<i64>,
    pub edge_to_tree: Vec<i64>,
    pub edge_to_edge: Vec<i8>,
    pub tree_to_corner: Vec<i64>,
    pub ctt_offset: Vec<i64>,
    pub corner_to_tree: Vec<i64>,
    pub corner_to_corner: Vec<i8>,
}

/// Validated, immutable forest connectivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConnectivityArrays", into = "ConnectivityArrays")]
pub struct ConnectivityGraph {
    vertices: Vec<[f64; 3]>,
    trees: Vec<TreeRecord>,
    edge_offsets: Vec<usize>,
    edge_entries: Vec<EdgeEntry>,
    corner_offsets: Vec<usize>,
    corner_entries: Vec<CornerEntry>,
}

fn check_len(array: &'static str, found: usize, expected: usize) -> Result<(), MeshForestError> {
    if found == expected {
        Ok(())
    } else {
        Err(MeshForestError::ArrayLength {
            array,
            expected,
            found,
        })
    }
}

/// Convert an offset table to `usize`, checking it starts at zero and is monotone.
fn read_offsets(array: &'static str, offsets: &[i64]) -> Result<Vec<usize>, MeshForestError> {
    if offsets.is_empty() {
        return Ok(vec![0]);
    }
    if offsets[0] != 0 {
        return Err(MeshForestError::InvalidOffsets { array, index: 0 });
    }
    let mut out = Vec::with_capacity(offsets.len());
    for (i, &o) in offsets.iter().enumerate() {
        if o < 0 || (i > 0 && o < offsets[i - 1]) {
            return Err(MeshForestError::InvalidOffsets { array, index: i });
        }
        out.push(o as usize);
    }
    Ok(out)
}

/// Read per-tree global ids (`-1` = none), range-checked against `count`.
fn read_ids<const N: usize>(
    kind: &'static str,
    ids: &[i64],
    tree: usize,
    count: usize,
) -> Result<[Option<usize>; N], MeshForestError> {
    let mut out = [None; N];
    for (local, slot) in out.iter_mut().enumerate() {
        let global = ids[tree * N + local];
        if global == -1 {
            continue;
        }
        if global < 0 || global as usize >= count {
            return Err(MeshForestError::GlobalIdOutOfRange {
                kind,
                tree,
                local,
                global,
                count,
            });
        }
        *slot = Some(global as usize);
    }
    Ok(out)
}

impl ConnectivityGraph {
    /// Validate flat arrays and build the tree arena.
    pub fn from_arrays(arrays: &ConnectivityArrays) -> Result<Self, MeshForestError> {
        let num_trees = arrays.num_trees;
        if arrays.vertices.len() % 3 != 0 {
            return Err(MeshForestError::ArrayLength {
                array: "vertices",
                expected: arrays.vertices.len() / 3 * 3,
                found: arrays.vertices.len(),
            });
        }
        let num_vertices = arrays.vertices.len() / 3;
        let has_vertices = !arrays.tree_to_vertex.is_empty();
        if has_vertices {
            check_len("tree_to_vertex", arrays.tree_to_vertex.len(), CORNERS * num_trees)?;
        }
        check_len("tree_to_tree", arrays.tree_to_tree.len(), FACES * num_trees)?;
        check_len("tree_to_face", arrays.tree_to_face.len(), FACES * num_trees)?;

        let edge_offsets = read_offsets("ett_offset", &arrays.ett_offset)?;
        let num_edges = edge_offsets.len() - 1;
        if !arrays.tree_to_edge.is_empty() {
            check_len("tree_to_edge", arrays.tree_to_edge.len(), EDGES * num_trees)?;
        } else if num_edges > 0 {
            check_len("tree_to_edge", 0, EDGES * num_trees)?;
        }
        let num_edge_entries = edge_offsets[num_edges];
        check_len("edge_to_tree", arrays.edge_to_tree.len(), num_edge_entries)?;
        check_len("edge_to_edge", arrays.edge_to_edge.len(), num_edge_entries)?;

        let corner_offsets = read_offsets("ctt_offset", &arrays.ctt_offset)?;
        let num_corners = corner_offsets.len() - 1;
        if !arrays.tree_to_corner.is_empty() {
            check_len("tree_to_corner", arrays.tree_to_corner.len(), CORNERS * num_trees)?;
        } else if num_corners > 0 {
            check_len("tree_to_corner", 0, CORNERS * num_trees)?;
        }
        let num_corner_entries = corner_offsets[num_corners];
        check_len("corner_to_tree", arrays.corner_to_tree.len(), num_corner_entries)?;
        check_len("corner_to_corner", arrays.corner_to_corner.len(), num_corner_entries)?;

        let vertices = arrays
            .vertices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();

        let mut trees = Vec::with_capacity(num_trees);
        for tree in 0..num_trees {
            let tree_vertices = if has_vertices {
                let mut v = [0usize; CORNERS];
                for (corner, slot) in v.iter_mut().enumerate() {
                    let vertex = arrays.tree_to_vertex[CORNERS * tree + corner];
                    if vertex < 0 || vertex as usize >= num_vertices {
                        return Err(MeshForestError::VertexOutOfRange {
                            tree,
                            corner,
                            vertex,
                            num_vertices,
                        });
                    }
                    *slot = vertex as usize;
                }
                Some(v)
            } else {
                None
            };

            let mut faces = [FaceLink {
                tree,
                face: 0,
                orientation: 0,
            }; FACES];
            for (face, link) in faces.iter_mut().enumerate() {
                let neighbor = arrays.tree_to_tree[FACES * tree + face];
                if neighbor < 0 || neighbor as usize >= num_trees {
                    return Err(MeshForestError::FaceNeighborOutOfRange {
                        tree,
                        face,
                        neighbor,
                        num_trees,
                    });
                }
                let code = arrays.tree_to_face[FACES * tree + face];
                if code < 0 || code as usize >= FACES * ORIENTATIONS {
                    return Err(MeshForestError::InvalidFaceCode { tree, face, code });
                }
                let (nface, orientation) = split_face_code(code as u8);
                *link = FaceLink {
                    tree: neighbor as usize,
                    face: nface as u8,
                    orientation: orientation as u8,
                };
            }

            let edges = if arrays.tree_to_edge.is_empty() {
                [None; EDGES]
            } else {
                read_ids::<EDGES>("edge", &arrays.tree_to_edge, tree, num_edges)?
            };
            let corners = if arrays.tree_to_corner.is_empty() {
                [None; CORNERS]
            } else {
                read_ids::<CORNERS>("corner", &arrays.tree_to_corner, tree, num_corners)?
            };

            trees.push(TreeRecord {
                vertices: tree_vertices,
                faces,
                edges,
                corners,
            });
        }

        let mut edge_entries = Vec::with_capacity(num_edge_entries);
        for (global, range) in edge_offsets.windows(2).enumerate() {
            for i in range[0]..range[1] {
                let (ntree, code) = (arrays.edge_to_tree[i], arrays.edge_to_edge[i]);
                if ntree < 0
                    || ntree as usize >= num_trees
                    || code < 0
                    || code as usize >= 2 * EDGES
                {
                    return Err(MeshForestError::DanglingReverseEntry {
                        kind: "edge",
                        global,
                        tree: ntree,
                        local: code,
                    });
                }
                edge_entries.push(EdgeEntry {
                    tree: ntree as usize,
                    edge: (code as usize % EDGES) as u8,
                    flip: code as usize >= EDGES,
                });
            }
        }

        let mut corner_entries = Vec::with_capacity(num_corner_entries);
        for (global, range) in corner_offsets.windows(2).enumerate() {
            for i in range[0]..range[1] {
                let (ntree, corner) = (arrays.corner_to_tree[i], arrays.corner_to_corner[i]);
                if ntree < 0 || ntree as usize >= num_trees || corner < 0 || corner as usize >= CORNERS
                {
                    return Err(MeshForestError::DanglingReverseEntry {
                        kind: "corner",
                        global,
                        tree: ntree,
                        local: corner,
                    });
                }
                corner_entries.push(CornerEntry {
                    tree: ntree as usize,
                    corner: corner as u8,
                });
            }
        }

        let graph = Self {
            vertices,
            trees,
            edge_offsets,
            edge_entries,
            corner_offsets,
            corner_entries,
        };
        graph.check_relations()?;
        log::debug!(
            "connectivity: {} trees, {} vertices, {} edges, {} corners",
            graph.num_trees(),
            graph.num_vertices(),
            graph.num_edges(),
            graph.num_corners()
        );
        Ok(graph)
    }

    /// Flatten back into the persisted representation.
    pub fn to_arrays(&self) -> ConnectivityArrays {
        let num_trees = self.trees.len();
        let has_vertices = self.trees.iter().all(|t| t.vertices.is_some()) && num_trees > 0;
        let has_edges = self.num_edges() > 0;
        let has_corners = self.num_corners() > 0;
        let id = |v: Option<usize>| v.map_or(-1, |g| g as i64);

        let mut out = ConnectivityArrays {
            num_trees,
            vertices: self.vertices.iter().flatten().copied().collect(),
            ..Default::default()
        };
        for t in &self.trees {
            if has_vertices {
                out.tree_to_vertex
                    .extend(t.vertices.iter().flatten().map(|&v| v as i64));
            }
            for link in &t.faces {
                out.tree_to_tree.push(link.tree as i64);
                out.tree_to_face.push(link.code() as i8);
            }
            if has_edges {
                out.tree_to_edge.extend(t.edges.iter().map(|&e| id(e)));
            }
            if has_corners {
                out.tree_to_corner.extend(t.corners.iter().map(|&c| id(c)));
            }
        }
        out.ett_offset = self.edge_offsets.iter().map(|&o| o as i64).collect();
        out.edge_to_tree = self.edge_entries.iter().map(|e| e.tree as i64).collect();
        out.edge_to_edge = self
            .edge_entries
            .iter()
            .map(|e| (e.edge as usize + EDGES * usize::from(e.flip)) as i8)
            .collect();
        out.ctt_offset = self.corner_offsets.iter().map(|&o| o as i64).collect();
        out.corner_to_tree = self.corner_entries.iter().map(|c| c.tree as i64).collect();
        out.corner_to_corner = self.corner_entries.iter().map(|c| c.corner as i8).collect();
        out
    }

    /// Symmetry of face links and bijectivity of the reverse tables.
    fn check_relations(&self) -> Result<(), MeshForestError> {
        for (tree, record) in self.trees.iter().enumerate() {
            for (face, link) in record.faces.iter().enumerate() {
                if link.tree == tree && link.face as usize == face {
                    if link.orientation != 0 {
                        return Err(MeshForestError::BoundaryOrientation {
                            tree,
                            face,
                            orientation: link.orientation,
                        });
                    }
                    continue;
                }
                let back = self.trees[link.tree].faces[link.face as usize];
                if back.tree != tree
                    || back.face as usize != face
                    || back.orientation != link.orientation
                {
                    return Err(MeshForestError::AsymmetricFaceLink {
                        tree,
                        face,
                        neighbor: link.tree,
                        neighbor_face: link.face as usize,
                    });
                }
            }
        }

        for global in 0..self.num_edges() {
            let entries = self.edge_entries(global);
            if entries.len() == 1 {
                log::warn!("connectivity: global edge {global} is touched by a single tree edge");
            }
            for entry in entries {
                if self.trees[entry.tree].edges[entry.edge as usize] != Some(global) {
                    return Err(MeshForestError::DanglingReverseEntry {
                        kind: "edge",
                        global,
                        tree: entry.tree as i64,
                        local: entry.edge as i8,
                    });
                }
            }
        }
        for (tree, record) in self.trees.iter().enumerate() {
            for (local, global) in record.edges.iter().enumerate() {
                let Some(global) = *global else { continue };
                let count = self
                    .edge_entries(global)
                    .iter()
                    .filter(|e| e.tree == tree && e.edge as usize == local)
                    .count();
                if count != 1 {
                    return Err(MeshForestError::NonBijectiveReverse {
                        kind: "edge",
                        tree,
                        local,
                        global,
                        count,
                    });
                }
            }
        }

        for global in 0..self.num_corners() {
            let entries = self.corner_entries(global);
            if entries.len() == 1 {
                log::warn!("connectivity: global corner {global} is touched by a single tree corner");
            }
            for entry in entries {
                if self.trees[entry.tree].corners[entry.corner as usize] != Some(global) {
                    return Err(MeshForestError::DanglingReverseEntry {
                        kind: "corner",
                        global,
                        tree: entry.tree as i64,
                        local: entry.corner as i8,
                    });
                }
            }
        }
        for (tree, record) in self.trees.iter().enumerate() {
            for (local, global) in record.corners.iter().enumerate() {
                let Some(global) = *global else { continue };
                let count = self
                    .corner_entries(global)
                    .iter()
                    .filter(|c| c.tree == tree && c.corner as usize == local)
                    .count();
                if count != 1 {
                    return Err(MeshForestError::NonBijectiveReverse {
                        kind: "corner",
                        tree,
                        local,
                        global,
                        count,
                    });
                }
            }
        }
        Ok(())
    }

    // --- accessors ---

    #[inline]
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edge_offsets.len() - 1
    }

    #[inline]
    pub fn num_corners(&self) -> usize {
        self.corner_offsets.len() - 1
    }

    pub fn vertices(&self) -> &[[f64; 3]] {
        &self.vertices
    }

    pub fn trees(&self) -> &[TreeRecord] {
        &self.trees
    }

    /// The record of `tree`.
    pub fn tree(&self, tree: usize) -> Result<&TreeRecord, MeshForestError> {
        self.trees.get(tree).ok_or(MeshForestError::TreeOutOfRange {
            tree,
            num_trees: self.trees.len(),
        })
    }

    /// Raw face link, including self-links on the domain boundary.
    pub fn face_link(&self, tree: usize, face: usize) -> Result<FaceLink, MeshForestError> {
        let record = self.tree(tree)?;
        check_entity("face", face, FACES)?;
        Ok(record.faces[face])
    }

    /// Across-face neighbor, or `None` on the domain boundary.
    pub fn face_neighbor(&self, tree: usize, face: usize) -> Result<Option<FaceLink>, MeshForestError> {
        let link = self.face_link(tree, face)?;
        Ok((!self.is_boundary_link(tree, face, &link)).then_some(link))
    }

    #[inline]
    pub(crate) fn is_boundary_link(&self, tree: usize, face: usize, link: &FaceLink) -> bool {
        link.tree == tree && link.face as usize == face
    }

    /// Global edge id of a tree edge.
    pub fn tree_edge(&self, tree: usize, edge: usize) -> Result<Option<usize>, MeshForestError> {
        let record = self.tree(tree)?;
        check_entity("edge", edge, EDGES)?;
        Ok(record.edges[edge])
    }

    /// Global corner id of a tree corner.
    pub fn tree_corner(&self, tree: usize, corner: usize) -> Result<Option<usize>, MeshForestError> {
        let record = self.tree(tree)?;
        check_entity("corner", corner, CORNERS)?;
        Ok(record.corners[corner])
    }

    /// All tree edges touching global edge `global`; empty for unknown ids.
    pub fn edge_entries(&self, global: usize) -> &[EdgeEntry] {
        match self.edge_offsets.get(global..global + 2) {
            Some(&[lo, hi]) => &self.edge_entries[lo..hi],
            _ => &[],
        }
    }

    /// All tree corners touching global corner `global`; empty for unknown ids.
    pub fn corner_entries(&self, global: usize) -> &[CornerEntry] {
        match self.corner_offsets.get(global..global + 2) {
            Some(&[lo, hi]) => &self.corner_entries[lo..hi],
            _ => &[],
        }
    }

    /// Physical coordinates of the eight corners of `tree`, if vertices are present.
    pub fn tree_vertex_coordinates(&self, tree: usize) -> Result<Option<[[f64; 3]; CORNERS]>, MeshForestError> {
        let record = self.tree(tree)?;
        Ok(record
            .vertices
            .map(|v| std::array::from_fn(|c| self.vertices[v[c]])))
    }
}

pub(crate) fn check_entity(kind: &'static str, index: usize, limit: usize) -> Result<(), MeshForestError> {
    if index < limit {
        Ok(())
    } else {
        Err(MeshForestError::EntityOutOfRange { kind, index, limit })
    }
}

impl TryFrom<ConnectivityArrays> for ConnectivityGraph {
    type Error = MeshForestError;

    fn try_from(arrays: ConnectivityArrays) -> Result<Self, Self::Error> {
        Self::from_arrays(&arrays)
    }
}

impl From<ConnectivityGraph> for ConnectivityArrays {
    fn from(graph: ConnectivityGraph) -> Self {
        graph.to_arrays()
    }
}

impl DebugInvariants for ConnectivityGraph {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "ConnectivityGraph");
    }

    fn validate_invariants(&self) -> Result<(), MeshForestError> {
        self.check_relations()
    }
}
