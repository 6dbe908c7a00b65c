//! MeshForestError: Unified error type for mesh-forest public APIs
//!
//! Connectivity validation, transform resolution, owner lookup and the
//! collective ghost exchange all report failures through this enum instead of
//! panicking. Negative lookups (a quadrant that is absent, a face on the domain
//! boundary) are *not* errors; they are ordinary return values.

use thiserror::Error;

/// Unified error type for mesh-forest operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshForestError {
    // --- structural errors (malformed connectivity) ---
    /// A flat connectivity array has the wrong number of entries.
    #[error("Connectivity error: `{array}` has {found} entries, expected {expected}")]
    ArrayLength {
        array: &'static str,
        expected: usize,
        found: usize,
    },
    /// A tree references a vertex outside the vertex table.
    #[error("Connectivity error: tree {tree} corner {corner} references vertex {vertex} (have {num_vertices})")]
    VertexOutOfRange {
        tree: usize,
        corner: usize,
        vertex: i64,
        num_vertices: usize,
    },
    /// A face links to a tree that does not exist.
    #[error("Connectivity error: tree {tree} face {face} links to tree {neighbor} (have {num_trees})")]
    FaceNeighborOutOfRange {
        tree: usize,
        face: usize,
        neighbor: i64,
        num_trees: usize,
    },
    /// A face code is not in `0..24`.
    #[error("Connectivity error: tree {tree} face {face} has invalid face code {code}")]
    InvalidFaceCode { tree: usize, face: usize, code: i8 },
    /// A face is glued to itself with a non-zero orientation.
    #[error("Connectivity error: tree {tree} face {face} is a boundary with orientation {orientation}")]
    BoundaryOrientation {
        tree: usize,
        face: usize,
        orientation: u8,
    },
    /// The reciprocal face link does not point back with the same orientation.
    #[error(
        "Connectivity error: tree {tree} face {face} links to tree {neighbor} face {neighbor_face}, which does not link back"
    )]
    AsymmetricFaceLink {
        tree: usize,
        face: usize,
        neighbor: usize,
        neighbor_face: usize,
    },
    /// An offset table (`ett_offset`/`ctt_offset`) is malformed.
    #[error("Connectivity error: offset table `{array}` is malformed at position {index}")]
    InvalidOffsets { array: &'static str, index: usize },
    /// A tree entity references a global edge/corner id outside the table.
    #[error("Connectivity error: tree {tree} {kind} {local} references global {kind} {global} (have {count})")]
    GlobalIdOutOfRange {
        kind: &'static str,
        tree: usize,
        local: usize,
        global: i64,
        count: usize,
    },
    /// A reverse table entry does not round-trip through the forward map.
    #[error("Connectivity error: global {kind} {global} lists tree {tree} {kind} {local}, which maps elsewhere")]
    DanglingReverseEntry {
        kind: &'static str,
        global: usize,
        tree: i64,
        local: i8,
    },
    /// A tree entity is not listed exactly once in its reverse table.
    #[error("Connectivity error: tree {tree} {kind} {local} appears {count} times in global {kind} {global}")]
    NonBijectiveReverse {
        kind: &'static str,
        tree: usize,
        local: usize,
        global: usize,
        count: usize,
    },
    /// A transform resolver found contradictory gluing information.
    #[error("Connectivity error: inconsistent {kind} transform at tree {tree} {kind} {local}: {reason}")]
    InconsistentTransform {
        kind: &'static str,
        tree: usize,
        local: usize,
        reason: String,
    },

    // --- precondition violations ---
    /// A tree index is outside `0..num_trees`.
    #[error("Tree {tree} out of range (have {num_trees})")]
    TreeOutOfRange { tree: usize, num_trees: usize },
    /// A local face/edge/corner/child index is outside its range.
    #[error("Local {kind} index {index} out of range (limit {limit})")]
    EntityOutOfRange {
        kind: &'static str,
        index: usize,
        limit: usize,
    },
    /// Ownership was requested for a quadrant that is not at most one face-step outside its tree.
    #[error("Quadrant {quadrant} of tree {tree} is not a face neighbor of its tree")]
    NotAFaceNeighbor { tree: usize, quadrant: String },
    /// A quadrant has an invalid level or misaligned coordinates.
    #[error("Invalid quadrant: {0}")]
    InvalidQuadrant(String),
    /// The partition table is malformed or does not match the forest.
    #[error("Partition error: {0}")]
    InvalidPartition(String),
    /// A local forest is inconsistent (unsorted, outside its tree, outside its rank range).
    #[error("Forest error: {0}")]
    InvalidForest(String),

    // --- transport ---
    /// Communication with a peer failed during a collective exchange.
    #[error("Communication error with rank {neighbor}: {message}")]
    CommError { neighbor: usize, message: String },
    /// A peer sent a message with an incompatible wire version.
    #[error("Wire version mismatch from rank {neighbor}: expected {expected}, got {found}")]
    WireVersion {
        neighbor: usize,
        expected: u16,
        found: u16,
    },

    /// A count or index does not fit its 32-bit wire field.
    #[error("Wire overflow: {what} {value} does not fit in 32 bits")]
    WireOverflow { what: &'static str, value: usize },

    // --- invariants ---
    /// A ghost layer violates its ordering/offset invariants.
    #[error("Ghost layer invariant violated: {0}")]
    GhostInvariant(String),
}
