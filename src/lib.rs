#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-forest
//!
//! mesh-forest stores and queries the coarse topology of a distributed forest
//! of octrees, and builds the ghost layer of remote quadrants around each
//! rank's part of the forest. It is meant for parallel adaptive mesh codes
//! that refine every macro-cell of a coarse mesh as its own octree.
//!
//! ## Features
//! - A validated [`ConnectivityGraph`](topology::ConnectivityGraph) gluing trees
//!   along faces, edges and corners with arbitrary orientation, persisted as
//!   flat arrays through serde
//! - Face, edge and corner transform resolution between trees
//! - Owner lookup on a space-filling-curve partition
//! - Collective ghost-layer construction over pluggable communication backends
//!   (serial, in-process threads, MPI)
//! - Existence queries for (possibly hanging) neighbor quadrants and a 2:1
//!   balance check
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-forest = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "rayon"]
//! ```
//!
//! ```no_run
//! use std::sync::Arc;
//! use mesh_forest::prelude::*;
//!
//! let conn = Arc::new(builtin::two_cubes()?);
//! let forest = Forest::new_uniform(conn, 2, 0, 1)?;
//! let ghost = ghost_new(&forest, &NoComm, NeighborClass::Full)?;
//! assert!(ghost.is_empty());
//! # Ok::<(), MeshForestError>(())
//! ```
//!
//! ## Determinism
//!
//! Ghost layers are sorted by tree and Morton order regardless of message
//! arrival order, so repeated builds on the same forest are identical.

pub mod algs;
pub mod debug_invariants;
pub mod forest;
pub mod mesh_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;
pub use mesh_error::MeshForestError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::balance::is_balanced;
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{CommTag, Communicator, NoComm, RayonComm, Wait};
    pub use crate::algs::exists::{
        Existence, FaceLookup, QuadrantExistence, face_quadrant_exists, quadrant_exists,
    };
    pub use crate::algs::ghost::{
        GhostCommTags, GhostLayer, GhostQuadrant, NeighborClass, Piggy, ghost_new,
        ghost_new_with_tags,
    };
    pub use crate::algs::owner::find_owner;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::forest::{Forest, GlobalPosition, PartitionTable, Quadrant};
    pub use crate::mesh_error::MeshForestError;
    pub use crate::topology::builtin;
    pub use crate::topology::{ConnectivityArrays, ConnectivityGraph};
}
