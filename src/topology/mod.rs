//! Coarse-mesh topology of a forest of octrees.
//!
//! This module provides:
//! - Cube incidence tables ([`cube`]) and the face orientation algebra ([`orientation`])
//! - The validated [`ConnectivityGraph`] and its flat persisted form
//! - Resolution of face, edge and corner neighbors between trees ([`transform`])
//! - Canonical connectivities for tests and demos ([`builtin`])

pub mod builtin;
pub mod connectivity;
pub mod cube;
pub mod orientation;
pub mod transform;

pub use connectivity::{
    ConnectivityArrays, ConnectivityGraph, CornerEntry, EdgeEntry, FaceLink, TreeRecord,
};
pub use orientation::FaceAxes;
pub use transform::{CornerTransform, EdgeTransform, FaceTransform};
