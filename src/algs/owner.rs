//! Owning rank of a quadrant inside its tree or one face-step outside it.

use crate::forest::partition::PartitionTable;
use crate::forest::quadrant::Quadrant;
use crate::mesh_error::MeshForestError;
use crate::topology::connectivity::{ConnectivityGraph, check_entity};
use crate::topology::cube::FACES;

/// The tree face a quadrant lies across, or `None` when it is inside its tree.
///
/// Quadrants outside along more than one axis, or further out than their
/// own size, are not face neighbors.
pub(crate) fn exit_face(tree: usize, q: &Quadrant) -> Result<Option<usize>, MeshForestError> {
    if !q.is_extended() {
        return Err(MeshForestError::NotAFaceNeighbor {
            tree,
            quadrant: q.to_string(),
        });
    }
    let sides = q.outside_sides();
    let mut face = None;
    for (axis, &side) in sides.iter().enumerate() {
        if side == 0 {
            continue;
        }
        if face.is_some() {
            return Err(MeshForestError::NotAFaceNeighbor {
                tree,
                quadrant: q.to_string(),
            });
        }
        face = Some(2 * axis + usize::from(side > 0));
    }
    Ok(face)
}

/// Rank owning `q` in `tree`, following the face link when `q` lies just
/// outside the tree.
///
/// `face_hint` names the tree face `q` lies across and saves deducing it; a
/// hint that contradicts the coordinates is an error. Returns `Ok(None)` when
/// `q` lies across the domain boundary.
pub fn find_owner(
    graph: &ConnectivityGraph,
    partition: &PartitionTable,
    tree: usize,
    face_hint: Option<usize>,
    q: &Quadrant,
) -> Result<Option<usize>, MeshForestError> {
    graph.tree(tree)?;
    if !q.is_valid() {
        return Err(MeshForestError::InvalidQuadrant(q.to_string()));
    }
    let Some(face) = exit_face(tree, q)? else {
        return Ok(Some(partition.owner_of(tree, q)));
    };
    if let Some(hint) = face_hint {
        check_entity("face", hint, FACES)?;
        if hint != face {
            return Err(MeshForestError::NotAFaceNeighbor {
                tree,
                quadrant: format!("{q} (lies across face {face}, not {hint})"),
            });
        }
    }

    let Some(ft) = graph.resolve_face(tree, face)? else {
        return Ok(None);
    };
    let nq = q.transform_face(&ft);
    Ok(Some(partition.owner_of(ft.ntree, &nq)))
}
