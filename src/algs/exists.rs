//! Existence of a quadrant among the local quadrants or the ghost layer.
//!
//! Quadrants may lie outside their tree. Across a face the lookup happens in
//! the face neighbor; across a tree edge or corner it happens in every tree
//! sharing that edge or corner diagonally.

use serde::{Deserialize, Serialize};

use crate::algs::ghost::{GhostLayer, frames_for};
use crate::algs::owner::exit_face;
use crate::forest::Forest;
use crate::forest::quadrant::Quadrant;
use crate::mesh_error::MeshForestError;
use crate::topology::connectivity::check_entity;
use crate::topology::cube::{CORNERS, FACE_DUAL, FACES, corner_face_corner};
use crate::topology::orientation::face_permutation;

/// Where a quadrant was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Existence {
    /// Local index in the forest.
    Local(usize),
    /// Index in [`GhostLayer::ghosts`].
    Ghost(usize),
    /// The quadrant lies across the domain boundary.
    Boundary,
    /// Inside the domain but neither local nor a ghost.
    Absent,
}

impl Existence {
    #[inline]
    pub fn is_found(&self) -> bool {
        matches!(self, Existence::Local(_) | Existence::Ghost(_))
    }
}

/// Result of [`face_quadrant_exists`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceLookup {
    pub existence: Existence,
    /// Face of the found quadrant facing the query's origin: the dual face
    /// inside a tree, the link's face code (`face + 6 * orientation`) across
    /// a tree face. `None` on the domain boundary.
    pub face_code: Option<u8>,
    /// Face corner of the found quadrant's face touching the smaller
    /// originating quadrant, in the found quadrant's frame.
    pub hang_face: Option<usize>,
    /// Rank owning the position of the quadrant (also when it is absent).
    pub owner_rank: Option<usize>,
}

/// Result of [`quadrant_exists`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuadrantExistence {
    pub exists: bool,
    /// Across a tree edge or corner: one entry per diagonal neighbor tree.
    pub neighbors: Vec<bool>,
}

fn check_ghost(forest: &Forest, ghost: &GhostLayer) -> Result<(), MeshForestError> {
    if ghost.rank() != forest.rank() || ghost.tree_offsets().len() != forest.num_trees() + 1 {
        return Err(MeshForestError::InvalidForest(format!(
            "ghost layer of rank {} does not belong to this forest (rank {})",
            ghost.rank(),
            forest.rank()
        )));
    }
    Ok(())
}

/// Look up an inside quadrant of `tree` with its owner.
pub(crate) fn locate(forest: &Forest, ghost: &GhostLayer, tree: usize, q: &Quadrant) -> (Existence, usize) {
    let owner = forest.partition().owner_of(tree, q);
    let existence = if owner == forest.rank() {
        forest.find_local(tree, q).map_or(Existence::Absent, Existence::Local)
    } else {
        ghost
            .bsearch(Some(owner), Some(tree), q)
            .map_or(Existence::Absent, Existence::Ghost)
    };
    (existence, owner)
}

/// Find the quadrant `q` of `tree`, reached across `face` from a quadrant of
/// the same tree.
///
/// `hang` is the child id of the originating quadrant when it is smaller
/// than `q`. An outside `q` must lie across `face` of the tree.
pub fn face_quadrant_exists(
    forest: &Forest,
    ghost: &GhostLayer,
    tree: usize,
    q: &Quadrant,
    face: usize,
    hang: Option<usize>,
) -> Result<FaceLookup, MeshForestError> {
    let conn = forest.connectivity();
    conn.tree(tree)?;
    check_entity("face", face, FACES)?;
    if let Some(h) = hang {
        check_entity("child", h, CORNERS)?;
    }
    if !q.is_valid() {
        return Err(MeshForestError::InvalidQuadrant(q.to_string()));
    }
    check_ghost(forest, ghost)?;
    let hang_corner = hang.and_then(|h| corner_face_corner(h, face));

    let Some(exit) = exit_face(tree, q)? else {
        let (existence, owner) = locate(forest, ghost, tree, q);
        return Ok(FaceLookup {
            existence,
            face_code: Some(FACE_DUAL[face]),
            hang_face: hang_corner.map(usize::from),
            owner_rank: Some(owner),
        });
    };
    if exit != face {
        return Err(MeshForestError::NotAFaceNeighbor {
            tree,
            quadrant: format!("{q} (lies across face {exit}, not {face})"),
        });
    }

    let Some(link) = conn.face_neighbor(tree, face)? else {
        return Ok(FaceLookup {
            existence: Existence::Boundary,
            face_code: None,
            hang_face: None,
            owner_rank: None,
        });
    };
    let Some(ft) = conn.resolve_face(tree, face)? else {
        return Err(MeshForestError::InconsistentTransform {
            kind: "face",
            tree,
            local: face,
            reason: "linked face does not resolve".into(),
        });
    };
    let perm = face_permutation(face, link.face as usize, link.orientation as usize);
    let nq = q.transform_face(&ft);
    let (existence, owner) = locate(forest, ghost, ft.ntree, &nq);
    Ok(FaceLookup {
        existence,
        face_code: Some(link.code()),
        hang_face: hang_corner.map(|c| perm[c as usize] as usize),
        owner_rank: Some(owner),
    })
}

/// Whether `q` of `tree` exists locally or as a ghost, in whichever trees it
/// falls in.
pub fn quadrant_exists(
    forest: &Forest,
    ghost: &GhostLayer,
    tree: usize,
    q: &Quadrant,
) -> Result<QuadrantExistence, MeshForestError> {
    let conn = forest.connectivity();
    conn.tree(tree)?;
    if !q.is_valid() {
        return Err(MeshForestError::InvalidQuadrant(q.to_string()));
    }
    if !q.is_extended() {
        return Err(MeshForestError::InvalidQuadrant(format!(
            "{q} lies beyond the neighbor layer of tree {tree}"
        )));
    }
    check_ghost(forest, ghost)?;

    let sides = q.outside_sides();
    let frames = frames_for(conn, tree, sides)?;
    let found: Vec<bool> = frames
        .iter()
        .map(|frame| {
            let (ntree, nq) = frame.apply(tree, q);
            locate(forest, ghost, ntree, &nq).0.is_found()
        })
        .collect();

    let exists = found.iter().any(|&f| f);
    let diagonal = sides.iter().filter(|&&s| s != 0).count() >= 2;
    Ok(QuadrantExistence {
        exists,
        neighbors: if diagonal { found } else { Vec::new() },
    })
}
