//! Ghost layer: the remote quadrants adjacent to a rank's local quadrants.
//!
//! [`ghost_new`] is collective. Every rank works out which of its quadrants
//! touch quadrants owned by other ranks, ships copies to those ranks, and
//! collects what the others ship back. The result is sorted by tree, then by
//! Morton order, which is also the order of the owning ranks.
//!
//! Adjacency is decided on the space-filling curve: for each face, edge or
//! corner of a local quadrant the same-size neighbor region is built, the
//! finest cells of that region touching the quadrant are mapped into every tree
//! they fall in, and every rank between the smallest and largest owner of
//! those cells receives the quadrant. Ranks in that span that own nothing
//! touching the quadrant may receive it too.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::exchange::{exchange_counts_or_abandon, exchange_ghosts};
use crate::algs::wire::WireGhost;
use crate::debug_invariants::DebugInvariants;
use crate::forest::Forest;
use crate::forest::partition::GlobalPosition;
use crate::forest::quadrant::{Contact, QMAX_LEVEL, Quadrant, edge_normal_axes};
use crate::mesh_error::MeshForestError;
use crate::topology::connectivity::ConnectivityGraph;
use crate::topology::cube::{CORNERS, EDGES, FACES};
use crate::topology::transform::{CornerTransform, EdgeTransform, FaceTransform};

/// Which quadrants count as neighbors: those sharing a face, or additionally
/// an edge, a corner, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeighborClass {
    Face,
    FaceEdge,
    FaceCorner,
    Full,
}

impl NeighborClass {
    pub fn includes(self, contact: Contact) -> bool {
        match contact {
            Contact::Face(_) => true,
            Contact::Edge(_) => matches!(self, NeighborClass::FaceEdge | NeighborClass::Full),
            Contact::Corner(_) => matches!(self, NeighborClass::FaceCorner | NeighborClass::Full),
        }
    }

    /// The contacts of a quadrant this class looks through.
    pub fn contacts(self) -> impl Iterator<Item = Contact> {
        Contact::all().filter(move |c| self.includes(*c))
    }

    /// Number of contacts per quadrant.
    pub fn num_contacts(self) -> usize {
        match self {
            NeighborClass::Face => FACES,
            NeighborClass::FaceEdge => FACES + EDGES,
            NeighborClass::FaceCorner => FACES + CORNERS,
            NeighborClass::Full => FACES + EDGES + CORNERS,
        }
    }
}

/// Where a ghost lives on its owning rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piggy {
    pub owner_tree: usize,
    /// Index in the owner's local numbering.
    pub owner_local: usize,
    pub owner_rank: usize,
}

/// A copy of a remote quadrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GhostQuadrant {
    pub quadrant: Quadrant,
    pub piggy: Piggy,
}

impl GhostQuadrant {
    #[inline]
    pub fn tree(&self) -> usize {
        self.piggy.owner_tree
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.piggy.owner_rank
    }
}

/// Message tags of one ghost exchange.
#[derive(Copy, Clone, Debug)]
pub struct GhostCommTags {
    pub counts: CommTag,
    pub ghosts: CommTag,
}

impl GhostCommTags {
    #[inline]
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            counts: base,
            ghosts: base.offset(1),
        }
    }
}

impl Default for GhostCommTags {
    fn default() -> Self {
        Self::from_base(CommTag::new(0x6100))
    }
}

/// Sorted remote quadrants adjacent to one rank's part of the forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostLayer {
    rank: usize,
    class: NeighborClass,
    ghosts: Vec<GhostQuadrant>,
    /// `ghosts[tree_offsets[t]..tree_offsets[t + 1]]` belong to tree `t`.
    tree_offsets: Vec<usize>,
    /// `ghosts[proc_offsets[p]..proc_offsets[p + 1]]` are owned by rank `p`.
    proc_offsets: Vec<usize>,
}

/// `offsets[k]` is the first index whose key is at least `k`.
fn scan_offsets(ghosts: &[GhostQuadrant], len: usize, key: impl Fn(&GhostQuadrant) -> usize) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(len + 1);
    let mut i = 0;
    for k in 0..=len {
        while i < ghosts.len() && key(&ghosts[i]) < k {
            i += 1;
        }
        offsets.push(i);
    }
    offsets
}

impl GhostLayer {
    /// Assemble a layer from ghosts sorted by tree and Morton order.
    fn from_sorted(
        rank: usize,
        class: NeighborClass,
        num_trees: usize,
        num_procs: usize,
        ghosts: Vec<GhostQuadrant>,
    ) -> Self {
        let tree_offsets = scan_offsets(&ghosts, num_trees, GhostQuadrant::tree);
        let proc_offsets = scan_offsets(&ghosts, num_procs, GhostQuadrant::rank);
        Self {
            rank,
            class,
            ghosts,
            tree_offsets,
            proc_offsets,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn class(&self) -> NeighborClass {
        self.class
    }

    pub fn ghosts(&self) -> &[GhostQuadrant] {
        &self.ghosts
    }

    pub fn len(&self) -> usize {
        self.ghosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ghosts.is_empty()
    }

    pub fn tree_offsets(&self) -> &[usize] {
        &self.tree_offsets
    }

    pub fn proc_offsets(&self) -> &[usize] {
        &self.proc_offsets
    }

    fn tree_range(&self, tree: usize) -> Range<usize> {
        match (self.tree_offsets.get(tree), self.tree_offsets.get(tree + 1)) {
            (Some(&lo), Some(&hi)) => lo..hi,
            _ => 0..0,
        }
    }

    fn proc_range(&self, rank: usize) -> Range<usize> {
        match (self.proc_offsets.get(rank), self.proc_offsets.get(rank + 1)) {
            (Some(&lo), Some(&hi)) => lo..hi,
            _ => 0..0,
        }
    }

    /// Ghosts of `tree`.
    pub fn tree_ghosts(&self, tree: usize) -> &[GhostQuadrant] {
        &self.ghosts[self.tree_range(tree)]
    }

    /// Ghosts owned by `rank`.
    pub fn proc_ghosts(&self, rank: usize) -> &[GhostQuadrant] {
        &self.ghosts[self.proc_range(rank)]
    }

    /// Index of exactly `q` among the ghosts of `tree`.
    pub fn tree_bsearch(&self, tree: usize, q: &Quadrant) -> Option<usize> {
        let range = self.tree_range(tree);
        let lo = range.start;
        self.ghosts[range]
            .binary_search_by(|g| g.quadrant.cmp(q))
            .ok()
            .map(|i| lo + i)
    }

    /// Index of exactly `q`, optionally restricted to an owner rank and a tree.
    pub fn bsearch(&self, rank: Option<usize>, tree: Option<usize>, q: &Quadrant) -> Option<usize> {
        let mut range = 0..self.ghosts.len();
        if let Some(rank) = rank {
            let r = self.proc_range(rank);
            range = range.start.max(r.start)..range.end.min(r.end);
        }
        let trees = match tree {
            Some(t) => t..t + 1,
            None => 0..self.tree_offsets.len().saturating_sub(1),
        };
        for t in trees {
            let r = self.tree_range(t);
            let (lo, hi) = (range.start.max(r.start), range.end.min(r.end));
            if lo >= hi {
                continue;
            }
            if let Ok(i) = self.ghosts[lo..hi].binary_search_by(|g| g.quadrant.cmp(q)) {
                return Some(lo + i);
            }
        }
        None
    }

    /// Release the layer.
    pub fn destroy(self) {
        log::debug!("[rank {}] dropping ghost layer of {} quadrants", self.rank, self.ghosts.len());
    }
}

impl DebugInvariants for GhostLayer {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "GhostLayer");
    }

    fn validate_invariants(&self) -> Result<(), MeshForestError> {
        let bad = |msg: String| Err(MeshForestError::GhostInvariant(msg));
        for w in self.ghosts.windows(2) {
            if (w[0].tree(), w[0].quadrant) >= (w[1].tree(), w[1].quadrant) {
                return bad(format!(
                    "{} in tree {} is not before {} in tree {}",
                    w[0].quadrant,
                    w[0].tree(),
                    w[1].quadrant,
                    w[1].tree()
                ));
            }
            if w[0].rank() > w[1].rank() {
                return bad(format!(
                    "owner ranks {} and {} out of curve order",
                    w[0].rank(),
                    w[1].rank()
                ));
            }
        }
        if let Some(g) = self.ghosts.iter().find(|g| g.rank() == self.rank) {
            return bad(format!("{} is owned by this rank", g.quadrant));
        }
        for (name, offsets) in [("tree", &self.tree_offsets), ("proc", &self.proc_offsets)] {
            if offsets.first() != Some(&0) || offsets.last() != Some(&self.ghosts.len()) {
                return bad(format!("{name} offsets do not span the ghosts"));
            }
            if offsets.windows(2).any(|w| w[0] > w[1]) {
                return bad(format!("{name} offsets decrease"));
            }
        }
        for t in 0..self.tree_offsets.len() - 1 {
            if self.tree_ghosts(t).iter().any(|g| g.tree() != t) {
                return bad(format!("tree offsets misplace ghosts of tree {t}"));
            }
        }
        for p in 0..self.proc_offsets.len() - 1 {
            if self.proc_ghosts(p).iter().any(|g| g.rank() != p) {
                return bad(format!("proc offsets misplace ghosts of rank {p}"));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mapping contact cells into the trees they fall in
// ---------------------------------------------------------------------------

/// How a cell outside (or inside) a tree reaches one tree it lies in.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Frame {
    Same,
    Face(FaceTransform),
    Edge(usize, EdgeTransform),
    Corner(CornerTransform),
}

impl Frame {
    /// Tree and coordinates of a finest-level cell in the target tree.
    pub(crate) fn apply(&self, tree: usize, cell: &Quadrant) -> (usize, Quadrant) {
        match self {
            Frame::Same => (tree, *cell),
            Frame::Face(ft) => (ft.ntree, cell.transform_face(ft)),
            Frame::Edge(edge, et) => (et.ntree, cell.transform_edge(*edge, et, true)),
            Frame::Corner(ct) => (ct.ntree, cell.transform_corner(ct.ncorner as usize, true)),
        }
    }
}

/// Every tree a region at `sides` relative to `tree` lies in.
pub(crate) fn frames_for(
    conn: &ConnectivityGraph,
    tree: usize,
    sides: [i8; 3],
) -> Result<Vec<Frame>, MeshForestError> {
    let out: Vec<usize> = (0..3).filter(|&a| sides[a] != 0).collect();
    let upper = |axis: usize| usize::from(sides[axis] > 0);
    Ok(match out[..] {
        [] => vec![Frame::Same],
        [axis] => conn
            .resolve_face(tree, 2 * axis + upper(axis))?
            .map(Frame::Face)
            .into_iter()
            .collect(),
        [a0, a1] => {
            let axis = 3 - a0 - a1;
            let (na, nb) = edge_normal_axes(4 * axis);
            let edge = 4 * axis + upper(na) + 2 * upper(nb);
            conn.resolve_edge(tree, edge)?
                .into_iter()
                .map(|et| Frame::Edge(edge, et))
                .collect()
        }
        _ => {
            let corner = upper(0) | upper(1) << 1 | upper(2) << 2;
            conn.resolve_corner(tree, corner)?
                .into_iter()
                .map(Frame::Corner)
                .collect()
        }
    })
}

/// Per-tree cache of [`frames_for`], keyed by region.
pub(crate) struct FrameCache<'a> {
    conn: &'a ConnectivityGraph,
    frames: HashMap<(usize, [i8; 3]), Vec<Frame>>,
}

impl<'a> FrameCache<'a> {
    pub(crate) fn new(conn: &'a ConnectivityGraph) -> Self {
        Self {
            conn,
            frames: HashMap::new(),
        }
    }

    pub(crate) fn get(&mut self, tree: usize, sides: [i8; 3]) -> Result<&[Frame], MeshForestError> {
        if !self.frames.contains_key(&(tree, sides)) {
            let frames = frames_for(self.conn, tree, sides)?;
            self.frames.insert((tree, sides), frames);
        }
        Ok(self.frames.get(&(tree, sides)).map_or(&[], Vec::as_slice))
    }
}

/// `(destination, record)` for every local quadrant of `tree` that touches a
/// remote rank, in quadrant order, each destination once per quadrant.
fn tree_send_list(
    forest: &Forest,
    tree: usize,
    class: NeighborClass,
) -> Result<Vec<(usize, WireGhost)>, MeshForestError> {
    let me = forest.rank();
    let partition = forest.partition();
    let mut cache = FrameCache::new(forest.connectivity());
    let mut out = Vec::new();
    let mut dests: Vec<usize> = Vec::new();
    let base = forest.tree_offset(tree);

    for (i, q) in forest.tree_quadrants(tree).iter().enumerate() {
        dests.clear();
        for contact in class.contacts() {
            let n = contact.neighbor(q);
            let frames = cache.get(tree, n.outside_sides())?;
            for frame in frames {
                let mut lo: Option<GlobalPosition> = None;
                let mut hi: Option<GlobalPosition> = None;
                for &c in contact.neighbor_contact_corners() {
                    let cell = n.corner_descendant(c as usize, QMAX_LEVEL);
                    let (ntree, ncell) = frame.apply(tree, &cell);
                    let pos = GlobalPosition::of(ntree, &ncell);
                    lo = Some(lo.map_or(pos, |l| l.min(pos)));
                    hi = Some(hi.map_or(pos, |h| h.max(pos)));
                }
                let (Some(lo), Some(hi)) = (lo, hi) else { continue };
                dests.extend(
                    partition
                        .owner_range(lo, hi)
                        .filter(|&p| p != me && !partition.is_empty(p)),
                );
            }
        }
        dests.sort_unstable();
        dests.dedup();
        if dests.is_empty() {
            continue;
        }
        let record = WireGhost::new(tree, base + i, q)?;
        out.extend(dests.iter().map(|&p| (p, record)));
    }
    Ok(out)
}

/// Build the ghost layer of `forest` for `class` (collective).
pub fn ghost_new<C>(forest: &Forest, comm: &C, class: NeighborClass) -> Result<GhostLayer, MeshForestError>
where
    C: Communicator,
{
    ghost_new_with_tags(forest, comm, class, GhostCommTags::default())
}

/// Records for every remote rank, keyed by destination.
fn send_lists<C>(
    forest: &Forest,
    comm: &C,
    class: NeighborClass,
) -> Result<BTreeMap<usize, Vec<WireGhost>>, MeshForestError>
where
    C: Communicator,
{
    let (me, num_procs) = (forest.rank(), forest.num_procs());
    if comm.rank() != me || comm.size() != num_procs {
        return Err(MeshForestError::InvalidPartition(format!(
            "forest is rank {me} of {num_procs}, communicator is rank {} of {}",
            comm.rank(),
            comm.size()
        )));
    }

    #[cfg(feature = "rayon")]
    let per_tree: Vec<Vec<(usize, WireGhost)>> = (0..forest.num_trees())
        .into_par_iter()
        .map(|t| tree_send_list(forest, t, class))
        .collect::<Result<_, _>>()?;
    #[cfg(not(feature = "rayon"))]
    let per_tree: Vec<Vec<(usize, WireGhost)>> = (0..forest.num_trees())
        .map(|t| tree_send_list(forest, t, class))
        .collect::<Result<_, _>>()?;

    let mut outgoing: BTreeMap<usize, Vec<WireGhost>> = BTreeMap::new();
    for (dest, record) in per_tree.into_iter().flatten() {
        outgoing.entry(dest).or_default().push(record);
    }
    Ok(outgoing)
}

/// [`ghost_new`] with explicit message tags.
///
/// A rank that fails before the exchange (mismatched communicator, broken
/// connectivity, ids too large for the wire) still takes part in the count
/// stage, so every rank returns an error instead of waiting on it.
pub fn ghost_new_with_tags<C>(
    forest: &Forest,
    comm: &C,
    class: NeighborClass,
    tags: GhostCommTags,
) -> Result<GhostLayer, MeshForestError>
where
    C: Communicator,
{
    let me = forest.rank();
    let num_procs = forest.num_procs();
    let num_trees = forest.num_trees();

    // 1) who gets which of our quadrants
    let outgoing = send_lists(forest, comm, class);

    // 2) counts, then payloads
    let incoming = {
        let counts = outgoing.as_ref().map(|out| {
            (0..comm.size())
                .map(|p| out.get(&p).map_or(0, Vec::len))
                .collect::<Vec<_>>()
        });
        exchange_counts_or_abandon(comm, counts.as_ref().map(Vec::as_slice).map_err(|&e| e), tags.counts)?
    };
    let outgoing = outgoing?;
    let received = exchange_ghosts(comm, &outgoing, &incoming, tags.ghosts)?;

    // 3) unpack
    let total: usize = incoming.iter().sum();
    let mut ghosts = Vec::with_capacity(total);
    for (rank, records) in received {
        for w in records {
            let quadrant = w.quadrant();
            if w.tree() >= num_trees || !quadrant.is_valid() || !quadrant.is_inside_root() {
                return Err(MeshForestError::CommError {
                    neighbor: rank,
                    message: format!("malformed ghost {quadrant} in tree {}", w.tree()),
                });
            }
            ghosts.push(GhostQuadrant {
                quadrant,
                piggy: Piggy {
                    owner_tree: w.tree(),
                    owner_local: w.local(),
                    owner_rank: rank,
                },
            });
        }
    }
    #[cfg(feature = "rayon")]
    ghosts.par_sort_unstable_by(|a, b| (a.tree(), a.quadrant).cmp(&(b.tree(), b.quadrant)));
    #[cfg(not(feature = "rayon"))]
    ghosts.sort_unstable_by(|a, b| (a.tree(), a.quadrant).cmp(&(b.tree(), b.quadrant)));

    let layer = GhostLayer::from_sorted(me, class, num_trees, num_procs, ghosts);
    log::debug!(
        "[rank {me}] ghost layer ({class:?}): sent {} quadrants to {} ranks, received {} from {} ranks",
        outgoing.values().map(Vec::len).sum::<usize>(),
        outgoing.len(),
        layer.len(),
        incoming.iter().filter(|&&n| n > 0).count()
    );
    layer.debug_assert_invariants();
    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::topology::builtin;
    use std::sync::Arc;

    fn ghost(tree: usize, q: Quadrant, rank: usize) -> GhostQuadrant {
        GhostQuadrant {
            quadrant: q,
            piggy: Piggy {
                owner_tree: tree,
                owner_local: 0,
                owner_rank: rank,
            },
        }
    }

    #[test]
    fn class_contacts() {
        assert_eq!(NeighborClass::Face.contacts().count(), 6);
        assert_eq!(NeighborClass::FaceEdge.contacts().count(), 18);
        assert_eq!(NeighborClass::FaceCorner.contacts().count(), 14);
        for class in [
            NeighborClass::Face,
            NeighborClass::FaceEdge,
            NeighborClass::FaceCorner,
            NeighborClass::Full,
        ] {
            assert_eq!(class.contacts().count(), class.num_contacts());
        }
    }

    #[test]
    fn offsets_and_searches() {
        let r = Quadrant::root();
        let ghosts = vec![
            ghost(0, r.child(6), 1),
            ghost(0, r.child(7), 1),
            ghost(2, r.child(0), 2),
            ghost(2, r.child(1), 3),
        ];
        let layer = GhostLayer::from_sorted(0, NeighborClass::Face, 3, 4, ghosts);
        layer.validate_invariants().unwrap();
        assert_eq!(layer.tree_offsets(), &[0, 2, 2, 4]);
        assert_eq!(layer.proc_offsets(), &[0, 0, 2, 3, 4]);
        assert_eq!(layer.tree_bsearch(0, &r.child(7)), Some(1));
        assert_eq!(layer.tree_bsearch(1, &r.child(7)), None);
        assert_eq!(layer.bsearch(Some(3), Some(2), &r.child(1)), Some(3));
        assert_eq!(layer.bsearch(Some(2), None, &r.child(1)), None);
        assert_eq!(layer.bsearch(None, None, &r.child(0)), Some(2));
        assert!(layer.tree_ghosts(5).is_empty());
    }

    #[test]
    fn invariants_catch_disorder_and_self_ownership() {
        let r = Quadrant::root();
        let unsorted = GhostLayer::from_sorted(
            0,
            NeighborClass::Face,
            1,
            2,
            vec![ghost(0, r.child(2), 1), ghost(0, r.child(1), 1)],
        );
        assert!(matches!(
            unsorted.validate_invariants(),
            Err(MeshForestError::GhostInvariant(_))
        ));
        let own = GhostLayer::from_sorted(1, NeighborClass::Face, 1, 2, vec![ghost(0, r, 1)]);
        assert!(own.validate_invariants().is_err());
    }

    #[test]
    fn single_rank_has_no_ghosts() {
        let conn = Arc::new(builtin::periodic().unwrap());
        let forest = Forest::new_uniform(conn, 2, 0, 1).unwrap();
        let layer = ghost_new(&forest, &NoComm, NeighborClass::Full).unwrap();
        assert!(layer.is_empty());
        assert_eq!(layer.tree_offsets(), &[0, 0]);
        assert_eq!(layer.proc_offsets(), &[0, 0]);
        layer.destroy();
    }

    #[test]
    fn frames_follow_the_region() {
        let conn = builtin::brick([2, 2, 2], [false; 3]).unwrap();
        // tree 0 sits at the low corner; its upper neighbors are trees 1, 2, 4
        assert!(matches!(frames_for(&conn, 0, [0, 0, 0]).unwrap()[..], [Frame::Same]));
        assert!(frames_for(&conn, 0, [-1, 0, 0]).unwrap().is_empty());
        let face = frames_for(&conn, 0, [1, 0, 0]).unwrap();
        assert!(matches!(face[..], [Frame::Face(ft)] if ft.ntree == 1));
        let edge = frames_for(&conn, 0, [1, 1, 0]).unwrap();
        assert!(matches!(edge[..], [Frame::Edge(11, et)] if et.ntree == 3));
        let corner = frames_for(&conn, 0, [1, 1, 1]).unwrap();
        assert!(matches!(corner[..], [Frame::Corner(ct)] if ct.ntree == 7 && ct.ncorner == 0));
    }

    #[test]
    fn failing_rank_does_not_strand_its_peers() {
        use crate::algs::communicator::RayonComm;

        let conn = Arc::new(builtin::two_cubes().unwrap());
        let good = Forest::new_uniform(conn.clone(), 1, 0, 2).unwrap();
        // built for three ranks, run on a world of two
        let stale = Forest::new_uniform(conn, 1, 1, 3).unwrap();
        let world = RayonComm::world(2);
        let (first, second) = std::thread::scope(|s| {
            let h = s.spawn(|| ghost_new(&stale, &world[1], NeighborClass::Face));
            (ghost_new(&good, &world[0], NeighborClass::Face), h.join().unwrap())
        });
        assert!(matches!(second, Err(MeshForestError::InvalidPartition(_))));
        match first {
            Err(MeshForestError::CommError { neighbor: 1, message }) => {
                assert!(message.contains("abandoned"), "{message}")
            }
            other => panic!("expected rank 0 to fail on rank 1, got {other:?}"),
        }
    }

    #[test]
    fn mismatched_communicator_is_rejected() {
        let conn = Arc::new(builtin::two_cubes().unwrap());
        let forest = Forest::new_uniform(conn, 1, 1, 2).unwrap();
        assert!(matches!(
            ghost_new(&forest, &NoComm, NeighborClass::Face),
            Err(MeshForestError::InvalidPartition(_))
        ));
    }
}
