//! Octree quadrants in tree-local integer coordinates.
//!
//! A tree spans `[0, ROOT_LEN)^3`. A quadrant of level `l` has side
//! `2^(MAX_LEVEL - l)` and its anchor (lowest corner) is aligned to that side.
//! Neighbor construction may place a quadrant up to one root length outside
//! its tree; such quadrants are mapped into the neighboring tree with the
//! transforms at the end of this module.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::topology::cube::{
    CHILD_CORNER_EDGES, CHILD_CORNER_FACES, CHILD_EDGE_FACES, CORNERS, EDGE_CORNERS, EDGES,
    FACE_CORNERS, FACE_DUAL, FACES, edge_axis, opposite_edge,
};
use crate::topology::transform::{EdgeTransform, FaceTransform};

/// Depth of the coordinate system.
pub const MAX_LEVEL: u8 = 19;
/// Deepest level a stored quadrant may have.
pub const QMAX_LEVEL: u8 = 18;
/// Side length of a tree.
pub const ROOT_LEN: i32 = 1 << MAX_LEVEL;

/// Side length of a quadrant at `level`.
#[inline]
pub const fn quadrant_len(level: u8) -> i32 {
    1 << (MAX_LEVEL - level)
}

/// Spread the low `bits` bits of `v` so that bit `i` lands on bit `3 i`.
#[inline]
fn spread3(v: u64, bits: u32) -> u64 {
    let mut out = 0u64;
    for i in 0..bits {
        out |= ((v >> i) & 1) << (3 * i);
    }
    out
}

/// An octree cell: anchor coordinates and refinement level.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Quadrant {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub level: u8,
}

impl fmt::Debug for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q[{}]({}, {}, {})", self.level, self.x, self.y, self.z)
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Quadrant {
    /// Create a quadrant without validation.
    pub const fn new(x: i32, y: i32, z: i32, level: u8) -> Self {
        Self { x, y, z, level }
    }

    /// The level-0 quadrant covering a whole tree.
    pub const fn root() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Side length.
    #[inline]
    pub fn len(&self) -> i32 {
        quadrant_len(self.level)
    }

    #[inline]
    pub fn coords(&self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }

    #[inline]
    pub fn with_coords(coords: [i32; 3], level: u8) -> Self {
        Self::new(coords[0], coords[1], coords[2], level)
    }

    /// Level in range, anchor aligned, and at most one root length outside the tree.
    pub fn is_valid(&self) -> bool {
        if self.level > QMAX_LEVEL {
            return false;
        }
        let h = self.len();
        self.coords()
            .iter()
            .all(|&c| c % h == 0 && (-ROOT_LEN..2 * ROOT_LEN).contains(&c))
    }

    /// Lies inside `[0, ROOT_LEN)^3`.
    #[inline]
    pub fn is_inside_root(&self) -> bool {
        self.coords().iter().all(|&c| (0..ROOT_LEN).contains(&c))
    }

    /// Inside the tree or in the layer of same-size quadrants around it.
    pub fn is_extended(&self) -> bool {
        let h = self.len();
        self.coords().iter().all(|&c| (-h..=ROOT_LEN).contains(&c))
    }

    /// Per axis: `-1` below the tree, `1` above it, `0` inside.
    pub fn outside_sides(&self) -> [i8; 3] {
        self.coords().map(|c| {
            if c < 0 {
                -1
            } else if c >= ROOT_LEN {
                1
            } else {
                0
            }
        })
    }

    /// Position among its siblings (bit 0 = x, bit 1 = y, bit 2 = z).
    pub fn child_id(&self) -> usize {
        if self.level == 0 {
            return 0;
        }
        let h = self.len();
        usize::from(self.x & h != 0)
            | usize::from(self.y & h != 0) << 1
            | usize::from(self.z & h != 0) << 2
    }

    /// Returns the parent quadrant, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.level == 0 {
            return None;
        }
        let h = self.len();
        Some(Self::new(self.x & !h, self.y & !h, self.z & !h, self.level - 1))
    }

    /// Child `c` (by child id).
    pub fn child(&self, c: usize) -> Self {
        let h = quadrant_len(self.level + 1);
        Self::new(
            self.x + if c & 1 != 0 { h } else { 0 },
            self.y + if c & 2 != 0 { h } else { 0 },
            self.z + if c & 4 != 0 { h } else { 0 },
            self.level + 1,
        )
    }

    /// Returns the eight children in Morton order.
    pub fn children(&self) -> [Self; CORNERS] {
        std::array::from_fn(|c| self.child(c))
    }

    /// The descendant at `level` touching corner `corner` of this quadrant.
    pub fn corner_descendant(&self, corner: usize, level: u8) -> Self {
        let shift = self.len() - quadrant_len(level);
        Self::new(
            self.x + if corner & 1 != 0 { shift } else { 0 },
            self.y + if corner & 2 != 0 { shift } else { 0 },
            self.z + if corner & 4 != 0 { shift } else { 0 },
            level,
        )
    }

    /// Same-size neighbor across face `face`.
    pub fn face_neighbor(&self, face: usize) -> Self {
        let h = self.len();
        let mut c = self.coords();
        c[face / 2] += if face % 2 == 1 { h } else { -h };
        Self::with_coords(c, self.level)
    }

    /// Same-size neighbor across edge `edge`.
    pub fn edge_neighbor(&self, edge: usize) -> Self {
        let h = self.len();
        let mut c = self.coords();
        let (a, b) = edge_normal_axes(edge);
        c[a] += if edge & 1 != 0 { h } else { -h };
        c[b] += if edge & 2 != 0 { h } else { -h };
        Self::with_coords(c, self.level)
    }

    /// Same-size neighbor across corner `corner`.
    pub fn corner_neighbor(&self, corner: usize) -> Self {
        let h = self.len();
        let mut c = self.coords();
        for (axis, v) in c.iter_mut().enumerate() {
            *v += if corner >> axis & 1 != 0 { h } else { -h };
        }
        Self::with_coords(c, self.level)
    }

    /// Morton index of the anchor at maximum resolution (inside quadrants only).
    pub fn morton_key(&self) -> u64 {
        let m = (1u64 << MAX_LEVEL) - 1;
        spread3(self.x as u64 & m, MAX_LEVEL as u32)
            | spread3(self.y as u64 & m, MAX_LEVEL as u32) << 1
            | spread3(self.z as u64 & m, MAX_LEVEL as u32) << 2
    }

    /// Morton key over the extended domain `[-ROOT_LEN, 2 ROOT_LEN)^3`;
    /// agrees in order with [`Quadrant::morton_key`] for inside quadrants.
    fn extended_key(&self) -> u64 {
        let bits = MAX_LEVEL as u32 + 2;
        let off = |c: i32| (c as i64 + ROOT_LEN as i64) as u64;
        spread3(off(self.x), bits) | spread3(off(self.y), bits) << 1 | spread3(off(self.z), bits) << 2
    }

    /// The `index`-th quadrant of a uniform refinement at `level`.
    pub fn from_morton(level: u8, index: u64) -> Self {
        let (mut x, mut y, mut z) = (0i32, 0i32, 0i32);
        for i in 0..level as u32 {
            x |= (((index >> (3 * i)) & 1) as i32) << i;
            y |= (((index >> (3 * i + 1)) & 1) as i32) << i;
            z |= (((index >> (3 * i + 2)) & 1) as i32) << i;
        }
        let shift = (MAX_LEVEL - level) as u32;
        Self::new(x << shift, y << shift, z << shift, level)
    }

    /// `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        if self.level >= other.level {
            return false;
        }
        let mask = !(self.len() - 1);
        (other.x & mask) == self.x && (other.y & mask) == self.y && (other.z & mask) == self.z
    }

    // ---------------------------------------------------------------------
    // Frame transforms into neighboring trees
    // ---------------------------------------------------------------------

    /// Map a quadrant lying across the face of `ft` into the neighbor tree.
    pub fn transform_face(&self, ft: &FaceTransform) -> Self {
        let axes = &ft.axes;
        let my = self.coords();
        let mh = -self.len();
        let rmh = ROOT_LEN + mh;
        let trmh = ROOT_LEN + rmh;
        let mut target = [0i32; 3];

        for i in 0..2 {
            let v = my[axes.my_axis[i] as usize];
            target[axes.target_axis[i] as usize] = if axes.edge_reverse[i] == 0 {
                v
            } else {
                rmh - v
            };
        }
        let v = my[axes.my_axis[2] as usize];
        target[axes.target_axis[2] as usize] = match axes.edge_reverse[2] {
            0 => mh - v,
            1 => v + ROOT_LEN,
            2 => v - ROOT_LEN,
            _ => trmh - v,
        };
        Self::with_coords(target, self.level)
    }

    /// Map a quadrant at (or across) edge `iedge` onto edge `et.nedge` of the
    /// neighbor tree, inside it when `inside` is set, diagonally outside otherwise.
    pub fn transform_edge(&self, iedge: usize, et: &EdgeTransform, inside: bool) -> Self {
        let mh = -self.len();
        let rmh = ROOT_LEN + mh;
        let (lshift, rshift) = if inside { (0, rmh) } else { (mh, ROOT_LEN) };
        let along = self.coords()[edge_axis(iedge)];
        let mut target = [0i32; 3];

        target[et.naxis[0] as usize] = if et.nflip { rmh - along } else { along };
        let corners = et.corners as usize;
        target[et.naxis[1] as usize] = if corners & 1 != 0 { rshift } else { lshift };
        target[et.naxis[2] as usize] = if corners & 2 != 0 { rshift } else { lshift };
        Self::with_coords(target, self.level)
    }

    /// Place a quadrant of the same level at corner `ncorner` of a tree,
    /// inside it when `inside` is set, diagonally outside otherwise.
    pub fn transform_corner(&self, ncorner: usize, inside: bool) -> Self {
        let h = self.len();
        let (lshift, rshift) = if inside {
            (0, ROOT_LEN - h)
        } else {
            (-h, ROOT_LEN)
        };
        let c = std::array::from_fn(|axis| {
            if ncorner >> axis & 1 != 0 {
                rshift
            } else {
                lshift
            }
        });
        Self::with_coords(c, self.level)
    }
}

impl PartialOrd for Quadrant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Morton order; an ancestor sorts before its descendants.
impl Ord for Quadrant {
    fn cmp(&self, other: &Self) -> Ordering {
        self.extended_key()
            .cmp(&other.extended_key())
            .then(self.level.cmp(&other.level))
    }
}

/// The two axes an edge is offset along, in the order its index bits use them.
#[inline]
pub const fn edge_normal_axes(edge: usize) -> (usize, usize) {
    match edge_axis(edge) {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    }
}

/// A face, edge or corner of a quadrant through which a neighbor is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Contact {
    Face(usize),
    Edge(usize),
    Corner(usize),
}

impl Contact {
    /// Same-size neighbor of `q` through this contact.
    pub fn neighbor(self, q: &Quadrant) -> Quadrant {
        match self {
            Contact::Face(f) => q.face_neighbor(f),
            Contact::Edge(e) => q.edge_neighbor(e),
            Contact::Corner(c) => q.corner_neighbor(c),
        }
    }

    /// Corners of the neighbor that touch the originating quadrant.
    pub fn neighbor_contact_corners(self) -> &'static [u8] {
        const SINGLE: [[u8; 1]; CORNERS] = [[0], [1], [2], [3], [4], [5], [6], [7]];
        match self {
            Contact::Face(f) => &FACE_CORNERS[FACE_DUAL[f] as usize],
            Contact::Edge(e) => &EDGE_CORNERS[opposite_edge(e)],
            Contact::Corner(c) => &SINGLE[CORNERS - 1 - c],
        }
    }

    /// The contact of the parent that this contact of child `child` lies on,
    /// or `None` when it lies inside the parent.
    pub fn on_parent(self, child: usize) -> Option<Contact> {
        let face = |f: i8| usize::try_from(f).ok().map(Contact::Face);
        match self {
            Contact::Face(f) => FACE_CORNERS[f]
                .contains(&(child as u8))
                .then_some(Contact::Face(f)),
            Contact::Edge(e) if EDGE_CORNERS[e].contains(&(child as u8)) => Some(Contact::Edge(e)),
            Contact::Edge(e) => face(CHILD_EDGE_FACES[child][e]),
            Contact::Corner(c) if c == child => Some(Contact::Corner(c)),
            Contact::Corner(c) => usize::try_from(CHILD_CORNER_EDGES[child][c])
                .ok()
                .map(Contact::Edge)
                .or_else(|| face(CHILD_CORNER_FACES[child][c])),
        }
    }

    /// All faces, then edges, then corners.
    pub fn all() -> impl Iterator<Item = Contact> {
        (0..FACES)
            .map(Contact::Face)
            .chain((0..EDGES).map(Contact::Edge))
            .chain((0..CORNERS).map(Contact::Corner))
    }
}
