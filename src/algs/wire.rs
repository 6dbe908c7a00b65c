//! Fixed, versioned, little-endian wire types for the ghost exchange.

use bytemuck::{Pod, Zeroable};
use std::mem::{align_of, size_of};

use crate::forest::quadrant::Quadrant;
use crate::mesh_error::MeshForestError;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

/// Reinterpret received bytes as records, copying so alignment never matters.
pub fn read_records<T: Pod>(v: &[u8]) -> Result<Vec<T>, String> {
    if v.len() % size_of::<T>() != 0 {
        return Err(format!(
            "{} bytes is not a whole number of {}-byte records",
            v.len(),
            size_of::<T>()
        ));
    }
    Ok(v.chunks_exact(size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Message kinds carried in [`WireHdr::kind`].
pub const KIND_GHOST: u16 = 1;

/// All multi-byte integers in these structs are **little-endian** on the wire.
/// We store them pre-LE with `.to_le()` and decode with `.from_le()`.

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,
    pub kind_le: u16,
    pub reserved_le: u32, // keep zero
}

impl WireHdr {
    pub fn new(kind: u16) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            reserved_le: 0,
        }
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32, // count of following records
}
impl WireCount {
    /// Sent in place of a count by a rank that gives up on the exchange.
    pub const ABANDON: u32 = u32::MAX;

    pub fn new(n: usize) -> Result<Self, MeshForestError> {
        match u32::try_from(n) {
            Ok(v) if v != Self::ABANDON => Ok(Self { n_le: v.to_le() }),
            _ => Err(MeshForestError::WireOverflow {
                what: "record count",
                value: n,
            }),
        }
    }
    pub fn abandon() -> Self {
        Self {
            n_le: Self::ABANDON.to_le(),
        }
    }
    pub fn is_abandon(&self) -> bool {
        u32::from_le(self.n_le) == Self::ABANDON
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

fn wire_u32(what: &'static str, value: usize) -> Result<u32, MeshForestError> {
    u32::try_from(value).map_err(|_| MeshForestError::WireOverflow { what, value })
}

/// One ghost quadrant: anchor, level, owner tree and owner-local index.
/// NOTE: tree and index are u32 (never usize) on the wire.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct WireGhost {
    pub x_le: i32,
    pub y_le: i32,
    pub z_le: i32,
    pub level: u8,
    pub _pad: [u8; 3],
    pub tree_le: u32,
    pub local_le: u32,
}

impl WireGhost {
    pub fn new(tree: usize, local: usize, q: &Quadrant) -> Result<Self, MeshForestError> {
        Ok(Self {
            x_le: q.x.to_le(),
            y_le: q.y.to_le(),
            z_le: q.z.to_le(),
            level: q.level,
            _pad: [0; 3],
            tree_le: wire_u32("tree id", tree)?.to_le(),
            local_le: wire_u32("local index", local)?.to_le(),
        })
    }
    pub fn quadrant(&self) -> Quadrant {
        Quadrant::new(
            i32::from_le(self.x_le),
            i32::from_le(self.y_le),
            i32::from_le(self.z_le),
            self.level,
        )
    }
    pub fn tree(&self) -> usize {
        u32::from_le(self.tree_le) as usize
    }
    pub fn local(&self) -> usize {
        u32::from_le(self.local_le) as usize
    }
}

// ---- Compile-time layout checks --------------------------------------------
static_assertions::const_assert_eq!(size_of::<WireHdr>(), 8);
static_assertions::const_assert_eq!(align_of::<WireHdr>(), 4);
static_assertions::const_assert_eq!(size_of::<WireCount>(), 4);
static_assertions::const_assert_eq!(size_of::<WireGhost>(), 24);
static_assertions::const_assert_eq!(align_of::<WireGhost>(), 4);

/// Encode a ghost payload: header followed by the records.
pub fn encode_ghosts(records: &[WireGhost]) -> Vec<u8> {
    let mut out = Vec::with_capacity(size_of::<WireHdr>() + records.len() * size_of::<WireGhost>());
    out.extend_from_slice(bytemuck::bytes_of(&WireHdr::new(KIND_GHOST)));
    out.extend_from_slice(cast_slice(records));
    out
}

/// Split a ghost payload into header and records.
pub fn decode_ghosts(bytes: &[u8]) -> Result<(WireHdr, Vec<WireGhost>), String> {
    if bytes.len() < size_of::<WireHdr>() {
        return Err(format!("{} bytes cannot hold a header", bytes.len()));
    }
    let (hdr, body) = bytes.split_at(size_of::<WireHdr>());
    let hdr: WireHdr = bytemuck::pod_read_unaligned(hdr);
    Ok((hdr, read_records(body)?))
}
