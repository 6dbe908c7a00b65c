//! Two-stage point-to-point exchange: counts, then fixed-size records.
//!
//! Both stages post every receive before any send and drain every handle
//! before returning, even when a peer fails. The first failure is reported.

use std::collections::BTreeMap;
use std::mem::size_of;

use bytemuck::Zeroable;

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{
    WIRE_VERSION, WireCount, WireGhost, WireHdr, cast_slice, cast_slice_mut, decode_ghosts,
    encode_ghosts, expect_exact_len,
};
use crate::mesh_error::MeshForestError;

/// Send `outgoing[p]` to every peer `p` and return what each peer sent back.
///
/// Every rank takes part with every other rank; a peer with nothing to send
/// still sends a zero count.
pub fn exchange_counts<C>(
    comm: &C,
    outgoing: &[usize],
    tag: CommTag,
) -> Result<Vec<usize>, MeshForestError>
where
    C: Communicator,
{
    exchange_counts_or_abandon(comm, Ok(outgoing), tag)
}

/// [`exchange_counts`] for a rank that may already have failed.
///
/// A rank passing `Err` still takes part, sending an abandon marker instead
/// of counts, and gets its own error back. Its peers fail with a
/// [`MeshForestError::CommError`] naming it, so no rank enters a later stage
/// alone.
pub fn exchange_counts_or_abandon<C>(
    comm: &C,
    outgoing: Result<&[usize], &MeshForestError>,
    tag: CommTag,
) -> Result<Vec<usize>, MeshForestError>
where
    C: Communicator,
{
    let me = comm.rank();
    let peers: Vec<usize> = (0..comm.size()).filter(|&p| p != me).collect();

    let mut local_err = outgoing.err().cloned();
    let mut records = vec![WireCount::abandon(); comm.size()];
    if let Ok(counts) = outgoing {
        let encoded = if counts.len() == comm.size() {
            counts.iter().map(|&n| WireCount::new(n)).collect()
        } else {
            Err(MeshForestError::InvalidPartition(format!(
                "{} counts for {} ranks",
                counts.len(),
                comm.size()
            )))
        };
        match encoded {
            Ok(encoded) => records = encoded,
            Err(err) => local_err = Some(err),
        }
    }

    // 1) post all receives
    let mut recv_size = Vec::with_capacity(peers.len());
    for &nbr in &peers {
        let mut cnt = WireCount::zeroed();
        let h = comm.irecv(
            nbr,
            tag.as_u16(),
            cast_slice_mut(std::slice::from_mut(&mut cnt)),
        );
        recv_size.push((nbr, h));
    }

    // 2) post all sends
    let mut pending_sends = Vec::with_capacity(peers.len());
    for &nbr in &peers {
        pending_sends.push(comm.isend(
            nbr,
            tag.as_u16(),
            cast_slice(std::slice::from_ref(&records[nbr])),
        ));
    }

    // 3) wait for all recvs, keep only the first error
    let mut sizes_in = vec![0usize; comm.size()];
    let mut maybe_err = None;
    for (nbr, h) in recv_size {
        match h.wait() {
            Some(data) if data.len() == size_of::<WireCount>() => {
                let cnt: WireCount = bytemuck::pod_read_unaligned(&data);
                if cnt.is_abandon() {
                    maybe_err.get_or_insert(MeshForestError::CommError {
                        neighbor: nbr,
                        message: format!("rank {nbr} abandoned the exchange"),
                    });
                } else {
                    sizes_in[nbr] = cnt.get();
                }
            }
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(MeshForestError::CommError {
                    neighbor: nbr,
                    message: format!(
                        "expected {} bytes for size header, got {}",
                        size_of::<WireCount>(),
                        data.len()
                    ),
                });
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(MeshForestError::CommError {
                    neighbor: nbr,
                    message: format!("failed to receive size from rank {nbr}"),
                });
            }
            _ => {} // already failed; just drain
        }
    }

    // 4) always drain all send handles
    for send in pending_sends {
        let _ = send.wait();
    }

    match local_err.or(maybe_err) {
        Some(err) => Err(err),
        None => Ok(sizes_in),
    }
}

/// Ship ghost records to the peers in `outgoing` and receive `incoming[p]`
/// records from every peer with a non-zero count.
pub fn exchange_ghosts<C>(
    comm: &C,
    outgoing: &BTreeMap<usize, Vec<WireGhost>>,
    incoming: &[usize],
    tag: CommTag,
) -> Result<BTreeMap<usize, Vec<WireGhost>>, MeshForestError>
where
    C: Communicator,
{
    let me = comm.rank();

    // 1) post receives sized for header + records
    let mut pending_recvs = Vec::new();
    for (nbr, &n) in incoming.iter().enumerate() {
        if nbr == me || n == 0 {
            continue;
        }
        let expected = size_of::<WireHdr>() + n * size_of::<WireGhost>();
        let mut buf = vec![0u8; expected];
        let h = comm.irecv(nbr, tag.as_u16(), &mut buf);
        pending_recvs.push((nbr, n, expected, h));
    }

    // 2) post sends
    let mut pending_sends = Vec::with_capacity(outgoing.len());
    for (&nbr, records) in outgoing {
        if nbr == me || records.is_empty() {
            continue;
        }
        let payload = encode_ghosts(records);
        log::trace!(
            "[rank {me}] sending {} ghosts ({} bytes) to rank {nbr}",
            records.len(),
            payload.len()
        );
        pending_sends.push(comm.isend(nbr, tag.as_u16(), &payload));
    }

    // 3) wait for receives
    let mut received = BTreeMap::new();
    let mut maybe_err = None;
    for (nbr, n, expected, h) in pending_recvs {
        let data = h.wait();
        if maybe_err.is_some() {
            continue;
        }
        let Some(data) = data else {
            maybe_err = Some(MeshForestError::CommError {
                neighbor: nbr,
                message: format!("failed to receive {n} ghosts from rank {nbr}"),
            });
            continue;
        };
        if let Err(message) = expect_exact_len(data.len(), expected) {
            maybe_err = Some(MeshForestError::CommError {
                neighbor: nbr,
                message,
            });
            continue;
        }
        match decode_ghosts(&data) {
            Ok((hdr, _)) if hdr.version() != WIRE_VERSION => {
                maybe_err = Some(MeshForestError::WireVersion {
                    neighbor: nbr,
                    expected: WIRE_VERSION,
                    found: hdr.version(),
                });
            }
            Ok((_, records)) => {
                log::trace!("[rank {me}] received {} ghosts from rank {nbr}", records.len());
                received.insert(nbr, records);
            }
            Err(message) => {
                maybe_err = Some(MeshForestError::CommError {
                    neighbor: nbr,
                    message,
                });
            }
        }
    }

    // 4) always drain all send handles
    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(received),
    }
}
