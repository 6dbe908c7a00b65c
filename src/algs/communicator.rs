//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are contiguous byte slices. Handles are non-blocking until
//! `.wait()`, which returns the received bytes (`None` on failure or timeout).
//! Between one sender and one receiver, messages with the same tag are
//! delivered in the order they were sent.

use std::collections::VecDeque;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};

/// Non-blocking point-to-point interface.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of at most `buf.len()` bytes.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// A message tag. Collective operations derive their tags from a base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommTag(u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// The tag `n` steps after this one.
    pub const fn offset(self, n: u16) -> Self {
        Self(self.0.wrapping_add(n))
    }
}

/// Single-rank communicator; every operation is a no-op.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }
}

// --- RayonComm: ranks as threads of one process ---

type Key = (usize, usize, u16); // (src, dst, tag)

/// Message store shared by the ranks of one in-process world.
#[derive(Default)]
struct Mailbox {
    slots: DashMap<Key, VecDeque<Bytes>>,
    gate: Mutex<()>,
    arrived: Condvar,
}

impl Mailbox {
    fn post(&self, key: Key, data: Bytes) {
        self.slots.entry(key).or_default().push_back(data);
        let _gate = self.gate.lock();
        self.arrived.notify_all();
    }

    fn take(&self, key: &Key) -> Option<Bytes> {
        self.slots.get_mut(key).and_then(|mut q| q.pop_front())
    }

    fn take_until(&self, key: &Key, deadline: Instant) -> Option<Bytes> {
        let mut gate = self.gate.lock();
        loop {
            if let Some(data) = self.take(key) {
                return Some(data);
            }
            if self.arrived.wait_until(&mut gate, deadline).timed_out() {
                return self.take(key);
            }
        }
    }
}

fn global_mailbox() -> Arc<Mailbox> {
    static GLOBAL: OnceLock<Arc<Mailbox>> = OnceLock::new();
    GLOBAL.get_or_init(|| Arc::new(Mailbox::default())).clone()
}

/// Receive handle of [`RayonComm`]; blocks on `wait` until the message arrives.
pub struct LocalHandle {
    mailbox: Arc<Mailbox>,
    key: Key,
    max_len: usize,
    timeout: Duration,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let data = self
            .mailbox
            .take_until(&self.key, Instant::now() + self.timeout)?;
        if data.len() > self.max_len {
            log::warn!(
                "rank {} received {} bytes from rank {} (tag {}), buffer holds {}",
                self.key.1,
                data.len(),
                self.key.0,
                self.key.2,
                self.max_len
            );
            return None;
        }
        Some(data.to_vec())
    }
}

/// In-process communicator: each rank runs on its own thread.
#[derive(Clone)]
pub struct RayonComm {
    rank: usize,
    size: usize,
    timeout: Duration,
    mailbox: Arc<Mailbox>,
}

impl std::fmt::Debug for RayonComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RayonComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RayonComm {
    /// Receives give up after this long, so a missing peer surfaces as an error.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Rank `rank` of a world of `size` sharing the process-wide mailbox.
    ///
    /// Worlds created this way see each other's messages; tests that use it
    /// concurrently must not reuse tags.
    pub fn new(rank: usize, size: usize) -> Self {
        Self {
            rank,
            size,
            timeout: Self::DEFAULT_TIMEOUT,
            mailbox: global_mailbox(),
        }
    }

    /// All ranks of a fresh, isolated world.
    pub fn world(size: usize) -> Vec<Self> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| Self {
                rank,
                size,
                timeout: Self::DEFAULT_TIMEOUT,
                mailbox: mailbox.clone(),
            })
            .collect()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Communicator for RayonComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        self.mailbox
            .post((self.rank, peer, tag), Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> LocalHandle {
        LocalHandle {
            mailbox: self.mailbox.clone(),
            key: (peer, self.rank, tag),
            max_len: buf.len(),
            timeout: self.timeout,
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use mpi::datatype::Equivalence;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// Communicator over `MPI_COMM_WORLD`. The caller keeps the universe alive.
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self { world, rank, size }
        }
    }

    /// Pending request on a heap buffer owned by the handle.
    pub struct MpiHandle {
        request: Request<'static, [u8], StaticScope>,
        buf: *mut [u8],
        receive: bool,
    }

    impl Wait for MpiHandle {
        fn wait(self) -> Option<Vec<u8>> {
            let status = self.request.wait();
            // SAFETY: the request that borrowed the buffer has completed and
            // been consumed; `buf` came from `Box::leak` in this module.
            let buf = unsafe { Box::from_raw(self.buf) };
            if !self.receive {
                return None;
            }
            let n = status.count(u8::equivalent_datatype());
            usize::try_from(n).ok().map(|n| buf[..n.min(buf.len())].to_vec())
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            let data: &'static mut [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let ptr: *mut [u8] = data;
            // SAFETY: `ptr` stays allocated until `wait` frees it.
            let shared: &'static [u8] = unsafe { &*ptr };
            let request = self.world.process_at_rank(peer as i32).immediate_send_with_tag(
                StaticScope,
                shared,
                i32::from(tag),
            );
            MpiHandle {
                request,
                buf: ptr,
                receive: false,
            }
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiHandle {
            let data: &'static mut [u8] = Box::leak(vec![0u8; buf.len()].into_boxed_slice());
            let ptr: *mut [u8] = data;
            // SAFETY: as in `isend`; only the request touches the buffer until `wait`.
            let target: &'static mut [u8] = unsafe { &mut *ptr };
            let request = self
                .world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, target, i32::from(tag));
            MpiHandle {
                request,
                buf: ptr,
                receive: true,
            }
        }

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
