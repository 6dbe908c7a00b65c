//! Opt-in invariant checks for the validated structures of this crate.
//!
//! [`DebugInvariants::validate_invariants`] is always available and reports
//! the first violation it finds. [`DebugInvariants::debug_assert_invariants`]
//! panics on a violation, but only in debug builds or when the
//! `check-invariants` or `strict-invariants` feature is enabled; otherwise it
//! compiles to nothing.

use crate::mesh_error::MeshForestError;

pub trait DebugInvariants {
    /// Panic on a violated invariant when checks are compiled in.
    fn debug_assert_invariants(&self);
    /// First violated invariant, if any.
    fn validate_invariants(&self) -> Result<(), MeshForestError>;
}

/// Run `$check` (a `Result`) and panic with `$what` and the error when
/// invariant checks are compiled in.
#[macro_export]
macro_rules! debug_invariants {
    ($check:expr, $what:literal) => {
        #[cfg(any(debug_assertions, feature = "check-invariants", feature = "strict-invariants"))]
        {
            if let Err(err) = $check {
                panic!("{} violates its invariants: {}", $what, err);
            }
        }
    };
}
