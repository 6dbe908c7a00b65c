//! Re-export public algorithms.

pub mod balance;
pub mod communicator;
pub mod exchange;
pub mod exists;
pub mod ghost;
pub mod owner;
pub mod wire;

pub use balance::is_balanced;
pub use exists::{face_quadrant_exists, quadrant_exists};
pub use ghost::ghost_new;
pub use owner::find_owner;
