//! Internal utilities for the Cause algebra.
//!
//! These utilities are intentionally minimal and dependency-free so that
//! equivalence checks and canonical hashes are deterministic.

pub mod det_hash;
pub mod trampoline;

pub use det_hash::{DetBuildHasher, DetHasher};
pub use trampoline::Trampoline;
