//! Cuboid spatial store: one octree per block aspect over a fixed 32³ region.
//!
//! # Invariants
//! - Every aspect tree of a cuboid spans the same 32³ domain.
//! - Setting a value equal to all its siblings coalesces the subtree back
//!   into a single uniform leaf, recursively bottom-up.
//! - The previous-tick cuboid is immutable and shared; in-tick writes go
//!   through a per-aspect overlay that is merged at commit.

pub mod cuboid;
pub mod octree;
pub mod transfer;

pub use cuboid::{Aspect, AspectValue, Cuboid, CuboidOverlay};
pub use octree::Octree;
pub use transfer::{DeserializeCursor, Progress, SerializeCursor};
