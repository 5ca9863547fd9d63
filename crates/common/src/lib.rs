//! Shared types and utilities for the blockfield simulation core.
//!
//! # Invariants
//! - Entity ids are signed: positive = player, negative = creature, zero reserved.
//! - Cuboids are fixed 32³ volumes; local coordinates are always in 0..32.

pub mod codec;
pub mod types;

pub use codec::{ByteReader, ByteWriter, CodecError};
pub use types::{
    BlockFlags, BlockLoc, BlockType, CuboidAddr, EntityId, Inventory, ItemStack, ItemType,
    LocalCoord, Orientation, CUBOID_EDGE, CUBOID_VOLUME,
};
