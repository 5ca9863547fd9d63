//! Wire encoding for mutations, changes, and cuboid transfer.
//!
//! The format is hand-written bytes rather than a serde format: every message
//! starts with a single-byte type tag whose values are append-only, so old
//! decoders reject new tags instead of misreading them.

pub mod transfer;
pub mod wire;

pub use transfer::{InboundTransfer, OutboundTransfer, TransferError, TransferMessage};
pub use wire::{decode_change, decode_mutation, encode_change, encode_mutation};
