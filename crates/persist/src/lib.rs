//! File-backed persistence for the world and its surviving queues.
//!
//! # Invariants
//! - Saves are content-hashed; corruption is detected on load, never repaired.
//! - Schema version mismatches fail closed.
//! - Only operations marked safe to persist survive a save/load cycle.

pub mod snapshot;
pub mod store;

pub use snapshot::SaveState;
pub use store::{IntegrityManifest, ManifestEntry, SaveError, WorldMeta, WorldStore};
