//! Deterministic tick/mutation engine over the cuboid spatial store.
//!
//! One tick is the unit of atomicity: queued entity changes apply first, then
//! block mutations against the frozen previous-tick snapshot, then the
//! implicit end-of-tick pass, then commit. Mutations observe the world only
//! through the [`context::TickContext`] passed into `apply`.
//!
//! # Invariants
//! - All reads of previous-tick state come from the frozen snapshot.
//! - A rejected mutation's proxy writes never reach committed state; its
//!   already-enqueued follow-ups still fire (a deliberate sharp edge).
//! - Given the same snapshot, queues and seed, a tick commits byte-identical
//!   state and emits identical follow-up queues.

pub mod change;
pub mod config;
pub mod context;
pub mod engine;
pub mod entity;
pub mod event;
pub mod movement;
pub mod mutation;
pub mod placement;
pub mod proxy;
pub mod rng;
pub mod world;

pub use change::EntityChange;
pub use config::SimConfig;
pub use context::{ChangeSource, TickContext};
pub use engine::{SavedQueues, TickDelta, TickEngine, TickStats};
pub use entity::{Entity, EntityInfo, InProgress};
pub use event::SimEvent;
pub use mutation::BlockMutation;
pub use placement::StructureCell;
pub use world::{WorldSnapshot, WorldState};
