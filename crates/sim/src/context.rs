//! The per-tick capability bundle handed to every `apply`.
//!
//! This is the sole channel through which a mutation may observe or affect
//! anything outside its own target. Kept as explicit parameter passing, no
//! globals or thread-locals.

use crate::change::EntityChange;
use crate::config::SimConfig;
use crate::entity::EntityInfo;
use crate::event::SimEvent;
use crate::mutation::BlockMutation;
use crate::proxy::BlockView;
use crate::rng::TickRng;
use crate::world::WorldSnapshot;
use blockfield_common::{BlockLoc, EntityId};
use glam::Vec3;

/// Where a queued change originated. Next-tick queues drain in this order;
/// the ordering is load-bearing for fairness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeSource {
    FromChange,
    FromMutation,
    JoinedEntity,
    External,
}

/// A creature spawn requested through the context's narrow callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub passive: bool,
    pub at: Vec3,
}

/// Everything collected out of a tick for the engine to route.
#[derive(Debug, Default)]
pub(crate) struct TickSinks {
    /// Block mutations to run later this same tick.
    pub same_tick_mutations: Vec<BlockMutation>,
    /// Block mutations for the next tick.
    pub next_tick_mutations: Vec<BlockMutation>,
    /// Deferred block mutations: (mutation, delay in ms).
    pub future_mutations: Vec<(BlockMutation, u64)>,
    /// Entity changes enqueued by other changes.
    pub changes_from_changes: Vec<(EntityId, EntityChange)>,
    /// Entity changes enqueued by block mutations.
    pub changes_from_mutations: Vec<(EntityId, EntityChange)>,
    pub events: Vec<SimEvent>,
    pub spawns: Vec<SpawnRequest>,
}

/// Read-only per-tick bundle: previous-tick lookups, scheduling sinks, event
/// sink, timing, and a bounded random source.
pub struct TickContext<'a> {
    snapshot: &'a WorldSnapshot,
    config: &'a SimConfig,
    tick: u64,
    now_ms: u64,
    phase: ChangeSource,
    rng: TickRng,
    sinks: TickSinks,
}

impl<'a> TickContext<'a> {
    pub(crate) fn new(
        snapshot: &'a WorldSnapshot,
        config: &'a SimConfig,
        tick: u64,
        rng: TickRng,
    ) -> Self {
        Self {
            snapshot,
            config,
            tick,
            now_ms: tick * config.millis_per_tick as u64,
            phase: ChangeSource::External,
            rng,
            sinks: TickSinks::default(),
        }
    }

    /// Monotonic tick counter.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Wall-clock-equivalent current tick time.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn millis_per_tick(&self) -> u32 {
        self.config.millis_per_tick
    }

    /// The tick's configuration. Tied to the snapshot lifetime, not the
    /// context borrow, so callers can hold it across sink pushes.
    pub fn config(&self) -> &'a SimConfig {
        self.config
    }

    /// Previous-tick block proxy, or `None` for unloaded regions.
    pub fn block(&self, at: BlockLoc) -> Option<BlockView<'a>> {
        self.snapshot.block(at)
    }

    /// Previous-tick minimal entity view.
    pub fn entity(&self, id: EntityId) -> Option<EntityInfo> {
        self.snapshot.entity(id)
    }

    pub(crate) fn snapshot(&self) -> &'a WorldSnapshot {
        self.snapshot
    }

    /// Enqueue a block mutation to run later this same tick. Already
    /// processed blocks are revisited only via the engine's own propagation,
    /// never re-entrantly.
    pub fn push_mutation(&mut self, m: BlockMutation) {
        self.sinks.same_tick_mutations.push(m);
    }

    /// Enqueue a block mutation for the next tick.
    pub fn push_next_tick(&mut self, m: BlockMutation) {
        self.sinks.next_tick_mutations.push(m);
    }

    /// Schedule a block mutation after a delay in milliseconds.
    pub fn push_future(&mut self, m: BlockMutation, delay_ms: u64) {
        self.sinks.future_mutations.push((m, delay_ms));
    }

    /// Enqueue an entity change for the next tick. Routed by the phase that
    /// enqueued it, preserving the fairness ordering.
    pub fn push_change(&mut self, entity: EntityId, change: EntityChange) {
        match self.phase {
            ChangeSource::FromMutation => {
                self.sinks.changes_from_mutations.push((entity, change))
            }
            _ => self.sinks.changes_from_changes.push((entity, change)),
        }
    }

    /// Event sink for observability.
    pub fn emit(&mut self, event: SimEvent) {
        self.sinks.events.push(event);
    }

    /// Bounded random integer in 0..bound. Deterministic for a fixed seed.
    pub fn rand_below(&mut self, bound: u32) -> u32 {
        self.rng.below(bound)
    }

    /// Request a hostile creature spawn; materialized by the engine at commit.
    pub fn spawn_creature(&mut self, at: Vec3) {
        self.sinks.spawns.push(SpawnRequest { passive: false, at });
    }

    /// Request a passive creature spawn.
    pub fn spawn_passive(&mut self, at: Vec3) {
        self.sinks.spawns.push(SpawnRequest { passive: true, at });
    }

    pub(crate) fn set_phase(&mut self, phase: ChangeSource) {
        self.phase = phase;
    }

    pub(crate) fn drain_same_tick(&mut self) -> Vec<BlockMutation> {
        std::mem::take(&mut self.sinks.same_tick_mutations)
    }

    pub(crate) fn into_sinks(self) -> TickSinks {
        self.sinks
    }
}
