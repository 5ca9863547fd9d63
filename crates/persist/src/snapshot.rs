use crate::store::SaveError;
use blockfield_common::CuboidAddr;
use blockfield_sim::{Entity, SavedQueues, SimConfig, TickEngine, WorldState};
use blockfield_store::Cuboid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A content-hashed capture of the world plus the engine's surviving queues.
///
/// Cuboids are stored as their wire payloads rather than a serde tree; the
/// payload codec is the single source of truth for cuboid bytes, on disk and
/// on the network alike.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveState {
    pub tick: u64,
    pub seed: u64,
    pub config: SimConfig,
    pub cuboids: Vec<(CuboidAddr, Vec<u8>)>,
    pub entities: Vec<Entity>,
    pub queues: SavedQueues,
    /// FNV-1a content hash for corruption detection on load.
    pub hash: u64,
}

impl SaveState {
    /// Capture the current world and engine queue state. Queue entries that
    /// must not survive a restart are filtered out here.
    pub fn capture(world: &WorldState, engine: &TickEngine) -> Self {
        let cuboids: Vec<(CuboidAddr, Vec<u8>)> = world
            .cuboids()
            .iter()
            .map(|(addr, c)| (*addr, c.encode_payload()))
            .collect();
        let entities: Vec<Entity> = world.entities().values().cloned().collect();
        let queues = engine.save_queues(world.tick());

        let mut state = Self {
            tick: world.tick(),
            seed: engine.seed(),
            config: engine.config().clone(),
            cuboids,
            entities,
            queues,
            hash: 0,
        };
        state.hash = state.content_hash();
        state
    }

    /// Recompute the content hash and compare against the stored one.
    pub fn verify(&self) -> bool {
        self.hash == self.content_hash()
    }

    /// Rebuild the world and a queue-primed engine from this save.
    pub fn restore(&self) -> Result<(WorldState, TickEngine), SaveError> {
        let mut cuboids = BTreeMap::new();
        for (addr, payload) in &self.cuboids {
            cuboids.insert(*addr, Cuboid::decode_payload(payload)?);
        }
        let world = WorldState::from_saved(self.tick, cuboids, self.entities.clone());
        let mut engine = TickEngine::with_seed(self.config.clone(), self.seed);
        engine.restore_queues(self.queues.clone(), self.tick);
        Ok((world, engine))
    }

    fn content_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        mix(&mut h, &self.tick.to_le_bytes());
        mix(&mut h, &self.seed.to_le_bytes());
        for (addr, payload) in &self.cuboids {
            mix(&mut h, &addr.x.to_le_bytes());
            mix(&mut h, &addr.y.to_le_bytes());
            mix(&mut h, &addr.z.to_le_bytes());
            mix(&mut h, payload);
        }
        // Entities and queues hash through their debug form; stable enough
        // for corruption detection.
        mix(&mut h, format!("{:?}", self.entities).as_bytes());
        mix(&mut h, format!("{:?}", self.queues).as_bytes());
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockfield_common::{BlockLoc, BlockType, EntityId, ItemType};
    use blockfield_sim::{BlockMutation, EntityChange};
    use glam::Vec3;

    fn sample_world() -> (WorldState, TickEngine) {
        let mut world = WorldState::new();
        let mut c = Cuboid::all_air();
        c.set_block_type(BlockLoc::new(1, 2, 3).local(), BlockType::STONE);
        world.insert_cuboid(CuboidAddr::new(0, 0, 0), c);
        world.insert_entity(Entity::player(EntityId(1), Vec3::new(16.0, 16.0, 4.0), 200));
        let engine = TickEngine::with_seed(SimConfig::default(), 11);
        (world, engine)
    }

    #[test]
    fn capture_verify_restore_roundtrip() {
        let (world, engine) = sample_world();
        let save = SaveState::capture(&world, &engine);
        assert!(save.verify());

        let (restored, restored_engine) = save.restore().unwrap();
        assert_eq!(restored.state_hash(), world.state_hash());
        assert_eq!(restored_engine.seed(), engine.seed());
    }

    #[test]
    fn tampering_breaks_verification() {
        let (world, engine) = sample_world();
        let mut save = SaveState::capture(&world, &engine);
        save.tick = 999;
        assert!(!save.verify());
    }

    #[test]
    fn transient_queue_entries_do_not_survive() {
        let (world, mut engine) = sample_world();
        engine.submit_mutation(BlockMutation::Break {
            at: BlockLoc::new(1, 2, 3),
        });
        engine.submit_mutation(BlockMutation::LogicPulse {
            at: BlockLoc::new(1, 2, 3),
            level: 4,
        });
        engine.submit_change(
            EntityId(1),
            EntityChange::Craft {
                output: ItemType::PLANK,
                count: 1,
                duration_ms: 100,
            },
        );
        engine.submit_change(EntityId(1), EntityChange::Cancel);

        let save = SaveState::capture(&world, &engine);
        assert_eq!(save.queues.mutations.len(), 1);
        assert!(matches!(
            save.queues.mutations[0],
            BlockMutation::Break { .. }
        ));
        assert_eq!(save.queues.changes.len(), 1);
        assert!(matches!(save.queues.changes[0].1, EntityChange::Craft { .. }));
    }
}
