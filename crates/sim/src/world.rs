//! Authoritative world state and the frozen per-tick snapshot.

use crate::entity::{Entity, EntityInfo};
use crate::proxy::BlockView;
use blockfield_common::{BlockLoc, BlockType, CuboidAddr, EntityId};
use blockfield_store::Cuboid;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The authoritative world: a sparse mapping of cuboid addresses to loaded
/// cuboids plus loaded entities. Only loaded content participates in a tick;
/// lookups against unloaded regions return absent, never fault.
///
/// Uses BTreeMap for deterministic iteration order across platforms.
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    cuboids: BTreeMap<CuboidAddr, Arc<Cuboid>>,
    entities: BTreeMap<EntityId, Entity>,
    tick: u64,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub(crate) fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    /// Load a cuboid. Replaces any cuboid already at the address.
    pub fn insert_cuboid(&mut self, addr: CuboidAddr, cuboid: Cuboid) {
        self.cuboids.insert(addr, Arc::new(cuboid));
    }

    /// Unload a cuboid. Pending future mutations against it will be dropped.
    pub fn remove_cuboid(&mut self, addr: CuboidAddr) -> Option<Arc<Cuboid>> {
        self.cuboids.remove(&addr)
    }

    pub fn cuboid(&self, addr: CuboidAddr) -> Option<&Arc<Cuboid>> {
        self.cuboids.get(&addr)
    }

    pub fn cuboids(&self) -> &BTreeMap<CuboidAddr, Arc<Cuboid>> {
        &self.cuboids
    }

    pub(crate) fn set_cuboid_arc(&mut self, addr: CuboidAddr, cuboid: Arc<Cuboid>) {
        self.cuboids.insert(addr, cuboid);
    }

    pub fn insert_entity(&mut self, entity: Entity) {
        self.entities.insert(entity.id, entity);
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> &BTreeMap<EntityId, Entity> {
        &self.entities
    }

    pub(crate) fn replace_entities(&mut self, entities: BTreeMap<EntityId, Entity>) {
        self.entities = entities;
    }

    /// Reconstruct a world from persisted parts.
    pub fn from_saved(
        tick: u64,
        cuboids: BTreeMap<CuboidAddr, Cuboid>,
        entities: Vec<Entity>,
    ) -> Self {
        Self {
            cuboids: cuboids
                .into_iter()
                .map(|(addr, c)| (addr, Arc::new(c)))
                .collect(),
            entities: entities.into_iter().map(|e| (e.id, e)).collect(),
            tick,
        }
    }

    /// Convenience read across the cuboid boundary. Absent cuboid is `None`.
    pub fn block_type(&self, at: BlockLoc) -> Option<BlockType> {
        self.cuboids
            .get(&at.cuboid())
            .map(|c| c.block_type(at.local()))
    }

    /// Freeze the current state for one tick of processing. Cuboids are
    /// shared by reference; entities are cloned since they are small.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            cuboids: self.cuboids.clone(),
            entities: self.entities.clone(),
            tick: self.tick,
        }
    }

    /// Deterministic hash of committed state, over canonical iteration order.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325; // FNV offset basis
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        mix(&mut h, &self.tick.to_le_bytes());
        for (addr, cuboid) in &self.cuboids {
            mix(&mut h, &addr.x.to_le_bytes());
            mix(&mut h, &addr.y.to_le_bytes());
            mix(&mut h, &addr.z.to_le_bytes());
            mix(&mut h, &cuboid.encode_payload());
        }
        for (id, e) in &self.entities {
            mix(&mut h, &id.0.to_le_bytes());
            // The debug form covers every field, look direction, equipment,
            // stack composition and the in-progress op included. Float debug
            // formatting is exact for identical bit patterns, which is the
            // only equality determinism cares about.
            mix(&mut h, format!("{e:?}").as_bytes());
        }
        h
    }
}

/// The frozen previous-tick snapshot: never written during the tick, safe to
/// share across mutation applications.
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    cuboids: BTreeMap<CuboidAddr, Arc<Cuboid>>,
    entities: BTreeMap<EntityId, Entity>,
    tick: u64,
}

impl WorldSnapshot {
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn contains_cuboid(&self, addr: CuboidAddr) -> bool {
        self.cuboids.contains_key(&addr)
    }

    pub fn cuboid(&self, addr: CuboidAddr) -> Option<&Arc<Cuboid>> {
        self.cuboids.get(&addr)
    }

    /// Read-only proxy for the block at `at`, or `None` when unloaded.
    pub fn block(&self, at: BlockLoc) -> Option<BlockView<'_>> {
        self.cuboids
            .get(&at.cuboid())
            .map(|c| BlockView::new(c, at))
    }

    pub fn block_type(&self, at: BlockLoc) -> Option<BlockType> {
        self.block(at).map(|b| b.block_type())
    }

    /// Minimal previous-tick entity view.
    pub fn entity(&self, id: EntityId) -> Option<EntityInfo> {
        self.entities.get(&id).map(|e| e.info())
    }

    pub(crate) fn entity_full(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub(crate) fn entities(&self) -> &BTreeMap<EntityId, Entity> {
        &self.entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockfield_common::LocalCoord;

    #[test]
    fn unloaded_lookup_is_absent_not_a_fault() {
        let world = WorldState::new();
        assert!(world.block_type(BlockLoc::new(5, 5, 5)).is_none());
        let snap = world.snapshot();
        assert!(snap.block(BlockLoc::new(5, 5, 5)).is_none());
        assert!(snap.entity(EntityId(1)).is_none());
    }

    #[test]
    fn block_reads_cross_cuboid_boundaries() {
        let mut world = WorldState::new();
        let mut c = Cuboid::all_air();
        c.set_block_type(LocalCoord::new(0, 0, 0), BlockType::STONE);
        world.insert_cuboid(CuboidAddr::new(-1, 0, 0), c);
        assert_eq!(
            world.block_type(BlockLoc::new(-32, 0, 0)),
            Some(BlockType::STONE)
        );
        assert_eq!(
            world.block_type(BlockLoc::new(-1, 0, 0)),
            Some(BlockType::AIR)
        );
    }

    #[test]
    fn state_hash_is_stable_and_sensitive() {
        let mut a = WorldState::new();
        a.insert_cuboid(CuboidAddr::new(0, 0, 0), Cuboid::all_air());
        let mut b = a.clone();
        assert_eq!(a.state_hash(), b.state_hash());

        let mut c = Cuboid::all_air();
        c.set_block_type(LocalCoord::new(1, 1, 1), BlockType::DIRT);
        b.insert_cuboid(CuboidAddr::new(0, 0, 0), c);
        assert_ne!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn state_hash_sees_equipment_and_in_progress() {
        use crate::entity::InProgress;
        use blockfield_common::{ItemStack, ItemType};
        use glam::Vec3;

        let base = Entity::player(EntityId(1), Vec3::new(1.0, 2.0, 3.0), 200);
        let mut a = WorldState::new();
        a.insert_entity(base.clone());

        let mut equipped = base.clone();
        equipped.equipment[0] = Some(ItemStack {
            item: ItemType::BREAD,
            count: 1,
        });
        let mut b = a.clone();
        b.insert_entity(equipped);
        assert_ne!(a.state_hash(), b.state_hash());

        let mut busy = base.clone();
        busy.in_progress = Some(InProgress::Craft {
            output: ItemType::PLANK,
            count: 1,
            remaining_ms: 100,
        });
        let mut c = a.clone();
        c.insert_entity(busy);
        assert_ne!(a.state_hash(), c.state_hash());

        let mut turned = base;
        turned.yaw += 90.0;
        let mut d = a.clone();
        d.insert_entity(turned);
        assert_ne!(a.state_hash(), d.state_hash());
    }

    #[test]
    fn snapshot_shares_cuboids_by_reference() {
        let mut world = WorldState::new();
        world.insert_cuboid(CuboidAddr::new(0, 0, 0), Cuboid::all_air());
        let snap = world.snapshot();
        let a = world.cuboid(CuboidAddr::new(0, 0, 0)).unwrap();
        let b = snap.cuboid(CuboidAddr::new(0, 0, 0)).unwrap();
        assert!(Arc::ptr_eq(a, b));
    }
}
