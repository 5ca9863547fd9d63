//! Read-only and mutable views over one logical unit (a block or an entity)
//! inside one tick.

use crate::entity::{Entity, InProgress};
use blockfield_common::{
    BlockFlags, BlockLoc, BlockType, Inventory, ItemStack, ItemType, LocalCoord, Orientation,
};
use blockfield_store::{Cuboid, CuboidOverlay};
use std::collections::BTreeSet;

/// Read-only block proxy over the frozen previous-tick snapshot. Never
/// written, so it is safe to hand out freely during a tick.
#[derive(Debug, Clone, Copy)]
pub struct BlockView<'a> {
    cuboid: &'a Cuboid,
    loc: BlockLoc,
    local: LocalCoord,
}

impl<'a> BlockView<'a> {
    pub(crate) fn new(cuboid: &'a Cuboid, loc: BlockLoc) -> Self {
        Self {
            cuboid,
            loc,
            local: loc.local(),
        }
    }

    pub fn location(&self) -> BlockLoc {
        self.loc
    }

    pub fn block_type(&self) -> BlockType {
        self.cuboid.block_type(self.local)
    }

    pub fn damage(&self) -> u8 {
        self.cuboid.damage(self.local)
    }

    pub fn inventory(&self) -> Option<&'a Inventory> {
        self.cuboid.inventory(self.local)
    }

    pub fn flags(&self) -> BlockFlags {
        self.cuboid.flags(self.local)
    }

    pub fn logic(&self) -> u8 {
        self.cuboid.logic(self.local)
    }

    pub fn orientation(&self) -> Orientation {
        self.cuboid.orientation(self.local)
    }

    pub fn multi_root(&self) -> Option<BlockLoc> {
        self.cuboid.multi_root(self.local)
    }
}

/// Mutable block proxy bound to the in-progress cuboid overlay for one
/// mutation application. Writes only reach committed state if the enclosing
/// mutation reports success.
pub struct BlockProxy<'a> {
    overlay: &'a mut CuboidOverlay,
    scratch: &'a mut BTreeSet<BlockLoc>,
    loc: BlockLoc,
    local: LocalCoord,
    future_requests: Vec<u64>,
}

impl<'a> BlockProxy<'a> {
    pub(crate) fn new(
        overlay: &'a mut CuboidOverlay,
        scratch: &'a mut BTreeSet<BlockLoc>,
        loc: BlockLoc,
    ) -> Self {
        Self {
            overlay,
            scratch,
            loc,
            local: loc.local(),
            future_requests: Vec::new(),
        }
    }

    pub fn location(&self) -> BlockLoc {
        self.loc
    }

    pub fn block_type(&self) -> BlockType {
        self.overlay.block_type(self.local)
    }

    pub fn damage(&self) -> u8 {
        self.overlay.damage(self.local)
    }

    pub fn inventory(&self) -> Option<&Inventory> {
        self.overlay.inventory(self.local)
    }

    pub fn flags(&self) -> BlockFlags {
        self.overlay.flags(self.local)
    }

    pub fn logic(&self) -> u8 {
        self.overlay.logic(self.local)
    }

    pub fn orientation(&self) -> Orientation {
        self.overlay.orientation(self.local)
    }

    pub fn multi_root(&self) -> Option<BlockLoc> {
        self.overlay.multi_root(self.local)
    }

    /// Set the block type and clear every other aspect, the common shape of
    /// "this block becomes something else".
    pub fn set_block_and_clear(&mut self, block: BlockType) {
        self.overlay.set_block_type(self.local, block);
        self.overlay.set_damage(self.local, 0);
        self.overlay.set_inventory(self.local, None);
        self.overlay.set_flags(self.local, BlockFlags::NONE);
        self.overlay.set_logic(self.local, 0);
        self.overlay.set_orientation(self.local, Orientation::default());
        self.overlay.set_multi_root(self.local, None);
    }

    pub fn set_block_type(&mut self, block: BlockType) {
        self.overlay.set_block_type(self.local, block);
    }

    pub fn set_damage(&mut self, damage: u8) {
        self.overlay.set_damage(self.local, damage);
    }

    /// Inventories belong on container blocks only; anything else is a
    /// broken-upstream invariant and aborts tick processing.
    pub fn set_inventory(&mut self, inventory: Option<Inventory>) {
        assert!(
            inventory.is_none() || self.block_type().is_container(),
            "non-container block {:?} cannot hold an inventory at {:?}",
            self.block_type(),
            self.loc
        );
        self.overlay.set_inventory(self.local, inventory);
    }

    pub fn set_flags(&mut self, flags: BlockFlags) {
        self.overlay.set_flags(self.local, flags);
    }

    pub fn set_logic(&mut self, level: u8) {
        self.overlay.set_logic(self.local, level);
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.overlay.set_orientation(self.local, orientation);
    }

    pub fn set_multi_root(&mut self, root: Option<BlockLoc>) {
        self.overlay.set_multi_root(self.local, root);
    }

    /// Claim the per-tick scratch slot for this block. Returns false if an
    /// unrelated mutation already processed it this tick.
    pub fn claim(&mut self) -> bool {
        self.scratch.insert(self.loc)
    }

    /// Ask the engine to re-invoke an equivalent mutation against this target
    /// after `delay_ms`. Behaves like a sink: honored even if the enclosing
    /// apply returns failure.
    pub fn request_future_mutation(&mut self, delay_ms: u64) {
        self.future_requests.push(delay_ms);
    }

    pub(crate) fn take_future_requests(&mut self) -> Vec<u64> {
        std::mem::take(&mut self.future_requests)
    }
}

/// Mutable entity view for one change application. Wraps a working copy; the
/// engine installs it only on success.
#[derive(Debug)]
pub struct EntityProxy {
    entity: Entity,
}

impl EntityProxy {
    pub(crate) fn new(entity: Entity) -> Self {
        Self { entity }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub(crate) fn into_entity(self) -> Entity {
        self.entity
    }

    pub fn set_location(&mut self, location: glam::Vec3) {
        self.entity.location = location;
    }

    pub fn set_velocity(&mut self, velocity: glam::Vec3) {
        self.entity.velocity = velocity;
    }

    pub fn set_look(&mut self, yaw: f32, pitch: f32) {
        self.entity.yaw = yaw;
        self.entity.pitch = pitch;
    }

    pub fn add_items(&mut self, item: ItemType, count: u32) {
        self.entity.inventory.add(item, count);
    }

    pub fn remove_items(&mut self, item: ItemType, count: u32) -> bool {
        self.entity.inventory.remove(item, count)
    }

    pub fn set_equipment(&mut self, slot: usize, stack: Option<ItemStack>) -> Option<ItemStack> {
        std::mem::replace(&mut self.entity.equipment[slot], stack)
    }

    /// Remove and return the first inventory stack, if any.
    pub fn take_first_stack(&mut self) -> Option<ItemStack> {
        if self.entity.inventory.slots.is_empty() {
            None
        } else {
            Some(self.entity.inventory.slots.remove(0))
        }
    }

    pub fn apply_damage(&mut self, amount: u16) {
        self.entity.health = self.entity.health.saturating_sub(amount);
    }

    pub fn heal_food(&mut self, amount: u16) {
        self.entity.food = (self.entity.food + amount).min(crate::entity::MAX_FOOD);
    }

    pub fn set_breath(&mut self, breath: u16) {
        self.entity.breath = breath;
    }

    pub fn set_in_progress(&mut self, op: Option<InProgress>) {
        self.entity.in_progress = op;
    }
}
