use serde::{Deserialize, Serialize};

/// Edge length of a cuboid in blocks.
pub const CUBOID_EDGE: u32 = 32;

/// Number of blocks in one cuboid.
pub const CUBOID_VOLUME: usize = (CUBOID_EDGE * CUBOID_EDGE * CUBOID_EDGE) as usize;

/// Address of one 32³ cuboid region.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct CuboidAddr {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl CuboidAddr {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// A block coordinate local to one cuboid. Each axis is in 0..32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct LocalCoord {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl LocalCoord {
    pub fn new(x: u8, y: u8, z: u8) -> Self {
        assert!(
            (x as u32) < CUBOID_EDGE && (y as u32) < CUBOID_EDGE && (z as u32) < CUBOID_EDGE,
            "local coordinate ({x},{y},{z}) outside cuboid"
        );
        Self { x, y, z }
    }

    /// Bijection onto 0..CUBOID_VOLUME.
    pub fn index(self) -> usize {
        (self.x as usize)
            + (self.y as usize) * CUBOID_EDGE as usize
            + (self.z as usize) * (CUBOID_EDGE * CUBOID_EDGE) as usize
    }

    pub fn from_index(index: usize) -> Self {
        assert!(index < CUBOID_VOLUME, "local index {index} out of range");
        let edge = CUBOID_EDGE as usize;
        Self {
            x: (index % edge) as u8,
            y: ((index / edge) % edge) as u8,
            z: (index / (edge * edge)) as u8,
        }
    }
}

/// Absolute block position in the world.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct BlockLoc {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

fn floor_div(a: i64, b: i64) -> i64 {
    let d = a / b;
    if (a % b != 0) && ((a < 0) != (b < 0)) {
        d - 1
    } else {
        d
    }
}

impl BlockLoc {
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// The cuboid this block falls in.
    pub fn cuboid(self) -> CuboidAddr {
        let e = CUBOID_EDGE as i64;
        CuboidAddr {
            x: floor_div(self.x, e) as i32,
            y: floor_div(self.y, e) as i32,
            z: floor_div(self.z, e) as i32,
        }
    }

    /// Position within its cuboid.
    pub fn local(self) -> LocalCoord {
        let e = CUBOID_EDGE as i64;
        LocalCoord {
            x: (self.x - floor_div(self.x, e) * e) as u8,
            y: (self.y - floor_div(self.y, e) * e) as u8,
            z: (self.z - floor_div(self.z, e) * e) as u8,
        }
    }

    pub fn offset(self, dx: i64, dy: i64, dz: i64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    /// The six face-adjacent neighbors, in a fixed order (±x, ±y, ±z).
    pub fn neighbors(self) -> [BlockLoc; 6] {
        [
            self.offset(1, 0, 0),
            self.offset(-1, 0, 0),
            self.offset(0, 1, 0),
            self.offset(0, -1, 0),
            self.offset(0, 0, 1),
            self.offset(0, 0, -1),
        ]
    }

    /// The block containing a continuous position.
    pub fn containing(pos: glam::Vec3) -> Self {
        Self {
            x: pos.x.floor() as i64,
            y: pos.y.floor() as i64,
            z: pos.z.floor() as i64,
        }
    }
}

/// Entity identifier. Positive ids are player-controlled, negative ids are
/// creatures/non-players, zero is reserved as invalid/environmental.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct EntityId(pub i64);

impl EntityId {
    pub const ENVIRONMENT: EntityId = EntityId(0);

    pub fn is_player(self) -> bool {
        self.0 > 0
    }

    pub fn is_creature(self) -> bool {
        self.0 < 0
    }

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Numeric block type id. Zero is air.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct BlockType(pub u16);

impl BlockType {
    pub const AIR: BlockType = BlockType(0);
    pub const STONE: BlockType = BlockType(1);
    pub const DIRT: BlockType = BlockType(2);
    pub const WOOD: BlockType = BlockType(3);
    pub const LEAVES: BlockType = BlockType(4);
    pub const WATER: BlockType = BlockType(5);
    pub const CHEST: BlockType = BlockType(6);
    pub const SAPLING: BlockType = BlockType(7);
    pub const FIRE: BlockType = BlockType(8);

    pub fn is_air(self) -> bool {
        self == Self::AIR
    }

    /// Solid blocks obstruct movement and conduct logic signals.
    pub fn is_solid(self) -> bool {
        matches!(
            self,
            Self::STONE | Self::DIRT | Self::WOOD | Self::LEAVES | Self::CHEST
        )
    }

    /// Replaceable blocks may be overwritten by a placement without breaking.
    pub fn is_replaceable(self) -> bool {
        matches!(self, Self::AIR | Self::WATER | Self::FIRE)
    }

    /// Container blocks may hold an inventory aspect.
    pub fn is_container(self) -> bool {
        self == Self::CHEST
    }

    pub fn is_flammable(self) -> bool {
        matches!(self, Self::WOOD | Self::LEAVES | Self::SAPLING)
    }

    /// Gravity scale for entities whose feet occupy this block. Water slows
    /// falling; everything else is full gravity.
    pub fn viscosity(self) -> f32 {
        if self == Self::WATER { 0.4 } else { 1.0 }
    }
}

/// Numeric item type id with a built-in unit weight table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct ItemType(pub u16);

impl ItemType {
    pub const STONE: ItemType = ItemType(1);
    pub const PLANK: ItemType = ItemType(2);
    pub const BREAD: ItemType = ItemType(3);

    /// Weight of a single unit, in abstract encumbrance units.
    pub fn unit_weight(self) -> u64 {
        match self {
            Self::STONE => 4,
            Self::PLANK => 2,
            _ => 1,
        }
    }
}

/// One homogeneous stack of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: ItemType,
    pub count: u32,
}

/// A simple slot-list inventory shared by container blocks and entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Inventory {
    pub slots: Vec<ItemStack>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.count == 0)
    }

    /// Add items, merging into an existing stack of the same type.
    pub fn add(&mut self, item: ItemType, count: u32) {
        if count == 0 {
            return;
        }
        if let Some(slot) = self.slots.iter_mut().find(|s| s.item == item) {
            slot.count = slot.count.saturating_add(count);
        } else {
            self.slots.push(ItemStack { item, count });
        }
    }

    /// Remove items. Returns false (leaving the inventory unchanged) if the
    /// requested count is not present.
    pub fn remove(&mut self, item: ItemType, count: u32) -> bool {
        let Some(pos) = self.slots.iter().position(|s| s.item == item) else {
            return false;
        };
        if self.slots[pos].count < count {
            return false;
        }
        self.slots[pos].count -= count;
        if self.slots[pos].count == 0 {
            self.slots.remove(pos);
        }
        true
    }

    pub fn count_of(&self, item: ItemType) -> u32 {
        self.slots
            .iter()
            .filter(|s| s.item == item)
            .map(|s| s.count)
            .sum()
    }

    /// Total weight of the contents.
    pub fn encumbrance(&self) -> u64 {
        self.slots
            .iter()
            .map(|s| s.item.unit_weight() * s.count as u64)
            .sum()
    }
}

/// Per-block bit flags (powered, waterlogged, locked, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct BlockFlags(pub u8);

impl BlockFlags {
    pub const NONE: BlockFlags = BlockFlags(0);
    pub const POWERED: BlockFlags = BlockFlags(1);
    pub const LOCKED: BlockFlags = BlockFlags(2);

    pub fn contains(self, other: BlockFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn with(self, other: BlockFlags) -> BlockFlags {
        BlockFlags(self.0 | other.0)
    }
}

/// Block orientation: one of four yaw quadrants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Orientation(pub u8);

impl Orientation {
    pub fn new(quadrant: u8) -> Self {
        Self(quadrant % 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_index_bijection() {
        for &(x, y, z) in &[(0u8, 0u8, 0u8), (31, 31, 31), (1, 2, 3), (31, 0, 15)] {
            let c = LocalCoord::new(x, y, z);
            assert_eq!(LocalCoord::from_index(c.index()), c);
        }
    }

    #[test]
    fn inventory_add_saturates_instead_of_overflowing() {
        let mut inv = Inventory::new();
        inv.add(ItemType::STONE, u32::MAX - 1);
        inv.add(ItemType::STONE, 5);
        assert_eq!(inv.count_of(ItemType::STONE), u32::MAX);
    }

    #[test]
    fn block_loc_splits_into_cuboid_and_local() {
        let loc = BlockLoc::new(33, -1, 0);
        assert_eq!(loc.cuboid(), CuboidAddr::new(1, -1, 0));
        assert_eq!(loc.local(), LocalCoord::new(1, 31, 0));
    }

    #[test]
    fn negative_coordinates_floor_correctly() {
        let loc = BlockLoc::new(-32, -33, -1);
        assert_eq!(loc.cuboid(), CuboidAddr::new(-1, -2, -1));
        assert_eq!(loc.local(), LocalCoord::new(0, 31, 31));
    }

    #[test]
    fn entity_id_sign_semantics() {
        assert!(EntityId(5).is_player());
        assert!(EntityId(-3).is_creature());
        assert!(!EntityId::ENVIRONMENT.is_valid());
    }

    #[test]
    fn inventory_add_merges_stacks() {
        let mut inv = Inventory::new();
        inv.add(ItemType::STONE, 3);
        inv.add(ItemType::STONE, 2);
        assert_eq!(inv.slots.len(), 1);
        assert_eq!(inv.count_of(ItemType::STONE), 5);
    }

    #[test]
    fn inventory_remove_rejects_shortfall() {
        let mut inv = Inventory::new();
        inv.add(ItemType::PLANK, 2);
        assert!(!inv.remove(ItemType::PLANK, 3));
        assert_eq!(inv.count_of(ItemType::PLANK), 2);
        assert!(inv.remove(ItemType::PLANK, 2));
        assert!(inv.is_empty());
    }

    #[test]
    fn encumbrance_uses_unit_weights() {
        let mut inv = Inventory::new();
        inv.add(ItemType::STONE, 5);
        assert_eq!(inv.encumbrance(), 5 * ItemType::STONE.unit_weight());
    }
}
