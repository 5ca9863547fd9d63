use blockfield_common::{BlockLoc, EntityId, Inventory, ItemStack, ItemType};
use glam::Vec3;
use serde::{Deserialize, Serialize};

pub const MAX_HEALTH: u16 = 100;
pub const MAX_FOOD: u16 = 100;
pub const EQUIPMENT_SLOTS: usize = 5;

/// An in-progress long-running operation. At most one per entity; a new one
/// is rejected until the current one completes or is cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InProgress {
    /// A craft counting down; completes in the end-of-tick pass.
    Craft {
        output: ItemType,
        count: u32,
        remaining_ms: u32,
    },
    /// A multi-cell placement awaiting its verify round.
    Placement { root: BlockLoc },
}

/// Player or creature state. Mutated only through the entity-change
/// mechanism; never field-assigned from outside a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub location: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub inventory: Inventory,
    pub equipment: [Option<ItemStack>; EQUIPMENT_SLOTS],
    pub health: u16,
    pub food: u16,
    pub breath: u16,
    pub in_progress: Option<InProgress>,
}

impl Entity {
    fn new(id: EntityId, location: Vec3, breath: u16) -> Self {
        assert!(id.is_valid(), "entity id zero is reserved");
        Self {
            id,
            location,
            velocity: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            inventory: Inventory::new(),
            equipment: Default::default(),
            health: MAX_HEALTH,
            food: MAX_FOOD,
            breath,
            in_progress: None,
        }
    }

    pub fn player(id: EntityId, location: Vec3, breath: u16) -> Self {
        assert!(id.is_player(), "player ids are positive");
        Self::new(id, location, breath)
    }

    pub fn creature(id: EntityId, location: Vec3, breath: u16) -> Self {
        assert!(id.is_creature(), "creature ids are negative");
        Self::new(id, location, breath)
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// The block containing the entity's feet.
    pub fn feet_block(&self) -> BlockLoc {
        BlockLoc::containing(self.location)
    }

    /// The block containing the entity's head, one above the feet.
    pub fn head_block(&self) -> BlockLoc {
        self.feet_block().offset(0, 0, 1)
    }

    /// The minimal previous-tick view exposed through the context.
    pub fn info(&self) -> EntityInfo {
        EntityInfo {
            id: self.id,
            location: self.location,
            velocity: self.velocity,
            yaw: self.yaw,
            pitch: self.pitch,
            health: self.health,
        }
    }
}

/// Minimal read-only entity view: what one mutation may learn about another
/// entity through the context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityInfo {
    pub id: EntityId,
    pub location: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub health: u16,
}
