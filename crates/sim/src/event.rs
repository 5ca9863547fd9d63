use blockfield_common::{BlockLoc, EntityId, ItemType};
use serde::{Deserialize, Serialize};

/// Observability events emitted through the context's event sink during a
/// tick. Replication and UI layers consume these; the engine itself only
/// collects them into the tick delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    BlockChanged { at: BlockLoc },
    ItemsStored { at: BlockLoc, item: ItemType, count: u32 },
    ItemsTaken { at: BlockLoc, item: ItemType, count: u32 },
    EntityDamaged { id: EntityId, amount: u16 },
    EntityDied { id: EntityId },
    CraftCompleted { id: EntityId, output: ItemType, count: u32 },
    StructureReverted { root: BlockLoc },
    CreatureSpawned { id: EntityId, at: BlockLoc },
}
