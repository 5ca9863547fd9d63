//! The closed set of block mutation variants.
//!
//! Each variant carries only the parameters of one operation, is never
//! mutated after construction, and is consumed exactly once by `apply`.
//! Returning false means reject: the proxy's writes are discarded from
//! commit and the mutation is not replicated, but follow-ups already
//! enqueued through the context sinks still fire.

use crate::context::TickContext;
use crate::event::SimEvent;
use crate::placement::{structure_intact, StructureCell};
use crate::proxy::BlockProxy;
use blockfield_common::{BlockFlags, BlockLoc, BlockType, ItemType, Orientation};
use serde::{Deserialize, Serialize};

/// A single requested block state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockMutation {
    /// Place a block into a replaceable cell.
    Place {
        at: BlockLoc,
        block: BlockType,
        orientation: Orientation,
    },
    /// Break a block back to air, clearing all aspects.
    Break { at: BlockLoc },
    /// Merge items into a container block's inventory.
    StoreItems {
        at: BlockLoc,
        item: ItemType,
        count: u32,
    },
    /// Remove items from a container block's inventory.
    TakeItems {
        at: BlockLoc,
        item: ItemType,
        count: u32,
    },
    SetFlags { at: BlockLoc, flags: BlockFlags },
    /// Write a logic signal level and propagate decayed pulses to neighbors
    /// later this same tick.
    LogicPulse { at: BlockLoc, level: u8 },
    /// Advance a growth stage; reschedules itself until mature.
    Grow { at: BlockLoc },
    /// Fire: ignite a flammable block, or burn a fire down with a random
    /// chance of consuming it and of spreading to a neighbor.
    Burn { at: BlockLoc },
    /// Round 1 of multi-cell placement: one independent cell.
    PlaceCell {
        at: BlockLoc,
        block: BlockType,
        root: BlockLoc,
    },
    /// Round 2 of multi-cell placement: re-read every cell, revert own cell
    /// if any failed to match.
    VerifyCell {
        cell: usize,
        cells: Vec<StructureCell>,
    },
}

/// Growth stage at which a sapling matures.
const MATURE_STAGE: u8 = 3;

impl BlockMutation {
    /// The one cell this mutation may write.
    pub fn target_location(&self) -> BlockLoc {
        match self {
            Self::Place { at, .. }
            | Self::Break { at }
            | Self::StoreItems { at, .. }
            | Self::TakeItems { at, .. }
            | Self::SetFlags { at, .. }
            | Self::LogicPulse { at, .. }
            | Self::Grow { at }
            | Self::Burn { at } => *at,
            Self::PlaceCell { at, .. } => *at,
            Self::VerifyCell { cell, cells } => cells[*cell].at,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Place { .. } => "place",
            Self::Break { .. } => "break",
            Self::StoreItems { .. } => "store_items",
            Self::TakeItems { .. } => "take_items",
            Self::SetFlags { .. } => "set_flags",
            Self::LogicPulse { .. } => "logic_pulse",
            Self::Grow { .. } => "grow",
            Self::Burn { .. } => "burn",
            Self::PlaceCell { .. } => "place_cell",
            Self::VerifyCell { .. } => "verify_cell",
        }
    }

    /// Whether this operation may be persisted across a restart. Operations
    /// whose correctness depends on tick-local references answer false and
    /// are dropped at save time instead of resurrecting stale assumptions.
    pub fn can_save_to_disk(&self) -> bool {
        match self {
            Self::Place { .. }
            | Self::Break { .. }
            | Self::StoreItems { .. }
            | Self::TakeItems { .. }
            | Self::SetFlags { .. }
            | Self::Grow { .. }
            | Self::Burn { .. } => true,
            // Pulse propagation and the placement protocol rely on captured
            // same-run block state.
            Self::LogicPulse { .. } | Self::PlaceCell { .. } | Self::VerifyCell { .. } => false,
        }
    }

    /// Apply against the mutable proxy for the target cell. Success means
    /// the proxy's writes are committed at end of tick.
    pub fn apply(&self, ctx: &mut TickContext<'_>, proxy: &mut BlockProxy<'_>) -> bool {
        match self {
            Self::Place {
                at,
                block,
                orientation,
            } => {
                if !proxy.block_type().is_replaceable() {
                    return false;
                }
                proxy.set_block_and_clear(*block);
                proxy.set_orientation(*orientation);
                if *block == BlockType::SAPLING {
                    let delay = ctx.config().growth_delay_ms;
                    ctx.push_future(Self::Grow { at: *at }, delay);
                }
                ctx.emit(SimEvent::BlockChanged { at: *at });
                true
            }
            Self::Break { at } => {
                if proxy.block_type().is_air() {
                    return false;
                }
                proxy.set_block_and_clear(BlockType::AIR);
                ctx.emit(SimEvent::BlockChanged { at: *at });
                true
            }
            Self::StoreItems { at, item, count } => {
                if *count == 0 || !proxy.block_type().is_container() {
                    return false;
                }
                if !proxy.claim() {
                    return false;
                }
                let mut inv = proxy.inventory().cloned().unwrap_or_default();
                inv.add(*item, *count);
                proxy.set_inventory(Some(inv));
                ctx.emit(SimEvent::ItemsStored {
                    at: *at,
                    item: *item,
                    count: *count,
                });
                true
            }
            Self::TakeItems { at, item, count } => {
                if *count == 0 || !proxy.block_type().is_container() {
                    return false;
                }
                if !proxy.claim() {
                    return false;
                }
                let mut inv = proxy.inventory().cloned().unwrap_or_default();
                if !inv.remove(*item, *count) {
                    return false;
                }
                let inv = if inv.is_empty() { None } else { Some(inv) };
                proxy.set_inventory(inv);
                ctx.emit(SimEvent::ItemsTaken {
                    at: *at,
                    item: *item,
                    count: *count,
                });
                true
            }
            Self::SetFlags { at, flags } => {
                if proxy.block_type().is_air() {
                    return false;
                }
                proxy.set_flags(*flags);
                ctx.emit(SimEvent::BlockChanged { at: *at });
                true
            }
            Self::LogicPulse { at, level } => {
                if !proxy.block_type().is_solid() {
                    return false;
                }
                if proxy.logic() >= *level {
                    // A pulse never downgrades: the decayed echo coming back
                    // from a neighbor must die here, not overwrite the source.
                    return false;
                }
                proxy.set_logic(*level);
                if *level > 1 {
                    for neighbor in at.neighbors() {
                        let conducts = ctx
                            .block(neighbor)
                            .map(|b| b.block_type().is_solid())
                            .unwrap_or(false);
                        if conducts {
                            ctx.push_mutation(Self::LogicPulse {
                                at: neighbor,
                                level: *level - 1,
                            });
                        }
                    }
                }
                true
            }
            Self::Grow { at } => {
                if proxy.block_type() != BlockType::SAPLING {
                    return false;
                }
                if !proxy.claim() {
                    return false;
                }
                let stage = proxy.damage();
                if stage >= MATURE_STAGE {
                    proxy.set_block_and_clear(BlockType::WOOD);
                    ctx.emit(SimEvent::BlockChanged { at: *at });
                } else {
                    proxy.set_damage(stage + 1);
                    proxy.request_future_mutation(ctx.config().growth_delay_ms);
                }
                true
            }
            Self::Burn { at } => {
                let block = proxy.block_type();
                if block.is_flammable() {
                    // Ignition: the block catches fire and starts burning down.
                    proxy.set_block_and_clear(BlockType::FIRE);
                    proxy.request_future_mutation(ctx.config().burn_delay_ms);
                    ctx.emit(SimEvent::BlockChanged { at: *at });
                    return true;
                }
                if block != BlockType::FIRE {
                    return false;
                }
                if ctx.rand_below(100) < ctx.config().burn_chance_percent {
                    proxy.set_block_and_clear(BlockType::AIR);
                    ctx.emit(SimEvent::BlockChanged { at: *at });
                    return true;
                }
                // Still burning: keep burning down, maybe spread.
                proxy.request_future_mutation(ctx.config().burn_delay_ms);
                let neighbor = at.neighbors()[ctx.rand_below(6) as usize];
                let flammable = ctx
                    .block(neighbor)
                    .map(|b| b.block_type().is_flammable())
                    .unwrap_or(false);
                if flammable {
                    ctx.push_next_tick(Self::Burn { at: neighbor });
                }
                true
            }
            Self::PlaceCell { at, block, root } => {
                if !proxy.block_type().is_replaceable() {
                    return false;
                }
                proxy.set_block_and_clear(*block);
                proxy.set_multi_root(Some(*root));
                ctx.emit(SimEvent::BlockChanged { at: *at });
                true
            }
            Self::VerifyCell { cell, cells } => {
                if structure_intact(ctx.snapshot(), cells) {
                    return true;
                }
                let own = cells[*cell];
                proxy.set_block_and_clear(own.original);
                ctx.emit(SimEvent::BlockChanged { at: own.at });
                if *cell == 0 {
                    ctx.emit(SimEvent::StructureReverted { root: cells[0].at });
                }
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::rng::TickRng;
    use crate::world::WorldState;
    use blockfield_common::CuboidAddr;
    use blockfield_store::{Cuboid, CuboidOverlay};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    struct Fixture {
        world: WorldState,
        config: SimConfig,
    }

    impl Fixture {
        fn new(cuboid: Cuboid) -> Self {
            let mut world = WorldState::new();
            world.insert_cuboid(CuboidAddr::new(0, 0, 0), cuboid);
            Self {
                world,
                config: SimConfig::default(),
            }
        }

        /// Apply one mutation against a fresh overlay; returns (success,
        /// committed cuboid, context sinks via a probe closure).
        fn apply(&self, m: &BlockMutation) -> (bool, Arc<Cuboid>) {
            let snap = self.world.snapshot();
            let mut ctx = TickContext::new(&snap, &self.config, 1, TickRng::new(7));
            let base = snap.cuboid(CuboidAddr::new(0, 0, 0)).unwrap().clone();
            let mut overlay = CuboidOverlay::new(base.clone());
            let mut scratch = BTreeSet::new();
            let mut proxy = BlockProxy::new(&mut overlay, &mut scratch, m.target_location());
            let ok = m.apply(&mut ctx, &mut proxy);
            drop(proxy);
            let committed = if ok { overlay.commit() } else { base };
            (ok, committed)
        }
    }

    fn loc(x: i64, y: i64, z: i64) -> BlockLoc {
        BlockLoc::new(x, y, z)
    }

    #[test]
    fn place_into_air_succeeds() {
        let fx = Fixture::new(Cuboid::all_air());
        let (ok, c) = fx.apply(&BlockMutation::Place {
            at: loc(1, 1, 1),
            block: BlockType::STONE,
            orientation: Orientation::new(2),
        });
        assert!(ok);
        assert_eq!(c.block_type(loc(1, 1, 1).local()), BlockType::STONE);
        assert_eq!(c.orientation(loc(1, 1, 1).local()), Orientation::new(2));
    }

    #[test]
    fn place_onto_solid_is_rejected() {
        let fx = Fixture::new(Cuboid::filled(BlockType::STONE));
        let (ok, c) = fx.apply(&BlockMutation::Place {
            at: loc(0, 0, 0),
            block: BlockType::DIRT,
            orientation: Orientation::default(),
        });
        assert!(!ok);
        assert_eq!(c.block_type(loc(0, 0, 0).local()), BlockType::STONE);
    }

    #[test]
    fn break_air_is_nothing_to_do() {
        let fx = Fixture::new(Cuboid::all_air());
        let (ok, _) = fx.apply(&BlockMutation::Break { at: loc(0, 0, 0) });
        assert!(!ok);
    }

    #[test]
    fn store_items_requires_container() {
        let fx = Fixture::new(Cuboid::all_air());
        let (ok, _) = fx.apply(&BlockMutation::StoreItems {
            at: loc(0, 0, 0),
            item: ItemType::STONE,
            count: 5,
        });
        assert!(!ok);
    }

    #[test]
    fn store_then_encumbrance_matches() {
        let mut c = Cuboid::all_air();
        c.set_block_type(loc(0, 0, 0).local(), BlockType::CHEST);
        let fx = Fixture::new(c);
        let (ok, committed) = fx.apply(&BlockMutation::StoreItems {
            at: loc(0, 0, 0),
            item: ItemType::STONE,
            count: 5,
        });
        assert!(ok);
        let inv = committed.inventory(loc(0, 0, 0).local()).unwrap();
        assert_eq!(inv.encumbrance(), 5 * ItemType::STONE.unit_weight());
    }

    #[test]
    fn take_more_than_stored_is_rejected() {
        let mut c = Cuboid::all_air();
        c.set_block_type(loc(0, 0, 0).local(), BlockType::CHEST);
        let mut inv = blockfield_common::Inventory::new();
        inv.add(ItemType::PLANK, 2);
        c.set_inventory(loc(0, 0, 0).local(), Some(inv));
        let fx = Fixture::new(c);
        let (ok, committed) = fx.apply(&BlockMutation::TakeItems {
            at: loc(0, 0, 0),
            item: ItemType::PLANK,
            count: 3,
        });
        assert!(!ok);
        assert_eq!(
            committed
                .inventory(loc(0, 0, 0).local())
                .unwrap()
                .count_of(ItemType::PLANK),
            2
        );
    }

    #[test]
    fn grow_advances_stage_until_mature() {
        let mut c = Cuboid::all_air();
        c.set_block_type(loc(2, 2, 2).local(), BlockType::SAPLING);
        c.set_damage(loc(2, 2, 2).local(), MATURE_STAGE);
        let fx = Fixture::new(c);
        let (ok, committed) = fx.apply(&BlockMutation::Grow { at: loc(2, 2, 2) });
        assert!(ok);
        assert_eq!(committed.block_type(loc(2, 2, 2).local()), BlockType::WOOD);
    }

    #[test]
    fn burn_ignites_flammable_blocks() {
        let mut c = Cuboid::all_air();
        c.set_block_type(loc(3, 3, 3).local(), BlockType::WOOD);
        let fx = Fixture::new(c);
        let (ok, committed) = fx.apply(&BlockMutation::Burn { at: loc(3, 3, 3) });
        assert!(ok);
        assert_eq!(committed.block_type(loc(3, 3, 3).local()), BlockType::FIRE);
    }

    #[test]
    fn burn_rejects_inert_blocks() {
        let fx = Fixture::new(Cuboid::filled(BlockType::STONE));
        let (ok, _) = fx.apply(&BlockMutation::Burn { at: loc(0, 0, 0) });
        assert!(!ok);
    }

    #[test]
    fn saveability_follows_tick_local_references() {
        assert!(BlockMutation::Break { at: loc(0, 0, 0) }.can_save_to_disk());
        assert!(
            !BlockMutation::VerifyCell {
                cell: 0,
                cells: vec![StructureCell {
                    at: loc(0, 0, 0),
                    block: BlockType::WOOD,
                    original: BlockType::AIR,
                }],
            }
            .can_save_to_disk()
        );
        assert!(!BlockMutation::LogicPulse {
            at: loc(0, 0, 0),
            level: 3
        }
        .can_save_to_disk());
    }
}
