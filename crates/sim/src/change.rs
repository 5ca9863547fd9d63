//! The closed set of entity change variants.
//!
//! Changes are the entity-side counterpart of block mutations: one requested
//! transition, applied against an entity proxy, accepted or rejected as a
//! whole. Each change also carries a time cost drawn from the entity's
//! per-tick budget; `Cancel` has the sentinel cost -1 and preempts queued
//! work instead of consuming budget.

use crate::context::TickContext;
use crate::entity::{InProgress, EQUIPMENT_SLOTS};
use crate::event::SimEvent;
use crate::movement;
use crate::mutation::BlockMutation;
use crate::placement::plan_structure;
use crate::proxy::EntityProxy;
use blockfield_common::{BlockLoc, BlockType, ItemStack, ItemType};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Food restored by consuming one bread.
const BREAD_FOOD: u16 = 20;

/// A single requested entity state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityChange {
    /// Client-reported movement, validated server-side.
    Move {
        to: Vec3,
        velocity: Vec3,
        yaw: f32,
        pitch: f32,
    },
    /// Begin a craft; completes in the end-of-tick pass after `duration_ms`.
    Craft {
        output: ItemType,
        count: u32,
        duration_ms: u32,
    },
    /// Move the first carried stack into an equipment slot, swapping out
    /// whatever was there.
    Equip { slot: u8 },
    /// Consume one food item from an equipment slot.
    Consume { slot: u8 },
    Damage { amount: u16 },
    /// Abort the entity's in-progress operation. Also preempts this entity's
    /// not-yet-applied queued changes for the tick.
    Cancel,
    /// Request a multi-cell structure placement.
    PlaceStructure { cells: Vec<(BlockLoc, BlockType)> },
    /// The implicit per-entity pass the engine runs every tick. Never sent
    /// over the wire and never queued by callers.
    EndOfTick,
}

impl EntityChange {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Craft { .. } => "craft",
            Self::Equip { .. } => "equip",
            Self::Consume { .. } => "consume",
            Self::Damage { .. } => "damage",
            Self::Cancel => "cancel",
            Self::PlaceStructure { .. } => "place_structure",
            Self::EndOfTick => "end_of_tick",
        }
    }

    /// Budget cost in simulated milliseconds. -1 is the cancel sentinel: the
    /// engine treats it as free and gives it preemptive behavior.
    pub fn time_cost_millis(&self) -> i32 {
        match self {
            Self::Move { .. } | Self::Damage { .. } | Self::EndOfTick => 0,
            Self::Equip { .. } => 10,
            Self::Consume { .. } => 15,
            Self::Craft { .. } | Self::PlaceStructure { .. } => 20,
            Self::Cancel => -1,
        }
    }

    /// Whether a queued copy of this change survives a save/load cycle.
    /// Transient feedback (movement, damage, cancels) does not.
    pub fn can_save_to_disk(&self) -> bool {
        match self {
            Self::Craft { .. }
            | Self::Equip { .. }
            | Self::Consume { .. }
            | Self::PlaceStructure { .. } => true,
            Self::Move { .. } | Self::Damage { .. } | Self::Cancel | Self::EndOfTick => false,
        }
    }

    /// Apply against the entity's working copy. On failure the copy is
    /// discarded and the committed entity is untouched, but anything pushed
    /// through the context sinks still fires.
    pub fn apply(&self, ctx: &mut TickContext<'_>, proxy: &mut EntityProxy) -> bool {
        match self {
            Self::Move {
                to,
                velocity,
                yaw,
                pitch,
            } => {
                if !movement::validate(proxy.entity(), *to, *velocity, ctx.snapshot(), ctx.config())
                {
                    return false;
                }
                proxy.set_location(*to);
                proxy.set_velocity(*velocity);
                proxy.set_look(*yaw, *pitch);
                true
            }
            Self::Craft {
                output,
                count,
                duration_ms,
            } => {
                if *count == 0 || proxy.entity().in_progress.is_some() {
                    return false;
                }
                proxy.set_in_progress(Some(InProgress::Craft {
                    output: *output,
                    count: *count,
                    remaining_ms: *duration_ms,
                }));
                true
            }
            Self::Equip { slot } => {
                let slot = *slot as usize;
                if slot >= EQUIPMENT_SLOTS {
                    return false;
                }
                let incoming = proxy.take_first_stack();
                if incoming.is_none() && proxy.entity().equipment[slot].is_none() {
                    return false;
                }
                if let Some(displaced) = proxy.set_equipment(slot, incoming) {
                    proxy.add_items(displaced.item, displaced.count);
                }
                true
            }
            Self::Consume { slot } => {
                let slot = *slot as usize;
                if slot >= EQUIPMENT_SLOTS {
                    return false;
                }
                // On rejection the working copy is discarded, so the stack
                // can be taken before the checks.
                let Some(stack) = proxy.set_equipment(slot, None) else {
                    return false;
                };
                if stack.item != ItemType::BREAD {
                    return false;
                }
                if stack.count > 1 {
                    proxy.set_equipment(
                        slot,
                        Some(ItemStack {
                            item: stack.item,
                            count: stack.count - 1,
                        }),
                    );
                }
                proxy.heal_food(BREAD_FOOD);
                true
            }
            Self::Damage { amount } => {
                if !proxy.entity().is_alive() {
                    return false;
                }
                proxy.apply_damage(*amount);
                let id = proxy.entity().id;
                ctx.emit(SimEvent::EntityDamaged {
                    id,
                    amount: *amount,
                });
                if !proxy.entity().is_alive() {
                    ctx.emit(SimEvent::EntityDied { id });
                }
                true
            }
            Self::Cancel => {
                if proxy.entity().in_progress.is_none() {
                    return false;
                }
                proxy.set_in_progress(None);
                true
            }
            Self::PlaceStructure { cells } => {
                if cells.is_empty() || proxy.entity().in_progress.is_some() {
                    return false;
                }
                let Some(planned) = plan_structure(ctx.snapshot(), cells) else {
                    return false;
                };
                let root = planned[0].at;
                for cell in &planned {
                    ctx.push_mutation(BlockMutation::PlaceCell {
                        at: cell.at,
                        block: cell.block,
                        root,
                    });
                }
                // The verify round needs a real tick boundary; preview runs
                // with zero inter-tick delay skip it.
                if ctx.config().inter_tick_delay_ms > 0 {
                    for i in 0..planned.len() {
                        ctx.push_next_tick(BlockMutation::VerifyCell {
                            cell: i,
                            cells: planned.clone(),
                        });
                    }
                }
                proxy.set_in_progress(Some(InProgress::Placement { root }));
                true
            }
            Self::EndOfTick => {
                end_of_tick(ctx, proxy);
                true
            }
        }
    }
}

/// The implicit pass: physics integration, breath, and countdown completion.
fn end_of_tick(ctx: &mut TickContext<'_>, proxy: &mut EntityProxy) {
    let cfg = ctx.config();
    let dt = cfg.millis_per_tick as f32 / 1000.0;
    let snapshot = ctx.snapshot();

    let entity = proxy.entity();
    let feet = entity.feet_block();
    let below = snapshot.block_type(feet.offset(0, 0, -1));
    let on_ground = below.map(BlockType::is_solid).unwrap_or(false) && entity.velocity.z <= 0.0;

    let mut velocity = entity.velocity;
    if on_ground {
        velocity.z = 0.0;
    } else {
        let visc = snapshot
            .block_type(feet)
            .map(BlockType::viscosity)
            .unwrap_or(1.0);
        velocity.z -= cfg.gravity * visc * dt;
    }

    let target = entity.location + velocity * dt;
    let target_feet = BlockLoc::containing(target);
    let blocked = snapshot
        .block_type(target_feet)
        .map(BlockType::is_solid)
        .unwrap_or(false);
    if blocked {
        proxy.set_velocity(Vec3::ZERO);
    } else {
        proxy.set_location(target);
        proxy.set_velocity(velocity);
    }

    // Breath: drains with the head underwater, refills instantly otherwise.
    let head = proxy.entity().head_block();
    let submerged = snapshot.block_type(head) == Some(BlockType::WATER);
    if submerged {
        let breath = proxy.entity().breath;
        if breath == 0 {
            let id = proxy.entity().id;
            proxy.apply_damage(1);
            ctx.emit(SimEvent::EntityDamaged { id, amount: 1 });
            if !proxy.entity().is_alive() {
                ctx.emit(SimEvent::EntityDied { id });
            }
        } else {
            proxy.set_breath(breath - 1);
        }
    } else {
        proxy.set_breath(cfg.breath_ticks);
    }

    match proxy.entity().in_progress.clone() {
        Some(InProgress::Craft {
            output,
            count,
            remaining_ms,
        }) => {
            let remaining = remaining_ms.saturating_sub(cfg.millis_per_tick);
            if remaining == 0 {
                proxy.add_items(output, count);
                let id = proxy.entity().id;
                ctx.emit(SimEvent::CraftCompleted { id, output, count });
                proxy.set_in_progress(None);
            } else {
                proxy.set_in_progress(Some(InProgress::Craft {
                    output,
                    count,
                    remaining_ms: remaining,
                }));
            }
        }
        // The placement marker only spans the request tick; the verify round
        // carries its own captured state.
        Some(InProgress::Placement { .. }) => proxy.set_in_progress(None),
        None => {}
    }
}
