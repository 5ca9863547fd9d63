//! Server-side movement validation.
//!
//! Clients report where they moved; the server never integrates player
//! positions itself. Validation checks the report against what physics allows
//! from the previous-tick state, within a tolerance, and falls back to a few
//! situational explanations (landing, bumping a ceiling, crossing a viscosity
//! boundary) before rejecting.

use crate::config::SimConfig;
use crate::entity::Entity;
use crate::world::WorldSnapshot;
use blockfield_common::{BlockLoc, BlockType};
use glam::Vec3;

/// Velocities this close to zero are treated as stopped.
const REST_EPSILON: f32 = 0.05;

/// Validate a reported move for `prev` to position `to` with claimed
/// `velocity`. True means the report is physically plausible.
pub fn validate(
    prev: &Entity,
    to: Vec3,
    velocity: Vec3,
    snapshot: &WorldSnapshot,
    cfg: &SimConfig,
) -> bool {
    let dt = cfg.millis_per_tick as f32 / 1000.0;
    let slack = 1.0 + cfg.movement_tolerance;

    // Horizontal speed cap, on both claimed velocity and actual displacement.
    let horiz_vel = Vec3::new(velocity.x, velocity.y, 0.0).length();
    if horiz_vel > cfg.max_speed * slack {
        return false;
    }
    let delta = to - prev.location;
    let horiz_moved = Vec3::new(delta.x, delta.y, 0.0).length();
    if horiz_moved > cfg.max_speed * dt * slack {
        return false;
    }

    // Vertical: the claimed vz must match gravity integration from the
    // previous velocity, scaled by the viscosity of the medium the entity
    // was in.
    let visc_prev = viscosity_at(snapshot, prev.feet_block());
    let expected_vz = prev.velocity.z - cfg.gravity * visc_prev * dt;
    let tol = cfg.movement_tolerance * expected_vz.abs().max(1.0);
    if (velocity.z - expected_vz).abs() <= tol {
        return true;
    }

    // Landing: standing on a solid block explains a vertical stop that
    // gravity alone would not.
    let feet = BlockLoc::containing(to);
    let below_solid = block_is_solid(snapshot, feet.offset(0, 0, -1));
    if below_solid && velocity.z.abs() <= REST_EPSILON {
        return true;
    }

    // Ceiling: an upward expectation cut short by a solid block overhead.
    let above_solid = block_is_solid(snapshot, feet.offset(0, 0, 2));
    if above_solid && expected_vz > 0.0 && velocity.z <= REST_EPSILON {
        return true;
    }

    // Viscosity boundary: the entity crossed into a different medium this
    // tick, so integrate with the destination's viscosity instead.
    let visc_to = viscosity_at(snapshot, feet);
    if visc_to != visc_prev {
        let expected_cross = prev.velocity.z - cfg.gravity * visc_to * dt;
        let tol_cross = cfg.movement_tolerance * expected_cross.abs().max(1.0);
        if (velocity.z - expected_cross).abs() <= tol_cross {
            return true;
        }
    }

    false
}

fn viscosity_at(snapshot: &WorldSnapshot, at: BlockLoc) -> f32 {
    snapshot
        .block_type(at)
        .map(BlockType::viscosity)
        .unwrap_or(1.0)
}

fn block_is_solid(snapshot: &WorldSnapshot, at: BlockLoc) -> bool {
    snapshot
        .block_type(at)
        .map(BlockType::is_solid)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::WorldState;
    use blockfield_common::{BlockLoc, CuboidAddr, EntityId};
    use blockfield_store::Cuboid;

    fn airborne_player(at: Vec3, vz: f32) -> Entity {
        let mut p = Entity::player(EntityId(1), at, 200);
        p.velocity = Vec3::new(0.0, 0.0, vz);
        p
    }

    fn air_world() -> WorldState {
        let mut world = WorldState::new();
        world.insert_cuboid(CuboidAddr::new(0, 0, 0), Cuboid::all_air());
        world
    }

    #[test]
    fn free_fall_integration_is_accepted() {
        let world = air_world();
        let snap = world.snapshot();
        let cfg = SimConfig::default();
        let dt = cfg.millis_per_tick as f32 / 1000.0;

        let prev = airborne_player(Vec3::new(16.0, 16.0, 20.0), -2.0);
        let expected_vz = -2.0 - cfg.gravity * dt;
        let to = prev.location + Vec3::new(0.0, 0.0, expected_vz * dt);
        assert!(validate(
            &prev,
            to,
            Vec3::new(0.0, 0.0, expected_vz),
            &snap,
            &cfg
        ));
    }

    #[test]
    fn hovering_in_air_is_rejected() {
        let world = air_world();
        let snap = world.snapshot();
        let cfg = SimConfig::default();

        let prev = airborne_player(Vec3::new(16.0, 16.0, 20.0), -2.0);
        // Claims unchanged vertical velocity despite gravity.
        assert!(!validate(
            &prev,
            prev.location,
            Vec3::new(0.0, 0.0, -2.0),
            &snap,
            &cfg
        ));
    }

    #[test]
    fn excessive_horizontal_speed_is_rejected() {
        let world = air_world();
        let snap = world.snapshot();
        let cfg = SimConfig::default();

        let prev = airborne_player(Vec3::new(16.0, 16.0, 20.0), 0.0);
        let to = prev.location + Vec3::new(5.0, 0.0, 0.0);
        assert!(!validate(&prev, to, Vec3::new(100.0, 0.0, 0.0), &snap, &cfg));
    }

    #[test]
    fn landing_on_solid_ground_is_accepted() {
        let mut world = WorldState::new();
        let mut c = Cuboid::all_air();
        // Floor at z = 4 near (16, 16).
        for x in 14..19u8 {
            for y in 14..19u8 {
                c.set_block_type(BlockLoc::new(x as i64, y as i64, 4).local(), BlockType::STONE);
            }
        }
        world.insert_cuboid(CuboidAddr::new(0, 0, 0), c);
        let snap = world.snapshot();
        let cfg = SimConfig::default();

        // Falling fast, comes to rest standing on the floor.
        let prev = airborne_player(Vec3::new(16.0, 16.0, 5.3), -6.0);
        let to = Vec3::new(16.0, 16.0, 5.0);
        assert!(validate(&prev, to, Vec3::ZERO, &snap, &cfg));
    }

    #[test]
    fn entering_water_uses_destination_viscosity() {
        let mut world = WorldState::new();
        let mut c = Cuboid::filled(BlockType::WATER);
        // Air above z = 15.
        for x in 0..32u8 {
            for y in 0..32u8 {
                for z in 16..32u8 {
                    c.set_block_type(
                        BlockLoc::new(x as i64, y as i64, z as i64).local(),
                        BlockType::AIR,
                    );
                }
            }
        }
        world.insert_cuboid(CuboidAddr::new(0, 0, 0), c);
        let snap = world.snapshot();
        let cfg = SimConfig::default();
        let dt = cfg.millis_per_tick as f32 / 1000.0;

        // Sinks from air into water; reported vz integrated with the water's
        // viscosity, which the air-medium expectation would reject.
        let prev = airborne_player(Vec3::new(16.0, 16.0, 16.2), -0.2);
        let water_visc = BlockType::WATER.viscosity();
        let expected_vz = -0.2 - cfg.gravity * water_visc * dt;
        let to = Vec3::new(16.0, 16.0, 15.5);
        assert!(validate(
            &prev,
            to,
            Vec3::new(0.0, 0.0, expected_vz),
            &snap,
            &cfg
        ));
    }
}
