use serde::{Deserialize, Serialize};

/// Tunables for the tick engine and the mutation variants.
///
/// Everything a mutation may read at apply time lives here and reaches it
/// through the context; there is no other configuration channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Simulated duration of one tick, and the per-entity change budget.
    pub millis_per_tick: u32,
    /// Downward acceleration in blocks/s², scaled by local viscosity.
    pub gravity: f32,
    /// Relative tolerance on measured-vs-expected movement mismatch. Guards
    /// against floating point and timing slop without admitting cheats.
    pub movement_tolerance: f32,
    /// Horizontal speed cap in blocks/s.
    pub max_speed: f32,
    /// Ticks of breath an entity has with its head underwater.
    pub breath_ticks: u16,
    /// Percent chance per burn step that a burning block is consumed.
    pub burn_chance_percent: u32,
    /// Delay between growth stages, in milliseconds.
    pub growth_delay_ms: u64,
    /// Delay between burn-down steps, in milliseconds.
    pub burn_delay_ms: u64,
    /// Real delay between ticks. Zero means pure local/preview evaluation,
    /// which disables the multi-cell verify round.
    pub inter_tick_delay_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            millis_per_tick: 50,
            gravity: 24.0,
            movement_tolerance: 0.25,
            max_speed: 12.0,
            breath_ticks: 200,
            burn_chance_percent: 30,
            growth_delay_ms: 5_000,
            burn_delay_ms: 500,
            inter_tick_delay_ms: 50,
        }
    }
}

impl SimConfig {
    /// Configuration for local/preview evaluation: no inter-tick delay, so
    /// the placement verify round is skipped.
    pub fn preview() -> Self {
        Self {
            inter_tick_delay_ms: 0,
            ..Self::default()
        }
    }

    /// Convert a millisecond delay to a tick count, rounding up with a
    /// minimum of one tick so a zero delay never re-enters the current tick.
    pub fn delay_to_ticks(&self, delay_ms: u64) -> u64 {
        let mpt = self.millis_per_tick.max(1) as u64;
        delay_ms.div_ceil(mpt).max(1)
    }
}
