//! Two-phase multi-cell placement.
//!
//! Single-mutation atomicity is scoped to one block, so an N-cell structure
//! goes through two rounds: round 1 emits one independent place mutation per
//! cell; round 2 (skipped under zero inter-tick delay) emits one verify
//! mutation per cell one tick later. Every verify re-reads every cell
//! (quadratic, fine at single-digit cell counts) and reverts its own cell to
//! the captured original if any cell failed to match, so the whole structure
//! reverts together.

use crate::world::WorldSnapshot;
use blockfield_common::{BlockLoc, BlockType};
use serde::{Deserialize, Serialize};

/// One cell of a multi-cell structure: where it goes, what was placed, and
/// the pre-placement content captured at round 1 for reverting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureCell {
    pub at: BlockLoc,
    pub block: BlockType,
    pub original: BlockType,
}

/// Capture originals for a requested structure against the previous-tick
/// snapshot. `None` if any target cell is unloaded; the whole placement is
/// rejected rather than partially planned.
pub fn plan_structure(
    snapshot: &WorldSnapshot,
    cells: &[(BlockLoc, BlockType)],
) -> Option<Vec<StructureCell>> {
    let mut planned = Vec::with_capacity(cells.len());
    for &(at, block) in cells {
        let original = snapshot.block_type(at)?;
        planned.push(StructureCell {
            at,
            block,
            original,
        });
    }
    Some(planned)
}

/// Whether every cell currently holds its placed block.
pub fn structure_intact(snapshot: &WorldSnapshot, cells: &[StructureCell]) -> bool {
    cells
        .iter()
        .all(|cell| snapshot.block_type(cell.at) == Some(cell.block))
}
