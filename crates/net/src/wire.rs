//! Byte-tagged codecs for the mutation and change families.
//!
//! Tag values are append-only: a retired variant's tag is never reused, and
//! new variants take the next free value, so peers running older builds fail
//! with `UnknownTag` instead of decoding garbage.

use blockfield_common::{
    BlockFlags, BlockType, ByteReader, ByteWriter, CodecError, ItemType, Orientation,
};
use blockfield_sim::placement::StructureCell;
use blockfield_sim::{BlockMutation, EntityChange};

/// Wire tags. Append-only.
pub mod tags {
    pub const MUTATION_PLACE: u8 = 0;
    pub const MUTATION_BREAK: u8 = 1;
    pub const MUTATION_STORE_ITEMS: u8 = 2;
    pub const MUTATION_TAKE_ITEMS: u8 = 3;
    pub const MUTATION_SET_FLAGS: u8 = 4;
    pub const MUTATION_LOGIC_PULSE: u8 = 5;
    pub const MUTATION_GROW: u8 = 6;
    pub const MUTATION_BURN: u8 = 7;
    pub const MUTATION_PLACE_CELL: u8 = 8;
    pub const MUTATION_VERIFY_CELL: u8 = 9;

    pub const CHANGE_MOVE: u8 = 0;
    pub const CHANGE_CRAFT: u8 = 1;
    pub const CHANGE_EQUIP: u8 = 2;
    pub const CHANGE_CONSUME: u8 = 3;
    pub const CHANGE_DAMAGE: u8 = 4;
    pub const CHANGE_CANCEL: u8 = 5;
    pub const CHANGE_PLACE_STRUCTURE: u8 = 6;
}

/// Encode a block mutation as tag + payload.
pub fn encode_mutation(m: &BlockMutation) -> Vec<u8> {
    let mut w = ByteWriter::new();
    match m {
        BlockMutation::Place {
            at,
            block,
            orientation,
        } => {
            w.put_u8(tags::MUTATION_PLACE);
            w.put_block_loc(*at);
            w.put_u16(block.0);
            w.put_u8(orientation.0);
        }
        BlockMutation::Break { at } => {
            w.put_u8(tags::MUTATION_BREAK);
            w.put_block_loc(*at);
        }
        BlockMutation::StoreItems { at, item, count } => {
            w.put_u8(tags::MUTATION_STORE_ITEMS);
            w.put_block_loc(*at);
            w.put_u16(item.0);
            w.put_u32(*count);
        }
        BlockMutation::TakeItems { at, item, count } => {
            w.put_u8(tags::MUTATION_TAKE_ITEMS);
            w.put_block_loc(*at);
            w.put_u16(item.0);
            w.put_u32(*count);
        }
        BlockMutation::SetFlags { at, flags } => {
            w.put_u8(tags::MUTATION_SET_FLAGS);
            w.put_block_loc(*at);
            w.put_u8(flags.0);
        }
        BlockMutation::LogicPulse { at, level } => {
            w.put_u8(tags::MUTATION_LOGIC_PULSE);
            w.put_block_loc(*at);
            w.put_u8(*level);
        }
        BlockMutation::Grow { at } => {
            w.put_u8(tags::MUTATION_GROW);
            w.put_block_loc(*at);
        }
        BlockMutation::Burn { at } => {
            w.put_u8(tags::MUTATION_BURN);
            w.put_block_loc(*at);
        }
        BlockMutation::PlaceCell { at, block, root } => {
            w.put_u8(tags::MUTATION_PLACE_CELL);
            w.put_block_loc(*at);
            w.put_u16(block.0);
            w.put_block_loc(*root);
        }
        BlockMutation::VerifyCell { cell, cells } => {
            w.put_u8(tags::MUTATION_VERIFY_CELL);
            w.put_u32(*cell as u32);
            w.put_u16(cells.len() as u16);
            for c in cells {
                w.put_block_loc(c.at);
                w.put_u16(c.block.0);
                w.put_u16(c.original.0);
            }
        }
    }
    w.into_inner()
}

/// Decode a block mutation; the whole buffer must be consumed.
pub fn decode_mutation(bytes: &[u8]) -> Result<BlockMutation, CodecError> {
    let mut r = ByteReader::new(bytes);
    let tag = r.get_u8()?;
    let m = match tag {
        tags::MUTATION_PLACE => BlockMutation::Place {
            at: r.get_block_loc()?,
            block: BlockType(r.get_u16()?),
            orientation: Orientation::new(r.get_u8()?),
        },
        tags::MUTATION_BREAK => BlockMutation::Break {
            at: r.get_block_loc()?,
        },
        tags::MUTATION_STORE_ITEMS => BlockMutation::StoreItems {
            at: r.get_block_loc()?,
            item: ItemType(r.get_u16()?),
            count: r.get_u32()?,
        },
        tags::MUTATION_TAKE_ITEMS => BlockMutation::TakeItems {
            at: r.get_block_loc()?,
            item: ItemType(r.get_u16()?),
            count: r.get_u32()?,
        },
        tags::MUTATION_SET_FLAGS => BlockMutation::SetFlags {
            at: r.get_block_loc()?,
            flags: BlockFlags(r.get_u8()?),
        },
        tags::MUTATION_LOGIC_PULSE => BlockMutation::LogicPulse {
            at: r.get_block_loc()?,
            level: r.get_u8()?,
        },
        tags::MUTATION_GROW => BlockMutation::Grow {
            at: r.get_block_loc()?,
        },
        tags::MUTATION_BURN => BlockMutation::Burn {
            at: r.get_block_loc()?,
        },
        tags::MUTATION_PLACE_CELL => BlockMutation::PlaceCell {
            at: r.get_block_loc()?,
            block: BlockType(r.get_u16()?),
            root: r.get_block_loc()?,
        },
        tags::MUTATION_VERIFY_CELL => {
            let cell = r.get_u32()? as usize;
            let len = r.get_u16()? as usize;
            if len == 0 || cell >= len {
                return Err(CodecError::Invalid(format!(
                    "verify cell index {cell} out of range for {len} cells"
                )));
            }
            let mut cells = Vec::with_capacity(len);
            for _ in 0..len {
                cells.push(StructureCell {
                    at: r.get_block_loc()?,
                    block: BlockType(r.get_u16()?),
                    original: BlockType(r.get_u16()?),
                });
            }
            BlockMutation::VerifyCell { cell, cells }
        }
        _ => {
            return Err(CodecError::UnknownTag {
                kind: "mutation",
                tag,
            });
        }
    };
    r.expect_end()?;
    Ok(m)
}

/// Encode an entity change. `EndOfTick` is engine-internal and has no wire
/// representation.
pub fn encode_change(c: &EntityChange) -> Result<Vec<u8>, CodecError> {
    let mut w = ByteWriter::new();
    match c {
        EntityChange::Move {
            to,
            velocity,
            yaw,
            pitch,
        } => {
            w.put_u8(tags::CHANGE_MOVE);
            w.put_vec3(*to);
            w.put_vec3(*velocity);
            w.put_f32(*yaw);
            w.put_f32(*pitch);
        }
        EntityChange::Craft {
            output,
            count,
            duration_ms,
        } => {
            w.put_u8(tags::CHANGE_CRAFT);
            w.put_u16(output.0);
            w.put_u32(*count);
            w.put_u32(*duration_ms);
        }
        EntityChange::Equip { slot } => {
            w.put_u8(tags::CHANGE_EQUIP);
            w.put_u8(*slot);
        }
        EntityChange::Consume { slot } => {
            w.put_u8(tags::CHANGE_CONSUME);
            w.put_u8(*slot);
        }
        EntityChange::Damage { amount } => {
            w.put_u8(tags::CHANGE_DAMAGE);
            w.put_u16(*amount);
        }
        EntityChange::Cancel => {
            w.put_u8(tags::CHANGE_CANCEL);
        }
        EntityChange::PlaceStructure { cells } => {
            w.put_u8(tags::CHANGE_PLACE_STRUCTURE);
            w.put_u16(cells.len() as u16);
            for (at, block) in cells {
                w.put_block_loc(*at);
                w.put_u16(block.0);
            }
        }
        EntityChange::EndOfTick => {
            return Err(CodecError::NotEncodable("EndOfTick"));
        }
    }
    Ok(w.into_inner())
}

/// Decode an entity change; the whole buffer must be consumed.
pub fn decode_change(bytes: &[u8]) -> Result<EntityChange, CodecError> {
    let mut r = ByteReader::new(bytes);
    let tag = r.get_u8()?;
    let c = match tag {
        tags::CHANGE_MOVE => EntityChange::Move {
            to: r.get_vec3()?,
            velocity: r.get_vec3()?,
            yaw: r.get_f32()?,
            pitch: r.get_f32()?,
        },
        tags::CHANGE_CRAFT => EntityChange::Craft {
            output: ItemType(r.get_u16()?),
            count: r.get_u32()?,
            duration_ms: r.get_u32()?,
        },
        tags::CHANGE_EQUIP => EntityChange::Equip { slot: r.get_u8()? },
        tags::CHANGE_CONSUME => EntityChange::Consume { slot: r.get_u8()? },
        tags::CHANGE_DAMAGE => EntityChange::Damage {
            amount: r.get_u16()?,
        },
        tags::CHANGE_CANCEL => EntityChange::Cancel,
        tags::CHANGE_PLACE_STRUCTURE => {
            let len = r.get_u16()? as usize;
            let mut cells = Vec::with_capacity(len);
            for _ in 0..len {
                let at = r.get_block_loc()?;
                let block = BlockType(r.get_u16()?);
                cells.push((at, block));
            }
            EntityChange::PlaceStructure { cells }
        }
        _ => {
            return Err(CodecError::UnknownTag {
                kind: "change",
                tag,
            });
        }
    };
    r.expect_end()?;
    Ok(c)
}
