//! One 32³ cuboid: a bundle of per-aspect octrees plus the copy-on-write
//! overlay used for in-tick mutation.

use crate::octree::{AspectCodec, Octree};
use blockfield_common::{
    BlockFlags, BlockLoc, BlockType, ByteReader, ByteWriter, CodecError, Inventory, LocalCoord,
    Orientation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One independently-stored per-block property plane.
///
/// Ordinals are a stored-data compatibility contract: append only, never
/// renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Aspect {
    BlockType = 0,
    Damage = 1,
    Inventory = 2,
    Flags = 3,
    Logic = 4,
    Orientation = 5,
    MultiRoot = 6,
}

impl Aspect {
    /// All aspects in ordinal order; the transfer payload encodes trees in
    /// this order.
    pub const ALL: [Aspect; 7] = [
        Aspect::BlockType,
        Aspect::Damage,
        Aspect::Inventory,
        Aspect::Flags,
        Aspect::Logic,
        Aspect::Orientation,
        Aspect::MultiRoot,
    ];
}

/// A dynamically-typed aspect value, for generic inspection paths (hashing,
/// debugging). The typed accessors on [`Cuboid`] are the hot path.
#[derive(Debug, Clone, PartialEq)]
pub enum AspectValue {
    BlockType(BlockType),
    Damage(u8),
    Inventory(Option<Inventory>),
    Flags(BlockFlags),
    Logic(u8),
    Orientation(Orientation),
    MultiRoot(Option<BlockLoc>),
}

impl AspectCodec for BlockType {
    fn encode(&self, w: &mut ByteWriter) {
        w.put_u16(self.0);
    }
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(BlockType(r.get_u16()?))
    }
}

impl AspectCodec for u8 {
    fn encode(&self, w: &mut ByteWriter) {
        w.put_u8(*self);
    }
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        r.get_u8()
    }
}

impl AspectCodec for BlockFlags {
    fn encode(&self, w: &mut ByteWriter) {
        w.put_u8(self.0);
    }
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(BlockFlags(r.get_u8()?))
    }
}

impl AspectCodec for Orientation {
    fn encode(&self, w: &mut ByteWriter) {
        w.put_u8(self.0);
    }
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        // Normalize: stored bytes from a foreign peer may exceed the quadrant
        // range.
        Ok(Orientation::new(r.get_u8()?))
    }
}

impl AspectCodec for Option<Inventory> {
    fn encode(&self, w: &mut ByteWriter) {
        match self {
            None => w.put_bool(false),
            Some(inv) => {
                w.put_bool(true);
                w.put_inventory(inv);
            }
        }
    }
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        if r.get_bool()? {
            Ok(Some(r.get_inventory()?))
        } else {
            Ok(None)
        }
    }
}

impl AspectCodec for Option<BlockLoc> {
    fn encode(&self, w: &mut ByteWriter) {
        match self {
            None => w.put_bool(false),
            Some(loc) => {
                w.put_bool(true);
                w.put_block_loc(*loc);
            }
        }
    }
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        if r.get_bool()? {
            Ok(Some(r.get_block_loc()?))
        } else {
            Ok(None)
        }
    }
}

/// A fixed 32³ block volume. A block's full state is the tuple of values read
/// from all aspect trees at its local coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cuboid {
    types: Octree<BlockType>,
    damage: Octree<u8>,
    inventories: Octree<Option<Inventory>>,
    flags: Octree<BlockFlags>,
    logic: Octree<u8>,
    orientation: Octree<Orientation>,
    multi_root: Octree<Option<BlockLoc>>,
}

impl Default for Cuboid {
    fn default() -> Self {
        Self::all_air()
    }
}

impl Cuboid {
    /// An all-air cuboid: every aspect tree is a single uniform leaf.
    pub fn all_air() -> Self {
        Self {
            types: Octree::uniform(BlockType::AIR),
            damage: Octree::uniform(0),
            inventories: Octree::uniform(None),
            flags: Octree::uniform(BlockFlags::NONE),
            logic: Octree::uniform(0),
            orientation: Octree::uniform(Orientation::default()),
            multi_root: Octree::uniform(None),
        }
    }

    /// A cuboid uniformly filled with one block type.
    pub fn filled(block: BlockType) -> Self {
        let mut c = Self::all_air();
        c.types = Octree::uniform(block);
        c
    }

    pub fn block_type(&self, at: LocalCoord) -> BlockType {
        *self.types.get(at)
    }

    pub fn damage(&self, at: LocalCoord) -> u8 {
        *self.damage.get(at)
    }

    pub fn inventory(&self, at: LocalCoord) -> Option<&Inventory> {
        self.inventories.get(at).as_ref()
    }

    pub fn flags(&self, at: LocalCoord) -> BlockFlags {
        *self.flags.get(at)
    }

    pub fn logic(&self, at: LocalCoord) -> u8 {
        *self.logic.get(at)
    }

    pub fn orientation(&self, at: LocalCoord) -> Orientation {
        *self.orientation.get(at)
    }

    pub fn multi_root(&self, at: LocalCoord) -> Option<BlockLoc> {
        *self.multi_root.get(at)
    }

    pub fn set_block_type(&mut self, at: LocalCoord, v: BlockType) {
        self.types.set(at, v);
    }

    pub fn set_damage(&mut self, at: LocalCoord, v: u8) {
        self.damage.set(at, v);
    }

    pub fn set_inventory(&mut self, at: LocalCoord, v: Option<Inventory>) {
        self.inventories.set(at, v);
    }

    pub fn set_flags(&mut self, at: LocalCoord, v: BlockFlags) {
        self.flags.set(at, v);
    }

    pub fn set_logic(&mut self, at: LocalCoord, v: u8) {
        self.logic.set(at, v);
    }

    pub fn set_orientation(&mut self, at: LocalCoord, v: Orientation) {
        self.orientation.set(at, v);
    }

    pub fn set_multi_root(&mut self, at: LocalCoord, v: Option<BlockLoc>) {
        self.multi_root.set(at, v);
    }

    /// Generic read by aspect id.
    pub fn aspect_value(&self, aspect: Aspect, at: LocalCoord) -> AspectValue {
        match aspect {
            Aspect::BlockType => AspectValue::BlockType(self.block_type(at)),
            Aspect::Damage => AspectValue::Damage(self.damage(at)),
            Aspect::Inventory => AspectValue::Inventory(self.inventory(at).cloned()),
            Aspect::Flags => AspectValue::Flags(self.flags(at)),
            Aspect::Logic => AspectValue::Logic(self.logic(at)),
            Aspect::Orientation => AspectValue::Orientation(self.orientation(at)),
            Aspect::MultiRoot => AspectValue::MultiRoot(self.multi_root(at)),
        }
    }

    /// Fatal programming-invariant check for one block. An "empty" block type
    /// must never carry a non-null inventory; that would mean the
    /// deterministic-replay contract was already broken upstream.
    pub fn assert_consistent(&self, at: LocalCoord) {
        let block = self.block_type(at);
        if !block.is_container() {
            assert!(
                self.inventory(at).is_none(),
                "non-container block {block:?} carries an inventory at {at:?}"
            );
        }
    }

    /// Total octree node count across all aspects. All-air is exactly one
    /// node per aspect.
    pub fn node_count(&self) -> usize {
        self.types.node_count()
            + self.damage.node_count()
            + self.inventories.node_count()
            + self.flags.node_count()
            + self.logic.node_count()
            + self.orientation.node_count()
            + self.multi_root.node_count()
    }

    /// Encode all aspect trees in ordinal order into one payload.
    pub fn encode_payload(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        self.types.encode(&mut w);
        self.damage.encode(&mut w);
        self.inventories.encode(&mut w);
        self.flags.encode(&mut w);
        self.logic.encode(&mut w);
        self.orientation.encode(&mut w);
        self.multi_root.encode(&mut w);
        w.into_inner()
    }

    /// Decode a payload produced by [`Cuboid::encode_payload`].
    pub fn decode_payload(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = ByteReader::new(bytes);
        let cuboid = Self {
            types: Octree::decode(&mut r)?,
            damage: Octree::decode(&mut r)?,
            inventories: Octree::decode(&mut r)?,
            flags: Octree::decode(&mut r)?,
            logic: Octree::decode(&mut r)?,
            orientation: Octree::decode(&mut r)?,
            multi_root: Octree::decode(&mut r)?,
        };
        r.expect_end()?;
        Ok(cuboid)
    }
}

/// Copy-on-write view over a shared previous-tick cuboid.
///
/// Reads fall through to the base snapshot; the first write to an aspect
/// clones only that aspect's tree. `commit` merges overlays into a fresh
/// cuboid, leaving untouched aspects shared with the base.
#[derive(Debug)]
pub struct CuboidOverlay {
    base: Arc<Cuboid>,
    types: Option<Octree<BlockType>>,
    damage: Option<Octree<u8>>,
    inventories: Option<Octree<Option<Inventory>>>,
    flags: Option<Octree<BlockFlags>>,
    logic: Option<Octree<u8>>,
    orientation: Option<Octree<Orientation>>,
    multi_root: Option<Octree<Option<BlockLoc>>>,
}

impl CuboidOverlay {
    pub fn new(base: Arc<Cuboid>) -> Self {
        Self {
            base,
            types: None,
            damage: None,
            inventories: None,
            flags: None,
            logic: None,
            orientation: None,
            multi_root: None,
        }
    }

    pub fn base(&self) -> &Cuboid {
        &self.base
    }

    /// Whether any aspect has been written.
    pub fn dirty(&self) -> bool {
        self.types.is_some()
            || self.damage.is_some()
            || self.inventories.is_some()
            || self.flags.is_some()
            || self.logic.is_some()
            || self.orientation.is_some()
            || self.multi_root.is_some()
    }

    pub fn block_type(&self, at: LocalCoord) -> BlockType {
        match &self.types {
            Some(t) => *t.get(at),
            None => self.base.block_type(at),
        }
    }

    pub fn damage(&self, at: LocalCoord) -> u8 {
        match &self.damage {
            Some(t) => *t.get(at),
            None => self.base.damage(at),
        }
    }

    pub fn inventory(&self, at: LocalCoord) -> Option<&Inventory> {
        match &self.inventories {
            Some(t) => t.get(at).as_ref(),
            None => self.base.inventory(at),
        }
    }

    pub fn flags(&self, at: LocalCoord) -> BlockFlags {
        match &self.flags {
            Some(t) => *t.get(at),
            None => self.base.flags(at),
        }
    }

    pub fn logic(&self, at: LocalCoord) -> u8 {
        match &self.logic {
            Some(t) => *t.get(at),
            None => self.base.logic(at),
        }
    }

    pub fn orientation(&self, at: LocalCoord) -> Orientation {
        match &self.orientation {
            Some(t) => *t.get(at),
            None => self.base.orientation(at),
        }
    }

    pub fn multi_root(&self, at: LocalCoord) -> Option<BlockLoc> {
        match &self.multi_root {
            Some(t) => *t.get(at),
            None => self.base.multi_root(at),
        }
    }

    pub fn set_block_type(&mut self, at: LocalCoord, v: BlockType) {
        let base = &self.base;
        self.types
            .get_or_insert_with(|| base.types.clone())
            .set(at, v);
    }

    pub fn set_damage(&mut self, at: LocalCoord, v: u8) {
        let base = &self.base;
        self.damage
            .get_or_insert_with(|| base.damage.clone())
            .set(at, v);
    }

    pub fn set_inventory(&mut self, at: LocalCoord, v: Option<Inventory>) {
        let base = &self.base;
        self.inventories
            .get_or_insert_with(|| base.inventories.clone())
            .set(at, v);
    }

    pub fn set_flags(&mut self, at: LocalCoord, v: BlockFlags) {
        let base = &self.base;
        self.flags
            .get_or_insert_with(|| base.flags.clone())
            .set(at, v);
    }

    pub fn set_logic(&mut self, at: LocalCoord, v: u8) {
        let base = &self.base;
        self.logic
            .get_or_insert_with(|| base.logic.clone())
            .set(at, v);
    }

    pub fn set_orientation(&mut self, at: LocalCoord, v: Orientation) {
        let base = &self.base;
        self.orientation
            .get_or_insert_with(|| base.orientation.clone())
            .set(at, v);
    }

    pub fn set_multi_root(&mut self, at: LocalCoord, v: Option<BlockLoc>) {
        let base = &self.base;
        self.multi_root
            .get_or_insert_with(|| base.multi_root.clone())
            .set(at, v);
    }

    /// Merge overlays into a committed cuboid. Returns the base unchanged
    /// when nothing was written.
    pub fn commit(self) -> Arc<Cuboid> {
        if !self.dirty() {
            return self.base;
        }
        let Self {
            base,
            types,
            damage,
            inventories,
            flags,
            logic,
            orientation,
            multi_root,
        } = self;
        Arc::new(Cuboid {
            types: types.unwrap_or_else(|| base.types.clone()),
            damage: damage.unwrap_or_else(|| base.damage.clone()),
            inventories: inventories.unwrap_or_else(|| base.inventories.clone()),
            flags: flags.unwrap_or_else(|| base.flags.clone()),
            logic: logic.unwrap_or_else(|| base.logic.clone()),
            orientation: orientation.unwrap_or_else(|| base.orientation.clone()),
            multi_root: multi_root.unwrap_or_else(|| base.multi_root.clone()),
        })
    }
}
