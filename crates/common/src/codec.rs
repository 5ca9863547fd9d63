//! Byte-level reader/writer for the hand-written wire format.
//!
//! Every mutation/change type and the cuboid transfer payload encode through
//! these cursors: a single-byte type discriminant followed by a fixed or
//! variable-length little-endian payload.

use crate::types::{BlockLoc, CuboidAddr, EntityId, Inventory, ItemStack, ItemType};

/// Errors from wire encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("buffer underrun: needed {needed} more bytes, {remaining} remaining")]
    Underrun { needed: usize, remaining: usize },
    #[error("unknown {kind} tag {tag:#04x}")]
    UnknownTag { kind: &'static str, tag: u8 },
    #[error("{0} has no wire representation")]
    NotEncodable(&'static str),
    #[error("invalid payload: {0}")]
    Invalid(String),
}

/// Append-only byte buffer writer.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Length-prefixed (u32) byte slice.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.put_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
    }

    /// Raw bytes without a length prefix.
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_block_loc(&mut self, loc: BlockLoc) {
        self.put_i64(loc.x);
        self.put_i64(loc.y);
        self.put_i64(loc.z);
    }

    pub fn put_cuboid_addr(&mut self, addr: CuboidAddr) {
        self.put_i32(addr.x);
        self.put_i32(addr.y);
        self.put_i32(addr.z);
    }

    pub fn put_entity_id(&mut self, id: EntityId) {
        self.put_i64(id.0);
    }

    pub fn put_vec3(&mut self, v: glam::Vec3) {
        self.put_f32(v.x);
        self.put_f32(v.y);
        self.put_f32(v.z);
    }

    pub fn put_inventory(&mut self, inv: &Inventory) {
        self.put_u16(inv.slots.len() as u16);
        for slot in &inv.slots {
            self.put_u16(slot.item.0);
            self.put_u32(slot.count);
        }
    }
}

/// Sequential reader over a received byte slice.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Underrun {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.get_u8()? != 0)
    }

    pub fn get_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn get_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn get_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn get_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn get_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn get_f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    /// Length-prefixed (u32) byte slice.
    pub fn get_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.get_u32()? as usize;
        self.take(len)
    }

    pub fn get_block_loc(&mut self) -> Result<BlockLoc, CodecError> {
        Ok(BlockLoc {
            x: self.get_i64()?,
            y: self.get_i64()?,
            z: self.get_i64()?,
        })
    }

    pub fn get_cuboid_addr(&mut self) -> Result<CuboidAddr, CodecError> {
        Ok(CuboidAddr {
            x: self.get_i32()?,
            y: self.get_i32()?,
            z: self.get_i32()?,
        })
    }

    pub fn get_entity_id(&mut self) -> Result<EntityId, CodecError> {
        Ok(EntityId(self.get_i64()?))
    }

    pub fn get_vec3(&mut self) -> Result<glam::Vec3, CodecError> {
        Ok(glam::Vec3::new(
            self.get_f32()?,
            self.get_f32()?,
            self.get_f32()?,
        ))
    }

    pub fn get_inventory(&mut self) -> Result<Inventory, CodecError> {
        let len = self.get_u16()? as usize;
        let mut slots = Vec::with_capacity(len);
        for _ in 0..len {
            let item = ItemType(self.get_u16()?);
            let count = self.get_u32()?;
            slots.push(ItemStack { item, count });
        }
        Ok(Inventory { slots })
    }

    /// Fail if any payload bytes remain unconsumed.
    pub fn expect_end(&self) -> Result<(), CodecError> {
        if self.remaining() != 0 {
            return Err(CodecError::Invalid(format!(
                "{} trailing bytes after payload",
                self.remaining()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_roundtrip() {
        let mut w = ByteWriter::new();
        w.put_u8(7);
        w.put_u16(300);
        w.put_i64(-5);
        w.put_f32(1.5);
        w.put_bool(true);
        let buf = w.into_inner();

        let mut r = ByteReader::new(&buf);
        assert_eq!(r.get_u8().unwrap(), 7);
        assert_eq!(r.get_u16().unwrap(), 300);
        assert_eq!(r.get_i64().unwrap(), -5);
        assert_eq!(r.get_f32().unwrap(), 1.5);
        assert!(r.get_bool().unwrap());
        r.expect_end().unwrap();
    }

    #[test]
    fn underrun_is_reported() {
        let mut r = ByteReader::new(&[1, 2]);
        let err = r.get_u32().unwrap_err();
        assert!(matches!(
            err,
            CodecError::Underrun {
                needed: 4,
                remaining: 2
            }
        ));
    }

    #[test]
    fn inventory_roundtrip() {
        let mut inv = Inventory::new();
        inv.add(ItemType::STONE, 5);
        inv.add(ItemType::BREAD, 1);

        let mut w = ByteWriter::new();
        w.put_inventory(&inv);
        let buf = w.into_inner();

        let mut r = ByteReader::new(&buf);
        assert_eq!(r.get_inventory().unwrap(), inv);
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut w = ByteWriter::new();
        w.put_u8(1);
        w.put_u8(2);
        let buf = w.into_inner();
        let mut r = ByteReader::new(&buf);
        r.get_u8().unwrap();
        assert!(r.expect_end().is_err());
    }
}
