//! Resumable cuboid serialization.
//!
//! A cuboid payload may be larger than one network frame, so both directions
//! run through cursors: the sender drains fragments under a per-call length
//! budget, the receiver accumulates fragments until the declared payload
//! length is reached.

use crate::cuboid::Cuboid;
use blockfield_common::CodecError;

/// Bytes of length header preceding the payload.
const LEN_HEADER: usize = 4;

/// Sender-side cursor over one cuboid's encoded form.
#[derive(Debug)]
pub struct SerializeCursor {
    bytes: Vec<u8>,
    pos: usize,
}

impl SerializeCursor {
    pub(crate) fn new(cuboid: &Cuboid) -> Self {
        let payload = cuboid.encode_payload();
        let mut bytes = Vec::with_capacity(LEN_HEADER + payload.len());
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&payload);
        Self { bytes, pos: 0 }
    }

    /// Total encoded size, header included.
    pub fn total_len(&self) -> usize {
        self.bytes.len()
    }

    /// The next fragment of at most `max_len` bytes, or `None` once drained.
    pub fn next_fragment(&mut self, max_len: usize) -> Option<&[u8]> {
        assert!(max_len > 0, "fragment budget must be positive");
        if self.done() {
            return None;
        }
        let end = (self.pos + max_len).min(self.bytes.len());
        let fragment = &self.bytes[self.pos..end];
        self.pos = end;
        Some(fragment)
    }

    pub fn done(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

impl Cuboid {
    /// Begin streaming this cuboid. The cursor owns the encoded form, so the
    /// cuboid itself may change (next tick) while a transfer is in flight.
    pub fn begin_serialize(&self) -> SerializeCursor {
        SerializeCursor::new(self)
    }
}

/// Receiver-side progress report.
#[derive(Debug)]
pub enum Progress {
    /// More fragments expected.
    InProgress,
    /// Payload complete; the reassembled cuboid.
    Complete(Box<Cuboid>),
}

/// Receiver-side cursor reassembling fragments into a cuboid.
#[derive(Debug, Default)]
pub struct DeserializeCursor {
    buf: Vec<u8>,
    expected: Option<usize>,
}

impl DeserializeCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one fragment. Returns `Complete` exactly once, on the fragment
    /// that fills the declared payload length.
    pub fn push_fragment(&mut self, fragment: &[u8]) -> Result<Progress, CodecError> {
        self.buf.extend_from_slice(fragment);

        if self.expected.is_none() && self.buf.len() >= LEN_HEADER {
            let len = u32::from_le_bytes(self.buf[..LEN_HEADER].try_into().unwrap()) as usize;
            self.expected = Some(len);
        }
        let Some(expected) = self.expected else {
            return Ok(Progress::InProgress);
        };

        let have = self.buf.len() - LEN_HEADER;
        if have < expected {
            return Ok(Progress::InProgress);
        }
        if have > expected {
            return Err(CodecError::Invalid(format!(
                "transfer overran declared payload length ({have} > {expected})"
            )));
        }
        tracing::trace!(bytes = expected, "cuboid transfer complete");
        let cuboid = Cuboid::decode_payload(&self.buf[LEN_HEADER..])?;
        Ok(Progress::Complete(Box::new(cuboid)))
    }

    /// Bytes received so far, header included.
    pub fn received(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockfield_common::{BlockType, LocalCoord};

    fn sample_cuboid() -> Cuboid {
        let mut c = Cuboid::all_air();
        for i in 0..16u8 {
            c.set_block_type(LocalCoord::new(i, 0, 0), BlockType::STONE);
            c.set_damage(LocalCoord::new(i, 1, 0), i);
        }
        c
    }

    #[test]
    fn roundtrip_in_small_fragments() {
        let original = sample_cuboid();
        let mut ser = original.begin_serialize();
        let mut de = DeserializeCursor::new();

        let mut result = None;
        while let Some(fragment) = ser.next_fragment(7) {
            match de.push_fragment(fragment).unwrap() {
                Progress::InProgress => {}
                Progress::Complete(c) => result = Some(c),
            }
        }
        assert!(ser.done());
        assert_eq!(*result.expect("transfer did not complete"), original);
    }

    #[test]
    fn roundtrip_in_one_fragment() {
        let original = sample_cuboid();
        let mut ser = original.begin_serialize();
        let total = ser.total_len();
        let mut de = DeserializeCursor::new();

        let fragment = ser.next_fragment(total).unwrap();
        match de.push_fragment(fragment).unwrap() {
            Progress::Complete(c) => assert_eq!(*c, original),
            Progress::InProgress => panic!("expected completion"),
        }
        assert!(ser.next_fragment(8).is_none());
    }

    #[test]
    fn stored_encumbrance_survives_transfer() {
        use blockfield_common::{Inventory, ItemType};

        let mut original = Cuboid::all_air();
        let at = LocalCoord::new(0, 0, 0);
        original.set_block_type(at, BlockType::CHEST);
        let mut inv = Inventory::new();
        inv.add(ItemType::STONE, 5);
        let expected = inv.encumbrance();
        original.set_inventory(at, Some(inv));

        let mut ser = original.begin_serialize();
        let mut de = DeserializeCursor::new();
        let mut result = None;
        while let Some(fragment) = ser.next_fragment(32) {
            if let Progress::Complete(c) = de.push_fragment(fragment).unwrap() {
                result = Some(c);
            }
        }
        let restored = result.unwrap();
        assert_eq!(restored.inventory(at).unwrap().encumbrance(), expected);
    }

    #[test]
    fn overrun_is_rejected() {
        let original = Cuboid::all_air();
        let mut ser = original.begin_serialize();
        let total = ser.total_len();
        let mut bytes = ser.next_fragment(total).unwrap().to_vec();
        bytes.push(0xff); // one byte past the declared length

        let mut de = DeserializeCursor::new();
        assert!(de.push_fragment(&bytes).is_err());
    }

    #[test]
    fn header_split_across_fragments() {
        let original = sample_cuboid();
        let mut ser = original.begin_serialize();
        let mut de = DeserializeCursor::new();
        // 2-byte fragments split even the length header.
        let mut result = None;
        while let Some(fragment) = ser.next_fragment(2) {
            if let Progress::Complete(c) = de.push_fragment(fragment).unwrap() {
                result = Some(c);
            }
        }
        assert_eq!(*result.unwrap(), original);
    }
}
