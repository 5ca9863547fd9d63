//! Cuboid transfer framing over the store's resumable cursors.
//!
//! A transfer is one `Start` announcing the cuboid address followed by
//! `Fragment`s in order. The receiver enforces the protocol shape; payload
//! integrity (declared length, decode) is enforced by the store cursor.

use blockfield_common::{CodecError, CuboidAddr};
use blockfield_store::{Cuboid, DeserializeCursor, Progress, SerializeCursor};

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("fragment received before start")]
    OutOfOrder,
    #[error("transfer already complete")]
    AlreadyComplete,
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// One message of the transfer protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferMessage {
    Start { addr: CuboidAddr },
    Fragment { bytes: Vec<u8> },
}

/// Sender side: drains one cuboid into messages under a fragment budget.
#[derive(Debug)]
pub struct OutboundTransfer {
    addr: CuboidAddr,
    cursor: SerializeCursor,
    started: bool,
}

impl OutboundTransfer {
    pub fn new(addr: CuboidAddr, cuboid: &Cuboid) -> Self {
        Self {
            addr,
            cursor: cuboid.begin_serialize(),
            started: false,
        }
    }

    pub fn addr(&self) -> CuboidAddr {
        self.addr
    }

    /// Total bytes this transfer will send, excluding protocol framing.
    pub fn total_len(&self) -> usize {
        self.cursor.total_len()
    }

    /// The next message, or `None` once drained. The first call yields
    /// `Start`; later calls yield fragments of at most `max_fragment` bytes.
    pub fn next_message(&mut self, max_fragment: usize) -> Option<TransferMessage> {
        if !self.started {
            self.started = true;
            return Some(TransferMessage::Start { addr: self.addr });
        }
        self.cursor
            .next_fragment(max_fragment)
            .map(|bytes| TransferMessage::Fragment {
                bytes: bytes.to_vec(),
            })
    }

    pub fn done(&self) -> bool {
        self.started && self.cursor.done()
    }
}

/// Receiver side: reassembles messages back into an addressed cuboid.
#[derive(Debug, Default)]
pub struct InboundTransfer {
    addr: Option<CuboidAddr>,
    cursor: DeserializeCursor,
    complete: bool,
}

impl InboundTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one message. Returns the reassembled cuboid with its address
    /// exactly once, on the final fragment.
    pub fn accept(
        &mut self,
        message: TransferMessage,
    ) -> Result<Option<(CuboidAddr, Cuboid)>, TransferError> {
        if self.complete {
            return Err(TransferError::AlreadyComplete);
        }
        match message {
            TransferMessage::Start { addr } => {
                if self.addr.is_some() {
                    return Err(TransferError::AlreadyComplete);
                }
                tracing::trace!(?addr, "cuboid transfer started");
                self.addr = Some(addr);
                Ok(None)
            }
            TransferMessage::Fragment { bytes } => {
                let Some(addr) = self.addr else {
                    return Err(TransferError::OutOfOrder);
                };
                match self.cursor.push_fragment(&bytes)? {
                    Progress::InProgress => Ok(None),
                    Progress::Complete(cuboid) => {
                        self.complete = true;
                        Ok(Some((addr, *cuboid)))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockfield_common::{BlockType, LocalCoord};

    fn sample_cuboid() -> Cuboid {
        let mut c = Cuboid::all_air();
        c.set_block_type(LocalCoord::new(3, 4, 5), BlockType::CHEST);
        c.set_logic(LocalCoord::new(6, 7, 8), 9);
        c
    }

    #[test]
    fn full_transfer_roundtrips() {
        let original = sample_cuboid();
        let addr = CuboidAddr::new(2, -1, 0);
        let mut out = OutboundTransfer::new(addr, &original);
        let mut inbound = InboundTransfer::new();

        let mut result = None;
        while let Some(msg) = out.next_message(16) {
            if let Some(done) = inbound.accept(msg).unwrap() {
                result = Some(done);
            }
        }
        assert!(out.done());
        let (got_addr, got) = result.expect("transfer did not complete");
        assert_eq!(got_addr, addr);
        assert_eq!(got, original);
    }

    #[test]
    fn fragment_before_start_is_rejected() {
        let mut inbound = InboundTransfer::new();
        let err = inbound
            .accept(TransferMessage::Fragment { bytes: vec![0; 4] })
            .unwrap_err();
        assert!(matches!(err, TransferError::OutOfOrder));
    }

    #[test]
    fn messages_after_completion_are_rejected() {
        let original = sample_cuboid();
        let addr = CuboidAddr::new(0, 0, 0);
        let mut out = OutboundTransfer::new(addr, &original);
        let mut inbound = InboundTransfer::new();
        let budget = out.total_len();
        while let Some(msg) = out.next_message(budget) {
            inbound.accept(msg).unwrap();
        }
        let err = inbound
            .accept(TransferMessage::Fragment { bytes: vec![0] })
            .unwrap_err();
        assert!(matches!(err, TransferError::AlreadyComplete));
    }
}
