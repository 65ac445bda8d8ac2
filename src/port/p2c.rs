use std::collections::VecDeque;

use crate::chi::{Flit, Payload};
use crate::port::wdata::WriteDataBuffer;

/// Handle into the buffer pool backing an admitted request. The variant is
/// the request's direction, so an entry can never be read with the wrong
/// pool's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferIndex {
    Dbid(u16),
    ReadTag(u16),
}

impl BufferIndex {
    pub fn is_write(self) -> bool {
        matches!(self, BufferIndex::Dbid(_))
    }
}

/// Admission record staged for the memory controller: everything the bridge
/// needs to compose the downstream transaction.
#[derive(Debug, Clone)]
pub struct P2cEntry {
    pub address: u64,
    pub num_bytes: u32,
    pub qos: u8,
    pub src_id: u16,
    pub index: BufferIndex,
    pub zero_write: bool,
    pub payload: Payload,
}

impl P2cEntry {
    pub fn new(req_flit: &Flit, index: BufferIndex) -> Self {
        Self {
            address: req_flit.payload.address,
            num_bytes: req_flit.payload.num_bytes(),
            qos: req_flit.phase.qos,
            src_id: req_flit.phase.src_id,
            index,
            zero_write: false,
            payload: req_flit.payload.clone(),
        }
    }

    pub fn zero(req_flit: &Flit, index: BufferIndex) -> Self {
        Self {
            zero_write: true,
            ..P2cEntry::new(req_flit, index)
        }
    }
}

/// Staging FIFO of admitted requests awaiting downstream dispatch.
#[derive(Debug)]
pub struct P2cFifo {
    entries: VecDeque<P2cEntry>,
    capacity: usize,
}

impl P2cFifo {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn push(&mut self, entry: P2cEntry) {
        debug_assert!(self.entries.len() < self.capacity, "p2c fifo overrun");
        self.entries.push_back(entry);
    }

    /// Pull the oldest dispatchable entry: reads go at once, writes only
    /// once their data buffer is complete. Later writes may overtake a
    /// stalled one, reads always may.
    pub fn take_dispatchable(&mut self, wdata: &WriteDataBuffer) -> Option<P2cEntry> {
        let pos = self.entries.iter().position(|entry| match entry.index {
            BufferIndex::ReadTag(_) => true,
            BufferIndex::Dbid(dbid) => wdata.is_ready(dbid),
        })?;
        self.entries.remove(pos)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free_slots(&self) -> usize {
        self.capacity - self.entries.len()
    }
}
