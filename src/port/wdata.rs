use std::collections::{BTreeSet, HashMap};

use crate::chi::{Flit, CACHE_LINE_BYTES};
use crate::error::PortError;

/// One write in flight: a cache-line scratch area plus the number of data
/// beats still expected. The entry is ready for downstream dispatch once the
/// counter reaches zero.
#[derive(Debug)]
pub struct WdataEntry {
    data: [u8; CACHE_LINE_BYTES],
    byte_enable: u64,
    beat_count: u16,
}

impl WdataEntry {
    fn for_size(size_bytes: u32, data_width_bytes: usize) -> Self {
        let width = data_width_bytes as u32;
        let beat_count = if size_bytes <= width {
            1
        } else {
            (size_bytes / width) as u16
        };
        Self {
            data: [0xFF; CACHE_LINE_BYTES],
            byte_enable: 0,
            beat_count,
        }
    }

    /// Entry for a zero write: no beats will arrive and the line is all
    /// zeroes, ready from birth.
    fn zero_line() -> Self {
        Self {
            data: [0; CACHE_LINE_BYTES],
            byte_enable: !0,
            beat_count: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.beat_count == 0
    }
}

/// Pool of write-data slots addressed by DBID. A DBID is either in the free
/// set or in the entry map, never both and never neither.
#[derive(Debug)]
pub struct WriteDataBuffer {
    free_dbids: BTreeSet<u16>,
    entries: HashMap<u16, WdataEntry>,
    /// DBIDs of partial writes parked in the delay command queue.
    partial: BTreeSet<u16>,
    capacity: usize,
    data_width_bytes: usize,
}

impl WriteDataBuffer {
    pub fn new(capacity: usize, data_width_bytes: usize) -> Self {
        Self {
            free_dbids: (0..capacity as u16).collect(),
            entries: HashMap::new(),
            partial: BTreeSet::new(),
            capacity,
            data_width_bytes,
        }
    }

    /// Allocate the smallest free DBID and size the entry's beat counter for
    /// the request.
    pub fn allocate(&mut self, size_bytes: u32) -> Result<u16, PortError> {
        let dbid = self.pop_free()?;
        self.entries
            .insert(dbid, WdataEntry::for_size(size_bytes, self.data_width_bytes));
        Ok(dbid)
    }

    pub fn allocate_zero(&mut self) -> Result<u16, PortError> {
        let dbid = self.pop_free()?;
        self.entries.insert(dbid, WdataEntry::zero_line());
        Ok(dbid)
    }

    fn pop_free(&mut self) -> Result<u16, PortError> {
        let dbid = *self
            .free_dbids
            .iter()
            .next()
            .ok_or(PortError::FreeSetExhausted("write data buffer"))?;
        self.free_dbids.remove(&dbid);
        Ok(dbid)
    }

    pub fn mark_partial(&mut self, dbid: u16) {
        self.partial.insert(dbid);
    }

    pub fn clear_partial(&mut self, dbid: u16) {
        self.partial.remove(&dbid);
    }

    /// Account one write-data beat. The flit's txn id is the DBID handed out
    /// in the DBIDResp; the last beat carries the assembled line.
    pub fn receive_beat(&mut self, dat_flit: &Flit) -> Result<(), PortError> {
        let dbid = dat_flit.phase.txn_id;
        let entry = self
            .entries
            .get_mut(&dbid)
            .ok_or(PortError::UnknownDbid(dbid))?;
        if entry.beat_count == 0 {
            return Err(PortError::UnknownDbid(dbid));
        }
        entry.beat_count -= 1;
        entry.byte_enable |= dat_flit.payload.byte_enable;
        if entry.beat_count == 0 {
            entry.data = dat_flit.payload.data;
        }
        Ok(())
    }

    pub fn is_ready(&self, dbid: u16) -> bool {
        self.entries.get(&dbid).is_some_and(WdataEntry::is_ready)
    }

    pub fn line(&self, dbid: u16) -> Option<&[u8; CACHE_LINE_BYTES]> {
        self.entries.get(&dbid).map(|e| &e.data)
    }

    pub fn byte_enable(&self, dbid: u16) -> Option<u64> {
        self.entries.get(&dbid).map(|e| e.byte_enable)
    }

    /// Tear the entry down after downstream completion and return the DBID
    /// to the free set.
    pub fn release(&mut self, dbid: u16) -> Result<(), PortError> {
        self.entries
            .remove(&dbid)
            .ok_or(PortError::UnknownDbid(dbid))?;
        self.partial.remove(&dbid);
        self.free_dbids.insert(dbid);
        Ok(())
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

    #[cfg(test)]
    pub(crate) fn free_len(&self) -> usize {
        self.free_dbids.len()
    }
}
