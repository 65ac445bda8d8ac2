use std::collections::{BTreeSet, HashMap};

use crate::chi::Flit;
use crate::error::PortError;

/// Context of outstanding reads, keyed by a tag from a free set. The stored
/// request flit supplies return routing and QoS when the downstream data
/// comes back.
#[derive(Debug)]
pub struct ReadInfoTable {
    free_tags: BTreeSet<u16>,
    entries: HashMap<u16, Flit>,
    capacity: usize,
}

impl ReadInfoTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            free_tags: (0..capacity as u16).collect(),
            entries: HashMap::new(),
            capacity,
        }
    }

    /// Record the request context under the smallest free tag.
    pub fn allocate(&mut self, req_flit: Flit) -> Result<u16, PortError> {
        let tag = *self
            .free_tags
            .iter()
            .next()
            .ok_or(PortError::FreeSetExhausted("read info table"))?;
        self.free_tags.remove(&tag);
        self.entries.insert(tag, req_flit);
        Ok(tag)
    }

    /// Remove the context on downstream completion, freeing the tag.
    pub fn take(&mut self, tag: u16) -> Result<Flit, PortError> {
        let flit = self
            .entries
            .remove(&tag)
            .ok_or(PortError::UnknownReadTag(tag))?;
        self.free_tags.insert(tag);
        Ok(flit)
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
        self.free_tags.len()
    }
}
