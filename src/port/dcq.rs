use std::collections::BTreeMap;

use crate::chi::Flit;
use crate::port::wdata::WriteDataBuffer;

/// Delay command queue: partial writes that were admitted but whose data
/// beats have not all arrived. Entries wait in a DBID-keyed map; one entry
/// at a time is promoted to the head slot once its write buffer is ready,
/// from where the admission pipeline drains it downstream.
///
/// A head entry that nobody drains (the pipeline keeps granting incoming
/// requests) drives the timeout, which backpressures reads and full writes
/// until the head moves.
#[derive(Debug)]
pub struct DelayCommandQueue {
    waiting: BTreeMap<u16, Flit>,
    head: Option<(u16, Flit)>,
    has_ready: bool,
    timed_out: bool,
    timeout_counter: u32,
    timeout_cycles: u32,
    capacity: usize,
}

impl DelayCommandQueue {
    pub fn new(capacity: usize, timeout_cycles: u32) -> Self {
        Self {
            waiting: BTreeMap::new(),
            head: None,
            has_ready: false,
            timed_out: false,
            timeout_counter: 0,
            timeout_cycles,
            capacity,
        }
    }

    pub fn push(&mut self, dbid: u16, req_flit: Flit) {
        self.waiting.insert(dbid, req_flit);
    }

    /// Rising-edge scan. While a promoted entry sits undrained the timeout
    /// counter runs; otherwise the first waiting entry (in DBID order) whose
    /// write buffer is complete moves to the head.
    pub fn check_ready(&mut self, wdata: &mut WriteDataBuffer) {
        self.timed_out = self.timeout_counter > self.timeout_cycles;
        if self.has_ready || self.head.is_some() {
            if !self.timed_out {
                self.timeout_counter += 1;
            }
            return;
        }
        let ready = self
            .waiting
            .iter()
            .find(|(dbid, _)| wdata.is_ready(**dbid))
            .map(|(dbid, _)| *dbid);
        if let Some(dbid) = ready {
            let flit = self.waiting.remove(&dbid).expect("ready entry vanished");
            wdata.clear_partial(dbid);
            self.head = Some((dbid, flit));
            self.has_ready = true;
        }
    }

    pub fn head(&self) -> Option<&(u16, Flit)> {
        self.head.as_ref()
    }

    /// Drain the head; resets the timeout machinery.
    pub fn pop(&mut self) {
        self.head = None;
        self.has_ready = false;
        self.timed_out = false;
        self.timeout_counter = 0;
    }

    pub fn is_ready(&self) -> bool {
        self.has_ready
    }

    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    /// Entries still waiting for data, head excluded.
    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
