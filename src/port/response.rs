use std::collections::{HashMap, VecDeque};

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::chi::{Flit, ReqClass, NUM_REQ_CLASSES};

/// Purpose of a response FIFO. One winner per cycle across all five.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum RspQueue {
    /// DBIDResp for partial writes, CompDBIDResp for full writes.
    Dbid = 0,
    /// Comp for CMOs and zero writes.
    Crp = 1,
    /// Comp emitted when a delay-queue entry reaches the head.
    Comp = 2,
    /// ReadReceipt for order-requesting reads.
    Req = 3,
    /// RetryAck and PCrdGrant.
    Retry = 4,
}

pub const NUM_RSP_QUEUES: usize = 5;

/// The five response FIFOs, the PCrdGrant holding slot, and the round-robin
/// arbiter state.
///
/// The holding slot decouples PCrdGrant minting from the Retry queue so a
/// RetryAck issued in the same cycle always reaches the requester first;
/// `blocked` marks that hazard for one cycle.
#[derive(Debug)]
pub struct ResponseQueues {
    queues: [VecDeque<Flit>; NUM_RSP_QUEUES],
    pcrd_slot: Option<Flit>,
    winner: usize,
    pub blocked: bool,
    retry_capacity: usize,
    /// Highest raw QoS among currently retried requests, per class. Cleared
    /// when the class's retry account drains.
    max_retried_qos: [Option<u8>; NUM_REQ_CLASSES],
}

impl ResponseQueues {
    pub fn new(retry_capacity: usize) -> Self {
        Self {
            queues: Default::default(),
            pcrd_slot: None,
            // First arbitration scan starts at queue 0.
            winner: NUM_RSP_QUEUES - 1,
            blocked: false,
            retry_capacity,
            max_retried_qos: [None; NUM_REQ_CLASSES],
        }
    }

    pub fn has_pending(&self) -> bool {
        self.queues.iter().any(|q| !q.is_empty())
    }

    /// Round-robin pick: scan from one past the previous winner, take the
    /// first non-empty queue.
    pub fn arbitrate(&mut self) -> Option<RspQueue> {
        for i in 0..NUM_RSP_QUEUES {
            let index = (self.winner + 1 + i) % NUM_RSP_QUEUES;
            if !self.queues[index].is_empty() {
                self.winner = index;
                return RspQueue::from_usize(index);
            }
        }
        None
    }

    pub fn push(&mut self, queue: RspQueue, flit: Flit) {
        self.queues[queue as usize].push_back(flit);
    }

    pub fn pop(&mut self, queue: RspQueue) -> Option<Flit> {
        self.queues[queue as usize].pop_front()
    }

    pub fn queue_len(&self, queue: RspQueue) -> usize {
        self.queues[queue as usize].len()
    }

    pub fn retry_free(&self) -> usize {
        self.retry_capacity - self.queues[RspQueue::Retry as usize].len()
    }

    /// Room for at least one RetryAck plus the PCrdGrant that answers it.
    pub fn retry_has_headroom(&self) -> bool {
        self.retry_free() >= 2
    }

    pub fn pcrd_slot_occupied(&self) -> bool {
        self.pcrd_slot.is_some()
    }

    pub fn set_pcrd(&mut self, flit: Flit) {
        debug_assert!(self.pcrd_slot.is_none(), "pcrd holding slot overwritten");
        self.pcrd_slot = Some(flit);
    }

    pub fn take_pcrd(&mut self) -> Option<Flit> {
        self.pcrd_slot.take()
    }

    pub fn note_retry_qos(&mut self, class: ReqClass, qos: u8) {
        let slot = &mut self.max_retried_qos[class.index()];
        *slot = Some(slot.map_or(qos, |m| m.max(qos)));
    }

    pub fn clear_retry_qos(&mut self, class: ReqClass) {
        self.max_retried_qos[class.index()] = None;
    }

    pub fn max_retried_qos(&self, class: ReqClass) -> Option<u8> {
        self.max_retried_qos[class.index()]
    }
}

/// Staging for CMO completions: the admitted flit parks here, keyed by its
/// transaction id, until the Comp response actually leaves through the
/// arbiter. Occupancy of this map is what CMO admission measures.
#[derive(Debug)]
pub struct CmoResponseQueue {
    entries: HashMap<u16, Flit>,
    capacity: usize,
}

impl CmoResponseQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
        }
    }

    pub fn insert(&mut self, txn_id: u16, flit: Flit) {
        debug_assert!(
            self.entries.len() < self.capacity,
            "cmo staging queue overrun"
        );
        self.entries.insert(txn_id, flit);
    }

    /// Idempotent: Comp flits for zero writes share the CRP queue but have
    /// no staging entry.
    pub fn release(&mut self, txn_id: u16) {
        self.entries.remove(&txn_id);
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chi::{Phase, RspOpcode};

    fn rsp(op: RspOpcode) -> Flit {
        Flit::rsp(Phase {
            rsp_opcode: op,
            ..Phase::default()
        })
    }

    #[test]
    fn arbiter_rotates_across_nonempty_queues() {
        let mut rq = ResponseQueues::new(8);
        rq.push(RspQueue::Dbid, rsp(RspOpcode::CompDbidResp));
        rq.push(RspQueue::Comp, rsp(RspOpcode::Comp));
        rq.push(RspQueue::Retry, rsp(RspOpcode::RetryAck));

        assert_eq!(rq.arbitrate(), Some(RspQueue::Dbid));
        rq.pop(RspQueue::Dbid).unwrap();
        assert_eq!(rq.arbitrate(), Some(RspQueue::Comp));
        rq.pop(RspQueue::Comp).unwrap();
        assert_eq!(rq.arbitrate(), Some(RspQueue::Retry));
        rq.pop(RspQueue::Retry).unwrap();
        assert_eq!(rq.arbitrate(), None);
    }

    #[test]
    fn arbiter_resumes_past_the_previous_winner() {
        let mut rq = ResponseQueues::new(8);
        rq.push(RspQueue::Dbid, rsp(RspOpcode::CompDbidResp));
        rq.push(RspQueue::Dbid, rsp(RspOpcode::CompDbidResp));
        rq.push(RspQueue::Req, rsp(RspOpcode::ReadReceipt));

        assert_eq!(rq.arbitrate(), Some(RspQueue::Dbid));
        // Scan starts after Dbid, so Req wins even though Dbid is non-empty.
        assert_eq!(rq.arbitrate(), Some(RspQueue::Req));
        rq.pop(RspQueue::Req).unwrap();
        assert_eq!(rq.arbitrate(), Some(RspQueue::Dbid));
    }

    #[test]
    fn retry_headroom_tracks_configured_capacity() {
        let mut rq = ResponseQueues::new(3);
        assert!(rq.retry_has_headroom());
        rq.push(RspQueue::Retry, rsp(RspOpcode::RetryAck));
        assert!(rq.retry_has_headroom());
        rq.push(RspQueue::Retry, rsp(RspOpcode::RetryAck));
        assert!(!rq.retry_has_headroom());
    }

    #[test]
    fn qos_watermark_raises_and_clears() {
        let mut rq = ResponseQueues::new(8);
        assert_eq!(rq.max_retried_qos(ReqClass::Read), None);
        rq.note_retry_qos(ReqClass::Read, 5);
        rq.note_retry_qos(ReqClass::Read, 9);
        rq.note_retry_qos(ReqClass::Read, 7);
        assert_eq!(rq.max_retried_qos(ReqClass::Read), Some(9));
        assert_eq!(rq.max_retried_qos(ReqClass::Write), None);
        rq.clear_retry_qos(ReqClass::Read);
        assert_eq!(rq.max_retried_qos(ReqClass::Read), None);
    }

    #[test]
    fn pcrd_slot_holds_one_flit() {
        let mut rq = ResponseQueues::new(8);
        assert!(!rq.pcrd_slot_occupied());
        rq.set_pcrd(rsp(RspOpcode::PCrdGrant));
        assert!(rq.pcrd_slot_occupied());
        assert!(rq.take_pcrd().is_some());
        assert!(rq.take_pcrd().is_none());
    }
}
