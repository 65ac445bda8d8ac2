use log::debug;

use crate::chi::{ReqClass, NUM_REQ_CLASSES};

/// Outstanding P-credits per class: promises made through PCrdGrant that the
/// requester has not yet spent on a non-retryable request (or handed back
/// with PCrdReturn).
#[derive(Debug, Default)]
pub struct PcreditPool {
    counts: [u32; NUM_REQ_CLASSES],
}

impl PcreditPool {
    pub fn grant(&mut self, class: ReqClass) {
        self.counts[class.index()] += 1;
    }

    /// Spend one promised credit. A consume with nothing outstanding means
    /// the requester sent a non-retryable request the port never entitled;
    /// the port stays defensive and only logs it.
    pub fn consume(&mut self, class: ReqClass) {
        let count = &mut self.counts[class.index()];
        if *count == 0 {
            debug!("p-credit consume for {class:?} with none outstanding");
            return;
        }
        *count -= 1;
    }

    pub fn count(&self, class: ReqClass) -> u32 {
        self.counts[class.index()]
    }
}

/// Occupancy snapshot handed to retry-condition evaluation each cycle.
/// Levels fold outstanding P-credits into the raw queue sizes: a promised
/// slot is as good as taken.
#[derive(Debug, Clone, Copy)]
pub struct Occupancy {
    pub retry_queue_free: usize,
    pub p2c_len: usize,
    pub p2c_capacity: usize,
    pub dcq_level: usize,
    pub dcq_capacity: usize,
    pub wdq_level: usize,
    pub wdq_capacity: usize,
    pub crq_level: usize,
    pub crq_capacity: usize,
    pub rdata_level: usize,
    pub rdata_capacity: usize,
}

impl Occupancy {
    pub fn retry_has_headroom(&self) -> bool {
        self.retry_queue_free >= 2
    }
}
