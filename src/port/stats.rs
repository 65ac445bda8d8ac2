use log::info;

use crate::chi::{ReqClass, NUM_REQ_CLASSES};

/// Running totals kept by the port, reported at end of simulation.
#[derive(Debug, Default, Clone)]
pub struct PortStats {
    pub admitted: [u64; NUM_REQ_CLASSES],
    pub retried: [u64; NUM_REQ_CLASSES],
    pub pcrd_granted: [u64; NUM_REQ_CLASSES],
    pub rsp_flits: u64,
    pub dat_flits: u64,
    pub mem_reads: u64,
    pub mem_writes: u64,
    pub prefetch_dropped: u64,
}

impl PortStats {
    pub fn count_admitted(&mut self, class: ReqClass) {
        self.admitted[class.index()] += 1;
    }

    pub fn count_retried(&mut self, class: ReqClass) {
        self.retried[class.index()] += 1;
    }

    pub fn count_granted(&mut self, class: ReqClass) {
        self.pcrd_granted[class.index()] += 1;
    }

    pub fn log_summary(&self) {
        for class in ReqClass::ALL {
            let i = class.index();
            info!(
                "{:?}: admitted {} retried {} granted {}",
                class, self.admitted[i], self.retried[i], self.pcrd_granted[i]
            );
        }
        info!(
            "rsp flits {} dat flits {} mem reads {} mem writes {} prefetch dropped {}",
            self.rsp_flits, self.dat_flits, self.mem_reads, self.mem_writes, self.prefetch_dropped
        );
    }
}
