use log::debug;

use crate::chi::{ReqClass, NUM_REQ_CLASSES};
use crate::error::PortError;
use crate::port::config::QOS_BUCKETS;
use crate::port::resource::Occupancy;

/// Which traffic class the grant rotator is currently serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantState {
    WriteGrant,
    ReadGrant,
    CmoGrant,
}

impl GrantState {
    pub fn class(self) -> ReqClass {
        match self {
            GrantState::WriteGrant => ReqClass::Write,
            GrantState::ReadGrant => ReqClass::Read,
            GrantState::CmoGrant => ReqClass::Cmo,
        }
    }

    fn next(self) -> GrantState {
        match self {
            GrantState::WriteGrant => GrantState::ReadGrant,
            GrantState::ReadGrant => GrantState::CmoGrant,
            GrantState::CmoGrant => GrantState::WriteGrant,
        }
    }
}

/// Outcome of one arbitration round: the matrix cell a PCrdGrant is minted
/// for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcrdGrant {
    pub class: ReqClass,
    pub bucket: usize,
    pub src_id: u16,
}

/// Retry bookkeeping and PCrdGrant arbitration.
///
/// The account matrix counts, per (class, QoS bucket, source), requests that
/// were answered with RetryAck and still await a credit. Each cycle the
/// enclosing port refreshes the per-class availability conditions from an
/// occupancy snapshot; when a grant can be minted, the rotator picks the
/// class, then the QoS bucket, then the source.
#[derive(Debug)]
pub struct RetryResourceManager {
    /// counts[class][bucket][source]
    counts: Vec<Vec<Vec<u32>>>,
    conditions: [bool; NUM_REQ_CLASSES],
    state: GrantState,
    /// Starvation age per class: grants minted for other classes while this
    /// class had pending retries.
    type_timeout: [u32; NUM_REQ_CLASSES],
    /// Grants that bypassed a populated lower QoS bucket, per class.
    qos_timeout: [u32; NUM_REQ_CLASSES],
    last_win_src: [usize; NUM_REQ_CLASSES],
    qos_timeout_threshold: u32,
    req_type_timeout_threshold: u32,
    n_sources: usize,
}

impl RetryResourceManager {
    pub fn new(n_sources: usize, qos_timeout_threshold: u32, req_type_timeout_threshold: u32) -> Self {
        Self {
            counts: vec![vec![vec![0; n_sources]; QOS_BUCKETS]; NUM_REQ_CLASSES],
            conditions: [false; NUM_REQ_CLASSES],
            state: GrantState::WriteGrant,
            type_timeout: [0; NUM_REQ_CLASSES],
            qos_timeout: [0; NUM_REQ_CLASSES],
            // First round-robin scan starts at source 0.
            last_win_src: [n_sources - 1; NUM_REQ_CLASSES],
            qos_timeout_threshold,
            req_type_timeout_threshold,
            n_sources,
        }
    }

    /// Account a denied request. Exactly one cell per RetryAck.
    pub fn record_retry(&mut self, class: ReqClass, bucket: usize, src_id: u16) -> Result<(), PortError> {
        if src_id as usize >= self.n_sources {
            return Err(PortError::SourceOutOfRange(src_id, self.n_sources));
        }
        self.counts[class.index()][bucket][src_id as usize] += 1;
        Ok(())
    }

    pub fn is_class_empty(&self, class: ReqClass) -> bool {
        self.counts[class.index()]
            .iter()
            .all(|bucket| bucket.iter().all(|&c| c == 0))
    }

    pub fn is_empty(&self) -> bool {
        ReqClass::ALL.iter().all(|&c| self.is_class_empty(c))
    }

    /// Highest populated QoS bucket of a class, None when the row is empty.
    pub fn class_max_bucket(&self, class: ReqClass) -> Option<usize> {
        (0..QOS_BUCKETS)
            .rev()
            .find(|&b| self.counts[class.index()][b].iter().any(|&c| c > 0))
    }

    pub fn row_total(&self, class: ReqClass) -> u32 {
        self.counts[class.index()]
            .iter()
            .map(|bucket| bucket.iter().sum::<u32>())
            .sum()
    }

    pub fn cell(&self, class: ReqClass, bucket: usize, src_id: u16) -> u32 {
        self.counts[class.index()][bucket][src_id as usize]
    }

    /// Refresh per-class availability against the cycle's occupancy. A class
    /// is available when it has pending retries, the Retry queue can still
    /// take a RetryAck plus a grant, and the resources its requests will
    /// claim have room left after counting promised credits.
    pub fn update_conditions(&mut self, occ: &Occupancy) {
        let headroom = occ.retry_has_headroom();
        self.conditions[ReqClass::Write.index()] = !self.is_class_empty(ReqClass::Write)
            && headroom
            && occ.crq_level < occ.crq_capacity
            && occ.p2c_len < occ.p2c_capacity
            && occ.dcq_level < occ.dcq_capacity
            && occ.wdq_level < occ.wdq_capacity;
        self.conditions[ReqClass::Read.index()] =
            !self.is_class_empty(ReqClass::Read) && headroom && occ.rdata_level < occ.rdata_capacity;
        self.conditions[ReqClass::Cmo.index()] =
            !self.is_class_empty(ReqClass::Cmo) && headroom && occ.crq_level < occ.crq_capacity;
    }

    pub fn condition(&self, class: ReqClass) -> bool {
        self.conditions[class.index()]
    }

    pub fn any_condition(&self) -> bool {
        self.conditions.iter().any(|&c| c)
    }

    pub fn state(&self) -> GrantState {
        self.state
    }

    /// One transition of the three-state rotator. The two rotation targets
    /// are tried in cyclic order; a target must be available, and wins on
    /// strictly higher retried QoS, on the sibling classes being unavailable,
    /// or on its starvation age crossing the threshold.
    fn advance_state(&mut self) {
        let s = self.state;
        let t1 = s.next();
        let t2 = t1.next();
        let cond = |t: GrantState| self.conditions[t.class().index()];
        let qmax = |t: GrantState| self.class_max_bucket(t.class());
        let age = |t: GrantState| self.type_timeout[t.class().index()];
        let threshold = self.req_type_timeout_threshold;

        let go_t1 = cond(t1)
            && ((qmax(t1) > qmax(s) && qmax(t1) > qmax(t2) && age(t2) < threshold)
                || (!cond(s) && !cond(t2))
                || age(t1) >= threshold);
        let go_t2 = !go_t1
            && cond(t2)
            && (qmax(t2) > qmax(s) || !cond(s) || age(t2) >= threshold);

        self.state = if go_t1 {
            t1
        } else if go_t2 {
            t2
        } else {
            s
        };
    }

    /// Normally the highest populated bucket wins; once enough grants have
    /// bypassed populated lower buckets, the lowest wins instead and the
    /// counter restarts.
    fn select_bucket(&mut self, class: ReqClass) -> Option<usize> {
        let row = &self.counts[class.index()];
        let populated = |b: &usize| row[*b].iter().any(|&c| c > 0);
        let highest = (0..QOS_BUCKETS).rev().find(populated);
        let lowest = (0..QOS_BUCKETS).find(populated);
        let timer = &mut self.qos_timeout[class.index()];
        if *timer >= self.qos_timeout_threshold {
            *timer = 0;
            lowest
        } else {
            if highest.is_some() && lowest < highest {
                *timer += 1;
            }
            highest
        }
    }

    /// Round-robin over sources inside the chosen bucket, carried per class.
    fn select_source(&mut self, class: ReqClass, bucket: usize) -> Option<u16> {
        let cells = &self.counts[class.index()][bucket];
        let last = self.last_win_src[class.index()];
        for i in 0..self.n_sources {
            let index = (last + 1 + i) % self.n_sources;
            if cells[index] > 0 {
                self.last_win_src[class.index()] = index;
                return Some(index as u16);
            }
        }
        None
    }

    /// Run one arbitration round and debit the winning cell. Returns None
    /// only if the rotator landed on a class with nothing pending, which the
    /// availability conditions should rule out.
    pub fn next_grant(&mut self) -> Option<PcrdGrant> {
        self.advance_state();
        let class = self.state.class();
        let bucket = self.select_bucket(class)?;
        let src_id = self.select_source(class, bucket)?;
        self.counts[class.index()][bucket][src_id as usize] -= 1;

        for k in ReqClass::ALL {
            if k == class || self.is_class_empty(k) {
                self.type_timeout[k.index()] = 0;
            } else {
                self.type_timeout[k.index()] += 1;
            }
        }

        debug!("pcrd grant minted: {class:?} bucket {bucket} src {src_id}");
        Some(PcrdGrant {
            class,
            bucket,
            src_id,
        })
    }
}
