//! Request pipeline: interface, decode and decision stages, plus the
//! per-class admission predicates. Each stage moves at most one request per
//! cycle; the grant bits computed by decode are consumed by decision on the
//! following rising edge.

use log::debug;
use num_traits::FromPrimitive;

use crate::chi::{
    response_phase, Channel, Flit, OrderMode, ReqClass, ReqOpcode, RspOpcode,
};
use crate::error::PortError;
use crate::port::p2c::{BufferIndex, P2cEntry};
use crate::port::response::RspQueue;
use crate::port::ChiPort;

impl ChiPort {
    /// Pull one flit off the REQ channel into the decode queue.
    pub(crate) fn intf_stage(&mut self) {
        if let Some(flit) = self.channel_mut(Channel::Req).rx_queue.pop_front() {
            if self.src_id.is_none() {
                self.src_id = Some(flit.phase.tgt_id);
            }
            self.rx_s1.push_back(flit);
        }
    }

    /// Decode stage: classify the request and evaluate its admission
    /// predicate into `grant_s1`. Credit returns and prefetch hints are
    /// absorbed here and never enter the decision stage.
    pub(crate) fn decode_stage(&mut self) -> Result<(), PortError> {
        if let Some(flit) = self.rx_s1.pop_front() {
            match flit.phase.req_opcode {
                ReqOpcode::ReadNoSnp | ReqOpcode::ReadNoSnpSep => {
                    self.grant_s1 = self.admit_read(&flit);
                    self.rx_s2.push_back(flit);
                }
                ReqOpcode::WriteNoSnpPtl => {
                    self.grant_s1 = self.admit_write_partial(&flit);
                    self.rx_s2.push_back(flit);
                }
                ReqOpcode::WriteNoSnpFull | ReqOpcode::WriteNoSnpZero => {
                    self.grant_s1 = self.admit_write_full(&flit);
                    self.rx_s2.push_back(flit);
                }
                ReqOpcode::CleanShared | ReqOpcode::CleanSharedPersist => {
                    self.grant_s1 = self.admit_cmo(&flit);
                    self.rx_s2.push_back(flit);
                }
                ReqOpcode::PCrdReturn => self.handle_pcrd_return(&flit),
                ReqOpcode::PrefetchTgt => {
                    self.stats.prefetch_dropped += 1;
                    debug!("prefetch hint from src {} dropped", flit.phase.src_id);
                }
                other => return Err(PortError::UnexpectedReqOpcode(other)),
            }
        }

        // A granted request and a ready delay-queue entry contend for the
        // single P2C enqueue slot per cycle; the incoming request wins.
        if !self.grant_s1 {
            if !self.dcq.is_ready() {
                self.grant_dcq_s1 = false;
                return Ok(());
            }
            let req = self.channel(Channel::Req);
            let in_flight = (req.max_credits() - req.rx_credits_available()) as usize;
            self.grant_dcq_s1 = self.p2c.free_slots() >= in_flight;
        }
        Ok(())
    }

    /// Decision stage: act on last cycle's verdict. Grants allocate the
    /// buffer entry, stage the downstream record and queue the response;
    /// denials answer RetryAck and charge the retry account.
    pub(crate) fn decision_stage(&mut self) -> Result<(), PortError> {
        self.grant_s2 = self.grant_s1;
        self.grant_dcq_s2 = self.grant_dcq_s1;
        self.grant_s1 = false;
        self.grant_dcq_s1 = false;

        if let Some(flit) = self.rx_s2.pop_front() {
            if self.grant_s2 {
                self.admit(flit)?;
            } else {
                self.deny(flit)?;
            }
        }

        if self.grant_dcq_s2 {
            let (dbid, flit) = self
                .dcq
                .head()
                .cloned()
                .ok_or(PortError::DcqGrantWithoutHead)?;
            let rsp = response_phase(&flit.phase, RspOpcode::Comp, 0);
            self.rsp_queues.push(RspQueue::Comp, Flit::rsp(rsp));
            self.p2c.push(P2cEntry::new(&flit, BufferIndex::Dbid(dbid)));
            self.dcq.pop();
        }
        Ok(())
    }

    fn admit(&mut self, flit: Flit) -> Result<(), PortError> {
        let opcode = flit.phase.req_opcode;
        let class = opcode
            .class()
            .ok_or(PortError::UnexpectedReqOpcode(opcode))?;
        // A non-retryable request spends the credit previously promised to
        // its source.
        if !flit.phase.allow_retry {
            self.credits.consume(class);
        }
        self.stats.count_admitted(class);

        match opcode {
            ReqOpcode::WriteNoSnpPtl => {
                let dbid = self.wdata.allocate(flit.payload.num_bytes())?;
                self.wdata.mark_partial(dbid);
                let rsp = response_phase(&flit.phase, RspOpcode::DbidResp, dbid);
                debug!(
                    "admit WriteNoSnpPtl src {} txn {} -> dbid {}",
                    flit.phase.src_id, flit.phase.txn_id, dbid
                );
                self.dcq.push(dbid, flit);
                self.rsp_queues.push(RspQueue::Dbid, Flit::rsp(rsp));
            }
            ReqOpcode::WriteNoSnpFull => {
                let dbid = self.wdata.allocate(flit.payload.num_bytes())?;
                let rsp = response_phase(&flit.phase, RspOpcode::CompDbidResp, dbid);
                self.p2c.push(P2cEntry::new(&flit, BufferIndex::Dbid(dbid)));
                self.rsp_queues.push(RspQueue::Dbid, Flit::rsp(rsp));
            }
            ReqOpcode::WriteNoSnpZero => {
                let dbid = self.wdata.allocate_zero()?;
                let rsp = response_phase(&flit.phase, RspOpcode::Comp, 0);
                self.p2c.push(P2cEntry::zero(&flit, BufferIndex::Dbid(dbid)));
                self.rsp_queues.push(RspQueue::Crp, Flit::rsp(rsp));
            }
            ReqOpcode::ReadNoSnp | ReqOpcode::ReadNoSnpSep => {
                let receipt = (opcode == ReqOpcode::ReadNoSnp
                    && flit.phase.order == OrderMode::RequestAccepted)
                    .then(|| response_phase(&flit.phase, RspOpcode::ReadReceipt, 0));
                let tag = self.rdata.allocate(flit.clone())?;
                self.p2c.push(P2cEntry::new(&flit, BufferIndex::ReadTag(tag)));
                if let Some(phase) = receipt {
                    self.rsp_queues.push(RspQueue::Req, Flit::rsp(phase));
                }
            }
            ReqOpcode::CleanShared | ReqOpcode::CleanSharedPersist => {
                let rsp = response_phase(&flit.phase, RspOpcode::Comp, 0);
                self.cmo_resp.insert(flit.phase.txn_id, flit);
                self.rsp_queues.push(RspQueue::Crp, Flit::rsp(rsp));
            }
            other => return Err(PortError::UnexpectedReqOpcode(other)),
        }
        Ok(())
    }

    fn deny(&mut self, flit: Flit) -> Result<(), PortError> {
        let opcode = flit.phase.req_opcode;
        let class = opcode
            .class()
            .ok_or(PortError::UnexpectedReqOpcode(opcode))?;
        let mut rsp = response_phase(&flit.phase, RspOpcode::RetryAck, 0);
        rsp.pcrd_type = class.index() as u8;
        self.rsp_queues.push(RspQueue::Retry, Flit::rsp(rsp));
        self.rsp_queues.blocked = true;

        let bucket = self.config.qos_bucket(flit.phase.qos);
        self.retry_mgr
            .record_retry(class, bucket, flit.phase.src_id)?;
        self.rsp_queues.note_retry_qos(class, flit.phase.qos);
        self.stats.count_retried(class);
        debug!(
            "retry {:?} src {} qos {} (bucket {})",
            class, flit.phase.src_id, flit.phase.qos, bucket
        );
        Ok(())
    }

    fn admit_read(&self, flit: &Flit) -> bool {
        if !flit.phase.allow_retry {
            return true;
        }
        let qos = flit.phase.qos;
        if qos < self.config.rd_qos_threshold {
            return false;
        }
        // Don't slip a borderline read past older retried reads when the
        // pools are nearly drained and retries are still being answered.
        let behind_retries = self
            .rsp_queues
            .max_retried_qos(ReqClass::Read)
            .is_some_and(|m| qos <= m);
        let near_full = self.p2c.len() + 1 >= self.p2c.capacity()
            || self.rdata.len() + 1 >= self.rdata.capacity();
        if behind_retries && near_full && self.rsp_queues.queue_len(RspQueue::Retry) != 0 {
            return false;
        }
        if self.rdata.len() >= self.rdata.capacity() {
            return false;
        }
        // The last slot is reserved while a read retry awaits its credit.
        if self.rdata.len() + 1 == self.rdata.capacity()
            && !self.retry_mgr.is_class_empty(ReqClass::Read)
        {
            return false;
        }
        if self.dcq.is_timed_out() {
            return false;
        }
        true
    }

    fn admit_write_partial(&self, flit: &Flit) -> bool {
        if !flit.phase.allow_retry {
            return true;
        }
        let qos = flit.phase.qos;
        let wr_retry_outstanding = !self.retry_mgr.is_class_empty(ReqClass::Write);
        if self.dcq.len() >= self.dcq.capacity() {
            return false;
        }
        if self.dcq.len() + 1 == self.dcq.capacity() && wr_retry_outstanding {
            return false;
        }
        if qos < self.config.wr_qos_threshold {
            return false;
        }
        if self
            .rsp_queues
            .max_retried_qos(ReqClass::Write)
            .is_some_and(|m| qos <= m)
        {
            return false;
        }
        if self.wdata.len() >= self.wdata.capacity() {
            return false;
        }
        if self.wdata.len() + 1 == self.wdata.capacity() && wr_retry_outstanding {
            return false;
        }
        true
    }

    fn admit_write_full(&self, flit: &Flit) -> bool {
        if !flit.phase.allow_retry {
            return true;
        }
        let qos = flit.phase.qos;
        let wr_retry_outstanding = !self.retry_mgr.is_class_empty(ReqClass::Write);
        if qos < self.config.wr_qos_threshold {
            return false;
        }
        if self
            .rsp_queues
            .max_retried_qos(ReqClass::Write)
            .is_some_and(|m| qos <= m)
        {
            return false;
        }
        if self.wdata.len() >= self.wdata.capacity() {
            return false;
        }
        if self.wdata.len() + 1 == self.wdata.capacity() && wr_retry_outstanding {
            return false;
        }
        if self.dcq.is_timed_out() {
            return false;
        }
        true
    }

    fn admit_cmo(&self, flit: &Flit) -> bool {
        if !flit.phase.allow_retry {
            return true;
        }
        if self.cmo_resp.len() >= self.cmo_resp.capacity() {
            return false;
        }
        if self.cmo_resp.len() + 1 == self.cmo_resp.capacity()
            && !self.retry_mgr.is_class_empty(ReqClass::Cmo)
        {
            return false;
        }
        if self
            .rsp_queues
            .max_retried_qos(ReqClass::Cmo)
            .is_some_and(|m| flit.phase.qos <= m)
        {
            return false;
        }
        true
    }

    /// The peer hands back a credit it will not use.
    fn handle_pcrd_return(&mut self, flit: &Flit) {
        match ReqClass::from_u8(flit.phase.pcrd_type) {
            Some(class) => {
                debug!("pcrd return for {class:?} from src {}", flit.phase.src_id);
                self.credits.consume(class);
            }
            None => debug!(
                "pcrd return with unknown type {} ignored",
                flit.phase.pcrd_type
            ),
        }
    }
}
