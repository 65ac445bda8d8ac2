pub mod admission;
pub mod bridge;
pub mod config;
pub mod dcq;
pub mod p2c;
pub mod rdata;
pub mod resource;
pub mod response;
pub mod retry;
pub mod stats;
pub mod wdata;

#[cfg(test)]
mod unit_tests;

pub use config::PortConfig;
pub use p2c::{BufferIndex, P2cEntry, P2cFifo};
pub use resource::{Occupancy, PcreditPool};
pub use response::{CmoResponseQueue, ResponseQueues, RspQueue};
pub use retry::{GrantState, PcrdGrant, RetryResourceManager};
pub use stats::PortStats;

use std::collections::VecDeque;
use std::sync::Arc;

use crate::chi::{
    Channel, DatOpcode, Flit, LinkChannel, Phase, ReqClass, RspOpcode, NUM_CHANNELS,
};
use crate::error::PortError;
use crate::mem::bus::{MemRequest, MemResponse};
use crate::port::dcq::DelayCommandQueue;
use crate::port::rdata::ReadInfoTable;
use crate::port::wdata::WriteDataBuffer;
use crate::Cycle;

/// CHI target port in front of a memory controller.
///
/// The port is a clocked reactive module: the peer deposits flits and the
/// downstream model deposits completions at any time, but state only moves
/// at `posedge` (consume, decide, schedule) and `negedge` (transmit).
pub struct ChiPort {
    pub(crate) config: Arc<PortConfig>,
    pub(crate) cycle: Cycle,
    channels: [LinkChannel; NUM_CHANNELS],

    /// Request pipeline: decode stage queue, decision stage queue, and the
    /// grant bits carried between them.
    pub(crate) rx_s1: VecDeque<Flit>,
    pub(crate) rx_s2: VecDeque<Flit>,
    pub(crate) grant_s1: bool,
    pub(crate) grant_s2: bool,
    pub(crate) grant_dcq_s1: bool,
    pub(crate) grant_dcq_s2: bool,

    /// RSP flit picked by the arbiter, promoted onto the TX queue one cycle
    /// later.
    pub(crate) rsp_flit_pending: Option<Flit>,

    pub(crate) rsp_queues: ResponseQueues,
    pub(crate) retry_mgr: RetryResourceManager,
    pub(crate) credits: PcreditPool,
    pub(crate) wdata: WriteDataBuffer,
    pub(crate) rdata: ReadInfoTable,
    pub(crate) dcq: DelayCommandQueue,
    pub(crate) cmo_resp: CmoResponseQueue,
    pub(crate) p2c: P2cFifo,

    /// Downstream transactions awaiting pickup by the controller model.
    pub(crate) mem_tx: VecDeque<MemRequest>,
    /// Controller completions deferred to the next rising edge.
    pub(crate) mem_resp_rx: VecDeque<MemResponse>,

    /// Node id the port answers with; learned from the first request flit.
    pub(crate) src_id: Option<u16>,
    pub(crate) stats: PortStats,
}

impl ChiPort {
    pub fn new(config: Arc<PortConfig>) -> Self {
        let max_credits = config.chi_max_link_credits;
        let mut channels = [
            LinkChannel::new(Channel::Req, true, max_credits),
            LinkChannel::new(Channel::Rsp, true, max_credits),
            LinkChannel::new(Channel::Snp, false, max_credits),
            LinkChannel::new(Channel::Dat, true, max_credits),
        ];
        // The peer needs credits from the start to send requests and write
        // data; the first falling edge puts them on the wire.
        channels[Channel::Req as usize].rx_credits_update();
        channels[Channel::Dat as usize].rx_credits_update();
        Self {
            cycle: 0,
            channels,
            rx_s1: VecDeque::new(),
            rx_s2: VecDeque::new(),
            grant_s1: false,
            grant_s2: false,
            grant_dcq_s1: false,
            grant_dcq_s2: false,
            rsp_flit_pending: None,
            rsp_queues: ResponseQueues::new(config.retry_queue_capacity),
            retry_mgr: RetryResourceManager::new(
                config.n_sources,
                config.qos_timeout_threshold,
                config.req_type_timeout_threshold,
            ),
            credits: PcreditPool::default(),
            wdata: WriteDataBuffer::new(config.wdata_buffer_capacity, config.data_width_bytes()),
            rdata: ReadInfoTable::new(config.rdata_info_capacity),
            dcq: DelayCommandQueue::new(config.dcq_capacity, config.dcq_timeout_cycles),
            cmo_resp: CmoResponseQueue::new(config.cmo_resp_queue_capacity),
            p2c: P2cFifo::new(config.p2c_fifo_size),
            mem_tx: VecDeque::new(),
            mem_resp_rx: VecDeque::new(),
            src_id: None,
            stats: PortStats::default(),
            config,
        }
    }

    /// Peer-facing flit delivery; only touches the channel RX queues.
    pub fn receive_flit(&mut self, flit: Flit) -> Result<(), PortError> {
        let channel = flit.phase.channel;
        self.channels[channel as usize].receive_flit(flit)
    }

    /// Downstream completion delivery; deferred to the next rising edge.
    pub fn push_mem_response(&mut self, resp: MemResponse) {
        self.mem_resp_rx.push_back(resp);
    }

    /// Hand the queued downstream transactions to the controller model.
    pub fn take_mem_requests(&mut self) -> Vec<MemRequest> {
        self.mem_tx.drain(..).collect()
    }

    /// Rising edge. Order matters: completions free resources before the
    /// conditions that read them; the response arbiter runs before a new
    /// grant can be minted; the decision stage consumes last cycle's decode
    /// verdict before decode looks at the next request.
    pub fn posedge(&mut self) -> Result<(), PortError> {
        self.cycle += 1;
        self.drain_mem_responses()?;

        self.channels[Channel::Req as usize].rx_credits_update();
        self.channels[Channel::Dat as usize].rx_credits_update();

        if let Some(flit) = self.rsp_flit_pending.take() {
            self.stats.rsp_flits += 1;
            self.channels[Channel::Rsp as usize].tx_queue.push_back(flit);
        }
        // A grant minted last cycle joins the Retry queue now, unless last
        // cycle also issued a RetryAck; then it waits one cycle more.
        self.merge_pcrd_slot();
        if let Some(queue) = self.rsp_queues.arbitrate() {
            let flit = self
                .rsp_queues
                .pop(queue)
                .expect("arbiter picked an empty queue");
            if queue == RspQueue::Crp {
                self.cmo_resp.release(flit.phase.txn_id);
            }
            self.rsp_flit_pending = Some(flit);
        }

        self.dcq.check_ready(&mut self.wdata);

        let occ = self.occupancy();
        self.retry_mgr.update_conditions(&occ);
        self.mint_pcrd_grant();

        self.drain_dat_rx()?;

        self.p2c_drain();
        self.decision_stage()?;
        self.sync_retry_watermarks();
        self.decode_stage()?;
        self.intf_stage();
        Ok(())
    }

    /// Falling edge: issue fresh link credits and transmit queued flits,
    /// peer credit permitting.
    pub fn negedge<F: FnMut(Flit)>(&mut self, mut send: F) {
        for channel in [Channel::Req, Channel::Rsp, Channel::Dat] {
            self.channels[channel as usize].send_flits(&mut send);
        }
    }

    /// Promised resource levels visible to retry arbitration this cycle.
    fn occupancy(&self) -> Occupancy {
        let wr = self.credits.count(ReqClass::Write) as usize;
        let rd = self.credits.count(ReqClass::Read) as usize;
        let cmo = self.credits.count(ReqClass::Cmo) as usize;
        Occupancy {
            retry_queue_free: self.rsp_queues.retry_free(),
            p2c_len: self.p2c.len(),
            p2c_capacity: self.p2c.capacity(),
            dcq_level: self.dcq.len() + wr,
            dcq_capacity: self.dcq.capacity(),
            wdq_level: self.wdata.len() + wr,
            wdq_capacity: self.wdata.capacity(),
            crq_level: self.cmo_resp.len() + cmo,
            crq_capacity: self.cmo_resp.capacity(),
            rdata_level: self.rdata.len() + rd,
            rdata_capacity: self.rdata.capacity(),
        }
    }

    /// Mint at most one PCrdGrant into the holding slot.
    fn mint_pcrd_grant(&mut self) {
        if self.rsp_queues.pcrd_slot_occupied()
            || self.retry_mgr.is_empty()
            || !self.retry_mgr.any_condition()
        {
            return;
        }
        if let Some(grant) = self.retry_mgr.next_grant() {
            let phase = Phase {
                channel: Channel::Rsp,
                rsp_opcode: RspOpcode::PCrdGrant,
                qos: grant.bucket as u8,
                tgt_id: grant.src_id,
                src_id: self.src_id.unwrap_or(0),
                pcrd_type: grant.class.index() as u8,
                ..Phase::default()
            };
            self.rsp_queues.set_pcrd(Flit::rsp(phase));
            self.credits.grant(grant.class);
            self.stats.count_granted(grant.class);
        }
    }

    /// Move the held PCrdGrant onto the Retry queue, unless the previous
    /// cycle issued a RetryAck; then only clear the hazard and keep the
    /// slot one cycle longer.
    fn merge_pcrd_slot(&mut self) {
        if !self.rsp_queues.blocked {
            if let Some(flit) = self.rsp_queues.take_pcrd() {
                self.rsp_queues.push(RspQueue::Retry, flit);
            }
        } else {
            self.rsp_queues.blocked = false;
        }
    }

    /// A class with no retried requests left has no "highest retried QoS".
    fn sync_retry_watermarks(&mut self) {
        for class in ReqClass::ALL {
            if self.retry_mgr.is_class_empty(class) {
                self.rsp_queues.clear_retry_qos(class);
            }
        }
    }

    /// At most one DAT flit is consumed per cycle.
    fn drain_dat_rx(&mut self) -> Result<(), PortError> {
        if let Some(dat) = self.channels[Channel::Dat as usize].rx_queue.pop_front() {
            match dat.phase.dat_opcode {
                DatOpcode::NonCopyBackWrData
                | DatOpcode::NcbWrDataCompAck
                | DatOpcode::WriteDataCancel => self.wdata.receive_beat(&dat)?,
                other => return Err(PortError::UnexpectedDatOpcode(other)),
            }
        }
        Ok(())
    }

    pub fn channel(&self, channel: Channel) -> &LinkChannel {
        &self.channels[channel as usize]
    }

    pub fn channel_mut(&mut self, channel: Channel) -> &mut LinkChannel {
        &mut self.channels[channel as usize]
    }

    pub fn stats(&self) -> &PortStats {
        &self.stats
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }
}
