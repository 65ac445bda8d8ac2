use crate::chi::opcodes::{Channel, DatOpcode, OrderMode, ReqOpcode, RespCode, RspOpcode};

pub const CACHE_LINE_BYTES: usize = 64;
pub const CACHE_LINE_ADDR_MASK: u64 = !(CACHE_LINE_BYTES as u64 - 1);

/// Data-carrying half of a flit. Owned by whichever queue currently holds
/// the flit; copies replace the shared, reference-counted payload pool of a
/// hardware implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub address: u64,
    /// log2 of the transaction size in bytes.
    pub size: u8,
    pub data: [u8; CACHE_LINE_BYTES],
    /// One bit per byte of the cache line.
    pub byte_enable: u64,
}

impl Payload {
    pub fn new(address: u64, size: u8) -> Self {
        Self {
            address,
            size,
            data: [0; CACHE_LINE_BYTES],
            byte_enable: !0,
        }
    }

    pub fn num_bytes(&self) -> u32 {
        1u32 << self.size
    }

    /// Bitmap of cache-line bytes the transaction addresses: the naturally
    /// aligned `2^size` window containing `address`.
    pub fn valid_bytes_mask(&self) -> u64 {
        let num_bytes = self.num_bytes() as usize;
        if num_bytes >= CACHE_LINE_BYTES {
            return !0;
        }
        let start = (self.address as usize & (CACHE_LINE_BYTES - 1)) & !(num_bytes - 1);
        ((1u64 << num_bytes) - 1) << start
    }

    /// Data-id of each beat covering the transaction window at the given
    /// data-path width. Data-ids name 16-byte chunks of the line.
    pub fn data_ids(&self, data_width_bytes: usize) -> Vec<u8> {
        debug_assert!(data_width_bytes >= 16 && data_width_bytes.is_power_of_two());
        let num_bytes = self.num_bytes() as usize;
        let start = (self.address as usize & (CACHE_LINE_BYTES - 1)) & !(data_width_bytes - 1);
        let beats = num_bytes.div_ceil(data_width_bytes).max(1);
        (0..beats)
            .map(|i| ((start + i * data_width_bytes) / 16) as u8)
            .collect()
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::new(0, 0)
    }
}

/// Control half of a flit. One struct covers all channels; fields that do
/// not apply to a channel stay at their defaults, the way a wire bundle
/// carries don't-care lanes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Phase {
    pub channel: Channel,
    pub req_opcode: ReqOpcode,
    pub rsp_opcode: RspOpcode,
    pub dat_opcode: DatOpcode,
    pub qos: u8,
    pub tgt_id: u16,
    pub src_id: u16,
    pub txn_id: u16,
    pub return_nid: u16,
    pub return_txn_id: u16,
    pub home_nid: u16,
    pub data_id: u8,
    pub dbid: u16,
    pub resp: RespCode,
    pub order: OrderMode,
    pub allow_retry: bool,
    /// Class index carried by PCrdGrant and echoed by the requester on the
    /// consuming request or a PCrdReturn.
    pub pcrd_type: u8,
    /// Link-credit return; not a real flit and does not consume a credit.
    pub lcrd: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flit {
    pub payload: Payload,
    pub phase: Phase,
}

impl Flit {
    pub fn new(payload: Payload, phase: Phase) -> Self {
        Self { payload, phase }
    }

    /// A dataless flit, as responses are.
    pub fn rsp(phase: Phase) -> Self {
        Self {
            payload: Payload::default(),
            phase,
        }
    }
}

/// Response phase derived from the request it answers. Routing mirrors the
/// request: the requester's source becomes the target, and the port names
/// itself as home node.
pub fn response_phase(req: &Phase, rsp_opcode: RspOpcode, dbid: u16) -> Phase {
    Phase {
        channel: Channel::Rsp,
        qos: req.qos,
        tgt_id: req.src_id,
        src_id: req.tgt_id,
        txn_id: req.txn_id,
        home_nid: req.tgt_id,
        rsp_opcode,
        dbid,
        ..Phase::default()
    }
}

/// Data phase for read return. Routed to the request's return node with the
/// return transaction id; `dbid` echoes the request's own txn id.
pub fn read_data_phase(req: &Phase, dat_opcode: DatOpcode) -> Phase {
    Phase {
        channel: Channel::Dat,
        qos: req.qos,
        tgt_id: req.return_nid,
        src_id: req.tgt_id,
        txn_id: req.return_txn_id,
        home_nid: req.src_id,
        dat_opcode,
        resp: RespCode::Uc,
        dbid: req.txn_id,
        ..Phase::default()
    }
}
