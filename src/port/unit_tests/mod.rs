#[cfg(test)]
mod admission_tests;
#[cfg(test)]
mod hazard_tests;

use std::sync::Arc;

use crate::chi::{Channel, DatOpcode, Flit, Payload, Phase, ReqOpcode, CACHE_LINE_BYTES};
use crate::port::{ChiPort, PortConfig};

pub(crate) fn port_with(config: PortConfig) -> ChiPort {
    let mut port = ChiPort::new(Arc::new(config));
    // Stand in for the requester's link layer: unlimited credit toward it.
    port.channel_mut(Channel::Rsp).grant_tx_credits(1000);
    port.channel_mut(Channel::Dat).grant_tx_credits(1000);
    port
}

pub(crate) fn default_port() -> ChiPort {
    port_with(PortConfig::default())
}

pub(crate) fn read_req(src_id: u16, txn_id: u16, address: u64, qos: u8, allow_retry: bool) -> Flit {
    Flit::new(
        Payload::new(address, 6),
        Phase {
            channel: Channel::Req,
            req_opcode: ReqOpcode::ReadNoSnp,
            src_id,
            txn_id,
            tgt_id: 42,
            return_nid: src_id,
            return_txn_id: txn_id,
            qos,
            allow_retry,
            ..Phase::default()
        },
    )
}

pub(crate) fn write_req(
    opcode: ReqOpcode,
    src_id: u16,
    txn_id: u16,
    address: u64,
    qos: u8,
    allow_retry: bool,
) -> Flit {
    Flit::new(
        Payload::new(address, 6),
        Phase {
            channel: Channel::Req,
            req_opcode: opcode,
            src_id,
            txn_id,
            tgt_id: 42,
            qos,
            allow_retry,
            ..Phase::default()
        },
    )
}

pub(crate) fn cmo_req(src_id: u16, txn_id: u16, address: u64, qos: u8, allow_retry: bool) -> Flit {
    Flit::new(
        Payload::new(address, 6),
        Phase {
            channel: Channel::Req,
            req_opcode: ReqOpcode::CleanShared,
            src_id,
            txn_id,
            tgt_id: 42,
            qos,
            allow_retry,
            ..Phase::default()
        },
    )
}

pub(crate) fn wdat_beat(dbid: u16, fill: u8, byte_enable: u64) -> Flit {
    let mut payload = Payload::new(0, 6);
    payload.data = [fill; CACHE_LINE_BYTES];
    payload.byte_enable = byte_enable;
    Flit::new(
        payload,
        Phase {
            channel: Channel::Dat,
            dat_opcode: DatOpcode::NonCopyBackWrData,
            txn_id: dbid,
            ..Phase::default()
        },
    )
}

pub(crate) fn tick(port: &mut ChiPort, cycles: usize) {
    for _ in 0..cycles {
        port.posedge().expect("posedge failed");
    }
}

/// Run the falling edge and return the real flits sent toward the peer.
pub(crate) fn drain_tx(port: &mut ChiPort) -> Vec<Flit> {
    let mut sent = Vec::new();
    port.negedge(|flit| sent.push(flit));
    sent.retain(|flit| !flit.phase.lcrd);
    sent
}

/// Run full clocks and collect everything the port transmits.
pub(crate) fn run_collect(port: &mut ChiPort, cycles: usize) -> Vec<Flit> {
    let mut all = Vec::new();
    for _ in 0..cycles {
        port.posedge().expect("posedge failed");
        all.extend(drain_tx(port));
    }
    all
}
