use super::{cmo_req, default_port, port_with, read_req, run_collect, tick, wdat_beat, write_req};
use crate::chi::{Channel, Flit, Payload, Phase, ReqClass, ReqOpcode, RspOpcode, CACHE_LINE_BYTES};
use crate::mem::bus::{MemCommand, MemResponse};
use crate::port::PortConfig;

#[test]
fn qos_floor_denies_and_buckets_the_retry() {
    let config = PortConfig {
        rd_qos_threshold: 5,
        ..PortConfig::default()
    };
    let mut port = port_with(config);
    port.receive_flit(read_req(2, 1, 0x00, 4, true)).unwrap();
    tick(&mut port, 3);
    assert_eq!(port.stats().retried[ReqClass::Read.index()], 1);
    // QoS 4 sits under the medium threshold: bucket 0, source 2.
    assert_eq!(port.retry_mgr.cell(ReqClass::Read, 0, 2), 1);
    assert_eq!(port.rsp_queues.max_retried_qos(ReqClass::Read), Some(4));
}

#[test]
fn non_retryable_request_ignores_predicates() {
    let config = PortConfig {
        rd_qos_threshold: 5,
        ..PortConfig::default()
    };
    let mut port = port_with(config);
    port.receive_flit(read_req(0, 1, 0x00, 4, false)).unwrap();
    tick(&mut port, 3);
    assert_eq!(port.stats().admitted[ReqClass::Read.index()], 1);
    assert_eq!(port.stats().retried[ReqClass::Read.index()], 0);
}

/// Park a ready delay-queue head behind a stream of granted reads until the
/// head-stall timeout fires, then let `victim` decode on the first
/// timed-out cycle. The timeout is transient by design: once the stream
/// pauses, the head drains and the flag clears, so the victim is aligned to
/// decode exactly while the flag holds.
fn stall_dcq_then(port: &mut crate::port::ChiPort, victim: Flit) {
    // Partial write on a 512-bit data path: one beat completes it.
    port.receive_flit(write_req(ReqOpcode::WriteNoSnpPtl, 0, 100, 0x100, 8, true))
        .unwrap();
    tick(port, 3);
    port.receive_flit(wdat_beat(0, 0xCD, !0)).unwrap();
    // Four reads own the P2C enqueue slot on the cycles after the head is
    // promoted, running the stall counter past its threshold of 2.
    for i in 0..4u16 {
        port.receive_flit(read_req(0, 101 + i, 0x1000 + u64::from(i) * 64, 8, true))
            .unwrap();
        port.posedge().unwrap();
    }
    port.receive_flit(victim).unwrap();
    tick(port, 2);
    assert!(port.dcq.is_timed_out());
    // Decision records the denial on the next edge.
    tick(port, 1);
}

#[test]
fn dcq_timeout_denies_full_writes() {
    let config = PortConfig {
        data_width_bits: 512,
        dcq_timeout_cycles: 2,
        ..PortConfig::default()
    };
    let mut port = port_with(config);
    stall_dcq_then(
        &mut port,
        write_req(ReqOpcode::WriteNoSnpFull, 0, 200, 0x200, 8, true),
    );
    assert_eq!(port.stats().retried[ReqClass::Write.index()], 1);
}

#[test]
fn dcq_timeout_denies_reads() {
    let config = PortConfig {
        data_width_bits: 512,
        dcq_timeout_cycles: 2,
        ..PortConfig::default()
    };
    let mut port = port_with(config);
    stall_dcq_then(&mut port, read_req(0, 201, 0x2000, 8, true));
    assert_eq!(port.stats().retried[ReqClass::Read.index()], 1);
    // Only the four stalling reads made it through.
    assert_eq!(port.stats().admitted[ReqClass::Read.index()], 4);
}

#[test]
fn cmo_completes_through_the_crp_queue() {
    let mut port = default_port();
    port.receive_flit(cmo_req(0, 5, 0x400, 8, true)).unwrap();
    tick(&mut port, 3);
    assert_eq!(port.cmo_resp.len(), 1);
    assert_eq!(port.stats().admitted[ReqClass::Cmo.index()], 1);

    let sent = run_collect(&mut port, 3);
    let comps: Vec<_> = sent
        .iter()
        .filter(|f| f.phase.rsp_opcode == RspOpcode::Comp)
        .collect();
    assert_eq!(comps.len(), 1);
    assert_eq!(comps[0].phase.txn_id, 5);
    // Staging entry released once the Comp left through the arbiter.
    assert_eq!(port.cmo_resp.len(), 0);
    // Dateless: nothing goes downstream.
    assert!(port.take_mem_requests().is_empty());
}

#[test]
fn full_cmo_staging_denies_retryable_cmos() {
    let config = PortConfig {
        cmo_resp_queue_capacity: 1,
        ..PortConfig::default()
    };
    let mut port = port_with(config);
    // Two CMOs back to back: the second decodes while the first still
    // occupies the staging slot.
    port.receive_flit(cmo_req(0, 1, 0x000, 8, true)).unwrap();
    port.receive_flit(cmo_req(0, 2, 0x040, 8, true)).unwrap();
    tick(&mut port, 4);
    assert_eq!(port.stats().admitted[ReqClass::Cmo.index()], 1);
    assert_eq!(port.stats().retried[ReqClass::Cmo.index()], 1);
}

#[test]
fn pcrd_return_hands_back_an_unused_credit() {
    let config = PortConfig {
        rdata_info_capacity: 1,
        n_sources: 2,
        ..PortConfig::default()
    };
    let mut port = port_with(config);
    port.receive_flit(read_req(0, 1, 0x00, 8, false)).unwrap();
    tick(&mut port, 4);
    let filler = port.take_mem_requests();

    port.receive_flit(read_req(0, 2, 0x40, 8, true)).unwrap();
    tick(&mut port, 3);
    port.push_mem_response(MemResponse {
        command: MemCommand::Read,
        data: [0; CACHE_LINE_BYTES],
        tag: filler[0].tag,
    });
    port.posedge().unwrap();
    assert_eq!(port.credits.count(ReqClass::Read), 1);

    let pcrd_return = Flit::new(
        Payload::new(0, 0),
        Phase {
            channel: Channel::Req,
            req_opcode: ReqOpcode::PCrdReturn,
            src_id: 0,
            tgt_id: 42,
            pcrd_type: ReqClass::Read.index() as u8,
            ..Phase::default()
        },
    );
    port.receive_flit(pcrd_return).unwrap();
    tick(&mut port, 2);
    assert_eq!(port.credits.count(ReqClass::Read), 0);
    // Nothing was admitted or answered for the return itself.
    assert_eq!(port.stats().admitted[ReqClass::Read.index()], 1);
}

#[test]
fn prefetch_hint_is_counted_and_dropped() {
    let mut port = default_port();
    let hint = Flit::new(
        Payload::new(0x800, 6),
        Phase {
            channel: Channel::Req,
            req_opcode: ReqOpcode::PrefetchTgt,
            src_id: 0,
            tgt_id: 42,
            ..Phase::default()
        },
    );
    port.receive_flit(hint).unwrap();
    let sent = run_collect(&mut port, 4);
    assert_eq!(port.stats().prefetch_dropped, 1);
    assert!(sent.is_empty());
    assert!(port.take_mem_requests().is_empty());
    assert_eq!(port.stats().admitted, [0, 0, 0]);
}

#[test]
fn retry_watermark_clears_when_the_account_drains() {
    let config = PortConfig {
        rd_qos_threshold: 5,
        n_sources: 2,
        ..PortConfig::default()
    };
    let mut port = port_with(config);
    port.receive_flit(read_req(0, 1, 0x00, 3, true)).unwrap();
    tick(&mut port, 3);
    assert_eq!(port.rsp_queues.max_retried_qos(ReqClass::Read), Some(3));

    // Plenty of read slots, so the grant is minted on the next edge and
    // the account row empties; the watermark follows.
    tick(&mut port, 2);
    assert!(port.retry_mgr.is_class_empty(ReqClass::Read));
    assert_eq!(port.rsp_queues.max_retried_qos(ReqClass::Read), None);
}
