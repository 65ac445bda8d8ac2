use serde::Deserialize;

use crate::sim::config::Config;

pub const QOS_BUCKETS: usize = 4;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PortConfig {
    /// Width of the DAT channel; sets the number of data-id sub-beats per
    /// cache line.
    pub data_width_bits: usize,
    /// Capacity of the downstream admission FIFO.
    pub p2c_fifo_size: usize,
    /// Deferred-queue capacity for partial writes awaiting data.
    pub dcq_capacity: usize,
    /// Outstanding read slots.
    pub rdata_info_capacity: usize,
    /// Outstanding write slots.
    pub wdata_buffer_capacity: usize,
    /// RetryAck / PCrdGrant response queue.
    pub retry_queue_capacity: usize,
    /// CMO completion staging.
    pub cmo_resp_queue_capacity: usize,
    /// QoS bucket boundaries collapsing 0..15 into four severity levels.
    pub qos_med_threshold: u8,
    pub qos_high_threshold: u8,
    pub qos_veryhigh_threshold: u8,
    /// Admission QoS floors per class.
    pub rd_qos_threshold: u8,
    pub wr_qos_threshold: u8,
    /// Anti-starvation for low-QoS retries.
    pub qos_timeout_threshold: u32,
    /// Anti-starvation for per-class grant rotation.
    pub req_type_timeout_threshold: u32,
    /// Head-stall backpressure threshold of the delay command queue.
    pub dcq_timeout_cycles: u32,
    /// Width of the retry-matrix source axis.
    pub n_sources: usize,
    /// Per-channel link credit window.
    pub chi_max_link_credits: u32,
}

impl Config for PortConfig {}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            data_width_bits: 128,
            p2c_fifo_size: 32,
            dcq_capacity: 32,
            rdata_info_capacity: 128,
            wdata_buffer_capacity: 64,
            retry_queue_capacity: 32,
            cmo_resp_queue_capacity: 32,
            qos_med_threshold: 7,
            qos_high_threshold: 11,
            qos_veryhigh_threshold: 14,
            rd_qos_threshold: 0,
            wr_qos_threshold: 0,
            qos_timeout_threshold: 2,
            req_type_timeout_threshold: 3,
            dcq_timeout_cycles: 5,
            n_sources: 11,
            chi_max_link_credits: 15,
        }
    }
}

impl PortConfig {
    pub fn data_width_bytes(&self) -> usize {
        self.data_width_bits / 8
    }

    /// Collapse a raw QoS value (0..15) to its severity bucket (0..3).
    pub fn qos_bucket(&self, qos: u8) -> usize {
        if qos < self.qos_med_threshold {
            0
        } else if qos < self.qos_high_threshold {
            1
        } else if qos < self.qos_veryhigh_threshold {
            2
        } else {
            3
        }
    }
}
