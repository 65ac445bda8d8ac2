use std::collections::{HashMap, VecDeque};

use serde::Deserialize;

use crate::chi::{CACHE_LINE_ADDR_MASK, CACHE_LINE_BYTES};
use crate::mem::bus::{MemCommand, MemRequest, MemResponse};
use crate::sim::config::Config;
use crate::Cycle;

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SimMemConfig {
    /// Cycles between accepting a transaction and completing it.
    pub latency: Cycle,
}

impl Config for SimMemConfig {}

impl Default for SimMemConfig {
    fn default() -> Self {
        Self { latency: 20 }
    }
}

/// Functional stand-in for the memory controller: a line-granular backing
/// store behind a fixed-latency completion queue. No banking, no
/// scheduling; it answers in arrival order.
#[derive(Debug, Default)]
pub struct SimMemory {
    latency: Cycle,
    lines: HashMap<u64, [u8; CACHE_LINE_BYTES]>,
    inflight: VecDeque<(Cycle, MemRequest)>,
}

impl SimMemory {
    pub fn new(config: SimMemConfig) -> Self {
        Self {
            latency: config.latency,
            lines: HashMap::new(),
            inflight: VecDeque::new(),
        }
    }

    pub fn push_request(&mut self, now: Cycle, req: MemRequest) {
        self.inflight.push_back((now + self.latency, req));
    }

    /// Complete every transaction whose latency has elapsed.
    pub fn tick(&mut self, now: Cycle) -> Vec<MemResponse> {
        let mut done = Vec::new();
        while let Some((ready_at, _)) = self.inflight.front() {
            if *ready_at > now {
                break;
            }
            let (_, req) = self.inflight.pop_front().expect("front just checked");
            done.push(self.complete(req));
        }
        done
    }

    fn complete(&mut self, req: MemRequest) -> MemResponse {
        let line_addr = req.address & CACHE_LINE_ADDR_MASK;
        match req.command {
            MemCommand::Read => {
                let data = self
                    .lines
                    .get(&line_addr)
                    .copied()
                    .unwrap_or([0; CACHE_LINE_BYTES]);
                MemResponse {
                    command: MemCommand::Read,
                    data,
                    tag: req.tag,
                }
            }
            MemCommand::Write => {
                let line = self
                    .lines
                    .entry(line_addr)
                    .or_insert([0; CACHE_LINE_BYTES]);
                for i in 0..CACHE_LINE_BYTES {
                    if (req.byte_enable >> i) & 1 != 0 {
                        line[i] = req.data[i];
                    }
                }
                MemResponse {
                    command: MemCommand::Write,
                    data: [0; CACHE_LINE_BYTES],
                    tag: req.tag,
                }
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.inflight.len()
    }
}
