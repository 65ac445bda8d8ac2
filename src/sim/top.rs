use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::info;
use toml::Value;

use crate::chi::Flit;
use crate::error::PortError;
use crate::mem::{SimMemConfig, SimMemory};
use crate::port::{ChiPort, PortConfig};
use crate::sim::config::{Config, SimConfig};
use crate::Cycle;

#[derive(Debug, Default, Clone)]
pub struct PhononTopConfig {
    pub sim: SimConfig,
    pub port: PortConfig,
    pub mem: SimMemConfig,
}

impl PhononTopConfig {
    /// Load `[sim]`, `[port]` and `[mem]` sections; missing sections fall
    /// back to defaults.
    pub fn from_toml(path: &Path) -> Self {
        let text = fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("cannot read config {}: {e}", path.display()));
        let value: Value = text
            .parse()
            .unwrap_or_else(|e| panic!("cannot parse config {}: {e}", path.display()));
        Self {
            sim: SimConfig::from_section(value.get("sim")),
            port: PortConfig::from_section(value.get("port")),
            mem: SimMemConfig::from_section(value.get("mem")),
        }
    }
}

/// Top-level wiring: the port against the functional memory model. Flits
/// the port transmits toward the requester are collected in `peer_tx` for
/// whoever drives the stimulus.
pub struct PhononTop {
    pub port: ChiPort,
    pub mem: SimMemory,
    pub peer_tx: Vec<Flit>,
    pub timeout: u64,
    cycle: Cycle,
}

impl PhononTop {
    pub fn new(config: &PhononTopConfig) -> Self {
        Self {
            port: ChiPort::new(Arc::new(config.port.clone())),
            mem: SimMemory::new(config.mem),
            peer_tx: Vec::new(),
            timeout: config.sim.timeout,
            cycle: 0,
        }
    }

    /// One full clock: rising edge through the port, transaction exchange
    /// with the memory model, falling edge transmit.
    pub fn tick_one(&mut self) -> Result<(), PortError> {
        self.port.posedge()?;
        for req in self.port.take_mem_requests() {
            self.mem.push_request(self.cycle, req);
        }
        for resp in self.mem.tick(self.cycle) {
            self.port.push_mem_response(resp);
        }
        let sent = &mut self.peer_tx;
        self.port.negedge(|flit| sent.push(flit));
        self.cycle += 1;
        Ok(())
    }

    pub fn run(&mut self) -> Result<(), PortError> {
        for _ in 0..self.timeout {
            self.tick_one()?;
        }
        info!("simulation finished after {} cycles", self.cycle);
        Ok(())
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }
}
