//! Bridge to the memory controller: drains the P2C FIFO into downstream
//! transactions and turns downstream completions back into CHI data flits
//! and buffer releases.

use log::debug;

use crate::chi::{read_data_phase, Channel, DatOpcode, Flit, CACHE_LINE_BYTES};
use crate::error::PortError;
use crate::mem::bus::{MemCommand, MemRequest, MemTag};
use crate::port::p2c::{BufferIndex, P2cEntry};
use crate::port::ChiPort;

impl ChiPort {
    /// Dispatch at most one staged request per cycle. Reads leave as soon as
    /// they reach the front; a write leaves only once every data beat has
    /// arrived in its buffer entry.
    pub(crate) fn p2c_drain(&mut self) {
        let Some(entry) = self.p2c.take_dispatchable(&self.wdata) else {
            return;
        };
        match entry.index {
            BufferIndex::ReadTag(tag) => self.dispatch_read(entry, tag),
            BufferIndex::Dbid(dbid) => self.dispatch_write(entry, dbid),
        }
    }

    fn dispatch_read(&mut self, entry: P2cEntry, tag: u16) {
        debug!("downstream read 0x{:x} tag {}", entry.address, tag);
        self.stats.mem_reads += 1;
        self.mem_tx.push_back(MemRequest {
            address: entry.address,
            command: MemCommand::Read,
            data: [0; CACHE_LINE_BYTES],
            byte_enable: !0,
            tag: MemTag {
                index: BufferIndex::ReadTag(tag),
                src_id: entry.src_id,
                qos: entry.qos,
                issued_at: self.cycle,
            },
        });
    }

    fn dispatch_write(&mut self, entry: P2cEntry, dbid: u16) {
        let line = self
            .wdata
            .line(dbid)
            .copied()
            .expect("dispatchable write lost its buffer entry");
        let collected = self
            .wdata
            .byte_enable(dbid)
            .expect("dispatchable write lost its buffer entry");
        // A zero write clears the whole line; anything else is bounded by
        // the bytes the data beats enabled within the addressed window.
        let byte_enable = if entry.zero_write {
            !0
        } else {
            collected & entry.payload.valid_bytes_mask()
        };
        debug!("downstream write 0x{:x} dbid {}", entry.address, dbid);
        self.stats.mem_writes += 1;
        self.mem_tx.push_back(MemRequest {
            address: entry.address,
            command: MemCommand::Write,
            data: line,
            byte_enable,
            tag: MemTag {
                index: BufferIndex::Dbid(dbid),
                src_id: entry.src_id,
                qos: entry.qos,
                issued_at: self.cycle,
            },
        });
    }

    /// Fold deferred downstream completions back into the port. Read data
    /// is spliced into the stored request context and emitted as one
    /// CompData flit per data-id of the addressed line; writes release
    /// their DBID.
    pub(crate) fn drain_mem_responses(&mut self) -> Result<(), PortError> {
        while let Some(resp) = self.mem_resp_rx.pop_front() {
            match resp.command {
                MemCommand::Read => {
                    let BufferIndex::ReadTag(tag) = resp.tag.index else {
                        return Err(PortError::MismatchedResponseTag);
                    };
                    let mut ctx = self.rdata.take(tag)?;
                    ctx.payload.data = resp.data;
                    let base = read_data_phase(&ctx.phase, DatOpcode::CompData);
                    for data_id in ctx.payload.data_ids(self.config.data_width_bytes()) {
                        let mut phase = base.clone();
                        phase.data_id = data_id;
                        self.stats.dat_flits += 1;
                        self.channel_mut(Channel::Dat)
                            .tx_queue
                            .push_back(Flit::new(ctx.payload.clone(), phase));
                    }
                }
                MemCommand::Write => {
                    let BufferIndex::Dbid(dbid) = resp.tag.index else {
                        return Err(PortError::MismatchedResponseTag);
                    };
                    self.wdata.release(dbid)?;
                }
            }
        }
        Ok(())
    }
}
