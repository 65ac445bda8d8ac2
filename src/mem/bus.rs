use crate::chi::CACHE_LINE_BYTES;
use crate::port::p2c::BufferIndex;
use crate::Cycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemCommand {
    Read,
    Write,
}

/// Side-band context riding every downstream transaction; echoed verbatim in
/// the response so the port can find the originating buffer entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemTag {
    pub index: BufferIndex,
    pub src_id: u16,
    pub qos: u8,
    pub issued_at: Cycle,
}

/// Generic memory transaction toward the controller. Length is always one
/// cache line; sub-line semantics live in the byte-enable bitmap.
#[derive(Debug, Clone)]
pub struct MemRequest {
    pub address: u64,
    pub command: MemCommand,
    pub data: [u8; CACHE_LINE_BYTES],
    pub byte_enable: u64,
    pub tag: MemTag,
}

/// Controller's completion. Reads carry the full line; writes only return
/// the tag.
#[derive(Debug, Clone)]
pub struct MemResponse {
    pub command: MemCommand,
    pub data: [u8; CACHE_LINE_BYTES],
    pub tag: MemTag,
}
