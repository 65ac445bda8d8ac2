pub mod flit;
pub mod link;
pub mod opcodes;

pub use flit::{
    read_data_phase, response_phase, Flit, Payload, Phase, CACHE_LINE_ADDR_MASK, CACHE_LINE_BYTES,
};
pub use link::LinkChannel;
pub use opcodes::{
    Channel, DatOpcode, OrderMode, ReqClass, ReqOpcode, RespCode, RspOpcode, NUM_CHANNELS,
    NUM_REQ_CLASSES,
};
