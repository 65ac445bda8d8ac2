use thiserror::Error;

use crate::chi::{Channel, DatOpcode, ReqOpcode};

/// Fatal conditions raised by the port. Admission denial is not an error;
/// it is answered with a RetryAck on the response channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("flit received on inactive channel {0:?}")]
    InactiveChannel(Channel),

    #[error("link credit underflow on channel {0:?}")]
    CreditUnderflow(Channel),

    #[error("request opcode {0:?} cannot be decoded by this port")]
    UnexpectedReqOpcode(ReqOpcode),

    #[error("unexpected data opcode {0:?} on the DAT channel")]
    UnexpectedDatOpcode(DatOpcode),

    #[error("write data flit for unallocated dbid {0}")]
    UnknownDbid(u16),

    #[error("downstream read response for unallocated tag {0}")]
    UnknownReadTag(u16),

    #[error("downstream response tag does not match its command")]
    MismatchedResponseTag,

    #[error("{0} free set exhausted; admission let a request through a full pool")]
    FreeSetExhausted(&'static str),

    #[error("retry source id {0} outside the configured range of {1} sources")]
    SourceOutOfRange(u16, usize),

    #[error("delay queue grant raised with no ready head entry")]
    DcqGrantWithoutHead,
}
