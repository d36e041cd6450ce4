//! flan-protocol
//!
//! Wire-level surface of the FLAN protocol:
//! - packet header parsing + validation (version, size, temperature, TTL, checksum)
//! - the status-code taxonomy and the outcome → code mapping
//!
//! Pure deterministic logic. No IO, no clock, no shared state.

mod packet;
mod status;

pub use packet::{
    checksum, validate, PacketError, PacketErrorKind, PacketHeader, PacketLimits, RequestType,
    SealOptions, ValidPacket, PROTOCOL_VERSION,
};
pub use status::{map, Outcome, StatusClass, StatusCode, StatusLine};

/// Protocol banner carried in every response envelope.
pub const PROTOCOL_NAME: &str = "FLAN/1.0";
