//! `AppleMIDI` session control datagrams.
//!
//! Every datagram starts with the signature `0xFFFF` and a two-letter
//! ASCII command:
//!
//! ```text
//!   IN / OK / NO   version(4) token(4) ssrc(4) name... NUL
//!   CK             ssrc(4) count(1) pad(3) ts0(8) ts1(8) ts2(8)
//!   RS             ssrc(4) sequence(2) reserved(2)
//!   RL             ssrc(4) limit(4)
//!   BY             version(4) token(4) ssrc(4)
//! ```
//!
//! All integers are big-endian.

mod message;


pub use message::{
    BitrateReceiveLimit, Command, ControlMessage, EndSession, Invitation, ReceiverFeedback,
    Synchronization,
};
pub(crate) use message::truncate_name;

/// Leading two bytes of every control datagram
pub const SIGNATURE: [u8; 2] = [0xFF, 0xFF];

/// Protocol version carried by invitations and end-session messages
pub const PROTOCOL_VERSION: u32 = 2;

/// Length of signature plus command code
pub const HEADER_SIZE: usize = 4;

/// Check whether a buffer starts with the control-message signature
#[must_use]
pub fn has_signature(buf: &[u8]) -> bool {
    buf.starts_with(&SIGNATURE)
}
