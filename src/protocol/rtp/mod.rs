//! RTP header handling for RTP-MIDI

mod packet;

#[cfg(test)]
mod tests;

pub use packet::{RtpDecodeError, RtpHeader};

/// RTP protocol constants for RTP-MIDI
pub mod constants {
    /// Dynamic payload type conventionally used for RTP-MIDI
    pub const PAYLOAD_TYPE_MIDI: u8 = 0x61;

    /// RTP version
    pub const VERSION: u8 = 2;

    /// RTP timestamp units per second (100 microsecond ticks)
    pub const CLOCK_RATE: u32 = 10_000;
}
