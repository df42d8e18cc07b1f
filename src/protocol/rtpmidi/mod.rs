//! RTP-MIDI payload codec.
//!
//! An RTP-MIDI payload follows the RTP header:
//!
//! ```text
//!   B|J|Z|P|LEN(4) [LEN-low(8) if B]   command section header
//!   [delta-time] command { delta-time command }
//!   [recovery journal if J]
//! ```
//!
//! The command section holds MIDI commands separated by base-128
//! delta-times. Status bytes may be omitted under running status.

pub mod delta_time;
mod decoder;
mod encoder;
mod journal;

#[cfg(test)]
mod tests;

pub use decoder::{MidiSink, RtpMidiDecoder};
pub use encoder::{CommandQueue, encode_packet, segment_sysex};
pub use journal::{ChannelJournal, RecoveryJournal, SystemJournal};

/// Long header: the length field spans 12 bits
pub const FLAG_B: u8 = 0x80;
/// A recovery journal follows the command section
pub const FLAG_J: u8 = 0x40;
/// The first command is preceded by a delta-time
pub const FLAG_Z: u8 = 0x20;
/// The first command's status byte was omitted (phantom)
pub const FLAG_P: u8 = 0x10;

/// Largest command section length the header can express
pub const MAX_SECTION_LEN: usize = 0x0FFF;
