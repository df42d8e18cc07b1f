//! MIDI 1.0 messages as carried in RTP-MIDI command sections.
//!
//! [`MidiMessage`] is the typed form handed to applications and accepted
//! for sending. [`MidiParser`] rebuilds messages from the byte frames the
//! RTP-MIDI decoder emits, reassembling segmented System Exclusive data.

mod message;
mod parser;
pub mod status;


pub use message::{MidiMessage, RunningStatus};
pub use parser::MidiParser;
