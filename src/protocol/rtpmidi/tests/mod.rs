
use crate::protocol::ParseError;
use crate::protocol::rtp::RtpHeader;
use crate::protocol::rtpmidi::{MidiSink, RecoveryJournal, RtpMidiDecoder};

/// Records everything the decoder surfaces
#[derive(Debug, Default)]
pub(super) struct Frames {
    pub headers: Vec<RtpHeader>,
    pub journals: Vec<RecoveryJournal>,
    pub frames: Vec<Vec<u8>>,
    current: Vec<u8>,
}

impl MidiSink for Frames {
    fn rtp_header(&mut self, header: &RtpHeader) {
        self.headers.push(*header);
    }

    fn journal(&mut self, journal: &RecoveryJournal) {
        self.journals.push(journal.clone());
    }

    fn start_midi(&mut self) {
        self.current.clear();
    }

    fn midi_byte(&mut self, byte: u8) {
        self.current.push(byte);
    }

    fn end_midi(&mut self) {
        self.frames.push(std::mem::take(&mut self.current));
    }
}

/// RTP header followed by a command section header for `len` bytes
pub(super) fn packet(seq: u16, flags: u8, commands: &[u8]) -> Vec<u8> {
    let mut out = RtpHeader::new_midi(seq, 0, 0x1234_5678).encode().to_vec();
    let len = commands.len();
    if len <= 0x0F && flags & 0x80 == 0 {
        out.push(flags | len as u8);
    } else {
        out.push(0x80 | flags | ((len >> 8) as u8 & 0x0F));
        out.push((len & 0xFF) as u8);
    }
    out.extend_from_slice(commands);
    out
}

/// Decode a complete buffer, failing on the first error
pub(super) fn decode_all(decoder: &mut RtpMidiDecoder, buf: &[u8]) -> Result<Frames, ParseError> {
    let mut sink = Frames::default();
    let mut offset = 0;
    while offset < buf.len() {
        offset += decoder.decode(&buf[offset..], &mut sink)?;
    }
    Ok(sink)
}
