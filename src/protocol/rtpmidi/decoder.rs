use super::journal::RecoveryJournal;
use super::{FLAG_B, FLAG_J, FLAG_Z, delta_time};
use crate::midi::status;
use crate::protocol::ParseError;
use crate::protocol::rtp::RtpHeader;

/// Receives what the decoder finds in a payload.
///
/// Each MIDI command arrives as `start_midi`, one `midi_byte` per byte
/// (status byte always included), then `end_midi`.
pub trait MidiSink {
    /// An RTP header was decoded
    fn rtp_header(&mut self, header: &RtpHeader) {
        let _ = header;
    }

    /// A recovery journal was walked
    fn journal(&mut self, journal: &RecoveryJournal) {
        let _ = journal;
    }

    /// A command begins
    fn start_midi(&mut self);

    /// One byte of the current command
    fn midi_byte(&mut self, byte: u8);

    /// The current command is complete
    fn end_midi(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Header,
    DeltaTime,
    Command,
    Journal,
}

/// Resumable RTP-MIDI payload decoder.
///
/// [`decode`](Self::decode) processes one unit at the front of the
/// buffer: a packet header, a delta-time (or part of one), a command, or
/// a journal. On `Ok(n)` the caller drops `n` bytes and calls again; on
/// a "more data" error it waits, keeping the buffer intact; on an
/// "unexpected" error it drops one byte. Decoder state carries running
/// status and any partial delta-time across calls, so no byte is
/// examined twice once consumed. Running status never outlives its
/// packet: every header clears it.
///
/// SysEx data longer than the frame bound is emitted in pieces: the
/// first ends with a synthetic `F7`, the next begins with a synthetic
/// `F0`. Both are decided purely by byte count, so the emitted byte
/// stream does not depend on how the input was split.
#[derive(Debug, Clone)]
pub struct RtpMidiDecoder {
    stage: Stage,
    journal_follows: bool,
    remaining: usize,
    running_status: Option<u8>,
    delta: delta_time::Reader,
    sysex_pending_start: bool,
    sysex_scanned: usize,
    max_sysex_frame: usize,
}

impl RtpMidiDecoder {
    /// Create a decoder that splits SysEx data every `max_sysex_frame`
    /// bytes when no terminator has been seen
    #[must_use]
    pub fn new(max_sysex_frame: usize) -> Self {
        Self {
            stage: Stage::Header,
            journal_follows: false,
            remaining: 0,
            running_status: None,
            delta: delta_time::Reader::default(),
            sysex_pending_start: false,
            sysex_scanned: 0,
            max_sysex_frame: max_sysex_frame.max(2),
        }
    }

    /// Whether the decoder is between packets
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.stage == Stage::Header
    }

    /// Running status carried into the next command
    #[must_use]
    pub fn running_status(&self) -> Option<u8> {
        self.running_status
    }

    /// Abandon the current packet and wait for a new header
    pub fn reset(&mut self) {
        self.stage = Stage::Header;
        self.journal_follows = false;
        self.remaining = 0;
        self.delta.reset();
        self.sysex_pending_start = false;
        self.sysex_scanned = 0;
    }

    /// Decode one unit from the front of `buf`.
    ///
    /// # Errors
    ///
    /// `NotEnoughData` when the unit is incomplete. `UnexpectedData` for a
    /// bad RTP header, `UnexpectedMidiData` for a malformed command and
    /// `UnexpectedJournalData` for a malformed journal; after any of
    /// these the decoder has already been reset to expect a header.
    pub fn decode(&mut self, buf: &[u8], sink: &mut impl MidiSink) -> Result<usize, ParseError> {
        let result = match self.stage {
            Stage::Header => self.decode_header(buf, sink),
            Stage::DeltaTime => self.decode_delta_time(buf),
            Stage::Command if self.sysex_pending_start => self.decode_sysex(buf, sink),
            Stage::Command => self.decode_command(buf, sink),
            Stage::Journal => self.decode_journal(buf, sink),
        };

        match result {
            Err(err) if err.is_unexpected() => {
                self.reset();
                Err(err)
            }
            other => other,
        }
    }

    fn decode_header(&mut self, buf: &[u8], sink: &mut impl MidiSink) -> Result<usize, ParseError> {
        let (header, mut used) = RtpHeader::decode(buf)?;

        let flags = *buf.get(used).ok_or(ParseError::NotEnoughData)?;
        used += 1;
        let mut length = usize::from(flags & 0x0F);
        if flags & FLAG_B != 0 {
            let low = *buf.get(used).ok_or(ParseError::NotEnoughData)?;
            used += 1;
            length = (length << 8) | usize::from(low);
        }

        sink.rtp_header(&header);

        self.running_status = None;
        self.journal_follows = flags & FLAG_J != 0;
        self.remaining = length;
        self.stage = if length == 0 {
            self.section_end()
        } else if flags & FLAG_Z != 0 {
            Stage::DeltaTime
        } else {
            Stage::Command
        };
        Ok(used)
    }

    fn decode_delta_time(&mut self, buf: &[u8]) -> Result<usize, ParseError> {
        let available = buf.len().min(self.remaining);
        if available == 0 {
            return Err(ParseError::NotEnoughData);
        }

        for (i, &byte) in buf[..available].iter().enumerate() {
            if self.delta.push(byte)?.is_some() {
                self.remaining -= i + 1;
                self.stage = if self.remaining == 0 {
                    self.section_end()
                } else {
                    Stage::Command
                };
                return Ok(i + 1);
            }
        }

        // Every available octet was a continuation octet.
        self.remaining -= available;
        if self.remaining == 0 {
            return Err(ParseError::UnexpectedMidiData);
        }
        Ok(available)
    }

    fn decode_command(&mut self, buf: &[u8], sink: &mut impl MidiSink) -> Result<usize, ParseError> {
        let available = buf.len().min(self.remaining);
        let &first = buf[..available].first().ok_or(ParseError::NotEnoughData)?;

        if status::is_real_time(first) {
            emit(sink, &[first], &[]);
            return Ok(self.command_done(1));
        }

        if status::is_sysex_token(first) {
            self.running_status = None;
            return self.decode_sysex(buf, sink);
        }

        if status::is_status(first) {
            let len = status::data_len(first).ok_or(ParseError::UnexpectedMidiData)?;
            let data = self.data_bytes(buf, 1, len)?;
            emit(sink, &[first], data);
            self.running_status = status::is_channel(first).then_some(first);
            return Ok(self.command_done(1 + len));
        }

        let running = self.running_status.ok_or(ParseError::UnexpectedMidiData)?;
        let len = status::data_len(running).ok_or(ParseError::UnexpectedMidiData)?;
        let data = self.data_bytes(buf, 0, len)?;
        emit(sink, &[running], data);
        Ok(self.command_done(len))
    }

    /// Data bytes of a command, bounded by the section
    fn data_bytes<'a>(
        &self,
        buf: &'a [u8],
        offset: usize,
        len: usize,
    ) -> Result<&'a [u8], ParseError> {
        let end = offset + len;
        if end > self.remaining {
            return Err(ParseError::UnexpectedMidiData);
        }
        let data = buf.get(offset..end).ok_or(ParseError::NotEnoughData)?;
        if data.iter().any(|&b| status::is_status(b)) {
            return Err(ParseError::UnexpectedMidiData);
        }
        Ok(data)
    }

    fn decode_sysex(&mut self, buf: &[u8], sink: &mut impl MidiSink) -> Result<usize, ParseError> {
        let available = buf.len().min(self.remaining);
        let window = available.min(self.max_sysex_frame);
        // A resumed frame has no leading token of its own.
        let body_start = usize::from(!self.sysex_pending_start);

        for i in self.sysex_scanned.max(body_start)..window {
            let byte = buf[i];
            if matches!(
                byte,
                status::SYSEX_START | status::SYSEX_END | status::SYSEX_CANCEL
            ) {
                return Ok(self.sysex_done(buf, i + 1, false, sink));
            }
            if status::is_status(byte) && !status::is_real_time(byte) {
                return Err(ParseError::UnexpectedMidiData);
            }
        }
        self.sysex_scanned = window;

        if available == self.remaining && window == available {
            // Section ended without a terminator.
            return Ok(self.sysex_done(buf, available, true, sink));
        }

        if window == self.max_sysex_frame {
            emit_sysex(sink, self.sysex_pending_start, &buf[..window], true);
            self.remaining -= window;
            self.sysex_pending_start = true;
            self.sysex_scanned = 0;
            self.stage = Stage::Command;
            return Ok(window);
        }

        Err(ParseError::NotEnoughData)
    }

    fn sysex_done(
        &mut self,
        buf: &[u8],
        used: usize,
        synthetic_end: bool,
        sink: &mut impl MidiSink,
    ) -> usize {
        emit_sysex(sink, self.sysex_pending_start, &buf[..used], synthetic_end);
        self.sysex_pending_start = false;
        self.sysex_scanned = 0;
        self.command_done(used)
    }

    fn decode_journal(&mut self, buf: &[u8], sink: &mut impl MidiSink) -> Result<usize, ParseError> {
        let (journal, used) = RecoveryJournal::parse(buf)?;
        sink.journal(&journal);
        self.stage = Stage::Header;
        Ok(used)
    }

    fn command_done(&mut self, used: usize) -> usize {
        self.remaining -= used;
        self.stage = if self.remaining == 0 {
            self.section_end()
        } else {
            Stage::DeltaTime
        };
        used
    }

    fn section_end(&self) -> Stage {
        if self.journal_follows {
            Stage::Journal
        } else {
            Stage::Header
        }
    }
}

impl Default for RtpMidiDecoder {
    fn default() -> Self {
        Self::new(256)
    }
}

fn emit(sink: &mut impl MidiSink, head: &[u8], data: &[u8]) {
    sink.start_midi();
    for &byte in head.iter().chain(data) {
        sink.midi_byte(byte);
    }
    sink.end_midi();
}

fn emit_sysex(sink: &mut impl MidiSink, synthetic_start: bool, bytes: &[u8], synthetic_end: bool) {
    sink.start_midi();
    if synthetic_start {
        sink.midi_byte(status::SYSEX_START);
    }
    for &byte in bytes {
        sink.midi_byte(byte);
    }
    if synthetic_end {
        sink.midi_byte(status::SYSEX_END);
    }
    sink.end_midi();
}
