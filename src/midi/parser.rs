use tracing::{debug, trace};

use super::message::MidiMessage;
use super::status;

/// Largest reassembled SysEx payload kept before the message is dropped
pub const MAX_SYSEX_LEN: usize = 64 * 1024;

/// Turns decoded command frames into [`MidiMessage`]s.
///
/// Frames are fed byte by byte between [`start`](Self::start) and
/// [`end`](Self::end). SysEx segments are joined across frames:
///
/// ```text
///   F0 .. F0   first segment        F7 .. F0   middle segment
///   F7 .. F7   last segment         .. F4      cancel
/// ```
#[derive(Debug, Default)]
pub struct MidiParser {
    frame: Vec<u8>,
    sysex: Option<Vec<u8>>,
    overflowed: bool,
}

impl MidiParser {
    /// Create an empty parser
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new frame
    pub fn start(&mut self) {
        self.frame.clear();
    }

    /// Append one byte of the current frame
    pub fn push(&mut self, byte: u8) {
        self.frame.push(byte);
    }

    /// Whether a SysEx message is partway through reassembly
    #[must_use]
    pub fn in_sysex(&self) -> bool {
        self.sysex.is_some()
    }

    /// Drop any partly reassembled SysEx
    pub fn reset(&mut self) {
        self.frame.clear();
        self.sysex = None;
        self.overflowed = false;
    }

    /// Finish the current frame and collect the messages it completes.
    ///
    /// Usually one message; real-time bytes interleaved in SysEx data come
    /// out as separate messages ahead of it.
    pub fn end(&mut self) -> Vec<MidiMessage> {
        let frame = std::mem::take(&mut self.frame);
        let mut out = Vec::new();

        match frame.first() {
            None => {}
            Some(&lead) if status::is_sysex_token(lead) => {
                self.sysex_segment(lead, &frame, &mut out);
            }
            Some(_) => match MidiMessage::from_bytes(&frame) {
                Some(message) => out.push(message),
                None => trace!(len = frame.len(), "Ignoring undefined MIDI frame"),
            },
        }

        self.frame = frame;
        self.frame.clear();
        out
    }

    fn sysex_segment(&mut self, lead: u8, frame: &[u8], out: &mut Vec<MidiMessage>) {
        let (trail, body) = match frame.last() {
            Some(&t) if frame.len() >= 2 && matches!(t, 0xF0 | 0xF4 | 0xF7) => {
                (Some(t), &frame[1..frame.len() - 1])
            }
            _ => (None, &frame[1..]),
        };

        if lead == status::SYSEX_START {
            if self.sysex.is_some() {
                debug!("SysEx start while another was open, discarding the old one");
            }
            self.sysex = Some(Vec::new());
            self.overflowed = false;
        } else if self.sysex.is_none() {
            trace!("SysEx continuation without a start, ignoring");
            return;
        }

        for &byte in body {
            if status::is_real_time(byte) {
                out.extend(MidiMessage::from_bytes(&[byte]));
            } else if let Some(data) = self.sysex.as_mut() {
                if data.len() < MAX_SYSEX_LEN {
                    data.push(byte);
                } else {
                    self.overflowed = true;
                }
            }
        }

        match trail {
            Some(status::SYSEX_END) | None => {
                let data = self.sysex.take().unwrap_or_default();
                if std::mem::take(&mut self.overflowed) {
                    debug!(limit = MAX_SYSEX_LEN, "Dropping oversized SysEx");
                } else {
                    out.push(MidiMessage::SysEx(data));
                }
            }
            Some(status::SYSEX_CANCEL) => {
                trace!("SysEx cancelled by sender");
                self.sysex = None;
                self.overflowed = false;
            }
            // F0: continued in a later segment
            _ => {}
        }
    }
}
