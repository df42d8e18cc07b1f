use bytes::{BufMut, Bytes, BytesMut};

use super::{FLAG_B, MAX_SECTION_LEN};
use crate::error::AppleMidiError;
use crate::midi::{MidiMessage, RunningStatus, status};
use crate::protocol::rtp::RtpHeader;

/// Build an RTP-MIDI packet around an already-encoded command list.
///
/// Uses the short length header for up to 15 bytes and the long (B)
/// header otherwise. No leading delta-time and no journal.
///
/// # Errors
///
/// `CommandSectionTooLong` if `commands` exceeds the 12-bit length field.
pub fn encode_packet(header: &RtpHeader, commands: &[u8]) -> Result<BytesMut, AppleMidiError> {
    let len = commands.len();
    if len > MAX_SECTION_LEN {
        return Err(AppleMidiError::CommandSectionTooLong(len));
    }

    let mut buf = BytesMut::with_capacity(RtpHeader::SIZE + 2 + len);
    buf.put_slice(&header.encode());
    if len <= 0x0F {
        buf.put_u8(len as u8);
    } else {
        buf.put_u8(FLAG_B | ((len >> 8) as u8 & 0x0F));
        buf.put_u8((len & 0xFF) as u8);
    }
    buf.put_slice(commands);
    Ok(buf)
}

/// Split a SysEx payload into wire segments of at most `segment_size`
/// content bytes each.
///
/// A payload that fits is framed `F0 .. F7`. Longer payloads become
/// `F0 .. F0`, then `F7 .. F0` for each middle part, then `F7 .. F7`.
#[must_use]
pub fn segment_sysex(body: &[u8], segment_size: usize) -> Vec<Vec<u8>> {
    let segment_size = segment_size.max(1);
    if body.len() <= segment_size {
        let mut frame = Vec::with_capacity(body.len() + 2);
        frame.push(status::SYSEX_START);
        frame.extend(body.iter().map(|b| b & 0x7F));
        frame.push(status::SYSEX_END);
        return vec![frame];
    }

    let chunks: Vec<&[u8]> = body.chunks(segment_size).collect();
    let last = chunks.len() - 1;
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let lead = if i == 0 {
                status::SYSEX_START
            } else {
                status::SYSEX_END
            };
            let trail = if i == last {
                status::SYSEX_END
            } else {
                status::SYSEX_START
            };
            let mut frame = Vec::with_capacity(chunk.len() + 2);
            frame.push(lead);
            frame.extend(chunk.iter().map(|b| b & 0x7F));
            frame.push(trail);
            frame
        })
        .collect()
}

/// Outbound MIDI commands waiting for the next packet.
///
/// Commands after the first are separated by a zero delta-time. Running
/// status, when enabled, restarts with every packet.
#[derive(Debug)]
pub struct CommandQueue {
    bytes: BytesMut,
    running: RunningStatus,
    commands: usize,
}

impl CommandQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new(running_status: bool) -> Self {
        Self {
            bytes: BytesMut::new(),
            running: RunningStatus::new(running_status),
            commands: 0,
        }
    }

    /// Append one message
    pub fn push(&mut self, message: &MidiMessage) {
        self.separate();
        message.write(&mut self.bytes, &mut self.running);
        self.commands += 1;
    }

    /// Append a pre-framed command such as a SysEx segment
    pub fn push_raw(&mut self, command: &[u8]) {
        self.separate();
        self.bytes.put_slice(command);
        self.running.reset();
        self.commands += 1;
    }

    /// Bytes a message would add to the queue, worst case
    #[must_use]
    pub fn cost(&self, command_len: usize) -> usize {
        command_len + usize::from(self.commands > 0)
    }

    /// Number of queued commands
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands
    }

    /// Whether nothing is queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands == 0
    }

    /// Encoded length of the queued command list
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Take the queued command list, leaving the queue empty
    pub fn take(&mut self) -> Bytes {
        self.commands = 0;
        self.running.reset();
        self.bytes.split().freeze()
    }

    fn separate(&mut self) {
        if self.commands > 0 {
            // zero delta-time
            self.bytes.put_u8(0);
        }
    }
}
