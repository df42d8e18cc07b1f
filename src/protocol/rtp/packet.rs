use thiserror::Error;

use super::constants::{PAYLOAD_TYPE_MIDI, VERSION};
use crate::protocol::ParseError;

/// RTP header (12 bytes fixed part)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    /// Version (2 bits, always 2)
    pub version: u8,
    /// Padding flag
    pub padding: bool,
    /// Extension flag
    pub extension: bool,
    /// CSRC count (4 bits)
    pub csrc_count: u8,
    /// Marker bit
    pub marker: bool,
    /// Payload type (7 bits)
    pub payload_type: u8,
    /// Sequence number (16 bits)
    pub sequence: u16,
    /// Timestamp in 100 microsecond ticks since session start
    pub timestamp: u32,
    /// Synchronization source ID (32 bits)
    pub ssrc: u32,
}

impl RtpHeader {
    /// Standard RTP header size
    pub const SIZE: usize = 12;

    /// Create a header for an RTP-MIDI packet
    #[must_use]
    pub fn new_midi(sequence: u16, timestamp: u32, ssrc: u32) -> Self {
        Self {
            version: VERSION,
            padding: false,
            extension: false,
            csrc_count: 0,
            marker: false,
            payload_type: PAYLOAD_TYPE_MIDI,
            sequence,
            timestamp,
            ssrc,
        }
    }

    /// Encode header to bytes
    #[must_use]
    pub fn encode(&self) -> [u8; 12] {
        let mut buf = [0u8; 12];

        // Byte 0: V(2) | P(1) | X(1) | CC(4)
        buf[0] = (self.version << 6)
            | (u8::from(self.padding) << 5)
            | (u8::from(self.extension) << 4)
            | (self.csrc_count & 0x0F);

        // Byte 1: M(1) | PT(7)
        buf[1] = (u8::from(self.marker) << 7) | (self.payload_type & 0x7F);

        buf[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        buf[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        buf
    }

    /// Decode an RTP-MIDI header from bytes.
    ///
    /// Returns the header and its full length on the wire, CSRC list and
    /// header extension included.
    ///
    /// # Errors
    ///
    /// Returns `RtpDecodeError` if the buffer is too small, the version is
    /// not 2 or the payload type is not RTP-MIDI.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), RtpDecodeError> {
        // Version and payload type are checked as soon as they arrive.
        if let Some(&b0) = buf.first() {
            let version = (b0 >> 6) & 0x03;
            if version != VERSION {
                return Err(RtpDecodeError::InvalidVersion(version));
            }
        }
        if let Some(&b1) = buf.get(1) {
            let payload_type = b1 & 0x7F;
            if payload_type != PAYLOAD_TYPE_MIDI {
                return Err(RtpDecodeError::UnknownPayloadType(payload_type));
            }
        }
        if buf.len() < Self::SIZE {
            return Err(RtpDecodeError::BufferTooSmall {
                needed: Self::SIZE,
                have: buf.len(),
            });
        }

        let version = (buf[0] >> 6) & 0x03;
        let payload_type = buf[1] & 0x7F;

        let header = Self {
            version,
            padding: (buf[0] >> 5) & 0x01 != 0,
            extension: (buf[0] >> 4) & 0x01 != 0,
            csrc_count: buf[0] & 0x0F,
            marker: (buf[1] >> 7) & 0x01 != 0,
            payload_type,
            sequence: u16::from_be_bytes([buf[2], buf[3]]),
            timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ssrc: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        };

        let mut len = Self::SIZE + 4 * usize::from(header.csrc_count);
        if header.extension {
            // Extension: profile(2) | length in 32-bit words(2) | words
            if buf.len() < len + 4 {
                return Err(RtpDecodeError::BufferTooSmall {
                    needed: len + 4,
                    have: buf.len(),
                });
            }
            let words = u16::from_be_bytes([buf[len + 2], buf[len + 3]]);
            len += 4 + 4 * usize::from(words);
        }
        if buf.len() < len {
            return Err(RtpDecodeError::BufferTooSmall {
                needed: len,
                have: buf.len(),
            });
        }

        Ok((header, len))
    }
}

/// RTP decode errors
#[derive(Debug, Error)]
pub enum RtpDecodeError {
    /// The header, CSRC list or extension is not complete yet
    #[error("buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall {
        /// Bytes required
        needed: usize,
        /// Bytes available
        have: usize,
    },

    /// Version field other than 2
    #[error("invalid RTP version: {0}")]
    InvalidVersion(u8),

    /// Payload type other than RTP-MIDI
    #[error("unknown payload type: 0x{0:02x}")]
    UnknownPayloadType(u8),
}

impl From<RtpDecodeError> for ParseError {
    fn from(err: RtpDecodeError) -> Self {
        match err {
            RtpDecodeError::BufferTooSmall { .. } => ParseError::NotEnoughData,
            RtpDecodeError::InvalidVersion(_) | RtpDecodeError::UnknownPayloadType(_) => {
                ParseError::UnexpectedData
            }
        }
    }
}
