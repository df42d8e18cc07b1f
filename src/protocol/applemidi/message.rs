use bytes::{Buf, BufMut, BytesMut};

use super::{HEADER_SIZE, PROTOCOL_VERSION, SIGNATURE};
use crate::protocol::{ParseError, ParseResult};

/// Control command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `IN`
    Invitation,
    /// `OK`
    InvitationAccepted,
    /// `NO`
    InvitationRejected,
    /// `CK`
    Synchronization,
    /// `RS`
    ReceiverFeedback,
    /// `RL`
    BitrateReceiveLimit,
    /// `BY`
    EndSession,
}

impl Command {
    /// Two-byte ASCII code on the wire
    #[must_use]
    pub fn code(self) -> [u8; 2] {
        match self {
            Self::Invitation => *b"IN",
            Self::InvitationAccepted => *b"OK",
            Self::InvitationRejected => *b"NO",
            Self::Synchronization => *b"CK",
            Self::ReceiverFeedback => *b"RS",
            Self::BitrateReceiveLimit => *b"RL",
            Self::EndSession => *b"BY",
        }
    }

    /// Parse a two-byte ASCII code
    #[must_use]
    pub fn from_code(code: [u8; 2]) -> Option<Self> {
        match &code {
            b"IN" => Some(Self::Invitation),
            b"OK" => Some(Self::InvitationAccepted),
            b"NO" => Some(Self::InvitationRejected),
            b"CK" => Some(Self::Synchronization),
            b"RS" => Some(Self::ReceiverFeedback),
            b"RL" => Some(Self::BitrateReceiveLimit),
            b"BY" => Some(Self::EndSession),
            _ => None,
        }
    }

    /// Size of the fixed part of the message, header included
    #[must_use]
    pub fn fixed_size(self) -> usize {
        HEADER_SIZE
            + match self {
                Self::Invitation
                | Self::InvitationAccepted
                | Self::InvitationRejected
                | Self::EndSession => 12,
                Self::Synchronization => Synchronization::BODY_SIZE,
                Self::ReceiverFeedback | Self::BitrateReceiveLimit => 8,
            }
    }
}

/// Body shared by `IN`, `OK` and `NO`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    /// Protocol version (2)
    pub version: u32,
    /// Correlates a reply with the request that caused it
    pub initiator_token: u32,
    /// Sender's synchronization source
    pub ssrc: u32,
    /// Sender's session name (empty when absent)
    pub name: String,
}

impl Invitation {
    /// Create an invitation body with the current protocol version
    #[must_use]
    pub fn new(initiator_token: u32, ssrc: u32, name: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            initiator_token,
            ssrc,
            name: name.into(),
        }
    }
}

/// `CK` clock synchronization body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Synchronization {
    /// Sender's synchronization source
    pub ssrc: u32,
    /// Step of the exchange (0, 1 or 2)
    pub count: u8,
    /// Timestamps in 100 microsecond units
    pub timestamps: [u64; 3],
}

impl Synchronization {
    /// ssrc + count + padding + three timestamps
    pub const BODY_SIZE: usize = 4 + 1 + 3 + 24;
}

/// `RS` acknowledgement of received packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverFeedback {
    /// Sender's synchronization source
    pub ssrc: u32,
    /// Highest RTP sequence number received
    pub sequence: u16,
}

/// `RL` bitrate limit announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitrateReceiveLimit {
    /// Sender's synchronization source
    pub ssrc: u32,
    /// Maximum bitrate the sender accepts
    pub limit: u32,
}

/// `BY` session teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndSession {
    /// Protocol version (2)
    pub version: u32,
    /// Token of the session being ended
    pub initiator_token: u32,
    /// Sender's synchronization source
    pub ssrc: u32,
}

impl EndSession {
    /// Create an end-session body with the current protocol version
    #[must_use]
    pub fn new(initiator_token: u32, ssrc: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            initiator_token,
            ssrc,
        }
    }
}

/// Any `AppleMIDI` control datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Request to join a session
    Invitation(Invitation),
    /// Invitation granted
    InvitationAccepted(Invitation),
    /// Invitation refused
    InvitationRejected(Invitation),
    /// Clock synchronization step
    Synchronization(Synchronization),
    /// Receiver feedback
    ReceiverFeedback(ReceiverFeedback),
    /// Bitrate limit
    BitrateReceiveLimit(BitrateReceiveLimit),
    /// Session teardown
    EndSession(EndSession),
}

impl ControlMessage {
    /// Command code of this message
    #[must_use]
    pub fn command(&self) -> Command {
        match self {
            Self::Invitation(_) => Command::Invitation,
            Self::InvitationAccepted(_) => Command::InvitationAccepted,
            Self::InvitationRejected(_) => Command::InvitationRejected,
            Self::Synchronization(_) => Command::Synchronization,
            Self::ReceiverFeedback(_) => Command::ReceiverFeedback,
            Self::BitrateReceiveLimit(_) => Command::BitrateReceiveLimit,
            Self::EndSession(_) => Command::EndSession,
        }
    }

    /// SSRC of the sender
    #[must_use]
    pub fn ssrc(&self) -> u32 {
        match self {
            Self::Invitation(m) | Self::InvitationAccepted(m) | Self::InvitationRejected(m) => {
                m.ssrc
            }
            Self::Synchronization(m) => m.ssrc,
            Self::ReceiverFeedback(m) => m.ssrc,
            Self::BitrateReceiveLimit(m) => m.ssrc,
            Self::EndSession(m) => m.ssrc,
        }
    }

    /// Encode to bytes
    #[must_use]
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.command().fixed_size() + 32);
        self.encode_into(&mut buf);
        buf
    }

    /// Append the encoded message to `buf`
    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_slice(&SIGNATURE);
        buf.put_slice(&self.command().code());

        match self {
            Self::Invitation(m) | Self::InvitationAccepted(m) | Self::InvitationRejected(m) => {
                buf.put_u32(m.version);
                buf.put_u32(m.initiator_token);
                buf.put_u32(m.ssrc);
                buf.put_slice(m.name.as_bytes());
                buf.put_u8(0);
            }
            Self::Synchronization(m) => {
                buf.put_u32(m.ssrc);
                buf.put_u8(m.count);
                buf.put_bytes(0, 3);
                for ts in m.timestamps {
                    buf.put_u64(ts);
                }
            }
            Self::ReceiverFeedback(m) => {
                buf.put_u32(m.ssrc);
                buf.put_u16(m.sequence);
                buf.put_u16(0);
            }
            Self::BitrateReceiveLimit(m) => {
                buf.put_u32(m.ssrc);
                buf.put_u32(m.limit);
            }
            Self::EndSession(m) => {
                buf.put_u32(m.version);
                buf.put_u32(m.initiator_token);
                buf.put_u32(m.ssrc);
            }
        }
    }

    /// Decode one message from the front of `buf`.
    ///
    /// A session name must be terminated by NUL (or by the `0xFF` that
    /// starts the next message); otherwise more data is requested.
    ///
    /// # Errors
    ///
    /// `NotEnoughData` while the fixed part is incomplete,
    /// `NotSureGiveMeMoreData` while a name is unterminated and
    /// `UnexpectedData` for a bad signature, unknown command or
    /// out-of-range field.
    pub fn decode(buf: &[u8], max_name_len: usize) -> ParseResult<Self> {
        Self::decode_inner(buf, max_name_len, false)
    }

    /// Decode one message, treating the end of `buf` as a message
    /// boundary. Used once no further bytes are expected.
    ///
    /// # Errors
    ///
    /// As [`ControlMessage::decode`], except that an unterminated name
    /// ends at the end of the buffer.
    pub fn decode_to_end(buf: &[u8], max_name_len: usize) -> ParseResult<Self> {
        Self::decode_inner(buf, max_name_len, true)
    }

    fn decode_inner(buf: &[u8], max_name_len: usize, at_end: bool) -> ParseResult<Self> {
        // Reject a bad signature as early as the first byte.
        for (have, want) in buf.iter().zip(SIGNATURE.iter()) {
            if have != want {
                return Err(ParseError::UnexpectedData);
            }
        }
        if buf.len() < HEADER_SIZE {
            return Err(ParseError::NotEnoughData);
        }

        let command =
            Command::from_code([buf[2], buf[3]]).ok_or(ParseError::UnexpectedData)?;
        let fixed = command.fixed_size();
        if buf.len() < fixed {
            return Err(ParseError::NotEnoughData);
        }

        let mut body = &buf[HEADER_SIZE..fixed];

        let message = match command {
            Command::Invitation | Command::InvitationAccepted | Command::InvitationRejected => {
                let version = body.get_u32();
                let initiator_token = body.get_u32();
                let ssrc = body.get_u32();
                let (name, name_len) = decode_name(&buf[fixed..], max_name_len, at_end)?;
                let invitation = Invitation {
                    version,
                    initiator_token,
                    ssrc,
                    name,
                };
                let message = match command {
                    Command::Invitation => Self::Invitation(invitation),
                    Command::InvitationAccepted => Self::InvitationAccepted(invitation),
                    _ => Self::InvitationRejected(invitation),
                };
                return Ok((message, fixed + name_len));
            }
            Command::Synchronization => {
                let ssrc = body.get_u32();
                let count = body.get_u8();
                if count > 2 {
                    return Err(ParseError::UnexpectedData);
                }
                body.advance(3);
                let timestamps = [body.get_u64(), body.get_u64(), body.get_u64()];
                Self::Synchronization(Synchronization {
                    ssrc,
                    count,
                    timestamps,
                })
            }
            Command::ReceiverFeedback => {
                let ssrc = body.get_u32();
                let sequence = body.get_u16();
                Self::ReceiverFeedback(ReceiverFeedback { ssrc, sequence })
            }
            Command::BitrateReceiveLimit => Self::BitrateReceiveLimit(BitrateReceiveLimit {
                ssrc: body.get_u32(),
                limit: body.get_u32(),
            }),
            Command::EndSession => Self::EndSession(EndSession {
                version: body.get_u32(),
                initiator_token: body.get_u32(),
                ssrc: body.get_u32(),
            }),
        };

        Ok((message, fixed))
    }
}

/// Scan a NUL-terminated name within the bytes actually present.
///
/// Returns the name (truncated to `max_len` bytes) and the bytes used,
/// terminator included.
fn decode_name(buf: &[u8], max_len: usize, at_end: bool) -> ParseResult<String> {
    let (raw, used) = match buf.iter().position(|&b| b == 0x00 || b == 0xFF) {
        Some(end) if buf[end] == 0x00 => (&buf[..end], end + 1),
        // 0xFF never occurs in UTF-8: it is the next message's signature.
        Some(end) => (&buf[..end], end),
        None if at_end => (buf, buf.len()),
        None => return Err(ParseError::NotSureGiveMeMoreData),
    };

    Ok((truncate_name(&String::from_utf8_lossy(raw), max_len), used))
}

/// Truncate a session name to at most `max_len` bytes on a character boundary
#[must_use]
pub(crate) fn truncate_name(name: &str, max_len: usize) -> String {
    let mut end = name.len().min(max_len);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}
