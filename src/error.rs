use std::io;
use thiserror::Error;

use crate::types::Port;

/// Runtime conditions reported through [`SessionHandler::exception`].
///
/// None of these stop the poll loop. Each variant carries only the context
/// its kind needs.
///
/// [`SessionHandler::exception`]: crate::session::SessionHandler::exception
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Exception {
    /// Receive buffer was full; new bytes were dropped
    #[error("receive buffer full on {port} port, dropped {dropped} bytes")]
    BufferFull {
        /// Port whose buffer overflowed
        port: Port,
        /// Number of bytes dropped
        dropped: usize,
    },

    /// Framing error; one byte was discarded to resynchronize
    #[error("unexpected data on {port} port")]
    UnexpectedData {
        /// Port the bytes arrived on
        port: Port,
    },

    /// Malformed MIDI command section; one byte was discarded
    #[error("unexpected MIDI data")]
    UnexpectedMidiData,

    /// Malformed or unsupported recovery journal; one byte was discarded
    #[error("unexpected recovery journal data")]
    UnexpectedJournalData,

    /// Invitation refused because the participant table is full
    #[error("too many participants, rejected {ssrc:08x}")]
    TooManyParticipants {
        /// SSRC of the rejected peer
        ssrc: u32,
    },

    /// Message for a peer that has no session
    #[error("participant {ssrc:08x} not found")]
    ParticipantNotFound {
        /// SSRC named by the message
        ssrc: u32,
    },

    /// Acceptance or rejection for a token we never sent
    #[error("unknown initiator token {token:08x}")]
    UnknownInitiatorToken {
        /// The token carried by the message
        token: u32,
    },

    /// No clock synchronization within the sync timeout
    #[error("participant {ssrc:08x} timed out")]
    ListenerTimeOut {
        /// SSRC of the dead peer
        ssrc: u32,
    },

    /// Synchronization attempt budget exhausted
    #[error("participant {ssrc:08x} exceeded synchronization attempts")]
    MaxAttempts {
        /// SSRC of the peer
        ssrc: u32,
    },

    /// Invitation attempt budget exhausted without an answer
    #[error("no response to invitation {token:08x}")]
    NoResponseFromConnectionRequest {
        /// Initiator token of the abandoned invitation
        token: u32,
    },

    /// Gap detected in received RTP sequence numbers
    #[error("participant {ssrc:08x} lost {count} packets")]
    ReceivedPacketsDropped {
        /// SSRC of the sender
        ssrc: u32,
        /// Number of missing packets
        count: u16,
    },

    /// Outbound datagram could not be sent
    #[error("failed to send {len} bytes on {port} port")]
    SendPacketsDropped {
        /// Port the datagram was meant for
        port: Port,
        /// Datagram length
        len: usize,
    },
}

impl Exception {
    /// SSRC of the peer this exception concerns, if any
    #[must_use]
    pub fn ssrc(&self) -> Option<u32> {
        match self {
            Self::TooManyParticipants { ssrc }
            | Self::ParticipantNotFound { ssrc }
            | Self::ListenerTimeOut { ssrc }
            | Self::MaxAttempts { ssrc }
            | Self::ReceivedPacketsDropped { ssrc, .. } => Some(*ssrc),
            _ => None,
        }
    }

    /// Whether the exception ended a participant's session
    #[must_use]
    pub fn is_session_ending(&self) -> bool {
        matches!(
            self,
            Self::ListenerTimeOut { .. }
                | Self::MaxAttempts { .. }
                | Self::NoResponseFromConnectionRequest { .. }
        )
    }
}

/// Errors returned by the public API
#[derive(Debug, Error)]
pub enum AppleMidiError {
    /// Participant table is at capacity
    #[error("no free participant slot (capacity {capacity})")]
    NoFreeSlot {
        /// Configured table capacity
        capacity: usize,
    },

    /// No participant with this SSRC
    #[error("participant {ssrc:08x} not found")]
    ParticipantNotFound {
        /// The SSRC that was looked up
        ssrc: u32,
    },

    /// Delta-time value exceeds four base-128 octets
    #[error("delta-time {0} exceeds 0x0FFFFFFF")]
    DeltaTimeOverflow(u32),

    /// Command section longer than the 12-bit length field allows
    #[error("command section of {0} bytes exceeds 4095")]
    CommandSectionTooLong(usize),

    /// Configuration rejected by validation
    #[error("invalid configuration: {name} - {message}")]
    InvalidConfig {
        /// Offending field
        name: &'static str,
        /// Why it was rejected
        message: String,
    },

    /// Socket error from the transport
    #[error("network error: {0}")]
    NetworkError(#[from] io::Error),
}

impl AppleMidiError {
    /// Check if this error is recoverable by retrying later
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::NoFreeSlot { .. } => true,
            Self::NetworkError(e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

/// Result type alias for `AppleMIDI` operations
pub type Result<T> = std::result::Result<T, AppleMidiError>;
