//! Protocol module
//!
//! Wire formats only: nothing here performs I/O or keeps session state
//! beyond what a resumable decoder needs.

pub mod applemidi;
pub mod rtp;
pub mod rtpmidi;

use thiserror::Error;

/// Why a decoder could not produce a value from the bytes it was given.
///
/// Decoders return `Ok((value, consumed))` when a unit was processed.
/// The "more data" kinds ask the caller to wait without discarding
/// anything; the "unexpected" kinds ask the caller to discard exactly one
/// byte from the front of its buffer and try again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A fixed-size prefix is not complete yet
    #[error("not enough data")]
    NotEnoughData,
    /// A variable-length field has not ended within the buffer
    #[error("need more data to decide")]
    NotSureGiveMeMoreData,
    /// Bytes do not form a recognised message
    #[error("unexpected data")]
    UnexpectedData,
    /// Malformed MIDI command section
    #[error("unexpected MIDI data")]
    UnexpectedMidiData,
    /// Malformed or unsupported recovery journal
    #[error("unexpected journal data")]
    UnexpectedJournalData,
}

impl ParseError {
    /// Whether the caller should wait for more bytes
    #[must_use]
    pub fn needs_more_data(self) -> bool {
        matches!(self, Self::NotEnoughData | Self::NotSureGiveMeMoreData)
    }

    /// Whether the caller should discard one byte and retry
    #[must_use]
    pub fn is_unexpected(self) -> bool {
        !self.needs_more_data()
    }
}

/// Result of one decode step: the value and how many bytes it used
pub type ParseResult<T> = Result<(T, usize), ParseError>;
