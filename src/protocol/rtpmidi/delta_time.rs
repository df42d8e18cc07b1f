//! Base-128 delta-time fields.
//!
//! Seven value bits per octet, most significant group first, with `0x80`
//! set on every octet but the last. At most four octets.

use bytes::BufMut;

use crate::error::AppleMidiError;
use crate::protocol::{ParseError, ParseResult};

/// Largest encodable value
pub const MAX: u32 = 0x0FFF_FFFF;

/// Longest encoding in octets
pub const MAX_OCTETS: usize = 4;

const CONTINUATION: u8 = 0x80;

/// Write `value` and return the number of octets used.
///
/// # Errors
///
/// `DeltaTimeOverflow` if `value` exceeds [`MAX`].
pub fn write(value: u32, out: &mut impl BufMut) -> Result<usize, AppleMidiError> {
    if value > MAX {
        return Err(AppleMidiError::DeltaTimeOverflow(value));
    }

    let mut groups = [0u8; MAX_OCTETS];
    let mut count = 0;
    let mut rest = value;
    loop {
        groups[count] = (rest & 0x7F) as u8;
        count += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }

    for i in (0..count).rev() {
        let flag = if i > 0 { CONTINUATION } else { 0 };
        out.put_u8(groups[i] | flag);
    }
    Ok(count)
}

/// Read one delta-time from the front of `buf`.
///
/// # Errors
///
/// `NotEnoughData` if the buffer ends mid-field, `UnexpectedMidiData` if
/// a fourth octet still has the continuation bit set.
pub fn read(buf: &[u8]) -> ParseResult<u32> {
    let mut reader = Reader::default();
    for (i, &byte) in buf.iter().enumerate() {
        if let Some(value) = reader.push(byte)? {
            return Ok((value, i + 1));
        }
    }
    Err(ParseError::NotEnoughData)
}

/// Incremental delta-time reader that survives buffer boundaries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reader {
    value: u32,
    octets: usize,
}

impl Reader {
    /// Feed one octet; returns the value once the field is complete.
    ///
    /// # Errors
    ///
    /// `UnexpectedMidiData` on a fifth octet.
    pub fn push(&mut self, byte: u8) -> Result<Option<u32>, ParseError> {
        if self.octets == MAX_OCTETS - 1 && byte & CONTINUATION != 0 {
            self.reset();
            return Err(ParseError::UnexpectedMidiData);
        }

        self.value = (self.value << 7) | u32::from(byte & 0x7F);
        self.octets += 1;

        if byte & CONTINUATION == 0 {
            let value = self.value;
            self.reset();
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    /// Whether any octets of an unfinished field have been seen
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.octets > 0
    }

    /// Discard a partial field
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
