use crate::protocol::{ParseError, ParseResult};

/// Single-packet loss: the journal covers only the previous packet
const FLAG_S: u8 = 0x80;
/// System journal present
const FLAG_Y: u8 = 0x40;
/// Channel journals present
const FLAG_A: u8 = 0x20;
/// Enhanced Chapter C encoding
const FLAG_H: u8 = 0x10;
const TOTCHAN_MASK: u8 = 0x0F;

/// Enhanced Chapter C encoding in a channel journal header
const CHANNEL_FLAG_H: u8 = 0x04;

/// System journal summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemJournal {
    /// D, V, Q, F and X sub-chapter presence bits (D is bit 4)
    pub chapters: u8,
    /// Length in bytes, header included
    pub length: usize,
}

/// Channel journal summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelJournal {
    /// MIDI channel (0-15)
    pub channel: u8,
    /// Chapter presence bits P, C, M, W, N, E, T, A (P is bit 7)
    pub chapters: u8,
    /// Length in bytes, header included
    pub length: usize,
}

/// Structure of a recovery journal.
///
/// Chapters are walked to find their extent but their contents are not
/// replayed; loss is reported by sequence-number tracking instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryJournal {
    /// S flag: only the preceding packet is covered
    pub single_packet_loss: bool,
    /// Sequence number the journal's checkpoint refers to
    pub checkpoint: u16,
    /// System journal, if present
    pub system: Option<SystemJournal>,
    /// Channel journals in wire order
    pub channels: Vec<ChannelJournal>,
}

impl RecoveryJournal {
    /// Journal header: flags byte plus checkpoint sequence number
    pub const HEADER_SIZE: usize = 3;

    /// Walk a journal at the front of `buf` and return its total length.
    ///
    /// # Errors
    ///
    /// `NotEnoughData` while any declared length runs past `buf`,
    /// `UnexpectedJournalData` for enhanced Chapter C encoding or a length
    /// shorter than its own header.
    pub fn parse(buf: &[u8]) -> ParseResult<Self> {
        let &[flags, cp_hi, cp_lo, ..] = buf else {
            return Err(ParseError::NotEnoughData);
        };
        if flags & FLAG_H != 0 {
            return Err(ParseError::UnexpectedJournalData);
        }

        let mut journal = Self {
            single_packet_loss: flags & FLAG_S != 0,
            checkpoint: u16::from_be_bytes([cp_hi, cp_lo]),
            system: None,
            channels: Vec::new(),
        };
        let mut offset = Self::HEADER_SIZE;

        if flags & FLAG_Y != 0 {
            let rest = &buf[offset..];
            let &[b0, b1, ..] = rest else {
                return Err(ParseError::NotEnoughData);
            };
            let length = ten_bit_length(b0, b1);
            if length < 2 {
                return Err(ParseError::UnexpectedJournalData);
            }
            if rest.len() < length {
                return Err(ParseError::NotEnoughData);
            }
            journal.system = Some(SystemJournal {
                chapters: (b0 >> 2) & 0x1F,
                length,
            });
            offset += length;
        }

        if flags & FLAG_A != 0 {
            let total = usize::from(flags & TOTCHAN_MASK) + 1;
            for _ in 0..total {
                let rest = &buf[offset..];
                let &[b0, b1, chapters, ..] = rest else {
                    return Err(ParseError::NotEnoughData);
                };
                if b0 & CHANNEL_FLAG_H != 0 {
                    return Err(ParseError::UnexpectedJournalData);
                }
                let length = ten_bit_length(b0, b1);
                if length < 3 {
                    return Err(ParseError::UnexpectedJournalData);
                }
                if rest.len() < length {
                    return Err(ParseError::NotEnoughData);
                }
                journal.channels.push(ChannelJournal {
                    channel: (b0 >> 3) & 0x0F,
                    chapters,
                    length,
                });
                offset += length;
            }
        }

        Ok((journal, offset))
    }
}

fn ten_bit_length(b0: u8, b1: u8) -> usize {
    (usize::from(b0 & 0x03) << 8) | usize::from(b1)
}
