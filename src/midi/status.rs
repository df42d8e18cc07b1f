//! Status byte constants and per-type data lengths

/// Note off (channel in low nibble)
pub const NOTE_OFF: u8 = 0x80;
/// Note on
pub const NOTE_ON: u8 = 0x90;
/// Polyphonic key pressure
pub const POLY_PRESSURE: u8 = 0xA0;
/// Control change
pub const CONTROL_CHANGE: u8 = 0xB0;
/// Program change
pub const PROGRAM_CHANGE: u8 = 0xC0;
/// Channel pressure
pub const CHANNEL_PRESSURE: u8 = 0xD0;
/// Pitch bend
pub const PITCH_BEND: u8 = 0xE0;

/// System exclusive start; trailing a segment it means "continued"
pub const SYSEX_START: u8 = 0xF0;
/// MIDI time code quarter frame
pub const TIME_CODE_QUARTER_FRAME: u8 = 0xF1;
/// Song position pointer
pub const SONG_POSITION: u8 = 0xF2;
/// Song select
pub const SONG_SELECT: u8 = 0xF3;
/// Undefined in MIDI 1.0; ends a cancelled SysEx segment in RTP-MIDI
pub const SYSEX_CANCEL: u8 = 0xF4;
/// Tune request
pub const TUNE_REQUEST: u8 = 0xF6;
/// System exclusive end; leading a segment it means "continuation"
pub const SYSEX_END: u8 = 0xF7;

/// Timing clock
pub const CLOCK: u8 = 0xF8;
/// Start
pub const START: u8 = 0xFA;
/// Continue
pub const CONTINUE: u8 = 0xFB;
/// Stop
pub const STOP: u8 = 0xFC;
/// Active sensing
pub const ACTIVE_SENSING: u8 = 0xFE;
/// System reset
pub const RESET: u8 = 0xFF;

/// High bit set
#[must_use]
pub fn is_status(byte: u8) -> bool {
    byte & 0x80 != 0
}

/// Single-octet real-time message, allowed anywhere
#[must_use]
pub fn is_real_time(byte: u8) -> bool {
    byte >= CLOCK
}

/// Channel voice message (0x80..=0xEF)
#[must_use]
pub fn is_channel(byte: u8) -> bool {
    (NOTE_OFF..SYSEX_START).contains(&byte)
}

/// Either System Exclusive boundary token
#[must_use]
pub fn is_sysex_token(byte: u8) -> bool {
    byte == SYSEX_START || byte == SYSEX_END
}

/// Number of data bytes following `status`.
///
/// `None` for SysEx tokens, whose length is variable, and for data bytes.
#[must_use]
pub fn data_len(status: u8) -> Option<usize> {
    match status {
        0x80..=0xBF | 0xE0..=0xEF => Some(2),
        0xC0..=0xDF => Some(1),
        TIME_CODE_QUARTER_FRAME | SONG_SELECT => Some(1),
        SONG_POSITION => Some(2),
        SYSEX_CANCEL | 0xF5 | TUNE_REQUEST => Some(0),
        SYSEX_START | SYSEX_END => None,
        0xF8..=0xFF => Some(0),
        _ => None,
    }
}
