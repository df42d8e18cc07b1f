use bytes::BufMut;

use super::status;

/// A complete MIDI 1.0 message.
///
/// Channels are 0-based (0..=15). Data values are 7-bit; out-of-range
/// values are masked when written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note off
    NoteOff {
        /// Channel (0-15)
        channel: u8,
        /// Note number
        note: u8,
        /// Release velocity
        velocity: u8,
    },
    /// Note on
    NoteOn {
        /// Channel (0-15)
        channel: u8,
        /// Note number
        note: u8,
        /// Velocity
        velocity: u8,
    },
    /// Polyphonic key pressure
    PolyPressure {
        /// Channel (0-15)
        channel: u8,
        /// Note number
        note: u8,
        /// Pressure amount
        pressure: u8,
    },
    /// Control change
    ControlChange {
        /// Channel (0-15)
        channel: u8,
        /// Controller number
        controller: u8,
        /// Controller value
        value: u8,
    },
    /// Program change
    ProgramChange {
        /// Channel (0-15)
        channel: u8,
        /// Program number
        program: u8,
    },
    /// Channel pressure
    ChannelPressure {
        /// Channel (0-15)
        channel: u8,
        /// Pressure amount
        pressure: u8,
    },
    /// Pitch bend, 14-bit value centred on 0x2000
    PitchBend {
        /// Channel (0-15)
        channel: u8,
        /// Bend amount (0..=0x3FFF)
        value: u16,
    },
    /// System exclusive payload, without the `F0`/`F7` framing
    SysEx(Vec<u8>),
    /// MIDI time code quarter frame
    TimeCodeQuarterFrame(u8),
    /// Song position pointer in MIDI beats (0..=0x3FFF)
    SongPosition(u16),
    /// Song select
    SongSelect(u8),
    /// Tune request
    TuneRequest,
    /// Timing clock
    Clock,
    /// Start
    Start,
    /// Continue
    Continue,
    /// Stop
    Stop,
    /// Active sensing
    ActiveSensing,
    /// System reset
    Reset,
}

/// Running-status state for a byte stream being written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningStatus {
    enabled: bool,
    current: Option<u8>,
}

impl RunningStatus {
    /// Track the status; omit repeats only when `enabled`
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            current: None,
        }
    }

    /// Forget the last status, forcing the next one to be written
    pub fn reset(&mut self) {
        self.current = None;
    }

    /// Status byte in effect, if any
    #[must_use]
    pub fn current(&self) -> Option<u8> {
        self.current
    }
}

impl MidiMessage {
    /// Status byte, channel included
    #[must_use]
    pub fn status(&self) -> u8 {
        match self {
            Self::NoteOff { channel, .. } => status::NOTE_OFF | (channel & 0x0F),
            Self::NoteOn { channel, .. } => status::NOTE_ON | (channel & 0x0F),
            Self::PolyPressure { channel, .. } => status::POLY_PRESSURE | (channel & 0x0F),
            Self::ControlChange { channel, .. } => status::CONTROL_CHANGE | (channel & 0x0F),
            Self::ProgramChange { channel, .. } => status::PROGRAM_CHANGE | (channel & 0x0F),
            Self::ChannelPressure { channel, .. } => status::CHANNEL_PRESSURE | (channel & 0x0F),
            Self::PitchBend { channel, .. } => status::PITCH_BEND | (channel & 0x0F),
            Self::SysEx(_) => status::SYSEX_START,
            Self::TimeCodeQuarterFrame(_) => status::TIME_CODE_QUARTER_FRAME,
            Self::SongPosition(_) => status::SONG_POSITION,
            Self::SongSelect(_) => status::SONG_SELECT,
            Self::TuneRequest => status::TUNE_REQUEST,
            Self::Clock => status::CLOCK,
            Self::Start => status::START,
            Self::Continue => status::CONTINUE,
            Self::Stop => status::STOP,
            Self::ActiveSensing => status::ACTIVE_SENSING,
            Self::Reset => status::RESET,
        }
    }

    /// Channel of a channel voice message
    #[must_use]
    pub fn channel(&self) -> Option<u8> {
        let status = self.status();
        status::is_channel(status).then_some(status & 0x0F)
    }

    /// Whether this is a single-byte real-time message
    #[must_use]
    pub fn is_real_time(&self) -> bool {
        status::is_real_time(self.status())
    }

    /// Write the message, omitting the status byte when running status
    /// allows it.
    ///
    /// Real-time messages leave the running status untouched; system
    /// messages clear it.
    pub fn write(&self, out: &mut impl BufMut, running: &mut RunningStatus) {
        let status = self.status();

        if status::is_channel(status) {
            if !(running.enabled && running.current == Some(status)) {
                out.put_u8(status);
            }
            running.current = Some(status);
        } else {
            if !status::is_real_time(status) {
                running.current = None;
            }
            out.put_u8(status);
        }

        match self {
            Self::NoteOff { note, velocity, .. } | Self::NoteOn { note, velocity, .. } => {
                out.put_u8(note & 0x7F);
                out.put_u8(velocity & 0x7F);
            }
            Self::PolyPressure { note, pressure, .. } => {
                out.put_u8(note & 0x7F);
                out.put_u8(pressure & 0x7F);
            }
            Self::ControlChange {
                controller, value, ..
            } => {
                out.put_u8(controller & 0x7F);
                out.put_u8(value & 0x7F);
            }
            Self::ProgramChange { program: v, .. }
            | Self::ChannelPressure { pressure: v, .. }
            | Self::TimeCodeQuarterFrame(v)
            | Self::SongSelect(v) => out.put_u8(v & 0x7F),
            Self::PitchBend { value: v, .. } | Self::SongPosition(v) => {
                let (lsb, msb) = split_14bit(*v);
                out.put_u8(lsb);
                out.put_u8(msb);
            }
            Self::SysEx(body) => {
                for byte in body {
                    out.put_u8(byte & 0x7F);
                }
                out.put_u8(status::SYSEX_END);
            }
            _ => {}
        }
    }

    /// Encoded length with the status byte present
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::SysEx(body) => body.len() + 2,
            other => 1 + status::data_len(other.status()).unwrap_or(0),
        }
    }

    /// Encoded bytes with the status byte always present
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3);
        self.write(&mut out, &mut RunningStatus::default());
        out
    }

    /// Parse one complete non-SysEx message (status byte first).
    ///
    /// Returns `None` when the frame is not exactly one well-formed message.
    #[must_use]
    pub fn from_bytes(frame: &[u8]) -> Option<Self> {
        let (&status_byte, data) = frame.split_first()?;
        if status::data_len(status_byte)? != data.len() || data.iter().any(|&b| b & 0x80 != 0)
        {
            return None;
        }

        let channel = status_byte & 0x0F;
        let d = |i: usize| data[i];

        let message = match status_byte {
            0x80..=0x8F => Self::NoteOff {
                channel,
                note: d(0),
                velocity: d(1),
            },
            0x90..=0x9F => Self::NoteOn {
                channel,
                note: d(0),
                velocity: d(1),
            },
            0xA0..=0xAF => Self::PolyPressure {
                channel,
                note: d(0),
                pressure: d(1),
            },
            0xB0..=0xBF => Self::ControlChange {
                channel,
                controller: d(0),
                value: d(1),
            },
            0xC0..=0xCF => Self::ProgramChange {
                channel,
                program: d(0),
            },
            0xD0..=0xDF => Self::ChannelPressure {
                channel,
                pressure: d(0),
            },
            0xE0..=0xEF => Self::PitchBend {
                channel,
                value: join_14bit(d(0), d(1)),
            },
            status::TIME_CODE_QUARTER_FRAME => Self::TimeCodeQuarterFrame(d(0)),
            status::SONG_POSITION => Self::SongPosition(join_14bit(d(0), d(1))),
            status::SONG_SELECT => Self::SongSelect(d(0)),
            status::TUNE_REQUEST => Self::TuneRequest,
            status::CLOCK => Self::Clock,
            status::START => Self::Start,
            status::CONTINUE => Self::Continue,
            status::STOP => Self::Stop,
            status::ACTIVE_SENSING => Self::ActiveSensing,
            status::RESET => Self::Reset,
            // F4, F5 and F9/FD carry no defined message
            _ => return None,
        };

        Some(message)
    }
}

fn split_14bit(value: u16) -> (u8, u8) {
    ((value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8)
}

fn join_14bit(lsb: u8, msb: u8) -> u16 {
    u16::from(lsb) | (u16::from(msb) << 7)
}
