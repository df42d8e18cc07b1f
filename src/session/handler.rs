use crate::error::Exception;
use crate::midi::MidiMessage;

/// Application callbacks.
///
/// Every method has an empty default, so implementors override only the
/// events they care about. [`midi`](Self::midi) fans out to the
/// per-message methods unless overridden itself.
#[allow(unused_variables)]
pub trait SessionHandler {
    /// A participant completed the handshake
    fn connected(&mut self, ssrc: u32, name: &str) {}

    /// A participant's session ended
    fn disconnected(&mut self, ssrc: u32) {}

    /// A runtime error was classified; the session keeps running
    fn exception(&mut self, exception: &Exception) {}

    /// A MIDI message arrived from `ssrc`
    fn midi(&mut self, ssrc: u32, message: &MidiMessage) {
        match message {
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            } => self.note_off(ssrc, *channel, *note, *velocity),
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => self.note_on(ssrc, *channel, *note, *velocity),
            MidiMessage::PolyPressure {
                channel,
                note,
                pressure,
            } => self.poly_pressure(ssrc, *channel, *note, *pressure),
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => self.control_change(ssrc, *channel, *controller, *value),
            MidiMessage::ProgramChange { channel, program } => {
                self.program_change(ssrc, *channel, *program);
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                self.channel_pressure(ssrc, *channel, *pressure);
            }
            MidiMessage::PitchBend { channel, value } => self.pitch_bend(ssrc, *channel, *value),
            MidiMessage::SysEx(data) => self.sysex(ssrc, data),
            MidiMessage::TimeCodeQuarterFrame(value) => {
                self.time_code_quarter_frame(ssrc, *value);
            }
            MidiMessage::SongPosition(beats) => self.song_position(ssrc, *beats),
            MidiMessage::SongSelect(song) => self.song_select(ssrc, *song),
            MidiMessage::TuneRequest => self.tune_request(ssrc),
            MidiMessage::Clock => self.clock(ssrc),
            MidiMessage::Start => self.start(ssrc),
            MidiMessage::Continue => self.continue_playback(ssrc),
            MidiMessage::Stop => self.stop(ssrc),
            MidiMessage::ActiveSensing => self.active_sensing(ssrc),
            MidiMessage::Reset => self.reset(ssrc),
        }
    }

    /// Note off
    fn note_off(&mut self, ssrc: u32, channel: u8, note: u8, velocity: u8) {}
    /// Note on
    fn note_on(&mut self, ssrc: u32, channel: u8, note: u8, velocity: u8) {}
    /// Polyphonic key pressure
    fn poly_pressure(&mut self, ssrc: u32, channel: u8, note: u8, pressure: u8) {}
    /// Control change
    fn control_change(&mut self, ssrc: u32, channel: u8, controller: u8, value: u8) {}
    /// Program change
    fn program_change(&mut self, ssrc: u32, channel: u8, program: u8) {}
    /// Channel pressure
    fn channel_pressure(&mut self, ssrc: u32, channel: u8, pressure: u8) {}
    /// Pitch bend (0..=0x3FFF, centre 0x2000)
    fn pitch_bend(&mut self, ssrc: u32, channel: u8, value: u16) {}
    /// System exclusive payload without framing bytes
    fn sysex(&mut self, ssrc: u32, data: &[u8]) {}
    /// MIDI time code quarter frame
    fn time_code_quarter_frame(&mut self, ssrc: u32, value: u8) {}
    /// Song position pointer
    fn song_position(&mut self, ssrc: u32, beats: u16) {}
    /// Song select
    fn song_select(&mut self, ssrc: u32, song: u8) {}
    /// Tune request
    fn tune_request(&mut self, ssrc: u32) {}
    /// Timing clock
    fn clock(&mut self, ssrc: u32) {}
    /// Start
    fn start(&mut self, ssrc: u32) {}
    /// Continue
    fn continue_playback(&mut self, ssrc: u32) {}
    /// Stop
    fn stop(&mut self, ssrc: u32) {}
    /// Active sensing
    fn active_sensing(&mut self, ssrc: u32) {}
    /// System reset
    fn reset(&mut self, ssrc: u32) {}
}

/// Discards every event
impl SessionHandler for () {}
