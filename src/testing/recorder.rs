use crate::error::Exception;
use crate::midi::MidiMessage;
use crate::session::SessionHandler;

/// A callback observed by [`RecordingHandler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `connected`
    Connected {
        /// Peer SSRC
        ssrc: u32,
        /// Announced name
        name: String,
    },
    /// `disconnected`
    Disconnected(u32),
    /// `exception`
    Exception(Exception),
    /// `midi`
    Midi {
        /// Sender SSRC
        ssrc: u32,
        /// Delivered message
        message: MidiMessage,
    },
}

/// Handler that records every callback in order
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    /// Callbacks in arrival order
    pub events: Vec<Event>,
}

impl RecordingHandler {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// SSRCs reported connected
    #[must_use]
    pub fn connected_ssrcs(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Connected { ssrc, .. } => Some(*ssrc),
                _ => None,
            })
            .collect()
    }

    /// SSRCs reported disconnected
    #[must_use]
    pub fn disconnected_ssrcs(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Disconnected(ssrc) => Some(*ssrc),
                _ => None,
            })
            .collect()
    }

    /// Exceptions raised
    #[must_use]
    pub fn exceptions(&self) -> Vec<Exception> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Exception(ex) => Some(ex.clone()),
                _ => None,
            })
            .collect()
    }

    /// MIDI messages delivered, sender ignored
    #[must_use]
    pub fn midi_messages(&self) -> Vec<MidiMessage> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Midi { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget everything recorded so far
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl SessionHandler for RecordingHandler {
    fn connected(&mut self, ssrc: u32, name: &str) {
        self.events.push(Event::Connected {
            ssrc,
            name: name.to_string(),
        });
    }

    fn disconnected(&mut self, ssrc: u32) {
        self.events.push(Event::Disconnected(ssrc));
    }

    fn exception(&mut self, exception: &Exception) {
        self.events.push(Event::Exception(exception.clone()));
    }

    fn midi(&mut self, ssrc: u32, message: &MidiMessage) {
        self.events.push(Event::Midi {
            ssrc,
            message: message.clone(),
        });
    }
}
