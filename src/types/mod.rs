//! Core types module

mod config;

pub use config::{SessionConfig, SessionConfigBuilder};

use std::fmt;

/// One of the two datagram ports a session listens on.
///
/// The data port is always the control port plus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    /// Invitation handshake and session teardown
    Control,
    /// Clock synchronization and RTP-MIDI payloads
    Data,
}

impl Port {
    /// Port number for this role given the session's control port
    #[must_use]
    pub fn number(self, control_port: u16) -> u16 {
        match self {
            Self::Control => control_port,
            Self::Data => control_port.wrapping_add(1),
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control => write!(f, "control"),
            Self::Data => write!(f, "data"),
        }
    }
}
