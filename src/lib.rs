//! # applemidi
//!
//! A pure Rust implementation of the AppleMIDI (RTP-MIDI) session protocol.
//!
//! ## Features
//!
//! - Invitation handshake as initiator and listener
//! - Three-way clock synchronization with liveness timeout
//! - RTP-MIDI command sections with running status and SysEx segmentation
//! - Receiver feedback and packet-loss detection
//! - Bonjour advertisement and browsing (feature `discovery`)
//!
//! ## Example
//!
//! ```rust,no_run
//! use applemidi::{AppleMidi, MidiMessage, SessionConfig, SessionHandler};
//!
//! struct Monitor;
//!
//! impl SessionHandler for Monitor {
//!     fn connected(&mut self, ssrc: u32, name: &str) {
//!         println!("{name} ({ssrc:08x}) joined");
//!     }
//!
//!     fn midi(&mut self, ssrc: u32, message: &MidiMessage) {
//!         println!("{ssrc:08x}: {message:?}");
//!     }
//! }
//!
//! # async fn example() -> Result<(), applemidi::AppleMidiError> {
//! let config = SessionConfig::builder().session_name("rust").build();
//! let mut session = AppleMidi::bind(config, Monitor).await?;
//!
//! let (_stop, shutdown) = tokio::sync::watch::channel(false);
//! session.run(shutdown).await;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Front-end**: [`AppleMidi`] owns two endpoints and drives everything
//!   from `poll`
//! - **Engine**: [`SessionEngine`] keeps participants and timers; it does
//!   no I/O and takes the current time as an argument
//! - **Codecs**: [`protocol`] and [`midi`] encode and decode wire formats

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
/// MIDI messages and the receive-side parser
pub mod midi;
/// Wire formats
pub mod protocol;
/// Session state machine
pub mod session;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;

pub mod dispatcher;
#[cfg(feature = "discovery")]
pub mod discovery;
pub mod net;

mod apple_midi;

// Re-exports
pub use apple_midi::AppleMidi;
pub use error::{AppleMidiError, Exception};
pub use midi::MidiMessage;
pub use net::Endpoint;
#[cfg(feature = "tokio-runtime")]
pub use net::UdpEndpoint;
pub use session::{SessionEngine, SessionHandler};
pub use types::{Port, SessionConfig, SessionConfigBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::apple_midi::AppleMidi;
    pub use crate::error::{AppleMidiError, Exception};
    pub use crate::midi::MidiMessage;
    pub use crate::net::Endpoint;
    pub use crate::session::SessionHandler;
    pub use crate::types::{Port, SessionConfig};
}
