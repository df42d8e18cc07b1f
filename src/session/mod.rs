//! Session management: participants, the invitation handshake, clock
//! synchronization and MIDI delivery.
//!
//! [`SessionEngine`] holds all protocol state and never touches a socket.
//! The dispatcher feeds it decoded messages and sends what it queues.

mod engine;
mod handler;
mod participant;
pub mod sequence_tracker;
pub mod sync;
mod table;

#[cfg(test)]
mod tests;

pub use engine::{DataSink, Datagram, SessionEngine};
pub(crate) use engine::raise;
pub use handler::SessionHandler;
pub use participant::{InvitationStatus, Participant, Role};
pub use sequence_tracker::{GapInfo, SequenceStats, SequenceTracker};
pub use sync::ClockSync;
pub use table::ParticipantTable;
