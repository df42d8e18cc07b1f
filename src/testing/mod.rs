//! Test utilities: an in-memory datagram network and a handler that
//! records every callback.

mod network;
mod recorder;


pub use network::{MockEndpoint, MockNetwork};
pub use recorder::{Event, RecordingHandler};
