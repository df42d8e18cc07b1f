//! Receive path: per-port byte buffers and the decode loop.
//!
//! Datagrams are appended to the buffer of the port they arrived on and
//! decoded from the front until the buffer empties or a decoder asks for
//! more data. Control datagrams start with `0xFF`; anything else on the
//! data port is RTP-MIDI. A malformed byte is dropped and decoding
//! resumes at the next one.

mod buffer;


pub use buffer::ReceiveBuffer;

use std::net::SocketAddr;
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::error::Exception;
use crate::net::Endpoint;
use crate::protocol::ParseError;
use crate::protocol::applemidi::{ControlMessage, SIGNATURE};
use crate::protocol::rtpmidi::RtpMidiDecoder;
use crate::session::{SessionEngine, SessionHandler, raise};
use crate::types::{Port, SessionConfig};

/// Largest datagram read in one call
const MAX_DATAGRAM: usize = 65_536;

#[derive(Debug)]
struct PortState {
    buffer: ReceiveBuffer,
    /// Sender of the most recent datagram
    from: Option<SocketAddr>,
    /// A session name is waiting for its terminator
    stalled: bool,
}

impl PortState {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: ReceiveBuffer::new(capacity),
            from: None,
            stalled: false,
        }
    }
}

/// Routes received bytes to the control codec, the RTP-MIDI decoder and
/// finally the session engine
#[derive(Debug)]
pub struct Dispatcher {
    control: PortState,
    data: PortState,
    decoder: RtpMidiDecoder,
    scratch: Vec<u8>,
    max_name_len: usize,
}

impl Dispatcher {
    /// Create a dispatcher sized from `config`
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            control: PortState::new(config.receive_buffer_size),
            data: PortState::new(config.receive_buffer_size),
            decoder: RtpMidiDecoder::new(config.max_sysex_frame),
            scratch: vec![0; MAX_DATAGRAM],
            max_name_len: config.max_session_name_len,
        }
    }

    /// Bytes waiting in `port`'s buffer
    #[must_use]
    pub fn buffered(&self, port: Port) -> usize {
        self.state(port).buffer.len()
    }

    /// Read every datagram `endpoint` has ready for `port` and process
    /// each one as it arrives. Returns the number of bytes read.
    pub fn drain<E: Endpoint>(
        &mut self,
        port: Port,
        endpoint: &mut E,
        engine: &mut SessionEngine,
        handler: &mut impl SessionHandler,
        now: Instant,
    ) -> usize {
        let mut total = 0;
        loop {
            let n = match endpoint.receive_into(&mut self.scratch) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!(%port, error = %e, "Receive failed");
                    break;
                }
            };
            total += n;

            let Some(from) = endpoint.remote_addr() else {
                trace!(%port, "Datagram without sender address");
                continue;
            };
            let datagram = std::mem::take(&mut self.scratch);
            self.receive(port, from, &datagram[..n], engine, handler, now);
            self.scratch = datagram;
        }

        if total == 0 {
            self.settle(port, engine, handler, now);
        }
        total
    }

    /// Process one datagram received on `port` from `from`
    pub fn receive(
        &mut self,
        port: Port,
        from: SocketAddr,
        datagram: &[u8],
        engine: &mut SessionEngine,
        handler: &mut impl SessionHandler,
        now: Instant,
    ) {
        let state = self.state_mut(port);
        state.from = Some(from);
        let dropped = state.buffer.extend(datagram);
        if dropped > 0 {
            raise(handler, Exception::BufferFull { port, dropped });
        }
        self.process(port, false, engine, handler, now);

        if dropped > 0 && port == Port::Data && !self.decoder.is_idle() {
            // The rest of this packet was dropped and can never arrive.
            debug!(dropped, "Abandoning truncated RTP-MIDI packet");
            self.data.buffer.clear();
            self.data.stalled = false;
            self.decoder.reset();
            engine.end_packet();
        }
    }

    /// Called when a poll cycle brought no new bytes for `port`: a name
    /// still waiting for its terminator ends at the end of the buffer.
    pub fn settle(
        &mut self,
        port: Port,
        engine: &mut SessionEngine,
        handler: &mut impl SessionHandler,
        now: Instant,
    ) {
        if self.state(port).stalled {
            trace!(%port, "Decoding unterminated session name");
            self.process(port, true, engine, handler, now);
        }
    }

    fn process(
        &mut self,
        port: Port,
        at_end: bool,
        engine: &mut SessionEngine,
        handler: &mut impl SessionHandler,
        now: Instant,
    ) {
        loop {
            let state = match port {
                Port::Control => &mut self.control,
                Port::Data => &mut self.data,
            };
            let buf = state.buffer.as_slice();
            let Some(&first) = buf.first() else {
                state.stalled = false;
                return;
            };
            let from = state.from;

            let is_control =
                port == Port::Control || (self.decoder.is_idle() && first == SIGNATURE[0]);

            let result = if is_control {
                let decoded = if at_end {
                    ControlMessage::decode_to_end(buf, self.max_name_len)
                } else {
                    ControlMessage::decode(buf, self.max_name_len)
                };
                match decoded {
                    Ok((message, used)) => {
                        state.buffer.consume(used);
                        if let Some(from) = from {
                            engine.handle_control(message, port, from, now, handler);
                        }
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            } else {
                let mut sink = engine.midi_sink(handler, now);
                let decoded = self.decoder.decode(buf, &mut sink);
                if self.decoder.is_idle() {
                    engine.end_packet();
                }
                match decoded {
                    Ok(used) => {
                        state.buffer.consume(used);
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            };

            match result {
                Ok(()) => state.stalled = false,
                Err(err) if err.needs_more_data() => {
                    if !state.buffer.is_full() {
                        state.stalled = err == ParseError::NotSureGiveMeMoreData;
                        return;
                    }
                    // Nothing more can arrive to complete this unit.
                    state.buffer.consume(1);
                    state.stalled = false;
                    if !is_control {
                        self.decoder.reset();
                        engine.end_packet();
                    }
                    raise(handler, Exception::UnexpectedData { port });
                }
                Err(err) => {
                    state.buffer.consume(1);
                    state.stalled = false;
                    raise(handler, classify(err, port));
                }
            }
        }
    }

    fn state(&self, port: Port) -> &PortState {
        match port {
            Port::Control => &self.control,
            Port::Data => &self.data,
        }
    }

    fn state_mut(&mut self, port: Port) -> &mut PortState {
        match port {
            Port::Control => &mut self.control,
            Port::Data => &mut self.data,
        }
    }
}

fn classify(err: ParseError, port: Port) -> Exception {
    match err {
        ParseError::UnexpectedMidiData => Exception::UnexpectedMidiData,
        ParseError::UnexpectedJournalData => Exception::UnexpectedJournalData,
        _ => Exception::UnexpectedData { port },
    }
}
