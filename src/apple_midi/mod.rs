//! Session front-end tying the transport to the engine
//!
//! [`AppleMidi`] owns the two endpoints, the receive dispatcher, the
//! session engine and the application handler. [`poll`](AppleMidi::poll)
//! is one cooperative step; the async driver simply calls it on a timer.

use std::io;
use std::net::SocketAddr;
#[cfg(feature = "tokio-runtime")]
use std::net::{IpAddr, Ipv4Addr};
use std::time::Instant;

use tracing::{debug, info, trace};

use crate::dispatcher::Dispatcher;
use crate::error::{Exception, Result};
use crate::midi::MidiMessage;
use crate::net::Endpoint;
use crate::session::{SessionEngine, SessionHandler, raise};
use crate::types::{Port, SessionConfig};

#[cfg(feature = "tokio-runtime")]
use crate::net::{Runtime, UdpEndpoint};


/// An AppleMIDI session bound to a control and a data endpoint
///
/// # Example
///
/// ```rust,no_run
/// use applemidi::{AppleMidi, MidiMessage, SessionConfig, SessionHandler};
///
/// struct Printer;
///
/// impl SessionHandler for Printer {
///     fn note_on(&mut self, ssrc: u32, channel: u8, note: u8, velocity: u8) {
///         println!("{ssrc:08x}: note {note} on ch {channel} vel {velocity}");
///     }
/// }
///
/// # async fn example() -> Result<(), applemidi::AppleMidiError> {
/// let config = SessionConfig::builder().session_name("studio").build();
/// let mut session = AppleMidi::bind(config, Printer).await?;
///
/// session.invite("192.168.1.20:5004".parse().unwrap(), std::time::Instant::now())?;
/// session.send(&MidiMessage::NoteOn { channel: 0, note: 60, velocity: 100 });
///
/// let (_stop, shutdown) = tokio::sync::watch::channel(false);
/// session.run(shutdown).await;
/// # Ok(())
/// # }
/// ```
pub struct AppleMidi<E: Endpoint, H: SessionHandler> {
    control: E,
    data: E,
    dispatcher: Dispatcher,
    engine: SessionEngine,
    handler: H,
}

impl<E: Endpoint, H: SessionHandler> AppleMidi<E, H> {
    /// Create a session over already bound endpoints
    ///
    /// # Errors
    ///
    /// Returns `AppleMidiError::InvalidConfig` if `config` does not validate.
    pub fn new(config: SessionConfig, control: E, data: E, handler: H, now: Instant) -> Result<Self> {
        let dispatcher = Dispatcher::new(&config);
        let engine = SessionEngine::new(config, now)?;
        info!(
            ssrc = format_args!("{:08x}", engine.ssrc()),
            name = %engine.config().session_name,
            "AppleMIDI session started"
        );
        Ok(Self {
            control,
            data,
            dispatcher,
            engine,
            handler,
        })
    }

    /// Run one cycle: receive on control then data, advance timers, send
    /// queued MIDI and every pending datagram
    pub fn poll(&mut self, now: Instant) {
        self.dispatcher.drain(
            Port::Control,
            &mut self.control,
            &mut self.engine,
            &mut self.handler,
            now,
        );
        self.dispatcher.drain(
            Port::Data,
            &mut self.data,
            &mut self.engine,
            &mut self.handler,
            now,
        );
        self.engine.tick(now, &mut self.handler);
        self.engine.flush(now);
        self.transmit();
    }

    /// Invite the session whose control port is at `remote`. Returns the
    /// initiator token.
    ///
    /// # Errors
    ///
    /// Returns `AppleMidiError::NoFreeSlot` if the participant table is full.
    pub fn invite(&mut self, remote: SocketAddr, now: Instant) -> Result<u32> {
        let token = self.engine.invite(remote, now)?;
        self.transmit();
        Ok(token)
    }

    /// Queue `message` for every connected participant; it goes out on
    /// the next [`poll`](Self::poll)
    pub fn send(&mut self, message: &MidiMessage) {
        self.engine.send_midi(message);
    }

    /// End the session with one participant
    ///
    /// # Errors
    ///
    /// Returns `AppleMidiError::ParticipantNotFound` for an unknown SSRC.
    pub fn end_session(&mut self, ssrc: u32) -> Result<()> {
        self.engine.end_session(ssrc, &mut self.handler)?;
        self.transmit();
        Ok(())
    }

    /// End every session
    pub fn end_sessions(&mut self) {
        self.engine.send_end_session(&mut self.handler);
        self.transmit();
    }

    /// The session engine
    #[must_use]
    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }

    /// Local SSRC
    #[must_use]
    pub fn ssrc(&self) -> u32 {
        self.engine.ssrc()
    }

    /// The application handler
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The application handler, mutably
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Address of the control endpoint
    ///
    /// # Errors
    ///
    /// The endpoint could not report its address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.control.local_addr()
    }

    /// Send queued datagrams in order. A socket that is not writable yet
    /// keeps the rest queued for the next call.
    fn transmit(&mut self) {
        while let Some(datagram) = self.engine.pop_datagram() {
            let endpoint = match datagram.port {
                Port::Control => &mut self.control,
                Port::Data => &mut self.data,
            };
            match endpoint.send(&datagram.bytes, datagram.dest) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    trace!(
                        port = %datagram.port,
                        pending = self.engine.pending_datagrams() + 1,
                        "Socket not writable, deferring"
                    );
                    self.engine.requeue(datagram);
                    return;
                }
                Err(e) => {
                    debug!(port = %datagram.port, dest = %datagram.dest, error = %e, "Send failed");
                    raise(
                        &mut self.handler,
                        Exception::SendPacketsDropped {
                            port: datagram.port,
                            len: datagram.bytes.len(),
                        },
                    );
                }
            }
        }
    }
}

#[cfg(feature = "tokio-runtime")]
impl<H: SessionHandler> AppleMidi<UdpEndpoint, H> {
    /// Bind `0.0.0.0` on the configured control port and the port above it
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or either port
    /// cannot be bound.
    pub async fn bind(config: SessionConfig, handler: H) -> Result<Self> {
        config.validate()?;
        let ip: IpAddr = Ipv4Addr::UNSPECIFIED.into();
        let control = UdpEndpoint::bind(SocketAddr::new(ip, config.control_port)).await?;
        let data = UdpEndpoint::bind(SocketAddr::new(ip, config.data_port())).await?;
        Self::new(config, control, data, handler, Runtime::now())
    }

    /// Poll every `poll_interval` until `shutdown` turns true or its
    /// sender goes away, then end all sessions
    pub async fn run(&mut self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let interval = self.engine.config().poll_interval;
        while !*shutdown.borrow() {
            self.poll(Runtime::now());
            tokio::select! {
                () = Runtime::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("AppleMIDI session shutting down");
        self.end_sessions();
    }
}

impl<E: Endpoint, H: SessionHandler> Drop for AppleMidi<E, H> {
    fn drop(&mut self) {
        if !self.engine.participants().is_empty() {
            self.end_sessions();
        }
    }
}

impl<E: Endpoint, H: SessionHandler> std::fmt::Debug for AppleMidi<E, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppleMidi")
            .field("ssrc", &format_args!("{:08x}", self.engine.ssrc()))
            .field("participants", &self.engine.participants().len())
            .finish_non_exhaustive()
    }
}
