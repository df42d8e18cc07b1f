mod engine;

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::protocol::applemidi::{ControlMessage, Invitation, Synchronization};
use crate::protocol::rtp::RtpHeader;
use crate::protocol::rtpmidi::{RtpMidiDecoder, encode_packet};
use crate::session::{Datagram, SessionEngine};
use crate::testing::RecordingHandler;
use crate::types::{Port, SessionConfig, SessionConfigBuilder};

pub(super) const LOCAL_SSRC: u32 = 0x5151_0000;

pub(super) fn peer() -> SocketAddr {
    "10.0.0.2:5004".parse().unwrap()
}

pub(super) fn peer_data() -> SocketAddr {
    "10.0.0.2:5005".parse().unwrap()
}

pub(super) fn config() -> SessionConfigBuilder {
    SessionConfig::builder().session_name("local").ssrc(LOCAL_SSRC)
}

pub(super) fn engine(now: Instant) -> SessionEngine {
    SessionEngine::new(config().build(), now).unwrap()
}

pub(super) fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

pub(super) fn drain(engine: &mut SessionEngine) -> Vec<Datagram> {
    std::iter::from_fn(|| engine.pop_datagram()).collect()
}

/// Outbox decoded as control messages
pub(super) fn sent(engine: &mut SessionEngine) -> Vec<(Port, SocketAddr, ControlMessage)> {
    drain(engine)
        .into_iter()
        .map(|d| {
            let (message, _) = ControlMessage::decode(&d.bytes, 64).unwrap();
            (d.port, d.dest, message)
        })
        .collect()
}

pub(super) fn invitation(ssrc: u32, token: u32, name: &str) -> ControlMessage {
    ControlMessage::Invitation(Invitation::new(token, ssrc, name))
}

pub(super) fn sync_message(ssrc: u32, count: u8, timestamps: [u64; 3]) -> ControlMessage {
    ControlMessage::Synchronization(Synchronization {
        ssrc,
        count,
        timestamps,
    })
}

/// Run the listener side of a handshake with `ssrc` and clear the outbox
pub(super) fn connect_listener(
    engine: &mut SessionEngine,
    handler: &mut RecordingHandler,
    ssrc: u32,
    now: Instant,
) {
    let token = ssrc ^ 0xFFFF;
    engine.handle_control(invitation(ssrc, token, "peer"), Port::Control, peer(), now, handler);
    engine.handle_control(invitation(ssrc, token, "peer"), Port::Data, peer_data(), now, handler);
    drain(engine);
}

/// Run the initiator side of a handshake with `ssrc`, ending with the
/// first `CK0` still in the outbox
pub(super) fn connect_initiator(
    engine: &mut SessionEngine,
    handler: &mut RecordingHandler,
    ssrc: u32,
    now: Instant,
) -> u32 {
    let token = engine.invite(peer(), now).unwrap();
    let accepted = ControlMessage::InvitationAccepted(Invitation::new(token, ssrc, "remote"));
    engine.handle_control(accepted.clone(), Port::Control, peer(), now, handler);
    engine.tick(now, handler);
    engine.handle_control(accepted, Port::Data, peer_data(), now, handler);
    drain(engine);
    engine.tick(now, handler);
    token
}

pub(super) fn midi_packet(ssrc: u32, sequence: u16, commands: &[u8]) -> Vec<u8> {
    encode_packet(&RtpHeader::new_midi(sequence, 0, ssrc), commands)
        .unwrap()
        .to_vec()
}

/// Push a complete RTP-MIDI datagram through the engine
pub(super) fn receive(
    engine: &mut SessionEngine,
    handler: &mut RecordingHandler,
    now: Instant,
    datagram: &[u8],
) {
    let mut decoder = RtpMidiDecoder::default();
    let mut offset = 0;
    // A fresh sink per unit, as the dispatcher does
    while offset < datagram.len() {
        let mut sink = engine.midi_sink(handler, now);
        offset += decoder.decode(&datagram[offset..], &mut sink).unwrap();
    }
    assert!(decoder.is_idle());
    engine.end_packet();
}
