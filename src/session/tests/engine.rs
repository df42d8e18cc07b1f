use std::time::Instant;

use crate::error::{AppleMidiError, Exception};
use crate::midi::MidiMessage;
use crate::protocol::applemidi::{ControlMessage, EndSession, Invitation};
use crate::protocol::rtp::RtpHeader;
use crate::session::{InvitationStatus, Role, SessionEngine};
use crate::testing::{Event, RecordingHandler};
use crate::types::Port;

use super::{
    LOCAL_SSRC, config, connect_initiator, connect_listener, drain, engine, invitation,
    midi_packet, ms, peer, peer_data, receive, sent, sync_message,
};

#[test]
fn test_random_ssrc_is_nonzero() {
    let config = crate::types::SessionConfig::builder()
        .session_name("x")
        .build();
    let engine = SessionEngine::new(config, Instant::now()).unwrap();
    assert_ne!(engine.ssrc(), 0);
}

#[test]
fn test_invalid_config_rejected() {
    let config = config().max_participants(0).build();
    let err = SessionEngine::new(config, Instant::now()).unwrap_err();
    assert!(matches!(
        err,
        AppleMidiError::InvalidConfig {
            name: "max_participants",
            ..
        }
    ));
}

#[test]
fn test_timestamp_ticks() {
    let t0 = Instant::now();
    let engine = engine(t0);
    assert_eq!(engine.timestamp(t0), 0);
    assert_eq!(engine.timestamp(t0 + ms(1)), 10);
    assert_eq!(engine.timestamp(t0 + ms(2500)), 25_000);
}

#[test]
fn test_listener_handshake() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();

    engine.handle_control(
        invitation(0x1001, 0xAAAA, "peerA"),
        Port::Control,
        peer(),
        t0,
        &mut handler,
    );

    let out = sent(&mut engine);
    assert_eq!(out.len(), 1);
    let (port, dest, message) = &out[0];
    assert_eq!(*port, Port::Control);
    assert_eq!(*dest, peer());
    match message {
        ControlMessage::InvitationAccepted(ok) => {
            assert_eq!(ok.initiator_token, 0xAAAA);
            assert_eq!(ok.ssrc, LOCAL_SSRC);
            assert_eq!(ok.name, "local");
        }
        other => panic!("expected OK, got {other:?}"),
    }

    let p = engine.participant(0x1001).unwrap();
    assert_eq!(p.role(), Role::Listener);
    assert_eq!(p.status(), InvitationStatus::ControlInvited);
    assert_eq!(p.name(), "peerA");
    assert!(!p.is_connected());
    assert!(handler.events.is_empty());

    engine.handle_control(
        invitation(0x1001, 0xAAAA, "peerA"),
        Port::Data,
        peer_data(),
        t0,
        &mut handler,
    );

    let out = sent(&mut engine);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0, Port::Data);
    assert_eq!(out[0].1, peer_data());
    assert!(matches!(out[0].2, ControlMessage::InvitationAccepted(_)));

    assert!(engine.participant(0x1001).unwrap().is_connected());
    assert_eq!(
        handler.events,
        vec![Event::Connected {
            ssrc: 0x1001,
            name: "peerA".to_string()
        }]
    );
}

#[test]
fn test_repeated_data_invitation_connects_once() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();
    connect_listener(&mut engine, &mut handler, 0x1001, t0);

    engine.handle_control(
        invitation(0x1001, 0x1, "peer"),
        Port::Data,
        peer_data(),
        t0 + ms(10),
        &mut handler,
    );

    assert_eq!(sent(&mut engine).len(), 1);
    assert_eq!(handler.connected_ssrcs(), vec![0x1001]);
}

#[test]
fn test_repeated_control_invitation_reaccepted() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();
    connect_listener(&mut engine, &mut handler, 0x1001, t0);

    engine.handle_control(
        invitation(0x1001, 0x77, "renamed"),
        Port::Control,
        peer(),
        t0,
        &mut handler,
    );

    let out = sent(&mut engine);
    assert!(matches!(&out[0].2, ControlMessage::InvitationAccepted(ok) if ok.initiator_token == 0x77));
    assert_eq!(engine.participants().len(), 1);
    assert_eq!(engine.participant(0x1001).unwrap().name(), "renamed");
}

#[test]
fn test_table_full_rejects() {
    let t0 = Instant::now();
    let mut engine = SessionEngine::new(config().max_participants(1).build(), t0).unwrap();
    let mut handler = RecordingHandler::new();
    connect_listener(&mut engine, &mut handler, 0x1001, t0);

    engine.handle_control(
        invitation(0x2002, 0xBBBB, "peerB"),
        Port::Control,
        peer(),
        t0,
        &mut handler,
    );

    let out = sent(&mut engine);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0, Port::Control);
    match &out[0].2 {
        ControlMessage::InvitationRejected(no) => assert_eq!(no.initiator_token, 0xBBBB),
        other => panic!("expected NO, got {other:?}"),
    }
    assert_eq!(
        handler.exceptions(),
        vec![Exception::TooManyParticipants { ssrc: 0x2002 }]
    );
    assert_eq!(engine.participants().len(), 1);
    assert!(engine.participant(0x2002).is_none());
}

#[test]
fn test_data_invitation_without_control() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();

    engine.handle_control(
        invitation(0x3003, 0xCCCC, "stray"),
        Port::Data,
        peer_data(),
        t0,
        &mut handler,
    );

    let out = sent(&mut engine);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0, Port::Data);
    assert!(matches!(out[0].2, ControlMessage::InvitationRejected(_)));
    assert_eq!(
        handler.exceptions(),
        vec![Exception::ParticipantNotFound { ssrc: 0x3003 }]
    );
}

#[test]
fn test_reserved_ssrc_rejected() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();

    engine.handle_control(invitation(0, 0x1, "zero"), Port::Control, peer(), t0, &mut handler);

    let out = sent(&mut engine);
    assert!(matches!(out[0].2, ControlMessage::InvitationRejected(_)));
    assert!(engine.participants().is_empty());
}

#[test]
fn test_end_session_from_peer() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();
    connect_listener(&mut engine, &mut handler, 0x1001, t0);

    engine.handle_control(
        ControlMessage::EndSession(EndSession::new(0, 0x1001)),
        Port::Control,
        peer(),
        t0,
        &mut handler,
    );

    assert!(engine.participants().is_empty());
    assert_eq!(handler.disconnected_ssrcs(), vec![0x1001]);
    assert!(drain(&mut engine).is_empty());

    // Unknown sender is ignored
    engine.handle_control(
        ControlMessage::EndSession(EndSession::new(0, 0x1001)),
        Port::Control,
        peer(),
        t0,
        &mut handler,
    );
    assert_eq!(handler.disconnected_ssrcs(), vec![0x1001]);
    assert!(handler.exceptions().is_empty());
}

#[test]
fn test_listener_timeout() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();
    connect_listener(&mut engine, &mut handler, 0x1001, t0);

    engine.tick(t0 + ms(61_000), &mut handler);
    assert_eq!(engine.participants().len(), 1);
    assert!(drain(&mut engine).is_empty());

    engine.tick(t0 + ms(61_001), &mut handler);
    assert!(engine.participants().is_empty());

    let out = sent(&mut engine);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0, Port::Control);
    assert_eq!(out[0].1, peer());
    assert!(matches!(&out[0].2, ControlMessage::EndSession(by) if by.ssrc == LOCAL_SSRC));
    assert_eq!(handler.disconnected_ssrcs(), vec![0x1001]);
    assert_eq!(
        handler.exceptions(),
        vec![Exception::ListenerTimeOut { ssrc: 0x1001 }]
    );

    engine.tick(t0 + ms(70_000), &mut handler);
    assert!(drain(&mut engine).is_empty());
    assert_eq!(handler.disconnected_ssrcs().len(), 1);
}

#[test]
fn test_listener_answers_ck0() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();
    connect_listener(&mut engine, &mut handler, 0x1001, t0);

    engine.handle_control(
        sync_message(0x1001, 0, [1234, 0, 0]),
        Port::Data,
        peer_data(),
        t0 + ms(2),
        &mut handler,
    );

    let out = sent(&mut engine);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0, Port::Data);
    assert_eq!(out[0].1, peer_data());
    match &out[0].2 {
        ControlMessage::Synchronization(ck) => {
            assert_eq!(ck.ssrc, LOCAL_SSRC);
            assert_eq!(ck.count, 1);
            assert_eq!(ck.timestamps, [1234, 20, 0]);
        }
        other => panic!("expected CK1, got {other:?}"),
    }
}

#[test]
fn test_ck2_keeps_listener_alive() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();
    connect_listener(&mut engine, &mut handler, 0x1001, t0);

    engine.handle_control(
        sync_message(0x1001, 2, [1, 2, 3]),
        Port::Data,
        peer_data(),
        t0 + ms(60_000),
        &mut handler,
    );
    engine.tick(t0 + ms(61_001), &mut handler);

    assert!(engine.participant(0x1001).is_some());
    assert!(handler.exceptions().is_empty());
}

#[test]
fn test_sync_from_unknown_participant() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();

    engine.handle_control(sync_message(0x4444, 0, [1, 0, 0]), Port::Data, peer_data(), t0, &mut handler);

    assert!(drain(&mut engine).is_empty());
    assert_eq!(
        handler.exceptions(),
        vec![Exception::ParticipantNotFound { ssrc: 0x4444 }]
    );
}

#[test]
fn test_initiator_handshake() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();

    let token = engine.invite(peer(), t0).unwrap();
    let out = sent(&mut engine);
    assert_eq!(out.len(), 1);
    assert_eq!((out[0].0, out[0].1), (Port::Control, peer()));
    match &out[0].2 {
        ControlMessage::Invitation(inv) => {
            assert_eq!(inv.initiator_token, token);
            assert_eq!(inv.ssrc, LOCAL_SSRC);
            assert_eq!(inv.name, "local");
        }
        other => panic!("expected IN, got {other:?}"),
    }

    let accepted = ControlMessage::InvitationAccepted(Invitation::new(token, 0x2002, "remote"));
    engine.handle_control(accepted.clone(), Port::Control, peer(), t0 + ms(5), &mut handler);
    let p = engine.participant(0x2002).unwrap();
    assert_eq!(p.status(), InvitationStatus::ControlAccepted);
    assert_eq!(p.name(), "remote");

    engine.tick(t0 + ms(5), &mut handler);
    let out = sent(&mut engine);
    assert_eq!(out.len(), 1);
    assert_eq!((out[0].0, out[0].1), (Port::Data, peer_data()));
    assert!(matches!(out[0].2, ControlMessage::Invitation(_)));

    engine.handle_control(accepted, Port::Data, peer_data(), t0 + ms(8), &mut handler);
    assert_eq!(
        engine.participant(0x2002).unwrap().status(),
        InvitationStatus::DataAccepted
    );
    assert!(handler.events.is_empty());

    engine.tick(t0 + ms(10), &mut handler);
    assert!(engine.participant(0x2002).unwrap().is_connected());
    assert_eq!(
        handler.events,
        vec![Event::Connected {
            ssrc: 0x2002,
            name: "remote".to_string()
        }]
    );

    let out = sent(&mut engine);
    assert_eq!(out.len(), 1);
    assert_eq!((out[0].0, out[0].1), (Port::Data, peer_data()));
    match &out[0].2 {
        ControlMessage::Synchronization(ck) => {
            assert_eq!(ck.count, 0);
            assert_eq!(ck.timestamps[0], 100);
        }
        other => panic!("expected CK0, got {other:?}"),
    }
}

#[test]
fn test_initiator_completes_sync_round() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();
    connect_initiator(&mut engine, &mut handler, 0x2002, t0 + ms(10));
    drain(&mut engine);

    engine.handle_control(
        sync_message(0x2002, 1, [100, 5000, 0]),
        Port::Data,
        peer_data(),
        t0 + ms(20),
        &mut handler,
    );

    let out = sent(&mut engine);
    match &out[0].2 {
        ControlMessage::Synchronization(ck) => {
            assert_eq!(ck.count, 2);
            assert_eq!(ck.timestamps, [100, 5000, 200]);
        }
        other => panic!("expected CK2, got {other:?}"),
    }
    let p = engine.participant(0x2002).unwrap();
    assert_eq!(p.clock_offset(), Some(-4850));
    assert!(!p.clock_sync().is_synchronizing());
}

#[test]
fn test_sync_cadence() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();
    connect_initiator(&mut engine, &mut handler, 0x2002, t0);
    assert_eq!(drain(&mut engine).len(), 1);

    let answer = |engine: &mut SessionEngine, handler: &mut RecordingHandler, at| {
        engine.handle_control(sync_message(0x2002, 1, [0, 0, 0]), Port::Data, peer_data(), at, handler);
        drain(engine);
    };

    // Second round follows the first after 500 ms
    answer(&mut engine, &mut handler, t0);
    engine.tick(t0 + ms(499), &mut handler);
    assert!(drain(&mut engine).is_empty());
    engine.tick(t0 + ms(500), &mut handler);
    assert_eq!(drain(&mut engine).len(), 1);

    // Then the medium cadence
    answer(&mut engine, &mut handler, t0 + ms(500));
    engine.tick(t0 + ms(1999), &mut handler);
    assert!(drain(&mut engine).is_empty());
    engine.tick(t0 + ms(2000), &mut handler);
    assert_eq!(drain(&mut engine).len(), 1);
}

#[test]
fn test_sync_max_attempts() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();
    connect_initiator(&mut engine, &mut handler, 0x2002, t0);
    assert_eq!(drain(&mut engine).len(), 1);

    // Unanswered CK0s are retried every 10 s
    for k in 1..5u64 {
        engine.tick(t0 + ms(k * 10_000 - 1), &mut handler);
        assert!(drain(&mut engine).is_empty());
        engine.tick(t0 + ms(k * 10_000), &mut handler);
        assert_eq!(drain(&mut engine).len(), 1);
    }
    assert_eq!(
        engine.participant(0x2002).unwrap().clock_sync().attempts(),
        5
    );

    engine.tick(t0 + ms(50_000), &mut handler);
    assert!(engine.participants().is_empty());
    let out = sent(&mut engine);
    assert_eq!(out.len(), 1);
    assert!(matches!(out[0].2, ControlMessage::EndSession(_)));
    assert_eq!(
        handler.exceptions(),
        vec![Exception::MaxAttempts { ssrc: 0x2002 }]
    );
    assert_eq!(handler.disconnected_ssrcs(), vec![0x2002]);
}

#[test]
fn test_invitation_retries_then_gives_up() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();
    let token = engine.invite(peer(), t0).unwrap();
    assert_eq!(drain(&mut engine).len(), 1);

    engine.tick(t0 + ms(999), &mut handler);
    assert!(drain(&mut engine).is_empty());

    for k in 1..13u64 {
        engine.tick(t0 + ms(k * 1000), &mut handler);
        let out = sent(&mut engine);
        assert_eq!(out.len(), 1, "retry {k}");
        assert!(matches!(out[0].2, ControlMessage::Invitation(_)));
    }

    engine.tick(t0 + ms(13_000), &mut handler);
    let out = sent(&mut engine);
    assert_eq!(out.len(), 1);
    assert!(matches!(&out[0].2, ControlMessage::EndSession(by) if by.initiator_token == token));
    assert!(engine.participants().is_empty());
    assert_eq!(
        handler.exceptions(),
        vec![Exception::NoResponseFromConnectionRequest { token }]
    );
    assert!(handler.disconnected_ssrcs().is_empty());
}

#[test]
fn test_invitation_rejected_by_peer() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();
    let token = engine.invite(peer(), t0).unwrap();
    drain(&mut engine);

    engine.handle_control(
        ControlMessage::InvitationRejected(Invitation::new(token, 0x2002, "")),
        Port::Control,
        peer(),
        t0,
        &mut handler,
    );

    assert!(engine.participants().is_empty());
    assert!(handler.events.is_empty());
}

#[test]
fn test_unknown_initiator_token() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();

    engine.handle_control(
        ControlMessage::InvitationAccepted(Invitation::new(0xDEAD, 0x2002, "x")),
        Port::Control,
        peer(),
        t0,
        &mut handler,
    );
    engine.handle_control(
        ControlMessage::InvitationRejected(Invitation::new(0xBEEF, 0x2002, "x")),
        Port::Control,
        peer(),
        t0,
        &mut handler,
    );

    assert_eq!(
        handler.exceptions(),
        vec![
            Exception::UnknownInitiatorToken { token: 0xDEAD },
            Exception::UnknownInitiatorToken { token: 0xBEEF },
        ]
    );
}

#[test]
fn test_second_invitation_to_same_peer_dropped() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();
    connect_initiator(&mut engine, &mut handler, 0x2002, t0);

    let token = engine.invite(peer(), t0).unwrap();
    drain(&mut engine);
    engine.handle_control(
        ControlMessage::InvitationAccepted(Invitation::new(token, 0x2002, "remote")),
        Port::Control,
        peer(),
        t0,
        &mut handler,
    );
    engine.tick(t0 + ms(1), &mut handler);

    assert_eq!(engine.participants().len(), 1);
    assert_eq!(handler.connected_ssrcs(), vec![0x2002]);
    // No data-port invitation and no BY that would end the live session
    let out = sent(&mut engine);
    assert!(out.iter().all(|(_, _, m)| !matches!(
        m,
        ControlMessage::Invitation(_) | ControlMessage::EndSession(_)
    )));

    engine.send_midi(&MidiMessage::Clock);
    engine.flush(t0 + ms(2));
    assert_eq!(drain(&mut engine).len(), 1);
}

#[test]
fn test_acceptance_with_reserved_ssrc_dropped() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();

    let token = engine.invite(peer(), t0).unwrap();
    drain(&mut engine);
    engine.handle_control(
        ControlMessage::InvitationAccepted(Invitation::new(token, 0, "zero")),
        Port::Control,
        peer(),
        t0,
        &mut handler,
    );

    assert!(engine.participants().is_empty());
    assert!(handler.events.is_empty());
}

#[test]
fn test_invite_fails_when_full() {
    let t0 = Instant::now();
    let mut engine = SessionEngine::new(config().max_participants(1).build(), t0).unwrap();
    engine.invite(peer(), t0).unwrap();

    let err = engine.invite(peer(), t0).unwrap_err();
    assert!(matches!(err, AppleMidiError::NoFreeSlot { capacity: 1 }));
}

#[test]
fn test_receive_midi_and_feedback() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();
    connect_listener(&mut engine, &mut handler, 0x1001, t0);
    handler.clear();

    receive(
        &mut engine,
        &mut handler,
        t0 + ms(100),
        &midi_packet(0x1001, 42, &[0x90, 60, 100]),
    );

    assert_eq!(
        handler.events,
        vec![Event::Midi {
            ssrc: 0x1001,
            message: MidiMessage::NoteOn {
                channel: 0,
                note: 60,
                velocity: 100
            }
        }]
    );

    engine.tick(t0 + ms(1099), &mut handler);
    assert!(drain(&mut engine).is_empty());

    engine.tick(t0 + ms(1100), &mut handler);
    let out = sent(&mut engine);
    assert_eq!(out.len(), 1);
    assert_eq!((out[0].0, out[0].1), (Port::Control, peer()));
    match &out[0].2 {
        ControlMessage::ReceiverFeedback(rs) => {
            assert_eq!(rs.ssrc, LOCAL_SSRC);
            assert_eq!(rs.sequence, 42);
        }
        other => panic!("expected RS, got {other:?}"),
    }

    // Nothing new, nothing sent
    engine.tick(t0 + ms(3000), &mut handler);
    assert!(drain(&mut engine).is_empty());
}

#[test]
fn test_sequence_gap_reported() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();
    connect_listener(&mut engine, &mut handler, 0x1001, t0);

    receive(&mut engine, &mut handler, t0, &midi_packet(0x1001, 1, &[0xF8]));
    receive(&mut engine, &mut handler, t0, &midi_packet(0x1001, 4, &[0xF8]));

    assert_eq!(
        handler.exceptions(),
        vec![Exception::ReceivedPacketsDropped {
            ssrc: 0x1001,
            count: 2
        }]
    );
    assert_eq!(handler.midi_messages(), vec![MidiMessage::Clock; 2]);
}

#[test]
fn test_midi_from_unknown_sender() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();

    receive(&mut engine, &mut handler, t0, &midi_packet(0x9999, 1, &[0x90, 60, 1]));

    assert!(handler.midi_messages().is_empty());
    assert_eq!(
        handler.exceptions(),
        vec![Exception::ParticipantNotFound { ssrc: 0x9999 }]
    );
}

#[test]
fn test_midi_before_connected_dropped() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();
    engine.handle_control(invitation(0x1001, 1, "p"), Port::Control, peer(), t0, &mut handler);

    receive(&mut engine, &mut handler, t0, &midi_packet(0x1001, 1, &[0x90, 60, 1]));

    assert!(handler.events.is_empty());
}

#[test]
fn test_send_midi_flush() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();
    connect_listener(&mut engine, &mut handler, 0x1001, t0);

    engine.send_midi(&MidiMessage::NoteOn {
        channel: 0,
        note: 60,
        velocity: 100,
    });
    engine.send_midi(&MidiMessage::Clock);
    assert_eq!(engine.pending_datagrams(), 0);

    let first_seq = engine.participant(0x1001).unwrap().sequence();
    engine.flush(t0 + ms(1000));

    let out = drain(&mut engine);
    assert_eq!(out.len(), 1);
    assert_eq!((out[0].port, out[0].dest), (Port::Data, peer_data()));

    let (header, used) = RtpHeader::decode(&out[0].bytes).unwrap();
    assert_eq!(header.ssrc, LOCAL_SSRC);
    assert_eq!(header.sequence, first_seq);
    assert_eq!(header.timestamp, 10_000);
    assert_eq!(&out[0].bytes[used..], &[5, 0x90, 60, 100, 0x00, 0xF8]);

    engine.send_midi(&MidiMessage::Stop);
    engine.flush(t0 + ms(1001));
    let out = drain(&mut engine);
    let (header, _) = RtpHeader::decode(&out[0].bytes).unwrap();
    assert_eq!(header.sequence, first_seq.wrapping_add(1));
}

#[test]
fn test_flush_without_participants() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    engine.send_midi(&MidiMessage::Start);
    engine.flush(t0);
    assert!(drain(&mut engine).is_empty());

    // Dropped, not held for later
    let mut handler = RecordingHandler::new();
    connect_listener(&mut engine, &mut handler, 0x1001, t0);
    engine.flush(t0);
    assert!(drain(&mut engine).is_empty());
}

#[test]
fn test_flush_untimestamped() {
    let t0 = Instant::now();
    let mut engine = SessionEngine::new(config().timestamp_packets(false).build(), t0).unwrap();
    let mut handler = RecordingHandler::new();
    connect_listener(&mut engine, &mut handler, 0x1001, t0);

    engine.send_midi(&MidiMessage::Start);
    engine.flush(t0 + ms(500));
    let out = drain(&mut engine);
    let (header, _) = RtpHeader::decode(&out[0].bytes).unwrap();
    assert_eq!(header.timestamp, 0);
}

#[test]
fn test_long_sysex_segmented() {
    let t0 = Instant::now();
    let mut engine = SessionEngine::new(config().sysex_segment_size(10).build(), t0).unwrap();
    let mut handler = RecordingHandler::new();
    connect_listener(&mut engine, &mut handler, 0x1001, t0);

    engine.send_midi(&MidiMessage::NoteOff {
        channel: 1,
        note: 1,
        velocity: 0,
    });
    engine.send_midi(&MidiMessage::SysEx((0..25).collect()));
    engine.flush(t0);

    let out = drain(&mut engine);
    assert_eq!(out.len(), 4);
    let sections: Vec<&[u8]> = out
        .iter()
        .map(|d| &d.bytes[RtpHeader::SIZE + 1..])
        .collect();
    assert_eq!(sections[0], &[0x81, 1, 0]);
    assert_eq!(sections[1][0], 0xF0);
    assert_eq!(*sections[1].last().unwrap(), 0xF0);
    assert_eq!(sections[2][0], 0xF7);
    assert_eq!(*sections[2].last().unwrap(), 0xF0);
    assert_eq!(sections[3][0], 0xF7);
    assert_eq!(*sections[3].last().unwrap(), 0xF7);
    assert_eq!(sections[3].len(), 7);
}

#[test]
fn test_command_section_limit_splits_packets() {
    let t0 = Instant::now();
    let config = config().max_command_section(12).sysex_segment_size(8).build();
    let mut engine = SessionEngine::new(config, t0).unwrap();
    let mut handler = RecordingHandler::new();
    connect_listener(&mut engine, &mut handler, 0x1001, t0);

    for note in 0..4 {
        engine.send_midi(&MidiMessage::NoteOn {
            channel: 0,
            note,
            velocity: 1,
        });
    }
    engine.flush(t0);

    // 3 + 4 + 4 bytes fit in 12; the fourth note starts a new packet
    let out = drain(&mut engine);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].bytes[RtpHeader::SIZE], 11);
    assert_eq!(out[1].bytes[RtpHeader::SIZE], 3);
}

#[test]
fn test_send_end_session() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();
    connect_listener(&mut engine, &mut handler, 0x1001, t0);
    connect_listener(&mut engine, &mut handler, 0x1002, t0);

    engine.send_end_session(&mut handler);

    let out = sent(&mut engine);
    assert_eq!(out.len(), 2);
    assert!(
        out.iter()
            .all(|(port, _, m)| *port == Port::Control && matches!(m, ControlMessage::EndSession(_)))
    );
    assert_eq!(handler.disconnected_ssrcs(), vec![0x1001, 0x1002]);
    assert!(engine.participants().is_empty());
}

#[test]
fn test_end_session_single() {
    let t0 = Instant::now();
    let mut engine = engine(t0);
    let mut handler = RecordingHandler::new();
    connect_listener(&mut engine, &mut handler, 0x1001, t0);

    engine.end_session(0x1001, &mut handler).unwrap();
    assert_eq!(sent(&mut engine).len(), 1);
    assert_eq!(handler.disconnected_ssrcs(), vec![0x1001]);

    let err = engine.end_session(0x1001, &mut handler).unwrap_err();
    assert!(matches!(err, AppleMidiError::ParticipantNotFound { ssrc: 0x1001 }));
}
