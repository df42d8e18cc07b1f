use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;
use rand::Rng;
use tracing::{debug, info, trace, warn};

use super::handler::SessionHandler;
use super::participant::{FeedbackWindow, InvitationStatus, Participant, Role};
use super::sync::{ClockSync, clock_offset};
use super::table::ParticipantTable;
use crate::error::{AppleMidiError, Exception, Result};
use crate::midi::MidiMessage;
use crate::protocol::applemidi::{
    ControlMessage, EndSession, Invitation, ReceiverFeedback, Synchronization,
};
use crate::protocol::rtp::RtpHeader;
use crate::protocol::rtpmidi::{
    CommandQueue, MidiSink, RecoveryJournal, encode_packet, segment_sysex,
};
use crate::types::{Port, SessionConfig};

/// A datagram the engine wants sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Local port to send from
    pub port: Port,
    /// Destination address
    pub dest: SocketAddr,
    /// Encoded datagram
    pub bytes: Bytes,
}

/// The session protocol engine.
///
/// Owns the participant table and drives invitations, clock
/// synchronization, receiver feedback and teardown. It performs no I/O:
/// decoded messages are handed in, and outbound datagrams collect in an
/// outbox drained with [`pop_datagram`](Self::pop_datagram). Time is
/// always passed in explicitly.
#[derive(Debug)]
pub struct SessionEngine {
    config: SessionConfig,
    ssrc: u32,
    start: Instant,
    participants: ParticipantTable,
    outbox: VecDeque<Datagram>,
    queue: CommandQueue,
    sealed: VecDeque<Bytes>,
    /// Slot and SSRC of the sender whose packet is being decoded
    receiving: Option<(usize, u32)>,
}

impl SessionEngine {
    /// Create an engine whose session clock starts at `now`
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration does not validate.
    pub fn new(config: SessionConfig, now: Instant) -> Result<Self> {
        config.validate()?;
        let ssrc = config.ssrc.unwrap_or_else(random_nonzero);

        Ok(Self {
            participants: ParticipantTable::new(config.max_participants),
            queue: CommandQueue::new(config.running_status),
            config,
            ssrc,
            start: now,
            outbox: VecDeque::new(),
            sealed: VecDeque::new(),
            receiving: None,
        })
    }

    /// Local synchronization source
    #[must_use]
    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Participant table
    #[must_use]
    pub fn participants(&self) -> &ParticipantTable {
        &self.participants
    }

    /// Participant with `ssrc`
    #[must_use]
    pub fn participant(&self, ssrc: u32) -> Option<&Participant> {
        self.participants.by_ssrc(ssrc)
    }

    /// Session clock in 100 µs ticks
    #[must_use]
    pub fn timestamp(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.start);
        u64::try_from(elapsed.as_micros() / 100).unwrap_or(u64::MAX)
    }

    /// Next datagram to send, oldest first
    pub fn pop_datagram(&mut self) -> Option<Datagram> {
        self.outbox.pop_front()
    }

    /// Put back a datagram the transport could not send yet; it goes out
    /// first on the next attempt
    pub fn requeue(&mut self, datagram: Datagram) {
        self.outbox.push_front(datagram);
    }

    /// Number of datagrams waiting to be sent
    #[must_use]
    pub fn pending_datagrams(&self) -> usize {
        self.outbox.len()
    }

    /// Start inviting the session at `remote` (its control port).
    ///
    /// The control-port invitation goes out immediately. Returns the
    /// initiator token identifying this invitation.
    ///
    /// # Errors
    ///
    /// `NoFreeSlot` when the participant table is full.
    pub fn invite(&mut self, remote: SocketAddr, now: Instant) -> Result<u32> {
        let token = loop {
            let token = random_nonzero();
            if self.find_invitation(token).is_none() {
                break token;
            }
        };
        let sequence = rand::thread_rng().r#gen();
        let index = self
            .participants
            .insert(Participant::initiator(remote, token, sequence, now))?;

        debug!(%remote, token = format_args!("{token:08x}"), "Inviting session");
        self.send_invitation(index, now);
        Ok(token)
    }

    /// End the session with one participant
    ///
    /// # Errors
    ///
    /// `ParticipantNotFound` if no participant has `ssrc`.
    pub fn end_session(&mut self, ssrc: u32, handler: &mut impl SessionHandler) -> Result<()> {
        let index = self
            .participants
            .find_by_ssrc(ssrc)
            .ok_or(AppleMidiError::ParticipantNotFound { ssrc })?;
        if let Some(participant) = self.participants.remove(index) {
            self.send_end(&participant);
            info!(ssrc = format_args!("{ssrc:08x}"), "Session ended locally");
            handler.disconnected(ssrc);
        }
        Ok(())
    }

    /// End every session: send `BY` to each participant, report it
    /// disconnected and empty the table
    pub fn send_end_session(&mut self, handler: &mut impl SessionHandler) {
        for participant in self.participants.drain() {
            self.send_end(&participant);
            if participant.ssrc != 0 {
                handler.disconnected(participant.ssrc);
            }
        }
    }

    /// Apply a decoded control message received on `port` from `from`
    pub fn handle_control(
        &mut self,
        message: ControlMessage,
        port: Port,
        from: SocketAddr,
        now: Instant,
        handler: &mut impl SessionHandler,
    ) {
        trace!(command = ?message.command(), %port, %from, "Control message");

        match message {
            ControlMessage::Invitation(invitation) => match port {
                Port::Control => self.on_control_invitation(invitation, from, now, handler),
                Port::Data => self.on_data_invitation(invitation, from, now, handler),
            },
            ControlMessage::InvitationAccepted(invitation) => {
                self.on_invitation_accepted(invitation, port, handler);
            }
            ControlMessage::InvitationRejected(invitation) => {
                self.on_invitation_rejected(&invitation, handler);
            }
            ControlMessage::Synchronization(sync) => self.on_synchronization(&sync, now, handler),
            ControlMessage::EndSession(end) => self.on_end_session(&end, handler),
            ControlMessage::ReceiverFeedback(rs) => {
                debug!(
                    ssrc = format_args!("{:08x}", rs.ssrc),
                    sequence = rs.sequence,
                    "Receiver feedback"
                );
            }
            ControlMessage::BitrateReceiveLimit(rl) => {
                debug!(
                    ssrc = format_args!("{:08x}", rl.ssrc),
                    limit = rl.limit,
                    "Bitrate receive limit"
                );
            }
        }
    }

    fn on_control_invitation(
        &mut self,
        invitation: Invitation,
        from: SocketAddr,
        now: Instant,
        handler: &mut impl SessionHandler,
    ) {
        let Invitation {
            initiator_token: token,
            ssrc,
            name,
            ..
        } = invitation;

        if ssrc == 0 {
            debug!(%from, "Rejecting invitation with reserved SSRC 0");
            self.reply_invitation(Port::Control, from, token, false);
            return;
        }

        if let Some(index) = self.participants.find_by_ssrc(ssrc) {
            if let Some(p) = self.participants.get_mut(index) {
                p.remote = from;
                p.initiator_token = token;
                p.name = name;
            }
            debug!(ssrc = format_args!("{ssrc:08x}"), "Repeated control invitation");
        } else {
            let sequence = rand::thread_rng().r#gen();
            let mut participant = Participant::listener(ssrc, from, token, sequence, now);
            participant.name = name;
            if self.participants.insert(participant).is_err() {
                self.reply_invitation(Port::Control, from, token, false);
                raise(handler, Exception::TooManyParticipants { ssrc });
                return;
            }
            debug!(ssrc = format_args!("{ssrc:08x}"), %from, "Accepted control invitation");
        }

        self.reply_invitation(Port::Control, from, token, true);
    }

    fn on_data_invitation(
        &mut self,
        invitation: Invitation,
        from: SocketAddr,
        now: Instant,
        handler: &mut impl SessionHandler,
    ) {
        let token = invitation.initiator_token;
        let ssrc = invitation.ssrc;

        let Some(p) = self
            .participants
            .find_by_ssrc(ssrc)
            .and_then(|i| self.participants.get_mut(i))
        else {
            self.reply_invitation(Port::Data, from, token, false);
            raise(handler, Exception::ParticipantNotFound { ssrc });
            return;
        };

        let newly_connected = p.role == Role::Listener && !p.is_connected();
        if !invitation.name.is_empty() {
            p.name = invitation.name;
        }
        if newly_connected {
            p.advance(InvitationStatus::Connected);
            p.sync = ClockSync::new(now);
        }
        let name = p.name.clone();

        self.reply_invitation(Port::Data, from, token, true);

        if newly_connected {
            info!(ssrc = format_args!("{ssrc:08x}"), name = %name, "Participant connected");
            handler.connected(ssrc, &name);
        }
    }

    fn on_invitation_accepted(
        &mut self,
        invitation: Invitation,
        port: Port,
        handler: &mut impl SessionHandler,
    ) {
        let token = invitation.initiator_token;
        let Some(index) = self.find_invitation(token) else {
            raise(handler, Exception::UnknownInitiatorToken { token });
            return;
        };
        let ssrc = invitation.ssrc;
        let status = self.participants.get(index).map(|p| p.status);

        match (port, status) {
            (Port::Control, Some(InvitationStatus::AwaitingControlAccepted)) => {
                if ssrc == 0 || self.participants.find_by_ssrc(ssrc).is_some() {
                    // The peer already has a session with us or sent the
                    // reserved SSRC; only this handshake is dropped.
                    self.participants.remove(index);
                    info!(
                        ssrc = format_args!("{ssrc:08x}"),
                        token = format_args!("{token:08x}"),
                        "Dropping invitation with reserved or duplicate SSRC"
                    );
                    return;
                }
                let Some(p) = self.participants.get_mut(index) else {
                    return;
                };
                p.ssrc = ssrc;
                p.name = invitation.name;
                p.advance(InvitationStatus::ControlAccepted);
                // Data-port invitation goes out on the next tick.
                p.connection_attempts = 0;
                p.last_invite_sent = None;
                debug!(ssrc = format_args!("{ssrc:08x}"), "Control invitation accepted");
            }
            (Port::Data, Some(InvitationStatus::AwaitingDataAccepted)) => {
                if let Some(p) = self.participants.get_mut(index) {
                    p.advance(InvitationStatus::DataAccepted);
                    debug!(
                        ssrc = format_args!("{:08x}", p.ssrc),
                        "Data invitation accepted"
                    );
                }
            }
            (port, status) => {
                trace!(%port, ?status, "Ignoring acceptance out of sequence");
            }
        }
    }

    fn on_invitation_rejected(&mut self, invitation: &Invitation, handler: &mut impl SessionHandler) {
        let token = invitation.initiator_token;
        let Some(participant) = self
            .find_invitation(token)
            .and_then(|i| self.participants.remove(i))
        else {
            raise(handler, Exception::UnknownInitiatorToken { token });
            return;
        };

        info!(
            token = format_args!("{token:08x}"),
            remote = %participant.remote,
            "Invitation rejected"
        );
        if participant.is_connected() {
            handler.disconnected(participant.ssrc);
        }
    }

    fn on_end_session(&mut self, end: &EndSession, handler: &mut impl SessionHandler) {
        let ssrc = end.ssrc;
        let Some(index) = self.participants.find_by_ssrc(ssrc) else {
            trace!(ssrc = format_args!("{ssrc:08x}"), "EndSession from unknown participant");
            return;
        };
        self.participants.remove(index);
        info!(ssrc = format_args!("{ssrc:08x}"), "Participant ended session");
        handler.disconnected(ssrc);
    }

    fn on_synchronization(
        &mut self,
        sync: &Synchronization,
        now: Instant,
        handler: &mut impl SessionHandler,
    ) {
        let now_ts = self.timestamp(now);
        let local = self.ssrc;
        let Some(p) = self
            .participants
            .find_by_ssrc(sync.ssrc)
            .and_then(|i| self.participants.get_mut(i))
        else {
            raise(handler, Exception::ParticipantNotFound { ssrc: sync.ssrc });
            return;
        };
        let dest = p.data_addr();
        let [t0, t1, _] = sync.timestamps;

        let reply = match sync.count {
            0 => Some(Synchronization {
                ssrc: local,
                count: 1,
                timestamps: [t0, now_ts, 0],
            }),
            1 => {
                let timestamps = [t0, t1, now_ts];
                let offset = clock_offset(timestamps);
                p.sync.completed(now, offset);
                debug!(ssrc = format_args!("{:08x}", p.ssrc), offset, "Clock synchronized");
                Some(Synchronization {
                    ssrc: local,
                    count: 2,
                    timestamps,
                })
            }
            _ => {
                p.sync.refresh(now);
                trace!(ssrc = format_args!("{:08x}", p.ssrc), "Synchronization complete");
                None
            }
        };

        if let Some(reply) = reply {
            self.push(Port::Data, dest, &ControlMessage::Synchronization(reply));
        }
    }

    /// Run timers: invitation retries, clock synchronization, liveness and
    /// receiver feedback. Call once per poll cycle.
    pub fn tick(&mut self, now: Instant, handler: &mut impl SessionHandler) {
        for index in self.participants.indices() {
            self.tick_participant(index, now, handler);
        }
    }

    fn tick_participant(&mut self, index: usize, now: Instant, handler: &mut impl SessionHandler) {
        let invite_interval = self.config.invite_retry_interval;
        let Some(p) = self.participants.get_mut(index) else {
            return;
        };

        if p.status.is_inviting() {
            let due = p
                .last_invite_sent
                .is_none_or(|sent| now.saturating_duration_since(sent) >= invite_interval);
            if !due {
                return;
            }
            if p.connection_attempts >= self.config.max_invite_attempts {
                let token = p.initiator_token;
                self.end_participant(
                    index,
                    Exception::NoResponseFromConnectionRequest { token },
                    handler,
                );
            } else {
                self.send_invitation(index, now);
            }
            return;
        }

        if p.status == InvitationStatus::DataAccepted {
            p.advance(InvitationStatus::Connected);
            p.sync = ClockSync::new(now);
            info!(ssrc = format_args!("{:08x}", p.ssrc), name = %p.name, "Participant connected");
            handler.connected(p.ssrc, &p.name);
        }

        let ssrc = p.ssrc;
        if p.sync.is_timed_out(now, self.config.sync_timeout) {
            self.end_participant(index, Exception::ListenerTimeOut { ssrc }, handler);
            return;
        }

        if p.role == Role::Initiator
            && p.is_connected()
            && p.sync.is_due(now, self.config.sync_retry_interval)
        {
            if p.sync.attempts() >= self.config.max_sync_attempts {
                self.end_participant(index, Exception::MaxAttempts { ssrc }, handler);
                return;
            }
            p.sync.started(now);
            let dest = p.data_addr();
            let ck0 = Synchronization {
                ssrc: self.ssrc,
                count: 0,
                timestamps: [self.timestamp(now), 0, 0],
            };
            self.push(Port::Data, dest, &ControlMessage::Synchronization(ck0));
        }

        self.emit_feedback(index, now);
    }

    fn emit_feedback(&mut self, index: usize, now: Instant) {
        let interval = self.config.receiver_feedback_interval;
        let Some(p) = self.participants.get_mut(index) else {
            return;
        };
        let due = p.feedback.pending
            && p.feedback
                .window_start
                .is_some_and(|start| now.saturating_duration_since(start) >= interval);
        if !due {
            return;
        }

        let sequence = p.feedback.last_sequence;
        p.feedback = FeedbackWindow {
            last_sequence: sequence,
            ..FeedbackWindow::default()
        };
        let dest = p.control_addr();
        let rs = ReceiverFeedback {
            ssrc: self.ssrc,
            sequence,
        };
        self.push(Port::Control, dest, &ControlMessage::ReceiverFeedback(rs));
    }

    /// Send `BY`, report and free one participant
    fn end_participant(
        &mut self,
        index: usize,
        exception: Exception,
        handler: &mut impl SessionHandler,
    ) {
        let Some(participant) = self.participants.remove(index) else {
            return;
        };
        self.send_end(&participant);
        raise(handler, exception);
        if participant.ssrc != 0 {
            handler.disconnected(participant.ssrc);
        }
    }

    fn send_invitation(&mut self, index: usize, now: Instant) {
        let Some(p) = self.participants.get_mut(index) else {
            return;
        };
        let (port, next) = match p.status {
            InvitationStatus::Initiating | InvitationStatus::AwaitingControlAccepted => {
                (Port::Control, InvitationStatus::AwaitingControlAccepted)
            }
            InvitationStatus::ControlAccepted | InvitationStatus::AwaitingDataAccepted => {
                (Port::Data, InvitationStatus::AwaitingDataAccepted)
            }
            _ => return,
        };
        p.advance(next);
        p.connection_attempts = p.connection_attempts.saturating_add(1);
        p.last_invite_sent = Some(now);

        let dest = match port {
            Port::Control => p.control_addr(),
            Port::Data => p.data_addr(),
        };
        trace!(%port, %dest, attempt = p.connection_attempts, "Sending invitation");
        let invitation = Invitation::new(
            p.initiator_token,
            self.ssrc,
            self.config.session_name.clone(),
        );
        self.push(port, dest, &ControlMessage::Invitation(invitation));
    }

    fn reply_invitation(&mut self, port: Port, dest: SocketAddr, token: u32, accept: bool) {
        let body = Invitation::new(token, self.ssrc, self.config.session_name.clone());
        let message = if accept {
            ControlMessage::InvitationAccepted(body)
        } else {
            ControlMessage::InvitationRejected(body)
        };
        self.push(port, dest, &message);
    }

    fn send_end(&mut self, participant: &Participant) {
        let end = EndSession::new(participant.initiator_token, self.ssrc);
        self.push(
            Port::Control,
            participant.control_addr(),
            &ControlMessage::EndSession(end),
        );
    }

    fn push(&mut self, port: Port, dest: SocketAddr, message: &ControlMessage) {
        self.outbox.push_back(Datagram {
            port,
            dest,
            bytes: message.encode().freeze(),
        });
    }

    /// Slot of an outstanding invitation we sent with `token`
    fn find_invitation(&self, token: u32) -> Option<usize> {
        self.participants
            .iter()
            .find(|(_, p)| p.role == Role::Initiator && p.initiator_token == token)
            .map(|(i, _)| i)
    }

    /// Queue a MIDI message for every connected participant.
    ///
    /// Messages collect until [`flush`](Self::flush); SysEx longer than
    /// the segment size is split into one packet per segment.
    pub fn send_midi(&mut self, message: &MidiMessage) {
        if let MidiMessage::SysEx(body) = message {
            if body.len() > self.config.sysex_segment_size {
                self.seal();
                for segment in segment_sysex(body, self.config.sysex_segment_size) {
                    self.sealed.push_back(Bytes::from(segment));
                }
                return;
            }
        }

        let cost = self.queue.cost(message.encoded_len());
        if self.queue.byte_len() + cost > self.config.max_command_section {
            self.seal();
        }
        self.queue.push(message);
    }

    fn seal(&mut self) {
        if !self.queue.is_empty() {
            self.sealed.push_back(self.queue.take());
        }
    }

    /// Turn queued MIDI into one RTP-MIDI packet per command list and
    /// connected participant
    #[allow(
        clippy::cast_possible_truncation,
        reason = "RTP timestamps wrap at 32 bits"
    )]
    pub fn flush(&mut self, now: Instant) {
        self.seal();
        if self.sealed.is_empty() {
            return;
        }

        let timestamp = if self.config.timestamp_packets {
            self.timestamp(now) as u32
        } else {
            0
        };
        let connected: Vec<usize> = self
            .participants
            .iter()
            .filter(|(_, p)| p.is_connected())
            .map(|(i, _)| i)
            .collect();
        if connected.is_empty() {
            trace!(packets = self.sealed.len(), "No connected participants, dropping MIDI");
            self.sealed.clear();
            return;
        }

        while let Some(commands) = self.sealed.pop_front() {
            for &index in &connected {
                let Some(p) = self.participants.get_mut(index) else {
                    continue;
                };
                let header = RtpHeader::new_midi(p.next_sequence(), timestamp, self.ssrc);
                match encode_packet(&header, &commands) {
                    Ok(packet) => self.outbox.push_back(Datagram {
                        port: Port::Data,
                        dest: p.data_addr(),
                        bytes: packet.freeze(),
                    }),
                    Err(e) => warn!(error = %e, "Dropping unencodable command section"),
                }
            }
        }
    }

    /// Record a received RTP header; returns the sender's slot when its
    /// MIDI should be delivered
    fn on_rtp_header(
        &mut self,
        header: &RtpHeader,
        now: Instant,
        handler: &mut impl SessionHandler,
    ) -> Option<usize> {
        let ssrc = header.ssrc;
        let Some(index) = self.participants.find_by_ssrc(ssrc) else {
            raise(handler, Exception::ParticipantNotFound { ssrc });
            return None;
        };
        let p = self.participants.get_mut(index)?;
        if !p.is_connected() {
            trace!(ssrc = format_args!("{ssrc:08x}"), "MIDI before handshake completed");
            return None;
        }

        if let Some(gap) = p.received.record(header.sequence) {
            raise(
                handler,
                Exception::ReceivedPacketsDropped {
                    ssrc,
                    count: gap.count,
                },
            );
        }

        p.feedback.last_sequence = header.sequence;
        if !p.feedback.pending {
            p.feedback.pending = true;
            p.feedback.window_start = Some(now);
        }
        Some(index)
    }

    /// Sink that routes decoded RTP-MIDI into participants and `handler`.
    ///
    /// The sender named by the last RTP header stays current across sinks
    /// until [`end_packet`](Self::end_packet), so one packet may be
    /// decoded through many short-lived sinks.
    pub fn midi_sink<'a, H: SessionHandler>(
        &'a mut self,
        handler: &'a mut H,
        now: Instant,
    ) -> DataSink<'a, H> {
        DataSink {
            engine: self,
            handler,
            now,
        }
    }

    /// The packet being decoded is finished or abandoned
    pub fn end_packet(&mut self) {
        self.receiving = None;
    }

    fn receiving_participant(&mut self) -> Option<&mut Participant> {
        let (index, ssrc) = self.receiving?;
        self.participants
            .get_mut(index)
            .filter(|p| p.ssrc == ssrc)
    }
}

/// [`MidiSink`] feeding decoded payloads into a [`SessionEngine`]
#[derive(Debug)]
pub struct DataSink<'a, H> {
    engine: &'a mut SessionEngine,
    handler: &'a mut H,
    now: Instant,
}

impl<H: SessionHandler> MidiSink for DataSink<'_, H> {
    fn rtp_header(&mut self, header: &RtpHeader) {
        self.engine.receiving = self
            .engine
            .on_rtp_header(header, self.now, &mut *self.handler)
            .map(|index| (index, header.ssrc));
    }

    fn journal(&mut self, journal: &RecoveryJournal) {
        trace!(
            checkpoint = journal.checkpoint,
            channels = journal.channels.len(),
            "Skipped recovery journal"
        );
    }

    fn start_midi(&mut self) {
        if let Some(p) = self.engine.receiving_participant() {
            p.parser.start();
        }
    }

    fn midi_byte(&mut self, byte: u8) {
        if let Some(p) = self.engine.receiving_participant() {
            p.parser.push(byte);
        }
    }

    fn end_midi(&mut self) {
        let Some(p) = self.engine.receiving_participant() else {
            return;
        };
        let ssrc = p.ssrc;
        for message in p.parser.end() {
            self.handler.midi(ssrc, &message);
        }
    }
}

/// Log an exception and hand it to the application
pub(crate) fn raise(handler: &mut impl SessionHandler, exception: Exception) {
    warn!(%exception, "AppleMIDI exception");
    handler.exception(&exception);
}

fn random_nonzero() -> u32 {
    rand::thread_rng().gen_range(1..=u32::MAX)
}
