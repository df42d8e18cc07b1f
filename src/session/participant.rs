use std::net::SocketAddr;
use std::time::Instant;

use super::sequence_tracker::SequenceTracker;
use super::sync::ClockSync;
use crate::midi::MidiParser;

/// Which side started the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// We sent the invitation
    Initiator,
    /// The peer invited us
    Listener,
}

/// Handshake progress of a participant.
///
/// Initiators walk `Initiating` through `DataAccepted`; listeners go from
/// `ControlInvited` straight to `Connected` when the data-port invitation
/// arrives, since both invitations are accepted implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationStatus {
    /// Created, no invitation sent yet
    Initiating,
    /// Control-port invitation sent
    AwaitingControlAccepted,
    /// Control-port invitation accepted
    ControlAccepted,
    /// Data-port invitation sent
    AwaitingDataAccepted,
    /// Data-port invitation accepted; promoted on the next tick
    DataAccepted,
    /// Listener accepted the control-port invitation
    ControlInvited,
    /// Session established
    Connected,
}

impl InvitationStatus {
    /// Check if transition to new state is valid
    #[must_use]
    pub fn can_transition_to(self, next: InvitationStatus) -> bool {
        use InvitationStatus::{
            AwaitingControlAccepted, AwaitingDataAccepted, Connected, ControlAccepted,
            ControlInvited, DataAccepted, Initiating,
        };

        matches!(
            (self, next),
            (Initiating | AwaitingControlAccepted, AwaitingControlAccepted)
                | (AwaitingControlAccepted, ControlAccepted)
                | (ControlAccepted | AwaitingDataAccepted, AwaitingDataAccepted)
                | (AwaitingDataAccepted, DataAccepted)
                | (DataAccepted | ControlInvited | Connected, Connected)
        )
    }

    /// Whether an invitation is still being retried by us
    #[must_use]
    pub fn is_inviting(self) -> bool {
        matches!(
            self,
            Self::Initiating
                | Self::AwaitingControlAccepted
                | Self::ControlAccepted
                | Self::AwaitingDataAccepted
        )
    }
}

/// Receiver feedback window for one participant
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FeedbackWindow {
    /// Packets arrived since the last `RS`
    pub pending: bool,
    /// When the first of those packets arrived
    pub window_start: Option<Instant>,
    /// Highest sequence number seen
    pub last_sequence: u16,
}

/// One remote peer bound to the session
#[derive(Debug)]
pub struct Participant {
    pub(crate) ssrc: u32,
    pub(crate) role: Role,
    pub(crate) status: InvitationStatus,
    pub(crate) remote: SocketAddr,
    pub(crate) sequence: u16,
    pub(crate) initiator_token: u32,
    pub(crate) name: String,
    pub(crate) last_invite_sent: Option<Instant>,
    pub(crate) connection_attempts: u8,
    pub(crate) feedback: FeedbackWindow,
    pub(crate) sync: ClockSync,
    pub(crate) received: SequenceTracker,
    pub(crate) parser: MidiParser,
}

impl Participant {
    /// A peer we are inviting; its SSRC is learned from the first `OK`
    #[must_use]
    pub(crate) fn initiator(remote: SocketAddr, token: u32, sequence: u16, now: Instant) -> Self {
        Self::new(0, Role::Initiator, InvitationStatus::Initiating, remote, token, sequence, now)
    }

    /// A peer that invited us on the control port
    #[must_use]
    pub(crate) fn listener(
        ssrc: u32,
        remote: SocketAddr,
        token: u32,
        sequence: u16,
        now: Instant,
    ) -> Self {
        Self::new(
            ssrc,
            Role::Listener,
            InvitationStatus::ControlInvited,
            remote,
            token,
            sequence,
            now,
        )
    }

    fn new(
        ssrc: u32,
        role: Role,
        status: InvitationStatus,
        remote: SocketAddr,
        initiator_token: u32,
        sequence: u16,
        now: Instant,
    ) -> Self {
        Self {
            ssrc,
            role,
            status,
            remote,
            sequence,
            initiator_token,
            name: String::new(),
            last_invite_sent: None,
            connection_attempts: 0,
            feedback: FeedbackWindow::default(),
            sync: ClockSync::new(now),
            received: SequenceTracker::new(),
            parser: MidiParser::new(),
        }
    }

    /// Peer's synchronization source (0 until learned)
    #[must_use]
    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Which side started the session
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Handshake progress
    #[must_use]
    pub fn status(&self) -> InvitationStatus {
        self.status
    }

    /// Whether the handshake has completed
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == InvitationStatus::Connected
    }

    /// Peer's control-port address
    #[must_use]
    pub fn control_addr(&self) -> SocketAddr {
        self.remote
    }

    /// Peer's data-port address (control port + 1)
    #[must_use]
    pub fn data_addr(&self) -> SocketAddr {
        let mut addr = self.remote;
        addr.set_port(addr.port().wrapping_add(1));
        addr
    }

    /// Name the peer announced
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token correlating this session's invitation messages
    #[must_use]
    pub fn initiator_token(&self) -> u32 {
        self.initiator_token
    }

    /// Next outbound RTP sequence number
    #[must_use]
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Clock offset estimated at the last completed sync round, in
    /// 100 µs ticks (initiator side only)
    #[must_use]
    pub fn clock_offset(&self) -> Option<i64> {
        self.sync.offset()
    }

    /// Synchronization state
    #[must_use]
    pub fn clock_sync(&self) -> &ClockSync {
        &self.sync
    }

    /// Received-packet statistics
    #[must_use]
    pub fn sequence_tracker(&self) -> &SequenceTracker {
        &self.received
    }

    /// Move to `next`, refusing transitions the handshake never makes
    pub(crate) fn advance(&mut self, next: InvitationStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Take the next outbound sequence number
    pub(crate) fn next_sequence(&mut self) -> u16 {
        let seq = self.sequence;
        self.sequence = seq.wrapping_add(1);
        seq
    }
}
