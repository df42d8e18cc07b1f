use std::time::Duration;

use crate::error::AppleMidiError;
use crate::protocol::applemidi::truncate_name;
use crate::protocol::rtp::RtpHeader;
use crate::protocol::rtpmidi::MAX_SECTION_LEN;

/// Configuration for an `AppleMIDI` session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name announced to peers (default: host name)
    pub session_name: String,

    /// Local synchronization source (None = random)
    pub ssrc: Option<u32>,

    /// Control port; the data port is always this plus one (default: 5004)
    pub control_port: u16,

    /// Capacity of the participant table (default: 4)
    pub max_participants: usize,

    /// Longest session name sent or accepted, in bytes (default: 24)
    pub max_session_name_len: usize,

    /// Delay between receiving a packet and acknowledging it (default: 1 second)
    pub receiver_feedback_interval: Duration,

    /// Silence after which a peer is assumed dead (default: 61 seconds)
    pub sync_timeout: Duration,

    /// Delay between invitation retries (default: 1 second)
    pub invite_retry_interval: Duration,

    /// Delay before an unanswered CK0 is sent again (default: 10 seconds)
    pub sync_retry_interval: Duration,

    /// Invitations sent per handshake step before giving up (default: 13)
    pub max_invite_attempts: u8,

    /// Unanswered CK0 messages before giving up (default: 5)
    pub max_sync_attempts: u8,

    /// Stamp outbound RTP packets with the session clock (default: true)
    pub timestamp_packets: bool,

    /// Omit repeated channel status bytes on send (default: false)
    pub running_status: bool,

    /// Receive buffer capacity per port, in bytes (default: 1500)
    pub receive_buffer_size: usize,

    /// Largest SysEx frame the decoder holds before splitting it (default: 256)
    pub max_sysex_frame: usize,

    /// SysEx content bytes per outbound segment (default: 96)
    pub sysex_segment_size: usize,

    /// Queued command bytes that force a packet flush (default: 1486, so a
    /// full packet fits the default receive buffer)
    pub max_command_section: usize,

    /// Interval between poll cycles of the async driver (default: 5ms)
    pub poll_interval: Duration,
}

impl SessionConfig {
    /// Default control port registered for `AppleMIDI`
    pub const DEFAULT_CONTROL_PORT: u16 = 5004;

    /// Create a new config builder
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Data port derived from the control port
    #[must_use]
    pub fn data_port(&self) -> u16 {
        self.control_port.wrapping_add(1)
    }

    /// Check that the values can drive a session
    ///
    /// # Errors
    ///
    /// Returns `AppleMidiError::InvalidConfig` naming the first bad field.
    pub fn validate(&self) -> Result<(), AppleMidiError> {
        let fail = |name: &'static str, message: &str| {
            Err(AppleMidiError::InvalidConfig {
                name,
                message: message.to_string(),
            })
        };

        if self.max_participants == 0 {
            return fail("max_participants", "must be at least 1");
        }
        if self.control_port == u16::MAX {
            return fail("control_port", "no room for the data port");
        }
        if self.session_name.len() > self.max_session_name_len {
            return fail("session_name", "longer than max_session_name_len");
        }
        if self.sysex_segment_size == 0 {
            return fail("sysex_segment_size", "must be at least 1");
        }
        // Leading and trailing tokens must fit beside the segment content.
        if self.sysex_segment_size + 2 > self.max_command_section {
            return fail("sysex_segment_size", "segment does not fit in a packet");
        }
        if self.max_command_section > MAX_SECTION_LEN {
            return fail("max_command_section", "exceeds the 12-bit length field");
        }
        if self.max_sysex_frame < 2 {
            return fail("max_sysex_frame", "must hold at least a start token");
        }
        // A peer using the same limits must not overflow our buffer.
        if self.receive_buffer_size < RtpHeader::SIZE + 2 + self.max_command_section {
            return fail("receive_buffer_size", "smaller than the largest packet sent");
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_name: default_session_name(24),
            ssrc: None,
            control_port: Self::DEFAULT_CONTROL_PORT,
            max_participants: 4,
            max_session_name_len: 24,
            receiver_feedback_interval: Duration::from_millis(1000),
            sync_timeout: Duration::from_millis(61_000),
            invite_retry_interval: Duration::from_millis(1000),
            sync_retry_interval: Duration::from_millis(10_000),
            max_invite_attempts: 13,
            max_sync_attempts: 5,
            timestamp_packets: true,
            running_status: false,
            receive_buffer_size: 1500,
            max_sysex_frame: 256,
            sysex_segment_size: 96,
            max_command_section: 1486,
            poll_interval: Duration::from_millis(5),
        }
    }
}

/// Host name truncated to `max_len` bytes on a character boundary
fn default_session_name(max_len: usize) -> String {
    let name = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "applemidi".to_string());

    truncate_name(&name, max_len)
}

/// Builder for `SessionConfig`
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Set the announced session name
    #[must_use]
    pub fn session_name(mut self, name: impl Into<String>) -> Self {
        self.config.session_name = name.into();
        self
    }

    /// Use a fixed local SSRC
    #[must_use]
    pub fn ssrc(mut self, ssrc: u32) -> Self {
        self.config.ssrc = Some(ssrc);
        self
    }

    /// Set the control port (data port follows at +1)
    #[must_use]
    pub fn control_port(mut self, port: u16) -> Self {
        self.config.control_port = port;
        self
    }

    /// Set the participant table capacity
    #[must_use]
    pub fn max_participants(mut self, max: usize) -> Self {
        self.config.max_participants = max;
        self
    }

    /// Set the maximum session name length
    #[must_use]
    pub fn max_session_name_len(mut self, len: usize) -> Self {
        self.config.max_session_name_len = len;
        self
    }

    /// Set the receiver feedback interval
    #[must_use]
    pub fn receiver_feedback_interval(mut self, interval: Duration) -> Self {
        self.config.receiver_feedback_interval = interval;
        self
    }

    /// Set the synchronization timeout
    #[must_use]
    pub fn sync_timeout(mut self, timeout: Duration) -> Self {
        self.config.sync_timeout = timeout;
        self
    }

    /// Set the invitation retry interval
    #[must_use]
    pub fn invite_retry_interval(mut self, interval: Duration) -> Self {
        self.config.invite_retry_interval = interval;
        self
    }

    /// Set the retry interval for unanswered CK0 messages
    #[must_use]
    pub fn sync_retry_interval(mut self, interval: Duration) -> Self {
        self.config.sync_retry_interval = interval;
        self
    }

    /// Set the invitation attempt ceiling
    #[must_use]
    pub fn max_invite_attempts(mut self, attempts: u8) -> Self {
        self.config.max_invite_attempts = attempts;
        self
    }

    /// Set the synchronization attempt ceiling
    #[must_use]
    pub fn max_sync_attempts(mut self, attempts: u8) -> Self {
        self.config.max_sync_attempts = attempts;
        self
    }

    /// Enable or disable RTP timestamps on outbound packets
    #[must_use]
    pub fn timestamp_packets(mut self, enable: bool) -> Self {
        self.config.timestamp_packets = enable;
        self
    }

    /// Enable or disable running-status compression on send
    #[must_use]
    pub fn running_status(mut self, enable: bool) -> Self {
        self.config.running_status = enable;
        self
    }

    /// Set the per-port receive buffer capacity
    #[must_use]
    pub fn receive_buffer_size(mut self, size: usize) -> Self {
        self.config.receive_buffer_size = size;
        self
    }

    /// Set the decoder's SysEx frame bound
    #[must_use]
    pub fn max_sysex_frame(mut self, size: usize) -> Self {
        self.config.max_sysex_frame = size;
        self
    }

    /// Set the outbound SysEx segment content size
    #[must_use]
    pub fn sysex_segment_size(mut self, size: usize) -> Self {
        self.config.sysex_segment_size = size;
        self
    }

    /// Set the queued-bytes flush threshold
    #[must_use]
    pub fn max_command_section(mut self, size: usize) -> Self {
        self.config.max_command_section = size;
        self
    }

    /// Set the async driver's poll interval
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> SessionConfig {
        self.config
    }
}
