//! RTP sequence number tracking and packet loss detection

/// Gaps at least this large are taken as a restarted sender, not loss
const MAX_GAP: u16 = 1000;

/// Tracks a peer's RTP sequence numbers to detect gaps
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    /// Expected next sequence number
    expected_seq: Option<u16>,
    /// Total packets received
    packets_received: u64,
    /// Total gaps detected
    total_gaps: u64,
    /// Total packets lost
    total_lost: u64,
}

/// A run of missing packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapInfo {
    /// First missing sequence
    pub start: u16,
    /// Count of missing packets
    pub count: u16,
}

impl SequenceTracker {
    /// Create a new sequence tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a received packet, returning any detected gap
    pub fn record(&mut self, seq: u16) -> Option<GapInfo> {
        self.packets_received += 1;

        let Some(expected) = self.expected_seq else {
            self.expected_seq = Some(seq.wrapping_add(1));
            return None;
        };

        // Handles 16-bit wraparound
        let gap_size = seq.wrapping_sub(expected);
        if gap_size >= 0x8000 {
            // Late or duplicate packet: keep waiting for `expected`.
            return None;
        }

        self.expected_seq = Some(seq.wrapping_add(1));
        if gap_size == 0 || gap_size >= MAX_GAP {
            return None;
        }

        self.total_gaps += 1;
        self.total_lost += u64::from(gap_size);
        Some(GapInfo {
            start: expected,
            count: gap_size,
        })
    }

    /// Get packet loss ratio (0.0 to 1.0)
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        reason = "Precision loss acceptable for ratio calculation"
    )]
    pub fn loss_ratio(&self) -> f64 {
        if self.packets_received == 0 {
            return 0.0;
        }
        let total = self.packets_received + self.total_lost;
        self.total_lost as f64 / total as f64
    }

    /// Get statistics
    #[must_use]
    pub fn stats(&self) -> SequenceStats {
        SequenceStats {
            packets_received: self.packets_received,
            total_gaps: self.total_gaps,
            total_lost: self.total_lost,
            loss_ratio: self.loss_ratio(),
        }
    }

    /// Reset the tracker
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Statistics for sequence tracking
#[derive(Debug, Clone)]
pub struct SequenceStats {
    /// Total packets received
    pub packets_received: u64,
    /// Total gaps detected
    pub total_gaps: u64,
    /// Total packets lost
    pub total_lost: u64,
    /// Loss ratio (0.0 to 1.0)
    pub loss_ratio: f64,
}
