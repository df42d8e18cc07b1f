//! Clock synchronization bookkeeping for one participant.
//!
//! The initiator sends `CK0` carrying its clock, the listener answers
//! `CK1` adding its own, and the initiator closes the round with `CK2`:
//!
//! ```text
//!   offset = (t2 + t0) / 2 - t1
//! ```
//!
//! Rounds run twice 500 ms apart, then five times 1500 ms apart, then
//! every 10 seconds.

use std::time::{Duration, Instant};

const FAST_ROUNDS: u8 = 2;
const MEDIUM_ROUNDS: u8 = 5;
const FAST_INTERVAL: Duration = Duration::from_millis(500);
const MEDIUM_INTERVAL: Duration = Duration::from_millis(1500);
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10_000);

/// Offset of the listener's clock from the initiator's, in 100 µs ticks.
///
/// Positive when the listener's clock is behind.
#[must_use]
#[allow(
    clippy::cast_possible_wrap,
    reason = "timestamps are session-relative and far below i64::MAX"
)]
pub fn clock_offset(timestamps: [u64; 3]) -> i64 {
    let [t0, t1, t2] = timestamps.map(|t| t as i64);
    (t2 + t0) / 2 - t1
}

/// Synchronization state for one participant
#[derive(Debug, Clone)]
pub struct ClockSync {
    /// A `CK0` is awaiting its `CK1`
    synchronizing: bool,
    /// `CK0`s sent since the last completed round
    attempts: u8,
    /// Rounds started, saturating; drives the cadence
    rounds: u8,
    /// When the last `CK0` went out
    last_sent: Option<Instant>,
    /// Last proof that the peer is alive
    last_exchange: Instant,
    /// Latest offset estimate
    offset: Option<i64>,
}

impl ClockSync {
    /// Start tracking with the liveness clock at `now`
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self {
            synchronizing: false,
            attempts: 0,
            rounds: 0,
            last_sent: None,
            last_exchange: now,
            offset: None,
        }
    }

    /// Delay before the next round once the current one has completed
    #[must_use]
    pub fn cadence(&self) -> Duration {
        if self.rounds < FAST_ROUNDS {
            FAST_INTERVAL
        } else if self.rounds < FAST_ROUNDS + MEDIUM_ROUNDS {
            MEDIUM_INTERVAL
        } else {
            HEARTBEAT_INTERVAL
        }
    }

    /// Whether a `CK0` should be sent at `now`.
    ///
    /// While a round is outstanding the next `CK0` waits `retry_interval`.
    #[must_use]
    pub fn is_due(&self, now: Instant, retry_interval: Duration) -> bool {
        let Some(sent) = self.last_sent else {
            return true;
        };
        let wait = if self.synchronizing {
            retry_interval
        } else {
            self.cadence()
        };
        now.saturating_duration_since(sent) >= wait
    }

    /// Record that a `CK0` was sent
    pub fn started(&mut self, now: Instant) {
        self.synchronizing = true;
        self.attempts = self.attempts.saturating_add(1);
        self.rounds = self.rounds.saturating_add(1);
        self.last_sent = Some(now);
    }

    /// Record a completed round
    pub fn completed(&mut self, now: Instant, offset: i64) {
        self.synchronizing = false;
        self.attempts = 0;
        self.last_exchange = now;
        self.offset = Some(offset);
    }

    /// Refresh liveness without changing the round state
    pub fn refresh(&mut self, now: Instant) {
        self.last_exchange = now;
    }

    /// Whether the peer has been silent longer than `timeout`
    #[must_use]
    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_exchange) > timeout
    }

    /// `CK0`s sent since the last completed round
    #[must_use]
    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    /// Whether a round is outstanding
    #[must_use]
    pub fn is_synchronizing(&self) -> bool {
        self.synchronizing
    }

    /// Latest offset estimate in 100 µs ticks
    #[must_use]
    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    /// Time of the last successful exchange
    #[must_use]
    pub fn last_exchange(&self) -> Instant {
        self.last_exchange
    }
}
