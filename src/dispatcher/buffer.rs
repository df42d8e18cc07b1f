use bytes::{Buf, BytesMut};

/// Fixed-capacity byte queue for one port.
///
/// Bytes are appended at the back and consumed from the front. Appends
/// beyond capacity are dropped.
#[derive(Debug)]
pub struct ReceiveBuffer {
    buf: BytesMut,
    capacity: usize,
}

impl ReceiveBuffer {
    /// Create an empty buffer holding at most `capacity` bytes
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of buffered bytes
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of buffered bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing is buffered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Whether no more bytes can be appended
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.capacity
    }

    /// Append as much of `bytes` as fits; returns how many were dropped
    pub fn extend(&mut self, bytes: &[u8]) -> usize {
        let room = self.capacity.saturating_sub(self.buf.len());
        let take = bytes.len().min(room);
        self.buf.extend_from_slice(&bytes[..take]);
        bytes.len() - take
    }

    /// Buffered bytes, oldest first
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Drop `n` bytes from the front
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.advance(n);
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
