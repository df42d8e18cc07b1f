//! In-memory datagram network for testing

use std::collections::{HashMap, VecDeque};
use std::io::{Error, ErrorKind, Result};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;

use crate::net::Endpoint;

#[derive(Debug, Default)]
struct Inner {
    queues: HashMap<SocketAddr, VecDeque<(SocketAddr, Vec<u8>)>>,
    loss_rate: f64,
    delivered: u64,
    dropped: u64,
}

/// Shared switchboard connecting [`MockEndpoint`]s.
///
/// Datagrams to an address with no endpoint vanish, as with UDP.
#[derive(Debug, Clone, Default)]
pub struct MockNetwork {
    inner: Arc<Mutex<Inner>>,
}

impl MockNetwork {
    /// Lossless network
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Network dropping each datagram with probability `loss_rate`
    #[must_use]
    pub fn with_loss(loss_rate: f64) -> Self {
        let network = Self::new();
        network.set_loss_rate(loss_rate);
        network
    }

    /// Change the loss probability (0.0 to 1.0)
    pub fn set_loss_rate(&self, loss_rate: f64) {
        self.lock().loss_rate = loss_rate.clamp(0.0, 1.0);
    }

    /// Attach an endpoint at `addr`
    #[must_use]
    pub fn endpoint(&self, addr: SocketAddr) -> MockEndpoint {
        self.lock().queues.entry(addr).or_default();
        MockEndpoint {
            network: self.clone(),
            addr,
            remote: None,
        }
    }

    /// Control and data endpoints for a session on `control`'s port
    #[must_use]
    pub fn session_pair(&self, control: SocketAddr) -> (MockEndpoint, MockEndpoint) {
        let mut data = control;
        data.set_port(control.port().wrapping_add(1));
        (self.endpoint(control), self.endpoint(data))
    }

    /// Datagrams waiting at `addr`
    #[must_use]
    pub fn pending(&self, addr: SocketAddr) -> usize {
        self.lock().queues.get(&addr).map_or(0, VecDeque::len)
    }

    /// Datagrams delivered so far
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.lock().delivered
    }

    /// Datagrams lost so far
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    fn deliver(&self, from: SocketAddr, to: SocketAddr, bytes: &[u8]) {
        let mut inner = self.lock();
        if inner.loss_rate > 0.0 && rand::thread_rng().gen_bool(inner.loss_rate) {
            inner.dropped += 1;
            return;
        }
        let Some(queue) = inner.queues.get_mut(&to) else {
            inner.dropped += 1;
            return;
        };
        queue.push_back((from, bytes.to_vec()));
        inner.delivered += 1;
    }

    fn take(&self, addr: SocketAddr) -> Option<(SocketAddr, Vec<u8>)> {
        self.lock().queues.get_mut(&addr)?.pop_front()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One address on a [`MockNetwork`]
#[derive(Debug, Clone)]
pub struct MockEndpoint {
    network: MockNetwork,
    addr: SocketAddr,
    remote: Option<SocketAddr>,
}

impl MockEndpoint {
    /// Address of this endpoint
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Endpoint for MockEndpoint {
    fn receive_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some((from, bytes)) = self.network.take(self.addr) else {
            return Ok(0);
        };
        // Oversized datagrams are truncated, as recv_from does.
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        self.remote = Some(from);
        Ok(n)
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote
    }

    fn send(&mut self, bytes: &[u8], dest: SocketAddr) -> Result<()> {
        if bytes.is_empty() {
            return Err(Error::new(ErrorKind::InvalidInput, "empty datagram"));
        }
        self.network.deliver(self.addr, dest, bytes);
        Ok(())
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.addr)
    }
}
