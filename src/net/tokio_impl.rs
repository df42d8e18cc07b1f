//! Tokio runtime implementation

use std::io::{Error, ErrorKind, Result};
use std::net::SocketAddr;

use tokio::net::UdpSocket;

use super::traits::Endpoint;

/// [`Endpoint`] over a tokio UDP socket.
///
/// Reads and writes use the socket's `try_*` calls, so the poll loop
/// never waits on the network; [`readable`](Self::readable) lets an async
/// driver sleep until a datagram arrives. A send refused with
/// `WouldBlock` is kept queued by the session and retried.
#[derive(Debug)]
pub struct UdpEndpoint {
    socket: UdpSocket,
    remote: Option<SocketAddr>,
}

impl UdpEndpoint {
    /// Bind a socket at `addr` and wait until it can send, so the first
    /// datagram is not refused
    ///
    /// # Errors
    ///
    /// The address could not be bound.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        socket.writable().await?;
        Ok(Self::from_socket(socket))
    }

    /// Wrap an already bound socket. Until the runtime has seen it become
    /// writable, sends report `WouldBlock`.
    #[must_use]
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket,
            remote: None,
        }
    }

    /// Wait until a datagram can be read
    ///
    /// # Errors
    ///
    /// The socket reported an error while waiting.
    pub async fn readable(&self) -> Result<()> {
        self.socket.readable().await
    }

    /// Wait until a datagram can be sent
    ///
    /// # Errors
    ///
    /// The socket reported an error while waiting.
    pub async fn writable(&self) -> Result<()> {
        self.socket.writable().await
    }
}

impl Endpoint for UdpEndpoint {
    fn receive_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.socket.try_recv_from(buf) {
            Ok((n, from)) => {
                self.remote = Some(from);
                Ok(n)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote
    }

    /// `WouldBlock` means nothing was sent and the datagram should be
    /// retried.
    fn send(&mut self, bytes: &[u8], dest: SocketAddr) -> Result<()> {
        let sent = self.socket.try_send_to(bytes, dest)?;
        if sent != bytes.len() {
            return Err(Error::new(ErrorKind::WriteZero, "datagram truncated"));
        }
        Ok(())
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr()
    }
}
