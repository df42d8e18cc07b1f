//! Transport interface consumed by the dispatcher

use std::io::Result;
use std::net::SocketAddr;

/// One non-blocking datagram socket.
///
/// A session uses two: the control port and the data port next to it.
pub trait Endpoint {
    /// Read one datagram into `buf`. Returns `Ok(0)` when nothing is
    /// waiting; never blocks.
    ///
    /// # Errors
    ///
    /// Any socket error other than "would block".
    fn receive_into(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Sender of the datagram most recently returned by
    /// [`receive_into`](Self::receive_into)
    fn remote_addr(&self) -> Option<SocketAddr>;

    /// Send one datagram to `dest`
    ///
    /// # Errors
    ///
    /// The datagram could not be handed to the network. `WouldBlock`
    /// means it was not sent and may be retried later; any other error
    /// drops it.
    fn send(&mut self, bytes: &[u8], dest: SocketAddr) -> Result<()>;

    /// Address this endpoint is bound to
    ///
    /// # Errors
    ///
    /// The address could not be queried.
    fn local_addr(&self) -> Result<SocketAddr>;
}

impl<E: Endpoint + ?Sized> Endpoint for Box<E> {
    fn receive_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).receive_into(buf)
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        (**self).remote_addr()
    }

    fn send(&mut self, bytes: &[u8], dest: SocketAddr) -> Result<()> {
        (**self).send(bytes, dest)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        (**self).local_addr()
    }
}
