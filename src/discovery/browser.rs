use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tracing::debug;

use super::{DiscoveryError, SERVICE_TYPE};

/// A remote session found on the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSession {
    /// Instance name, normally the session name
    pub name: String,
    /// Full service name, unique on the network
    pub fullname: String,
    /// Host the service runs on
    pub host: String,
    /// Resolved addresses
    pub addresses: Vec<IpAddr>,
    /// Control port
    pub port: u16,
}

impl PeerSession {
    /// Control-port address to pass to `invite`, IPv4 preferred
    #[must_use]
    pub fn control_addr(&self) -> Option<SocketAddr> {
        self.addresses
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| self.addresses.first())
            .map(|ip| SocketAddr::new(*ip, self.port))
    }
}

/// Discovery events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A session appeared or changed
    Added(PeerSession),
    /// The session with this full name went away
    Removed(String),
}

/// Browser for remote AppleMIDI sessions
#[derive(Debug, Clone, Default)]
pub struct PeerBrowser {
    exclude: Option<String>,
}

impl PeerBrowser {
    /// Browser reporting every session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Browser that ignores the session called `name`, usually our own
    #[must_use]
    pub fn excluding(name: impl Into<String>) -> Self {
        Self {
            exclude: Some(name.into()),
        }
    }

    /// Start browsing
    ///
    /// # Errors
    ///
    /// Returns an error if the mDNS daemon cannot be started.
    pub fn browse(self) -> Result<impl Stream<Item = DiscoveryEvent>, DiscoveryError> {
        let mdns = ServiceDaemon::new()?;
        let receiver = mdns.browse(SERVICE_TYPE)?;
        Ok(PeerStream {
            mdns,
            stream: Box::new(receiver.into_stream()),
            tracker: PeerTracker::new(self.exclude),
        })
    }
}

/// Turns daemon events into [`DiscoveryEvent`]s
#[derive(Debug, Default)]
pub(crate) struct PeerTracker {
    exclude: Option<String>,
    known: HashMap<String, PeerSession>,
}

impl PeerTracker {
    pub(crate) fn new(exclude: Option<String>) -> Self {
        Self {
            exclude,
            known: HashMap::new(),
        }
    }

    pub(crate) fn process(&mut self, event: ServiceEvent) -> Option<DiscoveryEvent> {
        match event {
            ServiceEvent::ServiceResolved(info) => self.resolved(&info),
            ServiceEvent::ServiceRemoved(_, fullname) => self
                .known
                .remove(&fullname)
                .map(|_| DiscoveryEvent::Removed(fullname)),
            _ => None,
        }
    }

    fn resolved(&mut self, info: &ServiceInfo) -> Option<DiscoveryEvent> {
        let peer = peer_from_info(info)?;
        if self.exclude.as_deref() == Some(peer.name.as_str()) {
            return None;
        }
        if self.known.get(&peer.fullname) == Some(&peer) {
            return None;
        }
        debug!(name = %peer.name, port = peer.port, "AppleMIDI session resolved");
        self.known.insert(peer.fullname.clone(), peer.clone());
        Some(DiscoveryEvent::Added(peer))
    }
}

pub(crate) fn peer_from_info(info: &ServiceInfo) -> Option<PeerSession> {
    let fullname = info.get_fullname().to_string();
    let name = fullname
        .strip_suffix(SERVICE_TYPE)?
        .trim_end_matches('.')
        .to_string();

    let mut addresses: Vec<IpAddr> = info.get_addresses().iter().copied().collect();
    if addresses.is_empty() {
        return None;
    }
    addresses.sort();

    Some(PeerSession {
        name,
        fullname,
        host: info.get_hostname().to_string(),
        addresses,
        port: info.get_port(),
    })
}

struct PeerStream {
    mdns: ServiceDaemon,
    stream: Box<dyn Stream<Item = ServiceEvent> + Send + Unpin>,
    tracker: PeerTracker,
}

impl Stream for PeerStream {
    type Item = DiscoveryEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let event = match Pin::new(&mut self.stream).poll_next(cx) {
                Poll::Ready(Some(event)) => event,
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            };

            if let Some(discovery_event) = self.tracker.process(event) {
                return Poll::Ready(Some(discovery_event));
            }
        }
    }
}

impl Drop for PeerStream {
    fn drop(&mut self) {
        let _ = self.mdns.stop_browse(SERVICE_TYPE);
        let _ = self.mdns.shutdown();
    }
}
