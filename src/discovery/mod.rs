//! Bonjour discovery for AppleMIDI sessions
//!
//! Sessions announce their control port as `_apple-midi._udp`; the data
//! port is always the one above it.

mod advertiser;
mod browser;


pub use advertiser::SessionAdvertiser;
pub use browser::{DiscoveryEvent, PeerBrowser, PeerSession};

/// Service type AppleMIDI sessions register under
pub const SERVICE_TYPE: &str = "_apple-midi._udp.local.";

/// Errors from advertising or browsing
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// mDNS daemon error
    #[error("mDNS error: {0}")]
    Mdns(#[from] mdns_sd::Error),

    /// Service not registered
    #[error("service not registered")]
    NotRegistered,

    /// Service already registered
    #[error("service already registered")]
    AlreadyRegistered,
}

/// Browse for `timeout` and return every session still present at the end
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), applemidi::discovery::DiscoveryError> {
/// for peer in applemidi::discovery::scan(Duration::from_secs(3)).await? {
///     println!("{} at {:?}", peer.name, peer.control_addr());
/// }
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if the mDNS daemon cannot be started.
#[cfg(feature = "tokio-runtime")]
pub async fn scan(timeout: std::time::Duration) -> Result<Vec<PeerSession>, DiscoveryError> {
    use futures::StreamExt;
    use std::collections::HashMap;

    let stream = PeerBrowser::new().browse()?;
    let mut peers: HashMap<String, PeerSession> = HashMap::new();
    let deadline = tokio::time::Instant::now() + timeout;

    tokio::pin!(stream);

    loop {
        tokio::select! {
            () = tokio::time::sleep_until(deadline) => break,
            event = stream.next() => match event {
                Some(DiscoveryEvent::Added(peer)) => {
                    peers.insert(peer.fullname.clone(), peer);
                }
                Some(DiscoveryEvent::Removed(fullname)) => {
                    peers.remove(&fullname);
                }
                None => break,
            }
        }
    }

    Ok(peers.into_values().collect())
}
