//! `_apple-midi._udp` service registration

use std::collections::HashMap;

use mdns_sd::{ServiceDaemon, ServiceInfo};
use tracing::info;

use super::{DiscoveryError, SERVICE_TYPE};
use crate::types::SessionConfig;

/// Announces a local session on the network
pub struct SessionAdvertiser {
    daemon: ServiceDaemon,
    name: String,
    port: u16,
    fullname: Option<String>,
}

impl SessionAdvertiser {
    /// Advertiser for a session called `name` on control port `port`
    ///
    /// # Errors
    ///
    /// Returns an error if the mDNS daemon cannot be started.
    pub fn new(name: impl Into<String>, port: u16) -> Result<Self, DiscoveryError> {
        Ok(Self {
            daemon: ServiceDaemon::new()?,
            name: name.into(),
            port,
            fullname: None,
        })
    }

    /// Advertiser for the session `config` describes
    ///
    /// # Errors
    ///
    /// Returns an error if the mDNS daemon cannot be started.
    pub fn from_config(config: &SessionConfig) -> Result<Self, DiscoveryError> {
        Self::new(config.session_name.clone(), config.control_port)
    }

    /// Instance name being advertised
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the service is currently registered
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.fullname.is_some()
    }

    /// Register the service
    ///
    /// # Errors
    ///
    /// `AlreadyRegistered` if called twice, or the daemon's error.
    pub fn register(&mut self) -> Result<(), DiscoveryError> {
        if self.fullname.is_some() {
            return Err(DiscoveryError::AlreadyRegistered);
        }

        let service = service_info(&self.name, &local_host(), self.port)?;
        let fullname = service.get_fullname().to_string();
        self.daemon.register(service)?;

        info!(name = %self.name, port = self.port, "AppleMIDI service registered");
        self.fullname = Some(fullname);
        Ok(())
    }

    /// Withdraw the service
    ///
    /// # Errors
    ///
    /// `NotRegistered` if not registered, or the daemon's error.
    pub fn unregister(&mut self) -> Result<(), DiscoveryError> {
        let fullname = self.fullname.take().ok_or(DiscoveryError::NotRegistered)?;
        self.daemon.unregister(&fullname)?;
        info!(name = %fullname, "AppleMIDI service unregistered");
        Ok(())
    }
}

impl Drop for SessionAdvertiser {
    fn drop(&mut self) {
        if self.fullname.is_some() {
            let _ = self.unregister();
        }
        let _ = self.daemon.shutdown();
    }
}

/// Service record for `name` on `host`, addresses filled in by the daemon
pub(crate) fn service_info(name: &str, host: &str, port: u16) -> Result<ServiceInfo, DiscoveryError> {
    let info = ServiceInfo::new(
        SERVICE_TYPE,
        name,
        host,
        "",
        port,
        HashMap::<String, String>::new(),
    )?;
    Ok(info.enable_addr_auto())
}

fn local_host() -> String {
    let host = hostname::get().map_or_else(
        |_| "applemidi".to_string(),
        |h| h.to_string_lossy().into_owned(),
    );
    format!("{}.local.", host_label(&host))
}

/// DNS label for `name`: alphanumerics kept, everything else `-`
pub(crate) fn host_label(name: &str) -> String {
    let label: String = name
        .trim_end_matches(".local")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let label = label.trim_matches('-');
    if label.is_empty() {
        "applemidi".to_string()
    } else {
        label.to_string()
    }
}
