//! Network abstraction layer
//!
//! The core only sees [`Endpoint`]; the tokio implementation is one
//! provider, the in-memory network in [`crate::testing`] another.

mod traits;

#[cfg(feature = "tokio-runtime")]
mod tokio_impl;


pub use traits::Endpoint;

#[cfg(feature = "tokio-runtime")]
pub use tokio_impl::UdpEndpoint;

/// Runtime abstraction for common operations
pub struct Runtime;

impl Runtime {
    /// Sleep for the specified duration
    #[cfg(feature = "tokio-runtime")]
    pub async fn sleep(duration: std::time::Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Get current timestamp
    #[must_use]
    pub fn now() -> std::time::Instant {
        std::time::Instant::now()
    }
}
