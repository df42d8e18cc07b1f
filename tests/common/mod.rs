//! Common test utilities
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialize test logging (call once per test module)
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env().add_directive("applemidi=debug".parse().unwrap());
        let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}

pub fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}
