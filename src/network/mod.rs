//! Network module - Handles the client side of the game connection
//!
//! Provides:
//! - Packet channel with handler dispatch
//! - Handshake coordination
//! - Connection driver and client

mod channel;
mod client;
mod connection;
mod dispatch;
mod handshake;

#[cfg(test)]
mod testing;

pub use channel::*;
pub use client::*;
pub use connection::*;
pub use dispatch::*;
pub use handshake::*;

use std::net::SocketAddr;

use crate::protocol::{Version, CLIENT_VERSION, DEFAULT_PORT};

/// Configuration for network operations
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Port to connect to
    pub port: u16,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Version reported in the init request
    pub version: Version,
    /// Hardware id reported in the init request
    pub hdid: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            connect_timeout_ms: 5000,
            version: CLIENT_VERSION,
            hdid: String::from("0"),
        }
    }
}

impl NetworkConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    pub fn with_hdid(mut self, hdid: String) -> Self {
        self.hdid = hdid;
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }
}

/// Resolve a hostname to a socket address
pub async fn resolve_host(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    use tokio::net::lookup_host;

    let addr_string = format!("{}:{}", host, port);
    let mut addrs = lookup_host(&addr_string).await?;

    addrs.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Could not resolve host: {}", host),
        )
    })
}
