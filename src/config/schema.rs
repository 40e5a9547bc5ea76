//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the redirector.
//! Field names are PascalCase to match the deployed JSON files.

use std::io::ErrorKind;
use std::net::{Ipv6Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::lookup_host;

use crate::routing::cache::DEFAULT_CAPACITY;

/// Root configuration for the redirector.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "PascalCase")]
pub struct RedirectorConfig {
    /// Listen address; `:1094` binds every interface, IPv6 and IPv4.
    pub addr: String,

    /// Path to certificate chain file (PEM).
    pub cert: String,

    /// Path to private key file (PEM).
    pub key: String,

    /// Backend base addresses, in index order.
    pub servers: Vec<String>,

    /// Maximum number of path affinities remembered.
    pub cache_capacity: usize,

    /// TLS handshake and request header read timeout in seconds.
    pub read_timeout_secs: u64,

    /// Response write allowance in seconds, added to the read timeout to
    /// bound a whole connection.
    pub write_timeout_secs: u64,

    /// Upper bound on the request header buffer in bytes.
    pub max_header_bytes: usize,

    /// Maximum concurrent client connections (backpressure).
    pub max_connections: usize,

    /// Prometheus exporter bind address; disabled when absent.
    pub metrics_addr: Option<String>,

    /// How long to wait for open connections on shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for RedirectorConfig {
    fn default() -> Self {
        Self {
            addr: ":1094".to_string(),
            cert: "hostcert.pem".to_string(),
            key: "hostkey.pem".to_string(),
            servers: Vec::new(),
            cache_capacity: DEFAULT_CAPACITY,
            read_timeout_secs: 60,
            write_timeout_secs: 60,
            max_header_bytes: 12288,
            max_connections: 10_000,
            metrics_addr: None,
            shutdown_grace_secs: 10,
        }
    }
}

impl RedirectorConfig {
    /// Resolve `addr` to a socket address, expanding the `:port` shorthand.
    pub async fn listen_addr(&self) -> std::io::Result<SocketAddr> {
        resolve_listen_addr(&self.addr).await
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Split `host:port`. The host may be empty (every interface), a name, an
/// IPv4 literal or a bracketed IPv6 literal; brackets are removed.
pub fn split_listen_addr(addr: &str) -> Option<(&str, u16)> {
    let (host, port) = addr.rsplit_once(':')?;
    let port = port.parse().ok()?;

    let host = match host.strip_prefix('[') {
        Some(inner) => inner.strip_suffix(']')?,
        None if host.contains(':') => return None,
        None => host,
    };
    Some((host, port))
}

/// Resolve a listen address. An empty host binds the IPv6 wildcard, which
/// also accepts IPv4 clients on dual-stack hosts; names go through DNS and
/// the first result wins.
pub async fn resolve_listen_addr(addr: &str) -> std::io::Result<SocketAddr> {
    let invalid = || std::io::Error::new(ErrorKind::InvalidInput, format!("invalid listen address {:?}", addr));

    let (host, port) = split_listen_addr(addr).ok_or_else(invalid)?;
    if host.is_empty() {
        return Ok(SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)));
    }
    lookup_host((host, port)).await?.next().ok_or_else(invalid)
}
