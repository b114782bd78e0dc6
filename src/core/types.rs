use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A device located on the network.
///
/// Identity is the (host, port) pair; the model string is metadata learned
/// from the discovery reply and does not participate in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAddress {
    /// Host the device answered from
    pub host: IpAddr,
    /// TCP control port
    pub port: u16,
    /// Model string declared in the discovery reply
    pub model: String,
}

impl DeviceAddress {
    /// Creates a new device address
    pub fn new(host: IpAddr, port: u16, model: impl Into<String>) -> Self {
        DeviceAddress {
            host,
            port,
            model: model.into(),
        }
    }

    /// Returns the socket address of the control endpoint
    pub fn control_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl PartialEq for DeviceAddress {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for DeviceAddress {}

impl Hash for DeviceAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.model, self.host, self.port)
    }
}

/// Connection state of a device handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection open
    Disconnected,
    /// Transport connect in progress
    Connecting,
    /// Control connection established
    Connected,
    /// Transport connect failed; terminal for this handle
    Failed,
}

/// Client configuration
///
/// Passed explicitly into discovery and connect calls rather than held as
/// process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// UDP port discovery probes are broadcast to
    pub discovery_port: u16,
    /// TCP port of the device control endpoint
    pub control_port: u16,
    /// Destination address for discovery probes
    pub broadcast_addr: IpAddr,
    /// Deadline for establishing the control connection
    pub connect_timeout: Duration,
    /// Default deadline for a single command exchange
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            discovery_port: super::DISCOVERY_PORT,
            control_port: super::CONTROL_PORT,
            broadcast_addr: IpAddr::V4(Ipv4Addr::BROADCAST),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
        }
    }
}
