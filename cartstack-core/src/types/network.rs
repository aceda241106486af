//! Network domain types.

use serde::{Deserialize, Serialize};

/// Network driver type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkDriver {
    #[default]
    Bridge,
}

impl std::fmt::Display for NetworkDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkDriver::Bridge => write!(f, "bridge"),
        }
    }
}

impl std::str::FromStr for NetworkDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bridge" => Ok(NetworkDriver::Bridge),
            _ => Err(format!("Unknown network driver: {}", s)),
        }
    }
}

/// Declared network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Logical resource name
    pub name: String,

    /// Name the network is created with on the runtime
    pub network_name: String,

    /// Network driver
    pub driver: NetworkDriver,
}

impl NetworkSpec {
    pub fn new(name: impl Into<String>, network_name: impl Into<String>) -> Self {
        Self { name: name.into(), network_name: network_name.into(), driver: NetworkDriver::Bridge }
    }
}

/// Port mapping (internal:external).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Port inside the container
    pub internal: u16,

    /// Port published on the host
    pub external: u16,

    /// Published protocol
    pub protocol: Protocol,
}

impl PortMapping {
    /// TCP mapping published on the same host port.
    pub fn same(port: u16) -> Self {
        Self { internal: port, external: port, protocol: Protocol::Tcp }
    }
}

impl std::fmt::Display for PortMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}/{}", self.external, self.internal, self.protocol)
    }
}

/// Network protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
        }
    }
}
