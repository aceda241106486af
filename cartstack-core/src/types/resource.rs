//! Resource declarations and their computed outputs.

use crate::types::container::ContainerSpec;
use crate::types::image::ImageSpec;
use crate::types::network::NetworkSpec;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Image,
    RemoteImage,
    Network,
    Container,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Image => write!(f, "image"),
            ResourceKind::RemoteImage => write!(f, "remote_image"),
            ResourceKind::Network => write!(f, "network"),
            ResourceKind::Container => write!(f, "container"),
        }
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(ResourceKind::Image),
            "remote_image" => Ok(ResourceKind::RemoteImage),
            "network" => Ok(ResourceKind::Network),
            "container" => Ok(ResourceKind::Container),
            _ => Err(format!("Unknown resource kind: {}", s)),
        }
    }
}

/// A declared resource, submitted once to the deployer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resource", rename_all = "lowercase")]
pub enum Resource {
    Image(ImageSpec),
    Network(NetworkSpec),
    Container(ContainerSpec),
}

impl Resource {
    /// Logical name, unique within a graph.
    pub fn name(&self) -> &str {
        match self {
            Resource::Image(i) => &i.name,
            Resource::Network(n) => &n.name,
            Resource::Container(c) => &c.name,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Image(i) if i.is_build() => ResourceKind::Image,
            Resource::Image(_) => ResourceKind::RemoteImage,
            Resource::Network(_) => ResourceKind::Network,
            Resource::Container(_) => ResourceKind::Container,
        }
    }

    /// Name of the object on the container runtime.
    pub fn runtime_name(&self) -> &str {
        match self {
            Resource::Image(i) => &i.image_name,
            Resource::Network(n) => &n.network_name,
            Resource::Container(c) => &c.container_name,
        }
    }

    /// Logical names of the resources whose outputs this one consumes.
    pub fn references(&self) -> Vec<&str> {
        match self {
            Resource::Image(_) | Resource::Network(_) => Vec::new(),
            Resource::Container(c) => {
                let mut refs = vec![c.image.as_str()];
                for attachment in &c.networks {
                    if !refs.contains(&attachment.network.as_str()) {
                        refs.push(attachment.network.as_str());
                    }
                }
                refs
            }
        }
    }

    pub fn as_container(&self) -> Option<&ContainerSpec> {
        match self {
            Resource::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageSpec> {
        match self {
            Resource::Image(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_network(&self) -> Option<&NetworkSpec> {
        match self {
            Resource::Network(n) => Some(n),
            _ => None,
        }
    }

    /// SHA-256 over the canonical JSON form of the declared inputs.
    pub fn fingerprint(&self) -> String {
        // Serializing plain data structs cannot fail.
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        format!("{:x}", Sha256::digest(&bytes))
    }
}

/// Attributes computed by the runtime when a resource is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outputs {
    /// Runtime identifier (image ID, network ID, container ID)
    pub id: String,

    /// Name dependents use to refer to this resource
    pub name: String,

    /// Exit code of a one-shot container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::network::PortMapping;

    #[test]
    fn test_kind_and_references() {
        let image = Resource::Image(ImageSpec::remote("mongo", "mongo:bionic"));
        assert_eq!(image.kind(), ResourceKind::RemoteImage);
        assert!(image.references().is_empty());

        let container = Resource::Container(
            ContainerSpec::new("db", "db-dev", "mongo").network("net").network("net"),
        );
        assert_eq!(container.kind(), ResourceKind::Container);
        assert_eq!(container.references(), vec!["mongo", "net"]);
        assert_eq!(container.runtime_name(), "db-dev");
    }

    #[test]
    fn test_fingerprint_tracks_inputs() {
        let a = Resource::Container(ContainerSpec::new("db", "db-dev", "mongo"));
        let b = Resource::Container(
            ContainerSpec::new("db", "db-dev", "mongo").port(PortMapping::same(27017)),
        );
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in [
            ResourceKind::Image,
            ResourceKind::RemoteImage,
            ResourceKind::Network,
            ResourceKind::Container,
        ] {
            assert_eq!(kind.to_string().parse::<ResourceKind>().unwrap(), kind);
        }
    }
}
