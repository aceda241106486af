//! Container domain types.

use crate::types::network::PortMapping;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(key: impl Into<String>, value: impl ToString) -> Self {
        Self { key: key.into(), value: value.to_string() }
    }
}

impl std::fmt::Display for EnvVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Attachment of a container to a declared network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAttachment {
    /// Logical name of the network resource
    pub network: String,

    /// DNS aliases on that network
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Mount type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MountKind {
    #[default]
    Bind,
}

impl std::fmt::Display for MountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MountKind::Bind => write!(f, "bind"),
        }
    }
}

/// Filesystem mount into a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub kind: MountKind,
    pub source: PathBuf,
    pub target: String,
}

impl Mount {
    pub fn bind(source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self { kind: MountKind::Bind, source: source.into(), target: target.into() }
    }
}

/// Declared container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Logical resource name
    pub name: String,

    /// Name the container is created with on the runtime
    pub container_name: String,

    /// Logical name of the image resource
    pub image: String,

    #[serde(default)]
    pub ports: Vec<PortMapping>,

    #[serde(default)]
    pub env: Vec<EnvVar>,

    #[serde(default)]
    pub networks: Vec<NetworkAttachment>,

    #[serde(default)]
    pub mounts: Vec<Mount>,

    /// Command override (image default when empty)
    #[serde(default)]
    pub command: Vec<String>,

    /// The container is expected to stay running
    pub must_run: bool,

    /// Remove the container once it exits
    pub remove_on_exit: bool,
}

impl ContainerSpec {
    pub fn new(
        name: impl Into<String>,
        container_name: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            container_name: container_name.into(),
            image: image.into(),
            ports: Vec::new(),
            env: Vec::new(),
            networks: Vec::new(),
            mounts: Vec::new(),
            command: Vec::new(),
            must_run: true,
            remove_on_exit: false,
        }
    }

    pub fn port(mut self, mapping: PortMapping) -> Self {
        self.ports.push(mapping);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.env.push(EnvVar::new(key, value));
        self
    }

    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.networks.push(NetworkAttachment { network: network.into(), aliases: Vec::new() });
        self
    }

    pub fn network_with_aliases(mut self, network: impl Into<String>, aliases: &[&str]) -> Self {
        self.networks.push(NetworkAttachment {
            network: network.into(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        });
        self
    }

    pub fn mount(mut self, mount: Mount) -> Self {
        self.mounts.push(mount);
        self
    }

    pub fn command<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = args.into_iter().map(Into::into).collect();
        self
    }

    /// Mark as a job: run once, need not keep running, removed after exit.
    pub fn one_shot(mut self) -> Self {
        self.must_run = false;
        self.remove_on_exit = true;
        self
    }

    pub fn is_one_shot(&self) -> bool {
        !self.must_run && self.remove_on_exit
    }

    /// Value of an environment variable, if assigned.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env.iter().find(|e| e.key == key).map(|e| e.value.as_str())
    }
}
