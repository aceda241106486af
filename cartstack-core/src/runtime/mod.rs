//! Container runtime abstraction.
//!
//! The deployer drives images, networks and containers through the
//! `ContainerRuntime` trait:
//! - `DockerCli`: the `docker` binary (or any CLI-compatible engine)
//! - test doubles in the integration tests

use crate::error::Result;
use crate::types::{ContainerSpec, ImageSpec, NetworkAttachment, NetworkSpec};
use async_trait::async_trait;

pub mod docker;

pub use docker::DockerCli;

/// A container ready to launch: declared inputs plus resolved references.
#[derive(Debug, Clone)]
pub struct ContainerLaunch {
    /// Container as declared
    pub spec: ContainerSpec,

    /// Image reference resolved from the image resource's outputs
    pub image: String,

    /// Attachments with network names resolved to runtime names
    pub networks: Vec<NetworkAttachment>,
}

impl ContainerLaunch {
    pub fn name(&self) -> &str {
        &self.spec.container_name
    }
}

/// Container runtime trait.
///
/// Every method maps to one engine operation. Removal of an object that no
/// longer exists succeeds.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Build an image from its context; returns the image ID.
    async fn build_image(&self, image: &ImageSpec) -> Result<String>;

    /// Pull an image by reference; returns the image ID.
    async fn pull_image(&self, reference: &str) -> Result<String>;

    /// Remove an image by reference.
    async fn remove_image(&self, reference: &str) -> Result<()>;

    /// Create a network; returns the network ID.
    async fn create_network(&self, network: &NetworkSpec) -> Result<String>;

    /// Remove a network by name.
    async fn remove_network(&self, name: &str) -> Result<()>;

    /// Create and start a long-lived container; returns the container ID.
    async fn start_container(&self, launch: &ContainerLaunch) -> Result<String>;

    /// Run a one-shot container to completion; returns its exit code.
    ///
    /// The container is removed by the runtime when it exits.
    async fn run_container(&self, launch: &ContainerLaunch) -> Result<i64>;

    /// Force-remove a container by name.
    async fn remove_container(&self, name: &str) -> Result<()>;

    /// Runtime name (for logging).
    fn name(&self) -> &str;
}
