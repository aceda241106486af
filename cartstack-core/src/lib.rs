//! cartstack core library
//!
//! Declares the shopping-cart application stack as a resource graph and
//! drives a container runtime to create it.

pub mod config;
pub mod deploy;
pub mod error;
pub mod graph;
pub mod observability;
pub mod paths;
pub mod runtime;
pub mod settings;
pub mod stack;
pub mod state;
pub mod types;

// Re-export commonly used items
pub use config::Config;
pub use deploy::{Action, DeployProgress, Deployer, DestroyReport, Plan, PlannedChange, UpReport};
pub use error::{Result, StackError};
pub use graph::{Edge, EdgeKind, ResourceGraph};
pub use observability::init as init_observability;
pub use runtime::{ContainerLaunch, ContainerRuntime, DockerCli};
pub use settings::StackSettings;
pub use state::StateManager;
pub use types::{
    ContainerSpec, DeployedResource, ImageSpec, NetworkSpec, Outputs, PortMapping, Resource,
    ResourceKind, StackRecord, StackStatus,
};
