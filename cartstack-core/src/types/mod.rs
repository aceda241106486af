//! Core domain types for cartstack.

pub mod container;
pub mod image;
pub mod network;
pub mod resource;
pub mod stack;

// Re-exports
pub use container::{ContainerSpec, EnvVar, Mount, MountKind, NetworkAttachment};
pub use image::{stack_tag, ImageSource, ImageSpec};
pub use network::{NetworkDriver, NetworkSpec, PortMapping, Protocol};
pub use resource::{Outputs, Resource, ResourceKind};
pub use stack::{DeployedResource, StackRecord, StackStatus};
