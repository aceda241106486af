//! Deployed stack records.

use crate::types::resource::{Outputs, Resource, ResourceKind};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Deployment status of a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackStatus {
    /// An `up` is in progress or was interrupted
    Deploying,

    /// Last `up` completed
    Deployed,

    /// Last `up` stopped on an error; recorded resources may be partial
    Failed,
}

impl std::fmt::Display for StackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackStatus::Deploying => write!(f, "deploying"),
            StackStatus::Deployed => write!(f, "deployed"),
            StackStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for StackStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deploying" => Ok(StackStatus::Deploying),
            "deployed" => Ok(StackStatus::Deployed),
            "failed" => Ok(StackStatus::Failed),
            _ => Err(format!("Unknown stack status: {}", s)),
        }
    }
}

/// A deployment of the stack definition under one stack name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackRecord {
    /// Stack name (e.g. "dev")
    pub name: String,

    /// Project the stack belongs to
    pub project: String,

    pub status: StackStatus,

    /// Creation timestamp
    pub created_at: SystemTime,

    /// Last update timestamp
    pub updated_at: SystemTime,
}

/// A resource the deployer created and still owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployedResource {
    /// Owning stack
    pub stack: String,

    /// Logical resource name
    pub name: String,

    pub kind: ResourceKind,

    /// Inputs the resource was created from
    pub resource: Resource,

    /// Fingerprint of the inputs it was created from
    pub fingerprint: String,

    /// Computed outputs
    pub outputs: Outputs,

    /// Position in the apply order when created; destroy walks it backwards
    pub sequence: i64,

    /// Creation timestamp
    pub created_at: SystemTime,
}
