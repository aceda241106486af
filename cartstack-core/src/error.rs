//! Error types for cartstack.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cartstack operations.
pub type Result<T> = std::result::Result<T, StackError>;

/// Main error type for cartstack.
#[derive(Error, Debug)]
pub enum StackError {
    // Configuration errors
    #[error("Missing required configuration value '{key}' for stack '{stack}'")]
    MissingConfig { stack: String, key: String },

    #[error("Invalid configuration value '{key}': {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("Failed to read configuration {path:?}: {reason}")]
    ConfigRead { path: PathBuf, reason: String },

    #[error("Invalid stack name '{name}': {reason}")]
    InvalidStackName { name: String, reason: String },

    // Graph errors
    #[error("Resource '{name}' is declared more than once")]
    DuplicateResource { name: String },

    #[error("Resource '{from}' references '{to}' which is not declared")]
    UnknownResource { from: String, to: String },

    #[error("Ordering edge names '{name}' which is not declared")]
    UndeclaredResource { name: String },

    #[error("Resource '{name}' is invalid: {reason}")]
    InvalidResource { name: String, reason: String },

    #[error("Circular dependency detected involving resource: {resource}")]
    CircularDependency { resource: String },

    // Runtime errors
    #[error("Failed to build image {tag}: {reason}")]
    BuildFailed { tag: String, reason: String },

    #[error("Failed to pull image {reference}: {reason}")]
    PullFailed { reference: String, reason: String },

    #[error("{program} {command} failed (exit code {code:?}): {stderr}")]
    RuntimeCommand { program: String, command: String, code: Option<i32>, stderr: String },

    #[error("{program} {command} timed out after {secs}s")]
    CommandTimeout { program: String, command: String, secs: u64 },

    #[error("Output '{output}' of resource '{resource}' is not available")]
    MissingOutput { resource: String, output: String },

    // State errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Database migration failed: {reason}")]
    MigrationFailed { reason: String },

    // File system errors
    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StackError {
    /// Create an Internal error from any error type.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(err.to_string())
    }

    /// True for errors raised while loading configuration, before any resource exists.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::MissingConfig { .. }
                | Self::InvalidConfig { .. }
                | Self::ConfigRead { .. }
                | Self::InvalidStackName { .. }
        )
    }
}
