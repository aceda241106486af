//! Per-stack settings.
//!
//! Each stack reads its six required values from `Stack.<stack>.yaml` in the
//! project directory. Keys may be namespaced by the project (`shop:database`)
//! or bare (`database`); the namespaced form wins when both are present.
//! None of the values has a default.

use crate::error::{Result, StackError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, instrument};

pub const FRONTEND_PORT: &str = "frontend_port";
pub const BACKEND_PORT: &str = "backend_port";
pub const MONGO_PORT: &str = "mongo_port";
pub const MONGO_HOST: &str = "mongo_host";
pub const DATABASE: &str = "database";
pub const NODE_ENVIRONMENT: &str = "node_environment";

/// Every key a stack must define, in load order.
pub const REQUIRED_KEYS: [&str; 6] =
    [FRONTEND_PORT, BACKEND_PORT, MONGO_PORT, MONGO_HOST, DATABASE, NODE_ENVIRONMENT];

/// Typed stack settings, constructed once and passed by reference to the definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSettings {
    pub frontend_port: u16,
    pub backend_port: u16,
    pub mongo_port: u16,
    pub mongo_host: String,
    pub database: String,
    pub node_environment: String,
}

/// On-disk layout of a stack settings file.
#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    config: BTreeMap<String, serde_yaml::Value>,
}

impl StackSettings {
    /// Load settings for `stack` from the project directory.
    #[instrument(skip(project_dir), fields(dir = %project_dir.display()))]
    pub fn load(project_dir: &Path, project: &str, stack: &str) -> Result<Self> {
        let path = paths::stack_settings_path(project_dir, stack);
        debug!("Reading stack settings from {}", path.display());

        let content = std::fs::read_to_string(&path).map_err(|e| StackError::ConfigRead {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Self::parse(&content, project, stack)
    }

    /// Parse a settings document.
    pub fn parse(content: &str, project: &str, stack: &str) -> Result<Self> {
        let file: SettingsFile = if content.trim().is_empty() {
            SettingsFile::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| StackError::InvalidConfig {
                key: "config".to_string(),
                reason: format!("invalid YAML: {}", e),
            })?
        };
        Self::from_values(&file.config, project, stack)
    }

    /// Build settings from a raw key/value map.
    pub fn from_values(
        values: &BTreeMap<String, serde_yaml::Value>,
        project: &str,
        stack: &str,
    ) -> Result<Self> {
        let lookup = Lookup { values, project, stack };

        Ok(Self {
            frontend_port: lookup.require_port(FRONTEND_PORT)?,
            backend_port: lookup.require_port(BACKEND_PORT)?,
            mongo_port: lookup.require_port(MONGO_PORT)?,
            mongo_host: lookup.require_string(MONGO_HOST)?,
            database: lookup.require_string(DATABASE)?,
            node_environment: lookup.require_string(NODE_ENVIRONMENT)?,
        })
    }
}

struct Lookup<'a> {
    values: &'a BTreeMap<String, serde_yaml::Value>,
    project: &'a str,
    stack: &'a str,
}

impl Lookup<'_> {
    fn get(&self, key: &str) -> Result<&serde_yaml::Value> {
        let namespaced = format!("{}:{}", self.project, key);
        self.values.get(&namespaced).or_else(|| self.values.get(key)).ok_or_else(|| {
            StackError::MissingConfig { stack: self.stack.to_string(), key: key.to_string() }
        })
    }

    fn require_int(&self, key: &str) -> Result<i64> {
        let invalid = |reason: String| StackError::InvalidConfig { key: key.to_string(), reason };

        match self.get(key)? {
            serde_yaml::Value::Number(n) => {
                n.as_i64().ok_or_else(|| invalid(format!("expected an integer, got {}", n)))
            }
            // Values are textual by convention, so decimal strings are accepted.
            serde_yaml::Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| invalid(format!("expected an integer, got '{}'", s))),
            other => Err(invalid(format!("expected an integer, got {}", describe(other)))),
        }
    }

    fn require_port(&self, key: &str) -> Result<u16> {
        let value = self.require_int(key)?;
        match u16::try_from(value) {
            Ok(port) if port != 0 => Ok(port),
            _ => Err(StackError::InvalidConfig {
                key: key.to_string(),
                reason: format!("{} is not a valid TCP port", value),
            }),
        }
    }

    fn require_string(&self, key: &str) -> Result<String> {
        match self.get(key)? {
            serde_yaml::Value::String(s) => Ok(s.clone()),
            serde_yaml::Value::Number(n) => Ok(n.to_string()),
            serde_yaml::Value::Bool(b) => Ok(b.to_string()),
            other => Err(StackError::InvalidConfig {
                key: key.to_string(),
                reason: format!("expected a string, got {}", describe(other)),
            }),
        }
    }
}

fn describe(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}
