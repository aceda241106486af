//! Image domain types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where an image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ImageSource {
    /// Built locally from a context directory.
    Build {
        /// Build context directory, holding its Dockerfile
        context: PathBuf,
    },

    /// Pulled from a registry by reference.
    Remote,
}

/// Declared image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    /// Logical resource name
    pub name: String,

    /// Image reference: the tag for built images, the pull reference otherwise
    pub image_name: String,

    /// Build or pull
    pub source: ImageSource,

    /// Never push the built image to a registry
    pub skip_push: bool,

    /// Leave the image on the host when the stack is destroyed
    pub keep_locally: bool,
}

impl ImageSpec {
    /// Image produced by a local build of `context`, tagged `tag`.
    pub fn build(
        name: impl Into<String>,
        context: impl Into<PathBuf>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            image_name: tag.into(),
            source: ImageSource::Build { context: context.into() },
            skip_push: true,
            keep_locally: false,
        }
    }

    /// Image pulled from a registry.
    pub fn remote(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image_name: reference.into(),
            source: ImageSource::Remote,
            skip_push: true,
            keep_locally: false,
        }
    }

    /// Leave the image on the host when the stack is destroyed.
    pub fn keep_locally(mut self) -> Self {
        self.keep_locally = true;
        self
    }

    pub fn is_build(&self) -> bool {
        matches!(self.source, ImageSource::Build { .. })
    }

    /// Build context, for built images.
    pub fn context(&self) -> Option<&PathBuf> {
        match &self.source {
            ImageSource::Build { context } => Some(context),
            ImageSource::Remote => None,
        }
    }
}

/// Tag given to an application image in a stack: `<name>:<stack>`.
pub fn stack_tag(name: &str, stack: &str) -> String {
    format!("{}:{}", name, stack)
}
