//! Centralized path configuration for cartstack.
//!
//! All data paths should go through this module so the CLI and tests agree
//! on where state and tool configuration live.

use std::path::{Path, PathBuf};

/// Get the cartstack data directory.
///
/// Resolution order:
/// 1. `CARTSTACK_DATA_DIR` environment variable
/// 2. `~/.cartstack`
/// 3. `./.cartstack` when no home directory can be determined
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CARTSTACK_DATA_DIR") {
        return PathBuf::from(dir);
    }

    dirs::home_dir().map(|h| h.join(".cartstack")).unwrap_or_else(|| PathBuf::from(".cartstack"))
}

/// Get the tool configuration path.
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Path of the per-stack settings file inside a project directory.
pub fn stack_settings_path(project_dir: &Path, stack: &str) -> PathBuf {
    project_dir.join(format!("Stack.{}.yaml", stack))
}

/// Build context for one of the application images.
pub fn app_context(project_dir: &Path, app: &str) -> PathBuf {
    project_dir.join("app").join(app)
}

/// Seed data file bind-mounted into the seed job.
pub fn seed_data_path(project_dir: &Path) -> PathBuf {
    project_dir.join("products.json")
}
