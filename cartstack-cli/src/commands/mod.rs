//! CLI command implementations

use anyhow::{Context as _, Result};
use cartstack_core::{
    Config, Deployer, DockerCli, ResourceGraph, StackSettings, StackStatus, StateManager,
};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub mod config;
pub mod graph;
pub mod ls;
pub mod stack;

/// Selected stack plus the loaded tool configuration.
pub struct Context {
    pub stack: String,
    pub project: String,
    pub project_dir: PathBuf,
    pub config: Config,
}

impl Context {
    pub fn settings(&self) -> Result<StackSettings> {
        StackSettings::load(&self.project_dir, &self.project, &self.stack)
            .with_context(|| format!("Failed to load settings for stack '{}'", self.stack))
    }

    /// Declare the stack's resource graph.
    pub fn graph(&self) -> Result<ResourceGraph> {
        let settings = self.settings()?;
        cartstack_core::stack::define(&settings, &self.stack, &self.project_dir)
            .with_context(|| format!("Failed to declare stack '{}'", self.stack))
    }

    pub async fn state(&self) -> Result<StateManager> {
        StateManager::new(self.config.db_path()).await.context("Failed to open state database")
    }

    pub async fn deployer(&self) -> Result<Deployer> {
        let runtime = Arc::new(DockerCli::from_config(&self.config));
        Ok(Deployer::new(runtime, self.state().await?, self.project.clone()))
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Ask a yes/no question; anything but "y" is no.
pub fn confirm(question: &str) -> Result<bool> {
    print!("{} {} [y/N]: ", "⚠".yellow().bold(), question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

pub fn spinner(color: &str, message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let template = format!("{{spinner:.{}}} {{msg}}", color);
    let style = ProgressStyle::default_spinner()
        .template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    spinner.set_style(style);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Colorize stack status
pub fn colorize_status(status: StackStatus) -> String {
    let text = status.to_string();
    match status {
        StackStatus::Deployed => text.green().to_string(),
        StackStatus::Deploying => text.yellow().to_string(),
        StackStatus::Failed => text.red().bold().to_string(),
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

/// First 12 characters of a runtime ID, without the digest prefix.
pub fn short_id(id: &str) -> String {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    id.chars().take(12).collect()
}
