//! Configuration inspection.

use super::Context;
use anyhow::{bail, Context as _, Result};
use cartstack_core::Config;
use colored::Colorize;

/// Show tool configuration and the selected stack's settings
pub fn show(ctx: &Context) -> Result<()> {
    println!("{}", "Tool Configuration".bold().underline());
    println!();
    println!("{}: {}", "File".bold(), Config::config_path().display());
    println!("{}: {}", "Docker".bold(), ctx.config.docker_binary);
    println!("{}: {}s", "Command timeout".bold(), ctx.config.command_timeout_secs);
    println!("{}: {}", "Log level".bold(), ctx.config.log_level);
    println!("{}: {}", "State database".bold(), ctx.config.db_path().display());
    println!();

    println!("{}", format!("Stack '{}'", ctx.stack).bold().underline());
    println!();
    println!("{}: {}", "Project".bold(), ctx.project);
    println!("{}: {}", "Directory".bold(), ctx.project_dir.display());

    match ctx.settings() {
        Ok(settings) => {
            let values = serde_json::to_value(&settings).context("Failed to serialize settings")?;
            if let Some(map) = values.as_object() {
                for (key, value) in map {
                    let value =
                        value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
                    println!("  {} {} = {}", "•".dimmed(), key.bold(), value);
                }
            }
        }
        Err(e) => {
            println!("{} {:#}", "✗".red().bold(), e);
        }
    }

    Ok(())
}

/// Write the tool configuration file, seeded from the values in effect
pub fn init(ctx: &Context, force: bool) -> Result<()> {
    let path = Config::config_path();
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    ctx.config.save().context("Failed to write configuration")?;
    println!("{} Wrote {}", "✓".green().bold(), path.display());
    Ok(())
}
