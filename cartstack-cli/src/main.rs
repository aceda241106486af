use anyhow::{Context as _, Result};
use cartstack_core::Config;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(name = "cartstack")]
#[command(about = "Provision the cart application stack on a container engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Stack name (scopes image tags, network and container names)
    #[arg(short, long, global = true, env = "CARTSTACK_STACK", default_value = "dev")]
    stack: String,

    /// Project name used to namespace configuration keys
    #[arg(long, global = true, env = "CARTSTACK_PROJECT", default_value = "cartstack")]
    project: String,

    /// Project directory holding Stack.<stack>.yaml, app/ and products.json
    #[arg(short = 'C', long, global = true, default_value = ".")]
    cwd: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what `up` would change
    Preview,

    /// Create or update the stack
    Up {
        /// Apply without confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove everything the stack created
    Destroy {
        /// Destroy without confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// List deployed stacks
    Ls {
        /// Show the resources of the selected stack instead
        #[arg(short, long)]
        resources: bool,
    },

    /// Print the resource graph
    Graph {
        /// Output format
        #[arg(short, long, value_enum, default_value = "dot")]
        format: GraphFormat,
    },

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show tool configuration and the selected stack's settings
    Show,

    /// Print the tool configuration file path
    Path,

    /// Write the current tool configuration to its file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum GraphFormat {
    Dot,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().context("Failed to load configuration")?;
    cartstack_core::init_observability(cli.verbose, &config.log_level)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let project_dir = std::fs::canonicalize(&cli.cwd)
        .with_context(|| format!("Project directory {} not found", cli.cwd.display()))?;

    debug!(
        stack = %cli.stack,
        project = %cli.project,
        dir = %project_dir.display(),
        "Resolved project"
    );

    let ctx = Context { stack: cli.stack, project: cli.project, project_dir, config };

    match cli.command {
        Commands::Preview => {
            commands::stack::preview(&ctx).await?;
        }

        Commands::Up { yes } => {
            commands::stack::up(&ctx, yes).await?;
        }

        Commands::Destroy { yes } => {
            commands::stack::destroy(&ctx, yes).await?;
        }

        Commands::Ls { resources } => {
            if resources {
                commands::ls::resources(&ctx).await?;
            } else {
                commands::ls::stacks(&ctx).await?;
            }
        }

        Commands::Graph { format } => {
            commands::graph::graph(&ctx, format)?;
        }

        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => {
                commands::config::show(&ctx)?;
            }

            ConfigCommands::Path => {
                println!("{}", Config::config_path().display());
            }

            ConfigCommands::Init { force } => {
                commands::config::init(&ctx, force)?;
            }
        },
    }

    Ok(())
}
