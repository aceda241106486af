//! Resource graph output.

use super::Context;
use crate::GraphFormat;
use anyhow::{Context as _, Result};

/// Print the declared resource graph
pub fn graph(ctx: &Context, format: GraphFormat) -> Result<()> {
    let graph = ctx.graph()?;

    match format {
        GraphFormat::Dot => print!("{}", graph.to_dot()),
        GraphFormat::Json => {
            let json = serde_json::to_string_pretty(&graph).context("Failed to serialize graph")?;
            println!("{}", json);
        }
    }

    Ok(())
}
