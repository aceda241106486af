//! Listing commands.

use super::{colorize_status, format_duration, short_id, Context};
use anyhow::Result;
use colored::Colorize;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};

/// List deployed stacks
pub async fn stacks(ctx: &Context) -> Result<()> {
    let state = ctx.state().await?;
    let stacks = state.list_stacks().await?;

    if stacks.is_empty() {
        println!("No stacks deployed");
        return Ok(());
    }

    #[derive(Tabled)]
    struct StackRow {
        #[tabled(rename = "STACK")]
        name: String,
        #[tabled(rename = "PROJECT")]
        project: String,
        #[tabled(rename = "STATUS")]
        status: String,
        #[tabled(rename = "RESOURCES")]
        resources: usize,
        #[tabled(rename = "UPDATED")]
        updated: String,
    }

    let mut rows = Vec::with_capacity(stacks.len());
    for s in &stacks {
        let resources = state.list_resources(&s.name).await?.len();
        let elapsed = s.updated_at.elapsed().unwrap_or(Duration::from_secs(0));
        rows.push(StackRow {
            name: s.name.clone(),
            project: s.project.clone(),
            status: colorize_status(s.status),
            resources,
            updated: format!("{} ago", format_duration(elapsed)),
        });
    }

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);

    Ok(())
}

/// List the resources recorded for the selected stack
pub async fn resources(ctx: &Context) -> Result<()> {
    let state = ctx.state().await?;
    let Some(stack) = state.get_stack(&ctx.stack).await? else {
        println!("Stack '{}' is not deployed", ctx.stack);
        return Ok(());
    };
    let resources = state.list_resources(&ctx.stack).await?;

    println!("{}: {}", "Stack".bold(), stack.name);
    println!("{}: {}", "Status".bold(), colorize_status(stack.status));
    println!();

    #[derive(Tabled)]
    struct ResourceRow {
        #[tabled(rename = "RESOURCE")]
        name: String,
        #[tabled(rename = "KIND")]
        kind: String,
        #[tabled(rename = "NAME")]
        runtime_name: String,
        #[tabled(rename = "ID")]
        id: String,
    }

    let rows: Vec<ResourceRow> = resources
        .iter()
        .map(|r| ResourceRow {
            name: r.name.clone(),
            kind: r.kind.to_string(),
            runtime_name: r.resource.runtime_name().to_string(),
            id: match r.outputs.exit_code {
                Some(code) => format!("exited ({})", code),
                None => short_id(&r.outputs.id),
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);

    Ok(())
}
