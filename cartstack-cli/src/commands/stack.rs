//! Stack lifecycle commands: preview, up, destroy.

use super::{confirm, format_duration, short_id, spinner, Context};
use anyhow::{Context as _, Result};
use cartstack_core::{Action, Plan, UpReport};
use colored::Colorize;
use std::time::Instant;
use tabled::{settings::Style, Table, Tabled};
use tokio::sync::mpsc;

/// Show the changes `up` would make
pub async fn preview(ctx: &Context) -> Result<()> {
    let graph = ctx.graph()?;
    let deployer = ctx.deployer().await?;
    let plan = deployer.plan(&graph).await.context("Failed to plan stack")?;

    println!(
        "{} Previewing stack {} ({} resources)",
        "→".cyan().bold(),
        ctx.stack.bold(),
        graph.len()
    );
    println!();
    print_plan(&plan);
    println!("{}", plan_summary(&plan).dimmed());

    Ok(())
}

/// Create or update the stack
pub async fn up(ctx: &Context, yes: bool) -> Result<()> {
    let graph = ctx.graph()?;
    let deployer = ctx.deployer().await?;
    let plan = deployer.plan(&graph).await.context("Failed to plan stack")?;

    if !plan.has_changes() {
        println!("{} Stack {} is up to date", "✓".green().bold(), ctx.stack.bold());
        return Ok(());
    }

    println!("{} Updating stack {}", "→".cyan().bold(), ctx.stack.bold());
    println!();
    print_plan(&plan);
    println!("{}", plan_summary(&plan).dimmed());
    println!();

    if !yes && !confirm(&format!("Apply these changes to stack '{}'?", ctx.stack.bold()))? {
        println!("Aborted.");
        return Ok(());
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let deployer = deployer.with_progress(tx);

    let spinner =
        spinner("green", "Applying changes (image builds may take a while)...".to_string());
    let progress = {
        let spinner = spinner.clone();
        tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                if update.stage == "warning" {
                    spinner.println(format!("{} {}", "⚠".yellow().bold(), update.message));
                } else {
                    spinner.set_message(format!(
                        "{} {}",
                        update.resource.bold(),
                        update.message.dimmed()
                    ));
                }
            }
        })
    };

    let started = Instant::now();
    let result = deployer.up(&graph).await;
    drop(deployer);
    let _ = progress.await;
    spinner.finish_and_clear();

    let report = result.with_context(|| format!("Failed to deploy stack '{}'", ctx.stack))?;

    println!(
        "{} Stack deployed: {} ({})",
        "✓".green().bold(),
        ctx.stack.bold(),
        format_duration(started.elapsed())
    );
    println!(
        "{}",
        format!(
            "{} created, {} replaced, {} deleted, {} unchanged",
            report.created, report.replaced, report.deleted, report.unchanged
        )
        .dimmed()
    );
    println!();
    print_outputs(&report);

    for warning in &report.warnings {
        println!("{} {}", "⚠".yellow().bold(), warning);
    }

    Ok(())
}

/// Remove everything the stack created
pub async fn destroy(ctx: &Context, yes: bool) -> Result<()> {
    let deployer = ctx.deployer().await?;
    let recorded = deployer.state().list_resources(&ctx.stack).await?;
    let known = deployer.state().get_stack(&ctx.stack).await?.is_some();

    if recorded.is_empty() && !known {
        println!("No resources recorded for stack '{}'", ctx.stack);
        return Ok(());
    }

    if !yes
        && !confirm(&format!(
            "Destroy stack '{}' and its {} resource(s)?",
            ctx.stack.bold(),
            recorded.len()
        ))?
    {
        println!("Aborted.");
        return Ok(());
    }

    let spinner = spinner("yellow", format!("Destroying stack '{}'...", ctx.stack));
    let result = deployer.destroy(&ctx.stack).await;
    spinner.finish_and_clear();

    let report = result.with_context(|| format!("Failed to destroy stack '{}'", ctx.stack))?;

    println!(
        "{} Stack destroyed: {} ({} resources removed)",
        "✓".green().bold(),
        ctx.stack.bold(),
        report.removed.len()
    );
    for warning in &report.warnings {
        println!("{} {}", "⚠".yellow().bold(), warning);
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn print_plan(plan: &Plan) {
    #[derive(Tabled)]
    struct PlanRow {
        #[tabled(rename = "ACTION")]
        action: String,
        #[tabled(rename = "RESOURCE")]
        name: String,
        #[tabled(rename = "KIND")]
        kind: String,
        #[tabled(rename = "NAME")]
        runtime_name: String,
    }

    let rows: Vec<PlanRow> = plan
        .changes
        .iter()
        .map(|c| PlanRow {
            action: colorize_action(c.action),
            name: c.name.clone(),
            kind: c.kind.to_string(),
            runtime_name: c.runtime_name.clone(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}

fn print_outputs(report: &UpReport) {
    #[derive(Tabled)]
    struct OutputRow {
        #[tabled(rename = "RESOURCE")]
        name: String,
        #[tabled(rename = "NAME")]
        runtime_name: String,
        #[tabled(rename = "ID")]
        id: String,
    }

    let rows: Vec<OutputRow> = report
        .outputs
        .iter()
        .map(|(name, outputs)| OutputRow {
            name: name.clone(),
            runtime_name: outputs.name.clone(),
            id: match outputs.exit_code {
                Some(code) => format!("exited ({})", code),
                None => short_id(&outputs.id),
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}

fn plan_summary(plan: &Plan) -> String {
    format!(
        "{} to create, {} to replace, {} to delete, {} unchanged",
        plan.count(Action::Create),
        plan.count(Action::Replace),
        plan.count(Action::Delete),
        plan.count(Action::Same)
    )
}

/// Colorize action based on value
fn colorize_action(action: Action) -> String {
    let text = action.to_string();
    match action {
        Action::Create => format!("+ {}", text).green().to_string(),
        Action::Replace => format!("~ {}", text).yellow().to_string(),
        Action::Delete => format!("- {}", text).red().to_string(),
        Action::Same => format!("  {}", text).dimmed().to_string(),
    }
}
