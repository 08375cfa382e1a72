//! Reconciliation sweep command.

use anyhow::{bail, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use shipyard_core::lifecycle::sweep::{SweepKind, SweepReport};

use crate::cli::deployment::spinner;
use crate::state::AppState;

/// Run one sweep and print its report. Fails when any deployment failed.
pub async fn run_sweep(state: &AppState, kind: SweepKind, json: bool) -> Result<()> {
    let spinner = if json {
        None
    } else {
        Some(spinner(format!("Sweeping {} deployments...", kind.status()))?)
    };
    let result = state.lifecycle.sweep(kind).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.is_clean() {
        bail!(
            "{} of {} deployments could not be swept",
            report.failures.len(),
            report.examined
        );
    }
    Ok(())
}

fn print_report(report: &SweepReport) {
    println!();
    println!(
        "  {} Swept {} {} deployment{}",
        if report.is_clean() {
            style("✓").green().bold()
        } else {
            style("!").yellow().bold()
        },
        style(report.examined).bold(),
        report.kind.status(),
        if report.examined == 1 { "" } else { "s" }
    );
    println!(
        "    {} acted  {} unchanged  {} stale  {} failed",
        style(report.acted).green(),
        report.unchanged,
        style(report.stale).dim(),
        style(report.failures.len()).red()
    );

    if !report.failures.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Deployment").fg(Color::White),
                Cell::new("Error").fg(Color::White),
            ]);
        for failure in &report.failures {
            table.add_row(vec![
                Cell::new(&failure.deployment_id).fg(Color::Cyan),
                Cell::new(&failure.error).fg(Color::Red),
            ]);
        }
        println!();
        println!("{table}");
    }
    println!();
}
