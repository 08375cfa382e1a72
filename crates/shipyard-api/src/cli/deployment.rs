//! Deployment management CLI commands.

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};

use shipyard_types::deployment::{CreateDeploymentRequest, Deployment, DeploymentId, DeploymentStatus};
use shipyard_types::environment::{EnvironmentId, EnvironmentRevision};
use shipyard_types::error::DeploymentError;
use shipyard_types::signal::TaskSignal;
use shipyard_types::workflow::{Rejection, StepInvocation, StepKind, StepOutcome};

use crate::state::AppState;

/// Start a cyan steady-tick spinner with `message`.
pub(crate) fn spinner(message: impl Into<String>) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message(message.into());
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    Ok(spinner)
}

fn parse_id(id: &str) -> Result<DeploymentId> {
    id.parse::<DeploymentId>().map_err(|e| anyhow::anyhow!(e))
}

/// Create a deployment and start its workflow.
pub async fn create_deployment(
    state: &AppState,
    account: String,
    cluster: String,
    environment: String,
    revision: String,
    tasks: u32,
    json: bool,
) -> Result<()> {
    let environment_id =
        EnvironmentId::new(account, cluster, environment).map_err(|e| anyhow::anyhow!(e))?;
    let request = CreateDeploymentRequest {
        environment: EnvironmentRevision::new(environment_id, revision),
        desired_task_count: Some(tasks),
    };

    let spinner = if json { None } else { Some(spinner("Creating deployment...")?) };
    let result = state.lifecycle.create_deployment(request).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let deployment = match result {
        Ok(deployment) => deployment,
        Err(e) => {
            if let DeploymentError::WorkflowStartFailure {
                deployment_id,
                message,
            } = &e
                && !json
            {
                eprintln!(
                    "  {} Deployment {} was recorded but its workflow did not start: {}",
                    style("!").yellow().bold(),
                    style(deployment_id).cyan(),
                    message
                );
                eprintln!(
                    "  {} It stays pending. Retry with {}",
                    style("i").blue().bold(),
                    style("shipyard sweep pending").yellow()
                );
            }
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&deployment)?);
        return Ok(());
    }

    println!();
    println!("  {} Deployment created", style("✓").green().bold());
    println!();
    println!("  {}  {}", style("ID:").bold(), style(&deployment.deployment_id).cyan());
    println!(
        "  {}  {}",
        style("Environment:").bold(),
        deployment.environment.environment_id
    );
    println!("  {}  {}", style("Status:").bold(), status_label(deployment.status));
    if let Some(name) = &deployment.execution_name {
        println!("  {}  {}", style("Execution:").bold(), style(name).dim());
    }
    println!();

    Ok(())
}

/// Show details of one deployment.
pub async fn show_deployment(state: &AppState, id: &str, json: bool) -> Result<()> {
    let id = parse_id(id)?;
    let deployment = state.lifecycle.get_deployment(&id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&deployment)?);
        return Ok(());
    }

    print_deployment(&deployment);
    Ok(())
}

fn print_deployment(deployment: &Deployment) {
    let environment = &deployment.environment;

    println!();
    println!(
        "  {} {}",
        style("Deployment").bold(),
        style(&deployment.deployment_id).cyan().bold()
    );
    println!();

    println!("  {}", style("── Target ──").dim());
    println!(
        "  {:<14} {}",
        style("Account:").bold(),
        environment.environment_id.account_id
    );
    println!(
        "  {:<14} {}",
        style("Cluster:").bold(),
        environment.environment_id.cluster
    );
    println!(
        "  {:<14} {}",
        style("Environment:").bold(),
        environment.environment_id.environment_name
    );
    println!("  {:<14} {}", style("Revision:").bold(), environment.revision_id);
    println!(
        "  {:<14} {}",
        style("Tasks:").bold(),
        deployment.desired_task_count
    );
    println!();

    println!("  {}", style("── Lifecycle ──").dim());
    println!(
        "  {:<14} {}",
        style("Status:").bold(),
        status_label(deployment.status)
    );
    println!(
        "  {:<14} {}",
        style("Execution:").bold(),
        deployment
            .execution_name
            .as_deref()
            .map(|n| style(n.to_string()).dim().to_string())
            .unwrap_or_else(|| style("not started").dim().to_string())
    );
    if let Some(reason) = &deployment.failure_reason {
        println!("  {:<14} {}", style("Failure:").bold(), style(reason).red());
    }
    println!(
        "  {:<14} {}",
        style("Version:").bold(),
        deployment.record_version
    );
    println!();

    println!("  {}", style("── Timestamps ──").dim());
    println!(
        "  {:<14} {}",
        style("Created:").bold(),
        deployment.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "  {:<14} {}",
        style("Updated:").bold(),
        deployment.last_updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();
}

/// List deployments, optionally filtered by status.
pub async fn list_deployments(state: &AppState, status: Option<String>, json: bool) -> Result<()> {
    let status = status
        .map(|s| s.parse::<DeploymentStatus>())
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;

    let mut deployments = match status {
        Some(status) => state.lifecycle.list_by_status(status).await?,
        None => state.lifecycle.list_all().await?,
    };
    deployments.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    if json {
        println!("{}", serde_json::to_string_pretty(&deployments)?);
        return Ok(());
    }

    if deployments.is_empty() {
        println!();
        println!(
            "  {} No deployments yet. Create one with {}",
            style("i").blue().bold(),
            style("shipyard create").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(Color::White),
            Cell::new("Environment").fg(Color::White),
            Cell::new("Revision").fg(Color::White),
            Cell::new("Status").fg(Color::White),
            Cell::new("Tasks").fg(Color::White),
            Cell::new("Updated").fg(Color::White),
        ]);

    for deployment in &deployments {
        table.add_row(vec![
            Cell::new(&deployment.deployment_id).fg(Color::Cyan),
            Cell::new(&deployment.environment.environment_id),
            Cell::new(&deployment.environment.revision_id),
            status_cell(deployment.status),
            Cell::new(deployment.desired_task_count),
            Cell::new(deployment.last_updated_at.format("%Y-%m-%d %H:%M").to_string())
                .fg(Color::DarkGrey),
        ]);
    }

    println!("{table}");
    println!(
        "  {} deployment{}",
        style(deployments.len()).bold(),
        if deployments.len() == 1 { "" } else { "s" }
    );
    Ok(())
}

fn status_cell(status: DeploymentStatus) -> Cell {
    match status {
        DeploymentStatus::Pending => Cell::new("○ pending").fg(Color::Yellow),
        DeploymentStatus::InProgress => Cell::new("◐ in_progress").fg(Color::Blue),
        DeploymentStatus::Completed => Cell::new("● completed").fg(Color::Green),
        DeploymentStatus::Failed => Cell::new("✗ failed").fg(Color::Red),
    }
}

fn status_label(status: DeploymentStatus) -> String {
    let label = status.to_string();
    match status {
        DeploymentStatus::Pending => style(label).yellow().to_string(),
        DeploymentStatus::InProgress => style(label).blue().to_string(),
        DeploymentStatus::Completed => style(label).green().to_string(),
        DeploymentStatus::Failed => style(label).red().to_string(),
    }
}

/// Start (or re-start) the workflow of a pending deployment.
pub async fn start_deployment(state: &AppState, id: &str, json: bool) -> Result<()> {
    let id = parse_id(id)?;

    let spinner = if json { None } else { Some(spinner("Starting workflow...")?) };
    let result = state.lifecycle.start_workflow(&id).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let deployment = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&deployment)?);
        return Ok(());
    }

    println!(
        "  {} {} is {}",
        style("✓").green().bold(),
        style(&deployment.deployment_id).cyan(),
        status_label(deployment.status)
    );
    Ok(())
}

/// Poll and classify task state without writing anything.
pub async fn poll_deployment(state: &AppState, id: &str, json: bool) -> Result<()> {
    let id = parse_id(id)?;

    let spinner = if json { None } else { Some(spinner("Describing tasks...")?) };
    let result = state.lifecycle.poll_task_state(&id).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        signal_marker(report.signal),
        style(report.signal).bold()
    );
    println!("  {}", report.summary);
    println!();
    println!(
        "  {} running {}  pending {}  stopped {}  unhealthy {}  failures {}",
        style(format!("{} desired:", report.desired)).dim(),
        report.running,
        report.pending,
        report.stopped,
        report.unhealthy,
        report.failures
    );
    println!();
    Ok(())
}

fn signal_marker(signal: TaskSignal) -> console::StyledObject<&'static str> {
    match signal {
        TaskSignal::TaskAllHealthyAndComplete => style("✓").green().bold(),
        TaskSignal::TaskUnhealthyOrTimedOut => style("✗").red().bold(),
        TaskSignal::Start | TaskSignal::TaskHealthyButIncomplete => style("…").yellow().bold(),
    }
}

/// Run one workflow step against a deployment.
pub async fn run_step(
    state: &AppState,
    id: &str,
    step: StepKind,
    token: Option<String>,
    json: bool,
) -> Result<()> {
    let invocation = StepInvocation {
        deployment_id: parse_id(id)?,
        token,
        step,
    };
    let outcome = state.lifecycle.handle_step(invocation).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    print_step_outcome(&outcome);
    Ok(())
}

fn print_step_outcome(outcome: &StepOutcome) {
    let marker = if outcome.changed {
        style("✓").green().bold()
    } else {
        style("·").dim()
    };
    println!(
        "  {} {} {}",
        marker,
        style(&outcome.deployment_id).cyan(),
        status_label(outcome.status)
    );
    println!("    {}", outcome.summary);
    match outcome.rejection {
        Some(Rejection::NotYet) => println!("    {}", style("not ready yet; poll again").dim()),
        Some(Rejection::Terminal { .. }) => {
            println!("    {}", style("deployment finished; end the execution").dim())
        }
        Some(Rejection::Illegal) | None => {}
    }
    if outcome.is_done() {
        println!("    {}", style("done").green());
    }
}

/// Apply a signal to a deployment directly.
pub async fn signal_deployment(state: &AppState, id: &str, signal: &str, json: bool) -> Result<()> {
    let id = parse_id(id)?;
    let signal = signal
        .parse::<TaskSignal>()
        .map_err(|e| anyhow::anyhow!(e))?;

    let outcome = state.lifecycle.apply_signal(&id, signal).await?;

    if json {
        let body = serde_json::json!({
            "deployment": outcome.deployment,
            "signal": signal,
            "changed": outcome.changed,
            "rejection": outcome.rejection(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let deployment = &outcome.deployment;
    match outcome.rejection() {
        None if outcome.changed => println!(
            "  {} {} is now {} (version {})",
            style("✓").green().bold(),
            style(&deployment.deployment_id).cyan(),
            status_label(deployment.status),
            deployment.record_version
        ),
        None => println!(
            "  {} {} stays {}",
            style("·").dim(),
            style(&deployment.deployment_id).cyan(),
            status_label(deployment.status)
        ),
        Some(rejection) => println!(
            "  {} {} rejected for {}: {}",
            style("!").yellow().bold(),
            style(signal).bold(),
            style(&deployment.deployment_id).cyan(),
            match rejection {
                Rejection::NotYet => "condition not met yet".to_string(),
                Rejection::Terminal { status } => format!("deployment already {status}"),
                Rejection::Illegal => "illegal transition".to_string(),
            }
        ),
    }
    Ok(())
}

/// Delete every deployment after confirmation.
pub async fn purge_deployments(state: &AppState, force: bool, json: bool) -> Result<()> {
    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete {} deployments in {}? This cannot be undone",
                style("ALL").red().bold(),
                state.data_dir.display()
            ))
            .default(false)
            .interact()
            .context("confirmation prompt failed")?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let spinner = if json { None } else { Some(spinner("Deleting deployments...")?) };
    let result = state.lifecycle.delete_all().await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let deleted = result?;

    if json {
        println!("{}", serde_json::json!({ "deleted": deleted }));
    } else {
        println!(
            "  {} Deleted {} deployment{}",
            style("✓").red().bold(),
            style(deleted).bold(),
            if deleted == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_trims_and_rejects_empty() {
        assert_eq!(parse_id("  d-1 ").unwrap().as_str(), "d-1");
        assert!(parse_id("   ").is_err());
    }

    #[test]
    fn test_status_label_keeps_status_text() {
        for status in DeploymentStatus::ALL {
            let label = console::strip_ansi_codes(&status_label(status)).to_string();
            assert_eq!(label, status.to_string());
        }
    }
}
