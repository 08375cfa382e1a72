//! Effective configuration display.

use anyhow::Result;
use console::style;

use crate::state::AppState;

pub fn show_config(state: &AppState, json: bool) -> Result<()> {
    let config = &state.config;

    if json {
        let body = serde_json::json!({
            "dataDir": state.data_dir,
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!();
    println!(
        "  {:<22} {}",
        style("Data directory:").bold(),
        style(state.data_dir.display()).dim()
    );
    println!();

    println!("  {}", style("── Workflow engine ──").dim());
    println!("  {:<22} {}", style("Endpoint:").bold(), config.workflow.endpoint);
    println!(
        "  {:<22} {}",
        style("State machine:").bold(),
        config.workflow.state_machine_id
    );
    println!(
        "  {:<22} {}s",
        style("Request timeout:").bold(),
        config.workflow.request_timeout_secs
    );
    println!();

    println!("  {}", style("── Orchestrator ──").dim());
    println!(
        "  {:<22} {}",
        style("Endpoint:").bold(),
        config.orchestration.endpoint
    );
    println!(
        "  {:<22} {}s",
        style("Request timeout:").bold(),
        config.orchestration.request_timeout_secs
    );
    println!();

    println!("  {}", style("── Lifecycle ──").dim());
    println!(
        "  {:<22} {}s",
        style("Deployment timeout:").bold(),
        config.lifecycle.deployment_timeout_secs
    );
    println!(
        "  {:<22} {} (backoff {}ms)",
        style("Storage attempts:").bold(),
        config.lifecycle.storage_max_attempts,
        config.lifecycle.storage_backoff_ms
    );
    println!(
        "  {:<22} {}",
        style("Conflict retries:").bold(),
        config.lifecycle.max_conflict_retries
    );
    println!();

    Ok(())
}
