//! Shipyard CLI entry point.
//!
//! Binary name: `shipyard`
//!
//! Parses CLI arguments, initializes tracing, the database, and the
//! collaborator clients, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,shipyard=debug",
        _ => "trace",
    };
    shipyard_observe::tracing_setup::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "shipyard", &mut std::io::stdout());
        return Ok(());
    }

    let result = run(cli).await;
    shipyard_observe::tracing_setup::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init().await?;
    let json = cli.json;

    match cli.command {
        Commands::Create {
            account,
            cluster,
            environment,
            revision,
            tasks,
        } => {
            cli::deployment::create_deployment(
                &state,
                account,
                cluster,
                environment,
                revision,
                tasks,
                json,
            )
            .await?;
        }

        Commands::Show { id } => {
            cli::deployment::show_deployment(&state, &id, json).await?;
        }

        Commands::List { status } => {
            cli::deployment::list_deployments(&state, status, json).await?;
        }

        Commands::Start { id } => {
            cli::deployment::start_deployment(&state, &id, json).await?;
        }

        Commands::Poll { id } => {
            cli::deployment::poll_deployment(&state, &id, json).await?;
        }

        Commands::Step { id, step, token } => {
            cli::deployment::run_step(&state, &id, step.into(), token, json).await?;
        }

        Commands::Signal { id, signal } => {
            cli::deployment::signal_deployment(&state, &id, &signal, json).await?;
        }

        Commands::Sweep { kind } => {
            cli::sweep::run_sweep(&state, kind.into(), json).await?;
        }

        Commands::Purge { force } => {
            cli::deployment::purge_deployments(&state, force, json).await?;
        }

        Commands::Config => {
            cli::config::show_config(&state, json)?;
        }

        // Handled in main before state init.
        Commands::Completions { .. } => {}
    }

    Ok(())
}
