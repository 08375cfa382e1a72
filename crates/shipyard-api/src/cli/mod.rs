//! CLI command definitions for the `shipyard` binary.
//!
//! Uses clap derive macros for argument parsing. Every command accepts
//! `--json` for machine-readable output.

pub mod config;
pub mod deployment;
pub mod sweep;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use shipyard_core::lifecycle::sweep::SweepKind;
use shipyard_types::workflow::StepKind;

/// Track container-cluster deployments through their workflow lifecycle.
#[derive(Parser)]
#[command(name = "shipyard", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a deployment and start its workflow.
    Create {
        /// Account that owns the cluster.
        #[arg(long)]
        account: String,

        /// Target cluster.
        #[arg(long)]
        cluster: String,

        /// Environment name within the cluster.
        #[arg(long)]
        environment: String,

        /// Environment revision to roll out.
        #[arg(long)]
        revision: String,

        /// Number of tasks that must be running for the rollout to complete.
        #[arg(long, default_value_t = 1)]
        tasks: u32,
    },

    /// Show details of a deployment.
    Show {
        /// Deployment ID.
        id: String,
    },

    /// List deployments.
    #[command(alias = "ls")]
    List {
        /// Only deployments with this status (pending, in_progress, completed, failed).
        #[arg(long)]
        status: Option<String>,
    },

    /// Start the workflow of a pending deployment.
    Start {
        /// Deployment ID.
        id: String,
    },

    /// Classify a deployment's task state without changing it.
    Poll {
        /// Deployment ID.
        id: String,
    },

    /// Run one workflow step, as the workflow engine would.
    Step {
        /// Deployment ID.
        id: String,

        /// Step to run.
        #[arg(long, value_enum, default_value_t = StepArg::CheckTaskState)]
        step: StepArg,

        /// Step token to echo back.
        #[arg(long)]
        token: Option<String>,
    },

    /// Apply a transition signal directly.
    Signal {
        /// Deployment ID.
        id: String,

        /// Signal (start, taskHealthyButIncomplete, taskAllHealthyAndComplete, taskUnhealthyOrTimedOut).
        signal: String,
    },

    /// Re-drive deployments stuck in a non-terminal status.
    Sweep {
        #[arg(value_enum)]
        kind: SweepArg,
    },

    /// Delete every deployment (test and reset environments only).
    Purge {
        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration.
    Config,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StepArg {
    Start,
    CheckTaskState,
}

impl From<StepArg> for StepKind {
    fn from(arg: StepArg) -> Self {
        match arg {
            StepArg::Start => StepKind::Start,
            StepArg::CheckTaskState => StepKind::CheckTaskState,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SweepArg {
    Pending,
    InProgress,
}

impl From<SweepArg> for SweepKind {
    fn from(arg: SweepArg) -> Self {
        match arg {
            SweepArg::Pending => SweepKind::Pending,
            SweepArg::InProgress => SweepKind::InProgress,
        }
    }
}
