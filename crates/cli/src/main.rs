//! Incident Observer CLI
//!
//! A command-line tool for operating the observer engine: inspecting status,
//! reviewing detected anomalies, and approving or rejecting remediation
//! workflows.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{activity, status, workflows};

/// Incident Observer CLI
#[derive(Parser)]
#[command(name = "obsctl")]
#[command(author, version, about = "CLI for the Incident Observer", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via OBSERVER_API_URL env var)
    #[arg(long, env = "OBSERVER_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show engine status, recent anomalies and pending workflows
    Status,

    /// Start the detection loop
    Start,

    /// Stop the detection loop (in-flight work drains first)
    Stop,

    /// List recently detected anomalies
    Anomalies {
        /// Maximum entries to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Workflow queries
    #[command(subcommand)]
    Workflows(WorkflowCommands),

    /// Approve a pending workflow and run its remediation sequence
    Approve {
        /// Workflow ID to approve
        id: String,

        /// Reason for approval, retained for audit
        #[arg(long)]
        reason: String,
    },

    /// Reject a pending workflow; no remediation runs
    Reject {
        /// Workflow ID to reject
        id: String,

        /// Reason for rejection, retained for audit
        #[arg(long)]
        reason: String,
    },

    /// Show the merged activity feed
    Activity {
        /// Maximum entries to show
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum WorkflowCommands {
    /// List workflows awaiting approval
    Pending,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = client::ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Status => {
            status::show_status(&client, cli.format).await?;
        }
        Commands::Start => {
            status::start(&client).await?;
        }
        Commands::Stop => {
            status::stop(&client).await?;
        }
        Commands::Anomalies { limit } => {
            activity::list_anomalies(&client, limit, cli.format).await?;
        }
        Commands::Workflows(workflow_cmd) => match workflow_cmd {
            WorkflowCommands::Pending => {
                workflows::list_pending(&client, cli.format).await?;
            }
        },
        Commands::Approve { id, reason } => {
            workflows::approve(&client, &id, reason, cli.format).await?;
        }
        Commands::Reject { id, reason } => {
            workflows::reject(&client, &id, reason, cli.format).await?;
        }
        Commands::Activity { limit } => {
            activity::show_activity(&client, limit, cli.format).await?;
        }
    }

    Ok(())
}
