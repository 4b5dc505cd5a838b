//! berth CLI
//!
//! Command-line interface for interacting with the berth daemon.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

/// berth - priority scheduler for capacity-bounded clusters
#[derive(Parser, Debug)]
#[command(name = "berth")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Daemon API address
    #[arg(long, default_value = "http://localhost:8000", env = "BERTH_API", global = true)]
    api: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage clusters
    Cluster {
        #[command(subcommand)]
        action: ClusterCommands,
    },

    /// Create a deployment and submit it for scheduling
    Deploy {
        /// Target cluster ID
        #[arg(long)]
        cluster: Uuid,

        /// Container image (e.g., nginx:latest)
        image: String,

        /// RAM to reserve
        #[arg(long)]
        ram: u64,

        /// CPUs to reserve
        #[arg(long)]
        cpu: u64,

        /// GPUs to reserve
        #[arg(long, default_value_t = 0)]
        gpu: u64,

        /// Priority, lower is scheduled first
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        priority: i64,
    },

    /// Get deployment status
    Status {
        /// Deployment ID (optional, shows all if not provided)
        deployment: Option<Uuid>,
    },

    /// Delete a deployment
    Delete {
        /// Deployment ID
        deployment: Uuid,
    },

    /// Re-submit a deployment with a new priority
    Submit {
        /// Deployment ID
        deployment: Uuid,

        /// Priority, lower is scheduled first
        #[arg(allow_hyphen_values = true)]
        priority: i64,
    },

    /// Show the pending queue
    Queue,

    /// Run a scheduling pass now
    Schedule,

    /// Show system status
    Top,
}

#[derive(Subcommand, Debug)]
enum ClusterCommands {
    /// Register a cluster
    Create {
        /// Cluster name
        name: String,

        /// Total RAM
        #[arg(long)]
        ram: u64,

        /// Total CPUs
        #[arg(long)]
        cpu: u64,

        /// Total GPUs
        #[arg(long, default_value_t = 0)]
        gpu: u64,
    },

    /// List clusters
    List,

    /// Show one cluster and its deployments
    Get {
        /// Cluster ID
        cluster: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let client = commands::ApiClient::new(&cli.api);

    match cli.command {
        Commands::Cluster { action } => match action {
            ClusterCommands::Create { name, ram, cpu, gpu } => {
                commands::cluster_create(&client, name, ram, cpu, gpu).await?;
            }
            ClusterCommands::List => {
                commands::cluster_list(&client).await?;
            }
            ClusterCommands::Get { cluster } => {
                commands::cluster_get(&client, cluster).await?;
            }
        },
        Commands::Deploy {
            cluster,
            image,
            ram,
            cpu,
            gpu,
            priority,
        } => {
            commands::deploy(&client, cluster, image, ram, cpu, gpu, priority).await?;
        }
        Commands::Status { deployment } => {
            commands::status(&client, deployment).await?;
        }
        Commands::Delete { deployment } => {
            commands::delete(&client, deployment).await?;
        }
        Commands::Submit {
            deployment,
            priority,
        } => {
            commands::submit(&client, deployment, priority).await?;
        }
        Commands::Queue => {
            commands::queue(&client).await?;
        }
        Commands::Schedule => {
            commands::schedule(&client).await?;
        }
        Commands::Top => {
            commands::top(&client).await?;
        }
    }

    Ok(())
}
