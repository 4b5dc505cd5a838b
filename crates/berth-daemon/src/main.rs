//! berth daemon
//!
//! Runs the scheduler on a timer and serves the REST API.

use anyhow::Context;
use berth_api::create_router;
use berth_core::{DaemonConfig, LoggingConfig};
use berth_scheduler::{Scheduler, TimerTrigger};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// berth daemon - priority scheduler for capacity-bounded clusters
#[derive(Parser, Debug)]
#[command(name = "berthd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind the API server
    #[arg(long)]
    address: Option<String>,

    /// Port for the REST API server
    #[arg(long)]
    port: Option<u16>,

    /// Seconds between timed scheduling passes
    #[arg(long, env = "SCHEDULER_INTERVAL")]
    interval: Option<u64>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Load the config file, if any, and apply command-line overrides
    fn into_config(self) -> anyhow::Result<DaemonConfig> {
        let mut config = match &self.config {
            Some(path) => DaemonConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => DaemonConfig::default(),
        };

        if let Some(address) = self.address {
            config.api.address = address;
        }
        if let Some(port) = self.port {
            config.api.port = port;
        }
        if let Some(interval) = self.interval {
            config.scheduler.interval_secs = interval;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("invalid log level")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = if config.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("failed to set subscriber: {}", e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config()?;
    init_logging(&config.logging)?;

    info!("Starting berth daemon v{}", env!("CARGO_PKG_VERSION"));

    let scheduler =
        Arc::new(Scheduler::in_memory().with_pass_budget(config.scheduler.pass_budget()));

    let timer = TimerTrigger::start(
        scheduler.clone(),
        config.scheduler.interval(),
        config.scheduler.run_on_startup,
    );

    let router = create_router(scheduler, &config.api);

    let addr: SocketAddr = format!("{}:{}", config.api.address, config.api.port)
        .parse()
        .context("invalid listen address")?;

    info!("API server listening on {}", addr);
    info!(
        interval_secs = config.scheduler.interval_secs,
        "Scheduling passes run on a timer"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Shutdown signal received");
        timer.stop().await;
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")?;

    info!("berth daemon stopped");
    Ok(())
}
