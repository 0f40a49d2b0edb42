mod server;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use solveit_core::{
    bootstrap::{init_database, init_storage, load_config, log_config_summary},
    logging,
};
use solveit_hub::{Relays, SessionConfig, TopicHub};

use server::SolveItServer;

/// SolveIt realtime hub and background worker
#[derive(Parser, Debug)]
#[command(name = "solveit", version, about, long_about = None)]
struct Cli {
    /// Path to a YAML or TOML config file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load and validate configuration
    let config = load_config(cli.config.as_deref())?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("SolveIt server starting...");
    log_config_summary(&config);

    // 3. Initialize database
    let pool = init_database(&config).await?;

    // 4. Initialize object storage
    let storage = init_storage(&config)?;

    // 5. Build the hub and its relays
    let hub = TopicHub::new(SessionConfig::from(&config.realtime));
    let relays = Relays::new(hub, config.realtime.queue_capacity);
    info!(
        queue_capacity = config.realtime.queue_capacity,
        "Realtime hub initialized"
    );

    SolveItServer::new(config, pool, storage, relays).run().await
}
