//! Feedlot Simulation CLI
//!
//! Runs the simulation for a bounded duration, optionally resuming from
//! the latest saved snapshot.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use feedlot::sim::{self, SimConfig};

#[derive(Parser)]
#[command(name = "feedlot", about = "Concurrent livestock feedlot simulation")]
struct Args {
    /// Simulation duration in seconds
    #[arg(long, default_value_t = 60)]
    duration: u64,

    /// Continue from the most recent saved snapshot
    #[arg(long)]
    resume: bool,

    /// Animals to seed when starting fresh
    #[arg(long, default_value_t = 5)]
    herd: usize,

    /// Directory for snapshots, backups and exports
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Feedlot Simulation Engine starting...");

    let config = SimConfig {
        duration: Duration::from_secs(args.duration),
        resume: args.resume,
        herd_size: args.herd,
        data_dir: args.data_dir,
    };
    sim::run(&config)?;

    Ok(())
}
