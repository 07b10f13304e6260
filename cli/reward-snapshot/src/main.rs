#![forbid(unsafe_code)]
#![allow(unreachable_pub)]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod claim;
mod snapshot;
mod verify;

#[derive(Parser, Debug)]
#[command(name = "reward-snapshot")]
#[command(about = "Reward snapshot and Merkle distribution tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Snapshot(snapshot::Cli),
    Claim(claim::Cli),
    Verify(verify::Cli),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Snapshot(args) => snapshot::run(args).await?,
        Commands::Claim(args) => claim::run(args).await?,
        Commands::Verify(args) => verify::run(&args)?,
    }

    Ok(())
}
