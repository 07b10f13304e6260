use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use reward_snapshot::chain::{HttpChainClient, HttpChainConfig};
use reward_snapshot::positions::{PositionIndex, SubgraphPositionIndex};
use reward_snapshot::{
    hex_encode, parse_address, write_file_atomic, FileStore, Overrides, Pipeline, SnapshotConfig,
};

#[derive(Parser, Debug)]
#[command(name = "snapshot")]
#[command(about = "Take a reward snapshot and publish its Merkle distribution", long_about = None)]
pub struct Cli {
    /// Node JSON-RPC endpoint
    #[arg(long, env = "RPC_URL")]
    rpc_url: String,

    /// Etherscan-compatible API base used for transfer logs
    #[arg(long, default_value = "https://api.etherscan.io/v2/api")]
    logs_url: String,

    /// API key for the log API
    #[arg(long, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Chain id passed to the log API
    #[arg(long, default_value_t = 1)]
    chain_id: u64,

    /// Token whose holders are rewarded
    #[arg(short, long)]
    token: String,

    /// Distribution contract address
    #[arg(short, long)]
    distribution_contract: String,

    /// Snapshot block (defaults to the chain head)
    #[arg(short, long)]
    block: Option<u64>,

    /// Token decimals (read from the token when omitted)
    #[arg(long)]
    decimals: Option<u8>,

    /// JSON file with `approved_pools` and `excluded` address lists
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// Subgraph endpoint for concentrated-liquidity positions
    #[arg(long)]
    subgraph_url: Option<String>,

    /// Directory holding published distributions
    #[arg(long, default_value = "distributions")]
    store_dir: PathBuf,

    /// Also write the distribution JSON here
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Compute the snapshot without publishing it
    #[arg(long)]
    dry_run: bool,

    /// Transfer events requested per token
    #[arg(long)]
    page_size: Option<usize>,

    /// Network calls in flight at once
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Addresses per fan-out batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Pause between batches, in milliseconds
    #[arg(long)]
    batch_delay_ms: Option<u64>,

    /// Attempts per retried call
    #[arg(long)]
    retries: Option<u32>,

    /// Per-request timeout, in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

/// Builds the run configuration, falling back to defaults for every knob
/// not given on the command line.
pub fn config_from_cli(cli: &Cli) -> Result<SnapshotConfig> {
    let token = parse_address(&cli.token).context("Invalid token address")?;
    let distributor =
        parse_address(&cli.distribution_contract).context("Invalid distribution contract address")?;

    let mut config = SnapshotConfig::new(token, distributor);
    config.snapshot_block = cli.block;
    config.token_decimals = cli.decimals;
    if let Some(page_size) = cli.page_size {
        config.page_size = page_size;
    }
    if let Some(max_concurrency) = cli.max_concurrency {
        config.max_concurrency = max_concurrency;
    }
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(ms) = cli.batch_delay_ms {
        config.batch_delay = Duration::from_millis(ms);
    }
    if let Some(attempts) = cli.retries {
        config.retry.attempts = attempts.max(1);
    }
    if let Some(secs) = cli.timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }
    if let Some(path) = &cli.overrides {
        config.overrides = Overrides::from_file(path)?;
    }

    Ok(config)
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = config_from_cli(&cli)?;

    let chain = HttpChainClient::new(HttpChainConfig {
        rpc_url: cli.rpc_url.clone(),
        logs_url: cli.logs_url.clone(),
        api_key: cli.api_key.clone(),
        chain_id: cli.chain_id,
        timeout: config.request_timeout,
    })
    .context("Failed to build HTTP client")?;

    let positions: Option<Arc<dyn PositionIndex>> = match &cli.subgraph_url {
        Some(url) => Some(Arc::new(
            SubgraphPositionIndex::new(url.clone(), config.request_timeout)
                .context("Failed to build subgraph client")?,
        )),
        None => None,
    };

    let store = FileStore::open(cli.store_dir.clone())
        .await
        .with_context(|| format!("Failed to open store at {:?}", cli.store_dir))?;

    let pipeline = Pipeline::new(config, Arc::new(chain), positions, Arc::new(store));

    let json = if cli.dry_run {
        let snapshot = pipeline.compute().await.context("Snapshot failed")?;
        info!(
            root = %hex_encode(snapshot.merkle_root),
            claims = snapshot.claims.len(),
            "dry run, nothing published"
        );
        serde_json::to_string_pretty(&snapshot).context("Failed to serialize JSON")?
    } else {
        let distribution = pipeline.run().await.context("Snapshot failed")?;
        println!("Distribution {} published", distribution.id);
        println!("Merkle root: {}", hex_encode(distribution.merkle_root));
        println!("Claims: {}", distribution.claims.len());
        println!("Total rewards: {}", distribution.total_rewards);
        serde_json::to_string_pretty(&distribution).context("Failed to serialize JSON")?
    };

    if let Some(path) = &cli.output {
        write_file_atomic(path, &json).context("Failed to write output file")?;
        println!("Wrote {:?}", path);
    }

    Ok(())
}
