use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use reward_snapshot::merkle::verify_claim;
use reward_snapshot::{
    hex_encode, parse_address, write_file_atomic, ClaimExport, Distribution, DistributionStore,
    FileStore,
};

#[derive(Parser, Debug)]
#[command(name = "claim")]
#[command(about = "Export the claim and Merkle proof of one account", long_about = None)]
pub struct Cli {
    /// Directory holding published distributions
    #[arg(short, long, default_value = "distributions")]
    store_dir: PathBuf,

    /// Distribution id (defaults to the latest)
    #[arg(short, long)]
    id: Option<u64>,

    /// Claiming account
    #[arg(short, long)]
    account: String,

    /// Output JSON file
    #[arg(short, long)]
    output: PathBuf,
}

async fn load_distribution(store: &dyn DistributionStore, id: Option<u64>) -> Result<Distribution> {
    let id = match id {
        Some(id) => id,
        None => store
            .latest_id()
            .await
            .context("Failed to read store")?
            .context("Store holds no distributions")?,
    };
    store
        .get(id)
        .await
        .with_context(|| format!("Failed to load distribution {id}"))?
        .with_context(|| format!("Distribution {id} not found"))
}

/// Looks up `account` and checks its proof against the stored root.
pub fn export_claim(distribution: &Distribution, account: &str) -> Result<ClaimExport> {
    let account = parse_address(account).context("Invalid account address")?;
    let claim = distribution
        .claims
        .get(&account)
        .with_context(|| format!("{account} has no claim in distribution {}", distribution.id))?;

    if !verify_claim(&distribution.merkle_root, claim) {
        anyhow::bail!(
            "Stored proof for {} does not match root {}",
            account,
            hex_encode(distribution.merkle_root)
        );
    }

    Ok(ClaimExport {
        distribution_id: distribution.id,
        merkle_root: distribution.merkle_root,
        index: claim.index,
        account: claim.account,
        amount: claim.amount,
        proof: claim.proof.clone(),
    })
}

pub async fn run(cli: Cli) -> Result<()> {
    println!("Opening store at {:?}...", cli.store_dir);
    let store = FileStore::open(cli.store_dir.clone())
        .await
        .context("Failed to open store")?;

    let distribution = load_distribution(&store, cli.id).await?;
    println!("Loaded distribution {}", distribution.id);

    let export = export_claim(&distribution, &cli.account)?;

    println!("Writing claim JSON to {:?}...", cli.output);
    let json_output = serde_json::to_string_pretty(&export).context("Failed to serialize JSON")?;
    write_file_atomic(&cli.output, &json_output).context("Failed to write claim file")?;

    println!("\nClaim exported successfully!");
    println!("Account: {}", export.account);
    println!("Index: {}", export.index);
    println!("Amount: {}", export.amount);
    println!("Proof length: {} nodes", export.proof.len());

    Ok(())
}
