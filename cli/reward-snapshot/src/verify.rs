use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use reward_snapshot::merkle::{leaf_hash, verify_proof};
use reward_snapshot::{hex_encode, parse_hash, ClaimExport, Hash};

#[derive(Parser, Debug)]
#[command(name = "verify")]
#[command(about = "Verify an exported claim against a Merkle root", long_about = None)]
pub struct Cli {
    /// Claim JSON written by `claim`
    #[arg(short, long)]
    input: PathBuf,

    /// Root to check against (defaults to the root inside the claim file)
    #[arg(short, long)]
    root: Option<String>,
}

/// Recomputes the leaf and folds it with the proof.
pub fn check(export: &ClaimExport, root: &Hash) -> bool {
    let leaf = leaf_hash(export.index, export.account, export.amount);
    verify_proof(root, leaf, &export.proof)
}

pub fn run(cli: &Cli) -> Result<()> {
    println!("Reading claim from {:?}...", cli.input);
    let content = fs::read_to_string(&cli.input).context("Failed to read claim file")?;
    let export: ClaimExport = serde_json::from_str(&content).context("Failed to parse claim JSON")?;

    let root = match &cli.root {
        Some(root) => parse_hash(root).context("Invalid Merkle root")?,
        None => export.merkle_root,
    };

    if !check(&export, &root) {
        anyhow::bail!(
            "Proof for {} (index {}) does not verify against {}",
            export.account,
            export.index,
            hex_encode(root)
        );
    }

    println!("Proof is valid");
    println!("Distribution: {}", export.distribution_id);
    println!("Root: {}", hex_encode(root));
    println!("Account: {}", export.account);
    println!("Amount: {}", export.amount);
    Ok(())
}
