use std::fs::File;
use std::io::Write;
use std::path::Path;

use alloy::primitives::Keccak256;
use anyhow::Context;

use crate::types::{Address, Hash};

/// Parses an account address from a hex string supplied by a user.
///
/// # Arguments
/// * `addr_str` - The address string, with or without "0x" prefix, any case
///
/// # Errors
/// Returns an error if the address is not 40 hex characters, contains invalid
/// hex, or is the zero address
pub fn parse_address(addr_str: &str) -> anyhow::Result<Address> {
    let trimmed = addr_str.trim();
    let address: Address = trimmed
        .parse()
        .with_context(|| format!("Invalid address '{trimmed}'"))?;
    if address.is_zero() {
        anyhow::bail!("Zero address not allowed");
    }
    Ok(address)
}

/// Parses a 32-byte hash (Merkle root or proof node) from hex.
pub fn parse_hash(hash_str: &str) -> anyhow::Result<Hash> {
    let trimmed = hash_str.trim();
    let cleaned = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if cleaned.len() != 64 {
        anyhow::bail!(
            "Invalid hash length: expected 64 hex chars, got {}",
            cleaned.len()
        );
    }
    cleaned
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid hex encoding: {}", e))
}

/// Computes a Keccak256 hash of two 32-byte values concatenated.
pub fn keccak256_hash(left: Hash, right: Hash) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize()
}

/// Lowercase hex with a `0x` prefix.
pub fn hex_encode<T: AsRef<[u8]>>(bytes: T) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Writes `contents` to `path` through a temp file and a rename, so readers
/// never observe a half-written file.
pub fn write_file_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path).context("Failed to create temp file")?;
    file.write_all(contents.as_bytes())
        .context("Failed to write to temp file")?;
    file.flush().context("Failed to flush temp file")?;
    std::fs::rename(&temp_path, path).context("Failed to move temp file to output")?;
    Ok(())
}
