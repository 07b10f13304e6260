//! Distribution persistence.
//!
//! Stores are append-only: an id is written once and never replaced.

use std::collections::BTreeMap;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::Builder;
use tokio::fs;
use tokio::task;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::types::Distribution;

#[async_trait]
pub trait DistributionStore: Send + Sync {
    /// Highest stored id, `None` if the store is empty.
    async fn latest_id(&self) -> Result<Option<u64>, StoreError>;

    /// Stores a distribution. Fails with `DuplicateId` if its id exists.
    async fn insert(&self, distribution: &Distribution) -> Result<(), StoreError>;

    async fn get(&self, id: u64) -> Result<Option<Distribution>, StoreError>;

    /// Id the next distribution gets; the first one is 1.
    async fn next_id(&self) -> Result<u64, StoreError> {
        Ok(self.latest_id().await?.map_or(1, |id| id + 1))
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    distributions: RwLock<BTreeMap<u64, Distribution>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DistributionStore for MemoryStore {
    async fn latest_id(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.distributions.read().await.keys().next_back().copied())
    }

    async fn insert(&self, distribution: &Distribution) -> Result<(), StoreError> {
        let mut distributions = self.distributions.write().await;
        if distributions.contains_key(&distribution.id) {
            return Err(StoreError::DuplicateId(distribution.id));
        }
        distributions.insert(distribution.id, distribution.clone());
        Ok(())
    }

    async fn get(&self, id: u64) -> Result<Option<Distribution>, StoreError> {
        Ok(self.distributions.read().await.get(&id).cloned())
    }
}

const FILE_PREFIX: &str = "distribution-";
const FILE_SUFFIX: &str = ".json";

/// One pretty-printed JSON file per distribution, `distribution-<id>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) a store directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{id}{FILE_SUFFIX}"))
    }
}

/// Writes `json` to a uniquely named temp file in `dir` and moves it to
/// `path` only if nothing is there yet.
fn publish(dir: &Path, path: &Path, json: &[u8]) -> io::Result<()> {
    let mut temp = Builder::new()
        .prefix(&format!(".{FILE_PREFIX}"))
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(json)?;
    temp.as_file().sync_all()?;
    // On failure the temp file is dropped and removed.
    temp.persist_noclobber(path).map_err(|e| e.error)?;
    Ok(())
}

fn parse_file_id(name: &str) -> Option<u64> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse()
        .ok()
}

#[async_trait]
impl DistributionStore for FileStore {
    async fn latest_id(&self) -> Result<Option<u64>, StoreError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut latest = None;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(parse_file_id) {
                latest = latest.max(Some(id));
            }
        }
        Ok(latest)
    }

    async fn insert(&self, distribution: &Distribution) -> Result<(), StoreError> {
        let id = distribution.id;
        let path = self.path_for(id);
        let json = serde_json::to_vec_pretty(distribution)?;

        let dir = self.dir.clone();
        let target = path.clone();
        let published = task::spawn_blocking(move || publish(&dir, &target, &json))
            .await
            .map_err(io::Error::other)?;
        match published {
            Ok(()) => {
                info!(id, path = %path.display(), "distribution stored");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StoreError::DuplicateId(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: u64) -> Result<Option<Distribution>, StoreError> {
        let path = self.path_for(id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let distribution: Distribution = serde_json::from_slice(&bytes)?;
        if distribution.id != id {
            return Err(StoreError::Corrupt(format!(
                "{} holds distribution {}",
                path.display(),
                distribution.id
            )));
        }
        debug!(id, "distribution loaded");
        Ok(Some(distribution))
    }
}
