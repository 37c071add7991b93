use quick_xml::{de::from_str, se::to_string};
use serde::{Deserialize, Serialize};
use std::{io, path::Path, path::PathBuf};
use tokio::fs;
use tracing::{debug, info};

use super::CacheEntry;

/// XML representation of a cache snapshot
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename = "cache")]
struct CacheFile {
    #[serde(rename = "entry", default)]
    entries: Vec<CacheEntry>,
}

/// Error type for cache persistence
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("XML serialization error: {0}")]
    SerializeError(#[from] quick_xml::errors::serialize::SeError),

    #[error("XML deserialization error: {0}")]
    DeserializeError(#[from] quick_xml::errors::serialize::DeError),
}

type Result<T> = std::result::Result<T, StorageError>;

/// Snapshot location used when none is configured
pub const DEFAULT_CACHE_PATH: &str = ".tasklens/cache.xml";

/// Durable snapshot of the content cache, stored as a single XML file
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_PATH)
    }
}

impl CacheStore {
    /// Create a store backed by the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_directories(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Write the entries, replacing any previous snapshot
    pub async fn save(&self, entries: &[CacheEntry]) -> Result<()> {
        self.ensure_directories().await?;
        let file = CacheFile {
            entries: entries.to_vec(),
        };
        let xml = to_string(&file)?;
        fs::write(
            &self.path,
            format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml),
        )
        .await?;
        info!("Saved {} cache entries to {}", entries.len(), self.path.display());
        Ok(())
    }

    /// Read the snapshot. A missing file is an empty cache, not an error.
    pub async fn load(&self) -> Result<Vec<CacheEntry>> {
        if !fs::try_exists(&self.path).await? {
            debug!("No cache snapshot at {}", self.path.display());
            return Ok(Vec::new());
        }
        let xml = fs::read_to_string(&self.path).await?;
        let file: CacheFile = from_str(&xml)?;
        debug!(
            "Loaded {} cache entries from {}",
            file.entries.len(),
            self.path.display()
        );
        Ok(file.entries)
    }

    /// Delete the snapshot file if it exists
    pub async fn remove(&self) -> Result<()> {
        if fs::try_exists(&self.path).await? {
            fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}
