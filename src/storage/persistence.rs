//! Snapshot persistence for file-backed memory stores.

use super::catalog::Catalog;
use crate::core::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const SNAPSHOT_VERSION: u32 = 1;

// ============================================================================
// Store Snapshot
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub catalog: Catalog,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: DateTime<Utc>,
    pub table_count: usize,
    pub history_count: usize,
}

impl StoreSnapshot {
    pub fn new(catalog: Catalog) -> Self {
        let metadata = SnapshotMetadata {
            created_at: Utc::now(),
            table_count: catalog.table_count(),
            history_count: catalog.history().len(),
        };
        Self {
            version: SNAPSHOT_VERSION,
            catalog,
            metadata,
        }
    }
}

// ============================================================================
// Snapshot File
// ============================================================================

/// MessagePack snapshot of a whole catalog, rewritten after every commit.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn save(&self, catalog: &Catalog) -> StoreResult<()> {
        let snapshot = StoreSnapshot::new(catalog.clone());
        let serialized = rmp_serde::to_vec(&snapshot).map_err(|e| {
            StoreError::SerializationError(format!("Failed to serialize snapshot: {}", e))
        })?;
        atomic_write(&self.path, &serialized).await.map_err(|e| {
            StoreError::IoError(format!(
                "Failed to write snapshot '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        log::debug!(
            "Snapshot written to {} ({} tables, {} history records)",
            self.path.display(),
            snapshot.metadata.table_count,
            snapshot.metadata.history_count
        );
        Ok(())
    }

    /// `None` when no snapshot has been written yet.
    pub async fn load(&self) -> StoreResult<Option<Catalog>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(None);
        }
        let data = fs::read(&self.path).await?;
        let snapshot: StoreSnapshot = rmp_serde::from_slice(&data).map_err(|e| {
            StoreError::SerializationError(format!("Failed to deserialize snapshot: {}", e))
        })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::SerializationError(format!(
                "Unsupported snapshot version {} in '{}'",
                snapshot.version,
                self.path.display()
            )));
        }
        Ok(Some(snapshot.catalog))
    }
}

/// Writes through a temporary sibling file and renames it over `path`.
pub async fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await
}
