//! Index snapshots for export and re-import.
//!
//! A snapshot records which paths were indexed and when. It is not a binary
//! dump of the postings: importing one drives a fresh re-index.

use crate::scanner::Language;
use crate::IndexerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Exported view of an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSnapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub documents: Vec<SnapshotEntry>,
}

/// One indexed path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub path: String,
    pub content_hash: String,
    pub language: Language,
    pub size: u64,
    pub indexed_at: DateTime<Utc>,
}

impl IndexSnapshot {
    pub fn new(documents: Vec<SnapshotEntry>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            exported_at: Utc::now(),
            documents,
        }
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.documents.iter().map(|d| d.path.as_str())
    }

    pub fn to_json(&self) -> Result<String, IndexerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, IndexerError> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.check_version()
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, IndexerError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, IndexerError> {
        let snapshot: Self = rmp_serde::from_slice(bytes)?;
        snapshot.check_version()
    }

    fn check_version(self) -> Result<Self, IndexerError> {
        if self.version > SNAPSHOT_VERSION {
            return Err(IndexerError::Serialization(format!(
                "unsupported snapshot version {}",
                self.version
            )));
        }
        Ok(self)
    }

    /// Write to disk. `.msgpack` files use MessagePack, anything else JSON.
    pub async fn save(&self, path: &Path) -> Result<(), IndexerError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = if is_msgpack(path) {
            self.to_msgpack()?
        } else {
            self.to_json()?.into_bytes()
        };

        // Write atomically via temp file
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, bytes).await?;
        tokio::fs::rename(&temp_path, path).await?;

        info!(path = ?path, documents = self.documents.len(), "Saved index snapshot");
        Ok(())
    }

    /// Read a snapshot written by [`IndexSnapshot::save`].
    pub async fn load(path: &Path) -> Result<Self, IndexerError> {
        if !path.exists() {
            return Err(IndexerError::NotFound(path.to_path_buf()));
        }
        let bytes = tokio::fs::read(path).await?;
        if is_msgpack(path) {
            Self::from_msgpack(&bytes)
        } else {
            let json = String::from_utf8(bytes)
                .map_err(|e| IndexerError::Serialization(e.to_string()))?;
            Self::from_json(&json)
        }
    }
}

fn is_msgpack(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "msgpack")
}
