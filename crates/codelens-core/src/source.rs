//! Where the pipeline reads file content from.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use codelens_indexer::store::normalize_path;
use codelens_indexer::IndexerError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File content plus its modification time, if known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub content: String,
    pub modified: Option<DateTime<Utc>>,
}

impl SourceFile {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            modified: None,
        }
    }
}

/// Reads the current content of a relative path.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn read(&self, path: &str) -> Result<SourceFile, IndexerError>;
}

/// Reads files under a root directory.
#[derive(Debug, Clone)]
pub struct FsContentSource {
    root: PathBuf,
}

impl FsContentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ContentSource for FsContentSource {
    async fn read(&self, path: &str) -> Result<SourceFile, IndexerError> {
        let full_path = self.root.join(path);
        let bytes = match tokio::fs::read(&full_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(IndexerError::NotFound(full_path));
            }
            Err(e) => return Err(e.into()),
        };
        let content = String::from_utf8(bytes).map_err(|e| IndexerError::Parse {
            path: full_path.clone(),
            message: format!("not valid UTF-8: {}", e),
        })?;
        let modified = tokio::fs::metadata(&full_path)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);

        Ok(SourceFile { content, modified })
    }
}

/// In-memory files, for tests and for editors feeding unsaved buffers.
#[derive(Debug, Default)]
pub struct MemoryContentSource {
    files: RwLock<HashMap<String, SourceFile>>,
}

impl MemoryContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, content: impl Into<String>) {
        self.files
            .write()
            .insert(normalize_path(path), SourceFile::new(content));
    }

    pub fn remove(&self, path: &str) -> bool {
        self.files.write().remove(&normalize_path(path)).is_some()
    }
}

#[async_trait]
impl ContentSource for MemoryContentSource {
    async fn read(&self, path: &str) -> Result<SourceFile, IndexerError> {
        self.files
            .read()
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| IndexerError::NotFound(PathBuf::from(path)))
    }
}
