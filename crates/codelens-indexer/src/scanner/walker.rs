//! File system walker with gitignore support.

use super::detect_language;
use crate::IndexerError;
use ignore::{WalkBuilder, WalkState};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing::debug;

/// A discovered source file.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Absolute path to the file
    pub path: PathBuf,
    /// Path relative to the walk root, `/`-separated
    pub relative_path: String,
    /// File size in bytes
    pub size: u64,
}

/// File system walker that respects .gitignore rules.
pub struct Walker {
    root: PathBuf,
    follow_symlinks: bool,
    max_file_size: u64,
    source_only: bool,
}

impl Walker {
    /// Create a new walker for the given root directory.
    pub fn new(root: &Path, follow_symlinks: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            follow_symlinks,
            max_file_size: 2 * 1024 * 1024,
            source_only: false,
        }
    }

    /// Skip files larger than `bytes`.
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Only yield files with a recognized language extension.
    pub fn source_only(mut self, enabled: bool) -> Self {
        self.source_only = enabled;
        self
    }

    /// Walk the directory tree and return all discovered files.
    pub fn walk(&self) -> Result<Vec<FileEntry>, IndexerError> {
        if !self.root.is_dir() {
            return Err(IndexerError::NotFound(self.root.clone()));
        }

        let (tx, rx) = mpsc::channel();
        let max_file_size = self.max_file_size;
        let source_only = self.source_only;

        let walker = WalkBuilder::new(&self.root)
            .follow_links(self.follow_symlinks)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .ignore(true)
            .parents(true)
            .build_parallel();

        walker.run(|| {
            let tx = tx.clone();
            let root = self.root.clone();
            Box::new(move |result| {
                match result {
                    Ok(entry) => {
                        if entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                            let path = entry.path();
                            if source_only && detect_language(path).is_none() {
                                return WalkState::Continue;
                            }
                            if let Ok(metadata) = entry.metadata() {
                                if metadata.len() <= max_file_size {
                                    let _ = tx.send(FileEntry {
                                        path: path.to_path_buf(),
                                        relative_path: relative_path(&root, path),
                                        size: metadata.len(),
                                    });
                                }
                            }
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "Walk error");
                    }
                }
                WalkState::Continue
            })
        });

        drop(tx);

        let mut entries: Vec<FileEntry> = rx.into_iter().collect();

        // Sort by path for deterministic ordering
        entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        Ok(entries)
    }
}

/// Express `path` relative to `root` with forward slashes.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
