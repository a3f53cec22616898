//! Change notifications consumed by the indexing pipeline.

use crate::analysis::FileAnalysis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeEventKind {
    FileCreated,
    FileModified,
    FileDeleted,
    DirectoryCreated,
    DirectoryDeleted,
    /// An external producer finished analyzing a file
    AnalysisComplete,
    /// The notification source failed; carries a message only
    Error,
}

impl ChangeEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeEventKind::FileCreated => "file_created",
            ChangeEventKind::FileModified => "file_modified",
            ChangeEventKind::FileDeleted => "file_deleted",
            ChangeEventKind::DirectoryCreated => "directory_created",
            ChangeEventKind::DirectoryDeleted => "directory_deleted",
            ChangeEventKind::AnalysisComplete => "analysis_complete",
            ChangeEventKind::Error => "error",
        }
    }

    /// Creation or modification of file content.
    pub fn is_content_change(&self) -> bool {
        matches!(self, ChangeEventKind::FileCreated | ChangeEventKind::FileModified)
    }

    /// Events that put a path on the indexing queue.
    pub fn enqueues(&self) -> bool {
        self.is_content_change() || *self == ChangeEventKind::AnalysisComplete
    }
}

/// One change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub kind: ChangeEventKind,
    pub absolute_path: PathBuf,
    /// Path relative to the watched root, forward slashes
    pub relative_path: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub size: Option<u64>,
    /// Precomputed analysis; the pipeline skips its own producer when set
    #[serde(default)]
    pub analysis: Option<FileAnalysis>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ChangeEvent {
    pub fn new(
        kind: ChangeEventKind,
        absolute_path: impl Into<PathBuf>,
        relative_path: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            absolute_path: absolute_path.into(),
            relative_path: relative_path.into(),
            timestamp: Utc::now(),
            size: None,
            analysis: None,
            message: None,
        }
    }

    /// Event for a path that only exists relative to some root, as in tests
    /// and in-memory sources.
    pub fn relative(kind: ChangeEventKind, relative_path: impl Into<String>) -> Self {
        let relative_path = relative_path.into();
        Self::new(kind, PathBuf::from(&relative_path), relative_path)
    }

    pub fn error(message: impl Into<String>) -> Self {
        let mut event = Self::new(ChangeEventKind::Error, PathBuf::new(), String::new());
        event.message = Some(message.into());
        event
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_analysis(mut self, analysis: FileAnalysis) -> Self {
        self.analysis = Some(analysis);
        self
    }
}
