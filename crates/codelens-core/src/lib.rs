//! Codelens Core
//!
//! This crate wires the indexer and analytics crates into a running system:
//! - Configuration management
//! - The incremental indexing pipeline (debounce, batching, deletes)
//! - Content sources backed by disk or memory
//! - Metrics and latency tracking
//! - The workspace facade used by the CLI

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod source;
pub mod workspace;

pub use config::CodelensConfig;
pub use error::CoreError;
pub use metrics::{Metrics, MetricsSnapshot};
pub use pipeline::{IncrementalPipeline, PathState, PipelineError, PipelineProgress, SubscriptionId};
pub use source::{ContentSource, FsContentSource, MemoryContentSource, SourceFile};
pub use workspace::Workspace;
