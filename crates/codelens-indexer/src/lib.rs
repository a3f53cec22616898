//! Codelens Indexer
//!
//! This crate provides the retrieval side of Codelens, including:
//! - Normalized per-file analysis records and a tree-sitter producer
//! - Tokenization and an inverted index with symbol and module postings
//! - Multi-mode search (full-text, semantic, regex, fuzzy, exact)
//! - Search history, saved queries and index snapshots
//! - Change notifications from the file system watcher

pub mod analysis;
mod error;
pub mod events;
pub mod query;
pub mod scanner;
pub mod store;
pub mod tokenizer;
pub mod watcher;

pub use analysis::{
    AnalysisProducer, ClassInfo, ExportRecord, FileAnalysis, FunctionInfo, ImportRecord, Symbol,
    SymbolKind, Visibility,
};
pub use error::IndexerError;
pub use events::{ChangeEvent, ChangeEventKind};
pub use query::{
    EngineOptions, QueryEngine, ResultType, SavedQuery, SearchFilters, SearchMode, SearchOptions,
    SearchQuery, SearchResult, SortKey, SortOrder,
};
pub use scanner::{detect_language, Language, TreeSitterProducer, Walker};
pub use store::{Document, IndexSnapshot, IndexStats, IndexStore};
pub use watcher::{FileWatcher, WatcherOptions};
