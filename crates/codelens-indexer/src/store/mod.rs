//! The index store: document table plus token, symbol and module postings.
//!
//! Every document is replaced wholesale on re-index. Postings for the old
//! version are removed before the new ones are added, so a document appears
//! under a token exactly when that token is in its current token sequence.

mod snapshot;

pub use snapshot::{IndexSnapshot, SnapshotEntry};

use crate::analysis::{FileAnalysis, Symbol};
use crate::scanner::Language;
use crate::tokenizer::{term_frequencies, tokenize};
use crate::IndexerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};

/// Longest context line kept for a symbol entry.
const MAX_CONTEXT_LEN: usize = 200;

/// One indexed source file.
#[derive(Debug, Clone)]
pub struct Document {
    /// Normalized path, the document identity
    pub path: String,
    pub content: String,
    pub tokens: Vec<String>,
    pub term_freqs: HashMap<String, u32>,
    pub analysis: Option<FileAnalysis>,
    /// Hex SHA-256 of `content`
    pub content_hash: String,
    pub indexed_at: DateTime<Utc>,
    /// Position in first-indexed order, kept across re-indexes
    order: u64,
}

impl Document {
    pub fn order(&self) -> u64 {
        self.order
    }

    pub fn language(&self) -> Language {
        match &self.analysis {
            Some(analysis) => analysis.language,
            None => Language::detect(Path::new(&self.path), &self.content),
        }
    }

    /// Final path component, lower-cased.
    pub fn file_name(&self) -> String {
        self.path
            .rsplit('/')
            .next()
            .unwrap_or(&self.path)
            .to_lowercase()
    }

    pub fn size(&self) -> u64 {
        self.analysis
            .as_ref()
            .map(|a| a.size)
            .unwrap_or(self.content.len() as u64)
    }

    pub fn complexity(&self) -> Option<u32> {
        self.analysis.as_ref().and_then(|a| a.complexity)
    }

    /// Source modification time when the analysis carries one, else the
    /// time the document was indexed.
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.analysis
            .as_ref()
            .map(|a| a.last_modified)
            .filter(|t| *t > DateTime::<Utc>::default())
            .unwrap_or(self.indexed_at)
    }

    /// 1-indexed line of content.
    pub fn line(&self, line: usize) -> Option<&str> {
        line.checked_sub(1).and_then(|i| self.content.lines().nth(i))
    }
}

/// A symbol posting: where a name is declared and the line around it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub path: String,
    pub symbol: Symbol,
    pub context: String,
}

/// Index size counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub documents: usize,
    pub tokens: usize,
    pub postings: usize,
    pub symbols: usize,
    pub modules: usize,
}

/// Owns the document table and all postings.
#[derive(Debug, Default)]
pub struct IndexStore {
    documents: HashMap<String, Document>,
    postings: HashMap<String, BTreeSet<String>>,
    symbols: HashMap<String, Vec<SymbolEntry>>,
    modules: HashMap<String, BTreeSet<String>>,
    next_order: u64,
}

/// Normalize a path into a document identity: forward slashes, no leading
/// `./`, no trailing `/`.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.trim().replace('\\', "/");
    while let Some(rest) = normalized.strip_prefix("./") {
        normalized = rest.to_string();
    }
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `content` under `path`, replacing any previous version.
    pub fn index_document(&mut self, path: &str, content: &str, analysis: Option<FileAnalysis>) {
        let path = normalize_path(path);

        let order = match self.documents.get(&path) {
            Some(existing) => existing.order,
            None => {
                self.next_order += 1;
                self.next_order
            }
        };
        self.remove_document(&path);

        let tokens = tokenize(content);
        let term_freqs = term_frequencies(&tokens);

        for token in term_freqs.keys() {
            self.postings
                .entry(token.clone())
                .or_default()
                .insert(path.clone());
        }

        if let Some(analysis) = &analysis {
            for symbol in analysis.symbols() {
                let context = symbol_context(content, symbol.line);
                self.symbols
                    .entry(symbol.name.to_lowercase())
                    .or_default()
                    .push(SymbolEntry {
                        path: path.clone(),
                        symbol: symbol.clone(),
                        context,
                    });
            }
            for module in analysis.referenced_modules() {
                self.modules
                    .entry(module.to_lowercase())
                    .or_default()
                    .insert(path.clone());
            }
        }

        debug!(
            path = %path,
            tokens = tokens.len(),
            unique = term_freqs.len(),
            "Indexed document"
        );

        self.documents.insert(
            path.clone(),
            Document {
                path,
                content: content.to_string(),
                tokens,
                term_freqs,
                analysis,
                content_hash: content_hash(content),
                indexed_at: Utc::now(),
                order,
            },
        );
    }

    /// Remove a document and every posting that references it.
    pub fn remove_document(&mut self, path: &str) -> bool {
        let path = normalize_path(path);
        let Some(doc) = self.documents.remove(&path) else {
            return false;
        };

        for token in doc.term_freqs.keys() {
            if let Some(set) = self.postings.get_mut(token) {
                set.remove(&path);
                if set.is_empty() {
                    self.postings.remove(token);
                }
            }
        }

        if let Some(analysis) = &doc.analysis {
            for symbol in analysis.symbols() {
                let key = symbol.name.to_lowercase();
                if let Some(entries) = self.symbols.get_mut(&key) {
                    entries.retain(|e| e.path != path);
                    if entries.is_empty() {
                        self.symbols.remove(&key);
                    }
                }
            }
            for module in analysis.referenced_modules() {
                let key = module.to_lowercase();
                if let Some(set) = self.modules.get_mut(&key) {
                    set.remove(&path);
                    if set.is_empty() {
                        self.modules.remove(&key);
                    }
                }
            }
        }

        debug!(path = %path, "Removed document");
        true
    }

    /// Remove `dir` itself and every document beneath it. Returns the
    /// removed paths.
    pub fn remove_prefix(&mut self, dir: &str) -> Vec<String> {
        let dir = normalize_path(dir);
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let mut doomed: Vec<String> = self
            .documents
            .keys()
            .filter(|p| **p == dir || p.starts_with(&prefix) || dir.is_empty())
            .cloned()
            .collect();
        doomed.sort();

        for path in &doomed {
            self.remove_document(path);
        }

        info!(dir = %dir, removed = doomed.len(), "Removed directory from index");
        doomed
    }

    /// Drop every document and posting.
    pub fn clear(&mut self) {
        self.documents.clear();
        self.postings.clear();
        self.symbols.clear();
        self.modules.clear();
        self.next_order = 0;
    }

    pub fn get(&self, path: &str) -> Option<&Document> {
        self.documents.get(&normalize_path(path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// True when `path` is indexed with exactly this content.
    pub fn is_current(&self, path: &str, content: &str) -> bool {
        self.get(path)
            .is_some_and(|doc| doc.content_hash == content_hash(content))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Documents in first-indexed order.
    pub fn documents(&self) -> Vec<&Document> {
        let mut docs: Vec<&Document> = self.documents.values().collect();
        docs.sort_by_key(|d| d.order);
        docs
    }

    pub fn postings(&self, token: &str) -> Option<&BTreeSet<String>> {
        self.postings.get(token)
    }

    pub fn document_frequency(&self, token: &str) -> usize {
        self.postings.get(token).map(|s| s.len()).unwrap_or(0)
    }

    /// Every indexed token.
    pub fn vocabulary(&self) -> impl Iterator<Item = &str> + '_ {
        self.postings.keys().map(String::as_str)
    }

    /// Symbol postings keyed by lower-cased name.
    pub fn symbol_entries(&self) -> impl Iterator<Item = (&str, &[SymbolEntry])> + '_ {
        self.symbols
            .iter()
            .map(|(name, entries)| (name.as_str(), entries.as_slice()))
    }

    /// Module postings keyed by lower-cased module path.
    pub fn module_entries(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> + '_ {
        self.modules.iter().map(|(module, paths)| (module.as_str(), paths))
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            documents: self.documents.len(),
            tokens: self.postings.len(),
            postings: self.postings.values().map(|s| s.len()).sum(),
            symbols: self.symbols.values().map(|v| v.len()).sum(),
            modules: self.modules.len(),
        }
    }

    /// Check that postings and the document table agree in both directions.
    ///
    /// A failure means the index can no longer be trusted and must be
    /// rebuilt from scratch.
    pub fn verify_consistency(&self) -> Result<(), IndexerError> {
        for (token, paths) in &self.postings {
            for path in paths {
                let Some(doc) = self.documents.get(path) else {
                    return Err(IndexerError::Inconsistent(format!(
                        "token '{}' references missing document {}",
                        token, path
                    )));
                };
                if !doc.term_freqs.contains_key(token) {
                    return Err(IndexerError::Inconsistent(format!(
                        "token '{}' posted for {} which does not contain it",
                        token, path
                    )));
                }
            }
        }

        for (path, doc) in &self.documents {
            for token in doc.term_freqs.keys() {
                if !self.postings.get(token).is_some_and(|s| s.contains(path)) {
                    return Err(IndexerError::Inconsistent(format!(
                        "document {} missing posting for '{}'",
                        path, token
                    )));
                }
            }
        }

        for (name, entries) in &self.symbols {
            if let Some(entry) = entries.iter().find(|e| !self.documents.contains_key(&e.path)) {
                return Err(IndexerError::Inconsistent(format!(
                    "symbol '{}' references missing document {}",
                    name, entry.path
                )));
            }
        }

        for (module, paths) in &self.modules {
            if let Some(path) = paths.iter().find(|p| !self.documents.contains_key(*p)) {
                return Err(IndexerError::Inconsistent(format!(
                    "module '{}' references missing document {}",
                    module, path
                )));
            }
        }

        Ok(())
    }

    /// Paths and metadata sufficient to drive a re-index.
    pub fn export_snapshot(&self) -> IndexSnapshot {
        IndexSnapshot::new(
            self.documents()
                .into_iter()
                .map(|doc| SnapshotEntry {
                    path: doc.path.clone(),
                    content_hash: doc.content_hash.clone(),
                    language: doc.language(),
                    size: doc.size(),
                    indexed_at: doc.indexed_at,
                })
                .collect(),
        )
    }
}

fn symbol_context(content: &str, line: usize) -> String {
    let text = line
        .checked_sub(1)
        .and_then(|i| content.lines().nth(i))
        .unwrap_or_default()
        .trim();
    text.chars().take(MAX_CONTEXT_LEN).collect()
}
