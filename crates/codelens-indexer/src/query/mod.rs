//! Multi-mode search over the index store.
//!
//! A [`SearchQuery`] selects one of five retrieval modes, then the engine
//! applies filters, sorting and pagination uniformly.

mod engine;
mod fulltext;
mod history;
mod pattern;
mod semantic;
mod synonyms;

pub use engine::{EngineOptions, QueryEngine};
pub use history::{HistoryEntry, SavedQuery, SavedQueries, SearchHistory};
pub use semantic::QueryIntent;
pub use synonyms::SynonymTable;

use crate::analysis::SymbolKind;
use crate::scanner::Language;
use crate::store::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest preview line returned with a result.
const MAX_PREVIEW_LEN: usize = 200;

/// Highlights kept per result.
const MAX_HIGHLIGHTS: usize = 10;

/// Retrieval strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    FullText,
    Semantic,
    Regex,
    Fuzzy,
    Exact,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::FullText => "full_text",
            SearchMode::Semantic => "semantic",
            SearchMode::Regex => "regex",
            SearchMode::Fuzzy => "fuzzy",
            SearchMode::Exact => "exact",
        }
    }
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "full_text" | "fulltext" | "text" => Ok(SearchMode::FullText),
            "semantic" => Ok(SearchMode::Semantic),
            "regex" => Ok(SearchMode::Regex),
            "fuzzy" => Ok(SearchMode::Fuzzy),
            "exact" => Ok(SearchMode::Exact),
            other => Err(format!("unknown search mode: {}", other)),
        }
    }
}

/// A search request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub text: String,
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub options: SearchOptions,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            text: text.into(),
            mode,
            ..Default::default()
        }
    }

    pub fn full_text(text: impl Into<String>) -> Self {
        Self::new(text, SearchMode::FullText)
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }
}

/// Inclusive numeric bounds; a missing side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl NumericRange {
    pub fn contains(&self, value: u64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// Inclusive time bounds; a missing side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, value: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| value >= from) && self.to.map_or(true, |to| value <= to)
    }
}

/// Document-level filters. Empty lists and `None` ranges match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    /// Language tags or common extensions (`rust`, `ts`)
    #[serde(default)]
    pub languages: Vec<String>,
    /// Keep only paths containing one of these substrings
    #[serde(default)]
    pub include_paths: Vec<String>,
    /// Drop paths containing any of these substrings
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    #[serde(default)]
    pub complexity: Option<NumericRange>,
    /// Size in bytes
    #[serde(default)]
    pub size: Option<NumericRange>,
    #[serde(default)]
    pub modified: Option<DateRange>,
}

impl SearchFilters {
    pub fn matches(&self, doc: &Document) -> bool {
        if !self.languages.is_empty() {
            let language = doc.language();
            if !self.languages.iter().any(|l| language.matches_filter(l)) {
                return false;
            }
        }
        if !self.include_paths.is_empty()
            && !self.include_paths.iter().any(|p| doc.path.contains(p.as_str()))
        {
            return false;
        }
        if self.exclude_paths.iter().any(|p| doc.path.contains(p.as_str())) {
            return false;
        }
        if let Some(range) = &self.complexity {
            match doc.complexity() {
                Some(c) if range.contains(u64::from(c)) => {}
                _ => return false,
            }
        }
        if let Some(range) = &self.size {
            if !range.contains(doc.size()) {
                return false;
            }
        }
        if let Some(range) = &self.modified {
            if !range.contains(doc.modified_at()) {
                return false;
            }
        }
        true
    }
}

/// Result ordering key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Relevance,
    Path,
    Modified,
    Size,
    Complexity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

/// Paging, ordering and matching options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    /// Page size; the engine default applies when unset
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub sort_by: SortKey,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default)]
    pub case_sensitive: bool,
}

/// What a result points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    File,
    Content,
    Symbol,
    Import,
    Export,
}

/// A matched span within one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    /// 1-indexed line
    pub line: usize,
    /// Byte offsets within the line
    pub start: usize,
    pub end: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub language: Language,
    pub size: u64,
    pub complexity: Option<u32>,
    pub last_modified: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_kind: Option<SymbolKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_terms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_count: Option<usize>,
}

/// One ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub file_path: String,
    #[serde(rename = "type")]
    pub result_type: ResultType,
    pub score: f64,
    pub highlights: Vec<Highlight>,
    pub preview: String,
    pub line_number: Option<usize>,
    pub column_number: Option<usize>,
    pub metadata: ResultMetadata,
}

/// A result plus its position in document order, used to break score ties.
#[derive(Debug, Clone)]
pub(crate) struct Hit {
    pub result: SearchResult,
    pub order: (u64, usize),
}

impl Hit {
    /// A whole-document hit.
    pub(crate) fn for_document(
        doc: &Document,
        result_type: ResultType,
        score: f64,
        highlights: Vec<Highlight>,
    ) -> Self {
        let first = highlights.first();
        let line_number = first.map(|h| h.line);
        let column_number = first.map(|h| h.start + 1);
        let preview = match first {
            Some(h) => truncate(h.text.trim()),
            None => truncate(
                doc.content
                    .lines()
                    .map(str::trim)
                    .find(|l| !l.is_empty())
                    .unwrap_or_default(),
            ),
        };

        Self {
            order: (doc.order(), line_number.unwrap_or(0)),
            result: SearchResult {
                id: doc.path.clone(),
                file_path: doc.path.clone(),
                result_type,
                score,
                highlights,
                preview,
                line_number,
                column_number,
                metadata: metadata_for(doc),
            },
        }
    }
}

pub(crate) fn metadata_for(doc: &Document) -> ResultMetadata {
    ResultMetadata {
        language: doc.language(),
        size: doc.size(),
        complexity: doc.complexity(),
        last_modified: doc.modified_at(),
        symbol_kind: None,
        matched_terms: Vec::new(),
        match_count: None,
    }
}

pub(crate) fn truncate(text: &str) -> String {
    text.chars().take(MAX_PREVIEW_LEN).collect()
}

/// Highlight for the byte span `[start, end)` of `content`.
pub(crate) fn highlight_span(content: &str, start: usize, end: usize) -> Highlight {
    let line_start = content[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = content[start..]
        .find('\n')
        .map(|i| start + i)
        .unwrap_or(content.len());
    let line = content[..start].matches('\n').count() + 1;

    Highlight {
        line,
        start: start - line_start,
        end: end.min(line_end) - line_start,
        text: content[line_start..line_end].to_string(),
    }
}

/// Highlights for every line containing one of `terms` (case-insensitive).
pub(crate) fn term_highlights(content: &str, terms: &[String]) -> Vec<Highlight> {
    let mut highlights = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let lowered = line.to_ascii_lowercase();
        for term in terms {
            if let Some(start) = lowered.find(term.as_str()) {
                highlights.push(Highlight {
                    line: idx + 1,
                    start,
                    end: start + term.len(),
                    text: line.to_string(),
                });
                break;
            }
        }
        if highlights.len() >= MAX_HIGHLIGHTS {
            break;
        }
    }
    highlights
}
