//! Query execution: retrieval, filtering, ordering, paging and history.

use super::history::{HistoryEntry, SavedQueries, SavedQuery, SearchHistory};
use super::{fulltext, pattern, semantic};
use super::{Hit, SearchMode, SearchOptions, SearchQuery, SearchResult, SortKey, SortOrder, SynonymTable};
use crate::store::IndexStore;
use crate::IndexerError;
use chrono::Utc;
use parking_lot::Mutex;
use std::time::Instant;
use tracing::debug;

/// Engine-wide defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub history_size: usize,
    pub default_limit: usize,
    pub suggestion_limit: usize,
    pub fuzzy_max_distance: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            history_size: 100,
            default_limit: 50,
            suggestion_limit: 10,
            fuzzy_max_distance: 2,
        }
    }
}

/// Runs queries against an [`IndexStore`].
///
/// The engine holds no documents itself, only history and saved queries,
/// so one engine can serve any number of concurrent readers of the store.
pub struct QueryEngine {
    options: EngineOptions,
    synonyms: SynonymTable,
    history: Mutex<SearchHistory>,
    saved: Mutex<SavedQueries>,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl QueryEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            synonyms: SynonymTable::new(),
            history: Mutex::new(SearchHistory::new(options.history_size)),
            saved: Mutex::new(SavedQueries::new()),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Execute `query` and return one page of results.
    pub fn search(&self, store: &IndexStore, query: &SearchQuery) -> Vec<SearchResult> {
        let started = Instant::now();
        let options = &query.options;

        let mut hits = match query.mode {
            SearchMode::FullText => fulltext::full_text(store, &self.synonyms, &query.text),
            SearchMode::Semantic => semantic::semantic(store, &self.synonyms, &query.text),
            SearchMode::Regex => pattern::regex(store, &query.text, options.case_sensitive),
            SearchMode::Fuzzy => {
                fulltext::fuzzy(store, &query.text, self.options.fuzzy_max_distance)
            }
            SearchMode::Exact => pattern::exact(store, &query.text, options.case_sensitive),
        };

        hits.retain(|hit| {
            store
                .get(&hit.result.file_path)
                .is_some_and(|doc| query.filters.matches(doc))
        });
        sort_hits(&mut hits, options);

        let total = hits.len();
        let limit = options.limit.unwrap_or(self.options.default_limit);
        let results: Vec<SearchResult> = hits
            .into_iter()
            .skip(options.offset)
            .take(limit)
            .map(|hit| hit.result)
            .collect();

        self.history.lock().record(HistoryEntry {
            query: query.text.trim().to_string(),
            mode: query.mode,
            result_count: total,
            timestamp: Utc::now(),
        });

        debug!(
            query = %query.text,
            mode = query.mode.as_str(),
            total,
            returned = results.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Search complete"
        );
        results
    }

    /// Completions for `partial`: matching history first, then indexed
    /// tokens with that prefix, most common first.
    pub fn suggestions(&self, store: &IndexStore, partial: &str) -> Vec<String> {
        let partial = partial.trim().to_lowercase();
        let limit = self.options.suggestion_limit;
        let mut suggestions: Vec<String> = Vec::new();

        for entry in self.history.lock().entries() {
            if suggestions.len() >= limit {
                return suggestions;
            }
            if !entry.query.is_empty()
                && entry.query.to_lowercase().contains(&partial)
                && !suggestions.iter().any(|s| *s == entry.query)
            {
                suggestions.push(entry.query.clone());
            }
        }

        if partial.is_empty() {
            return suggestions;
        }

        let mut tokens: Vec<&str> = store
            .vocabulary()
            .filter(|token| token.starts_with(partial.as_str()))
            .collect();
        tokens.sort_by(|a, b| {
            store
                .document_frequency(b)
                .cmp(&store.document_frequency(a))
                .then_with(|| a.cmp(b))
        });

        for token in tokens {
            if suggestions.len() >= limit {
                break;
            }
            if !suggestions.iter().any(|s| s == token) {
                suggestions.push(token.to_string());
            }
        }
        suggestions
    }

    /// Executed queries, most recent first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().entries().cloned().collect()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    pub fn save_query(&self, name: &str, query: SearchQuery) -> SavedQuery {
        self.saved.lock().save(name, query)
    }

    /// Run a saved query by name, bumping its usage counters.
    pub fn execute_saved(
        &self,
        store: &IndexStore,
        name: &str,
    ) -> Result<Vec<SearchResult>, IndexerError> {
        let query = self.saved.lock().checkout(name)?;
        Ok(self.search(store, &query))
    }

    pub fn delete_saved(&self, name: &str) -> bool {
        self.saved.lock().delete(name)
    }

    pub fn saved_queries(&self) -> Vec<SavedQuery> {
        self.saved.lock().list()
    }

    pub fn restore_saved(&self, queries: Vec<SavedQuery>) {
        self.saved.lock().restore(queries);
    }
}

/// Order by the requested key. Ties keep document order, then line order.
fn sort_hits(hits: &mut [Hit], options: &SearchOptions) {
    hits.sort_by(|a, b| a.order.cmp(&b.order));
    hits.sort_by(|a, b| {
        let (a, b) = (&a.result, &b.result);
        let ordering = match options.sort_by {
            SortKey::Relevance => a.score.total_cmp(&b.score),
            SortKey::Path => a.file_path.cmp(&b.file_path),
            SortKey::Modified => a.metadata.last_modified.cmp(&b.metadata.last_modified),
            SortKey::Size => a.metadata.size.cmp(&b.metadata.size),
            SortKey::Complexity => a
                .metadata
                .complexity
                .unwrap_or(0)
                .cmp(&b.metadata.complexity.unwrap_or(0)),
        };
        match options.sort_order {
            SortOrder::Desc => ordering.reverse(),
            SortOrder::Asc => ordering,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{NumericRange, SearchFilters};

    fn store() -> IndexStore {
        let mut store = IndexStore::new();
        store.index_document("a.ts", "export function login() {}", None);
        store.index_document("b.ts", "export function logout() {}", None);
        store
    }

    #[test]
    fn test_full_text_scenario() {
        let store = store();
        let engine = QueryEngine::default();

        let results = engine.search(&store, &SearchQuery::full_text("login"));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file_path, "a.ts");

        let results = engine.search(&store, &SearchQuery::new("logn", SearchMode::Fuzzy));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file_path, "a.ts");
    }

    #[test]
    fn test_pagination_and_tie_order() {
        let mut store = IndexStore::new();
        for i in 0..5 {
            store.index_document(&format!("f{}.ts", i), "shared", None);
        }
        let engine = QueryEngine::default();
        let query = SearchQuery::full_text("shared").with_options(SearchOptions {
            limit: Some(2),
            offset: 1,
            ..Default::default()
        });
        let results = engine.search(&store, &query);
        let paths: Vec<_> = results.iter().map(|r| r.file_path.as_str()).collect();
        // Equal scores fall back to first-indexed order
        assert_eq!(paths, vec!["f1.ts", "f2.ts"]);

        let past_end = SearchQuery::full_text("shared").with_options(SearchOptions {
            offset: 10,
            ..Default::default()
        });
        assert!(engine.search(&store, &past_end).is_empty());
    }

    #[test]
    fn test_results_sorted_by_score_desc() {
        let mut store = IndexStore::new();
        store.index_document("low.ts", "token", None);
        store.index_document("high.ts", "token token token token", None);
        let engine = QueryEngine::default();
        let results = engine.search(&store, &SearchQuery::full_text("token"));
        assert_eq!(results[0].file_path, "high.ts");
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_sort_by_path_ascending() {
        let mut store = IndexStore::new();
        store.index_document("c.ts", "token", None);
        store.index_document("a.ts", "token token", None);
        store.index_document("b.ts", "token", None);
        let engine = QueryEngine::default();
        let query = SearchQuery::full_text("token").with_options(SearchOptions {
            sort_by: SortKey::Path,
            sort_order: SortOrder::Asc,
            ..Default::default()
        });
        let paths: Vec<_> = engine
            .search(&store, &query)
            .into_iter()
            .map(|r| r.file_path)
            .collect();
        assert_eq!(paths, vec!["a.ts", "b.ts", "c.ts"]);
    }

    #[test]
    fn test_filters_applied_after_retrieval() {
        let store = store();
        let engine = QueryEngine::default();
        let query = SearchQuery::full_text("export").with_filters(SearchFilters {
            exclude_paths: vec!["b.ts".to_string()],
            ..Default::default()
        });
        let results = engine.search(&store, &query);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file_path, "a.ts");

        let query = SearchQuery::full_text("export").with_filters(SearchFilters {
            size: Some(NumericRange {
                min: Some(1_000),
                max: None,
            }),
            ..Default::default()
        });
        assert!(engine.search(&store, &query).is_empty());
    }

    #[test]
    fn test_history_records_total_count() {
        let store = store();
        let engine = QueryEngine::default();
        engine.search(
            &store,
            &SearchQuery::full_text("export").with_options(SearchOptions {
                limit: Some(1),
                ..Default::default()
            }),
        );
        let history = engine.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].query, "export");
        assert_eq!(history[0].result_count, 2);

        // Empty and zero-result queries are still recorded
        engine.search(&store, &SearchQuery::new("", SearchMode::Regex));
        assert_eq!(engine.history().len(), 2);
        assert_eq!(engine.history()[0].result_count, 0);
        assert!(engine.suggestions(&store, "").iter().all(|s| !s.is_empty()));

        engine.clear_history();
        assert!(engine.history().is_empty());
    }

    #[test]
    fn test_suggestions_history_then_vocabulary() {
        let store = store();
        let engine = QueryEngine::default();
        engine.search(&store, &SearchQuery::full_text("login flow"));

        let suggestions = engine.suggestions(&store, "log");
        assert_eq!(suggestions, vec!["login flow", "login", "logout"]);
    }

    #[test]
    fn test_suggestions_are_bounded() {
        let mut store = IndexStore::new();
        let content: Vec<String> = (0..30).map(|i| format!("item{}", i)).collect();
        store.index_document("many.ts", &content.join(" "), None);
        let engine = QueryEngine::new(EngineOptions {
            suggestion_limit: 5,
            ..Default::default()
        });
        assert_eq!(engine.suggestions(&store, "item").len(), 5);
    }

    #[test]
    fn test_saved_queries() {
        let store = store();
        let engine = QueryEngine::default();
        engine.save_query("logins", SearchQuery::full_text("login"));

        let results = engine.execute_saved(&store, "logins").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(engine.saved_queries()[0].use_count, 1);

        assert!(engine.delete_saved("logins"));
        assert!(matches!(
            engine.execute_saved(&store, "logins"),
            Err(IndexerError::QueryNotFound(_))
        ));
    }
}
