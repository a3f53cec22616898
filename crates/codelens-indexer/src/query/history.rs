//! Search history and named saved queries.

use super::{SearchMode, SearchQuery};
use crate::IndexerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// One executed query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub query: String,
    pub mode: SearchMode,
    /// Matches after filtering, before pagination
    pub result_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Bounded, most-recent-first query log.
#[derive(Debug, Clone)]
pub struct SearchHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl SearchHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        if self.capacity == 0 {
            return;
        }
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Entries, most recent first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A named query with usage counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuery {
    pub id: Uuid,
    pub name: String,
    pub query: SearchQuery,
    pub created_at: DateTime<Utc>,
    pub use_count: u64,
    pub last_used: Option<DateTime<Utc>>,
}

/// Saved queries keyed by name.
#[derive(Debug, Clone, Default)]
pub struct SavedQueries {
    by_name: HashMap<String, SavedQuery>,
}

impl SavedQueries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save under `name`, replacing any query of the same name.
    pub fn save(&mut self, name: &str, query: SearchQuery) -> SavedQuery {
        let saved = SavedQuery {
            id: Uuid::new_v4(),
            name: name.to_string(),
            query,
            created_at: Utc::now(),
            use_count: 0,
            last_used: None,
        };
        self.by_name.insert(name.to_string(), saved.clone());
        saved
    }

    /// Look up a query for execution and bump its usage counters.
    pub fn checkout(&mut self, name: &str) -> Result<SearchQuery, IndexerError> {
        let saved = self
            .by_name
            .get_mut(name)
            .ok_or_else(|| IndexerError::QueryNotFound(name.to_string()))?;
        saved.use_count += 1;
        saved.last_used = Some(Utc::now());
        Ok(saved.query.clone())
    }

    pub fn get(&self, name: &str) -> Option<&SavedQuery> {
        self.by_name.get(name)
    }

    pub fn delete(&mut self, name: &str) -> bool {
        self.by_name.remove(name).is_some()
    }

    /// All saved queries sorted by name.
    pub fn list(&self) -> Vec<SavedQuery> {
        let mut queries: Vec<SavedQuery> = self.by_name.values().cloned().collect();
        queries.sort_by(|a, b| a.name.cmp(&b.name));
        queries
    }

    /// Replace the whole set, e.g. after loading from disk.
    pub fn restore(&mut self, queries: Vec<SavedQuery>) {
        self.by_name = queries.into_iter().map(|q| (q.name.clone(), q)).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(query: &str) -> HistoryEntry {
        HistoryEntry {
            query: query.to_string(),
            mode: SearchMode::FullText,
            result_count: 1,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_history_is_bounded_and_most_recent_first() {
        let mut history = SearchHistory::new(2);
        history.record(entry("one"));
        history.record(entry("two"));
        history.record(entry("three"));

        let queries: Vec<_> = history.entries().map(|e| e.query.as_str()).collect();
        assert_eq!(queries, vec!["three", "two"]);
    }

    #[test]
    fn test_zero_capacity_history_records_nothing() {
        let mut history = SearchHistory::new(0);
        history.record(entry("one"));
        assert!(history.is_empty());
    }

    #[test]
    fn test_saved_query_lifecycle() {
        let mut saved = SavedQueries::new();
        saved.save("logins", SearchQuery::full_text("login"));

        let query = saved.checkout("logins").unwrap();
        assert_eq!(query.text, "login");
        saved.checkout("logins").unwrap();
        let stored = saved.get("logins").unwrap();
        assert_eq!(stored.use_count, 2);
        assert!(stored.last_used.is_some());

        assert!(saved.delete("logins"));
        assert!(!saved.delete("logins"));
        assert!(matches!(
            saved.checkout("logins"),
            Err(IndexerError::QueryNotFound(name)) if name == "logins"
        ));
    }

    #[test]
    fn test_saved_query_serializes() {
        let mut saved = SavedQueries::new();
        let query = saved.save("recent", SearchQuery::full_text("config"));
        let json = serde_json::to_string(&query).unwrap();
        let back: SavedQuery = serde_json::from_str(&json).unwrap();
        assert_eq!(back, query);
    }
}
