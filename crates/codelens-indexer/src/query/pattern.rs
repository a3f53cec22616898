//! Content scans: regular expressions and literal phrases.

use super::{highlight_span, Hit, ResultType};
use crate::store::IndexStore;
use regex::RegexBuilder;
use tracing::warn;

/// Literal matches always outrank ranked retrieval scores.
const EXACT_BASE_SCORE: f64 = 100.0;

const MAX_SPANS: usize = 10;

/// Compiled patterns are capped so a hostile query cannot exhaust memory.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Score is the number of matches. An invalid pattern yields no results.
pub(crate) fn regex(store: &IndexStore, pattern: &str, case_sensitive: bool) -> Vec<Hit> {
    let regex = match RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
    {
        Ok(regex) => regex,
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Invalid search pattern");
            return Vec::new();
        }
    };

    store
        .documents()
        .into_iter()
        .filter_map(|doc| {
            let spans: Vec<(usize, usize)> = regex
                .find_iter(&doc.content)
                .filter(|m| !m.is_empty())
                .map(|m| (m.start(), m.end()))
                .collect();
            if spans.is_empty() {
                return None;
            }
            let highlights = spans
                .iter()
                .take(MAX_SPANS)
                .map(|&(start, end)| highlight_span(&doc.content, start, end))
                .collect();
            let mut hit = Hit::for_document(doc, ResultType::Content, spans.len() as f64, highlights);
            hit.result.metadata.match_count = Some(spans.len());
            Some(hit)
        })
        .collect()
}

/// Literal phrase occurrences. Case folding is ASCII-only so byte offsets
/// stay valid for highlights.
pub(crate) fn exact(store: &IndexStore, phrase: &str, case_sensitive: bool) -> Vec<Hit> {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return Vec::new();
    }
    let needle = if case_sensitive {
        phrase.to_string()
    } else {
        phrase.to_ascii_lowercase()
    };

    store
        .documents()
        .into_iter()
        .filter_map(|doc| {
            let folded;
            let haystack = if case_sensitive {
                doc.content.as_str()
            } else {
                folded = doc.content.to_ascii_lowercase();
                folded.as_str()
            };
            let starts: Vec<usize> = haystack.match_indices(&needle).map(|(i, _)| i).collect();
            if starts.is_empty() {
                return None;
            }
            let highlights = starts
                .iter()
                .take(MAX_SPANS)
                .map(|&start| highlight_span(&doc.content, start, start + needle.len()))
                .collect();
            let score = EXACT_BASE_SCORE + starts.len() as f64;
            let mut hit = Hit::for_document(doc, ResultType::Content, score, highlights);
            hit.result.metadata.match_count = Some(starts.len());
            Some(hit)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> IndexStore {
        let mut store = IndexStore::new();
        store.index_document("a.ts", "function login() {}\nfunction Logout() {}\n", None);
        store.index_document("b.ts", "const x = login_count;\n", None);
        store
    }

    #[test]
    fn test_regex_counts_matches() {
        let store = store();
        let hits = regex(&store, r"log(in|out)", false);
        assert_eq!(hits.len(), 2);
        let a = hits.iter().find(|h| h.result.file_path == "a.ts").unwrap();
        assert_eq!(a.result.score, 2.0);
        assert_eq!(a.result.highlights[1].line, 2);
        assert_eq!(a.result.highlights[1].start, 9);
    }

    #[test]
    fn test_regex_case_sensitivity() {
        let store = store();
        assert_eq!(regex(&store, "Logout", true).len(), 1);
        assert!(regex(&store, "LOGOUT", true).is_empty());
        assert_eq!(regex(&store, "LOGOUT", false).len(), 1);
    }

    #[test]
    fn test_invalid_regex_returns_empty() {
        let store = store();
        assert!(regex(&store, "log(in", false).is_empty());
    }

    #[test]
    fn test_exact_phrase() {
        let store = store();
        let hits = exact(&store, "function login", false);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].result.score, EXACT_BASE_SCORE + 1.0);
        assert_eq!(hits[0].result.line_number, Some(1));
        assert_eq!(hits[0].result.column_number, Some(1));

        assert!(exact(&store, "function LOGIN", true).is_empty());
        assert!(exact(&store, "   ", false).is_empty());
    }
}
