//! Token retrieval: full-text with synonym expansion, and fuzzy.

use super::{term_highlights, Hit, ResultType, SynonymTable};
use crate::store::{Document, IndexStore};
use crate::tokenizer::{edit_distance, tokenize};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Weight of a synonym relative to the literal term.
pub(crate) const SYNONYM_WEIGHT: f64 = 0.7;

const FILENAME_BONUS: f64 = 2.0;
const RECENT_DAY_BONUS: f64 = 0.5;
const RECENT_WEEK_BONUS: f64 = 0.25;

/// Query text as unique tokens, in order.
pub(crate) fn query_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for token in tokenize(text) {
        if !terms.contains(&token) {
            terms.push(token);
        }
    }
    terms
}

pub(crate) fn full_text(store: &IndexStore, synonyms: &SynonymTable, text: &str) -> Vec<Hit> {
    let terms = query_terms(text);
    let mut scorer = TermScorer::new(store);
    for term in &terms {
        scorer.add_term(term, 1.0);
        for synonym in synonyms.expand(term) {
            if !terms.iter().any(|t| t == synonym) {
                scorer.add_term(synonym, SYNONYM_WEIGHT);
            }
        }
    }
    scorer.finish(Utc::now())
}

/// Every vocabulary token within `max_distance` edits of a query term
/// contributes, weighted down by its distance.
pub(crate) fn fuzzy(store: &IndexStore, text: &str, max_distance: usize) -> Vec<Hit> {
    let terms = query_terms(text);
    let vocabulary: Vec<&str> = store.vocabulary().collect();
    let mut scorer = TermScorer::new(store);

    for term in &terms {
        for token in &vocabulary {
            if token.len().abs_diff(term.len()) > max_distance {
                continue;
            }
            let distance = edit_distance(term, token);
            if distance <= max_distance {
                let weight = 1.0 - distance as f64 / (max_distance + 1) as f64;
                scorer.add_term(token, weight);
            }
        }
    }
    scorer.finish(Utc::now())
}

#[derive(Debug, Default)]
struct Candidate {
    score: f64,
    matched: Vec<String>,
}

/// Accumulates per-document scores over posting lists.
pub(crate) struct TermScorer<'a> {
    store: &'a IndexStore,
    total_docs: f64,
    candidates: HashMap<&'a str, Candidate>,
}

impl<'a> TermScorer<'a> {
    pub(crate) fn new(store: &'a IndexStore) -> Self {
        Self {
            store,
            total_docs: store.len() as f64,
            candidates: HashMap::new(),
        }
    }

    /// Score every document posted under `token`. Term frequency is damped
    /// logarithmically and scaled by inverse document frequency.
    pub(crate) fn add_term(&mut self, token: &str, weight: f64) {
        let store = self.store;
        let Some(paths) = store.postings(token) else {
            return;
        };
        let idf = (1.0 + self.total_docs / paths.len() as f64).ln();

        for path in paths {
            let Some(doc) = store.get(path) else {
                continue;
            };
            let tf = doc.term_freqs.get(token).copied().unwrap_or(0);
            if tf == 0 {
                continue;
            }

            let mut score = weight * (1.0 + f64::from(tf).ln()) * idf;
            if doc.file_name().contains(token) {
                score += weight * FILENAME_BONUS;
            }

            let candidate = self.candidates.entry(doc.path.as_str()).or_default();
            candidate.score += score;
            if !candidate.matched.iter().any(|t| t == token) {
                candidate.matched.push(token.to_string());
            }
        }
    }

    pub(crate) fn finish(self, now: DateTime<Utc>) -> Vec<Hit> {
        let store = self.store;
        self.candidates
            .into_iter()
            .filter_map(|(path, candidate)| {
                let doc = store.get(path)?;
                let score = candidate.score + recency_bonus(doc, now);
                let highlights = term_highlights(&doc.content, &candidate.matched);
                let mut hit = Hit::for_document(doc, ResultType::File, score, highlights);
                hit.result.metadata.matched_terms = candidate.matched;
                Some(hit)
            })
            .collect()
    }
}

fn recency_bonus(doc: &Document, now: DateTime<Utc>) -> f64 {
    let age = now - doc.modified_at();
    if age <= Duration::days(1) {
        RECENT_DAY_BONUS
    } else if age <= Duration::days(7) {
        RECENT_WEEK_BONUS
    } else {
        0.0
    }
}
