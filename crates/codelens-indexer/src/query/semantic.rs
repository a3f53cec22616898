//! Intent-aware retrieval over the symbol and module indexes.
//!
//! Intent detection is a keyword heuristic: "function login" looks for
//! function symbols named like "login", "import react" looks for modules.
//! Queries with no recognizable intent fall back to full-text.

use super::fulltext::{full_text, query_terms};
use super::{highlight_span, metadata_for, truncate, Hit, ResultType, SearchResult, SynonymTable};
use crate::analysis::{SymbolKind, Visibility};
use crate::store::{Document, IndexStore};

const SYMBOL_BASE_SCORE: f64 = 10.0;
const KIND_MATCH_BONUS: f64 = 5.0;
const PUBLIC_BONUS: f64 = 2.0;
const EXACT_NAME_BONUS: f64 = 3.0;
const IMPORT_BASE_SCORE: f64 = 8.0;
const EXPORT_BASE_SCORE: f64 = 6.0;

const KIND_KEYWORDS: &[(&str, SymbolKind)] = &[
    ("function", SymbolKind::Function),
    ("functions", SymbolKind::Function),
    ("fn", SymbolKind::Function),
    ("func", SymbolKind::Function),
    ("def", SymbolKind::Function),
    ("method", SymbolKind::Function),
    ("methods", SymbolKind::Function),
    ("class", SymbolKind::Class),
    ("classes", SymbolKind::Class),
    ("struct", SymbolKind::Struct),
    ("structs", SymbolKind::Struct),
    ("enum", SymbolKind::Enum),
    ("enums", SymbolKind::Enum),
    ("interface", SymbolKind::Interface),
    ("interfaces", SymbolKind::Interface),
    ("trait", SymbolKind::Interface),
    ("traits", SymbolKind::Interface),
    ("variable", SymbolKind::Variable),
    ("variables", SymbolKind::Variable),
    ("var", SymbolKind::Variable),
    ("constant", SymbolKind::Constant),
    ("constants", SymbolKind::Constant),
    ("const", SymbolKind::Constant),
];

const MODULE_KEYWORDS: &[&str] = &["import", "imports", "from", "use", "uses", "require"];

/// What a semantic query is looking for.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryIntent {
    pub symbol_kinds: Vec<SymbolKind>,
    pub wants_modules: bool,
    /// Query terms left after removing intent keywords
    pub terms: Vec<String>,
    /// 0.0 when no intent was recognized
    pub confidence: f64,
}

impl QueryIntent {
    pub fn detect(text: &str) -> Self {
        let mut symbol_kinds = Vec::new();
        let mut wants_modules = false;
        let mut terms = Vec::new();

        for token in query_terms(text) {
            if let Some((_, kind)) = KIND_KEYWORDS.iter().find(|(k, _)| *k == token) {
                if !symbol_kinds.contains(kind) {
                    symbol_kinds.push(*kind);
                }
            } else if MODULE_KEYWORDS.contains(&token.as_str()) {
                wants_modules = true;
            } else {
                terms.push(token);
            }
        }

        let recognized = !symbol_kinds.is_empty() || wants_modules;
        let confidence = match (recognized, terms.is_empty()) {
            (false, _) => 0.0,
            (true, true) => 0.6,
            (true, false) => 0.9,
        };

        Self {
            symbol_kinds,
            wants_modules,
            terms,
            confidence,
        }
    }

    pub fn is_recognized(&self) -> bool {
        self.confidence > 0.0
    }

    fn name_matches(&self, name: &str) -> bool {
        self.terms.is_empty() || self.terms.iter().any(|t| name.contains(t.as_str()))
    }
}

pub(crate) fn semantic(store: &IndexStore, synonyms: &SynonymTable, text: &str) -> Vec<Hit> {
    let intent = QueryIntent::detect(text);
    if !intent.is_recognized() {
        return full_text(store, synonyms, text);
    }

    let mut hits = Vec::new();
    if !intent.symbol_kinds.is_empty() {
        hits.extend(symbol_hits(store, &intent));
    }
    if intent.wants_modules {
        hits.extend(module_hits(store, &intent));
    }
    hits
}

fn symbol_hits(store: &IndexStore, intent: &QueryIntent) -> Vec<Hit> {
    let mut hits = Vec::new();
    for (name, entries) in store.symbol_entries() {
        if !intent.name_matches(name) {
            continue;
        }
        for entry in entries {
            let kind_match = intent.symbol_kinds.contains(&entry.symbol.kind);
            // A bare "functions" lists every function and nothing else
            if intent.terms.is_empty() && !kind_match {
                continue;
            }
            let Some(doc) = store.get(&entry.path) else {
                continue;
            };

            let mut score = SYMBOL_BASE_SCORE;
            if kind_match {
                score += KIND_MATCH_BONUS;
            }
            if entry.symbol.visibility == Visibility::Public {
                score += PUBLIC_BONUS;
            }
            if intent.terms.iter().any(|t| t == name) {
                score += EXACT_NAME_BONUS;
            }

            let line = entry.symbol.line;
            let highlights = line_highlight(doc, line, name).into_iter().collect();
            let mut metadata = metadata_for(doc);
            metadata.symbol_kind = Some(entry.symbol.kind);

            hits.push(Hit {
                order: (doc.order(), line),
                result: SearchResult {
                    id: format!("{}:{}:{}", doc.path, line, entry.symbol.name),
                    file_path: doc.path.clone(),
                    result_type: ResultType::Symbol,
                    score,
                    highlights,
                    preview: entry.context.clone(),
                    line_number: Some(line),
                    column_number: Some(entry.symbol.column),
                    metadata,
                },
            });
        }
    }
    hits
}

fn module_hits(store: &IndexStore, intent: &QueryIntent) -> Vec<Hit> {
    let mut hits = Vec::new();

    for (module, paths) in store.module_entries() {
        if !intent.name_matches(module) {
            continue;
        }
        for path in paths {
            let Some(doc) = store.get(path) else {
                continue;
            };
            let Some(analysis) = &doc.analysis else {
                continue;
            };
            for import in analysis.imports() {
                if import.module.to_lowercase() != module {
                    continue;
                }
                let mut score = IMPORT_BASE_SCORE;
                if intent.terms.iter().any(|t| t == module) {
                    score += EXACT_NAME_BONUS;
                }
                hits.push(record_hit(
                    doc,
                    ResultType::Import,
                    format!("{}:{}:import:{}", doc.path, import.line, import.module),
                    score,
                    import.line,
                    module,
                ));
            }
        }
    }

    for doc in store.documents() {
        let Some(analysis) = &doc.analysis else {
            continue;
        };
        for export in analysis.exports() {
            let name = export.name.to_lowercase();
            if intent.terms.is_empty() || !intent.name_matches(&name) {
                continue;
            }
            hits.push(record_hit(
                doc,
                ResultType::Export,
                format!("{}:{}:export:{}", doc.path, export.line, export.name),
                EXPORT_BASE_SCORE,
                export.line,
                &name,
            ));
        }
    }

    hits
}

fn record_hit(
    doc: &Document,
    result_type: ResultType,
    id: String,
    score: f64,
    line: usize,
    needle: &str,
) -> Hit {
    let highlight = line_highlight(doc, line, needle);
    let column_number = highlight.as_ref().map(|h| h.start + 1);
    Hit {
        order: (doc.order(), line),
        result: SearchResult {
            id,
            file_path: doc.path.clone(),
            result_type,
            score,
            preview: truncate(doc.line(line).unwrap_or_default().trim()),
            highlights: highlight.into_iter().collect(),
            line_number: Some(line),
            column_number,
            metadata: metadata_for(doc),
        },
    }
}

/// Highlight of `needle` (lower-case) on 1-indexed `line`, if it occurs there.
fn line_highlight(doc: &Document, line: usize, needle: &str) -> Option<super::Highlight> {
    let text = doc.line(line)?;
    let start = text.to_ascii_lowercase().find(needle)?;
    let mut highlight = highlight_span(text, start, start + needle.len());
    highlight.line = line;
    Some(highlight)
}
