//! Integration tests for the Codelens indexer: walk, analyze, index, query.

use std::path::{Path, PathBuf};
use tempfile::tempdir;

use codelens_indexer::query::NumericRange;
use codelens_indexer::{
    AnalysisProducer, IndexSnapshot, IndexStore, QueryEngine, ResultType, SearchFilters,
    SearchMode, SearchQuery, SymbolKind, TreeSitterProducer, Walker,
};

fn create_test_project(base: &Path) -> PathBuf {
    let project = base.join("test_project");
    let src = project.join("src");
    std::fs::create_dir_all(&src).unwrap();

    std::fs::write(
        src.join("auth.ts"),
        r#"import { hash } from './crypto';

export function login(user: string, password: string) {
    if (!user || !password) {
        return false;
    }
    return hash(password) === user;
}

export function logout() {}
"#,
    )
    .unwrap();

    std::fs::write(
        src.join("crypto.ts"),
        r#"export function hash(value: string): string {
    return value;
}
"#,
    )
    .unwrap();

    std::fs::write(
        src.join("lib.rs"),
        r#"pub struct Session {
    user: String,
}

impl Session {
    pub fn login(&self) -> bool {
        true
    }
}
"#,
    )
    .unwrap();

    std::fs::write(project.join("README.md"), "# Test project\nlogin docs\n").unwrap();

    project
}

fn build_index(project: &Path) -> IndexStore {
    build_index_passes(project, 1)
}

/// Index every file `passes` times with identical content.
fn build_index_passes(project: &Path, passes: usize) -> IndexStore {
    let producer = TreeSitterProducer::new();
    let mut store = IndexStore::new();
    for _ in 0..passes {
        for entry in Walker::new(project, false).walk().unwrap() {
            let content = std::fs::read_to_string(&entry.path).unwrap();
            let analysis = producer.analyze(&entry.relative_path, &content).unwrap();
            store.index_document(&entry.relative_path, &content, Some(analysis));
        }
    }
    store
}

type ResultKey = (String, String, ResultType, f64, Option<usize>, String);

fn result_keys(engine: &QueryEngine, store: &IndexStore, query: &SearchQuery) -> Vec<ResultKey> {
    engine
        .search(store, query)
        .into_iter()
        .map(|r| (r.id, r.file_path, r.result_type, r.score, r.line_number, r.preview))
        .collect()
}

#[test]
fn test_walk_and_index_project() {
    let temp_dir = tempdir().unwrap();
    let project = create_test_project(temp_dir.path());
    let store = build_index(&project);

    assert_eq!(store.len(), 4);
    assert!(store.contains("src/auth.ts"));
    store.verify_consistency().unwrap();

    let stats = store.stats();
    assert!(stats.symbols >= 4);
    assert!(stats.modules >= 1);
}

#[test]
fn test_full_text_and_fuzzy_over_project() {
    let temp_dir = tempdir().unwrap();
    let store = build_index(&create_test_project(temp_dir.path()));
    let engine = QueryEngine::default();

    let results = engine.search(&store, &SearchQuery::full_text("password"));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].file_path, "src/auth.ts");
    assert!(results[0].score > 0.0);

    let results = engine.search(&store, &SearchQuery::new("pasword", SearchMode::Fuzzy));
    assert_eq!(results[0].file_path, "src/auth.ts");
}

#[test]
fn test_semantic_finds_functions_across_languages() {
    let temp_dir = tempdir().unwrap();
    let store = build_index(&create_test_project(temp_dir.path()));
    let engine = QueryEngine::default();

    let results = engine.search(&store, &SearchQuery::new("function login", SearchMode::Semantic));
    let paths: Vec<_> = results.iter().map(|r| r.file_path.as_str()).collect();
    assert!(paths.contains(&"src/auth.ts"));
    assert!(paths.contains(&"src/lib.rs"));
    assert!(results.iter().all(|r| r.result_type == ResultType::Symbol));
    assert!(results
        .iter()
        .all(|r| r.metadata.symbol_kind == Some(SymbolKind::Function)));
}

#[test]
fn test_language_and_complexity_filters() {
    let temp_dir = tempdir().unwrap();
    let store = build_index(&create_test_project(temp_dir.path()));
    let engine = QueryEngine::default();

    let query = SearchQuery::full_text("login").with_filters(SearchFilters {
        languages: vec!["rust".to_string()],
        ..Default::default()
    });
    let results = engine.search(&store, &query);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].file_path, "src/lib.rs");

    let query = SearchQuery::full_text("login").with_filters(SearchFilters {
        complexity: Some(NumericRange {
            min: Some(3),
            max: None,
        }),
        ..Default::default()
    });
    let results = engine.search(&store, &query);
    assert!(results.iter().all(|r| r.metadata.complexity.unwrap_or(0) >= 3));
    assert!(results.iter().any(|r| r.file_path == "src/auth.ts"));
}

#[test]
fn test_reindex_after_edit_and_delete() {
    let temp_dir = tempdir().unwrap();
    let project = create_test_project(temp_dir.path());
    let mut store = build_index(&project);
    let engine = QueryEngine::default();

    store.index_document("src/crypto.ts", "export function digest() {}", None);
    assert!(engine
        .search(&store, &SearchQuery::full_text("hash"))
        .iter()
        .all(|r| r.file_path != "src/crypto.ts"));

    let removed = store.remove_prefix("src");
    assert_eq!(removed.len(), 3);
    assert_eq!(store.len(), 1);
    store.verify_consistency().unwrap();
}

#[test]
fn test_reindexing_identical_content_is_idempotent() {
    let temp_dir = tempdir().unwrap();
    let project = create_test_project(temp_dir.path());
    let once = build_index_passes(&project, 1);
    let twice = build_index_passes(&project, 2);

    twice.verify_consistency().unwrap();
    assert_eq!(once.stats(), twice.stats());
    assert_eq!(once.len(), twice.len());

    let vocabulary: Vec<&str> = once.vocabulary().collect();
    assert_eq!(vocabulary, twice.vocabulary().collect::<Vec<_>>());
    for token in &vocabulary {
        assert_eq!(once.postings(token), twice.postings(token), "postings for {}", token);
    }
    assert!(once.symbol_entries().eq(twice.symbol_entries()));
    assert!(once.module_entries().eq(twice.module_entries()));

    let engine = QueryEngine::default();
    let queries = [
        SearchQuery::full_text("login"),
        SearchQuery::new("lagin", SearchMode::Fuzzy),
        SearchQuery::new("function login", SearchMode::Semantic),
        SearchQuery::new("import crypto", SearchMode::Semantic),
        SearchQuery::new("fn \\w+", SearchMode::Regex),
        SearchQuery::new("password", SearchMode::Exact),
    ];
    for query in &queries {
        let expected = result_keys(&engine, &once, query);
        assert_eq!(expected, result_keys(&engine, &twice, query), "query {:?}", query.text);
    }
    assert!(!result_keys(&engine, &twice, &queries[0]).is_empty());
}

#[tokio::test]
async fn test_snapshot_drives_reindex() {
    let temp_dir = tempdir().unwrap();
    let project = create_test_project(temp_dir.path());
    let store = build_index(&project);

    let path = temp_dir.path().join("snapshots/index.msgpack");
    store.export_snapshot().save(&path).await.unwrap();
    let snapshot = IndexSnapshot::load(&path).await.unwrap();

    let mut rebuilt = IndexStore::new();
    for rel in snapshot.paths() {
        let content = std::fs::read_to_string(project.join(rel)).unwrap();
        rebuilt.index_document(rel, &content, None);
    }
    assert_eq!(rebuilt.len(), store.len());
    assert_eq!(rebuilt.stats().tokens, store.stats().tokens);
}
