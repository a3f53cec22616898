//! Integration tests for Codelens core: disk workspace, pipeline, snapshots.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;

use codelens_core::{CodelensConfig, MemoryContentSource, PathState, Workspace};
use codelens_indexer::{
    ChangeEvent, ChangeEventKind, ResultType, SearchMode, SearchQuery, TreeSitterProducer,
};

fn create_test_project(base: &Path) -> PathBuf {
    let project = base.join("project");
    let src = project.join("src");
    std::fs::create_dir_all(src.join("util")).unwrap();

    std::fs::write(
        src.join("auth.ts"),
        r#"import { hash } from './util/crypto';

export function login(user: string, password: string) {
    if (!user) {
        return false;
    }
    return hash(password) === user;
}
"#,
    )
    .unwrap();
    std::fs::write(
        src.join("util/crypto.ts"),
        "export function hash(value: string): string {\n    return value;\n}\n",
    )
    .unwrap();
    std::fs::write(
        src.join("main.py"),
        "from auth import login\n\ndef main():\n    login()\n",
    )
    .unwrap();
    std::fs::write(project.join("logo.bin"), "not indexed").unwrap();

    project
}

#[tokio::test]
async fn test_index_search_and_report() {
    let temp_dir = tempdir().unwrap();
    let project = create_test_project(temp_dir.path());
    let workspace = Workspace::open(&project, CodelensConfig::default()).unwrap();

    let indexed = workspace.index_all().await.unwrap();
    assert_eq!(indexed, 3);
    workspace.verify_consistency().unwrap();

    let results = workspace.search(&SearchQuery::full_text("login"));
    let paths: Vec<_> = results.iter().map(|r| r.file_path.as_str()).collect();
    assert!(paths.contains(&"src/auth.ts"));
    assert!(paths.contains(&"src/main.py"));

    let symbols = workspace.search(&SearchQuery::new("function hash", SearchMode::Semantic));
    assert!(symbols
        .iter()
        .any(|r| r.result_type == ResultType::Symbol && r.file_path == "src/util/crypto.ts"));

    let metrics = workspace.file_metrics("src/util/crypto.ts").unwrap();
    assert_eq!(metrics.dependents, vec!["src/auth.ts".to_string()]);

    let report = workspace.generate_report();
    assert_eq!(report.summary.total_files, 3);
    assert!(report.summary.total_dependencies >= 1);
    assert!(report.is_consistent());
}

#[tokio::test]
async fn test_deleting_from_disk_updates_index() {
    let temp_dir = tempdir().unwrap();
    let project = create_test_project(temp_dir.path());
    let workspace = Workspace::open(&project, CodelensConfig::default()).unwrap();
    workspace.index_all().await.unwrap();

    std::fs::remove_dir_all(project.join("src/util")).unwrap();
    workspace
        .pipeline()
        .handle_event(ChangeEvent::relative(
            ChangeEventKind::DirectoryDeleted,
            "src/util",
        ))
        .await
        .unwrap();

    assert_eq!(workspace.stats().documents, 2);
    assert!(workspace
        .search(&SearchQuery::full_text("hash"))
        .iter()
        .all(|r| r.file_path != "src/util/crypto.ts"));
    assert!(workspace.file_metrics("src/util/crypto.ts").is_err());
    workspace.verify_consistency().unwrap();
}

#[tokio::test]
async fn test_snapshot_reimport() {
    let temp_dir = tempdir().unwrap();
    let project = create_test_project(temp_dir.path());
    let workspace = Workspace::open(&project, CodelensConfig::default()).unwrap();
    workspace.index_all().await.unwrap();

    let snapshot_path = temp_dir.path().join("out/index.msgpack");
    workspace.save_snapshot(&snapshot_path).await.unwrap();

    let restored = Workspace::open(&project, CodelensConfig::default()).unwrap();
    assert_eq!(restored.import_snapshot(&snapshot_path).await.unwrap(), 3);
    restored.pipeline().drain().await;

    assert_eq!(restored.stats().documents, 3);
    assert_eq!(
        restored.pipeline().path_state("src/auth.ts"),
        Some(PathState::Indexed)
    );
}

#[tokio::test]
async fn test_memory_workspace_after_shutdown() {
    let source = Arc::new(MemoryContentSource::new());
    source.insert("lib.rs", "pub fn parse() {}");
    let workspace = Workspace::new(
        CodelensConfig::default(),
        source,
        Arc::new(TreeSitterProducer::new()),
    );
    workspace.pipeline().enqueue_paths(["lib.rs"]).unwrap();
    workspace.pipeline().drain().await;

    workspace.shutdown();
    assert!(workspace
        .pipeline()
        .handle_event(ChangeEvent::relative(ChangeEventKind::FileModified, "lib.rs"))
        .await
        .is_err());
    assert_eq!(workspace.search(&SearchQuery::full_text("parse")).len(), 1);
}
