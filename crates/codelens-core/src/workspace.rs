//! A workspace ties one index store, query engine, analytics engine and
//! pipeline together over a content source.

use crate::config::CodelensConfig;
use crate::error::CoreError;
use crate::metrics::Metrics;
use crate::pipeline::IncrementalPipeline;
use crate::source::{ContentSource, FsContentSource};
use codelens_analytics::{AnalyticsEngine, AnalyticsReport, FileMetrics};
use codelens_indexer::query::HistoryEntry;
use codelens_indexer::{
    AnalysisProducer, IndexSnapshot, IndexStats, IndexStore, QueryEngine, SavedQuery, SearchQuery,
    SearchResult, TreeSitterProducer, Walker,
};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Files larger than this are skipped by the initial walk.
const MAX_INDEXED_FILE_SIZE: u64 = 1024 * 1024;

pub struct Workspace {
    root: Option<PathBuf>,
    config: CodelensConfig,
    store: Arc<RwLock<IndexStore>>,
    analytics: Arc<Mutex<AnalyticsEngine>>,
    engine: QueryEngine,
    pipeline: IncrementalPipeline,
    metrics: Arc<Metrics>,
}

impl Workspace {
    /// Build a workspace over an arbitrary content source. No walk is
    /// possible without a root, so paths must arrive as change events.
    pub fn new(
        config: CodelensConfig,
        source: Arc<dyn ContentSource>,
        producer: Arc<dyn AnalysisProducer>,
    ) -> Self {
        let store = Arc::new(RwLock::new(IndexStore::new()));
        let analytics = Arc::new(Mutex::new(AnalyticsEngine::new(config.analytics.options())));
        let metrics = Arc::new(Metrics::new());
        let pipeline = IncrementalPipeline::new(
            &config.pipeline,
            Arc::clone(&store),
            Arc::clone(&analytics),
            producer,
            source,
            Arc::clone(&metrics),
        );

        Self {
            root: None,
            engine: QueryEngine::new(config.search.engine_options()),
            config,
            store,
            analytics,
            pipeline,
            metrics,
        }
    }

    /// Open a directory on disk with the tree-sitter producer.
    pub fn open(root: &Path, config: CodelensConfig) -> Result<Self, CoreError> {
        if !root.is_dir() {
            return Err(CoreError::NotFound(root.display().to_string()));
        }
        let root = root.canonicalize()?;
        let source = Arc::new(FsContentSource::new(&root));
        let mut workspace = Self::new(config, source, Arc::new(TreeSitterProducer::new()));
        workspace.root = Some(root);
        Ok(workspace)
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn config(&self) -> &CodelensConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &IncrementalPipeline {
        &self.pipeline
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Walk the root, queue every source file and flush until done.
    pub async fn index_all(&self) -> Result<usize, CoreError> {
        let root = self
            .root
            .as_deref()
            .ok_or_else(|| CoreError::NotFound("workspace root".to_string()))?;

        let started = Instant::now();
        let entries = Walker::new(root, false)
            .max_file_size(MAX_INDEXED_FILE_SIZE)
            .source_only(true)
            .walk()?;
        self.pipeline
            .enqueue_paths(entries.iter().map(|e| e.relative_path.as_str()))?;
        self.pipeline.drain().await;

        let indexed = self.store.read().len();
        info!(
            root = ?root,
            files = entries.len(),
            indexed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Indexed workspace"
        );
        Ok(indexed)
    }

    pub fn search(&self, query: &SearchQuery) -> Vec<SearchResult> {
        let started = Instant::now();
        let results = {
            let store = self.store.read();
            self.engine.search(&store, query)
        };
        self.metrics.record_search(started.elapsed());
        results
    }

    pub fn suggestions(&self, partial: &str) -> Vec<String> {
        let store = self.store.read();
        self.engine.suggestions(&store, partial)
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.engine.history()
    }

    pub fn clear_history(&self) {
        self.engine.clear_history();
    }

    pub fn save_query(&self, name: &str, query: SearchQuery) -> SavedQuery {
        self.engine.save_query(name, query)
    }

    pub fn execute_saved(&self, name: &str) -> Result<Vec<SearchResult>, CoreError> {
        let started = Instant::now();
        let results = {
            let store = self.store.read();
            self.engine.execute_saved(&store, name)?
        };
        self.metrics.record_search(started.elapsed());
        Ok(results)
    }

    pub fn delete_saved(&self, name: &str) -> bool {
        self.engine.delete_saved(name)
    }

    pub fn saved_queries(&self) -> Vec<SavedQuery> {
        self.engine.saved_queries()
    }

    pub fn generate_report(&self) -> AnalyticsReport {
        self.analytics.lock().generate_report()
    }

    pub fn file_metrics(&self, path: &str) -> Result<FileMetrics, CoreError> {
        Ok(self.analytics.lock().file_metrics(path)?)
    }

    pub fn stats(&self) -> IndexStats {
        self.store.read().stats()
    }

    pub fn verify_consistency(&self) -> Result<(), CoreError> {
        Ok(self.store.read().verify_consistency()?)
    }

    /// Drop everything and re-index the paths that were indexed, for use
    /// after a failed consistency check.
    pub async fn rebuild(&self) -> Result<usize, CoreError> {
        let snapshot = {
            let mut store = self.store.write();
            let snapshot = store.export_snapshot();
            store.clear();
            snapshot
        };
        self.analytics.lock().reset();
        warn!(documents = snapshot.documents.len(), "Rebuilding index");

        let queued = self.pipeline.enqueue_snapshot(&snapshot)?;
        self.pipeline.drain().await;
        Ok(queued)
    }

    pub fn export_snapshot(&self) -> IndexSnapshot {
        self.store.read().export_snapshot()
    }

    pub async fn save_snapshot(&self, path: &Path) -> Result<(), CoreError> {
        let snapshot = self.export_snapshot();
        snapshot.save(path).await?;
        Ok(())
    }

    /// Load a snapshot and queue its paths for re-index. Returns the number
    /// queued; call [`IncrementalPipeline::drain`] to wait for them.
    pub async fn import_snapshot(&self, path: &Path) -> Result<usize, CoreError> {
        let snapshot = IndexSnapshot::load(path).await?;
        let queued = self.pipeline.enqueue_snapshot(&snapshot)?;
        info!(path = ?path, queued, "Imported snapshot");
        Ok(queued)
    }

    /// Stop the pipeline. Searches keep working on the current index.
    pub fn shutdown(&self) {
        self.pipeline.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryContentSource;
    use codelens_indexer::{ChangeEvent, ChangeEventKind, SearchMode};
    use tempfile::tempdir;

    fn memory_workspace() -> (Workspace, Arc<MemoryContentSource>) {
        let source = Arc::new(MemoryContentSource::new());
        let workspace = Workspace::new(
            CodelensConfig::default(),
            source.clone(),
            Arc::new(TreeSitterProducer::new()),
        );
        (workspace, source)
    }

    #[tokio::test]
    async fn test_search_records_metrics() {
        let (workspace, source) = memory_workspace();
        source.insert("src/auth.ts", "export function login(user: string) {}");
        workspace
            .pipeline()
            .handle_event(ChangeEvent::relative(ChangeEventKind::FileCreated, "src/auth.ts"))
            .await
            .unwrap();
        workspace.pipeline().drain().await;

        let results = workspace.search(&SearchQuery::full_text("login"));
        assert_eq!(results[0].file_path, "src/auth.ts");
        assert_eq!(workspace.metrics().snapshot().searches_total, 1);
        assert_eq!(workspace.history().len(), 1);
    }

    #[tokio::test]
    async fn test_saved_query_not_found() {
        let (workspace, _) = memory_workspace();
        assert!(matches!(
            workspace.execute_saved("nightly"),
            Err(CoreError::Indexer(_))
        ));

        workspace.save_query("todos", SearchQuery::new("TODO", SearchMode::Exact));
        assert!(workspace.execute_saved("todos").unwrap().is_empty());
        assert_eq!(workspace.saved_queries()[0].use_count, 1);
    }

    #[tokio::test]
    async fn test_file_metrics_for_unknown_file() {
        let (workspace, _) = memory_workspace();
        assert!(matches!(
            workspace.file_metrics("nope.rs"),
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rebuild_restores_documents() {
        let (workspace, source) = memory_workspace();
        source.insert("a.py", "def handler(): pass");
        source.insert("b.py", "import a");
        workspace.pipeline().enqueue_paths(["a.py", "b.py"]).unwrap();
        workspace.pipeline().drain().await;

        assert_eq!(workspace.rebuild().await.unwrap(), 2);
        assert_eq!(workspace.stats().documents, 2);
        workspace.verify_consistency().unwrap();
        assert_eq!(workspace.generate_report().summary.total_files, 2);
    }

    #[test]
    fn test_open_rejects_missing_root() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("missing");
        assert!(matches!(
            Workspace::open(&missing, CodelensConfig::default()),
            Err(CoreError::NotFound(_))
        ));
    }
}
