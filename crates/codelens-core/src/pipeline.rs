//! Incremental indexing pipeline.
//!
//! Change events queue paths; a debounce timer schedules a flush; each flush
//! indexes a bounded slice of the queue and reschedules itself while work
//! remains. Deletes bypass the queue and apply immediately.
//!
//! Lock order is always state, then store, then analytics.

use crate::config::PipelineConfig;
use crate::error::CoreError;
use crate::metrics::Metrics;
use crate::source::ContentSource;
use chrono::{DateTime, Utc};
use codelens_analytics::AnalyticsEngine;
use codelens_indexer::store::normalize_path;
use codelens_indexer::{
    AnalysisProducer, ChangeEvent, ChangeEventKind, FileAnalysis, IndexSnapshot, IndexStore,
    IndexerError,
};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Errors kept in the progress snapshot.
const MAX_ERRORS: usize = 100;

/// Lifecycle of a path handed to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathState {
    Queued,
    Indexing,
    Indexed,
    Failed,
}

/// A per-item failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineError {
    /// Empty for failures reported by the change source itself
    pub path: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Pull-based view of pipeline state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineProgress {
    pub queued: usize,
    pub in_flight: usize,
    /// Files indexed since the pipeline was created
    pub indexed: u64,
    pub failed: usize,
    /// Most recent failures, oldest first
    pub errors: Vec<PipelineError>,
    pub flushes: u64,
    pub is_flushing: bool,
    pub is_stopped: bool,
}

/// Handle returned by [`IncrementalPipeline::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ProgressCallback = Arc<dyn Fn(&PipelineProgress) + Send + Sync>;

enum IndexOutcome {
    Indexed,
    /// Content identical to what is already indexed
    Unchanged,
    /// A newer event or a delete replaced this path while it was in flight
    Superseded,
}

#[derive(Default)]
struct State {
    queue: VecDeque<String>,
    kinds: HashMap<String, Option<ChangeEventKind>>,
    cached: HashMap<String, FileAnalysis>,
    states: HashMap<String, PathState>,
    indexed: u64,
    errors: VecDeque<PipelineError>,
    flushes: u64,
    flushing: bool,
    stopped: bool,
    timer: Option<JoinHandle<()>>,
}

impl State {
    fn record_error(&mut self, path: &str, message: String) {
        self.errors.push_back(PipelineError {
            path: path.to_string(),
            message,
            timestamp: Utc::now(),
        });
        while self.errors.len() > MAX_ERRORS {
            self.errors.pop_front();
        }
    }

    fn is_idle(&self) -> bool {
        self.stopped || (self.queue.is_empty() && !self.flushing)
    }

    fn progress(&self) -> PipelineProgress {
        let count = |wanted: PathState| self.states.values().filter(|s| **s == wanted).count();
        PipelineProgress {
            queued: self.queue.len(),
            in_flight: count(PathState::Indexing),
            indexed: self.indexed,
            failed: count(PathState::Failed),
            errors: self.errors.iter().cloned().collect(),
            flushes: self.flushes,
            is_flushing: self.flushing,
            is_stopped: self.stopped,
        }
    }
}

struct Inner {
    store: Arc<RwLock<IndexStore>>,
    analytics: Arc<Mutex<AnalyticsEngine>>,
    producer: Arc<dyn AnalysisProducer>,
    source: Arc<dyn ContentSource>,
    metrics: Arc<Metrics>,
    batch_size: usize,
    debounce: Duration,
    state: Mutex<State>,
    subscribers: Mutex<Vec<(SubscriptionId, ProgressCallback)>>,
    next_subscription: AtomicU64,
    idle: Notify,
}

/// Drives the index store and analytics engine from change events.
///
/// Cloning yields another handle to the same pipeline. Methods that may
/// schedule a flush must run inside a Tokio runtime.
#[derive(Clone)]
pub struct IncrementalPipeline {
    inner: Arc<Inner>,
}

impl IncrementalPipeline {
    pub fn new(
        config: &PipelineConfig,
        store: Arc<RwLock<IndexStore>>,
        analytics: Arc<Mutex<AnalyticsEngine>>,
        producer: Arc<dyn AnalysisProducer>,
        source: Arc<dyn ContentSource>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                analytics,
                producer,
                source,
                metrics,
                batch_size: config.batch_size.max(1),
                debounce: config.debounce(),
                state: Mutex::new(State::default()),
                subscribers: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
                idle: Notify::new(),
            }),
        }
    }

    /// Apply one change notification.
    pub async fn handle_event(&self, event: ChangeEvent) -> Result<(), CoreError> {
        if self.is_stopped() {
            return Err(CoreError::PipelineStopped);
        }
        let path = normalize_path(&event.relative_path);

        match event.kind {
            ChangeEventKind::FileCreated
            | ChangeEventKind::FileModified
            | ChangeEventKind::AnalysisComplete => {
                self.enqueue(&path, Some(event.kind), event.analysis);
            }
            ChangeEventKind::FileDeleted => self.remove_file(&path),
            ChangeEventKind::DirectoryDeleted => self.remove_directory(&path),
            ChangeEventKind::DirectoryCreated => {
                debug!(path = %path, "Directory created; waiting for file events");
            }
            ChangeEventKind::Error => {
                let message = event
                    .message
                    .unwrap_or_else(|| "unknown change source error".to_string());
                warn!(error = %message, "Change source reported an error");
                self.inner.state.lock().record_error("", message);
                self.publish();
            }
        }
        Ok(())
    }

    /// Queue paths for indexing without a change event, e.g. an initial
    /// full index. Returns the number queued.
    pub fn enqueue_paths<I, S>(&self, paths: I) -> Result<usize, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.is_stopped() {
            return Err(CoreError::PipelineStopped);
        }
        let mut count = 0;
        for path in paths {
            self.enqueue(&normalize_path(path.as_ref()), None, None);
            count += 1;
        }
        Ok(count)
    }

    /// Queue every path recorded in a snapshot for re-index.
    pub fn enqueue_snapshot(&self, snapshot: &IndexSnapshot) -> Result<usize, CoreError> {
        self.enqueue_paths(snapshot.paths())
    }

    fn enqueue(&self, path: &str, kind: Option<ChangeEventKind>, analysis: Option<FileAnalysis>) {
        {
            let mut state = self.inner.state.lock();
            if !state.queue.iter().any(|p| p == path) {
                state.queue.push_back(path.to_string());
            }
            state.states.insert(path.to_string(), PathState::Queued);

            // A content change outranks a later analysis-only notification
            let entry = state.kinds.entry(path.to_string()).or_insert(None);
            let keep = entry.is_some_and(|k| k.is_content_change());
            if !keep {
                *entry = kind;
            }
            if let Some(analysis) = analysis {
                state.cached.insert(path.to_string(), analysis);
            }
            debug!(path = %path, queued = state.queue.len(), "Queued path");

            self.schedule_locked(&mut state);
        }
        self.publish();
    }

    fn remove_file(&self, path: &str) {
        let mut state = self.inner.state.lock();
        forget_queued(&mut state, |p| p == path);

        let removed = self.inner.store.write().remove_document(path);
        if removed {
            self.inner.analytics.lock().forget_file(path);
            self.inner.metrics.record_removed(1);
            info!(path = %path, "Removed deleted file");
        } else {
            // Some platforms report a removed directory as a plain remove
            self.remove_directory_locked(&mut state, path);
        }
        self.notify_if_idle(&state);
        drop(state);
        self.publish();
    }

    fn remove_directory(&self, dir: &str) {
        let mut state = self.inner.state.lock();
        self.remove_directory_locked(&mut state, dir);
        self.notify_if_idle(&state);
        drop(state);
        self.publish();
    }

    /// Wake idle waiters once a delete or an empty flush leaves nothing to do.
    fn notify_if_idle(&self, state: &State) {
        if state.is_idle() {
            self.inner.idle.notify_waiters();
        }
    }

    fn remove_directory_locked(&self, state: &mut State, dir: &str) {
        let prefix = format!("{}/", dir);
        forget_queued(state, |p| p == dir || p.starts_with(&prefix));

        let removed = self.inner.store.write().remove_prefix(dir);
        self.inner.analytics.lock().forget_prefix(dir);
        if !removed.is_empty() {
            self.inner.metrics.record_removed(removed.len());
        }
    }

    /// Start the debounce timer unless one is pending or a flush is running.
    fn schedule_locked(&self, state: &mut State) {
        if state.stopped || state.flushing || state.timer.is_some() || state.queue.is_empty() {
            return;
        }
        let pipeline = self.clone();
        let delay = self.inner.debounce;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            pipeline.flush().await;
        }));
    }

    /// Index up to one batch of queued paths. Returns how many were
    /// processed; zero when another flush is running or the pipeline is
    /// stopped.
    pub async fn flush(&self) -> usize {
        let batch: Vec<(String, Option<ChangeEventKind>, Option<FileAnalysis>)> = {
            let mut state = self.inner.state.lock();
            // Dropping the handle detaches the task; it is never aborted mid-flush
            state.timer = None;
            if state.flushing || state.stopped || state.queue.is_empty() {
                self.notify_if_idle(&state);
                return 0;
            }
            state.flushing = true;

            let take = self.inner.batch_size.min(state.queue.len());
            let paths: Vec<String> = state.queue.drain(..take).collect();
            paths
                .into_iter()
                .map(|path| {
                    state.states.insert(path.clone(), PathState::Indexing);
                    let kind = state.kinds.remove(&path).flatten();
                    let analysis = state.cached.remove(&path);
                    (path, kind, analysis)
                })
                .collect()
        };

        let started = Instant::now();
        let mut guard = FlushGuard {
            inner: Arc::clone(&self.inner),
            in_flight: batch.iter().map(|(p, _, _)| p.clone()).collect(),
        };
        let (mut indexed, mut unchanged, mut failed) = (0usize, 0usize, 0usize);

        for (path, kind, analysis) in batch {
            if self.is_stopped() {
                break;
            }
            match self.index_one(&path, kind, analysis).await {
                Ok(IndexOutcome::Indexed) => indexed += 1,
                Ok(IndexOutcome::Unchanged) => unchanged += 1,
                Ok(IndexOutcome::Superseded) => {}
                Err(e) => {
                    failed += 1;
                    warn!(path = %path, error = %e, "Failed to index file");
                    self.inner.metrics.record_failure();
                    let mut state = self.inner.state.lock();
                    if state.states.get(&path) == Some(&PathState::Indexing) {
                        state.states.insert(path.clone(), PathState::Failed);
                    }
                    state.record_error(&path, e.to_string());
                }
            }
            guard.in_flight.retain(|p| *p != path);
        }
        drop(guard);

        let elapsed = started.elapsed();
        self.inner.metrics.record_flush(elapsed);
        {
            let mut state = self.inner.state.lock();
            state.flushes += 1;
            if state.queue.is_empty() || state.stopped {
                self.inner.idle.notify_waiters();
            } else {
                self.schedule_locked(&mut state);
            }
            info!(
                indexed,
                unchanged,
                failed,
                remaining = state.queue.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Flushed batch"
            );
        }
        self.publish();

        indexed + unchanged + failed
    }

    async fn index_one(
        &self,
        path: &str,
        kind: Option<ChangeEventKind>,
        cached: Option<FileAnalysis>,
    ) -> Result<IndexOutcome, IndexerError> {
        let file = self.inner.source.read(path).await?;
        let forced = cached.is_some();

        let mut analysis = match cached {
            Some(analysis) => analysis,
            None => {
                let mut analysis = self.inner.producer.analyze(path, &file.content)?;
                if let Some(modified) = file.modified {
                    analysis.last_modified = modified;
                }
                analysis
            }
        };
        analysis.path = path.to_string();

        let mut state = self.inner.state.lock();
        if state.states.get(path) != Some(&PathState::Indexing) {
            debug!(path = %path, "Skipping superseded path");
            return Ok(IndexOutcome::Superseded);
        }

        let outcome = {
            let mut store = self.inner.store.write();
            if !forced && store.is_current(path, &file.content) {
                IndexOutcome::Unchanged
            } else {
                store.index_document(path, &file.content, Some(analysis.clone()));
                IndexOutcome::Indexed
            }
        };
        match outcome {
            IndexOutcome::Indexed => {
                self.inner
                    .analytics
                    .lock()
                    .process_file_analysis(&analysis, kind);
                self.inner.metrics.record_indexed();
            }
            // Identical content still counts as an observed change
            IndexOutcome::Unchanged if kind.is_some_and(|k| k.is_content_change()) => {
                self.inner.analytics.lock().record_change(path);
            }
            _ => {}
        }

        state.states.insert(path.to_string(), PathState::Indexed);
        state.indexed += 1;
        Ok(outcome)
    }

    /// Flush repeatedly until the queue is empty. Returns paths processed.
    pub async fn drain(&self) -> usize {
        let mut total = 0;
        loop {
            {
                let state = self.inner.state.lock();
                if state.stopped || (state.queue.is_empty() && !state.flushing) {
                    break;
                }
            }
            let processed = self.flush().await;
            if processed == 0 {
                // Another flush holds the batch; let it finish
                self.wait_until_idle().await;
            }
            total += processed;
        }
        total
    }

    /// Wait until the queue is empty and no flush is running, or the
    /// pipeline is stopped.
    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.state.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Cancel any pending timer and refuse further work. Queued paths stay
    /// queued; the store keeps whatever the last completed mutation left.
    pub fn stop(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            info!(queued = state.queue.len(), "Pipeline stopped");
        }
        self.inner.idle.notify_waiters();
        self.publish();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.state.lock().stopped
    }

    pub fn progress(&self) -> PipelineProgress {
        self.inner.state.lock().progress()
    }

    pub fn path_state(&self, path: &str) -> Option<PathState> {
        self.inner.state.lock().states.get(&normalize_path(path)).copied()
    }

    /// Register a callback run after every queue change and flush.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PipelineProgress) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.inner.subscribers.lock().push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    fn publish(&self) {
        let callbacks: Vec<ProgressCallback> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        if callbacks.is_empty() {
            return;
        }
        let progress = self.progress();
        for callback in callbacks {
            callback(&progress);
        }
    }
}

/// Drop queue entries and per-path state for paths matching `doomed`.
fn forget_queued(state: &mut State, doomed: impl Fn(&str) -> bool) {
    state.queue.retain(|p| !doomed(p));
    state.kinds.retain(|p, _| !doomed(p));
    state.cached.retain(|p, _| !doomed(p));
    state.states.retain(|p, _| !doomed(p));
}

/// Restores queue state if a flush is cancelled part-way.
struct FlushGuard {
    inner: Arc<Inner>,
    in_flight: Vec<String>,
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        state.flushing = false;
        for path in self.in_flight.drain(..).rev() {
            if state.states.get(&path) == Some(&PathState::Indexing) {
                state.states.insert(path.clone(), PathState::Queued);
                if !state.queue.iter().any(|p| *p == path) {
                    state.queue.push_front(path);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryContentSource;
    use codelens_indexer::{Language, TreeSitterProducer};
    use std::sync::atomic::AtomicUsize;

    struct Harness {
        pipeline: IncrementalPipeline,
        store: Arc<RwLock<IndexStore>>,
        analytics: Arc<Mutex<AnalyticsEngine>>,
        source: Arc<MemoryContentSource>,
    }

    fn harness(batch_size: usize) -> Harness {
        let store = Arc::new(RwLock::new(IndexStore::new()));
        let analytics = Arc::new(Mutex::new(AnalyticsEngine::default()));
        let source = Arc::new(MemoryContentSource::new());
        let config = PipelineConfig {
            batch_size,
            debounce_ms: 300,
        };
        let pipeline = IncrementalPipeline::new(
            &config,
            Arc::clone(&store),
            Arc::clone(&analytics),
            Arc::new(TreeSitterProducer::new()),
            source.clone(),
            Arc::new(Metrics::new()),
        );
        Harness {
            pipeline,
            store,
            analytics,
            source,
        }
    }

    fn created(path: &str) -> ChangeEvent {
        ChangeEvent::relative(ChangeEventKind::FileCreated, path)
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_until_queue_empty() {
        let h = harness(10);
        for i in 0..25 {
            let path = format!("src/file{}.ts", i);
            h.source.insert(&path, format!("export const value{} = {};", i, i));
            h.pipeline.handle_event(created(&path)).await.unwrap();
        }
        assert_eq!(h.pipeline.progress().queued, 25);

        h.pipeline.wait_until_idle().await;

        let progress = h.pipeline.progress();
        assert_eq!(progress.indexed, 25);
        assert_eq!(progress.queued, 0);
        assert!(progress.flushes >= 2);
        assert_eq!(h.store.read().len(), 25);
        assert_eq!(h.analytics.lock().file_count(), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_delays_flush() {
        let h = harness(10);
        h.source.insert("a.ts", "export function login() {}");
        h.pipeline.handle_event(created("a.ts")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.pipeline.path_state("a.ts"), Some(PathState::Queued));

        tokio::time::sleep(Duration::from_millis(250)).await;
        h.pipeline.wait_until_idle().await;
        assert_eq!(h.pipeline.path_state("a.ts"), Some(PathState::Indexed));
        assert!(h.store.read().contains("a.ts"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_batch() {
        let h = harness(10);
        h.source.insert("good.ts", "export const ok = 1;");
        h.pipeline.handle_event(created("missing.ts")).await.unwrap();
        h.pipeline.handle_event(created("good.ts")).await.unwrap();

        h.pipeline.drain().await;

        let progress = h.pipeline.progress();
        assert_eq!(progress.indexed, 1);
        assert_eq!(progress.failed, 1);
        assert_eq!(progress.errors[0].path, "missing.ts");
        assert_eq!(h.pipeline.path_state("missing.ts"), Some(PathState::Failed));
        assert!(h.store.read().contains("good.ts"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_applies_immediately() {
        let h = harness(10);
        h.source.insert("a.ts", "alpha");
        h.source.insert("b.ts", "beta");
        h.pipeline.handle_event(created("a.ts")).await.unwrap();
        h.pipeline.drain().await;

        h.pipeline.handle_event(created("b.ts")).await.unwrap();
        h.pipeline
            .handle_event(ChangeEvent::relative(ChangeEventKind::FileDeleted, "a.ts"))
            .await
            .unwrap();
        h.pipeline
            .handle_event(ChangeEvent::relative(ChangeEventKind::FileDeleted, "b.ts"))
            .await
            .unwrap();

        // No flush has run, yet both are gone
        assert!(!h.store.read().contains("a.ts"));
        assert_eq!(h.pipeline.progress().queued, 0);
        assert_eq!(h.pipeline.path_state("b.ts"), None);
        h.store.read().verify_consistency().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_directory_delete_cascades() {
        let h = harness(10);
        for path in ["src/auth/login.ts", "src/auth/logout.ts", "src/main.ts"] {
            h.source.insert(path, "export const x = 1;");
            h.pipeline.handle_event(created(path)).await.unwrap();
        }
        h.pipeline.drain().await;

        h.pipeline
            .handle_event(ChangeEvent::relative(ChangeEventKind::DirectoryDeleted, "src/auth"))
            .await
            .unwrap();

        let store = h.store.read();
        assert_eq!(store.len(), 1);
        assert!(store.contains("src/main.ts"));
        assert_eq!(h.analytics.lock().file_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_analysis_is_used() {
        let h = harness(10);
        h.source.insert("lib.rs", "fn main() {}");
        let mut analysis = FileAnalysis::new("lib.rs", Language::Rust, 12, 1);
        analysis.complexity = Some(42);
        h.pipeline
            .handle_event(
                ChangeEvent::relative(ChangeEventKind::AnalysisComplete, "lib.rs")
                    .with_analysis(analysis),
            )
            .await
            .unwrap();
        h.pipeline.drain().await;

        assert_eq!(h.store.read().get("lib.rs").unwrap().complexity(), Some(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_content_is_skipped() {
        let h = harness(10);
        h.source.insert("a.ts", "export const a = 1;");
        h.pipeline.handle_event(created("a.ts")).await.unwrap();
        h.pipeline.drain().await;
        let first = h.store.read().get("a.ts").unwrap().indexed_at;

        h.pipeline
            .handle_event(ChangeEvent::relative(ChangeEventKind::FileModified, "a.ts"))
            .await
            .unwrap();
        h.pipeline.drain().await;

        assert_eq!(h.store.read().get("a.ts").unwrap().indexed_at, first);
        // Both the create and the no-op modify were observed
        assert_eq!(h.analytics.lock().change_count("a.ts"), 2);

        // Re-listing without a change event does not count
        h.pipeline.enqueue_paths(["a.ts"]).unwrap();
        h.pipeline.drain().await;
        assert_eq!(h.analytics.lock().change_count("a.ts"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_wakes_idle_waiters() {
        let h = harness(10);
        h.source.insert("a.ts", "alpha");
        h.pipeline.handle_event(created("a.ts")).await.unwrap();

        let pipeline = h.pipeline.clone();
        let waiter = tokio::spawn(async move { pipeline.wait_until_idle().await });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        h.pipeline
            .handle_event(ChangeEvent::relative(ChangeEventKind::FileDeleted, "a.ts"))
            .await
            .unwrap();
        assert_eq!(h.pipeline.progress().queued, 0);

        tokio::time::timeout(Duration::from_secs(60), waiter)
            .await
            .expect("waiter should wake after the queue empties")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_flush_wakes_idle_waiters() {
        let h = harness(10);
        h.source.insert("src/a.ts", "alpha");
        h.pipeline.handle_event(created("src/a.ts")).await.unwrap();

        let pipeline = h.pipeline.clone();
        let waiter = tokio::spawn(async move { pipeline.wait_until_idle().await });
        tokio::task::yield_now().await;

        h.pipeline
            .handle_event(ChangeEvent::relative(ChangeEventKind::DirectoryDeleted, "src"))
            .await
            .unwrap();
        // The pending timer fires against an empty queue
        assert_eq!(h.pipeline.flush().await, 0);

        tokio::time::timeout(Duration::from_secs(60), waiter)
            .await
            .expect("waiter should wake after an empty flush")
            .unwrap();
        assert!(h.store.read().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_timer() {
        let h = harness(10);
        h.source.insert("a.ts", "alpha");
        h.pipeline.handle_event(created("a.ts")).await.unwrap();

        h.pipeline.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(h.store.read().is_empty());
        assert!(h.pipeline.progress().is_stopped);
        assert!(matches!(
            h.pipeline.handle_event(created("a.ts")).await,
            Err(CoreError::PipelineStopped)
        ));
        assert_eq!(h.pipeline.flush().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriptions() {
        let h = harness(10);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let id = h.pipeline.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        h.source.insert("a.ts", "alpha");
        h.pipeline.handle_event(created("a.ts")).await.unwrap();
        h.pipeline.drain().await;
        let after_flush = calls.load(Ordering::SeqCst);
        assert!(after_flush >= 2);

        assert!(h.pipeline.unsubscribe(id));
        assert!(!h.pipeline.unsubscribe(id));
        h.pipeline.handle_event(created("a.ts")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), after_flush);
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_errors_are_recorded() {
        let h = harness(10);
        h.pipeline
            .handle_event(ChangeEvent::error("inotify watch limit reached"))
            .await
            .unwrap();
        let progress = h.pipeline.progress();
        assert_eq!(progress.errors.len(), 1);
        assert_eq!(progress.errors[0].message, "inotify watch limit reached");
    }
}
