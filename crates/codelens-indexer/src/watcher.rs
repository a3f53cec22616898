//! File system watcher producing [`ChangeEvent`]s.
//!
//! Uses FSEvents on macOS and inotify on Linux via `notify`, debounced so
//! editors that write in several steps produce one event.

use crate::events::{ChangeEvent, ChangeEventKind};
use crate::scanner::relative_path;
use crate::IndexerError;
use notify::event::{ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, RecommendedCache};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Options for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    pub debounce_duration: Duration,
    pub recursive: bool,
    /// Drop events under dot-directories such as `.git`
    pub ignore_hidden: bool,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
            recursive: true,
            ignore_hidden: true,
        }
    }
}

/// Watches one root directory and queues change events for it.
pub struct FileWatcher {
    options: WatcherOptions,
    root: Option<PathBuf>,
    tx: mpsc::Sender<ChangeEvent>,
    rx: mpsc::Receiver<ChangeEvent>,
    _debouncer: Option<Debouncer<RecommendedWatcher, RecommendedCache>>,
}

impl FileWatcher {
    pub fn new(options: WatcherOptions) -> Self {
        let (tx, rx) = mpsc::channel(1000);
        Self {
            options,
            root: None,
            tx,
            rx,
            _debouncer: None,
        }
    }

    /// Start watching `root`. Event paths are reported relative to it.
    pub fn watch(&mut self, root: &Path) -> Result<(), IndexerError> {
        let root = root
            .canonicalize()
            .map_err(|_| IndexerError::NotFound(root.to_path_buf()))?;

        let tx = self.tx.clone();
        let event_root = root.clone();
        let ignore_hidden = self.options.ignore_hidden;

        let mut debouncer = new_debouncer(
            self.options.debounce_duration,
            None,
            move |result: Result<Vec<DebouncedEvent>, Vec<notify::Error>>| match result {
                Ok(events) => {
                    for event in events {
                        for change in convert_event(&event_root, &event.event) {
                            if ignore_hidden && is_hidden(&change.relative_path) {
                                continue;
                            }
                            if let Err(e) = tx.blocking_send(change) {
                                error!(error = %e, "Failed to send change event");
                            }
                        }
                    }
                }
                Err(errors) => {
                    for e in errors {
                        warn!(error = %e, "Watcher error");
                        if let Err(e) = tx.blocking_send(ChangeEvent::error(e.to_string())) {
                            error!(error = %e, "Failed to send watcher error");
                        }
                    }
                }
            },
        )
        .map_err(|e| IndexerError::Watcher(e.to_string()))?;

        let mode = if self.options.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        debouncer
            .watch(&root, mode)
            .map_err(|e: notify::Error| IndexerError::Watcher(e.to_string()))?;

        info!(path = ?root, recursive = self.options.recursive, "Started watching");

        self.root = Some(root);
        self._debouncer = Some(debouncer);
        Ok(())
    }

    /// The canonical root being watched, once [`FileWatcher::watch`] succeeded.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }

    pub fn has_pending(&self) -> bool {
        !self.rx.is_empty()
    }
}

fn is_hidden(relative: &str) -> bool {
    relative
        .split('/')
        .any(|part| part.starts_with('.') && part.len() > 1 && part != "..")
}

/// Convert a notify event into zero or more change events.
fn convert_event(root: &Path, event: &Event) -> Vec<ChangeEvent> {
    let make = |kind: ChangeEventKind, path: &PathBuf| {
        let mut change = ChangeEvent::new(kind, path.clone(), relative_path(root, path));
        if kind.is_content_change() {
            change.size = std::fs::metadata(path).ok().map(|m| m.len());
        }
        debug!(path = ?path, kind = kind.as_str(), "Change detected");
        change
    };

    let Some(first) = event.paths.first() else {
        return Vec::new();
    };

    match &event.kind {
        EventKind::Create(_) => {
            let kind = if first.is_dir() {
                ChangeEventKind::DirectoryCreated
            } else {
                ChangeEventKind::FileCreated
            };
            vec![make(kind, first)]
        }
        EventKind::Modify(ModifyKind::Name(mode)) => rename_events(event, *mode)
            .into_iter()
            .map(|(kind, path)| make(kind, path))
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => {
            // Directory mtime bumps when children change; children report separately
            if first.is_dir() {
                return Vec::new();
            }
            vec![make(ChangeEventKind::FileModified, first)]
        }
        EventKind::Remove(RemoveKind::Folder) => {
            vec![make(ChangeEventKind::DirectoryDeleted, first)]
        }
        EventKind::Remove(_) => vec![make(ChangeEventKind::FileDeleted, first)],
        EventKind::Any | EventKind::Access(_) | EventKind::Other => Vec::new(),
    }
}

/// A rename is a delete of the old path plus a create of the new one.
fn rename_events(event: &Event, mode: RenameMode) -> Vec<(ChangeEventKind, &PathBuf)> {
    let created = |path: &PathBuf| {
        if path.is_dir() {
            ChangeEventKind::DirectoryCreated
        } else {
            ChangeEventKind::FileCreated
        }
    };

    match (mode, event.paths.as_slice()) {
        (RenameMode::Both, [from, to, ..]) => {
            vec![(ChangeEventKind::FileDeleted, from), (created(to), to)]
        }
        (RenameMode::From, [from, ..]) => vec![(ChangeEventKind::FileDeleted, from)],
        (RenameMode::To, [to, ..]) => vec![(created(to), to)],
        (_, [path, ..]) => {
            if path.exists() {
                vec![(created(path), path)]
            } else {
                vec![(ChangeEventKind::FileDeleted, path)]
            }
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange};
    use std::fs;
    use tempfile::tempdir;

    fn event(kind: EventKind, paths: Vec<PathBuf>) -> Event {
        Event {
            kind,
            paths,
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_watcher_options_default() {
        let options = WatcherOptions::default();
        assert_eq!(options.debounce_duration, Duration::from_millis(500));
        assert!(options.recursive);
        assert!(options.ignore_hidden);
    }

    #[tokio::test]
    async fn test_watcher_create() {
        let temp_dir = tempdir().unwrap();
        let mut watcher = FileWatcher::new(WatcherOptions::default());
        watcher.watch(temp_dir.path()).unwrap();
        assert!(watcher.root().is_some());
        assert!(!watcher.has_pending());
    }

    #[test]
    fn test_watch_missing_root() {
        let mut watcher = FileWatcher::new(WatcherOptions::default());
        let result = watcher.watch(Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(IndexerError::NotFound(_))));
    }

    #[test]
    fn test_convert_create_file_and_directory() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        let file = root.join("a.ts");
        fs::write(&file, "export const a = 1;").unwrap();
        fs::create_dir(root.join("lib")).unwrap();

        let changes = convert_event(root, &event(EventKind::Create(CreateKind::File), vec![file]));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeEventKind::FileCreated);
        assert_eq!(changes[0].relative_path, "a.ts");
        assert_eq!(changes[0].size, Some(19));

        let changes = convert_event(
            root,
            &event(EventKind::Create(CreateKind::Folder), vec![root.join("lib")]),
        );
        assert_eq!(changes[0].kind, ChangeEventKind::DirectoryCreated);
    }

    #[test]
    fn test_convert_modify_and_remove() {
        let root = Path::new("/repo");
        let modify = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            vec![PathBuf::from("/repo/src/a.rs")],
        );
        let changes = convert_event(root, &modify);
        assert_eq!(changes[0].kind, ChangeEventKind::FileModified);
        assert_eq!(changes[0].relative_path, "src/a.rs");

        let remove = event(
            EventKind::Remove(RemoveKind::Folder),
            vec![PathBuf::from("/repo/src")],
        );
        assert_eq!(
            convert_event(root, &remove)[0].kind,
            ChangeEventKind::DirectoryDeleted
        );

        let remove = event(
            EventKind::Remove(RemoveKind::File),
            vec![PathBuf::from("/repo/src/a.rs")],
        );
        assert_eq!(convert_event(root, &remove)[0].kind, ChangeEventKind::FileDeleted);
    }

    #[test]
    fn test_convert_rename_both() {
        let root = Path::new("/repo");
        let rename = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            vec![PathBuf::from("/repo/old.rs"), PathBuf::from("/repo/new.rs")],
        );
        let changes = convert_event(root, &rename);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].kind, ChangeEventKind::FileDeleted);
        assert_eq!(changes[0].relative_path, "old.rs");
        assert_eq!(changes[1].kind, ChangeEventKind::FileCreated);
        assert_eq!(changes[1].relative_path, "new.rs");
    }

    #[test]
    fn test_convert_ignores_access_and_metadata() {
        let root = Path::new("/repo");
        let access = event(
            EventKind::Access(AccessKind::Read),
            vec![PathBuf::from("/repo/a.rs")],
        );
        assert!(convert_event(root, &access).is_empty());
        assert!(convert_event(root, &event(EventKind::Any, vec![])).is_empty());
    }

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden(".git/HEAD"));
        assert!(is_hidden("src/.cache/x"));
        assert!(!is_hidden("src/a.rs"));
    }
}
