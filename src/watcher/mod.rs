//! File watcher: keep the index in sync with the docs directory.
//!
//! OS events from notify feed a single debounce task that owns the per-path
//! pending map. After the quiet period a change is dispatched to the indexer
//! when the embedding circuit admits work, and parked on the deferred queue
//! otherwise.

mod reconcile;
pub use reconcile::{ReconcileOutcome, reconcile, scan_docs_dir};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::deferred::{DeferredEvent, DeferredQueue};
use crate::error::{DocsError, Result};
use crate::health::HealthMonitor;
use crate::indexer::Indexer;
use crate::paths::{has_hidden_component, relative_to_root};
use crate::types::ChangeType;

/// Which paths are never indexed
#[derive(Clone)]
pub struct IgnoreRules {
    exclude: Arc<GlobSet>,
}

impl IgnoreRules {
    pub fn new(exclude_patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in exclude_patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                DocsError::ConfigInvalid(format!("invalid exclude pattern '{pattern}': {e}"))
            })?;
            builder.add(glob);
        }
        let exclude = builder
            .build()
            .map_err(|e| DocsError::ConfigInvalid(format!("failed to build exclude set: {e}")))?;
        Ok(Self {
            exclude: Arc::new(exclude),
        })
    }

    /// Hidden path segments, non-markdown files and excluded globs are skipped
    pub fn should_ignore(&self, relative: &str) -> bool {
        !relative.ends_with(".md")
            || has_hidden_component(relative)
            || self.exclude.is_match(relative)
    }
}

/// A raw event as it leaves the notify callback
#[derive(Debug)]
struct RawEvent {
    relative_path: String,
    change_type: ChangeType,
}

/// Keeps the watcher and its debounce task alive
pub struct WatcherHandle {
    // Dropping the watcher detaches the OS subscription
    _watcher: RecommendedWatcher,
    task: tokio::task::JoinHandle<()>,
}

impl WatcherHandle {
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Start watching the docs root.
///
/// Events are debounced per path; a burst collapses into one dispatch once
/// the quiet period elapses.
pub fn start_watcher(
    docs_root: &Path,
    indexer: Arc<Indexer>,
    deferred: Arc<DeferredQueue>,
    health: Arc<HealthMonitor>,
    ignore: IgnoreRules,
    debounce: Duration,
    cancel: CancellationToken,
) -> Result<WatcherHandle> {
    let (tx, rx) = mpsc::unbounded_channel::<RawEvent>();
    let root = docs_root.to_path_buf();

    let callback_root = root.clone();
    let callback_ignore = ignore.clone();
    let mut watcher = RecommendedWatcher::new(
        move |result: notify::Result<notify::Event>| match result {
            Ok(event) => {
                for raw in translate_event(&event, &callback_root, &callback_ignore) {
                    let _ = tx.send(raw);
                }
            }
            Err(error) => {
                tracing::warn!("File watcher error: {}", error);
            }
        },
        notify::Config::default(),
    )
    .map_err(|e| DocsError::FileSystem(format!("failed to create watcher: {e}")))?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| {
            DocsError::FileSystem(format!("failed to watch {}: {e}", root.display()))
        })?;

    let task = tokio::spawn(debounce_loop(
        rx, indexer, deferred, health, debounce, cancel,
    ));

    tracing::info!("Watching {}", root.display());
    Ok(WatcherHandle {
        _watcher: watcher,
        task,
    })
}

/// Map a notify event to zero or more path-level changes.
///
/// Renames become a delete of the old path plus a create of the new one so
/// downstream only handles three change kinds.
fn translate_event(event: &notify::Event, root: &Path, ignore: &IgnoreRules) -> Vec<RawEvent> {
    use notify::event::{ModifyKind, RenameMode};

    let change_for = |path: &PathBuf| -> Option<String> {
        let relative = relative_to_root(path, root)?;
        if ignore.should_ignore(&relative) {
            None
        } else {
            Some(relative)
        }
    };

    let mut out = Vec::new();
    match &event.kind {
        EventKind::Create(_) => {
            for path in &event.paths {
                if let Some(relative) = change_for(path) {
                    out.push(RawEvent {
                        relative_path: relative,
                        change_type: ChangeType::Created,
                    });
                }
            }
        }
        EventKind::Remove(_) => {
            for path in &event.paths {
                if let Some(relative) = change_for(path) {
                    out.push(RawEvent {
                        relative_path: relative,
                        change_type: ChangeType::Deleted,
                    });
                }
            }
        }
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => {
                for path in &event.paths {
                    if let Some(relative) = change_for(path) {
                        out.push(RawEvent {
                            relative_path: relative,
                            change_type: ChangeType::Deleted,
                        });
                    }
                }
            }
            RenameMode::To => {
                for path in &event.paths {
                    if let Some(relative) = change_for(path) {
                        out.push(RawEvent {
                            relative_path: relative,
                            change_type: ChangeType::Created,
                        });
                    }
                }
            }
            _ => {
                // Both/other: first path is the old name, the rest are new
                for (i, path) in event.paths.iter().enumerate() {
                    if let Some(relative) = change_for(path) {
                        out.push(RawEvent {
                            relative_path: relative,
                            change_type: if i == 0 {
                                ChangeType::Deleted
                            } else {
                                ChangeType::Created
                            },
                        });
                    }
                }
            }
        },
        EventKind::Modify(_) => {
            for path in &event.paths {
                if let Some(relative) = change_for(path) {
                    out.push(RawEvent {
                        relative_path: relative,
                        change_type: ChangeType::Modified,
                    });
                }
            }
        }
        EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
    }
    out
}

/// Debounce state machine: Idle -> Pending on an event, Pending -> Pending
/// (window reset) on further events, Pending -> Dispatched after quiescence.
async fn debounce_loop(
    mut rx: mpsc::UnboundedReceiver<RawEvent>,
    indexer: Arc<Indexer>,
    deferred: Arc<DeferredQueue>,
    health: Arc<HealthMonitor>,
    debounce: Duration,
    cancel: CancellationToken,
) {
    let mut pending: HashMap<String, (ChangeType, Instant)> = HashMap::new();

    loop {
        let next_deadline = pending.values().map(|(_, at)| *at).min();
        tokio::select! {
            _ = cancel.cancelled() => return,
            event = rx.recv() => {
                let Some(event) = event else { return };
                let deadline = Instant::now() + debounce;
                pending
                    .entry(event.relative_path)
                    .and_modify(|(change, at)| {
                        *change = merge_change(*change, event.change_type);
                        *at = deadline;
                    })
                    .or_insert((event.change_type, deadline));
            }
            _ = sleep_until_or_forever(next_deadline) => {
                let now = Instant::now();
                let due: Vec<String> = pending
                    .iter()
                    .filter(|(_, (_, at))| *at <= now)
                    .map(|(path, _)| path.clone())
                    .collect();
                for path in due {
                    let (change, _) = pending.remove(&path).expect("due path present");
                    dispatch(
                        Arc::clone(&indexer),
                        Arc::clone(&deferred),
                        Arc::clone(&health),
                        path,
                        change,
                        cancel.clone(),
                    );
                }
            }
        }
    }
}

async fn sleep_until_or_forever(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

/// Collapse a burst of events on one path into a single change
fn merge_change(previous: ChangeType, next: ChangeType) -> ChangeType {
    match (previous, next) {
        // A file created inside the window is still new, however often it is
        // rewritten before the window closes
        (ChangeType::Created, ChangeType::Modified) => ChangeType::Created,
        (_, next) => next,
    }
}

/// Hand a debounced change to the indexer, or park it when the embedding
/// service is unavailable
fn dispatch(
    indexer: Arc<Indexer>,
    deferred: Arc<DeferredQueue>,
    health: Arc<HealthMonitor>,
    relative_path: String,
    change: ChangeType,
    cancel: CancellationToken,
) {
    // Deletions never need the embedding service
    if change != ChangeType::Deleted && !health.embedding_attemptable() {
        tracing::debug!("Circuit open, deferring {:?} for {}", change, relative_path);
        deferred.enqueue(DeferredEvent::new(relative_path, change));
        return;
    }

    tokio::spawn(async move {
        match indexer.apply_change(&relative_path, change, &cancel).await {
            Ok(()) => {}
            Err(e) if e.is_deferrable() => {
                tracing::info!("Deferring {} until embedding recovers", relative_path);
                deferred.enqueue(DeferredEvent::new(relative_path, change));
            }
            Err(e) => {
                tracing::error!("Failed to process change for {}: {}", relative_path, e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignore_rules() {
        let ignore = IgnoreRules::new(&["drafts/**".to_string()]).unwrap();
        assert!(ignore.should_ignore("notes.txt"));
        assert!(ignore.should_ignore(".obsidian/workspace.md"));
        assert!(ignore.should_ignore("a/.hidden/b.md"));
        assert!(ignore.should_ignore("drafts/wip.md"));
        assert!(!ignore.should_ignore("problems/pool.md"));
    }

    #[test]
    fn test_ignore_rejects_bad_pattern() {
        let err = IgnoreRules::new(&["[unclosed".to_string()]).unwrap_err();
        assert_eq!(err.code(), "ConfigInvalid");
    }

    #[test]
    fn test_merge_change_burst_semantics() {
        use ChangeType::*;
        assert_eq!(merge_change(Created, Modified), Created);
        assert_eq!(merge_change(Modified, Modified), Modified);
        assert_eq!(merge_change(Modified, Deleted), Deleted);
        assert_eq!(merge_change(Created, Deleted), Deleted);
        assert_eq!(merge_change(Deleted, Created), Created);
    }

    #[test]
    fn test_translate_create_and_remove() {
        let root = PathBuf::from("/docs");
        let ignore = IgnoreRules::new(&[]).unwrap();

        let create = notify::Event {
            kind: EventKind::Create(notify::event::CreateKind::File),
            paths: vec![PathBuf::from("/docs/problems/pool.md")],
            attrs: Default::default(),
        };
        let out = translate_event(&create, &root, &ignore);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].relative_path, "problems/pool.md");
        assert_eq!(out[0].change_type, ChangeType::Created);

        let remove = notify::Event {
            kind: EventKind::Remove(notify::event::RemoveKind::File),
            paths: vec![PathBuf::from("/docs/problems/pool.md")],
            attrs: Default::default(),
        };
        let out = translate_event(&remove, &root, &ignore);
        assert_eq!(out[0].change_type, ChangeType::Deleted);
    }

    #[test]
    fn test_translate_rename_splits_into_delete_and_create() {
        let root = PathBuf::from("/docs");
        let ignore = IgnoreRules::new(&[]).unwrap();
        let rename = notify::Event {
            kind: EventKind::Modify(notify::event::ModifyKind::Name(
                notify::event::RenameMode::Both,
            )),
            paths: vec![
                PathBuf::from("/docs/old.md"),
                PathBuf::from("/docs/new.md"),
            ],
            attrs: Default::default(),
        };
        let out = translate_event(&rename, &root, &ignore);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].relative_path, "old.md");
        assert_eq!(out[0].change_type, ChangeType::Deleted);
        assert_eq!(out[1].relative_path, "new.md");
        assert_eq!(out[1].change_type, ChangeType::Created);
    }

    #[test]
    fn test_translate_skips_paths_outside_root_and_ignored() {
        let root = PathBuf::from("/docs");
        let ignore = IgnoreRules::new(&[]).unwrap();
        let event = notify::Event {
            kind: EventKind::Create(notify::event::CreateKind::File),
            paths: vec![
                PathBuf::from("/elsewhere/a.md"),
                PathBuf::from("/docs/notes.txt"),
            ],
            attrs: Default::default(),
        };
        assert!(translate_event(&event, &root, &ignore).is_empty());
    }
}
