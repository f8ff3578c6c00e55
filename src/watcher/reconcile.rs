//! Reconciliation: align the vector store with the on-disk docs set.
//!
//! Runs on activation and on an explicit rebuild signal. The file system is
//! the source of truth; the store converges to it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::deferred::{DeferredEvent, DeferredQueue};
use crate::error::{DocsError, Result};
use crate::health::HealthMonitor;
use crate::indexer::Indexer;
use crate::paths::relative_to_root;
use crate::tenant::content_hash;
use crate::types::ChangeType;
use crate::vector_store::VectorStore;
use crate::watcher::IgnoreRules;

/// What reconciliation decided to do
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub created: usize,
    pub modified: usize,
    pub deleted: usize,
    /// Events parked on the deferred queue instead of applied
    pub deferred: usize,
}

impl ReconcileOutcome {
    pub fn total(&self) -> usize {
        self.created + self.modified + self.deleted
    }
}

/// Scan the docs directory, returning relative path -> content hash.
///
/// Hidden directories and ignored paths are skipped during the walk.
pub fn scan_docs_dir(docs_root: &Path, ignore: &IgnoreRules) -> Result<HashMap<String, String>> {
    let mut found = HashMap::new();
    if !docs_root.exists() {
        return Ok(found);
    }

    let walker = WalkDir::new(docs_root).into_iter().filter_entry(|entry| {
        !(entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with('.')))
    });

    for entry in walker {
        let entry =
            entry.map_err(|e| DocsError::FileSystem(format!("failed to walk docs dir: {e}")))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(relative) = relative_to_root(entry.path(), docs_root) else {
            continue;
        };
        if ignore.should_ignore(&relative) {
            continue;
        }
        let bytes = std::fs::read(entry.path())
            .map_err(|e| DocsError::FileSystem(format!("{}: {e}", entry.path().display())))?;
        found.insert(relative, content_hash(&bytes));
    }
    Ok(found)
}

/// Diff the store against the disk and apply (or defer) the difference.
///
/// Deletions are always applied directly since they need no embedding;
/// creates and modifies go through the indexer while the circuit admits
/// work and to the deferred queue otherwise.
pub async fn reconcile(
    indexer: &Arc<Indexer>,
    deferred: &Arc<DeferredQueue>,
    health: &Arc<HealthMonitor>,
    ignore: &IgnoreRules,
    cancel: &CancellationToken,
) -> Result<ReconcileOutcome> {
    let stored = indexer.store().list(indexer.tenant()).await?;
    let stored_hashes: HashMap<String, String> = stored
        .into_iter()
        .map(|meta| (meta.relative_path, meta.content_hash))
        .collect();

    let on_disk = scan_docs_dir(indexer.docs_root(), ignore)?;

    let mut outcome = ReconcileOutcome::default();
    let mut work: Vec<(String, ChangeType)> = Vec::new();

    for (path, disk_hash) in &on_disk {
        match stored_hashes.get(path) {
            None => {
                work.push((path.clone(), ChangeType::Created));
                outcome.created += 1;
            }
            Some(stored_hash) if stored_hash != disk_hash => {
                work.push((path.clone(), ChangeType::Modified));
                outcome.modified += 1;
            }
            Some(_) => {}
        }
    }
    for path in stored_hashes.keys() {
        if !on_disk.contains_key(path) {
            work.push((path.clone(), ChangeType::Deleted));
            outcome.deleted += 1;
        }
    }

    // Deterministic order makes the start-up log readable
    work.sort();

    tracing::info!(
        "Reconciliation: {} new, {} changed, {} removed",
        outcome.created,
        outcome.modified,
        outcome.deleted
    );

    for (path, change) in work {
        if cancel.is_cancelled() {
            return Err(DocsError::Cancelled);
        }

        if change != ChangeType::Deleted && !health.embedding_attemptable() {
            deferred.enqueue(DeferredEvent::new(path, change));
            outcome.deferred += 1;
            continue;
        }

        match indexer.apply_change(&path, change, cancel).await {
            Ok(()) => {}
            Err(e) if e.is_deferrable() => {
                deferred.enqueue(DeferredEvent::new(path, change));
                outcome.deferred += 1;
            }
            Err(e) => {
                tracing::error!("Reconciliation failed for {}: {}", path, e);
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{CircuitBreaker, CircuitSettings};
    use crate::indexer::testing::StubEmbedder;
    use crate::link_graph::LinkGraph;
    use crate::parser::{DocTypeRegistry, DocumentParser};
    use crate::tenant::TenantKey;
    use crate::vector_store::{CollectionKind, LanceVectorStore, VectorStore};

    struct Fixture {
        _dir: tempfile::TempDir,
        indexer: Arc<Indexer>,
        deferred: Arc<DeferredQueue>,
        health: Arc<HealthMonitor>,
        breaker: Arc<CircuitBreaker>,
        ignore: IgnoreRules,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let docs_root = dir.path().join("docs");
        std::fs::create_dir_all(&docs_root).unwrap();

        let store = LanceVectorStore::open(
            &dir.path().join("lancedb").to_string_lossy(),
            CollectionKind::Primary,
        )
        .await
        .unwrap();
        store.initialize().await.unwrap();

        let breaker = Arc::new(CircuitBreaker::new(CircuitSettings {
            failure_threshold: 1,
            ..CircuitSettings::default()
        }));
        let indexer = Arc::new(Indexer::new(
            TenantKey::new("acme", "main", dir.path()),
            docs_root,
            DocumentParser::new(DocTypeRegistry::builtin(), 500),
            Arc::new(StubEmbedder),
            Arc::new(store),
            Arc::new(LinkGraph::new()),
            2,
        ));
        Fixture {
            _dir: dir,
            indexer,
            deferred: Arc::new(DeferredQueue::new(100)),
            health: Arc::new(HealthMonitor::new(Arc::clone(&breaker))),
            breaker,
            ignore: IgnoreRules::new(&[]).unwrap(),
        }
    }

    fn write(fixture: &Fixture, relative: &str, contents: &str) {
        let path = fixture.indexer.docs_root().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_scan_skips_hidden_and_non_markdown() {
        let f = fixture().await;
        write(&f, "problems/pool.md", "content");
        write(&f, ".obsidian/cache.md", "hidden");
        write(&f, "notes.txt", "text");

        let scanned = scan_docs_dir(f.indexer.docs_root(), &f.ignore).unwrap();
        assert_eq!(scanned.len(), 1);
        assert!(scanned.contains_key("problems/pool.md"));
    }

    #[tokio::test]
    async fn test_reconcile_applies_creates_modifies_deletes() {
        let f = fixture().await;
        let cancel = CancellationToken::new();

        // Seed the store with old.md and gone.md
        write(&f, "old.md", "old v1");
        write(&f, "gone.md", "goner");
        reconcile(&f.indexer, &f.deferred, &f.health, &f.ignore, &cancel)
            .await
            .unwrap();

        // Offline edits: new file, changed file, removed file
        write(&f, "new.md", "fresh");
        write(&f, "old.md", "old v2");
        std::fs::remove_file(f.indexer.docs_root().join("gone.md")).unwrap();

        let outcome = reconcile(&f.indexer, &f.deferred, &f.health, &f.ignore, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.modified, 1);
        assert_eq!(outcome.deleted, 1);
        assert_eq!(outcome.deferred, 0);

        let listed = f.indexer.store().list(f.indexer.tenant()).await.unwrap();
        let mut paths: Vec<String> = listed.iter().map(|m| m.relative_path.clone()).collect();
        paths.sort();
        assert_eq!(paths, vec!["new.md", "old.md"]);

        let old = f
            .indexer
            .store()
            .get_meta(f.indexer.tenant(), "old.md")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(old.content_hash, content_hash(b"old v2"));
    }

    #[tokio::test]
    async fn test_reconcile_noop_when_in_sync() {
        let f = fixture().await;
        let cancel = CancellationToken::new();
        write(&f, "a.md", "same");
        reconcile(&f.indexer, &f.deferred, &f.health, &f.ignore, &cancel)
            .await
            .unwrap();

        let outcome = reconcile(&f.indexer, &f.deferred, &f.health, &f.ignore, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome.total(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_defers_when_circuit_open() {
        let f = fixture().await;
        let cancel = CancellationToken::new();
        write(&f, "a.md", "content");

        f.breaker.record_failure(); // threshold 1: opens the circuit
        let outcome = reconcile(&f.indexer, &f.deferred, &f.health, &f.ignore, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.deferred, 1);
        assert_eq!(f.deferred.count(), 1);

        // Nothing was indexed
        assert!(f.indexer.store().list(f.indexer.tenant()).await.unwrap().is_empty());
    }
}
