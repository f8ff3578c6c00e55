//! Session state: the one active project and its wired-up services.
//!
//! Every tool call except activation goes through [`SessionContext::require_active`];
//! activating a new project tears the previous one down (watcher, drainer and
//! in-flight indexing all hang off the project's cancellation token).

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::ProjectConfig;
use crate::deferred::DeferredQueue;
use crate::embedding::EmbeddingProvider;
use crate::error::{DocsError, Result};
use crate::health::HealthMonitor;
use crate::indexer::Indexer;
use crate::link_graph::LinkGraph;
use crate::parser::DocTypeRegistry;
use crate::rag::{GeneratorClient, RagRetriever};
use crate::search::SearchService;
use crate::tenant::TenantKey;
use crate::vector_store::VectorStore;
use crate::watcher::{IgnoreRules, WatcherHandle};

/// Services bound to the external-docs collection, when configured
pub struct ExternalCollection {
    pub docs_root: PathBuf,
    pub store: Arc<dyn VectorStore>,
    pub indexer: Arc<Indexer>,
    pub search: Arc<SearchService>,
    pub rag: Arc<RagRetriever>,
}

/// Everything belonging to the currently activated project
pub struct ActiveProject {
    pub tenant: TenantKey,
    pub root_path: PathBuf,
    pub docs_root: PathBuf,
    pub config: ProjectConfig,
    pub registry: DocTypeRegistry,
    pub ignore: IgnoreRules,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub health: Arc<HealthMonitor>,
    pub store: Arc<dyn VectorStore>,
    pub link_graph: Arc<LinkGraph>,
    pub indexer: Arc<Indexer>,
    pub search: Arc<SearchService>,
    pub rag: Arc<RagRetriever>,
    pub deferred: Arc<DeferredQueue>,
    pub generator: Option<Arc<GeneratorClient>>,
    pub external: Option<ExternalCollection>,
    /// Cancels the watcher, drainer and any in-flight indexing
    pub cancel: CancellationToken,
    pub watcher: Option<WatcherHandle>,
}

impl ActiveProject {
    /// Stop background work for this project
    pub fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(watcher) = &self.watcher {
            watcher.abort();
        }
    }
}

/// Gate for the one-project-per-session invariant
#[derive(Default)]
pub struct SessionContext {
    active: RwLock<Option<Arc<ActiveProject>>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The active project, or `ProjectNotActivated`
    pub async fn require_active(&self) -> Result<Arc<ActiveProject>> {
        self.active
            .read()
            .await
            .clone()
            .ok_or(DocsError::ProjectNotActivated)
    }

    pub async fn is_activated(&self) -> bool {
        self.active.read().await.is_some()
    }

    /// Install a newly activated project, shutting down the previous one
    pub async fn activate(&self, project: ActiveProject) -> Arc<ActiveProject> {
        let project = Arc::new(project);
        let previous = {
            let mut slot = self.active.write().await;
            slot.replace(Arc::clone(&project))
        };
        if let Some(previous) = previous {
            tracing::info!(
                "Deactivating {} in favor of {}",
                previous.tenant,
                project.tenant
            );
            previous.shutdown();
        }
        project
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_require_active_before_activation() {
        let session = SessionContext::new();
        let err = session.require_active().await.unwrap_err();
        assert_eq!(err.code(), "ProjectNotActivated");
        assert!(!session.is_activated().await);
    }
}
