//! Project activation: load config, resolve the tenant triple, wire the
//! per-project services, start the watcher and drainer, and run start-up
//! reconciliation.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{Config, EmbeddingConfig, ProjectConfig};
use crate::deferred::{DeferredQueue, QueueDrainer};
use crate::error::{DocsError, Result};
use crate::health::HealthMonitor;
use crate::indexer::Indexer;
use crate::link_graph::LinkGraph;
use crate::parser::{DocTypeRegistry, DocumentParser};
use crate::rag::{ExpansionLimits, GeneratorClient, RagRetriever};
use crate::search::SearchService;
use crate::session::{ActiveProject, ExternalCollection};
use crate::tenant::{TenantKey, detect_branch};
use crate::vector_store::{CollectionKind, LanceVectorStore, VectorStore};
use crate::watcher::{IgnoreRules, ReconcileOutcome, reconcile, start_watcher};
use crate::embedding::HttpEmbeddingClient;

/// Build and start everything belonging to one project.
///
/// Returns the wired project plus the reconciliation outcome for the
/// activation response.
pub(super) async fn build_active_project(
    server_config: &Config,
    root_path: &Path,
) -> Result<(ActiveProject, ReconcileOutcome)> {
    if !root_path.is_dir() {
        return Err(DocsError::FileSystem(format!(
            "project root is not a directory: {}",
            root_path.display()
        )));
    }

    let project_config = ProjectConfig::load(root_path)?;
    let docs_root = ProjectConfig::docs_root(root_path);
    if !docs_root.exists() {
        std::fs::create_dir_all(&docs_root).map_err(|e| {
            DocsError::FileSystem(format!("failed to create {}: {e}", docs_root.display()))
        })?;
    }

    let branch = detect_branch(root_path);
    let tenant = TenantKey::new(project_config.project_name.clone(), branch, root_path);
    tracing::info!("Activating project {}", tenant);

    let registry = DocTypeRegistry::with_custom(&project_config.custom_doc_types);
    let ignore = IgnoreRules::new(&project_config.exclude_patterns)?;

    // Embedding client: server defaults, overridable per project
    let mut embedding_config: EmbeddingConfig = server_config.embedding.clone();
    if let Some(overrides) = &project_config.embedding {
        if let Some(endpoint) = &overrides.endpoint {
            embedding_config.endpoint = endpoint.clone();
        }
        if let Some(model) = &overrides.model {
            embedding_config.model = model.clone();
        }
    }
    let embedder = Arc::new(HttpEmbeddingClient::new(&embedding_config)?);
    let health = Arc::new(HealthMonitor::new(embedder.breaker()));

    let db_path = server_config.vector_db.lancedb_path.to_string_lossy();
    let store: Arc<dyn VectorStore> = Arc::new(
        LanceVectorStore::open(&db_path, CollectionKind::Primary).await?,
    );
    store.initialize().await?;

    let link_graph = Arc::new(LinkGraph::new());
    let parser = DocumentParser::new(
        registry.clone(),
        server_config.indexing.chunk_threshold_lines,
    );
    let indexer = Arc::new(Indexer::new(
        tenant.clone(),
        docs_root.clone(),
        parser,
        embedder.clone(),
        Arc::clone(&store),
        Arc::clone(&link_graph),
        server_config.indexing.concurrency,
    ));

    let deferred = Arc::new(DeferredQueue::new(
        server_config.indexing.deferred_queue_capacity,
    ));
    let cancel = CancellationToken::new();

    // Drainer wakes on every circuit-closed transition
    let drainer = Arc::new(QueueDrainer::new(
        Arc::clone(&deferred),
        Arc::clone(&indexer),
        Arc::clone(&health),
        server_config.indexing.max_retry_attempts,
        Duration::from_millis(server_config.indexing.drain_pause_ms),
    ));
    tokio::spawn(drainer.run(cancel.clone()));

    let search = Arc::new(SearchService::new(
        embedder.clone() as Arc<dyn crate::embedding::EmbeddingProvider>,
        Arc::clone(&store),
    ));

    let expansion = ExpansionLimits {
        enabled: server_config.retrieval.link_expansion,
        max_linked_docs: project_config
            .thresholds
            .max_linked_docs
            .unwrap_or(server_config.retrieval.max_linked_docs),
        max_link_depth: project_config
            .thresholds
            .max_link_depth
            .unwrap_or(server_config.retrieval.max_link_depth),
        max_traversal_nodes: project_config
            .thresholds
            .max_traversal_depth
            .unwrap_or(server_config.retrieval.max_traversal_nodes),
    };
    let rag = Arc::new(RagRetriever::new(
        Arc::clone(&search),
        Arc::clone(&store),
        Some(Arc::clone(&link_graph)),
        expansion,
    ));

    let generator = match &project_config.generator {
        Some(config) => Some(Arc::new(GeneratorClient::new(config)?)),
        None => None,
    };

    // External collection: indexed at activation, no watcher
    let external = match project_config.external_docs_root(root_path) {
        Some(external_root) => Some(
            build_external_collection(
                server_config,
                &tenant,
                &registry,
                &ignore,
                embedder.clone(),
                Arc::clone(&health),
                &db_path,
                external_root,
                &cancel,
            )
            .await?,
        ),
        None => None,
    };

    // Start-up reconciliation before the watcher takes over
    let outcome = reconcile(&indexer, &deferred, &health, &ignore, &cancel).await?;

    let watcher = start_watcher(
        &docs_root,
        Arc::clone(&indexer),
        Arc::clone(&deferred),
        Arc::clone(&health),
        ignore.clone(),
        Duration::from_millis(server_config.indexing.debounce_ms),
        cancel.clone(),
    )?;

    let project = ActiveProject {
        tenant,
        root_path: root_path.to_path_buf(),
        docs_root,
        config: project_config,
        registry,
        ignore,
        embedder,
        health,
        store,
        link_graph,
        indexer,
        search,
        rag,
        deferred,
        generator,
        external,
        cancel,
        watcher: Some(watcher),
    };

    Ok((project, outcome))
}

#[allow(clippy::too_many_arguments)]
async fn build_external_collection(
    server_config: &Config,
    tenant: &TenantKey,
    registry: &DocTypeRegistry,
    ignore: &IgnoreRules,
    embedder: Arc<HttpEmbeddingClient>,
    health: Arc<HealthMonitor>,
    db_path: &str,
    external_root: std::path::PathBuf,
    cancel: &CancellationToken,
) -> Result<ExternalCollection> {
    if !external_root.is_dir() {
        return Err(DocsError::ConfigInvalid(format!(
            "external_docs.path is not a directory: {}",
            external_root.display()
        )));
    }

    let store: Arc<dyn VectorStore> = Arc::new(
        LanceVectorStore::open(db_path, CollectionKind::External).await?,
    );
    store.initialize().await?;

    let parser = DocumentParser::new(
        registry.clone(),
        server_config.indexing.chunk_threshold_lines,
    );
    let indexer = Arc::new(
        Indexer::new(
            tenant.clone(),
            external_root.clone(),
            parser,
            embedder.clone(),
            Arc::clone(&store),
            Arc::new(LinkGraph::new()),
            server_config.indexing.concurrency,
        )
        .external(),
    );

    // External docs have no watcher; deferrals here are only retried on the
    // next activation or rebuild, so the queue is local and discarded
    let scratch_queue = Arc::new(DeferredQueue::new(
        server_config.indexing.deferred_queue_capacity,
    ));
    let outcome = reconcile(&indexer, &scratch_queue, &health, ignore, cancel).await?;
    if outcome.deferred > 0 {
        tracing::warn!(
            "{} external docs not indexed (embedding unavailable); re-activate to retry",
            outcome.deferred
        );
    }

    let search = Arc::new(SearchService::new(
        embedder as Arc<dyn crate::embedding::EmbeddingProvider>,
        Arc::clone(&store),
    ));
    let rag = Arc::new(RagRetriever::new(
        Arc::clone(&search),
        Arc::clone(&store),
        None,
        ExpansionLimits {
            enabled: false,
            max_linked_docs: 0,
            max_link_depth: 0,
            max_traversal_nodes: 0,
        },
    ));

    Ok(ExternalCollection {
        docs_root: external_root,
        store,
        indexer,
        search,
        rag,
    })
}
