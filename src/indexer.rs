//! Indexing pipeline: bring the vector store into agreement with one file.
//!
//! parse -> embed -> upsert, idempotent on content hash. A document exists in
//! the store only after a successful embedding; parse or embed failures leave
//! no half-written record. Embeddings within one document are generated
//! sequentially; distinct documents index in parallel up to the configured
//! concurrency.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::embedding::EmbeddingProvider;
use crate::error::{DocsError, Result};
use crate::link_graph::LinkGraph;
use crate::parser::DocumentParser;
use crate::tenant::{TenantKey, content_hash};
use crate::types::PromotionLevel;
use crate::vector_store::{ChunkRecord, DocumentRecord, VectorStore};

/// What an index operation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Document (re-)indexed, with this many chunk records
    Indexed { chunks: usize },
    /// Content hash unchanged; the store was not touched
    Skipped,
}

/// Orchestrates parse -> embed -> upsert for one collection
pub struct Indexer {
    tenant: TenantKey,
    docs_root: PathBuf,
    parser: DocumentParser,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    link_graph: Arc<LinkGraph>,
    /// Bounds how many documents embed in parallel
    permits: Arc<Semaphore>,
    /// External docs carry no promotion level
    external: bool,
}

impl Indexer {
    pub fn new(
        tenant: TenantKey,
        docs_root: PathBuf,
        parser: DocumentParser,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        link_graph: Arc<LinkGraph>,
        concurrency: usize,
    ) -> Self {
        Self {
            tenant,
            docs_root,
            parser,
            embedder,
            store,
            link_graph,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            external: false,
        }
    }

    /// Mark this indexer as serving the external collection: promotion is
    /// pinned to standard
    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }

    pub fn tenant(&self) -> &TenantKey {
        &self.tenant
    }

    pub fn docs_root(&self) -> &PathBuf {
        &self.docs_root
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn link_graph(&self) -> &Arc<LinkGraph> {
        &self.link_graph
    }

    /// Index one document by docs-relative path.
    ///
    /// Never mutates the store on failure; `EmbeddingUnavailable` bubbles up
    /// so the caller can defer the event.
    pub async fn index_path(
        &self,
        relative_path: &str,
        cancel: &CancellationToken,
    ) -> Result<IndexOutcome> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| DocsError::Cancelled)?;
        if cancel.is_cancelled() {
            return Err(DocsError::Cancelled);
        }

        let absolute = self.docs_root.join(relative_path);
        let bytes = match tokio::fs::read(&absolute).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DocsError::DocumentNotFound(relative_path.to_string()));
            }
            Err(e) => return Err(DocsError::FileSystem(format!("{}: {e}", absolute.display()))),
        };

        let hash = content_hash(&bytes);
        let existing = self.store.get_meta(&self.tenant, relative_path).await?;
        if let Some(meta) = &existing
            && meta.content_hash == hash
        {
            tracing::debug!("{} unchanged, skipping", relative_path);
            return Ok(IndexOutcome::Skipped);
        }

        let parsed = self.parser.parse(relative_path, &bytes)?;
        let promotion_level = if self.external {
            PromotionLevel::Standard
        } else {
            parsed.promotion_level
        };

        // Primary embedding over title + body; chunk embeddings follow
        // sequentially so one document never floods the generator
        let embed_input = format!("{}\n\n{}", parsed.title, parsed.body);
        let document_embedding = self.embedder.embed(embed_input.trim()).await?;

        let document_id = self.tenant.document_id(relative_path);
        let mut chunk_records = Vec::with_capacity(parsed.chunks.len());
        for (index, chunk) in parsed.chunks.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(DocsError::Cancelled);
            }
            let embedding = self.embedder.embed(&chunk.text).await?;
            chunk_records.push(ChunkRecord {
                id: format!("{document_id}:{index}"),
                document_id: document_id.clone(),
                chunk_index: index,
                header_path: chunk.header_path.clone(),
                text: chunk.text.clone(),
                embedding,
                promotion_level,
                tenant: self.tenant.clone(),
                relative_path: relative_path.to_string(),
                doc_type: parsed.doc_type.clone(),
                title: parsed.title.clone(),
            });
        }

        let now = Utc::now();
        let record = DocumentRecord {
            id: document_id,
            tenant: self.tenant.clone(),
            relative_path: relative_path.to_string(),
            doc_type: parsed.doc_type.clone(),
            title: parsed.title.clone(),
            summary: parsed.summary.clone(),
            char_count: parsed.char_count,
            content_hash: hash,
            frontmatter_json: parsed.frontmatter_json.clone(),
            promotion_level,
            body: parsed.body.clone(),
            embedding: document_embedding,
            created_at: existing.map(|m| m.created_at).unwrap_or(now),
            updated_at: now,
        };

        let chunk_count = chunk_records.len();
        self.store.upsert(record, chunk_records).await?;

        // Link edges rebuild only after the store write commits
        self.link_graph
            .replace_out_edges(relative_path, parsed.links.clone());

        tracing::info!(
            "Indexed {} ({} chars, {} chunks)",
            relative_path,
            parsed.char_count,
            chunk_count
        );
        Ok(IndexOutcome::Indexed {
            chunks: chunk_count,
        })
    }

    /// Apply one observed file change to the store.
    ///
    /// Renames arrive from the watcher already split into delete + create
    /// pairs, so only creation, modification and deletion land here.
    pub async fn apply_change(
        &self,
        relative_path: &str,
        change: crate::types::ChangeType,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match change {
            crate::types::ChangeType::Deleted => {
                self.delete_path(relative_path).await?;
                Ok(())
            }
            _ => match self.index_path(relative_path, cancel).await {
                Ok(_) => Ok(()),
                // The file can vanish between the event and the read
                Err(DocsError::DocumentNotFound(_)) => {
                    self.delete_path(relative_path).await?;
                    Ok(())
                }
                Err(e) => Err(e),
            },
        }
    }

    /// Remove a document from the store and the link graph
    pub async fn delete_path(&self, relative_path: &str) -> Result<bool> {
        let removed = self.store.delete(&self.tenant, relative_path).await?;
        self.link_graph.remove_node(relative_path);
        if removed {
            tracing::info!("Removed {} from index", relative_path);
        }
        Ok(removed)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic in-process embedder for tests: no network, fixed
    //! dimension, distinct inputs map to near-orthogonal unit vectors.

    use super::*;
    use crate::types::EMBEDDING_DIMENSION;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    pub struct StubEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.trim().is_empty() {
                return Err(DocsError::invalid_argument("cannot embed empty text"));
            }
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            let axis = (hasher.finish() as usize) % EMBEDDING_DIMENSION;
            let mut v = vec![0.0; EMBEDDING_DIMENSION];
            v[axis] = 1.0;
            Ok(v)
        }

        fn dimension(&self) -> usize {
            EMBEDDING_DIMENSION
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    /// An embedder that always reports the service as unavailable
    pub struct DownEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingProvider for DownEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(DocsError::EmbeddingUnavailable {
                state: crate::embedding::CircuitState::Open,
                retry_after_seconds: 30,
                hint: None,
            })
        }

        fn dimension(&self) -> usize {
            EMBEDDING_DIMENSION
        }

        fn model_name(&self) -> &str {
            "down-stub"
        }
    }
}
