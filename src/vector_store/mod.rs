// LanceDB is the embedded vector database backing both collections
mod lance;
pub use lance::{CollectionKind, LanceVectorStore};

use chrono::{DateTime, Utc};

use crate::error::{DocsError, Result};
use crate::tenant::TenantKey;
use crate::types::PromotionLevel;

/// A document as persisted in the store
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: String,
    pub tenant: TenantKey,
    pub relative_path: String,
    pub doc_type: String,
    pub title: String,
    pub summary: String,
    pub char_count: usize,
    pub content_hash: String,
    /// Frontmatter retained verbatim as JSON
    pub frontmatter_json: String,
    pub promotion_level: PromotionLevel,
    pub body: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One chunk of a large document; the tenant columns are copied from the
/// parent for filter indexing
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub header_path: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub promotion_level: PromotionLevel,
    pub tenant: TenantKey,
    pub relative_path: String,
    pub doc_type: String,
    pub title: String,
}

/// Constraints applied to a similarity search
#[derive(Debug, Clone)]
pub struct SearchFilter {
    pub tenant: TenantKey,
    pub doc_types: Vec<String>,
    pub promotion_levels: Vec<PromotionLevel>,
}

impl SearchFilter {
    pub fn for_tenant(tenant: TenantKey) -> Self {
        Self {
            tenant,
            doc_types: Vec::new(),
            promotion_levels: Vec::new(),
        }
    }

    /// Every search must be scoped by the full tenant triple
    pub fn validate(&self) -> Result<()> {
        if self.tenant.project_name.trim().is_empty()
            || self.tenant.branch_name.trim().is_empty()
            || self.tenant.path_hash.trim().is_empty()
        {
            return Err(DocsError::invalid_argument(
                "search filter requires project_name, branch_name and path_hash",
            ));
        }
        Ok(())
    }
}

/// A scored document hit
#[derive(Debug, Clone)]
pub struct DocHit {
    pub id: String,
    pub relative_path: String,
    pub doc_type: String,
    pub title: String,
    pub summary: String,
    pub promotion_level: PromotionLevel,
    pub body: String,
    /// Similarity in [0, 1]
    pub score: f32,
}

/// A scored chunk hit
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub id: String,
    pub document_id: String,
    pub relative_path: String,
    pub doc_type: String,
    pub title: String,
    pub chunk_index: usize,
    pub header_path: String,
    pub text: String,
    pub promotion_level: PromotionLevel,
    pub score: f32,
}

/// Per-document metadata used by reconciliation and idempotence checks
#[derive(Debug, Clone)]
pub struct StoredDocMeta {
    pub relative_path: String,
    pub doc_type: String,
    pub content_hash: String,
    pub promotion_level: PromotionLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Trait for tenant-isolated vector storage of documents and chunks
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Create tables if needed
    async fn initialize(&self) -> Result<()>;

    /// Insert or replace a document and atomically replace its chunk set
    async fn upsert(&self, document: DocumentRecord, chunks: Vec<ChunkRecord>) -> Result<()>;

    /// Remove a document and its chunks; returns false when nothing was stored
    async fn delete(&self, tenant: &TenantKey, relative_path: &str) -> Result<bool>;

    /// Exact-lookup metadata by primary key
    async fn get_meta(
        &self,
        tenant: &TenantKey,
        relative_path: &str,
    ) -> Result<Option<StoredDocMeta>>;

    /// Exact-lookup full document (without embedding) by primary key
    async fn get_document(
        &self,
        tenant: &TenantKey,
        relative_path: &str,
    ) -> Result<Option<DocHit>>;

    async fn count_by_doc_type(&self, tenant: &TenantKey, doc_type: &str) -> Result<usize>;

    /// Enumerate stored documents for reconciliation
    async fn list(&self, tenant: &TenantKey) -> Result<Vec<StoredDocMeta>>;

    /// ANN search over documents, ranked by cosine similarity descending
    async fn search_documents(
        &self,
        query_vector: Vec<f32>,
        filter: &SearchFilter,
        top_k: usize,
    ) -> Result<Vec<DocHit>>;

    /// ANN search over chunks, ranked by cosine similarity descending
    async fn search_chunks(
        &self,
        query_vector: Vec<f32>,
        filter: &SearchFilter,
        top_k: usize,
    ) -> Result<Vec<ChunkHit>>;

    /// Rewrite the promotion level of a document and its chunks
    async fn update_promotion(
        &self,
        tenant: &TenantKey,
        relative_path: &str,
        level: PromotionLevel,
    ) -> Result<bool>;
}
