//! LanceDB vector store (embedded, no server required)
//!
//! Two tables per collection: `documents` and `chunks`, each carrying the
//! tenant triple as plain columns for filter pushdown. LanceDB has no
//! cross-table transactions, so all writes serialize behind a store-level
//! RwLock; searches take the read side and therefore observe either the
//! pre-upsert or the post-upsert state of a document and its chunks.

use std::sync::Arc;

use arrow_array::{
    FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray, UInt32Array,
    types::Float32Type,
};
use arrow_schema::{DataType, Field, Schema};
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use lancedb::DistanceType;
use lancedb::Table;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use tokio::sync::RwLock;

use crate::error::{DocsError, Result};
use crate::tenant::TenantKey;
use crate::types::{EMBEDDING_DIMENSION, PromotionLevel};
use crate::vector_store::{
    ChunkHit, ChunkRecord, DocHit, DocumentRecord, SearchFilter, StoredDocMeta, VectorStore,
};

/// Which collection a store instance serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    /// The project's own docs
    Primary,
    /// The separately indexed external docs
    External,
}

impl CollectionKind {
    fn documents_table(&self) -> &'static str {
        match self {
            CollectionKind::Primary => "documents",
            CollectionKind::External => "external_documents",
        }
    }

    fn chunks_table(&self) -> &'static str {
        match self {
            CollectionKind::Primary => "chunks",
            CollectionKind::External => "external_chunks",
        }
    }
}

/// LanceDB-backed implementation of [`VectorStore`]
pub struct LanceVectorStore {
    connection: Connection,
    documents_table: String,
    chunks_table: String,
    db_path: String,
    /// Serializes writes; searches take the read side
    gate: Arc<RwLock<()>>,
}

impl LanceVectorStore {
    /// Open (or create) a store at the given path for one collection
    pub async fn open(db_path: &str, kind: CollectionKind) -> Result<Self> {
        tracing::info!("Connecting to LanceDB at: {}", db_path);

        let connection = lancedb::connect(db_path)
            .execute()
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to connect to LanceDB: {e}")))?;

        Ok(Self {
            connection,
            documents_table: kind.documents_table().to_string(),
            chunks_table: kind.chunks_table().to_string(),
            db_path: db_path.to_string(),
            gate: Arc::new(RwLock::new(())),
        })
    }

    fn documents_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    EMBEDDING_DIMENSION as i32,
                ),
                false,
            ),
            Field::new("id", DataType::Utf8, false),
            Field::new("project_name", DataType::Utf8, false),
            Field::new("branch_name", DataType::Utf8, false),
            Field::new("path_hash", DataType::Utf8, false),
            Field::new("relative_path", DataType::Utf8, false),
            Field::new("doc_type", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("summary", DataType::Utf8, false),
            Field::new("char_count", DataType::UInt32, false),
            Field::new("content_hash", DataType::Utf8, false),
            Field::new("frontmatter", DataType::Utf8, false),
            Field::new("promotion_level", DataType::Utf8, false),
            Field::new("body", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
            Field::new("updated_at", DataType::Utf8, false),
        ]))
    }

    fn chunks_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    EMBEDDING_DIMENSION as i32,
                ),
                false,
            ),
            Field::new("id", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("header_path", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("promotion_level", DataType::Utf8, false),
            Field::new("project_name", DataType::Utf8, false),
            Field::new("branch_name", DataType::Utf8, false),
            Field::new("path_hash", DataType::Utf8, false),
            Field::new("relative_path", DataType::Utf8, false),
            Field::new("doc_type", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
        ]))
    }

    async fn get_table(&self, name: &str) -> Result<Table> {
        self.connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to open table '{name}': {e}")))
    }

    async fn ensure_table(&self, name: &str, schema: Arc<Schema>) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to list tables: {e}")))?;

        if table_names.contains(&name.to_string()) {
            return Ok(());
        }

        let empty_batch = RecordBatch::new_empty(schema.clone());
        let batches = RecordBatchIterator::new(vec![empty_batch].into_iter().map(Ok), schema);

        self.connection
            .create_table(name, Box::new(batches))
            .execute()
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to create table '{name}': {e}")))?;

        tracing::info!("Created table '{}' at {}", name, self.db_path);
        Ok(())
    }

    fn document_batch(document: &DocumentRecord) -> Result<RecordBatch> {
        let schema = Self::documents_schema();
        let vector_array = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            std::iter::once(Some(
                document.embedding.iter().copied().map(Some).collect::<Vec<_>>(),
            )),
            EMBEDDING_DIMENSION as i32,
        );

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(vector_array),
                Arc::new(StringArray::from(vec![document.id.as_str()])),
                Arc::new(StringArray::from(vec![
                    document.tenant.project_name.as_str(),
                ])),
                Arc::new(StringArray::from(vec![
                    document.tenant.branch_name.as_str(),
                ])),
                Arc::new(StringArray::from(vec![document.tenant.path_hash.as_str()])),
                Arc::new(StringArray::from(vec![document.relative_path.as_str()])),
                Arc::new(StringArray::from(vec![document.doc_type.as_str()])),
                Arc::new(StringArray::from(vec![document.title.as_str()])),
                Arc::new(StringArray::from(vec![document.summary.as_str()])),
                Arc::new(UInt32Array::from(vec![document.char_count as u32])),
                Arc::new(StringArray::from(vec![document.content_hash.as_str()])),
                Arc::new(StringArray::from(vec![document.frontmatter_json.as_str()])),
                Arc::new(StringArray::from(vec![
                    document.promotion_level.as_str(),
                ])),
                Arc::new(StringArray::from(vec![document.body.as_str()])),
                Arc::new(StringArray::from(vec![
                    document.created_at.to_rfc3339(),
                ])),
                Arc::new(StringArray::from(vec![
                    document.updated_at.to_rfc3339(),
                ])),
            ],
        )
        .map_err(|e| DocsError::VectorStore(format!("failed to build document batch: {e}")))
    }

    fn chunk_batch(chunks: &[ChunkRecord]) -> Result<RecordBatch> {
        let schema = Self::chunks_schema();
        let vector_array = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            chunks
                .iter()
                .map(|c| Some(c.embedding.iter().copied().map(Some).collect::<Vec<_>>())),
            EMBEDDING_DIMENSION as i32,
        );

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(vector_array),
                Arc::new(StringArray::from(
                    chunks.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(
                    chunks
                        .iter()
                        .map(|c| c.document_id.as_str())
                        .collect::<Vec<_>>(),
                )),
                Arc::new(UInt32Array::from(
                    chunks
                        .iter()
                        .map(|c| c.chunk_index as u32)
                        .collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(
                    chunks
                        .iter()
                        .map(|c| c.header_path.as_str())
                        .collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(
                    chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(
                    chunks
                        .iter()
                        .map(|c| c.promotion_level.as_str())
                        .collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(
                    chunks
                        .iter()
                        .map(|c| c.tenant.project_name.as_str())
                        .collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(
                    chunks
                        .iter()
                        .map(|c| c.tenant.branch_name.as_str())
                        .collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(
                    chunks
                        .iter()
                        .map(|c| c.tenant.path_hash.as_str())
                        .collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(
                    chunks
                        .iter()
                        .map(|c| c.relative_path.as_str())
                        .collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(
                    chunks
                        .iter()
                        .map(|c| c.doc_type.as_str())
                        .collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(
                    chunks.iter().map(|c| c.title.as_str()).collect::<Vec<_>>(),
                )),
            ],
        )
        .map_err(|e| DocsError::VectorStore(format!("failed to build chunk batch: {e}")))
    }

    fn tenant_predicate(tenant: &TenantKey) -> String {
        format!(
            "project_name = '{}' AND branch_name = '{}' AND path_hash = '{}'",
            sql_quote(&tenant.project_name),
            sql_quote(&tenant.branch_name),
            sql_quote(&tenant.path_hash)
        )
    }

    fn key_predicate(tenant: &TenantKey, relative_path: &str) -> String {
        format!(
            "{} AND relative_path = '{}'",
            Self::tenant_predicate(tenant),
            sql_quote(relative_path)
        )
    }

    fn filter_predicate(filter: &SearchFilter) -> String {
        let mut predicate = Self::tenant_predicate(&filter.tenant);
        if !filter.doc_types.is_empty() {
            predicate.push_str(&format!(" AND doc_type IN ({})", sql_in(&filter.doc_types)));
        }
        if !filter.promotion_levels.is_empty() {
            let levels: Vec<String> = filter
                .promotion_levels
                .iter()
                .map(|l| l.as_str().to_string())
                .collect();
            predicate.push_str(&format!(" AND promotion_level IN ({})", sql_in(&levels)));
        }
        predicate
    }

    async fn collect_batches<S>(stream: S) -> Result<Vec<RecordBatch>>
    where
        S: futures::TryStream<Ok = RecordBatch>,
        S::Error: std::fmt::Display,
    {
        stream
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to collect results: {e}")))
    }
}

fn sql_quote(value: &str) -> String {
    value.replace('\'', "''")
}

fn sql_in(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("'{}'", sql_quote(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Map a cosine distance to a similarity score in [0, 1]
fn distance_to_score(distance: f32) -> f32 {
    (1.0 - distance).clamp(0.0, 1.0)
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| DocsError::VectorStore(format!("missing column '{name}'")))
}

fn u32_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
        .ok_or_else(|| DocsError::VectorStore(format!("missing column '{name}'")))
}

fn f32_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| DocsError::VectorStore(format!("missing column '{name}'")))
}

fn parse_level(value: &str) -> PromotionLevel {
    PromotionLevel::parse(value).unwrap_or_default()
}

fn parse_time(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn doc_hit_from_row(batch: &RecordBatch, i: usize, score: f32) -> Result<DocHit> {
    Ok(DocHit {
        id: string_col(batch, "id")?.value(i).to_string(),
        relative_path: string_col(batch, "relative_path")?.value(i).to_string(),
        doc_type: string_col(batch, "doc_type")?.value(i).to_string(),
        title: string_col(batch, "title")?.value(i).to_string(),
        summary: string_col(batch, "summary")?.value(i).to_string(),
        promotion_level: parse_level(string_col(batch, "promotion_level")?.value(i)),
        body: string_col(batch, "body")?.value(i).to_string(),
        score,
    })
}

fn chunk_hit_from_row(batch: &RecordBatch, i: usize, score: f32) -> Result<ChunkHit> {
    Ok(ChunkHit {
        id: string_col(batch, "id")?.value(i).to_string(),
        document_id: string_col(batch, "document_id")?.value(i).to_string(),
        relative_path: string_col(batch, "relative_path")?.value(i).to_string(),
        doc_type: string_col(batch, "doc_type")?.value(i).to_string(),
        title: string_col(batch, "title")?.value(i).to_string(),
        chunk_index: u32_col(batch, "chunk_index")?.value(i) as usize,
        header_path: string_col(batch, "header_path")?.value(i).to_string(),
        text: string_col(batch, "text")?.value(i).to_string(),
        promotion_level: parse_level(string_col(batch, "promotion_level")?.value(i)),
        score,
    })
}

#[async_trait::async_trait]
impl VectorStore for LanceVectorStore {
    async fn initialize(&self) -> Result<()> {
        let _write = self.gate.write().await;
        self.ensure_table(&self.documents_table, Self::documents_schema())
            .await?;
        self.ensure_table(&self.chunks_table, Self::chunks_schema())
            .await?;
        Ok(())
    }

    async fn upsert(&self, document: DocumentRecord, chunks: Vec<ChunkRecord>) -> Result<()> {
        if document.embedding.len() != EMBEDDING_DIMENSION {
            return Err(DocsError::VectorStore(format!(
                "document embedding has {} dimensions, expected {}",
                document.embedding.len(),
                EMBEDDING_DIMENSION
            )));
        }
        for chunk in &chunks {
            if chunk.embedding.len() != EMBEDDING_DIMENSION {
                return Err(DocsError::VectorStore(format!(
                    "chunk embedding has {} dimensions, expected {}",
                    chunk.embedding.len(),
                    EMBEDDING_DIMENSION
                )));
            }
        }

        let _write = self.gate.write().await;

        let documents = self.get_table(&self.documents_table).await?;
        let chunks_table = self.get_table(&self.chunks_table).await?;
        let key = Self::key_predicate(&document.tenant, &document.relative_path);

        // Replace the previous version and its entire chunk set
        chunks_table
            .delete(&format!("document_id = '{}'", sql_quote(&document.id)))
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to delete old chunks: {e}")))?;
        documents
            .delete(&key)
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to delete old document: {e}")))?;

        let doc_batch = Self::document_batch(&document)?;
        let schema = Self::documents_schema();
        documents
            .add(Box::new(RecordBatchIterator::new(
                vec![doc_batch].into_iter().map(Ok),
                schema,
            )))
            .execute()
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to add document: {e}")))?;

        if !chunks.is_empty() {
            let chunk_batch = Self::chunk_batch(&chunks)?;
            let schema = Self::chunks_schema();
            chunks_table
                .add(Box::new(RecordBatchIterator::new(
                    vec![chunk_batch].into_iter().map(Ok),
                    schema,
                )))
                .execute()
                .await
                .map_err(|e| DocsError::VectorStore(format!("failed to add chunks: {e}")))?;
        }

        tracing::debug!(
            "Upserted {} with {} chunks",
            document.relative_path,
            chunks.len()
        );
        Ok(())
    }

    async fn delete(&self, tenant: &TenantKey, relative_path: &str) -> Result<bool> {
        let _write = self.gate.write().await;

        let documents = self.get_table(&self.documents_table).await?;
        let key = Self::key_predicate(tenant, relative_path);

        let existing = documents
            .count_rows(Some(key.clone()))
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to count rows: {e}")))?;
        if existing == 0 {
            return Ok(false);
        }

        let document_id = tenant.document_id(relative_path);
        let chunks_table = self.get_table(&self.chunks_table).await?;
        chunks_table
            .delete(&format!("document_id = '{}'", sql_quote(&document_id)))
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to delete chunks: {e}")))?;
        documents
            .delete(&key)
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to delete document: {e}")))?;

        tracing::debug!("Deleted {} from index", relative_path);
        Ok(true)
    }

    async fn get_meta(
        &self,
        tenant: &TenantKey,
        relative_path: &str,
    ) -> Result<Option<StoredDocMeta>> {
        let _read = self.gate.read().await;
        let documents = self.get_table(&self.documents_table).await?;

        let stream = documents
            .query()
            .only_if(Self::key_predicate(tenant, relative_path))
            .execute()
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to query document: {e}")))?;
        let batches = Self::collect_batches(stream).await?;

        for batch in &batches {
            if batch.num_rows() > 0 {
                return Ok(Some(StoredDocMeta {
                    relative_path: string_col(batch, "relative_path")?.value(0).to_string(),
                    doc_type: string_col(batch, "doc_type")?.value(0).to_string(),
                    content_hash: string_col(batch, "content_hash")?.value(0).to_string(),
                    promotion_level: parse_level(string_col(batch, "promotion_level")?.value(0)),
                    created_at: parse_time(string_col(batch, "created_at")?.value(0)),
                    updated_at: parse_time(string_col(batch, "updated_at")?.value(0)),
                }));
            }
        }
        Ok(None)
    }

    async fn get_document(
        &self,
        tenant: &TenantKey,
        relative_path: &str,
    ) -> Result<Option<DocHit>> {
        let _read = self.gate.read().await;
        let documents = self.get_table(&self.documents_table).await?;

        let stream = documents
            .query()
            .only_if(Self::key_predicate(tenant, relative_path))
            .execute()
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to query document: {e}")))?;
        let batches = Self::collect_batches(stream).await?;

        for batch in &batches {
            if batch.num_rows() > 0 {
                return Ok(Some(doc_hit_from_row(batch, 0, 0.0)?));
            }
        }
        Ok(None)
    }

    async fn count_by_doc_type(&self, tenant: &TenantKey, doc_type: &str) -> Result<usize> {
        let _read = self.gate.read().await;
        let documents = self.get_table(&self.documents_table).await?;
        let predicate = format!(
            "{} AND doc_type = '{}'",
            Self::tenant_predicate(tenant),
            sql_quote(doc_type)
        );
        documents
            .count_rows(Some(predicate))
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to count rows: {e}")))
    }

    async fn list(&self, tenant: &TenantKey) -> Result<Vec<StoredDocMeta>> {
        let _read = self.gate.read().await;
        let documents = self.get_table(&self.documents_table).await?;

        let stream = documents
            .query()
            .only_if(Self::tenant_predicate(tenant))
            .execute()
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to list documents: {e}")))?;
        let batches = Self::collect_batches(stream).await?;

        let mut out = Vec::new();
        for batch in &batches {
            for i in 0..batch.num_rows() {
                out.push(StoredDocMeta {
                    relative_path: string_col(batch, "relative_path")?.value(i).to_string(),
                    doc_type: string_col(batch, "doc_type")?.value(i).to_string(),
                    content_hash: string_col(batch, "content_hash")?.value(i).to_string(),
                    promotion_level: parse_level(string_col(batch, "promotion_level")?.value(i)),
                    created_at: parse_time(string_col(batch, "created_at")?.value(i)),
                    updated_at: parse_time(string_col(batch, "updated_at")?.value(i)),
                });
            }
        }
        Ok(out)
    }

    async fn search_documents(
        &self,
        query_vector: Vec<f32>,
        filter: &SearchFilter,
        top_k: usize,
    ) -> Result<Vec<DocHit>> {
        filter.validate()?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let _read = self.gate.read().await;
        let documents = self.get_table(&self.documents_table).await?;

        let stream = documents
            .vector_search(query_vector)
            .map_err(|e| DocsError::VectorStore(format!("failed to build search: {e}")))?
            .distance_type(DistanceType::Cosine)
            .only_if(Self::filter_predicate(filter))
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to execute search: {e}")))?;
        let batches = Self::collect_batches(stream).await?;

        let mut hits = Vec::new();
        for batch in &batches {
            let distances = f32_col(batch, "_distance")?;
            for i in 0..batch.num_rows() {
                let score = distance_to_score(distances.value(i));
                hits.push(doc_hit_from_row(batch, i, score)?);
            }
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(hits)
    }

    async fn search_chunks(
        &self,
        query_vector: Vec<f32>,
        filter: &SearchFilter,
        top_k: usize,
    ) -> Result<Vec<ChunkHit>> {
        filter.validate()?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let _read = self.gate.read().await;
        let chunks = self.get_table(&self.chunks_table).await?;

        let stream = chunks
            .vector_search(query_vector)
            .map_err(|e| DocsError::VectorStore(format!("failed to build search: {e}")))?
            .distance_type(DistanceType::Cosine)
            .only_if(Self::filter_predicate(filter))
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to execute search: {e}")))?;
        let batches = Self::collect_batches(stream).await?;

        let mut hits = Vec::new();
        for batch in &batches {
            let distances = f32_col(batch, "_distance")?;
            for i in 0..batch.num_rows() {
                let score = distance_to_score(distances.value(i));
                hits.push(chunk_hit_from_row(batch, i, score)?);
            }
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(hits)
    }

    async fn update_promotion(
        &self,
        tenant: &TenantKey,
        relative_path: &str,
        level: PromotionLevel,
    ) -> Result<bool> {
        let _write = self.gate.write().await;

        let documents = self.get_table(&self.documents_table).await?;
        let key = Self::key_predicate(tenant, relative_path);

        let existing = documents
            .count_rows(Some(key.clone()))
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to count rows: {e}")))?;
        if existing == 0 {
            return Ok(false);
        }

        let level_sql = format!("'{}'", level.as_str());
        documents
            .update()
            .only_if(key)
            .column("promotion_level", level_sql.clone())
            .column("updated_at", format!("'{}'", Utc::now().to_rfc3339()))
            .execute()
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to update document: {e}")))?;

        // Chunks inherit the parent's promotion level
        let document_id = tenant.document_id(relative_path);
        let chunks = self.get_table(&self.chunks_table).await?;
        chunks
            .update()
            .only_if(format!("document_id = '{}'", sql_quote(&document_id)))
            .column("promotion_level", level_sql)
            .execute()
            .await
            .map_err(|e| DocsError::VectorStore(format!("failed to update chunks: {e}")))?;

        Ok(true)
    }
}
