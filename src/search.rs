//! Tenant-isolated similarity search over documents and chunks.
//!
//! Document and chunk sub-queries run concurrently; results below the score
//! threshold are dropped, and a chunk that outscores its parent document
//! replaces the document entry so one document never appears twice.

use std::collections::HashMap;
use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::types::{PromotionLevel, SearchHitView};
use crate::vector_store::{ChunkHit, DocHit, SearchFilter, VectorStore};

const SNIPPET_CHARS: usize = 240;

/// A merged hit: a whole document or one chunk of a large document
#[derive(Debug, Clone)]
pub enum SearchHit {
    Document(DocHit),
    Chunk(ChunkHit),
}

impl SearchHit {
    pub fn score(&self) -> f32 {
        match self {
            SearchHit::Document(d) => d.score,
            SearchHit::Chunk(c) => c.score,
        }
    }

    pub fn document_id(&self) -> &str {
        match self {
            SearchHit::Document(d) => &d.id,
            SearchHit::Chunk(c) => &c.document_id,
        }
    }

    pub fn relative_path(&self) -> &str {
        match self {
            SearchHit::Document(d) => &d.relative_path,
            SearchHit::Chunk(c) => &c.relative_path,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            SearchHit::Document(d) => &d.title,
            SearchHit::Chunk(c) => &c.title,
        }
    }

    pub fn doc_type(&self) -> &str {
        match self {
            SearchHit::Document(d) => &d.doc_type,
            SearchHit::Chunk(c) => &c.doc_type,
        }
    }

    pub fn promotion_level(&self) -> PromotionLevel {
        match self {
            SearchHit::Document(d) => d.promotion_level,
            SearchHit::Chunk(c) => c.promotion_level,
        }
    }

    pub fn header_path(&self) -> Option<&str> {
        match self {
            SearchHit::Document(_) => None,
            SearchHit::Chunk(c) => Some(&c.header_path),
        }
    }

    /// The text carried into RAG context or shown as a snippet
    pub fn text(&self) -> &str {
        match self {
            SearchHit::Document(d) => &d.body,
            SearchHit::Chunk(c) => &c.text,
        }
    }

    pub fn to_view(&self) -> SearchHitView {
        SearchHitView {
            relative_path: self.relative_path().to_string(),
            title: self.title().to_string(),
            doc_type: self.doc_type().to_string(),
            score: self.score(),
            promotion_level: self.promotion_level(),
            kind: match self {
                SearchHit::Document(_) => "document".to_string(),
                SearchHit::Chunk(_) => "chunk".to_string(),
            },
            header_path: self.header_path().map(str::to_string),
            snippet: snippet(self.text()),
        }
    }
}

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= SNIPPET_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(SNIPPET_CHARS).collect();
        format!("{cut}…")
    }
}

/// Similarity search with score thresholding and chunk/document merging
pub struct SearchService {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl SearchService {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embedder.embed(query).await
    }

    /// Embed the query and run the merged search
    pub async fn search(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.embed_query(query).await?;
        self.search_with_vector(query_vector, filter, limit, min_score)
            .await
    }

    /// Merged search over documents and chunks with an existing query vector
    pub async fn search_with_vector(
        &self,
        query_vector: Vec<f32>,
        filter: &SearchFilter,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        filter.validate()?;

        // Over-fetch both sides so the merge still fills the limit
        let fetch = limit.saturating_mul(2);
        let (documents, chunks) = tokio::join!(
            self.store.search_documents(query_vector.clone(), filter, fetch),
            self.store.search_chunks(query_vector, filter, fetch),
        );
        let documents = documents?;
        let chunks = chunks?;

        let mut merged = merge_hits(documents, chunks, min_score);
        merged.truncate(limit);
        Ok(merged)
    }
}

/// Threshold, deduplicate and rank hits; a chunk replaces its parent document
/// entry when it scores higher
pub fn merge_hits(documents: Vec<DocHit>, chunks: Vec<ChunkHit>, min_score: f32) -> Vec<SearchHit> {
    let mut by_document: HashMap<String, SearchHit> = HashMap::new();

    for doc in documents {
        if doc.score < min_score {
            continue;
        }
        by_document.insert(doc.id.clone(), SearchHit::Document(doc));
    }

    for chunk in chunks {
        if chunk.score < min_score {
            continue;
        }
        match by_document.get(&chunk.document_id) {
            Some(existing) if existing.score() >= chunk.score => {}
            _ => {
                by_document.insert(chunk.document_id.clone(), SearchHit::Chunk(chunk));
            }
        }
    }

    let mut hits: Vec<SearchHit> = by_document.into_values().collect();
    hits.sort_by(|a, b| b.score().total_cmp(&a.score()));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, path: &str, score: f32) -> DocHit {
        DocHit {
            id: id.to_string(),
            relative_path: path.to_string(),
            doc_type: "problem".into(),
            title: path.to_string(),
            summary: String::new(),
            promotion_level: PromotionLevel::Standard,
            body: format!("body of {path}"),
            score,
        }
    }

    fn chunk(document_id: &str, path: &str, index: usize, score: f32) -> ChunkHit {
        ChunkHit {
            id: format!("{document_id}:{index}"),
            document_id: document_id.to_string(),
            relative_path: path.to_string(),
            doc_type: "problem".into(),
            title: path.to_string(),
            chunk_index: index,
            header_path: "## Section".into(),
            text: format!("chunk {index} of {path}"),
            promotion_level: PromotionLevel::Standard,
            score,
        }
    }

    #[test]
    fn test_merge_drops_below_threshold() {
        let hits = merge_hits(
            vec![doc("d1", "a.md", 0.9), doc("d2", "b.md", 0.3)],
            vec![chunk("d3", "c.md", 0, 0.4)],
            0.5,
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].relative_path(), "a.md");
    }

    #[test]
    fn test_chunk_beats_document() {
        let hits = merge_hits(
            vec![doc("d1", "arch.md", 0.62)],
            vec![chunk("d1", "arch.md", 3, 0.88)],
            0.5,
        );
        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert!((hit.score() - 0.88).abs() < 1e-6);
        assert_eq!(hit.header_path(), Some("## Section"));
        assert_eq!(hit.relative_path(), "arch.md");
    }

    #[test]
    fn test_document_beats_weaker_chunk() {
        let hits = merge_hits(
            vec![doc("d1", "arch.md", 0.9)],
            vec![chunk("d1", "arch.md", 0, 0.7)],
            0.5,
        );
        assert_eq!(hits.len(), 1);
        assert!(matches!(hits[0], SearchHit::Document(_)));
    }

    #[test]
    fn test_orphan_chunk_included() {
        let hits = merge_hits(vec![], vec![chunk("d9", "long.md", 2, 0.8)], 0.5);
        assert_eq!(hits.len(), 1);
        assert!(matches!(hits[0], SearchHit::Chunk(_)));
    }

    #[test]
    fn test_ranking_descending() {
        let hits = merge_hits(
            vec![doc("d1", "a.md", 0.6), doc("d2", "b.md", 0.95)],
            vec![chunk("d3", "c.md", 0, 0.8)],
            0.5,
        );
        let scores: Vec<f32> = hits.iter().map(|h| h.score()).collect();
        assert_eq!(scores, vec![0.95, 0.8, 0.6]);
    }

    #[test]
    fn test_view_projection() {
        let view = SearchHit::Chunk(chunk("d1", "arch.md", 1, 0.8)).to_view();
        assert_eq!(view.kind, "chunk");
        assert_eq!(view.header_path.as_deref(), Some("## Section"));
        assert_eq!(view.relative_path, "arch.md");

        let view = SearchHit::Document(doc("d1", "a.md", 0.9)).to_view();
        assert_eq!(view.kind, "document");
        assert!(view.header_path.is_none());
    }

    #[test]
    fn test_snippet_truncation() {
        let long = "x".repeat(1000);
        let cut = snippet(&long);
        assert!(cut.chars().count() <= SNIPPET_CHARS + 1);
        assert!(cut.ends_with('…'));
        assert_eq!(snippet("short"), "short");
    }
}
