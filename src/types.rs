use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Dimension every stored embedding must have
pub const EMBEDDING_DIMENSION: usize = 1024;

/// Server-side cap for search result limits; larger requests are clamped
pub const MAX_SEARCH_LIMIT: usize = 50;

const MAX_QUERY_LENGTH: usize = 10_240; // 10KB

/// Three-valued document ranking that influences RAG inclusion
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum PromotionLevel {
    Standard,
    Important,
    Critical,
}

impl Default for PromotionLevel {
    fn default() -> Self {
        PromotionLevel::Standard
    }
}

impl PromotionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionLevel::Standard => "standard",
            PromotionLevel::Important => "important",
            PromotionLevel::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "standard" => Some(PromotionLevel::Standard),
            "important" => Some(PromotionLevel::Important),
            "critical" => Some(PromotionLevel::Critical),
            _ => None,
        }
    }

    /// The upward-closed set of levels admitted by a minimum level
    pub fn allowed_from(min: PromotionLevel) -> Vec<PromotionLevel> {
        [
            PromotionLevel::Standard,
            PromotionLevel::Important,
            PromotionLevel::Critical,
        ]
        .into_iter()
        .filter(|level| *level >= min)
        .collect()
    }
}

/// Kind of change observed on a watched file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
    Renamed,
}

/// Request to activate a project for this session
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ActivateProjectRequest {
    /// Absolute path to the project root containing .csharp-compounding-docs/
    pub root_path: String,
}

impl ActivateProjectRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.root_path.trim().is_empty() {
            return Err("root_path cannot be empty".to_string());
        }
        let path = std::path::Path::new(&self.root_path);
        if !path.is_absolute() {
            return Err(format!("root_path must be absolute: {}", self.root_path));
        }
        Ok(())
    }
}

/// Response from project activation
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ActivateProjectResponse {
    pub project_name: String,
    pub branch_name: String,
    pub path_hash: String,
    /// Docs directory being watched and indexed
    pub docs_root: String,
    /// Registered doc types (built-in plus custom)
    pub doc_types: Vec<String>,
    /// Whether a separate external-docs collection is configured
    pub external_docs_enabled: bool,
    /// Files enqueued by start-up reconciliation
    pub reconciliation_enqueued: usize,
}

/// Request to explicitly (re-)index one document
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexDocumentRequest {
    /// Path relative to the docs root, forward slashes, .md extension
    pub relative_path: String,
}

/// Response from an explicit index operation
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexDocumentResponse {
    /// "indexed" or "skipped" (content hash unchanged)
    pub status: String,
    pub path: String,
    pub embedding_dimensions: usize,
    /// Number of chunk records written (0 for small documents)
    pub chunks: usize,
}

/// Request for tenant-scoped semantic search
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SemanticSearchRequest {
    /// Natural-language search query
    pub query: String,
    /// Restrict results to these doc types
    #[serde(default)]
    pub doc_types: Vec<String>,
    /// Number of results to return (default: 10, server cap: 50)
    #[serde(default = "default_search_limit")]
    pub limit: usize,
    /// Minimum similarity score (0.0 to 1.0, default: 0.5)
    #[serde(default = "default_search_min_score")]
    pub min_relevance_score: f32,
    /// Restrict results to these promotion levels
    #[serde(default)]
    pub promotion_levels: Vec<PromotionLevel>,
}

pub(crate) fn default_search_limit() -> usize {
    10
}

pub(crate) fn default_search_min_score() -> f32 {
    0.5
}

impl SemanticSearchRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_query(&self.query)?;
        validate_score(self.min_relevance_score)?;
        Ok(())
    }

    /// The documented cap: over-limit requests are clamped, not rejected
    pub fn clamped_limit(&self) -> usize {
        self.limit.min(MAX_SEARCH_LIMIT)
    }
}

/// A single search hit: either a whole document or one chunk of a large document
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchHitView {
    pub relative_path: String,
    pub title: String,
    pub doc_type: String,
    /// Similarity score in [0, 1]
    pub score: f32,
    pub promotion_level: PromotionLevel,
    /// "document" or "chunk"
    pub kind: String,
    /// Heading ancestry for chunk hits, e.g. "## Design > ### Locking"
    #[serde(default)]
    pub header_path: Option<String>,
    /// Leading text of the matched document or chunk
    pub snippet: String,
}

/// Response from semantic search
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SemanticSearchResponse {
    pub results: Vec<SearchHitView>,
    pub duration_ms: u64,
}

/// Request for RAG retrieval (and synthesis when a generator is configured)
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RagQueryRequest {
    /// The question to answer from the indexed documents
    pub query: String,
    /// Restrict retrieval to these doc types
    #[serde(default)]
    pub doc_types: Vec<String>,
    /// Maximum number of context sources (default: 3)
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
    /// Minimum similarity score for relevance-selected sources (default: 0.7)
    #[serde(default = "default_rag_min_score")]
    pub min_relevance_score: f32,
    /// Only admit documents at or above this promotion level
    #[serde(default)]
    pub min_promotion_level: PromotionLevel,
    /// Prepend critical documents regardless of relevance (default: true)
    #[serde(default = "default_include_critical")]
    pub include_critical: bool,
}

pub(crate) fn default_max_sources() -> usize {
    3
}

pub(crate) fn default_rag_min_score() -> f32 {
    0.7
}

pub(crate) fn default_include_critical() -> bool {
    true
}

impl RagQueryRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_query(&self.query)?;
        validate_score(self.min_relevance_score)?;
        if self.max_sources > MAX_SEARCH_LIMIT {
            return Err(format!(
                "max_sources too large: {} (max: {})",
                self.max_sources, MAX_SEARCH_LIMIT
            ));
        }
        Ok(())
    }
}

/// One retrieved context source
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RagSourceView {
    pub relative_path: String,
    pub title: String,
    pub doc_type: String,
    pub score: f32,
    pub promotion_level: PromotionLevel,
    /// Set when the source is a chunk rather than a whole document
    #[serde(default)]
    pub header_path: Option<String>,
    /// Set when the source was pulled in by link expansion
    #[serde(default)]
    pub linked_from: Option<String>,
    /// True when the source was prepended for being critical
    pub critical: bool,
    /// The context text handed to the generator
    pub text: String,
}

/// Response from a RAG query
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RagQueryResponse {
    /// Synthesized answer; absent when no generator is configured
    #[serde(default)]
    pub answer: Option<String>,
    pub sources: Vec<RagSourceView>,
    pub duration_ms: u64,
}

/// Request for search over the external-docs collection
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExternalSearchRequest {
    pub query: String,
    /// Number of results to return (default: 10, server cap: 50)
    #[serde(default = "default_search_limit")]
    pub limit: usize,
    /// Minimum similarity score (default: 0.5)
    #[serde(default = "default_search_min_score")]
    pub min_relevance_score: f32,
}

impl ExternalSearchRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_query(&self.query)?;
        validate_score(self.min_relevance_score)?;
        Ok(())
    }

    pub fn clamped_limit(&self) -> usize {
        self.limit.min(MAX_SEARCH_LIMIT)
    }
}

/// Request for RAG retrieval over the external-docs collection
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExternalRagRequest {
    pub query: String,
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
    #[serde(default = "default_rag_min_score")]
    pub min_relevance_score: f32,
}

impl ExternalRagRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_query(&self.query)?;
        validate_score(self.min_relevance_score)?;
        if self.max_sources > MAX_SEARCH_LIMIT {
            return Err(format!(
                "max_sources too large: {} (max: {})",
                self.max_sources, MAX_SEARCH_LIMIT
            ));
        }
        Ok(())
    }
}

/// Request to list registered doc types
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListDocTypesRequest {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocTypeInfo {
    pub name: String,
    /// Folder under the docs root where this type's documents conventionally live
    pub folder: String,
    /// Whether a frontmatter schema is enforced for this type
    pub has_schema: bool,
    /// Indexed documents of this type for the active tenant
    pub document_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListDocTypesResponse {
    pub doc_types: Vec<DocTypeInfo>,
}

/// Request to delete documents from the index (files on disk are untouched)
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteDocumentsRequest {
    /// Docs-relative paths to remove from the index
    pub paths: Vec<String>,
}

impl DeleteDocumentsRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.paths.is_empty() {
            return Err("paths cannot be empty".to_string());
        }
        if self.paths.len() > 100 {
            return Err(format!(
                "too many paths: {} (max: 100)",
                self.paths.len()
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteDocumentsResponse {
    pub deleted: Vec<String>,
    pub missing: Vec<String>,
}

/// Request to change a document's promotion level
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdatePromotionRequest {
    pub path: String,
    pub level: PromotionLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdatePromotionResponse {
    pub path: String,
    pub promotion_level: PromotionLevel,
}

/// Request to re-run reconciliation against the files on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RebuildIndexRequest {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RebuildIndexResponse {
    pub created: usize,
    pub modified: usize,
    pub deleted: usize,
    /// Events parked on the deferred queue instead of applied
    pub deferred: usize,
}

/// Request for index status and embedding service health
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct IndexStatusRequest {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexStatusResponse {
    pub documents_total: usize,
    pub by_doc_type: Vec<DocTypeInfo>,
    /// Pending change events waiting for embedding service recovery
    pub deferred_events: usize,
    pub embedding: crate::health::HealthSnapshot,
}

fn validate_query(query: &str) -> Result<(), String> {
    if query.trim().is_empty() {
        return Err("query cannot be empty".to_string());
    }
    if query.len() > MAX_QUERY_LENGTH {
        return Err(format!(
            "query too long: {} bytes (max: {} bytes)",
            query.len(),
            MAX_QUERY_LENGTH
        ));
    }
    Ok(())
}

fn validate_score(score: f32) -> Result<(), String> {
    if !(0.0..=1.0).contains(&score) {
        return Err(format!(
            "min_relevance_score must be between 0.0 and 1.0, got: {score}"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_level_ordering() {
        assert!(PromotionLevel::Standard < PromotionLevel::Important);
        assert!(PromotionLevel::Important < PromotionLevel::Critical);
    }

    #[test]
    fn test_promotion_level_allowed_from() {
        assert_eq!(
            PromotionLevel::allowed_from(PromotionLevel::Standard),
            vec![
                PromotionLevel::Standard,
                PromotionLevel::Important,
                PromotionLevel::Critical
            ]
        );
        assert_eq!(
            PromotionLevel::allowed_from(PromotionLevel::Important),
            vec![PromotionLevel::Important, PromotionLevel::Critical]
        );
        assert_eq!(
            PromotionLevel::allowed_from(PromotionLevel::Critical),
            vec![PromotionLevel::Critical]
        );
    }

    #[test]
    fn test_promotion_level_serialization() {
        assert_eq!(
            serde_json::to_string(&PromotionLevel::Critical).unwrap(),
            "\"critical\""
        );
        let parsed: PromotionLevel = serde_json::from_str("\"important\"").unwrap();
        assert_eq!(parsed, PromotionLevel::Important);
        assert_eq!(PromotionLevel::parse("bogus"), None);
    }

    #[test]
    fn test_search_request_defaults() {
        let req: SemanticSearchRequest =
            serde_json::from_str(r#"{"query": "connection pool"}"#).unwrap();
        assert_eq!(req.limit, 10);
        assert_eq!(req.min_relevance_score, 0.5);
        assert!(req.doc_types.is_empty());
        assert!(req.promotion_levels.is_empty());
    }

    #[test]
    fn test_search_request_limit_clamped_not_rejected() {
        let req = SemanticSearchRequest {
            query: "q".into(),
            doc_types: vec![],
            limit: 500,
            min_relevance_score: 0.5,
            promotion_levels: vec![],
        };
        assert!(req.validate().is_ok());
        assert_eq!(req.clamped_limit(), MAX_SEARCH_LIMIT);
    }

    #[test]
    fn test_search_request_zero_limit_stays_zero() {
        let req = SemanticSearchRequest {
            query: "q".into(),
            doc_types: vec![],
            limit: 0,
            min_relevance_score: 0.5,
            promotion_levels: vec![],
        };
        assert_eq!(req.clamped_limit(), 0);
    }

    #[test]
    fn test_search_request_rejects_empty_query() {
        let req = SemanticSearchRequest {
            query: "   ".into(),
            doc_types: vec![],
            limit: 10,
            min_relevance_score: 0.5,
            promotion_levels: vec![],
        };
        assert!(req.validate().unwrap_err().contains("cannot be empty"));
    }

    #[test]
    fn test_search_request_rejects_out_of_range_score() {
        let req = SemanticSearchRequest {
            query: "q".into(),
            doc_types: vec![],
            limit: 10,
            min_relevance_score: 1.5,
            promotion_levels: vec![],
        };
        assert!(req.validate().unwrap_err().contains("between 0.0 and 1.0"));
    }

    #[test]
    fn test_search_request_rejects_oversized_query() {
        let req = SemanticSearchRequest {
            query: "a".repeat(20_000),
            doc_types: vec![],
            limit: 10,
            min_relevance_score: 0.5,
            promotion_levels: vec![],
        };
        assert!(req.validate().unwrap_err().contains("query too long"));
    }

    #[test]
    fn test_rag_request_defaults() {
        let req: RagQueryRequest = serde_json::from_str(r#"{"query": "how do we retry"}"#).unwrap();
        assert_eq!(req.max_sources, 3);
        assert_eq!(req.min_relevance_score, 0.7);
        assert_eq!(req.min_promotion_level, PromotionLevel::Standard);
        assert!(req.include_critical);
    }

    #[test]
    fn test_rag_request_rejects_oversized_max_sources() {
        let req = RagQueryRequest {
            query: "q".into(),
            doc_types: vec![],
            max_sources: 1000,
            min_relevance_score: 0.7,
            min_promotion_level: PromotionLevel::Standard,
            include_critical: true,
        };
        assert!(req.validate().unwrap_err().contains("max_sources too large"));
    }

    #[test]
    fn test_delete_request_validation() {
        assert!(
            DeleteDocumentsRequest { paths: vec![] }
                .validate()
                .is_err()
        );
        assert!(
            DeleteDocumentsRequest {
                paths: vec!["a.md".into()]
            }
            .validate()
            .is_ok()
        );
        let too_many = DeleteDocumentsRequest {
            paths: (0..200).map(|i| format!("{i}.md")).collect(),
        };
        assert!(too_many.validate().is_err());
    }

    #[test]
    fn test_activate_request_requires_absolute_path() {
        let rel = ActivateProjectRequest {
            root_path: "relative/dir".into(),
        };
        assert!(rel.validate().unwrap_err().contains("absolute"));
        let abs = ActivateProjectRequest {
            root_path: "/work/acme".into(),
        };
        assert!(abs.validate().is_ok());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let req = RagQueryRequest {
            query: "circuit breaker".into(),
            doc_types: vec!["problem".into()],
            max_sources: 5,
            min_relevance_score: 0.6,
            min_promotion_level: PromotionLevel::Important,
            include_critical: false,
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: RagQueryRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.query, req.query);
        assert_eq!(back.doc_types, req.doc_types);
        assert_eq!(back.max_sources, req.max_sources);
        assert_eq!(back.min_promotion_level, req.min_promotion_level);
        assert!(!back.include_critical);
    }
}
