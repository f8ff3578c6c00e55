/// Configuration system for compounding-docs
///
/// Two layers: the server `Config` carries runtime tuning with serde
/// defaults, and `ProjectConfig` is loaded per project from
/// `{root}/.csharp-compounding-docs/config.json` at activation time.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocsError, Result};
use crate::paths::PROJECT_DIR_NAME;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Vector database configuration
    #[serde(default)]
    pub vector_db: VectorDbConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Indexing and file-watching configuration
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Search and RAG configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDbConfig {
    /// LanceDB data directory path
    #[serde(default = "default_lancedb_path")]
    pub lancedb_path: PathBuf,
}

/// Embedding service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the local embedding service
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    /// Model name requested from the service
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Retry attempts for transient failures
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Consecutive-failure threshold that opens the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Rolling window in which failures are counted, seconds
    #[serde(default = "default_failure_window")]
    pub failure_window_secs: u64,

    /// How long an open circuit rejects calls before a probe, seconds
    #[serde(default = "default_break_duration")]
    pub break_duration_secs: u64,
}

/// Indexing and file-watching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Line count above which a document body is chunked by headings
    #[serde(default = "default_chunk_threshold")]
    pub chunk_threshold_lines: usize,

    /// Documents indexed concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Quiet period before a file change is dispatched, milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Deferred queue capacity; the oldest entry is evicted on overflow
    #[serde(default = "default_queue_capacity")]
    pub deferred_queue_capacity: usize,

    /// Attempts before a deferred event is dropped
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    /// Pause between drained items, milliseconds
    #[serde(default = "default_drain_pause_ms")]
    pub drain_pause_ms: u64,
}

/// Search and RAG configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Link expansion: documents reachable via the link graph added to RAG context
    #[serde(default = "default_link_expansion")]
    pub link_expansion: bool,

    /// Maximum linked documents appended per RAG request
    #[serde(default = "default_max_linked_docs")]
    pub max_linked_docs: usize,

    /// Maximum link-graph depth explored during expansion
    #[serde(default = "default_max_link_depth")]
    pub max_link_depth: usize,

    /// Node budget for any single link-graph traversal
    #[serde(default = "default_max_traversal_nodes")]
    pub max_traversal_nodes: usize,
}

fn default_lancedb_path() -> PathBuf {
    crate::paths::PlatformPaths::default_lancedb_path()
}

fn default_embedding_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "mxbai-embed-large".to_string()
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_failure_window() -> u64 {
    60
}

fn default_break_duration() -> u64 {
    30
}

fn default_chunk_threshold() -> usize {
    500
}

fn default_concurrency() -> usize {
    4
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_drain_pause_ms() -> u64 {
    100
}

fn default_link_expansion() -> bool {
    true
}

fn default_max_linked_docs() -> usize {
    3
}

fn default_max_link_depth() -> usize {
    2
}

fn default_max_traversal_nodes() -> usize {
    100
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            lancedb_path: default_lancedb_path(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout(),
            retry_attempts: default_retry_attempts(),
            failure_threshold: default_failure_threshold(),
            failure_window_secs: default_failure_window(),
            break_duration_secs: default_break_duration(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_threshold_lines: default_chunk_threshold(),
            concurrency: default_concurrency(),
            debounce_ms: default_debounce_ms(),
            deferred_queue_capacity: default_queue_capacity(),
            max_retry_attempts: default_max_retry_attempts(),
            drain_pause_ms: default_drain_pause_ms(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            link_expansion: default_link_expansion(),
            max_linked_docs: default_max_linked_docs(),
            max_link_depth: default_max_link_depth(),
            max_traversal_nodes: default_max_traversal_nodes(),
        }
    }
}

/// A custom doc-type declared in the project config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomDocType {
    pub name: String,
    /// Folder under the docs root where this type's documents live
    #[serde(default)]
    pub folder: Option<String>,
    /// Optional frontmatter schema
    #[serde(default)]
    pub schema: Option<DocTypeSchemaConfig>,
}

/// Frontmatter schema for a doc type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocTypeSchemaConfig {
    /// Frontmatter fields that must be present
    #[serde(default)]
    pub required_fields: Vec<String>,

    /// Per-field allowed values
    #[serde(default)]
    pub enums: HashMap<String, Vec<String>>,
}

/// External docs collection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalDocsConfig {
    /// Directory of external markdown documents, absolute or root-relative
    pub path: String,
}

/// Generator service for answer synthesis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,
    pub model: String,
    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
}

fn default_generator_timeout() -> u64 {
    60
}

/// Retrieval thresholds overridable per project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default)]
    pub min_relevance_score: Option<f32>,
    #[serde(default)]
    pub max_sources: Option<usize>,
    #[serde(default)]
    pub max_linked_docs: Option<usize>,
    #[serde(default)]
    pub max_link_depth: Option<usize>,
    #[serde(default)]
    pub max_traversal_depth: Option<usize>,
}

/// Per-project configuration loaded from
/// `{root}/.csharp-compounding-docs/config.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project_name: String,

    #[serde(default)]
    pub external_docs: Option<ExternalDocsConfig>,

    #[serde(default)]
    pub custom_doc_types: Vec<CustomDocType>,

    #[serde(default)]
    pub thresholds: ThresholdsConfig,

    #[serde(default)]
    pub generator: Option<GeneratorConfig>,

    #[serde(default)]
    pub embedding: Option<EmbeddingOverride>,

    /// Glob patterns excluded from watching and reconciliation
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Unknown fields land here and are warned about, never fatal
    #[serde(flatten)]
    pub unknown: HashMap<String, serde_json::Value>,
}

/// Embedding endpoint/model override from the project config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingOverride {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl ProjectConfig {
    /// Path of the config file for a given project root
    pub fn config_path(root: &Path) -> PathBuf {
        root.join(PROJECT_DIR_NAME).join("config.json")
    }

    /// Docs directory for a given project root
    pub fn docs_root(root: &Path) -> PathBuf {
        root.join(PROJECT_DIR_NAME).join("docs")
    }

    /// Load and validate the project config
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::config_path(root);
        if !path.exists() {
            return Err(DocsError::ConfigInvalid(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| DocsError::ConfigInvalid(format!("failed to read config: {e}")))?;

        let config: ProjectConfig = serde_json::from_str(&content)
            .map_err(|e| DocsError::ConfigInvalid(format!("invalid JSON: {e}")))?;

        config.validate()?;

        for key in config.unknown.keys() {
            tracing::warn!("Ignoring unknown config field '{}'", key);
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.project_name.trim().is_empty() {
            return Err(DocsError::ConfigInvalid(
                "project_name is required".to_string(),
            ));
        }
        if self.project_name.len() > 256 {
            return Err(DocsError::ConfigInvalid(
                "project_name too long (max 256 characters)".to_string(),
            ));
        }
        if let Some(score) = self.thresholds.min_relevance_score
            && !(0.0..=1.0).contains(&score)
        {
            return Err(DocsError::ConfigInvalid(format!(
                "thresholds.min_relevance_score must be between 0.0 and 1.0, got {score}"
            )));
        }
        for doc_type in &self.custom_doc_types {
            if doc_type.name.trim().is_empty() {
                return Err(DocsError::ConfigInvalid(
                    "custom doc type name cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Resolve the external docs directory against the project root
    pub fn external_docs_root(&self, root: &Path) -> Option<PathBuf> {
        self.external_docs.as_ref().map(|ext| {
            let p = Path::new(&ext.path);
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let config = Config::default();
        assert_eq!(config.indexing.chunk_threshold_lines, 500);
        assert_eq!(config.indexing.concurrency, 4);
        assert_eq!(config.indexing.debounce_ms, 500);
        assert_eq!(config.indexing.deferred_queue_capacity, 1000);
        assert_eq!(config.indexing.max_retry_attempts, 3);
        assert_eq!(config.embedding.break_duration_secs, 30);
        assert_eq!(config.embedding.failure_threshold, 5);
        assert_eq!(config.retrieval.max_linked_docs, 3);
        assert_eq!(config.retrieval.max_link_depth, 2);
    }

    #[test]
    fn test_project_config_minimal() {
        let config: ProjectConfig = serde_json::from_str(r#"{"project_name": "acme"}"#).unwrap();
        assert!(config.validate().is_ok());
        assert!(config.external_docs.is_none());
        assert!(config.custom_doc_types.is_empty());
    }

    #[test]
    fn test_project_config_missing_name_fails() {
        let config: ProjectConfig =
            serde_json::from_str(r#"{"project_name": "  "}"#).unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "ConfigInvalid");
    }

    #[test]
    fn test_project_config_unknown_fields_retained() {
        let config: ProjectConfig = serde_json::from_str(
            r#"{"project_name": "acme", "telemetry": {"enabled": true}}"#,
        )
        .unwrap();
        assert!(config.unknown.contains_key("telemetry"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_project_config_custom_doc_types() {
        let config: ProjectConfig = serde_json::from_str(
            r#"{
                "project_name": "acme",
                "custom_doc_types": [
                    {
                        "name": "runbook",
                        "folder": "runbooks",
                        "schema": {
                            "required_fields": ["title", "severity"],
                            "enums": {"severity": ["low", "high"]}
                        }
                    }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.custom_doc_types.len(), 1);
        let schema = config.custom_doc_types[0].schema.as_ref().unwrap();
        assert_eq!(schema.required_fields, vec!["title", "severity"]);
        assert_eq!(schema.enums["severity"], vec!["low", "high"]);
    }

    #[test]
    fn test_project_config_score_out_of_range() {
        let config: ProjectConfig = serde_json::from_str(
            r#"{"project_name": "acme", "thresholds": {"min_relevance_score": 1.7}}"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert_eq!(err.code(), "ConfigInvalid");
    }

    #[test]
    fn test_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_dir = dir.path().join(PROJECT_DIR_NAME);
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.json"),
            r#"{"project_name": "acme", "external_docs": {"path": "vendor-docs"}}"#,
        )
        .unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.project_name, "acme");
        let ext = config.external_docs_root(dir.path()).unwrap();
        assert!(ext.ends_with("vendor-docs"));
    }

    #[test]
    fn test_external_docs_absolute_path_kept() {
        let config: ProjectConfig = serde_json::from_str(
            r#"{"project_name": "acme", "external_docs": {"path": "/srv/docs"}}"#,
        )
        .unwrap();
        let ext = config
            .external_docs_root(Path::new("/work/acme"))
            .unwrap();
        assert_eq!(ext, PathBuf::from("/srv/docs"));
    }

    #[test]
    fn test_docs_root_layout() {
        let root = Path::new("/work/acme");
        assert_eq!(
            ProjectConfig::config_path(root),
            PathBuf::from("/work/acme/.csharp-compounding-docs/config.json")
        );
        assert_eq!(
            ProjectConfig::docs_root(root),
            PathBuf::from("/work/acme/.csharp-compounding-docs/docs")
        );
    }
}
