/// Centralized error types for compounding-docs using thiserror
///
/// Every error that can cross the tool boundary carries a stable code so
/// clients can branch on it without parsing messages.
use serde_json::json;
use thiserror::Error;

use crate::embedding::CircuitState;

/// Main error type for the knowledge server
#[derive(Error, Debug)]
pub enum DocsError {
    #[error("No project is active. Call activate_project first.")]
    ProjectNotActivated,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Frontmatter failed schema validation for doc type '{doc_type}'")]
    SchemaValidationFailed {
        doc_type: String,
        errors: Vec<String>,
    },

    #[error(
        "Embedding service unavailable (circuit {state:?}). Ensure the embedding service is running."
    )]
    EmbeddingUnavailable {
        state: CircuitState,
        retry_after_seconds: u64,
        hint: Option<String>,
    },

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Doc type '{0}' is not registered for the active project")]
    InvalidDocType(String),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Project configuration is invalid: {0}")]
    ConfigInvalid(String),

    #[error("Operation exceeded its deadline")]
    DeadlineExceeded,

    #[error("Operation was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, DocsError>;

impl DocsError {
    /// Stable error code for the tagged tool reply
    pub fn code(&self) -> &'static str {
        match self {
            DocsError::ProjectNotActivated => "ProjectNotActivated",
            DocsError::InvalidArgument(_) => "InvalidArgument",
            DocsError::DocumentNotFound(_) => "DocumentNotFound",
            DocsError::SchemaValidationFailed { .. } => "SchemaValidationFailed",
            DocsError::EmbeddingUnavailable { .. } => "EmbeddingUnavailable",
            DocsError::VectorStore(_) => "VectorStoreError",
            DocsError::InvalidDocType(_) => "InvalidDocType",
            DocsError::FileSystem(_) => "FileSystemError",
            DocsError::ConfigInvalid(_) => "ConfigInvalid",
            DocsError::DeadlineExceeded => "DeadlineExceeded",
            DocsError::Cancelled => "Cancelled",
        }
    }

    /// Structured detail payload for the tagged reply, if the variant carries one
    pub fn details(&self) -> serde_json::Value {
        match self {
            DocsError::SchemaValidationFailed { doc_type, errors } => json!({
                "doc_type": doc_type,
                "errors": errors,
            }),
            DocsError::EmbeddingUnavailable {
                state,
                retry_after_seconds,
                hint,
            } => json!({
                "state": format!("{state:?}"),
                "retry_after_seconds": retry_after_seconds,
                "hint": hint,
            }),
            _ => serde_json::Value::Null,
        }
    }

    /// Serialize to the tagged error reply sent over the tool protocol:
    /// `{error: true, code, message, details}`
    pub fn reply(&self) -> String {
        let body = json!({
            "error": true,
            "code": self.code(),
            "message": self.to_string(),
            "details": self.details(),
        });
        serde_json::to_string_pretty(&body)
            .unwrap_or_else(|_| format!("{{\"error\":true,\"code\":\"{}\"}}", self.code()))
    }

    /// True when indexing may park the triggering event for a later retry
    pub fn is_deferrable(&self) -> bool {
        matches!(self, DocsError::EmbeddingUnavailable { .. })
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        DocsError::InvalidArgument(msg.into())
    }
}

impl From<std::io::Error> for DocsError {
    fn from(err: std::io::Error) -> Self {
        DocsError::FileSystem(err.to_string())
    }
}

impl From<lancedb::Error> for DocsError {
    fn from(err: lancedb::Error) -> Self {
        DocsError::VectorStore(err.to_string())
    }
}
