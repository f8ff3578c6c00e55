//! MCP server: routes tool calls to the knowledge services.
//!
//! A thin shell over the session — parameter validation happens once per
//! tool, domain errors become the tagged `{error, code, message, details}`
//! reply, and logs go to stderr so stdout stays clean for the transport.

use crate::config::Config;
use crate::error::{DocsError, Result as DocsResult};
use crate::paths::validate_relative;
use crate::session::SessionContext;
use crate::types::*;
use crate::vector_store::{SearchFilter, VectorStore};

use anyhow::{Context, Result};
use rmcp::{
    ErrorData as McpError, ServerHandler, ServiceExt,
    handler::server::{router::prompt::PromptRouter, tool::ToolRouter, wrapper::Parameters},
    model::*,
    prompt, prompt_handler, prompt_router, tool, tool_handler, tool_router,
};
use std::sync::Arc;
use std::time::Instant;

// Project activation wiring
mod activation;

#[derive(Clone)]
pub struct DocsMcpServer {
    config: Arc<Config>,
    session: Arc<SessionContext>,
    tool_router: ToolRouter<Self>,
    prompt_router: PromptRouter<Self>,
}

impl DocsMcpServer {
    /// Create a server with default configuration
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a server with custom configuration
    pub fn with_config(config: Config) -> Self {
        tracing::info!("Initializing compounding-docs MCP server");
        tracing::debug!("Vector DB path: {}", config.vector_db.lancedb_path.display());
        tracing::debug!("Embedding endpoint: {}", config.embedding.endpoint);

        Self {
            config: Arc::new(config),
            session: Arc::new(SessionContext::new()),
            tool_router: Self::tool_router(),
            prompt_router: Self::prompt_router(),
        }
    }

    /// Build the search filter shared by search and RAG tools, rejecting
    /// doc types that are not registered for the active tenant
    fn build_filter(
        project: &crate::session::ActiveProject,
        doc_types: &[String],
        promotion_levels: Vec<PromotionLevel>,
    ) -> DocsResult<SearchFilter> {
        for doc_type in doc_types {
            if !project.registry.contains(doc_type) {
                return Err(DocsError::InvalidDocType(doc_type.clone()));
            }
        }
        Ok(SearchFilter {
            tenant: project.tenant.clone(),
            doc_types: doc_types.to_vec(),
            promotion_levels,
        })
    }
}

impl Default for DocsMcpServer {
    fn default() -> Self {
        Self::new()
    }
}

fn ok_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| {
        DocsError::VectorStore(format!("serialization failed: {e}")).reply()
    })
}

fn invalid(message: String) -> String {
    DocsError::InvalidArgument(message).reply()
}

#[tool_router(router = tool_router)]
impl DocsMcpServer {
    #[tool(
        description = "Activate a project: load its config, start watching its docs directory and reconcile the index with the files on disk. Must be called before any other tool."
    )]
    async fn activate_project(
        &self,
        Parameters(req): Parameters<ActivateProjectRequest>,
    ) -> Result<String, String> {
        req.validate().map_err(invalid)?;

        let root_path = std::path::PathBuf::from(&req.root_path);
        let (project, outcome) = activation::build_active_project(&self.config, &root_path)
            .await
            .map_err(|e| e.reply())?;

        let response = ActivateProjectResponse {
            project_name: project.tenant.project_name.clone(),
            branch_name: project.tenant.branch_name.clone(),
            path_hash: project.tenant.path_hash.clone(),
            docs_root: project.docs_root.display().to_string(),
            doc_types: project.registry.names(),
            external_docs_enabled: project.external.is_some(),
            reconciliation_enqueued: outcome.total(),
        };
        self.session.activate(project).await;

        ok_json(&response)
    }

    #[tool(
        description = "Explicitly (re-)index one markdown document by its docs-relative path. Unchanged content is skipped via its hash."
    )]
    async fn index_document(
        &self,
        Parameters(req): Parameters<IndexDocumentRequest>,
    ) -> Result<String, String> {
        let project = self.session.require_active().await.map_err(|e| e.reply())?;
        let relative = validate_relative(&req.relative_path).map_err(|e| e.reply())?;

        let outcome = project
            .indexer
            .index_path(&relative, &project.cancel)
            .await
            .map_err(|e| e.reply())?;

        let (status, chunks) = match outcome {
            crate::indexer::IndexOutcome::Indexed { chunks } => ("indexed", chunks),
            crate::indexer::IndexOutcome::Skipped => ("skipped", 0),
        };
        ok_json(&IndexDocumentResponse {
            status: status.to_string(),
            path: relative,
            embedding_dimensions: EMBEDDING_DIMENSION,
            chunks,
        })
    }

    #[tool(
        description = "Semantic search over the project's indexed documents. Returns ranked matches; a chunk of a large document replaces the document when it matches better."
    )]
    async fn semantic_search(
        &self,
        Parameters(req): Parameters<SemanticSearchRequest>,
    ) -> Result<String, String> {
        let project = self.session.require_active().await.map_err(|e| e.reply())?;
        req.validate().map_err(invalid)?;

        let start = Instant::now();
        let filter = Self::build_filter(&project, &req.doc_types, req.promotion_levels.clone())
            .map_err(|e| e.reply())?;

        let hits = project
            .search
            .search(
                &req.query,
                &filter,
                req.clamped_limit(),
                req.min_relevance_score,
            )
            .await
            .map_err(|e| e.reply())?;

        ok_json(&SemanticSearchResponse {
            results: hits.iter().map(|h| h.to_view()).collect(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    #[tool(
        description = "Retrieve a ranked context set for a question (RAG). Critical documents are prepended regardless of relevance; linked documents can ride along. Synthesizes an answer when a generator is configured."
    )]
    async fn rag_query(
        &self,
        Parameters(req): Parameters<RagQueryRequest>,
    ) -> Result<String, String> {
        let project = self.session.require_active().await.map_err(|e| e.reply())?;
        req.validate().map_err(invalid)?;

        let start = Instant::now();
        let filter = Self::build_filter(
            &project,
            &req.doc_types,
            PromotionLevel::allowed_from(req.min_promotion_level),
        )
        .map_err(|e| e.reply())?;

        let sources = project
            .rag
            .retrieve(
                &req.query,
                &filter,
                req.max_sources,
                req.min_relevance_score,
                req.include_critical,
            )
            .await
            .map_err(|e| e.reply())?;

        let answer = match (&project.generator, sources.is_empty()) {
            (Some(generator), false) => generator.answer(&req.query, &sources).await,
            _ => None,
        };

        ok_json(&RagQueryResponse {
            answer,
            sources: sources.iter().map(|s| s.to_view()).collect(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    #[tool(description = "Semantic search over the separately indexed external docs collection.")]
    async fn search_external_docs(
        &self,
        Parameters(req): Parameters<ExternalSearchRequest>,
    ) -> Result<String, String> {
        let project = self.session.require_active().await.map_err(|e| e.reply())?;
        req.validate().map_err(invalid)?;
        let Some(external) = &project.external else {
            return Err(invalid(
                "external docs are not configured for this project".to_string(),
            ));
        };

        let start = Instant::now();
        let filter = SearchFilter::for_tenant(project.tenant.clone());
        let hits = external
            .search
            .search(
                &req.query,
                &filter,
                req.clamped_limit(),
                req.min_relevance_score,
            )
            .await
            .map_err(|e| e.reply())?;

        ok_json(&SemanticSearchResponse {
            results: hits.iter().map(|h| h.to_view()).collect(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    #[tool(
        description = "RAG retrieval over the external docs collection. External records carry no promotion level, so there is no critical prepend."
    )]
    async fn rag_query_external(
        &self,
        Parameters(req): Parameters<ExternalRagRequest>,
    ) -> Result<String, String> {
        let project = self.session.require_active().await.map_err(|e| e.reply())?;
        req.validate().map_err(invalid)?;
        let Some(external) = &project.external else {
            return Err(invalid(
                "external docs are not configured for this project".to_string(),
            ));
        };

        let start = Instant::now();
        let filter = SearchFilter::for_tenant(project.tenant.clone());
        let sources = external
            .rag
            .retrieve(
                &req.query,
                &filter,
                req.max_sources,
                req.min_relevance_score,
                false,
            )
            .await
            .map_err(|e| e.reply())?;

        let answer = match (&project.generator, sources.is_empty()) {
            (Some(generator), false) => generator.answer(&req.query, &sources).await,
            _ => None,
        };

        ok_json(&RagQueryResponse {
            answer,
            sources: sources.iter().map(|s| s.to_view()).collect(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    #[tool(description = "List registered doc types with their folder, schema flag and indexed document count.")]
    async fn list_doc_types(
        &self,
        Parameters(_req): Parameters<ListDocTypesRequest>,
    ) -> Result<String, String> {
        let project = self.session.require_active().await.map_err(|e| e.reply())?;

        let mut doc_types = Vec::new();
        for def in project.registry.iter() {
            let document_count = project
                .store
                .count_by_doc_type(&project.tenant, &def.name)
                .await
                .map_err(|e| e.reply())?;
            doc_types.push(DocTypeInfo {
                name: def.name.clone(),
                folder: def.folder.clone(),
                has_schema: def.schema.is_some(),
                document_count,
            });
        }

        ok_json(&ListDocTypesResponse { doc_types })
    }

    #[tool(
        description = "Remove documents from the index by docs-relative path. Files on disk are untouched; the watcher re-indexes them if they change later."
    )]
    async fn delete_documents(
        &self,
        Parameters(req): Parameters<DeleteDocumentsRequest>,
    ) -> Result<String, String> {
        let project = self.session.require_active().await.map_err(|e| e.reply())?;
        req.validate().map_err(invalid)?;

        let mut deleted = Vec::new();
        let mut missing = Vec::new();
        for path in &req.paths {
            let relative = validate_relative(path).map_err(|e| e.reply())?;
            if project
                .indexer
                .delete_path(&relative)
                .await
                .map_err(|e| e.reply())?
            {
                deleted.push(relative);
            } else {
                missing.push(relative);
            }
        }

        ok_json(&DeleteDocumentsResponse { deleted, missing })
    }

    #[tool(description = "Set the promotion level (standard, important, critical) of an indexed document.")]
    async fn update_promotion_level(
        &self,
        Parameters(req): Parameters<UpdatePromotionRequest>,
    ) -> Result<String, String> {
        let project = self.session.require_active().await.map_err(|e| e.reply())?;
        let relative = validate_relative(&req.path).map_err(|e| e.reply())?;

        let updated = project
            .store
            .update_promotion(&project.tenant, &relative, req.level)
            .await
            .map_err(|e| e.reply())?;
        if !updated {
            return Err(DocsError::DocumentNotFound(relative).reply());
        }

        ok_json(&UpdatePromotionResponse {
            path: relative,
            promotion_level: req.level,
        })
    }

    #[tool(
        description = "Re-run reconciliation: diff the index against the files on disk and apply the difference (the rebuild signal)."
    )]
    async fn rebuild_index(
        &self,
        Parameters(_req): Parameters<RebuildIndexRequest>,
    ) -> Result<String, String> {
        let project = self.session.require_active().await.map_err(|e| e.reply())?;

        let outcome = crate::watcher::reconcile(
            &project.indexer,
            &project.deferred,
            &project.health,
            &project.ignore,
            &project.cancel,
        )
        .await
        .map_err(|e| e.reply())?;

        ok_json(&RebuildIndexResponse {
            created: outcome.created,
            modified: outcome.modified,
            deleted: outcome.deleted,
            deferred: outcome.deferred,
        })
    }

    #[tool(description = "Index status: per-doc-type counts, deferred events and embedding service health.")]
    async fn get_index_status(
        &self,
        Parameters(_req): Parameters<IndexStatusRequest>,
    ) -> Result<String, String> {
        let project = self.session.require_active().await.map_err(|e| e.reply())?;

        let mut by_doc_type = Vec::new();
        let mut documents_total = 0;
        for def in project.registry.iter() {
            let document_count = project
                .store
                .count_by_doc_type(&project.tenant, &def.name)
                .await
                .map_err(|e| e.reply())?;
            documents_total += document_count;
            by_doc_type.push(DocTypeInfo {
                name: def.name.clone(),
                folder: def.folder.clone(),
                has_schema: def.schema.is_some(),
                document_count,
            });
        }

        ok_json(&IndexStatusResponse {
            documents_total,
            by_doc_type,
            deferred_events: project.deferred.count(),
            embedding: project.health.snapshot(),
        })
    }
}

// Prompts for slash commands
#[prompt_router]
impl DocsMcpServer {
    #[prompt(
        name = "search",
        description = "Search the project's knowledge docs semantically"
    )]
    async fn search_prompt(
        &self,
        Parameters(args): Parameters<serde_json::Value>,
    ) -> Result<Vec<PromptMessage>, McpError> {
        let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("");

        Ok(vec![PromptMessage::new_text(
            PromptMessageRole::User,
            format!("Please search the project docs for: {}", query),
        )])
    }

    #[prompt(
        name = "ask",
        description = "Answer a question from the project's knowledge docs (RAG)"
    )]
    async fn ask_prompt(
        &self,
        Parameters(args): Parameters<serde_json::Value>,
    ) -> Result<Vec<PromptMessage>, McpError> {
        let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("");

        Ok(vec![PromptMessage::new_text(
            PromptMessageRole::User,
            format!(
                "Please answer this from the indexed project docs using rag_query: {}",
                query
            ),
        )])
    }

    #[prompt(
        name = "status",
        description = "Show index status and embedding service health"
    )]
    async fn status_prompt(&self) -> Vec<PromptMessage> {
        vec![PromptMessage::new_text(
            PromptMessageRole::User,
            "Please show the index status and embedding service health.",
        )]
    }
}

#[tool_handler(router = self.tool_router)]
#[prompt_handler]
impl ServerHandler for DocsMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .build(),
            server_info: Implementation {
                name: "compounding-docs".into(),
                title: Some("Compounding Docs - Project Knowledge Search and RAG".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Per-project markdown knowledge server. \
                Call activate_project first, then semantic_search for ranked matches, \
                rag_query for question answering with sources, and index_document to \
                force a re-index of one file."
                    .into(),
            ),
        }
    }
}

impl DocsMcpServer {
    pub async fn serve_stdio() -> Result<()> {
        tracing::info!("Starting compounding-docs MCP server");

        let server = Self::new();

        let transport = rmcp::transport::io::stdio();

        server.serve(transport).await?.waiting().await?;

        Ok(())
    }

    /// Serve with a custom configuration (used by the CLI)
    pub async fn serve_stdio_with_config(config: Config) -> Result<()> {
        let server = Self::with_config(config);
        let transport = rmcp::transport::io::stdio();
        server
            .serve(transport)
            .await
            .context("Failed to start MCP server")?
            .waiting()
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
