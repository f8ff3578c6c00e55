//! # Compounding Docs - Project Knowledge Search and RAG
//!
//! A Rust-based Model Context Protocol (MCP) server that turns a project's
//! markdown knowledge docs into a tenant-isolated vector index with semantic
//! search and RAG retrieval.
//!
//! ## Overview
//!
//! Each project keeps its docs under `.csharp-compounding-docs/docs/`. On
//! activation the server computes the tenant triple (project, branch, path
//! hash), reconciles the vector index against the files on disk, and starts
//! a file watcher so the index follows every edit. Queries embed through a
//! local generator service guarded by a circuit breaker; when the service is
//! down, indexing work parks on an in-memory deferred queue and drains on
//! recovery.
//!
//! ## Key Features
//!
//! - **Tenant isolation**: every record and query is scoped by
//!   `(project_name, branch_name, path_hash)`
//! - **Semantic Search**: LanceDB ANN over 1024-d embeddings, cosine scored
//! - **RAG retrieval**: critical-document prepend, chunk/document dedup and
//!   bounded link expansion
//! - **Live index**: debounced file watching plus start-up reconciliation
//! - **Graceful degradation**: retry + circuit breaker around the embedding
//!   service, deferred queue drained on recovery
//! - **MCP Protocol**: stdio transport, tagged error replies
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   MCP Client    │  (Claude, VS Code, etc.)
//! └────────┬────────┘
//!          │ stdio
//! ┌────────▼────────┐
//! │  DocsMcpServer  │  (tools + prompts)
//! └────────┬────────┘
//!          │
//!    ┌─────┴─────┬──────────────┬─────────────┐
//!    │           │              │             │
//! ┌──▼───┐  ┌────▼────┐  ┌──────▼─────┐  ┌────▼─────┐
//! │Embed │  │LanceDB  │  │File Watcher│  │Link Graph│
//! │(HTTP)│  │(docs +  │  │+ Deferred  │  │(Tarjan,  │
//! │      │  │ chunks) │  │  Queue     │  │ BFS)     │
//! └──────┘  └─────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`mcp_server`]: MCP protocol server implementation with tools and prompts
//! - [`embedding`]: HTTP embedding client with retry and circuit breaker
//! - [`vector_store`]: LanceDB-backed document and chunk storage
//! - [`parser`]: frontmatter, schema validation, links and chunking
//! - [`indexer`]: parse -> embed -> upsert pipeline
//! - [`watcher`]: file watching, debounce and reconciliation
//! - [`deferred`]: bounded queue of parked change events plus the drainer
//! - [`search`]: tenant-isolated similarity search with chunk merging
//! - [`rag`]: RAG context assembly and optional answer synthesis
//! - [`link_graph`]: directed link graph with cycle detection
//! - [`health`]: embedding service health snapshots and transitions
//! - [`session`]: active-project gate
//! - [`tenant`]: tenant triple and content hashing
//! - [`config`]: server tuning and per-project configuration
//! - [`types`]: tool request/response types with JSON schema
//! - [`error`]: error taxonomy with stable codes
//! - [`paths`]: platform directories and path normalization
//!
//! ## Usage Example
//!
//! ```no_run
//! use compounding_docs::mcp_server::DocsMcpServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Serve over stdio (MCP protocol)
//!     DocsMcpServer::serve_stdio().await?;
//!
//!     Ok(())
//! }
//! ```

/// Server tuning and per-project configuration
pub mod config;

/// Bounded deferred-event queue and recovery drainer
pub mod deferred;

/// HTTP embedding client with retry and circuit breaker
pub mod embedding;

/// Error types and utilities
pub mod error;

/// Embedding service health monitor
pub mod health;

/// Parse -> embed -> upsert pipeline
pub mod indexer;

/// Directed link graph with cycle detection and bounded traversal
pub mod link_graph;

/// MCP server implementation with tools and prompts
pub mod mcp_server;

/// Markdown document parsing: frontmatter, schemas, links, chunking
pub mod parser;

/// Path normalization and platform directories
pub mod paths;

/// RAG context assembly and answer synthesis
pub mod rag;

/// Tenant-isolated similarity search
pub mod search;

/// Active-project session state
pub mod session;

/// Tenant triple and hashing
pub mod tenant;

/// MCP request/response types with JSON schema definitions
pub mod types;

/// LanceDB-backed vector storage for documents and chunks
pub mod vector_store;

/// File watching, debounce and reconciliation
pub mod watcher;
