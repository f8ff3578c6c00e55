use super::*;
use crate::config::{EmbeddingConfig, VectorDbConfig};
use crate::paths::PROJECT_DIR_NAME;
use rmcp::handler::server::wrapper::Parameters;
use std::path::Path;

/// Server config pinned to a temp directory, with the embedding endpoint
/// pointing at a closed port so no test depends on a running service
fn test_config(dir: &Path) -> Config {
    Config {
        vector_db: VectorDbConfig {
            lancedb_path: dir.join("lancedb"),
        },
        embedding: EmbeddingConfig {
            endpoint: "http://127.0.0.1:9".into(),
            retry_attempts: 1,
            timeout_secs: 2,
            ..EmbeddingConfig::default()
        },
        ..Config::default()
    }
}

fn write_project_config(root: &Path, body: &str) {
    let config_dir = root.join(PROJECT_DIR_NAME);
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.json"), body).unwrap();
}

fn error_code(reply: &str) -> String {
    let value: serde_json::Value = serde_json::from_str(reply).expect("tagged error reply");
    assert_eq!(value["error"], true);
    value["code"].as_str().unwrap_or_default().to_string()
}

async fn activated_server() -> (tempfile::TempDir, DocsMcpServer) {
    let dir = tempfile::tempdir().unwrap();
    write_project_config(dir.path(), r#"{"project_name": "acme"}"#);

    let server = DocsMcpServer::with_config(test_config(dir.path()));
    let reply = server
        .activate_project(Parameters(ActivateProjectRequest {
            root_path: dir.path().display().to_string(),
        }))
        .await
        .expect("activation should succeed");

    let response: ActivateProjectResponse = serde_json::from_str(&reply).unwrap();
    assert_eq!(response.project_name, "acme");
    (dir, server)
}

#[tokio::test]
async fn test_tools_require_activation() {
    let dir = tempfile::tempdir().unwrap();
    let server = DocsMcpServer::with_config(test_config(dir.path()));

    let err = server
        .semantic_search(Parameters(SemanticSearchRequest {
            query: "anything".into(),
            doc_types: vec![],
            limit: 10,
            min_relevance_score: 0.5,
            promotion_levels: vec![],
        }))
        .await
        .unwrap_err();
    assert_eq!(error_code(&err), "ProjectNotActivated");

    let err = server
        .index_document(Parameters(IndexDocumentRequest {
            relative_path: "a.md".into(),
        }))
        .await
        .unwrap_err();
    assert_eq!(error_code(&err), "ProjectNotActivated");

    let err = server
        .list_doc_types(Parameters(ListDocTypesRequest {}))
        .await
        .unwrap_err();
    assert_eq!(error_code(&err), "ProjectNotActivated");
}

#[tokio::test]
async fn test_activate_requires_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let server = DocsMcpServer::with_config(test_config(dir.path()));

    let err = server
        .activate_project(Parameters(ActivateProjectRequest {
            root_path: dir.path().display().to_string(),
        }))
        .await
        .unwrap_err();
    assert_eq!(error_code(&err), "ConfigInvalid");
}

#[tokio::test]
async fn test_activate_rejects_relative_root() {
    let dir = tempfile::tempdir().unwrap();
    let server = DocsMcpServer::with_config(test_config(dir.path()));

    let err = server
        .activate_project(Parameters(ActivateProjectRequest {
            root_path: "relative/path".into(),
        }))
        .await
        .unwrap_err();
    assert_eq!(error_code(&err), "InvalidArgument");
}

#[tokio::test]
async fn test_activation_response_and_doc_types() {
    let (_dir, server) = activated_server().await;

    let reply = server
        .list_doc_types(Parameters(ListDocTypesRequest {}))
        .await
        .unwrap();
    let response: ListDocTypesResponse = serde_json::from_str(&reply).unwrap();

    let names: Vec<&str> = response.doc_types.iter().map(|t| t.name.as_str()).collect();
    assert!(names.contains(&"problem"));
    assert!(names.contains(&"insight"));
    assert!(names.contains(&"codebase"));
    assert!(names.contains(&"tool"));
    assert!(names.contains(&"style"));
    assert!(response.doc_types.iter().all(|t| t.document_count == 0));
}

#[tokio::test]
async fn test_custom_doc_types_in_listing() {
    let dir = tempfile::tempdir().unwrap();
    write_project_config(
        dir.path(),
        r#"{
            "project_name": "acme",
            "custom_doc_types": [
                {"name": "runbook", "folder": "runbooks",
                 "schema": {"required_fields": ["severity"]}}
            ]
        }"#,
    );
    let server = DocsMcpServer::with_config(test_config(dir.path()));
    server
        .activate_project(Parameters(ActivateProjectRequest {
            root_path: dir.path().display().to_string(),
        }))
        .await
        .unwrap();

    let reply = server
        .list_doc_types(Parameters(ListDocTypesRequest {}))
        .await
        .unwrap();
    let response: ListDocTypesResponse = serde_json::from_str(&reply).unwrap();
    let runbook = response
        .doc_types
        .iter()
        .find(|t| t.name == "runbook")
        .expect("custom type listed");
    assert_eq!(runbook.folder, "runbooks");
    assert!(runbook.has_schema);
}

#[tokio::test]
async fn test_index_document_path_validation() {
    let (_dir, server) = activated_server().await;

    let err = server
        .index_document(Parameters(IndexDocumentRequest {
            relative_path: "../escape.md".into(),
        }))
        .await
        .unwrap_err();
    assert_eq!(error_code(&err), "FileSystemError");

    let err = server
        .index_document(Parameters(IndexDocumentRequest {
            relative_path: "notes.txt".into(),
        }))
        .await
        .unwrap_err();
    assert_eq!(error_code(&err), "InvalidArgument");

    let err = server
        .index_document(Parameters(IndexDocumentRequest {
            relative_path: "missing.md".into(),
        }))
        .await
        .unwrap_err();
    assert_eq!(error_code(&err), "DocumentNotFound");
}

#[tokio::test]
async fn test_index_document_embedding_unavailable() {
    let (dir, server) = activated_server().await;

    // A real file, but the embedding endpoint is a closed port
    let docs_root = dir.path().join(PROJECT_DIR_NAME).join("docs");
    std::fs::write(docs_root.join("pool.md"), "connection pool notes\n").unwrap();

    let err = server
        .index_document(Parameters(IndexDocumentRequest {
            relative_path: "pool.md".into(),
        }))
        .await
        .unwrap_err();
    assert_eq!(error_code(&err), "EmbeddingUnavailable");

    // The failure left no half-written record
    let reply = server
        .get_index_status(Parameters(IndexStatusRequest {}))
        .await
        .unwrap();
    let status: IndexStatusResponse = serde_json::from_str(&reply).unwrap();
    assert_eq!(status.documents_total, 0);
}

#[tokio::test]
async fn test_semantic_search_rejects_unknown_doc_type() {
    let (_dir, server) = activated_server().await;

    let err = server
        .semantic_search(Parameters(SemanticSearchRequest {
            query: "pool".into(),
            doc_types: vec!["journal".into()],
            limit: 10,
            min_relevance_score: 0.5,
            promotion_levels: vec![],
        }))
        .await
        .unwrap_err();
    assert_eq!(error_code(&err), "InvalidDocType");
}

#[tokio::test]
async fn test_semantic_search_rejects_empty_query() {
    let (_dir, server) = activated_server().await;

    let err = server
        .semantic_search(Parameters(SemanticSearchRequest {
            query: "   ".into(),
            doc_types: vec![],
            limit: 10,
            min_relevance_score: 0.5,
            promotion_levels: vec![],
        }))
        .await
        .unwrap_err();
    assert_eq!(error_code(&err), "InvalidArgument");
}

#[tokio::test]
async fn test_external_tools_without_external_config() {
    let (_dir, server) = activated_server().await;

    let err = server
        .search_external_docs(Parameters(ExternalSearchRequest {
            query: "pool".into(),
            limit: 10,
            min_relevance_score: 0.5,
        }))
        .await
        .unwrap_err();
    assert_eq!(error_code(&err), "InvalidArgument");

    let err = server
        .rag_query_external(Parameters(ExternalRagRequest {
            query: "pool".into(),
            max_sources: 3,
            min_relevance_score: 0.7,
        }))
        .await
        .unwrap_err();
    assert_eq!(error_code(&err), "InvalidArgument");
}

#[tokio::test]
async fn test_delete_documents_reports_missing() {
    let (_dir, server) = activated_server().await;

    let reply = server
        .delete_documents(Parameters(DeleteDocumentsRequest {
            paths: vec!["never/indexed.md".into()],
        }))
        .await
        .unwrap();
    let response: DeleteDocumentsResponse = serde_json::from_str(&reply).unwrap();
    assert!(response.deleted.is_empty());
    assert_eq!(response.missing, vec!["never/indexed.md"]);
}

#[tokio::test]
async fn test_delete_documents_rejects_empty_list() {
    let (_dir, server) = activated_server().await;

    let err = server
        .delete_documents(Parameters(DeleteDocumentsRequest { paths: vec![] }))
        .await
        .unwrap_err();
    assert_eq!(error_code(&err), "InvalidArgument");
}

#[tokio::test]
async fn test_update_promotion_missing_document() {
    let (_dir, server) = activated_server().await;

    let err = server
        .update_promotion_level(Parameters(UpdatePromotionRequest {
            path: "ghost.md".into(),
            level: PromotionLevel::Critical,
        }))
        .await
        .unwrap_err();
    assert_eq!(error_code(&err), "DocumentNotFound");
}

#[tokio::test]
async fn test_index_status_reports_health() {
    let (_dir, server) = activated_server().await;

    let reply = server
        .get_index_status(Parameters(IndexStatusRequest {}))
        .await
        .unwrap();
    let status: IndexStatusResponse = serde_json::from_str(&reply).unwrap();
    assert_eq!(status.documents_total, 0);
    assert_eq!(status.by_doc_type.len(), 5);
    // Circuit starts closed
    assert_eq!(status.embedding.state, "Closed");
}

#[tokio::test]
async fn test_rebuild_index_with_empty_docs() {
    let (_dir, server) = activated_server().await;

    let reply = server
        .rebuild_index(Parameters(RebuildIndexRequest {}))
        .await
        .unwrap();
    let response: RebuildIndexResponse = serde_json::from_str(&reply).unwrap();
    assert_eq!(
        (response.created, response.modified, response.deleted),
        (0, 0, 0)
    );
}

#[tokio::test]
async fn test_reactivation_replaces_project() {
    let dir_a = tempfile::tempdir().unwrap();
    write_project_config(dir_a.path(), r#"{"project_name": "alpha"}"#);
    let dir_b = tempfile::tempdir().unwrap();
    write_project_config(dir_b.path(), r#"{"project_name": "beta"}"#);

    let server = DocsMcpServer::with_config(test_config(dir_a.path()));
    for (dir, name) in [(&dir_a, "alpha"), (&dir_b, "beta")] {
        let reply = server
            .activate_project(Parameters(ActivateProjectRequest {
                root_path: dir.path().display().to_string(),
            }))
            .await
            .unwrap();
        let response: ActivateProjectResponse = serde_json::from_str(&reply).unwrap();
        assert_eq!(response.project_name, name);
    }

    let project = server.session.require_active().await.unwrap();
    assert_eq!(project.tenant.project_name, "beta");
}
