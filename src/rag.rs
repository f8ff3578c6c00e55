//! RAG retrieval: assemble a ranked, de-duplicated context set.
//!
//! Order of assembly: critical prepend, relevance fill, chunk-beats-document
//! merge (inside the search service), then optional link expansion. Critical
//! entries keep their intra-group score order ahead of everything else.
//! Synthesis is an external generator service; when none is configured the
//! retriever returns the context set alone.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::GeneratorConfig;
use crate::error::{DocsError, Result};
use crate::link_graph::LinkGraph;
use crate::search::{SearchHit, SearchService};
use crate::types::{PromotionLevel, RagSourceView};
use crate::vector_store::{SearchFilter, VectorStore};

/// Link-expansion budget for one retrieval
#[derive(Debug, Clone)]
pub struct ExpansionLimits {
    pub enabled: bool,
    pub max_linked_docs: usize,
    pub max_link_depth: usize,
    pub max_traversal_nodes: usize,
}

/// One retrieved source with its provenance
#[derive(Debug, Clone)]
pub struct RagSource {
    pub hit: SearchHit,
    pub critical: bool,
    pub linked_from: Option<String>,
}

impl RagSource {
    pub fn to_view(&self) -> RagSourceView {
        RagSourceView {
            relative_path: self.hit.relative_path().to_string(),
            title: self.hit.title().to_string(),
            doc_type: self.hit.doc_type().to_string(),
            score: self.hit.score(),
            promotion_level: self.hit.promotion_level(),
            header_path: self.hit.header_path().map(str::to_string),
            linked_from: self.linked_from.clone(),
            critical: self.critical,
            text: self.hit.text().to_string(),
        }
    }
}

/// Composes the context set handed to the generator
pub struct RagRetriever {
    search: Arc<SearchService>,
    store: Arc<dyn VectorStore>,
    link_graph: Option<Arc<LinkGraph>>,
    expansion: ExpansionLimits,
}

impl RagRetriever {
    pub fn new(
        search: Arc<SearchService>,
        store: Arc<dyn VectorStore>,
        link_graph: Option<Arc<LinkGraph>>,
        expansion: ExpansionLimits,
    ) -> Self {
        Self {
            search,
            store,
            link_graph,
            expansion,
        }
    }

    /// Assemble the ordered context set for a query.
    ///
    /// `filter` carries the tenant scope plus any doc-type and promotion
    /// constraints; `include_critical` controls the prepend stage.
    pub async fn retrieve(
        &self,
        query: &str,
        filter: &SearchFilter,
        max_sources: usize,
        min_score: f32,
        include_critical: bool,
    ) -> Result<Vec<RagSource>> {
        if max_sources == 0 {
            return Ok(Vec::new());
        }
        filter.validate()?;

        let query_vector = self.search.embed_query(query).await?;
        let mut included: HashSet<String> = HashSet::new();
        let mut critical_sources: Vec<RagSource> = Vec::new();
        let mut ranked_sources: Vec<RagSource> = Vec::new();

        // Critical prepend: relevance floor does not apply
        if include_critical {
            let mut critical_filter = filter.clone();
            critical_filter.promotion_levels = vec![PromotionLevel::Critical];
            let critical = self
                .store
                .search_documents(query_vector.clone(), &critical_filter, max_sources)
                .await?;
            for doc in critical {
                if included.insert(doc.id.clone()) {
                    critical_sources.push(RagSource {
                        hit: SearchHit::Document(doc),
                        critical: true,
                        linked_from: None,
                    });
                }
            }
        }

        // Fill the remainder by relevance; the merged search already resolves
        // chunk-vs-document duplicates
        let hits = self
            .search
            .search_with_vector(query_vector, filter, max_sources, min_score)
            .await?;
        for hit in hits {
            if critical_sources.len() + ranked_sources.len() >= max_sources {
                break;
            }
            if included.insert(hit.document_id().to_string()) {
                ranked_sources.push(RagSource {
                    hit,
                    critical: false,
                    linked_from: None,
                });
            }
        }

        let mut sources = critical_sources;
        sources.append(&mut ranked_sources);
        sources.truncate(max_sources);

        // Link expansion rides on its own budget, never on max_sources
        if self.expansion.enabled
            && self.expansion.max_linked_docs > 0
            && let Some(graph) = &self.link_graph
        {
            let seed_paths: Vec<String> = sources
                .iter()
                .map(|s| s.hit.relative_path().to_string())
                .collect();
            let mut seen_paths: HashSet<String> = seed_paths.iter().cloned().collect();
            let mut linked = Vec::new();

            'outer: for seed in &seed_paths {
                let reachable = graph.traverse(
                    seed,
                    self.expansion.max_link_depth,
                    self.expansion.max_traversal_nodes,
                );
                for path in reachable {
                    if !seen_paths.insert(path.clone()) {
                        continue;
                    }
                    // Dangling edges point at paths that were never indexed
                    let Some(doc) = self.store.get_document(&filter.tenant, &path).await? else {
                        continue;
                    };
                    linked.push(RagSource {
                        hit: SearchHit::Document(doc),
                        critical: false,
                        linked_from: Some(seed.clone()),
                    });
                    if linked.len() >= self.expansion.max_linked_docs {
                        break 'outer;
                    }
                }
            }
            sources.extend(linked);
        }

        Ok(sources)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Thin client for the local answer-generation service
pub struct GeneratorClient {
    client: reqwest::Client,
    url_generate: String,
    model: String,
}

impl GeneratorClient {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let endpoint = config.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(DocsError::ConfigInvalid(format!(
                "invalid generator endpoint: {}",
                config.endpoint
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocsError::ConfigInvalid(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url_generate: format!("{endpoint}/api/generate"),
            model: config.model.clone(),
        })
    }

    /// Synthesize an answer from the assembled context.
    ///
    /// Generation failures degrade to "no answer": retrieval results are
    /// still worth returning when the generator is down.
    pub async fn answer(&self, query: &str, sources: &[RagSource]) -> Option<String> {
        let prompt = build_prompt(query, sources);
        let body = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: false,
        };

        let response = match self.client.post(&self.url_generate).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Generator unreachable, returning sources only: {}", e);
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::warn!(
                "Generator returned {}, returning sources only",
                response.status()
            );
            return None;
        }
        match response.json::<GenerateResponse>().await {
            Ok(parsed) => Some(parsed.response),
            Err(e) => {
                tracing::warn!("Failed to decode generator response: {}", e);
                None
            }
        }
    }
}

fn build_prompt(query: &str, sources: &[RagSource]) -> String {
    let mut prompt = String::from(
        "Answer the question using only the context documents below. \
         Cite document paths where relevant.\n\n",
    );
    for (i, source) in sources.iter().enumerate() {
        prompt.push_str(&format!(
            "--- Context {} ({}) ---\n{}\n\n",
            i + 1,
            source.hit.relative_path(),
            source.hit.text()
        ));
    }
    prompt.push_str(&format!("Question: {query}\nAnswer:"));
    prompt
}
