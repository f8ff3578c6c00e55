//! Document parsing: frontmatter, schema validation, link extraction,
//! heading-bounded chunking and content hashing.

mod chunking;
mod frontmatter;
mod links;
mod schema;

pub use chunking::{ChunkSlice, chunk_by_headings};
pub use frontmatter::{parse_frontmatter, split_frontmatter};
pub use links::extract_links;
pub use schema::{DocTypeDef, DocTypeRegistry, DocTypeSchema};

use serde_json::{Map, Value as JsonValue};

use crate::error::{DocsError, Result};
use crate::tenant::content_hash;
use crate::types::PromotionLevel;

/// Everything derived from one markdown file
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub doc_type: String,
    pub title: String,
    pub summary: String,
    pub frontmatter: Map<String, JsonValue>,
    pub frontmatter_json: String,
    pub body: String,
    pub char_count: usize,
    pub content_hash: String,
    pub promotion_level: PromotionLevel,
    pub links: Vec<String>,
    pub chunks: Vec<ChunkSlice>,
}

/// Derives a [`ParsedDocument`] from raw file bytes
pub struct DocumentParser {
    registry: DocTypeRegistry,
    chunk_threshold_lines: usize,
}

impl DocumentParser {
    pub fn new(registry: DocTypeRegistry, chunk_threshold_lines: usize) -> Self {
        Self {
            registry,
            chunk_threshold_lines,
        }
    }

    pub fn registry(&self) -> &DocTypeRegistry {
        &self.registry
    }

    /// Parse raw bytes into a document, validating frontmatter against the
    /// doc-type schema. Nothing here touches the store.
    pub fn parse(&self, relative_path: &str, bytes: &[u8]) -> Result<ParsedDocument> {
        let source = String::from_utf8_lossy(bytes);
        let hash = content_hash(bytes);

        let split = split_frontmatter(&source);
        let frontmatter = match &split.yaml {
            Some(yaml) => parse_frontmatter(yaml),
            None => Map::new(),
        };

        let doc_type = self.registry.resolve(relative_path, &frontmatter)?;
        self.registry.validate(&doc_type, &frontmatter)?;

        let body = split.body.to_string();
        let title = frontmatter
            .get("title")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| first_heading(&body))
            .unwrap_or_else(|| file_stem(relative_path));
        let summary = frontmatter
            .get("summary")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let promotion_level = match frontmatter.get("promotion_level").and_then(|v| v.as_str()) {
            // Unparseable values were already rejected by schema validation
            Some(level) => PromotionLevel::parse(level).unwrap_or_default(),
            None => PromotionLevel::Standard,
        };

        let links = extract_links(&body, relative_path);
        let chunks = chunk_by_headings(&body, self.chunk_threshold_lines);

        let frontmatter_json = serde_json::to_string(&frontmatter)
            .map_err(|e| DocsError::FileSystem(format!("failed to serialize frontmatter: {e}")))?;

        Ok(ParsedDocument {
            doc_type,
            title,
            summary,
            char_count: body.chars().count(),
            frontmatter,
            frontmatter_json,
            body,
            content_hash: hash,
            promotion_level,
            links,
            chunks,
        })
    }
}

fn first_heading(body: &str) -> Option<String> {
    body.lines().find_map(|line| {
        let trimmed = line.trim_start();
        let hashes = trimmed.chars().take_while(|c| *c == '#').count();
        if (1..=6).contains(&hashes) {
            let title = trimmed[hashes..].trim();
            if !title.is_empty() {
                return Some(title.to_string());
            }
        }
        None
    })
}

fn file_stem(relative_path: &str) -> String {
    relative_path
        .rsplit('/')
        .next()
        .unwrap_or(relative_path)
        .trim_end_matches(".md")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> DocumentParser {
        DocumentParser::new(DocTypeRegistry::builtin(), 500)
    }

    #[test]
    fn test_parse_full_document() {
        let doc = b"---\ndoc_type: problem\ntitle: Pool exhaustion\nsummary: Connections leak\npromotion_level: important\n---\nThe connection pool is exhausted under load.\nSee [tuning](../tools/tuning.md).\n";
        let parsed = parser().parse("problems/pool.md", doc).unwrap();

        assert_eq!(parsed.doc_type, "problem");
        assert_eq!(parsed.title, "Pool exhaustion");
        assert_eq!(parsed.summary, "Connections leak");
        assert_eq!(parsed.promotion_level, PromotionLevel::Important);
        assert_eq!(parsed.links, vec!["tools/tuning.md"]);
        assert!(parsed.chunks.is_empty());
        assert_eq!(parsed.content_hash.len(), 64);
        assert!(parsed.frontmatter_json.contains("Pool exhaustion"));
    }

    #[test]
    fn test_parse_without_frontmatter() {
        let doc = b"# Cache invalidation\n\nNotes on the cache.\n";
        let parsed = parser().parse("insights/cache.md", doc).unwrap();
        assert_eq!(parsed.doc_type, "insight");
        assert_eq!(parsed.title, "Cache invalidation");
        assert_eq!(parsed.promotion_level, PromotionLevel::Standard);
    }

    #[test]
    fn test_title_falls_back_to_file_stem() {
        let parsed = parser().parse("insights/raw-notes.md", b"no headings here\n").unwrap();
        assert_eq!(parsed.title, "raw-notes");
    }

    #[test]
    fn test_malformed_frontmatter_is_recoverable() {
        let doc = b"---\ntitle: [unclosed\n---\nbody text\n";
        let parsed = parser().parse("insights/a.md", doc).unwrap();
        assert!(parsed.frontmatter.is_empty());
        assert_eq!(parsed.body, "body text\n");
    }

    #[test]
    fn test_schema_failure_propagates() {
        let doc = b"---\ndoc_type: problem\npromotion_level: urgent\n---\nbody\n";
        let err = parser().parse("problems/a.md", doc).unwrap_err();
        assert_eq!(err.code(), "SchemaValidationFailed");
    }

    #[test]
    fn test_unknown_doc_type_rejected() {
        let doc = b"---\ndoc_type: journal\n---\nbody\n";
        let err = parser().parse("a.md", doc).unwrap_err();
        assert_eq!(err.code(), "InvalidDocType");
    }

    #[test]
    fn test_large_body_produces_chunks() {
        let mut doc = String::from("---\ndoc_type: codebase\n---\n# Architecture\n");
        for i in 0..600 {
            doc.push_str(&format!("line {i}\n"));
        }
        let parsed = parser().parse("codebase/arch.md", doc.as_bytes()).unwrap();
        assert!(!parsed.chunks.is_empty());
        let total: usize = parsed.chunks.iter().map(|c| c.text.lines().count()).sum();
        assert_eq!(total, parsed.body.lines().count());
    }

    #[test]
    fn test_char_count_is_body_only() {
        let doc = b"---\ntitle: T\n---\nabc\n";
        let parsed = parser().parse("insights/a.md", doc).unwrap();
        assert_eq!(parsed.char_count, 4); // "abc\n"
    }

    #[test]
    fn test_content_hash_covers_raw_bytes() {
        let a = parser().parse("insights/a.md", b"# Same body\n").unwrap();
        let b = parser()
            .parse("insights/a.md", b"---\ntitle: T\n---\n# Same body\n")
            .unwrap();
        assert_ne!(a.content_hash, b.content_hash);
    }
}
