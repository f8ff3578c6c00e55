//! Outbound markdown link extraction.
//!
//! Walks pulldown-cmark events and keeps only targets that resolve to
//! another markdown document under the docs root, normalized to the tenant's
//! docs-relative form.

use pulldown_cmark::{Event, Parser, Tag};

use crate::paths::normalize_relative;

/// Extract outbound document links from a markdown body.
///
/// `from_relative_path` anchors relative targets; results are deduplicated
/// and exclude self-links. External URLs, anchors and non-markdown targets
/// are skipped, as are targets escaping the docs root.
pub fn extract_links(body: &str, from_relative_path: &str) -> Vec<String> {
    let mut links = Vec::new();

    for event in Parser::new(body) {
        if let Event::Start(Tag::Link { dest_url, .. }) = event
            && let Some(target) = resolve_target(&dest_url, from_relative_path)
            && target != from_relative_path
            && !links.contains(&target)
        {
            links.push(target);
        }
    }

    links
}

fn resolve_target(dest: &str, from_relative_path: &str) -> Option<String> {
    let dest = dest.trim();
    if dest.is_empty()
        || dest.starts_with('#')
        || dest.starts_with('/')
        || dest.contains("://")
        || dest.starts_with("mailto:")
    {
        return None;
    }

    // Strip fragment and query
    let dest = dest.split(['#', '?']).next().unwrap_or(dest);
    if !dest.ends_with(".md") {
        return None;
    }

    let normalized = normalize_relative(dest);

    // Resolve against the linking document's directory
    let base_dir: Vec<&str> = match from_relative_path.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };

    let mut segments: Vec<&str> = base_dir;
    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                // A target climbing above the docs root is dangling by construction
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}
