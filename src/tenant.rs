//! Tenant identity: the (project_name, branch_name, path_hash) triple that
//! scopes every stored record and every query.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The isolation boundary for all stored records.
///
/// `path_hash` is derived from the canonicalized absolute repository path, so
/// two checkouts of the same project at different paths never share an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantKey {
    pub project_name: String,
    pub branch_name: String,
    pub path_hash: String,
}

impl TenantKey {
    pub fn new(
        project_name: impl Into<String>,
        branch_name: impl Into<String>,
        root_path: &Path,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            branch_name: branch_name.into(),
            path_hash: hash_root_path(root_path),
        }
    }

    /// Stable document identifier for (tenant, relative_path)
    pub fn document_id(&self, relative_path: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.project_name.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.branch_name.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.path_hash.as_bytes());
        hasher.update(b"\0");
        hasher.update(relative_path.as_bytes());
        short_hex(&hasher.finalize())
    }
}

impl std::fmt::Display for TenantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}#{}",
            self.project_name, self.branch_name, self.path_hash
        )
    }
}

/// Hash a root path to a short stable identifier
fn hash_root_path(root_path: &Path) -> String {
    // Canonicalize when possible so symlinked and plain paths collapse
    let canonical = std::fs::canonicalize(root_path).unwrap_or_else(|_| root_path.to_path_buf());
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    short_hex(&hasher.finalize())
}

/// First 16 hex characters of a digest, enough to avoid collisions at this scale
fn short_hex(digest: &[u8]) -> String {
    let full = digest
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<String>();
    full[..16].to_string()
}

/// Compute a content hash over raw file bytes
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Resolve the current branch name for a project root.
///
/// Falls back to "main" for non-repositories and detached HEADs so activation
/// works on plain directories.
pub fn detect_branch(root_path: &Path) -> String {
    match git2::Repository::discover(root_path) {
        Ok(repo) => match repo.head() {
            Ok(head) => head
                .shorthand()
                .map(str::to_string)
                .unwrap_or_else(|| "main".to_string()),
            Err(e) => {
                tracing::debug!("No HEAD for {}: {}", root_path.display(), e);
                "main".to_string()
            }
        },
        Err(e) => {
            tracing::debug!("Not a git repository {}: {}", root_path.display(), e);
            "main".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tenant() -> TenantKey {
        TenantKey {
            project_name: "acme".into(),
            branch_name: "main".into(),
            path_hash: "0123456789abcdef".into(),
        }
    }

    #[test]
    fn test_path_hash_is_short_hex() {
        let key = TenantKey::new("acme", "main", &PathBuf::from("/nonexistent/repo"));
        assert_eq!(key.path_hash.len(), 16);
        assert!(key.path_hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_path_hash_differs_by_path() {
        let a = TenantKey::new("acme", "main", &PathBuf::from("/nonexistent/a"));
        let b = TenantKey::new("acme", "main", &PathBuf::from("/nonexistent/b"));
        assert_ne!(a.path_hash, b.path_hash);
    }

    #[test]
    fn test_document_id_is_stable() {
        let t = tenant();
        assert_eq!(
            t.document_id("problems/pool.md"),
            t.document_id("problems/pool.md")
        );
    }

    #[test]
    fn test_document_id_varies_with_path_and_tenant() {
        let t = tenant();
        assert_ne!(t.document_id("a.md"), t.document_id("b.md"));

        let other = TenantKey {
            branch_name: "feature".into(),
            ..tenant()
        };
        assert_ne!(t.document_id("a.md"), other.document_id("a.md"));
    }

    #[test]
    fn test_content_hash_changes_with_bytes() {
        assert_ne!(content_hash(b"alpha"), content_hash(b"beta"));
        assert_eq!(content_hash(b"alpha"), content_hash(b"alpha"));
    }

    #[test]
    fn test_detect_branch_falls_back_for_plain_dirs() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect_branch(dir.path()), "main");
    }

    #[test]
    fn test_display_format() {
        assert_eq!(tenant().to_string(), "acme@main#0123456789abcdef");
    }
}
