/// Centralized platform-specific path computation
///
/// Provides consistent path handling across Windows, macOS, and Linux following
/// XDG Base Directory specification on Unix-like systems, plus the docs-relative
/// path normalization used throughout the index.
use std::path::{Component, Path, PathBuf};

use crate::error::{DocsError, Result};

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Get the appropriate data directory for the current platform
    ///
    /// - Windows: %LOCALAPPDATA%
    /// - macOS: ~/Library/Application Support
    /// - Linux/Unix: $XDG_DATA_HOME or ~/.local/share
    pub fn data_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            std::env::var("LOCALAPPDATA")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join("Library/Application Support"))
                .unwrap_or_else(|_| PathBuf::from("."))
        } else {
            // Linux/Unix - follow XDG Base Directory specification
            std::env::var("XDG_DATA_HOME")
                .map(PathBuf::from)
                .or_else(|_| {
                    std::env::var("HOME").map(|home| PathBuf::from(home).join(".local/share"))
                })
                .unwrap_or_else(|_| PathBuf::from("."))
        }
    }

    /// Get default project-specific data directory
    ///
    /// Returns: {data_dir}/compounding-docs
    pub fn project_data_dir() -> PathBuf {
        Self::data_dir().join("compounding-docs")
    }

    /// Get default LanceDB database path
    ///
    /// Returns: {data_dir}/compounding-docs/lancedb
    pub fn default_lancedb_path() -> PathBuf {
        Self::project_data_dir().join("lancedb")
    }
}

/// Directory under the project root that holds config and local state
pub const PROJECT_DIR_NAME: &str = ".csharp-compounding-docs";

/// Normalize a docs-relative path to forward slashes
///
/// `relative_path` values are the index's primary key component, so the same
/// file must always normalize to the same string on every platform.
pub fn normalize_relative(path: &str) -> String {
    path.replace('\\', "/")
        .trim_start_matches("./")
        .trim_start_matches('/')
        .to_string()
}

/// Validate a caller-supplied relative path and return its normalized form
///
/// Rejects absolute paths, `..` traversal segments, and non-`.md` extensions.
pub fn validate_relative(path: &str) -> Result<String> {
    if path.trim().is_empty() {
        return Err(DocsError::invalid_argument("path cannot be empty"));
    }

    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return Err(DocsError::invalid_argument(format!(
            "path must be relative to the docs root: {path}"
        )));
    }

    for component in candidate.components() {
        match component {
            Component::ParentDir => {
                return Err(DocsError::FileSystem(format!(
                    "path traversal rejected: {path}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(DocsError::invalid_argument(format!(
                    "path must be relative to the docs root: {path}"
                )));
            }
            _ => {}
        }
    }

    let normalized = normalize_relative(path);
    if !normalized.ends_with(".md") {
        return Err(DocsError::invalid_argument(format!(
            "only .md documents can be indexed: {path}"
        )));
    }

    Ok(normalized)
}

/// Compute the docs-relative path of an absolute path under `root`
///
/// Returns None when the path lies outside the root.
pub fn relative_to_root(absolute: &Path, root: &Path) -> Option<String> {
    absolute
        .strip_prefix(root)
        .ok()
        .map(|rel| normalize_relative(&rel.to_string_lossy()))
}

/// True when any path segment is hidden (starts with '.')
pub fn has_hidden_component(relative: &str) -> bool {
    relative
        .split('/')
        .any(|segment| segment.starts_with('.') && !segment.is_empty())
}
