//! Doc-type registry and frontmatter schema validation.
//!
//! Built-in types carry a folder convention and a light schema; custom types
//! from the project config are compiled into the same registry at activation
//! time. Validation works on the concrete frontmatter map, never on domain
//! types.

use std::collections::HashMap;

use serde_json::{Map, Value as JsonValue};

use crate::config::CustomDocType;
use crate::error::{DocsError, Result};
use crate::types::PromotionLevel;

/// Compiled schema for one doc type
#[derive(Debug, Clone, Default)]
pub struct DocTypeSchema {
    pub required_fields: Vec<String>,
    pub enums: HashMap<String, Vec<String>>,
}

/// A registered doc type
#[derive(Debug, Clone)]
pub struct DocTypeDef {
    pub name: String,
    pub folder: String,
    pub schema: Option<DocTypeSchema>,
    pub builtin: bool,
}

/// Registry of doc types active for one tenant
#[derive(Debug, Clone)]
pub struct DocTypeRegistry {
    types: Vec<DocTypeDef>,
}

const BUILTIN_TYPES: &[(&str, &str)] = &[
    ("problem", "problems"),
    ("insight", "insights"),
    ("codebase", "codebase"),
    ("tool", "tools"),
    ("style", "styles"),
];

impl DocTypeRegistry {
    /// Built-in types only
    pub fn builtin() -> Self {
        let types = BUILTIN_TYPES
            .iter()
            .map(|(name, folder)| DocTypeDef {
                name: name.to_string(),
                folder: folder.to_string(),
                schema: None,
                builtin: true,
            })
            .collect();
        Self { types }
    }

    /// Built-in types plus the project's custom types.
    ///
    /// A custom type with a built-in name overrides the built-in definition.
    pub fn with_custom(custom: &[CustomDocType]) -> Self {
        let mut registry = Self::builtin();
        for doc_type in custom {
            let def = DocTypeDef {
                name: doc_type.name.clone(),
                folder: doc_type
                    .folder
                    .clone()
                    .unwrap_or_else(|| doc_type.name.clone()),
                schema: doc_type.schema.as_ref().map(|s| DocTypeSchema {
                    required_fields: s.required_fields.clone(),
                    enums: s.enums.clone(),
                }),
                builtin: false,
            };
            if let Some(existing) = registry
                .types
                .iter_mut()
                .find(|t| t.name == doc_type.name)
            {
                *existing = def;
            } else {
                registry.types.push(def);
            }
        }
        registry
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.iter().any(|t| t.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&DocTypeDef> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocTypeDef> {
        self.types.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.types.iter().map(|t| t.name.clone()).collect()
    }

    /// Resolve the doc type of a document: an explicit `doc_type` frontmatter
    /// field wins, then the top-level folder convention, then "insight".
    pub fn resolve(&self, relative_path: &str, frontmatter: &Map<String, JsonValue>) -> Result<String> {
        if let Some(value) = frontmatter.get("doc_type") {
            let name = value.as_str().ok_or_else(|| {
                DocsError::invalid_argument("frontmatter field 'doc_type' must be a string")
            })?;
            if !self.contains(name) {
                return Err(DocsError::InvalidDocType(name.to_string()));
            }
            return Ok(name.to_string());
        }

        if let Some(folder) = relative_path.split('/').next()
            && let Some(def) = self.types.iter().find(|t| t.folder == folder)
        {
            return Ok(def.name.clone());
        }

        Ok("insight".to_string())
    }

    /// Validate a frontmatter map against the schema of its doc type.
    ///
    /// Failure carries every violation, not just the first.
    pub fn validate(&self, doc_type: &str, frontmatter: &Map<String, JsonValue>) -> Result<()> {
        let def = self
            .get(doc_type)
            .ok_or_else(|| DocsError::InvalidDocType(doc_type.to_string()))?;

        let mut errors = Vec::new();

        // Global rules applying to every doc type
        for field in ["title", "summary"] {
            if let Some(value) = frontmatter.get(field)
                && !value.is_string()
            {
                errors.push(format!("field '{field}' must be a string"));
            }
        }
        if let Some(value) = frontmatter.get("promotion_level") {
            match value.as_str() {
                Some(level) if PromotionLevel::parse(level).is_some() => {}
                Some(level) => errors.push(format!(
                    "field 'promotion_level' must be one of standard, important, critical; got '{level}'"
                )),
                None => errors.push("field 'promotion_level' must be a string".to_string()),
            }
        }

        if let Some(schema) = &def.schema {
            for required in &schema.required_fields {
                match frontmatter.get(required) {
                    None | Some(JsonValue::Null) => {
                        errors.push(format!("missing required field '{required}'"));
                    }
                    _ => {}
                }
            }
            for (field, allowed) in &schema.enums {
                if let Some(value) = frontmatter.get(field) {
                    match value.as_str() {
                        Some(s) if allowed.iter().any(|a| a == s) => {}
                        Some(s) => errors.push(format!(
                            "field '{field}' must be one of [{}]; got '{s}'",
                            allowed.join(", ")
                        )),
                        None => errors.push(format!("field '{field}' must be a string")),
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DocsError::SchemaValidationFailed {
                doc_type: doc_type.to_string(),
                errors,
            })
        }
    }
}
