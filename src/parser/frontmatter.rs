//! Frontmatter extraction and YAML-to-JSON conversion.
//!
//! A document may begin with a `---` delimited YAML block. Malformed YAML is
//! recoverable: the block is logged and treated as absent, never fatal.

use serde_json::{Map, Value as JsonValue};
use serde_yaml::Value as YamlValue;

/// The YAML block and the body that follows it
pub struct SplitDocument<'a> {
    pub yaml: Option<String>,
    pub body: &'a str,
}

/// Split a document into its frontmatter block and body.
///
/// The file has frontmatter only when its very first line is `---`; the block
/// runs to the next `---` line. An unterminated block means no frontmatter.
pub fn split_frontmatter(source: &str) -> SplitDocument<'_> {
    let trimmed = source.trim_start_matches(['\u{FEFF}', '\u{200B}']);
    if !trimmed.starts_with("---") {
        return SplitDocument {
            yaml: None,
            body: trimmed,
        };
    }

    let mut lines = trimmed.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return SplitDocument {
            yaml: None,
            body: trimmed,
        };
    };
    if first.trim() != "---" {
        return SplitDocument {
            yaml: None,
            body: trimmed,
        };
    }

    let mut yaml_len = 0usize;
    let mut consumed = first.len();
    for line in lines {
        if line.trim() == "---" {
            let yaml = trimmed[first.len()..first.len() + yaml_len].to_string();
            let body = &trimmed[consumed + line.len()..];
            return SplitDocument {
                yaml: Some(yaml),
                body,
            };
        }
        yaml_len += line.len();
        consumed += line.len();
    }

    // No closing delimiter: treat the whole file as body
    SplitDocument {
        yaml: None,
        body: trimmed,
    }
}

/// Parse a frontmatter block into a JSON object.
///
/// Non-mapping YAML and parse errors degrade to an empty object with a
/// warning so a stray frontmatter block never blocks indexing.
pub fn parse_frontmatter(yaml: &str) -> Map<String, JsonValue> {
    let parsed: YamlValue = match serde_yaml::from_str(yaml) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Malformed frontmatter YAML, treating as absent: {}", e);
            return Map::new();
        }
    };

    match yaml_to_json(parsed) {
        JsonValue::Object(map) => map,
        other => {
            tracing::warn!(
                "Frontmatter is not a mapping ({}), treating as absent",
                type_name(&other)
            );
            Map::new()
        }
    }
}

fn yaml_to_json(value: YamlValue) -> JsonValue {
    match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(v) => JsonValue::Bool(v),
        YamlValue::Number(num) => yaml_number_to_json(num),
        YamlValue::String(v) => JsonValue::String(v),
        YamlValue::Sequence(items) => {
            JsonValue::Array(items.into_iter().map(yaml_to_json).collect())
        }
        YamlValue::Mapping(map) => {
            let mut object = Map::new();
            for (key, val) in map {
                object.insert(yaml_key_to_string(key), yaml_to_json(val));
            }
            JsonValue::Object(object)
        }
        YamlValue::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_number_to_json(num: serde_yaml::Number) -> JsonValue {
    if let Some(value) = num.as_i64() {
        return JsonValue::Number(value.into());
    }
    if let Some(value) = num.as_u64() {
        return JsonValue::Number(value.into());
    }
    if let Some(value) = num.as_f64()
        && let Some(number) = serde_json::Number::from_f64(value)
    {
        return JsonValue::Number(number);
    }
    JsonValue::Null
}

fn yaml_key_to_string(value: YamlValue) -> String {
    match value {
        YamlValue::String(v) => v,
        YamlValue::Bool(v) => v.to_string(),
        YamlValue::Number(v) => v.to_string(),
        YamlValue::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "<unserializable-key>".to_string()),
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_with_frontmatter() {
        let doc = "---\ntitle: Pool\ndoc_type: problem\n---\n# Body\n";
        let split = split_frontmatter(doc);
        assert_eq!(split.yaml.as_deref(), Some("title: Pool\ndoc_type: problem\n"));
        assert_eq!(split.body, "# Body\n");
    }

    #[test]
    fn test_split_without_frontmatter() {
        let doc = "# Just a body\n";
        let split = split_frontmatter(doc);
        assert!(split.yaml.is_none());
        assert_eq!(split.body, doc);
    }

    #[test]
    fn test_split_unterminated_block_is_body() {
        let doc = "---\ntitle: Pool\nno closing delimiter\n";
        let split = split_frontmatter(doc);
        assert!(split.yaml.is_none());
        assert_eq!(split.body, doc);
    }

    #[test]
    fn test_split_strips_bom() {
        let doc = "\u{FEFF}---\na: 1\n---\nbody";
        let split = split_frontmatter(doc);
        assert_eq!(split.yaml.as_deref(), Some("a: 1\n"));
        assert_eq!(split.body, "body");
    }

    #[test]
    fn test_parse_valid_mapping() {
        let map = parse_frontmatter("title: Pool\ntags:\n  - db\n  - perf\ncount: 3\n");
        assert_eq!(map["title"], "Pool");
        assert_eq!(map["count"], 3);
        assert_eq!(map["tags"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_malformed_yaml_degrades() {
        let map = parse_frontmatter("title: [unclosed\n  nested: {");
        assert!(map.is_empty());
    }

    #[test]
    fn test_parse_non_mapping_degrades() {
        let map = parse_frontmatter("- just\n- a\n- list\n");
        assert!(map.is_empty());
    }

    #[test]
    fn test_roundtrip_extraction() {
        // extract(serialize(frontmatter ++ body)) == frontmatter
        let yaml = "doc_type: problem\ntitle: Pool exhaustion\n";
        let doc = format!("---\n{yaml}---\nSome body text.\n");
        let split = split_frontmatter(&doc);
        let map = parse_frontmatter(&split.yaml.unwrap());
        assert_eq!(map["doc_type"], "problem");
        assert_eq!(map["title"], "Pool exhaustion");
        assert_eq!(split.body, "Some body text.\n");
    }
}
