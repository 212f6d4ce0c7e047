//! Format-specific serialization of output file content

use anyhow::{Context as _, Result};
use serde_json::Value;

use crate::domain::FileFormat;

/// Serializes `content` according to `format`.
///
/// The result is the exact byte content the reconciler writes (and hashes
/// for change detection), so every writer must be deterministic.
pub fn render(format: FileFormat, content: &Value) -> Result<String> {
    match format {
        FileFormat::Json => render_json(content),
        FileFormat::FrontmatterMarkdown => render_frontmatter_markdown(content),
        FileFormat::Yaml => render_yaml(content),
        FileFormat::Toml => render_toml(content),
    }
}

/// Pretty-printed JSON with 2-space indentation
fn render_json(content: &Value) -> Result<String> {
    serde_json::to_string_pretty(content).context("Failed to serialize JSON content")
}

/// Plain YAML document in the serializer's canonical form
fn render_yaml(content: &Value) -> Result<String> {
    serde_yaml::to_string(content).context("Failed to serialize YAML content")
}

/// Pretty-printed TOML document
fn render_toml(content: &Value) -> Result<String> {
    toml::to_string_pretty(content).context("Failed to serialize TOML content")
}

/// A YAML frontmatter block between `---` fences, followed by the trimmed
/// body and a trailing newline.
///
/// `content` is expected to be an object with a `frontmatter` field and an
/// optional `body` field. A non-string body is coerced to its JSON text; an
/// absent body becomes the empty string.
fn render_frontmatter_markdown(content: &Value) -> Result<String> {
    let frontmatter = content.get("frontmatter").cloned().unwrap_or(Value::Null);
    let yaml =
        serde_yaml::to_string(&frontmatter).context("Failed to serialize frontmatter")?;

    let body = match content.get("body") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    };
    let body = body.trim();

    let lines = [
        "---",
        yaml.trim(),
        "---",
        if body.is_empty() { "" } else { body },
        "",
    ];

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_is_pretty_printed() {
        let rendered = render(FileFormat::Json, &json!({"x": 1})).unwrap();
        assert_eq!(rendered, "{\n  \"x\": 1\n}");
    }

    #[test]
    fn yaml_is_canonical() {
        let rendered = render(FileFormat::Yaml, &json!({"title": "Home", "order": 1})).unwrap();
        assert_eq!(rendered, "order: 1\ntitle: Home\n");
    }

    #[test]
    fn toml_is_pretty_printed() {
        let rendered = render(FileFormat::Toml, &json!({"title": "Home"})).unwrap();
        assert_eq!(rendered, "title = \"Home\"\n");
    }

    #[test]
    fn frontmatter_document_layout() {
        let content = json!({
            "frontmatter": {"title": "Home"},
            "body": "  # Welcome\n"
        });

        let rendered = render(FileFormat::FrontmatterMarkdown, &content).unwrap();
        assert_eq!(rendered, "---\ntitle: Home\n---\n# Welcome\n");
    }

    #[test]
    fn frontmatter_with_empty_body() {
        let content = json!({"frontmatter": {"title": "Home"}});

        let rendered = render(FileFormat::FrontmatterMarkdown, &content).unwrap();
        assert_eq!(rendered, "---\ntitle: Home\n---\n\n");
    }

    #[test]
    fn frontmatter_body_is_coerced_to_text() {
        let content = json!({"frontmatter": {}, "body": 42});

        let rendered = render(FileFormat::FrontmatterMarkdown, &content).unwrap();
        assert_eq!(rendered, "---\n{}\n---\n42\n");
    }

    #[test]
    fn deterministic_rendering() {
        let content = json!({"b": [1, 2], "a": {"nested": true}});

        let first = render(FileFormat::Json, &content).unwrap();
        let second = render(FileFormat::Json, &content).unwrap();
        assert_eq!(first, second);
    }
}
