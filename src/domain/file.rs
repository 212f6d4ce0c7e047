//! Output file descriptors
//!
//! Plugins declare the files they want on disk by pushing descriptors into
//! the bag's `files` bucket; the output reconciler resolves, serializes and
//! writes them at the end of a successful transform run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Serialization format of an output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileFormat {
    /// Pretty-printed JSON (2-space indent)
    Json,

    /// YAML frontmatter block followed by a markdown body
    FrontmatterMarkdown,

    /// Plain YAML document
    Yaml,

    /// Pretty-printed TOML document
    Toml,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Json => "json",
            FileFormat::FrontmatterMarkdown => "frontmatter-markdown",
            FileFormat::Yaml => "yaml",
            FileFormat::Toml => "toml",
        }
    }
}

/// A single file a plugin wants written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Destination path; relative paths are resolved against the engine's
    /// base directory. Descriptors with an empty path are skipped with a
    /// warning.
    pub path: String,

    /// Serialization format for `content`
    pub format: FileFormat,

    /// The value to serialize
    pub content: Value,

    /// When set and an earlier descriptor targets the same path, this
    /// descriptor's content is accumulated onto the earlier one instead of
    /// replacing it
    #[serde(default)]
    pub append: bool,
}

impl FileDescriptor {
    pub fn new(path: impl Into<String>, format: FileFormat, content: Value) -> Self {
        Self {
            path: path.into(),
            format,
            content,
            append: false,
        }
    }
}
