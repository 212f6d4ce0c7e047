//! Namespaced context store with on-disk caching
//!
//! The context maps each plugin's namespace to an arbitrary JSON value owned
//! exclusively by that plugin. It can be hydrated from and persisted to a
//! single JSON cache file; a missing or corrupt file degrades to an empty
//! context rather than failing. All reads hand out deep copies, so callers
//! can never mutate engine state through a returned value.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context as _, Result};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Failed to read cache file {0}")]
    Read(PathBuf),

    #[error("Failed to parse cache file {0}")]
    Parse(PathBuf),
}

/// The persisted, namespaced state surviving across engine runs
#[derive(Debug)]
pub struct ContextStore {
    /// Path of the JSON cache document
    cache_path: PathBuf,

    /// Live context; only mutated through [`ContextStore::set`]
    context: Mutex<Map<String, Value>>,
}

impl ContextStore {
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
            context: Mutex::new(Map::new()),
        }
    }

    /// Path of the cache file backing this store
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Loads the cache file into the live context.
    ///
    /// Any I/O or parse failure leaves the context empty and emits a debug
    /// event; it is never an error for the cache to be absent or corrupt.
    pub fn hydrate(&self) {
        let loaded = match self.read_cache() {
            Ok(map) => map,
            Err(error) => {
                tracing::debug!(
                    cache = %self.cache_path.display(),
                    "cache unavailable, starting empty: {error:#}"
                );
                Map::new()
            }
        };

        *self.context.lock().expect("context lock poisoned") = loaded;
    }

    fn read_cache(&self) -> Result<Map<String, Value>> {
        let raw = fs::read_to_string(&self.cache_path)
            .with_context(|| ContextError::Read(self.cache_path.clone()).to_string())?;

        let value: Value = serde_json::from_str(&raw)
            .with_context(|| ContextError::Parse(self.cache_path.clone()).to_string())?;

        match value {
            Value::Object(map) => Ok(map),
            _ => Err(anyhow::Error::new(ContextError::Parse(
                self.cache_path.clone(),
            ))),
        }
    }

    /// Writes the live context to the cache file.
    ///
    /// Failures are logged on the debug channel and swallowed; a failed
    /// persist never aborts the surrounding bootstrap.
    pub fn persist(&self) {
        let snapshot = self.snapshot();

        let result = serde_json::to_string(&Value::Object(snapshot))
            .context("Failed to serialize context")
            .and_then(|content| {
                fs::write(&self.cache_path, content).with_context(|| {
                    format!("Failed to write cache file {}", self.cache_path.display())
                })
            });

        if let Err(error) = result {
            tracing::debug!(
                cache = %self.cache_path.display(),
                "context not persisted: {error:#}"
            );
        }
    }

    /// Returns a deep copy of one namespace's value, `{}` if absent
    pub fn get(&self, namespace: &str) -> Value {
        self.context
            .lock()
            .expect("context lock poisoned")
            .get(namespace)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Shallow-merges `partial` into the namespace's existing value.
    ///
    /// When both the existing value and `partial` are objects, top-level
    /// keys of `partial` win; otherwise `partial` replaces the value. This
    /// is the only mutation path into the context.
    pub fn set(&self, namespace: &str, partial: Value) {
        let mut context = self.context.lock().expect("context lock poisoned");

        let merged = match (context.get(namespace), partial) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                let mut merged = existing.clone();
                for (key, value) in incoming {
                    merged.insert(key, value);
                }
                Value::Object(merged)
            }
            (_, partial) => partial,
        };

        context.insert(namespace.to_string(), merged);
    }

    /// Deep copy of the whole context mapping
    pub fn snapshot(&self) -> Map<String, Value> {
        self.context.lock().expect("context lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn get_of_unknown_namespace_is_empty_object() {
        let dir = TempDir::new().unwrap();
        let store = ContextStore::new(dir.path().join("cache.json"));

        assert_eq!(store.get("source-cms"), json!({}));
    }

    #[test]
    fn set_shallow_merges_objects() {
        let dir = TempDir::new().unwrap();
        let store = ContextStore::new(dir.path().join("cache.json"));

        store.set("source-cms", json!({"entries": [1], "token": "a"}));
        store.set("source-cms", json!({"entries": [2]}));

        assert_eq!(store.get("source-cms"), json!({"entries": [2], "token": "a"}));
    }

    #[test]
    fn set_replaces_non_object_values() {
        let dir = TempDir::new().unwrap();
        let store = ContextStore::new(dir.path().join("cache.json"));

        store.set("counter", json!(1));
        store.set("counter", json!(2));

        assert_eq!(store.get("counter"), json!(2));
    }

    #[test]
    fn returned_values_are_copies() {
        let dir = TempDir::new().unwrap();
        let store = ContextStore::new(dir.path().join("cache.json"));

        store.set("source-cms", json!({"entries": [1]}));

        let mut copy = store.get("source-cms");
        copy["entries"] = json!("clobbered");

        assert_eq!(store.get("source-cms"), json!({"entries": [1]}));
    }

    #[test]
    fn persist_then_hydrate_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let store = ContextStore::new(&path);
        store.set("source-cms", json!({"entries": [{"name": "A"}], "cursor": 7}));
        store.set("target-pages", json!({"built": true}));
        store.persist();

        let restored = ContextStore::new(&path);
        restored.hydrate();

        assert_eq!(restored.snapshot(), store.snapshot());
    }

    #[test]
    fn hydrate_of_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ContextStore::new(dir.path().join("absent.json"));

        store.hydrate();
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn hydrate_of_corrupt_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{not json").unwrap();

        let store = ContextStore::new(&path);
        store.hydrate();

        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn hydrate_of_non_object_document_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        let store = ContextStore::new(&path);
        store.hydrate();

        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn hydrate_discards_previous_live_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, r#"{"a": {"x": 1}}"#).unwrap();

        let store = ContextStore::new(&path);
        store.set("b", json!({"y": 2}));
        store.hydrate();

        assert_eq!(store.get("a"), json!({"x": 1}));
        assert_eq!(store.get("b"), json!({}));
    }
}
