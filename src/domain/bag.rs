//! The data bag folded through transform hooks
//!
//! A fresh bag is created at the start of every transform run. Each plugin
//! receives the bag produced by its predecessor and returns the bag handed
//! to its successor; the last plugin's bag is the run's result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::FileDescriptor;

/// The bucketed record threaded through the transform fold.
///
/// The three named buckets are the ones every plugin can rely on; anything
/// else a plugin wants to pass downstream goes into `extra`, keyed by
/// bucket name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataBag {
    /// Files to be written by the output reconciler at the end of the run
    pub files: Vec<FileDescriptor>,

    /// Content model descriptions contributed by source plugins
    pub models: Vec<Value>,

    /// Content entries, the main payload of the pipeline
    pub objects: Vec<Value>,

    /// Additional plugin-defined buckets
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DataBag {
    /// Creates an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bag's buckets as (name, JSON value) pairs, named buckets
    /// first, extras in key order. Used for per-bucket diffing.
    pub fn buckets(&self) -> Vec<(String, Value)> {
        let mut buckets = vec![
            (
                "files".to_string(),
                serde_json::to_value(&self.files).unwrap_or(Value::Null),
            ),
            (
                "models".to_string(),
                Value::Array(self.models.clone()),
            ),
            (
                "objects".to_string(),
                Value::Array(self.objects.clone()),
            ),
        ];

        for (name, value) in &self.extra {
            buckets.push((name.clone(), value.clone()));
        }

        buckets
    }
}
