//! # Plugin System
//!
//! A plugin is an opaque unit of behavior with up to four optional hooks:
//! a one-time `bootstrap`, a repeatable `transform`, and the
//! `on_transform_start` / `on_transform_end` notifications. Every hook is
//! optional; the default `transform` passes the data bag through unchanged
//! and the default `bootstrap` is an immediate no-op. A bare closure can be
//! used as a transform-only plugin via [`transform_fn`].
//!
//! ## Lifecycle
//!
//! ```text
//! Engine                          Plugin
//!  │                                │
//!  ├── bootstrap(ctx) ──────────────┤  once, in declaration order
//!  │     options, context get/set, log, refresh
//!  │                                │
//!  ├── on_transform_start(ctx) ─────┤  every run, no data bag
//!  ├── transform(ctx, bag) ─────────┤  every run, bag folded in order
//!  └── on_transform_end(ctx, bag) ──┘  successful runs only
//! ```
//!
//! Hooks never touch engine internals directly — each receives a capability
//! object scoped to the plugin's own namespace.

use std::sync::Arc;

use anyhow::Result;
use serde_json::{Map, Value};

use crate::domain::DataBag;
use crate::engine::diff::BagDiff;
use crate::engine::options::OptionSchema;
use crate::engine::Refresh;
use crate::log::NamespacedLogger;
use crate::storage::ContextStore;

/// An externally supplied unit of behavior run by the engine
pub trait Plugin: Send + Sync {
    /// Declared plugin name; used as the context namespace. Unnamed plugins
    /// get a generated `plugin-<index>` namespace.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Option declarations consulted by the option resolver on every hook
    /// invocation
    fn options(&self) -> OptionSchema {
        OptionSchema::new()
    }

    /// One-time initialization; completion marks the plugin bootstrapped
    fn bootstrap(&self, ctx: &BootstrapContext) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Folds the shared data bag; must return the bag handed to the next
    /// plugin (possibly the input unchanged)
    fn transform(&self, ctx: &TransformContext, data: DataBag) -> Result<DataBag> {
        let _ = ctx;
        Ok(data)
    }

    /// Fired at the start of every transform run; receives no data bag and
    /// its outcome is ignored
    fn on_transform_start(&self, ctx: &HookContext) {
        let _ = ctx;
    }

    /// Fired after a successful run with the final bag; outcome ignored
    fn on_transform_end(&self, ctx: &HookContext, data: &DataBag) {
        let _ = (ctx, data);
    }
}

/// One entry of the configured plugin list: the plugin itself plus its
/// user-supplied options block
pub struct PluginEntry {
    pub(crate) module: Arc<dyn Plugin>,
    pub(crate) options: Map<String, Value>,
}

impl PluginEntry {
    pub fn new(plugin: impl Plugin + 'static) -> Self {
        Self {
            module: Arc::new(plugin),
            options: Map::new(),
        }
    }

    /// Entry backed by an already-shared plugin
    pub fn shared(plugin: Arc<dyn Plugin>) -> Self {
        Self {
            module: plugin,
            options: Map::new(),
        }
    }

    /// Attaches the user's configuration block for this plugin
    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }
}

/// Wraps a bare closure as a transform-only plugin, the shorthand for list
/// entries that only shape data
pub fn transform_fn<F>(f: F) -> TransformFnPlugin<F>
where
    F: Fn(&TransformContext, DataBag) -> Result<DataBag> + Send + Sync,
{
    TransformFnPlugin { f }
}

/// A transform-only plugin built from a closure; no name, no declared
/// options, no bootstrap
pub struct TransformFnPlugin<F> {
    f: F,
}

impl<F> Plugin for TransformFnPlugin<F>
where
    F: Fn(&TransformContext, DataBag) -> Result<DataBag> + Send + Sync,
{
    fn transform(&self, ctx: &TransformContext, data: DataBag) -> Result<DataBag> {
        (self.f)(ctx, data)
    }
}

/// Capabilities handed to a plugin's `bootstrap` hook
pub struct BootstrapContext {
    /// Effective options for this invocation
    pub options: Map<String, Value>,

    /// Namespace-scoped log channel
    pub log: NamespacedLogger,

    pub(crate) store: Arc<ContextStore>,
    pub(crate) namespace: String,
    pub(crate) refresh: Refresh,
}

impl BootstrapContext {
    /// Deep copy of this plugin's slice of the live context, `{}` if unset
    pub fn context(&self) -> Value {
        self.store.get(&self.namespace)
    }

    /// Shallow-merges `partial` into this plugin's context slice
    pub fn set_context(&self, partial: Value) {
        self.store.set(&self.namespace, partial);
    }

    /// Handle that triggers a transform run; cloneable and safe to call
    /// from any thread at any later time (e.g. a timer or watcher)
    pub fn refresh(&self) -> Refresh {
        self.refresh.clone()
    }
}

/// Capabilities handed to `on_transform_start` and `on_transform_end`
pub struct HookContext {
    /// Effective options for this invocation
    pub options: Map<String, Value>,

    /// Namespace-scoped log channel
    pub log: NamespacedLogger,

    pub(crate) snapshot: Arc<Map<String, Value>>,
    pub(crate) namespace: String,
}

impl HookContext {
    /// Deep copy of this plugin's slice of the run's context snapshot
    pub fn context(&self) -> Value {
        snapshot_slice(&self.snapshot, &self.namespace)
    }
}

/// Capabilities handed to a plugin's `transform` hook
pub struct TransformContext {
    /// Effective options for this invocation
    pub options: Map<String, Value>,

    /// Namespace-scoped log channel
    pub log: NamespacedLogger,

    /// Per-bucket structural changes in this plugin's incoming bag since
    /// its output on the previous completed run
    pub diff: BagDiff,

    pub(crate) snapshot: Arc<Map<String, Value>>,
    pub(crate) namespace: String,
}

impl TransformContext {
    /// Deep copy of this plugin's slice of the run's context snapshot.
    ///
    /// Transform hooks observe the snapshot taken at the start of the run,
    /// not the live store, so mid-run context mutations by other actors
    /// cannot produce inconsistent partial views.
    pub fn context(&self) -> Value {
        snapshot_slice(&self.snapshot, &self.namespace)
    }
}

fn snapshot_slice(snapshot: &Map<String, Value>, namespace: &str) -> Value {
    snapshot
        .get(namespace)
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Logger;
    use serde_json::json;

    fn transform_ctx(namespace: &str) -> TransformContext {
        TransformContext {
            options: Map::new(),
            log: Logger::new(true).namespaced(namespace),
            diff: BagDiff::new(),
            snapshot: Arc::new(Map::new()),
            namespace: namespace.to_string(),
        }
    }

    struct Inert;

    impl Plugin for Inert {}

    #[test]
    fn default_hooks_are_no_ops() {
        let plugin = Inert;

        assert!(plugin.name().is_none());
        assert!(plugin.options().is_empty());

        let mut bag = DataBag::new();
        bag.objects.push(json!({"name": "A"}));

        let out = plugin
            .transform(&transform_ctx("plugin-0"), bag.clone())
            .unwrap();
        assert_eq!(out, bag);
    }

    #[test]
    fn transform_fn_wraps_a_closure() {
        let plugin = transform_fn(|_ctx, mut data: DataBag| {
            data.objects.push(json!({"name": "Yttrium"}));
            Ok(data)
        });

        let out = plugin
            .transform(&transform_ctx("plugin-0"), DataBag::new())
            .unwrap();
        assert_eq!(out.objects, vec![json!({"name": "Yttrium"})]);
        assert!(plugin.name().is_none());
    }

    #[test]
    fn hook_context_reads_only_its_namespace() {
        let mut snapshot = Map::new();
        snapshot.insert("mine".to_string(), json!({"entries": [1]}));
        snapshot.insert("theirs".to_string(), json!({"entries": [2]}));

        let ctx = HookContext {
            options: Map::new(),
            log: Logger::new(true).namespaced("mine"),
            snapshot: Arc::new(snapshot),
            namespace: "mine".to_string(),
        };

        assert_eq!(ctx.context(), json!({"entries": [1]}));
    }
}
